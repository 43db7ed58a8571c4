use clap::{Parser, Subcommand};
use tracing::{info, warn};

use inclucity_ors::client::OrsClient;
use inclucity_ors::profile::TravelProfile;
use inclucity_routing::point::RoutePoint;
use inclucity_routing::route_client::{RouteClient, RouteOptions};

mod parsers;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Snap a point onto the routable road network
    Snap {
        /// Point as "lat,lng"
        #[arg(short, long, value_parser = parsers::parse_point)]
        point: RoutePoint,

        #[arg(long, default_value = "wheelchair")]
        profile: TravelProfile,
    },
    /// Compute an accessible route between two points
    Route {
        /// Start as "lat,lng"
        #[arg(short, long, value_parser = parsers::parse_point)]
        from: RoutePoint,

        /// Destination as "lat,lng"
        #[arg(short, long, value_parser = parsers::parse_point)]
        to: RoutePoint,

        #[arg(long, default_value = "wheelchair")]
        profile: TravelProfile,
    },
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::from_filename("./.env.local").ok();

    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let client = RouteClient::new(OrsClient::from_env()?);

    match cli.command {
        Commands::Snap { point, profile } => snap(&client, point, profile).await,
        Commands::Route { from, to, profile } => route(&client, from, to, profile).await,
    }
}

async fn snap(
    client: &RouteClient,
    point: RoutePoint,
    profile: TravelProfile,
) -> Result<(), anyhow::Error> {
    let snapped = client.nearest_road(&point, profile).await;

    if snapped.coords_eq(&point) {
        info!(
            "already on the road network: {:.6}, {:.6}",
            snapped.lat, snapped.lng
        );
    } else {
        info!(
            "snapped {:.6}, {:.6} -> {:.6}, {:.6}",
            point.lat, point.lng, snapped.lat, snapped.lng
        );
    }

    Ok(())
}

async fn route(
    client: &RouteClient,
    from: RoutePoint,
    to: RoutePoint,
    profile: TravelProfile,
) -> Result<(), anyhow::Error> {
    let result = client.route(&from, &to, RouteOptions { profile }).await?;

    if result.effective_profile != profile {
        warn!(
            "no {} route available, showing a {} route instead",
            profile, result.effective_profile
        );
    }

    if let Some(route) = result.response.routes.first() {
        info!(
            "route: {:.0}m, {:.0}s, {} geometry points",
            route.summary.distance,
            route.summary.duration,
            result.geometry.0.len(),
        );
    }

    for (index, step) in result.steps().enumerate() {
        info!("{:>3}. {} ({:.0}m)", index + 1, step.instruction, step.distance);
    }

    Ok(())
}
