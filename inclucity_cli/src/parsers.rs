use inclucity_routing::point::RoutePoint;

pub fn parse_point(input: &str) -> Result<RoutePoint, String> {
    let Some((lat, lng)) = input.split_once(',') else {
        return Err(format!("expected \"lat,lng\", got \"{input}\""));
    };

    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("invalid latitude: {lat}"))?;
    let lng: f64 = lng
        .trim()
        .parse()
        .map_err(|_| format!("invalid longitude: {lng}"))?;

    Ok(RoutePoint::new(lat, lng))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_coordinate_pair() {
        let point = parse_point("49.8397, 24.0297").unwrap();
        assert_eq!(point.lat, 49.8397);
        assert_eq!(point.lng, 24.0297);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_point("49.8397").is_err());
        assert!(parse_point("north,east").is_err());
    }
}
