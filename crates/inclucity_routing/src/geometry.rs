use geo_types::{LineString, coord};

use crate::point::RoutePoint;

/// The routing service encodes geometry with 5 decimal digits.
pub const POLYLINE_PRECISION: u32 = 5;

/// Meters per degree, good enough at city scale.
const METERS_PER_DEGREE: f64 = 111_000.0;

/// Equirectangular distance approximation between two points, in meters.
/// Only meaningful for points up to a few hundred meters apart.
pub fn approx_distance_meters(a: &RoutePoint, b: &RoutePoint) -> f64 {
    let d_lat = a.lat - b.lat;
    let d_lng = a.lng - b.lng;

    (d_lat * d_lat + d_lng * d_lng).sqrt() * METERS_PER_DEGREE
}

pub fn is_valid_coordinate(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng)
}

/// Decodes a polyline-encoded coordinate sequence into a line string
/// (x = lng, y = lat). Points outside the valid coordinate range are
/// dropped instead of failing the whole decode; a truncated trailing
/// coordinate ends the stream.
pub fn decode_polyline(encoded: &str, precision: u32) -> LineString {
    let factor = 10f64.powi(precision as i32);
    let mut bytes = encoded.bytes();
    let mut coordinates = Vec::new();
    let mut lat = 0i64;
    let mut lng = 0i64;

    loop {
        let (Some(d_lat), Some(d_lng)) = (next_delta(&mut bytes), next_delta(&mut bytes)) else {
            break;
        };

        lat += d_lat;
        lng += d_lng;

        let lat_deg = lat as f64 / factor;
        let lng_deg = lng as f64 / factor;

        // Malformed points are rare transmission artifacts; later points
        // still decode correctly because the deltas keep accumulating.
        if is_valid_coordinate(lat_deg, lng_deg) {
            coordinates.push(coord! { x: lng_deg, y: lat_deg });
        }
    }

    LineString::new(coordinates)
}

/// Inverse of [`decode_polyline`].
pub fn encode_polyline(line: &LineString, precision: u32) -> String {
    let factor = 10f64.powi(precision as i32);
    let mut encoded = String::new();
    let mut prev_lat = 0i64;
    let mut prev_lng = 0i64;

    for coordinate in line.coords() {
        let lat = (coordinate.y * factor).round() as i64;
        let lng = (coordinate.x * factor).round() as i64;

        push_delta(lat - prev_lat, &mut encoded);
        push_delta(lng - prev_lng, &mut encoded);

        prev_lat = lat;
        prev_lng = lng;
    }

    encoded
}

/// Reads one zigzag varint delta from the byte stream. None when the
/// stream is exhausted or the value is malformed.
fn next_delta(bytes: &mut impl Iterator<Item = u8>) -> Option<i64> {
    let mut shift = 0u32;
    let mut accumulator = 0u64;

    loop {
        let chunk = bytes.next()?.wrapping_sub(63);
        accumulator |= u64::from(chunk & 0x1f) << shift;

        if chunk < 0x20 {
            break;
        }

        shift += 5;
        if shift > 60 {
            return None;
        }
    }

    let magnitude = (accumulator >> 1) as i64;

    Some(if accumulator & 1 == 1 {
        !magnitude
    } else {
        magnitude
    })
}

fn push_delta(delta: i64, encoded: &mut String) {
    let mut value = (delta << 1) ^ (delta >> 63);

    while value >= 0x20 {
        encoded.push(((0x20 | (value & 0x1f)) as u8 + 63) as char);
        value >>= 5;
    }

    encoded.push((value as u8 + 63) as char);
}
