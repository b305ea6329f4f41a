//! BAG geometry text handling.
//!
//! BAG rings arrive as a `posList`: whitespace separated RD ordinates, two or
//! three per point depending on the object type. They are converted to WGS84
//! polygons and stored as GeoJSON text.

use geo::{unary_union, Coord, LineString, MultiPolygon, Polygon};
use serde_json::{json, Value as JsonValue};

use super::rd_to_wgs84;

/// Parse an "x y [z]" position into its first two numbers.
pub fn parse_position(text: &str) -> Option<(f64, f64)> {
    let mut numbers = text.split_whitespace().map(|t| t.parse::<f64>());
    let x = numbers.next()?.ok()?;
    let y = numbers.next()?.ok()?;
    Some((x, y))
}

/// First point of a ring text blob, tolerating a leading bracket.
pub fn first_position(text: &str) -> Option<(f64, f64)> {
    let trimmed = text.trim_start().trim_start_matches(['[', '(']);
    parse_position(trimmed)
}

/// Build a WGS84 polygon (x = longitude, y = latitude) from an RD `posList`.
///
/// `dimension` is the number of ordinates per point; only the first two of
/// each point are used. A trailing incomplete point is ignored. Returns
/// `None` when fewer than three points remain.
pub fn ring_to_polygon(text: &str, dimension: usize) -> Option<Polygon<f64>> {
    if dimension < 2 {
        return None;
    }
    let trimmed = text.trim().trim_matches(|c: char| matches!(c, '[' | ']' | '(' | ')'));
    let ordinates: Vec<f64> = trimmed
        .split_whitespace()
        .map(|t| t.parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;

    let coords: Vec<Coord<f64>> = ordinates
        .chunks_exact(dimension)
        .map(|point| {
            let (lat, lon) = rd_to_wgs84(point[0], point[1]);
            Coord { x: lon, y: lat }
        })
        .collect();

    if coords.len() < 3 {
        return None;
    }

    // Close the ring if needed
    let mut ring = coords;
    if ring.first() != ring.last() {
        ring.push(ring[0]);
    }

    if ring.len() < 4 {
        return None;
    }

    Some(Polygon::new(LineString::new(ring), vec![]))
}

fn ring_coordinates(ring: &LineString<f64>) -> JsonValue {
    JsonValue::Array(ring.coords().map(|c| json!([c.x, c.y])).collect())
}

fn polygon_coordinates(polygon: &Polygon<f64>) -> JsonValue {
    let mut rings = vec![ring_coordinates(polygon.exterior())];
    rings.extend(polygon.interiors().iter().map(ring_coordinates));
    JsonValue::Array(rings)
}

pub fn polygon_to_geojson(polygon: &Polygon<f64>) -> String {
    json!({ "type": "Polygon", "coordinates": polygon_coordinates(polygon) }).to_string()
}

pub fn multipolygon_to_geojson(multi: &MultiPolygon<f64>) -> String {
    let polygons: Vec<JsonValue> = multi.0.iter().map(polygon_coordinates).collect();
    json!({ "type": "MultiPolygon", "coordinates": polygons }).to_string()
}

fn parse_ring(value: &JsonValue) -> Option<LineString<f64>> {
    let coords = value
        .as_array()?
        .iter()
        .map(|point| {
            let point = point.as_array()?;
            Some(Coord {
                x: point.first()?.as_f64()?,
                y: point.get(1)?.as_f64()?,
            })
        })
        .collect::<Option<Vec<_>>>()?;
    Some(LineString::new(coords))
}

fn parse_polygon(value: &JsonValue) -> Option<Polygon<f64>> {
    let mut rings = value.as_array()?.iter().map(parse_ring);
    let exterior = rings.next()??;
    let interiors = rings.collect::<Option<Vec<_>>>()?;
    Some(Polygon::new(exterior, interiors))
}

/// Polygons of a GeoJSON Polygon or MultiPolygon; anything else yields none.
pub fn geojson_to_polygons(text: &str) -> Vec<Polygon<f64>> {
    let Ok(value) = serde_json::from_str::<JsonValue>(text) else {
        return Vec::new();
    };
    let coordinates = &value["coordinates"];
    match value["type"].as_str() {
        Some("Polygon") => parse_polygon(coordinates).into_iter().collect(),
        Some("MultiPolygon") => coordinates
            .as_array()
            .map(|polys| polys.iter().filter_map(parse_polygon).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Union several GeoJSON footprints. A single resulting polygon is written
/// as a Polygon, anything more as a MultiPolygon.
pub fn union_footprints<'a>(footprints: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let polygons: Vec<Polygon<f64>> = footprints
        .into_iter()
        .flat_map(geojson_to_polygons)
        .collect();
    if polygons.is_empty() {
        return None;
    }

    let MultiPolygon(mut merged) = unary_union(&polygons);
    match merged.len() {
        0 => None,
        1 => merged.pop().map(|polygon| polygon_to_geojson(&polygon)),
        _ => Some(multipolygon_to_geojson(&MultiPolygon::new(merged))),
    }
}
