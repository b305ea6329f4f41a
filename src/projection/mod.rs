//! Planar RD coordinates to WGS84, and geometry text helpers.

mod geometry;
mod rijksdriehoek;

pub use geometry::{
    first_position, geojson_to_polygons, multipolygon_to_geojson, parse_position,
    polygon_to_geojson, ring_to_polygon, union_footprints,
};
pub use rijksdriehoek::rd_to_wgs84;
