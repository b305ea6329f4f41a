//! Core data models for the ingest pipeline.

pub mod kind;
pub mod record;

pub use kind::{EntityKind, PositionSource, GEOMETRY_FIELD, POS_FIELD};
pub use record::{Record, Value};
