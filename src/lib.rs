//! Adressen - BAG registry ingestion into a flat address relation
//!
//! This library provides the parser, pipeline and reconciliation used by the
//! ingest and verify binaries.

pub mod config;
pub mod error;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod projection;
pub mod quality;
pub mod reconcile;
pub mod reference;
pub mod store;
pub mod xml;

pub use config::{KindConfig, PipelineConfig};
pub use error::{BagError, Result};
pub use models::{EntityKind, Record, Value};
