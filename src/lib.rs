//! mibcs-enrich - Body-composition enrichment for Mi Body Composition Scale data
//!
//! Reads scale measurements as newline-delimited JSON and appends the metrics
//! the scale vendor's app would show: BMI, body fat, water, visceral fat, bone
//! mass and muscle mass. Records without an impedance reading pass through
//! untouched.
//!
//! ## Modules
//!
//! - **profile**: the subject the formulas are calibrated for
//! - **composition**: the regression formulas
//! - **record**: order-preserving JSON records with typed accessors
//! - **enricher**: record-level enrichment
//! - **stream**: the NDJSON read/enrich/write loop

pub mod composition;
pub mod enricher;
pub mod error;
pub mod profile;
pub mod record;
pub mod stream;

pub use composition::{BodyComposition, BodyCompositionModel};
pub use enricher::{EnrichOutcome, Enricher};
pub use error::EnrichError;
pub use profile::{Sex, SubjectProfile};
pub use record::{Measurement, ScaleRecord};
pub use stream::{ErrorPolicy, StreamEnricher, StreamStats};

/// Crate version, reported by the CLI
pub const ENRICH_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Binary name used in CLI help and usage output
pub const PRODUCER_NAME: &str = "mibcs-enrich";
