//! Record enrichment
//!
//! Binds the formula set to a subject profile and applies it to individual
//! records: records with an impedance reading get the six derived metrics
//! appended, all others pass through unchanged.

use log::trace;

use crate::composition::{BodyComposition, BodyCompositionModel};
use crate::error::EnrichError;
use crate::profile::SubjectProfile;
use crate::record::{Measurement, ScaleRecord};

/// What happened to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichOutcome {
    Enriched,
    PassedThrough,
}

/// Applies the body-composition model to scale records
#[derive(Debug, Clone)]
pub struct Enricher {
    model: BodyCompositionModel,
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new(SubjectProfile::default())
    }
}

impl Enricher {
    pub fn new(profile: SubjectProfile) -> Self {
        Self {
            model: BodyCompositionModel::new(profile),
        }
    }

    pub fn profile(&self) -> &SubjectProfile {
        self.model.profile()
    }

    /// Derived metrics for a record, or `None` if it has no impedance
    pub fn compute(&self, record: &ScaleRecord) -> Result<Option<BodyComposition>, EnrichError> {
        record
            .measurement()?
            .map(|m| self.compute_measurement(m))
            .transpose()
    }

    pub fn compute_measurement(
        &self,
        measurement: Measurement,
    ) -> Result<BodyComposition, EnrichError> {
        self.model
            .compute(measurement.weight, measurement.impedance)
    }

    /// Attach derived metrics to the record in place.
    ///
    /// On error the record is left unmodified.
    pub fn enrich(&self, record: &mut ScaleRecord) -> Result<EnrichOutcome, EnrichError> {
        let Some(composition) = self.compute(record)? else {
            return Ok(EnrichOutcome::PassedThrough);
        };

        trace!("derived {:?}", composition);

        for (key, value) in composition.fields() {
            record.set_number(key, value);
        }

        Ok(EnrichOutcome::Enriched)
    }

    /// Parse, enrich and re-encode one NDJSON line
    pub fn enrich_line(&self, line: &str) -> Result<(String, EnrichOutcome), EnrichError> {
        self.enrich_bytes(line.as_bytes())
    }

    /// Same as [`Enricher::enrich_line`], for a line not yet known to be UTF-8
    pub fn enrich_bytes(&self, line: &[u8]) -> Result<(String, EnrichOutcome), EnrichError> {
        let mut record = ScaleRecord::parse_slice(line)?;
        let outcome = self.enrich(&mut record)?;
        Ok((record.to_json_line()?, outcome))
    }
}
