//! Subject profile
//!
//! The body-composition formulas are calibrated against the person standing on
//! the scale. The profile is fixed for the lifetime of an [`Enricher`] and is
//! validated once, when it is built.
//!
//! [`Enricher`]: crate::enricher::Enricher

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EnrichError;

/// Biological sex, as used by the regression formulas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = EnrichError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Sex::Male),
            "female" | "f" => Ok(Sex::Female),
            other => Err(EnrichError::InvalidProfile(format!(
                "unknown sex '{}' (expected male or female)",
                other
            ))),
        }
    }
}

/// The person the measurements belong to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectProfile {
    pub sex: Sex,
    /// Age in years
    pub age: u32,
    /// Height in centimeters
    pub height: f64,
}

impl Default for SubjectProfile {
    fn default() -> Self {
        Self {
            sex: Sex::Male,
            age: 43,
            height: 181.0,
        }
    }
}

impl SubjectProfile {
    /// Build a validated profile
    pub fn new(sex: Sex, age: u32, height: f64) -> Result<Self, EnrichError> {
        let profile = Self { sex, age, height };
        profile.validate()?;
        Ok(profile)
    }

    /// Load and validate a profile from a JSON document
    pub fn from_json(json: &str) -> Result<Self, EnrichError> {
        let profile: SubjectProfile = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), EnrichError> {
        if self.age == 0 {
            return Err(EnrichError::InvalidProfile(
                "age must be a positive number of years".to_string(),
            ));
        }

        if !self.height.is_finite() || self.height <= 0.0 {
            return Err(EnrichError::InvalidProfile(format!(
                "height must be a positive number of centimeters, got {}",
                self.height
            )));
        }

        Ok(())
    }

    pub fn is_female(&self) -> bool {
        self.sex == Sex::Female
    }

    pub fn is_male(&self) -> bool {
        self.sex == Sex::Male
    }
}
