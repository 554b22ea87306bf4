//! Body-composition formulas
//!
//! Empirical regressions for the Mi Body Composition Scale, following the
//! openScale `MiScaleLib` algorithm. Every metric is a pure function of the
//! measurement (weight, impedance) and the subject profile. Operation order is
//! kept as in the reference algorithm so results match it to the last bit.

use serde::{Deserialize, Serialize};

use crate::error::EnrichError;
use crate::profile::SubjectProfile;

/// Body fat reported when the regression exceeds [`BODY_FAT_LIMIT`]
pub const BODY_FAT_SENTINEL: f64 = 75.0;
pub const BODY_FAT_LIMIT: f64 = 63.0;

/// Bone mass reported when the regression exceeds the per-sex limit
pub const BONE_MASS_SENTINEL: f64 = 8.0;
pub const BONE_MASS_LIMIT_FEMALE: f64 = 5.1;
pub const BONE_MASS_LIMIT_MALE: f64 = 5.2;

/// Muscle mass reported when the regression reaches the per-sex limit
pub const MUSCLE_MASS_SENTINEL: f64 = 120.0;
pub const MUSCLE_MASS_LIMIT_FEMALE: f64 = 84.0;
pub const MUSCLE_MASS_LIMIT_MALE: f64 = 93.5;

/// The six derived metrics attached to an enriched record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyComposition {
    pub bmi: f64,
    pub body_fat_pct: f64,
    pub water_pct: f64,
    pub visceral_fat: f64,
    pub bone_mass_kg: f64,
    pub muscle_kg: f64,
}

impl BodyComposition {
    /// Output keys paired with their values, in emission order
    pub fn fields(&self) -> [(&'static str, f64); 6] {
        [
            ("bmi", self.bmi),
            ("body_fat_pct", self.body_fat_pct),
            ("water_pct", self.water_pct),
            ("visceral_fat", self.visceral_fat),
            ("bone_mass_kg", self.bone_mass_kg),
            ("muscle_kg", self.muscle_kg),
        ]
    }
}

/// Formula set bound to one subject profile
#[derive(Debug, Clone)]
pub struct BodyCompositionModel {
    profile: SubjectProfile,
}

impl BodyCompositionModel {
    pub fn new(profile: SubjectProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &SubjectProfile {
        &self.profile
    }

    fn age(&self) -> f64 {
        f64::from(self.profile.age)
    }

    fn height(&self) -> f64 {
        self.profile.height
    }

    /// Compute all six metrics for one measurement
    pub fn compute(&self, weight: f64, impedance: f64) -> Result<BodyComposition, EnrichError> {
        Ok(BodyComposition {
            bmi: self.bmi(weight),
            body_fat_pct: self.body_fat_percent(weight, impedance),
            water_pct: self.water_percent(weight, impedance),
            visceral_fat: self.visceral_fat(weight)?,
            bone_mass_kg: self.bone_mass_kg(weight, impedance),
            muscle_kg: self.muscle_mass_kg(weight, impedance),
        })
    }

    /// Lean body mass coefficient, the intermediate behind fat, bone and muscle
    pub fn lean_body_mass_coefficient(&self, weight: f64, impedance: f64) -> f64 {
        let height = self.height();

        let mut lbm = (height * 9.058 / 100.0) * height / 100.0;
        lbm += weight * 0.32 + 12.226;
        lbm -= impedance * 0.0068;
        lbm -= self.age() * 0.0542;
        lbm
    }

    pub fn bmi(&self, weight: f64) -> f64 {
        let height = self.height();
        weight / (((height * height) / 100.0) / 100.0)
    }

    pub fn body_fat_percent(&self, weight: f64, impedance: f64) -> f64 {
        let female = self.profile.is_female();
        let male = self.profile.is_male();
        let age = self.profile.age;
        let height = self.height();

        let mut lbm_subtraction = 0.8;
        if female && age <= 49 {
            lbm_subtraction = 9.25;
        }
        if female && age > 49 {
            lbm_subtraction = 7.25;
        }

        let lbm = self.lean_body_mass_coefficient(weight, impedance);

        // Checked in order; a later match overwrites an earlier one.
        let mut coefficient = 1.0;
        if male && weight < 61.0 {
            coefficient = 0.98;
        }
        if female && weight > 60.0 {
            coefficient = 0.96;
            if height > 160.0 {
                coefficient *= 1.03;
            }
        }
        if female && weight < 50.0 {
            coefficient = 1.02;
            if height > 160.0 {
                coefficient *= 1.03;
            }
        }

        let body_fat = (1.0 - (((lbm - lbm_subtraction) * coefficient) / weight)) * 100.0;

        if body_fat > BODY_FAT_LIMIT {
            BODY_FAT_SENTINEL
        } else {
            body_fat
        }
    }

    /// Visceral fat index
    ///
    /// For women below the weight threshold the reference algorithm reads
    /// `subcalc` without ever assigning it on that path. There is no defined
    /// value to reproduce, so that branch returns
    /// [`EnrichError::UndefinedIntermediate`].
    pub fn visceral_fat(&self, weight: f64) -> Result<f64, EnrichError> {
        let height = self.height();
        let age = self.age();

        if self.profile.is_female() {
            if weight > 13.0 - (height * 0.5) * -1.0 {
                let subsubcalc = ((height * 1.45) + (height * 0.1158) * height) - 120.0;
                let subcalc = weight * 500.0 / subsubcalc;
                Ok((subcalc - 6.0) + (age * 0.07))
            } else {
                Err(EnrichError::UndefinedIntermediate {
                    formula: "visceral_fat (female, weight <= 13 + height/2)",
                    name: "subcalc",
                })
            }
        } else if height < weight * 1.6 {
            let subcalc = ((height * 0.5) - (height * (height * 0.0826))) * -1.0;
            Ok(((weight * 305.0) / (subcalc + 48.0)) - 2.9 + (age * 0.15))
        } else {
            let subcalc = 0.765 + height * -0.0015;
            Ok((((height * 0.143) - (weight * subcalc)) * -1.0) + (age * 0.15) - 5.0)
        }
    }

    pub fn bone_mass_kg(&self, weight: f64, impedance: f64) -> f64 {
        let female = self.profile.is_female();
        let base = if female { 0.245691014 } else { 0.18016894 };

        let mut bone_mass =
            (base - (self.lean_body_mass_coefficient(weight, impedance) * 0.05158)) * -1.0;

        if bone_mass > 2.2 {
            bone_mass += 0.1;
        } else {
            bone_mass -= 0.1;
        }

        let limit = if female {
            BONE_MASS_LIMIT_FEMALE
        } else {
            BONE_MASS_LIMIT_MALE
        };
        if bone_mass > limit {
            BONE_MASS_SENTINEL
        } else {
            bone_mass
        }
    }

    pub fn muscle_mass_kg(&self, weight: f64, impedance: f64) -> f64 {
        let muscle_mass = weight
            - ((self.body_fat_percent(weight, impedance) * 0.01) * weight)
            - self.bone_mass_kg(weight, impedance);

        let limit = if self.profile.is_female() {
            MUSCLE_MASS_LIMIT_FEMALE
        } else {
            MUSCLE_MASS_LIMIT_MALE
        };
        if muscle_mass >= limit {
            MUSCLE_MASS_SENTINEL
        } else {
            muscle_mass
        }
    }

    pub fn water_percent(&self, weight: f64, impedance: f64) -> f64 {
        let water = (100.0 - self.body_fat_percent(weight, impedance)) * 0.7;
        let coefficient = if water < 50.0 { 1.02 } else { 0.98 };
        coefficient * water
    }
}
