//! Scale measurement records
//!
//! A record is an arbitrary JSON object as emitted by the scale scanner, e.g.
//! `{"source":"hat-mibcs","address":"..","datetime":"..","weight":80.1,"impedance":512}`.
//! Only `weight` and `impedance` are interpreted; every other key is carried
//! through untouched and in its original position.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EnrichError;

pub const WEIGHT_KEY: &str = "weight";
pub const IMPEDANCE_KEY: &str = "impedance";

/// Typed view of the fields the formulas need
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Body weight in kilograms
    pub weight: f64,
    /// Bioelectrical impedance in ohms
    pub impedance: f64,
}

/// One line of input, as an order-preserving JSON object
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScaleRecord {
    fields: Map<String, Value>,
}

impl ScaleRecord {
    /// Parse a single NDJSON line
    pub fn parse(line: &str) -> Result<Self, EnrichError> {
        Self::parse_slice(line.as_bytes())
    }

    /// Parse a single raw NDJSON line; invalid UTF-8 is a JSON error
    pub fn parse_slice(line: &[u8]) -> Result<Self, EnrichError> {
        match serde_json::from_slice::<Value>(line)? {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(EnrichError::NotAnObject(json_kind(&other))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Impedance, if one was measured. Absent and `null` both mean "not measured".
    pub fn impedance(&self) -> Result<Option<f64>, EnrichError> {
        match self.fields.get(IMPEDANCE_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => number(IMPEDANCE_KEY, value).map(Some),
        }
    }

    pub fn weight(&self) -> Result<f64, EnrichError> {
        match self.fields.get(WEIGHT_KEY) {
            None | Some(Value::Null) => Err(EnrichError::MissingField(WEIGHT_KEY.to_string())),
            Some(value) => number(WEIGHT_KEY, value),
        }
    }

    /// The measurement to enrich, or `None` when no impedance was taken.
    ///
    /// `weight` is only required once an impedance is present.
    pub fn measurement(&self) -> Result<Option<Measurement>, EnrichError> {
        let Some(impedance) = self.impedance()? else {
            return Ok(None);
        };

        Ok(Some(Measurement {
            weight: self.weight()?,
            impedance,
        }))
    }

    /// Set a numeric field. Existing keys keep their position, new keys are appended.
    /// Non-finite values become `null`.
    pub fn set_number(&mut self, key: &str, value: f64) {
        self.fields.insert(key.to_string(), Value::from(value));
    }

    pub fn to_json_line(&self) -> Result<String, EnrichError> {
        Ok(serde_json::to_string(&self.fields)?)
    }
}

fn number(field: &str, value: &Value) -> Result<f64, EnrichError> {
    value.as_f64().ok_or_else(|| EnrichError::InvalidField {
        field: field.to_string(),
        expected: "number",
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
