//! Transfer model: the validated, strongly-typed view of one raw ERP record.
//!
//! Instances are built from a page item on the import side, serialized onto
//! the queue, and rebuilt on the consumer side. Required fields have no serde
//! default, so a missing key fails the build as a structural error. The
//! upstream feed is loosely typed (numbers arrive as strings, flags as
//! `"true"`), which the `de_*` helpers absorb.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("malformed record payload: {0}")]
    Structure(#[from] serde_json::Error),
    #[error("required field `{0}` is blank")]
    Blank(&'static str),
    #[error("unknown section, external id {0}")]
    UnknownSection(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferModel {
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "de_i64")]
    pub code: i64,
    pub section: String,
    #[serde(deserialize_with = "de_i64")]
    pub limit: i64,
    pub discounts: Vec<DiscountEntry>,
    pub price: Vec<PriceEntry>,
    pub units: Vec<UnitEntry>,
    pub balance: Vec<BalanceEntry>,
    pub set: Vec<SetEntry>,
    pub properties: Vec<PropertyEntry>,
    pub unifying_properties: Vec<PropertyEntry>,
    pub badge: Vec<BadgeEntry>,
    pub on_order: Vec<OnOrderEntry>,
    pub barcodes: Vec<String>,
    pub related: Vec<IdRef>,
    pub additional: Vec<IdRef>,
    pub search: String,
    #[serde(default)]
    pub points_multiplier: Vec<PointsEntry>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub additional_points: Option<String>,
    #[serde(default)]
    pub vendor_code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tnved: Option<String>,
    #[serde(default)]
    pub tru: Option<String>,
    #[serde(default)]
    pub is_dimensional: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    #[serde(rename = "type")]
    pub price_type: String,
    #[serde(deserialize_with = "de_f64")]
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountEntry {
    #[serde(rename = "type")]
    pub price_type: String,
    #[serde(deserialize_with = "de_f64")]
    pub value: f64,
    #[serde(deserialize_with = "de_f64")]
    pub max_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitEntry {
    pub name: String,
    #[serde(deserialize_with = "de_f64")]
    pub coefficient: f64,
    #[serde(default, deserialize_with = "de_bool")]
    pub base: bool,
    #[serde(default, deserialize_with = "de_bool")]
    pub calc: bool,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub weight: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub stock: String,
    #[serde(deserialize_with = "de_f64")]
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetEntry {
    pub id: String,
    #[serde(deserialize_with = "de_f64")]
    pub value: f64,
    #[serde(rename = "default", default, deserialize_with = "de_bool")]
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyEntry {
    pub id: String,
    #[serde(default, deserialize_with = "de_string")]
    pub value: String,
    #[serde(default)]
    pub is_filter: bool,
    #[serde(default)]
    pub is_characteristic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeEntry {
    #[serde(default, deserialize_with = "de_string")]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnOrderEntry {
    pub enabled: bool,
    #[serde(default, deserialize_with = "de_string")]
    pub days_count: String,
    #[serde(default)]
    pub supply: Vec<SupplyEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyEntry {
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsEntry {
    pub status: String,
    #[serde(deserialize_with = "de_f64")]
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: String,
}

impl TransferModel {
    /// Builds and validates a model from one raw page item.
    pub fn build_from_value(value: &Value) -> Result<Self, BuildError> {
        let model: Self = serde_json::from_value(value.clone())?;
        model.ensure_not_blank()?;
        Ok(model)
    }

    /// Builds and validates a model from a queue message payload.
    pub fn build_from_str(payload: &str) -> Result<Self, BuildError> {
        let model: Self = serde_json::from_str(payload)?;
        model.ensure_not_blank()?;
        Ok(model)
    }

    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn ensure_not_blank(&self) -> Result<(), BuildError> {
        for (field, value) in [
            ("id", &self.id),
            ("name", &self.name),
            ("section", &self.section),
        ] {
            if value.trim().is_empty() {
                return Err(BuildError::Blank(field));
            }
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn de_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("number out of f64 range")),
        Value::String(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
        Value::Null => Ok(0.0),
        other => Err(serde::de::Error::custom(format!(
            "expected number or numeric string, got {other}"
        ))),
    }
}

fn de_opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "expected number or numeric string, got {other}"
        ))),
    }
}

fn de_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom("number out of i64 range")),
        Value::String(s) => s.trim().parse::<i64>().map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "expected integer or numeric string, got {other}"
        ))),
    }
}

// The feed marks flags as real booleans or the string "true"; anything else
// reads as false.
fn de_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::String(s) => s == "true",
        _ => false,
    })
}

fn de_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn de_opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
