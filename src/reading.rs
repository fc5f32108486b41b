//! Reading data model and the collector payload format
//!
//! A [`Reading`] is captured once per device per cycle. Once written to the
//! ledger it becomes a [`StoredReading`] with a local id, an origin tag and a
//! delivery flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Local identifier assigned by the ledger on insert
pub type ReadingId = u64;

/// Bus address of a field device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metrics sampled from every device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    AvgVln,
    AvgCurrent,
    Kwh,
    AvgPf,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::AvgVln, Metric::AvgCurrent, Metric::Kwh, Metric::AvgPf];

    /// Label used in the collector payload
    pub fn label(&self) -> &'static str {
        match self {
            Metric::AvgVln => "Avg VLN",
            Metric::AvgCurrent => "Avg Current",
            Metric::Kwh => "kWh",
            Metric::AvgPf => "Avg PF",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One metric value; `Unavailable` when the field read failed
///
/// Serialized as a number or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum FieldValue {
    Value(f64),
    #[default]
    Unavailable,
}

impl FieldValue {
    pub fn is_available(&self) -> bool {
        matches!(self, FieldValue::Value(_))
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            FieldValue::Value(v) => Some(*v),
            FieldValue::Unavailable => None,
        }
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) => FieldValue::Value(v),
            None => FieldValue::Unavailable,
        }
    }
}

impl From<FieldValue> for Option<f64> {
    fn from(value: FieldValue) -> Self {
        value.value()
    }
}

/// Fixed set of metric fields captured for a device
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MeterFields {
    #[serde(rename = "Avg VLN")]
    pub avg_vln: FieldValue,
    #[serde(rename = "Avg Current")]
    pub avg_current: FieldValue,
    #[serde(rename = "kWh")]
    pub kwh: FieldValue,
    #[serde(rename = "Avg PF")]
    pub avg_pf: FieldValue,
}

impl MeterFields {
    pub fn get(&self, metric: Metric) -> FieldValue {
        match metric {
            Metric::AvgVln => self.avg_vln,
            Metric::AvgCurrent => self.avg_current,
            Metric::Kwh => self.kwh,
            Metric::AvgPf => self.avg_pf,
        }
    }

    pub fn set(&mut self, metric: Metric, value: FieldValue) {
        match metric {
            Metric::AvgVln => self.avg_vln = value,
            Metric::AvgCurrent => self.avg_current = value,
            Metric::Kwh => self.kwh = value,
            Metric::AvgPf => self.avg_pf = value,
        }
    }

    /// Number of fields that could not be read
    pub fn unavailable_count(&self) -> usize {
        Metric::ALL
            .iter()
            .filter(|m| !self.get(**m).is_available())
            .count()
    }
}

/// One timestamped sample from one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "meter_id")]
    pub device_id: DeviceId,
    #[serde(flatten)]
    pub fields: MeterFields,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, device_id: DeviceId, fields: MeterFields) -> Self {
        Self {
            timestamp,
            device_id,
            fields,
        }
    }
}

/// Delivery attempt context recorded when a reading is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Published immediately after capture
    Live,
    /// Buffered for a later resend
    Offline,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Live => "live",
            Origin::Offline => "offline",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reading as persisted in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReading {
    pub id: ReadingId,
    #[serde(flatten)]
    pub reading: Reading,
    pub origin: Origin,
    pub delivered: bool,
}

impl StoredReading {
    /// Collector payload for a resend of this record
    pub fn payload(&self) -> serde_json::Result<Vec<u8>> {
        encode_payload(&self.reading, self.origin)
    }
}

#[derive(Serialize)]
struct Payload<'a> {
    #[serde(flatten)]
    reading: &'a Reading,
    source: Origin,
}

/// Serialize a reading into the JSON payload published to the collector
///
/// Live and resend paths share this encoding, so a resent record only
/// differs from its live form in `source`.
pub fn encode_payload(reading: &Reading, origin: Origin) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&Payload {
        reading,
        source: origin,
    })
}
