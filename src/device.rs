//! Device reader interface
//!
//! Field reads are independent: one failing metric never prevents the others
//! from being sampled. [`capture`] folds per-field results into a
//! [`Reading`], turning errors into [`FieldValue::Unavailable`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

use crate::reading::{DeviceId, FieldValue, MeterFields, Metric, Reading};

#[derive(Debug, Error)]
pub enum FieldReadError {
    #[error("device {device} did not respond")]
    NoResponse { device: DeviceId },

    #[error("invalid response from device {device}: {message}")]
    InvalidResponse { device: DeviceId, message: String },

    #[error("bus error: {0}")]
    Bus(String),
}

/// Source of metric values for field devices
#[async_trait]
pub trait DeviceReader: Send + Sync {
    /// Read one metric from one device
    async fn read_field(&self, device: DeviceId, metric: Metric) -> Result<f64, FieldReadError>;
}

/// Outcome of polling one device
#[derive(Debug, Clone)]
pub struct Capture {
    pub reading: Reading,
    pub failed_fields: usize,
}

/// Poll every metric of `device` and build a reading stamped `timestamp`
pub async fn capture(
    reader: &dyn DeviceReader,
    device: DeviceId,
    timestamp: DateTime<Utc>,
) -> Capture {
    let mut fields = MeterFields::default();
    let mut failed_fields = 0;

    for metric in Metric::ALL {
        let value = match reader.read_field(device, metric).await {
            Ok(value) => FieldValue::Value(value),
            Err(e) => {
                warn!(device_id = %device, %metric, error = %e, "Field read failed");
                failed_fields += 1;
                FieldValue::Unavailable
            }
        };
        fields.set(metric, value);
    }

    Capture {
        reading: Reading::new(timestamp, device, fields),
        failed_fields,
    }
}

/// Bench reader returning fixed nominal values
///
/// Stands in for the bus driver during development. Individual
/// (device, metric) pairs can be made to fail.
#[derive(Debug)]
pub struct SimulatedReader {
    nominal: MeterFields,
    failing: Mutex<HashSet<(DeviceId, Metric)>>,
}

impl SimulatedReader {
    pub fn new(nominal: MeterFields) -> Self {
        Self {
            nominal,
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Make every read of `metric` on `device` fail
    pub fn fail_field(&self, device: DeviceId, metric: Metric) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((device, metric));
    }
}

impl Default for SimulatedReader {
    fn default() -> Self {
        Self::new(MeterFields {
            avg_vln: FieldValue::Value(230.0),
            avg_current: FieldValue::Value(5.0),
            kwh: FieldValue::Value(1000.0),
            avg_pf: FieldValue::Value(0.95),
        })
    }
}

#[async_trait]
impl DeviceReader for SimulatedReader {
    async fn read_field(&self, device: DeviceId, metric: Metric) -> Result<f64, FieldReadError> {
        let failing = self
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&(device, metric));
        if failing {
            return Err(FieldReadError::NoResponse { device });
        }

        self.nominal
            .get(metric)
            .value()
            .ok_or_else(|| FieldReadError::InvalidResponse {
                device,
                message: format!("no nominal value for {metric}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_capture_all_fields() {
        let reader = SimulatedReader::default();
        let now = Utc::now();

        let capture = capture(&reader, DeviceId(7), now).await;

        assert_eq!(capture.failed_fields, 0);
        assert_eq!(capture.reading.device_id, DeviceId(7));
        assert_eq!(capture.reading.timestamp, now);
        assert_eq!(capture.reading.fields.avg_vln, FieldValue::Value(230.0));
        assert_eq!(capture.reading.fields.avg_pf, FieldValue::Value(0.95));
    }

    #[tokio::test]
    async fn test_capture_partial_failure() {
        let reader = SimulatedReader::default();
        reader.fail_field(DeviceId(7), Metric::Kwh);

        let capture = capture(&reader, DeviceId(7), Utc::now()).await;

        assert_eq!(capture.failed_fields, 1);
        assert_eq!(capture.reading.fields.kwh, FieldValue::Unavailable);
        assert_eq!(capture.reading.fields.avg_current, FieldValue::Value(5.0));

        let other = super::capture(&reader, DeviceId(8), Utc::now()).await;
        assert_eq!(other.failed_fields, 0);
    }
}
