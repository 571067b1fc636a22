use serde::Serialize;

use crate::models::usb::UsbDevice;

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 1.8 + 32.0
}

/// One measurement taken from a sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    /// Firmware name reported by the device, e.g. `TEMPerF1.4`.
    pub identifier: String,
    pub celsius: f64,
    pub fahrenheit: f64,
    pub humidity: Option<f64>,
}

impl SensorReading {
    /// Fahrenheit is always derived from `celsius`.
    pub fn new(identifier: impl Into<String>, celsius: f64, humidity: Option<f64>) -> Self {
        Self {
            identifier: identifier.into(),
            celsius,
            fahrenheit: celsius_to_fahrenheit(celsius),
            humidity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoDeviceNode,
    Transport,
    Decode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceError {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Reading(SensorReading),
    Error(DeviceError),
}

/// Result of attempting one known device, tagged with its identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReport {
    pub busnum: u32,
    pub devnum: u32,
    pub vendor_id: u16,
    pub product_id: u16,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl SensorReport {
    pub fn new(device: &UsbDevice, outcome: Outcome) -> Self {
        Self {
            busnum: device.busnum,
            devnum: device.devnum,
            vendor_id: device.vendor_id,
            product_id: device.product_id,
            outcome,
        }
    }

    pub fn reading(&self) -> Option<&SensorReading> {
        match &self.outcome {
            Outcome::Reading(reading) => Some(reading),
            Outcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&DeviceError> {
        match &self.outcome {
            Outcome::Reading(_) => None,
            Outcome::Error(error) => Some(error),
        }
    }
}
