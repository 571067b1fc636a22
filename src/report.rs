use anyhow::{Context, Result};
use serde::Serialize;

use crate::identify::{Identifier, KnownModel, Protocol};
use crate::models::reading::{Outcome, SensorReport};
use crate::models::usb::UsbDevice;

/// A device as shown by `--list`.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceListing<'a> {
    #[serde(flatten)]
    pub device: &'a UsbDevice,
    pub known: bool,
    pub model: Option<KnownModel>,
    /// How the model is read; absent for devices outside the table.
    pub protocol: Option<Protocol>,
    pub humidity: Option<bool>,
}

pub fn listings<'a>(devices: &'a [UsbDevice], identifier: &Identifier) -> Vec<DeviceListing<'a>> {
    devices
        .iter()
        .map(|device| {
            let model = identifier.model(device.vendor_id, device.product_id);
            DeviceListing {
                device,
                known: identifier.is_known(device.vendor_id, device.product_id),
                model,
                protocol: model.map(KnownModel::protocol),
                humidity: model.map(KnownModel::has_humidity),
            }
        })
        .collect()
}

// Bus 001 Dev 004 0c45:7401 * TEMPerV1.4 ["hidraw0", "hidraw1"]
pub fn listing_line(listing: &DeviceListing) -> String {
    let device = listing.device;
    format!(
        "Bus {:03} Dev {:03} {} {} {} {:?}",
        device.busnum,
        device.devnum,
        device.id(),
        if listing.known { '*' } else { ' ' },
        device.product_name.as_deref().unwrap_or("???"),
        device.nodes
    )
}

// Bus 001 Dev 004 413d:2107 TEMPerX_V3.1 25.00C 77.00F 45.00%
pub fn report_line(report: &SensorReport) -> String {
    let prefix = format!(
        "Bus {:03} Dev {:03} {:04x}:{:04x}",
        report.busnum, report.devnum, report.vendor_id, report.product_id
    );

    match &report.outcome {
        Outcome::Reading(reading) => {
            let mut line = format!(
                "{} {} {:.2}C {:.2}F",
                prefix, reading.identifier, reading.celsius, reading.fahrenheit
            );
            if let Some(humidity) = reading.humidity {
                line.push_str(&format!(" {:.2}%", humidity));
            }
            line
        }
        Outcome::Error(error) => format!("{} Error: {}", prefix, error.message),
    }
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output")
}
