use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::utils::sysfs::parse_hex_u16;

/// A USB `vendor:product` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UsbId {
    pub vendor: u16,
    pub product: u16,
}

impl UsbId {
    pub const fn new(vendor: u16, product: u16) -> Self {
        Self { vendor, product }
    }
}

impl fmt::Display for UsbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor, self.product)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Cannot parse hexadecimal id: {0}")]
pub struct IdParseError(pub String);

impl FromStr for UsbId {
    type Err = IdParseError;

    /// Parses `VENDOR_ID:PRODUCT_ID`, both halves hexadecimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || IdParseError(s.to_string());
        let (vendor, product) = s.split_once(':').ok_or_else(err)?;
        if product.contains(':') {
            return Err(err());
        }
        let vendor = parse_hex_u16(vendor).ok_or_else(err)?;
        let product = parse_hex_u16(product).ok_or_else(err)?;
        Ok(Self { vendor, product })
    }
}

/// Snapshot of one device found under the sysfs USB root.
///
/// Built once per enumeration pass and never updated; a later scan produces
/// fresh values instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsbDevice {
    pub path: PathBuf,
    pub busnum: u32,
    pub devnum: u32,
    pub vendor_id: u16,
    pub product_id: u16,
    pub vendor_name: Option<String>,
    pub product_name: Option<String>,
    /// `hidrawN` / `tty*` entries below the device, sorted.
    pub nodes: Vec<String>,
}

impl UsbDevice {
    pub fn id(&self) -> UsbId {
        UsbId::new(self.vendor_id, self.product_id)
    }

    /// Presentation order key: `busnum * 1000 + devnum`.
    pub fn sort_key(&self) -> u64 {
        u64::from(self.busnum) * 1000 + u64::from(self.devnum)
    }
}

pub fn sort_canonical(devices: &mut [UsbDevice]) {
    devices.sort_by_key(UsbDevice::sort_key);
}
