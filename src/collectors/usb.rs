use log::{debug, warn};
use std::fs::read_dir;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

use crate::collectors::nodes::find_device_nodes;
use crate::models::usb::{sort_canonical, UsbDevice};
use crate::utils::sysfs::{parse_decimal, parse_hex_u16, read_attribute};

/// Kernel default for the USB device root.
pub const USB_DEVICES_PATH: &str = "/sys/bus/usb/devices";

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Malformed USB device {}: cannot read {attribute}", .path.display())]
    Malformed {
        path: PathBuf,
        attribute: &'static str,
    },

    #[error("Cannot list USB devices in {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Read out a USB device from its sysfs `folder`.
///
/// ## What is read:
///
/// - `idVendor`: hex. If missing the entry is not a device root (an interface,
///   a hub port, ...) and `Ok(None)` is returned.
/// - Mandatory once `idVendor` exists: `idProduct` (hex), `busnum` and
///   `devnum` (decimal). Missing or garbled values are a [ProbeError::Malformed].
/// - Optional: `manufacturer` and `product` strings.
/// - Every `hidrawN` / `tty*` node below the folder.
pub fn probe_device(folder: &Path) -> Result<Option<UsbDevice>, ProbeError> {
    let Some(vendor) = read_attribute(&folder.join("idVendor")) else {
        return Ok(None);
    };

    let malformed = |attribute| ProbeError::Malformed {
        path: folder.to_path_buf(),
        attribute,
    };

    let vendor_id = parse_hex_u16(&vendor).ok_or_else(|| malformed("idVendor"))?;
    let product_id = read_attribute(&folder.join("idProduct"))
        .and_then(|v| parse_hex_u16(&v))
        .ok_or_else(|| malformed("idProduct"))?;
    let busnum = read_attribute(&folder.join("busnum"))
        .and_then(|v| parse_decimal(&v))
        .ok_or_else(|| malformed("busnum"))?;
    let devnum = read_attribute(&folder.join("devnum"))
        .and_then(|v| parse_decimal(&v))
        .ok_or_else(|| malformed("devnum"))?;

    let vendor_name = read_attribute(&folder.join("manufacturer"));
    let product_name = read_attribute(&folder.join("product"));
    let nodes = find_device_nodes(folder).into_iter().collect();

    Ok(Some(UsbDevice {
        path: folder.to_path_buf(),
        busnum,
        devnum,
        vendor_id,
        product_id,
        vendor_name,
        product_name,
        nodes,
    }))
}

/// Enumerate every USB device below `root`, in canonical bus/dev order.
///
/// Nothing is cached: each call rescans so hot-plugged devices show up.
pub fn collect_devices(root: &Path) -> Result<Vec<UsbDevice>, ProbeError> {
    let start = Instant::now();
    let dir = read_dir(root).map_err(|source| ProbeError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    let mut devices = Vec::new();
    for entry in dir {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", root.display(), e);
                continue;
            }
        };

        // sysfs exposes devices as links, so follow them for this check only.
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        if let Some(device) = probe_device(&path)? {
            debug!(
                "Found {} at {} ({:?})",
                device.id(),
                path.display(),
                device.nodes
            );
            devices.push(device);
        }
    }

    sort_canonical(&mut devices);
    debug!(
        "collect_devices took: {} ms ({} devices)",
        start.elapsed().as_millis(),
        devices.len()
    );
    Ok(devices)
}
