use log::{debug, error, info};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{error::Elapsed, timeout};

use crate::client::{DeviceNode, ReadError};
use crate::identify::Identifier;
use crate::models::reading::{DeviceError, Outcome, SensorReading, SensorReport};
use crate::models::usb::UsbDevice;

/// A spawned device read, aborted when dropped. A cancelled cycle therefore
/// closes its nodes.
struct ReadTask(JoinHandle<Result<Result<SensorReading, ReadError>, Elapsed>>);

impl Drop for ReadTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

enum Pending {
    Failed(ReadError),
    Running(PathBuf, ReadTask),
}

/// Read every known sensor in `devices`.
///
/// Unknown devices are skipped. Each known device yields exactly one report,
/// in the order given, whether it was read or failed. Devices are read
/// concurrently since their nodes are disjoint; `device_timeout` bounds each.
pub(crate) async fn collect_readings(
    devices: &[UsbDevice],
    identifier: &Identifier,
    dev_root: &Path,
    device_timeout: Duration,
) -> Vec<SensorReport> {
    let start = Instant::now();

    let mut pending = Vec::new();
    for device in devices {
        if !identifier.is_known(device.vendor_id, device.product_id) {
            continue;
        }

        let task = match DeviceNode::select(&device.nodes, dev_root) {
            None => Pending::Failed(ReadError::NoDeviceNode),
            Some(node) => {
                debug!("Reading {} via {:?}", device.id(), node);
                let path = node.path().to_path_buf();
                let task = ReadTask(tokio::spawn(timeout(device_timeout, node.read())));
                Pending::Running(path, task)
            }
        };
        pending.push((device, task));
    }

    let mut reports = Vec::with_capacity(pending.len());
    for (device, task) in pending {
        let (node, result) = match task {
            Pending::Failed(e) => (None, Err(e)),
            Pending::Running(node, mut task) => {
                let result = match (&mut task.0).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_elapsed)) => Err(ReadError::Timeout(device_timeout)),
                    Err(join_error) => Err(ReadError::Io(io::Error::other(join_error))),
                };
                (Some(node), result)
            }
        };
        reports.push(report(device, node.as_deref(), result));
    }

    debug!(
        "collect_readings took: {} ms ({} sensors)",
        start.elapsed().as_millis(),
        reports.len()
    );
    reports
}

fn report(
    device: &UsbDevice,
    node: Option<&Path>,
    result: Result<SensorReading, ReadError>,
) -> SensorReport {
    let outcome = match result {
        Ok(reading) => {
            info!(
                "Bus {:03} Dev {:03} {} {} {:.2}C",
                device.busnum,
                device.devnum,
                device.id(),
                reading.identifier,
                reading.celsius
            );
            Outcome::Reading(reading)
        }
        Err(e) => {
            let mut record = DeviceError::from(&e);
            if let Some(node) = node {
                record.message = format!("{}: {}", node.display(), record.message);
            }
            error!(
                "Bus {:03} Dev {:03} {} Error: {}",
                device.busnum,
                device.devnum,
                device.id(),
                record.message
            );
            Outcome::Error(record)
        }
    };
    SensorReport::new(device, outcome)
}
