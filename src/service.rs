use log::info;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::collectors::collector::collect_readings;
use crate::collectors::usb::{collect_devices, ProbeError};
use crate::config::SensorsConfig;
use crate::identify::Identifier;
use crate::models::reading::SensorReport;
use crate::models::usb::UsbDevice;

/// Entry point for listing and reading sensors.
///
/// Hardware access is not reentrant, so each discovery + read cycle holds an
/// exclusive lock. Every call rescans the USB tree.
pub struct SensorService {
    usb_root: PathBuf,
    dev_root: PathBuf,
    device_timeout: Duration,
    identifier: Identifier,
    cycle: Mutex<()>,
}

impl SensorService {
    pub fn new(config: &SensorsConfig) -> Self {
        Self {
            usb_root: config.usb_root.clone(),
            dev_root: config.dev_root.clone(),
            device_timeout: config.device_timeout(),
            identifier: Identifier::new(config.force),
            cycle: Mutex::new(()),
        }
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// All USB devices, known or not, in bus/dev order.
    pub async fn list(&self) -> Result<Vec<UsbDevice>, ProbeError> {
        let _cycle = self.cycle.lock().await;
        collect_devices(&self.usb_root)
    }

    /// One report per known sensor, in bus/dev order.
    pub async fn read(&self) -> Result<Vec<SensorReport>, ProbeError> {
        let _cycle = self.cycle.lock().await;
        let devices = collect_devices(&self.usb_root)?;
        let reports = collect_readings(
            &devices,
            &self.identifier,
            &self.dev_root,
            self.device_timeout,
        )
        .await;
        info!(
            "Read {} sensors ({} failed)",
            reports.len(),
            reports.iter().filter(|r| r.error().is_some()).count()
        );
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::hidraw::tests::make_fifo;
    use crate::collectors::usb::tests::fake_device;
    use crate::models::reading::ErrorKind;
    use crate::models::usb::UsbId;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::oneshot;

    fn config(sys: &TempDir, dev: &TempDir) -> SensorsConfig {
        SensorsConfig {
            usb_root: sys.path().to_path_buf(),
            dev_root: dev.path().to_path_buf(),
            ..SensorsConfig::default()
        }
    }

    #[tokio::test]
    async fn test_list_rescans() {
        let sys = TempDir::new().unwrap();
        let dev = TempDir::new().unwrap();
        fake_device(sys.path(), "usb1", "1d6b", "0002", 1, 1, &[]);
        let service = SensorService::new(&config(&sys, &dev));

        assert_eq!(service.list().await.unwrap().len(), 1);

        fake_device(sys.path(), "1-2", "0c45", "7401", 1, 2, &["hidraw0"]);
        let devices = service.list().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].id(), UsbId::new(0x0c45, 0x7401));
    }

    #[tokio::test]
    async fn test_read_reports_known_devices() {
        let sys = TempDir::new().unwrap();
        let dev = TempDir::new().unwrap();
        fake_device(sys.path(), "usb1", "1d6b", "0002", 1, 1, &[]);
        fake_device(sys.path(), "1-2", "0c45", "7401", 1, 2, &[]);
        let service = SensorService::new(&config(&sys, &dev));

        let reports = service.read().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].error().unwrap().kind, ErrorKind::NoDeviceNode);
    }

    #[tokio::test]
    async fn test_forced_id_from_config() {
        let sys = TempDir::new().unwrap();
        let dev = TempDir::new().unwrap();
        fake_device(sys.path(), "1-2", "0c45", "7401", 1, 2, &[]);
        let mut config = config(&sys, &dev);
        config.force = Some(UsbId::new(0x413d, 0x2107));
        let service = SensorService::new(&config);

        assert!(service.read().await.unwrap().is_empty());
        assert_eq!(service.identifier().forced(), Some(UsbId::new(0x413d, 0x2107)));
    }

    #[tokio::test]
    async fn test_concurrent_cycles_are_serialized() {
        let sys = TempDir::new().unwrap();
        let dev = TempDir::new().unwrap();
        fake_device(sys.path(), "1-2", "0c45", "7401", 1, 2, &[]);
        let service = Arc::new(SensorService::new(&config(&sys, &dev)));

        let a = tokio::spawn({
            let service = service.clone();
            async move { service.read().await.map(|r| r.len()) }
        });
        let b = tokio::spawn({
            let service = service.clone();
            async move { service.read().await.map(|r| r.len()) }
        });

        assert_eq!(a.await.unwrap().unwrap(), 1);
        assert_eq!(b.await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_read_closes_device_node() {
        let sys = TempDir::new().unwrap();
        let dev = TempDir::new().unwrap();
        fake_device(sys.path(), "1-2", "0c45", "7401", 1, 2, &["hidraw0"]);
        let node = dev.path().join("hidraw0");
        make_fifo(&node);
        let mut config = config(&sys, &dev);
        config.device_timeout = 30;
        let service = SensorService::new(&config);

        // Keep the node busy so the drain never goes quiet. Writes fail once
        // the last reader has closed it.
        let (opened_tx, opened_rx) = oneshot::channel();
        let (closed_tx, closed_rx) = oneshot::channel();
        std::thread::spawn(move || {
            let mut feed = OpenOptions::new().write(true).open(&node).unwrap();
            let _ = opened_tx.send(());
            while feed.write_all(&[0x80; 8]).is_ok() {
                std::thread::sleep(Duration::from_millis(10));
            }
            let _ = closed_tx.send(());
        });

        let cancelled = tokio::time::timeout(Duration::from_millis(500), service.read()).await;
        assert!(cancelled.is_err());
        opened_rx.await.unwrap();

        let closed = tokio::time::timeout(Duration::from_secs(2), closed_rx).await;
        assert!(matches!(closed, Ok(Ok(()))), "device node still open after cancellation");

        // The cycle lock is free again.
        assert_eq!(service.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_usb_root_is_an_error() {
        let sys = TempDir::new().unwrap();
        let dev = TempDir::new().unwrap();
        let mut config = config(&sys, &dev);
        config.usb_root = sys.path().join("missing");
        let service = SensorService::new(&config);

        assert!(matches!(service.read().await, Err(ProbeError::Io { .. })));
    }
}
