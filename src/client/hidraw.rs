//! # TEMPer HID Protocol
//!
//! The HID models are driven through the kernel `hidraw` interface with
//! 8-byte output reports. Answers come back as a burst of 8-byte input
//! reports with no length prefix, so the end of an answer is detected by
//! 100ms of silence.
//!
//! ## Identity request
//!
//! | Offset | Content                      |
//! |--------|------------------------------|
//! | 0      | 0x01                         |
//! | 1      | 0x86: read firmware identity |
//! | 2-3    | 0xff 0x01                    |
//! | 4-7    | 0x00 0x00 0x00 0x00          |
//!
//! Response: ASCII firmware name, e.g. `TEMPerF1.4` or `TEMPerX_V3.1`,
//! spread over two or more reports.
//!
//! ## Measurement request
//!
//! | Offset | Content                      |
//! |--------|------------------------------|
//! | 0      | 0x01                         |
//! | 1      | 0x80: read sensors           |
//! | 2-3    | 0x33 0x01                    |
//! | 4-7    | 0x00 0x00 0x00 0x00          |
//!
//! Response:
//!
//! | Offset | TEMPerF1.4             | TEMPerX_V3.1           |
//! |--------|------------------------|------------------------|
//! | 2-3    | °C × 256 (i16, BE)     | °C × 100 (i16, BE)     |
//! | 4-5    | -                      | %RH × 100 (i16, BE)    |

use log::debug;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::unix::AsyncFd;
use tokio::time::timeout;

use crate::client::{DecodeError, ReadError};
use crate::identify::KnownModel;
use crate::models::reading::SensorReading;

pub const FRAME_LEN: usize = 8;
pub const IDENTITY_REQUEST: [u8; FRAME_LEN] = [0x01, 0x86, 0xff, 0x01, 0x00, 0x00, 0x00, 0x00];
pub const MEASUREMENT_REQUEST: [u8; FRAME_LEN] = [0x01, 0x80, 0x33, 0x01, 0x00, 0x00, 0x00, 0x00];
pub const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Report exchange with a HID sensor.
pub(crate) trait ReportChannel {
    async fn send(&mut self, frame: &[u8; FRAME_LEN]) -> io::Result<()>;

    /// Collect input reports until none arrives within [POLL_TIMEOUT].
    async fn drain(&mut self) -> io::Result<Vec<u8>>;
}

/// An open `/dev/hidrawN`. Closed when dropped.
pub struct HidrawDevice {
    fd: AsyncFd<File>,
}

impl HidrawDevice {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;
        Ok(Self {
            fd: AsyncFd::new(file)?,
        })
    }
}

impl ReportChannel for HidrawDevice {
    async fn send(&mut self, frame: &[u8; FRAME_LEN]) -> io::Result<()> {
        loop {
            let mut guard = self.fd.writable().await?;
            match guard.try_io(|inner| {
                let mut file = inner.get_ref();
                file.write(frame)
            }) {
                Ok(Ok(n)) if n == frame.len() => return Ok(()),
                Ok(Ok(n)) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("short report write ({} of {} bytes)", n, frame.len()),
                    ))
                }
                Ok(Err(e)) => return Err(e),
                Err(_would_block) => continue,
            }
        }
    }

    async fn drain(&mut self) -> io::Result<Vec<u8>> {
        let mut data = Vec::new();
        loop {
            let mut guard = match timeout(POLL_TIMEOUT, self.fd.readable()).await {
                Ok(guard) => guard?,
                Err(_elapsed) => break,
            };

            let mut buf = [0u8; FRAME_LEN];
            match guard.try_io(|inner| {
                let mut file = inner.get_ref();
                file.read(&mut buf)
            }) {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => data.extend_from_slice(&buf[..n]),
                Ok(Err(e)) => return Err(e),
                Err(_would_block) => continue,
            }
        }
        Ok(data)
    }
}

fn be_i16(frame: &[u8], offset: usize) -> Result<i16, DecodeError> {
    frame
        .get(offset..offset + 2)
        .map(|b| i16::from_be_bytes([b[0], b[1]]))
        .ok_or(DecodeError::ShortFrame(frame.len()))
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Turn the identity and measurement answers into a reading.
pub fn decode(identity: &[u8], measurement: &[u8]) -> Result<SensorReading, DecodeError> {
    if identity.is_empty() {
        return Err(DecodeError::NotResponding);
    }

    let f14 = KnownModel::TemperF14.firmware();
    if identity.starts_with(f14.as_bytes()) {
        let celsius = f64::from(be_i16(measurement, 2)?) / 256.0;
        return Ok(SensorReading::new(f14, celsius, None));
    }

    let x31 = KnownModel::TemperXV31.firmware();
    if identity.starts_with(x31.as_bytes()) {
        let celsius = f64::from(be_i16(measurement, 2)?) / 100.0;
        let humidity = f64::from(be_i16(measurement, 4)?) / 100.0;
        return Ok(SensorReading::new(x31, celsius, Some(humidity)));
    }

    let shown = latin1(identity);
    Err(DecodeError::UnknownIdentity(
        shown.trim_end_matches('\0').to_string(),
    ))
}

pub(crate) async fn exchange<C: ReportChannel>(channel: &mut C) -> Result<SensorReading, ReadError> {
    channel.send(&IDENTITY_REQUEST).await?;
    let identity = channel.drain().await?;
    if identity.is_empty() {
        return Err(DecodeError::NotResponding.into());
    }

    channel.send(&MEASUREMENT_REQUEST).await?;
    let measurement = channel.drain().await?;
    debug!(
        "hidraw identity {:02x?}, measurement {:02x?}",
        identity, measurement
    );

    Ok(decode(&identity, &measurement)?)
}

pub async fn read(path: &Path) -> Result<SensorReading, ReadError> {
    let start = Instant::now();
    let mut device = HidrawDevice::open(path)?;
    let result = exchange(&mut device).await;
    debug!(
        "hidraw read of {} took: {} ms",
        path.display(),
        start.elapsed().as_millis()
    );
    result
}
