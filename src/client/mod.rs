use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::models::reading::{DeviceError, ErrorKind, SensorReading};

pub mod hidraw;
pub mod serial;

/// The device answered, but not with something that can be turned into a reading.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("device not responding")]
    NotResponding,

    #[error("unrecognized device identity {0:?}")]
    UnknownIdentity(String),

    #[error("short measurement frame ({0} bytes)")]
    ShortFrame(usize),

    #[error("Cannot parse temperature/humidity from {0:?}")]
    UnparsableReply(String),
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("no hid/tty devices available")]
    NoDeviceNode,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl ReadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReadError::NoDeviceNode => ErrorKind::NoDeviceNode,
            ReadError::Io(_) | ReadError::Serial(_) | ReadError::Timeout(_) => ErrorKind::Transport,
            ReadError::Decode(_) => ErrorKind::Decode,
        }
    }
}

impl From<&ReadError> for DeviceError {
    fn from(error: &ReadError) -> Self {
        DeviceError {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// A `/dev` node picked for a sensor, tagged with the protocol it speaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceNode {
    Hid(PathBuf),
    Serial(PathBuf),
}

impl DeviceNode {
    pub fn classify(name: &str, dev_root: &Path) -> Option<Self> {
        let path = dev_root.join(name);
        if name.starts_with("hidraw") {
            Some(DeviceNode::Hid(path))
        } else if name.starts_with("tty") {
            Some(DeviceNode::Serial(path))
        } else {
            None
        }
    }

    /// Picks the lexically last of the sorted `nodes`.
    ///
    /// Sensors with two HID interfaces answer on the second one. This relies on
    /// the kernel numbering interfaces in order; a capability probe would be
    /// more robust.
    pub fn select(nodes: &[String], dev_root: &Path) -> Option<Self> {
        nodes.last().and_then(|name| Self::classify(name, dev_root))
    }

    pub fn path(&self) -> &Path {
        match self {
            DeviceNode::Hid(path) | DeviceNode::Serial(path) => path,
        }
    }

    /// Take one reading. The node is opened and closed within this call.
    pub async fn read(self) -> Result<SensorReading, ReadError> {
        match self {
            DeviceNode::Hid(path) => hidraw::read(&path).await,
            DeviceNode::Serial(path) => tokio::task::spawn_blocking(move || serial::read(&path))
                .await
                .map_err(io::Error::other)?,
        }
    }
}
