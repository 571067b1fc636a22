pub mod reading;
pub mod usb;

pub use reading::{DeviceError, ErrorKind, Outcome, SensorReading, SensorReport};
pub use usb::{IdParseError, UsbDevice, UsbId};
