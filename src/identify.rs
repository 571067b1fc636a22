use serde::Serialize;

use crate::models::usb::UsbId;

/// How a model is read once it has been found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// 8-byte reports over `/dev/hidrawN`.
    Hid,
    /// ASCII commands over `/dev/tty*`.
    Serial,
}

/// The sensors this program knows how to talk to.
///
/// Serialized as the firmware name, matching [KnownModel::firmware].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KnownModel {
    /// Metal USB stick marked "TEMPer". No humidity sensor.
    #[serde(rename = "TEMPerF1.4")]
    TemperF14,
    /// White "TEMPerHUM" stick with a blue "TXT" button, no external jack.
    #[serde(rename = "TEMPerX_V3.1")]
    TemperXV31,
    /// White "TEMPerX232" stick with a green button and an external sensor jack.
    /// Must be switched to serial mode (green LED flashing) to be read.
    #[serde(rename = "TEMPerX232_V2.0")]
    TemperX232V20,
}

impl KnownModel {
    pub const ALL: [KnownModel; 3] = [
        KnownModel::TemperF14,
        KnownModel::TemperXV31,
        KnownModel::TemperX232V20,
    ];

    pub const fn id(self) -> UsbId {
        match self {
            KnownModel::TemperF14 => UsbId::new(0x0c45, 0x7401),
            KnownModel::TemperXV31 => UsbId::new(0x413d, 0x2107),
            KnownModel::TemperX232V20 => UsbId::new(0x1a86, 0x5523),
        }
    }

    /// Firmware identifier the device reports about itself.
    pub const fn firmware(self) -> &'static str {
        match self {
            KnownModel::TemperF14 => "TEMPerF1.4",
            KnownModel::TemperXV31 => "TEMPerX_V3.1",
            KnownModel::TemperX232V20 => "TEMPerX232_V2.0",
        }
    }

    pub const fn protocol(self) -> Protocol {
        match self {
            KnownModel::TemperF14 | KnownModel::TemperXV31 => Protocol::Hid,
            KnownModel::TemperX232V20 => Protocol::Serial,
        }
    }

    pub const fn has_humidity(self) -> bool {
        !matches!(self, KnownModel::TemperF14)
    }

    pub fn from_id(id: UsbId) -> Option<Self> {
        Self::ALL.into_iter().find(|model| model.id() == id)
    }
}

/// Decides which attached USB devices are sensors.
///
/// With a forced id only that exact pair is accepted and the built-in table is
/// ignored entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identifier {
    forced: Option<UsbId>,
}

impl Identifier {
    pub fn new(forced: Option<UsbId>) -> Self {
        Self { forced }
    }

    pub fn forced(&self) -> Option<UsbId> {
        self.forced
    }

    pub fn is_known(&self, vendor: u16, product: u16) -> bool {
        let id = UsbId::new(vendor, product);
        match self.forced {
            Some(forced) => forced == id,
            None => KnownModel::from_id(id).is_some(),
        }
    }

    /// Table entry for the pair, if it is both known and in the table.
    ///
    /// A forced id outside the table is known but has no model.
    pub fn model(&self, vendor: u16, product: u16) -> Option<KnownModel> {
        if !self.is_known(vendor, product) {
            return None;
        }
        KnownModel::from_id(UsbId::new(vendor, product))
    }
}
