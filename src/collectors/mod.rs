pub(crate) mod collector;
pub mod nodes;
pub mod usb;
