use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_FILE;
use crate::models::usb::UsbId;

pub const USAGE: &str = "\
usage: temper [-h] [-l] [--force VENDOR_ID:PRODUCT_ID] [--json] [-c CONFIG]

  -h, --help        show this help message and exit
  -l, --list        List all USB devices
  --force ID        Force the use of the hex id; ignore other ids
  --json            Print JSON instead of text
  -c, --config PATH Configuration file (default: temper.ini)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    List,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub action: Action,
    pub force: Option<UsbId>,
    pub json: bool,
    pub config: PathBuf,
}

impl Default for Invocation {
    fn default() -> Self {
        Self {
            action: Action::Read,
            force: None,
            json: false,
            config: PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }
}

impl Invocation {
    /// Parse arguments, program name excluded.
    ///
    /// A malformed `--force` id is an error here; nothing is read with it.
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut invocation = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => invocation.action = Action::Help,
                "-l" | "--list" => {
                    if invocation.action != Action::Help {
                        invocation.action = Action::List;
                    }
                }
                "--json" => invocation.json = true,
                "--force" => {
                    let value = args.next().ok_or_else(|| anyhow!("--force needs VENDOR_ID:PRODUCT_ID"))?;
                    invocation.force = Some(value.parse()?);
                }
                "-c" | "--config" => {
                    let value = args.next().ok_or_else(|| anyhow!("{} needs a path", arg))?;
                    invocation.config = PathBuf::from(value);
                }
                other => {
                    if let Some(value) = other.strip_prefix("--force=") {
                        invocation.force = Some(value.parse()?);
                    } else {
                        bail!("unrecognized argument: {}", other);
                    }
                }
            }
        }

        Ok(invocation)
    }
}
