use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Read a sysfs attribute file such as `idVendor` or `busnum`.
///
/// Returns the trimmed content, or `None` if the file is missing, unreadable
/// or not valid UTF-8. Attributes vanish when a device is unplugged mid-scan,
/// so callers decide whether absence matters.
pub fn read_attribute(file: &Path) -> Option<String> {
    let mut reader = String::with_capacity(16);
    let mut f = File::open(file).ok()?;
    f.read_to_string(&mut reader).ok()?;
    // sysfs pads some attributes with `\0` as well as a trailing newline.
    Some(reader.trim_matches(|c: char| c.is_whitespace() || c == '\0').to_string())
}

/// Parse a base-16 attribute like `0c45`. A `0x` prefix is tolerated.
pub fn parse_hex_u16(value: &str) -> Option<u16> {
    let value = value.trim();
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u16::from_str_radix(digits, 16).ok()
}

/// Parse a base-10 attribute like `busnum`.
pub fn parse_decimal<N>(value: &str) -> Option<N>
where
    N: FromStr,
{
    value.trim().parse().ok()
}
