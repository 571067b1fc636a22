use log::debug;
use regex::Regex;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, ErrorKind, Read, Write};
use std::path::Path;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use crate::client::{DecodeError, ReadError};
use crate::models::reading::SensorReading;

pub const BAUD_RATE: u32 = 9600;
pub const TIMEOUT: Duration = Duration::from_secs(2);

// Matches `Temp-Inner:30.53 [C],39.92 [%RH]<`. Only the two numbers matter.
static READ_TEMP_REPLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Temp-Inner:\s*(-?[0-9]+(?:\.[0-9]*)?)[^,]*,\s*(-?[0-9]+(?:\.[0-9]*)?)")
        .expect("reply pattern is valid")
});

/// Line oriented command/reply exchange with a serial sensor.
pub(crate) trait LineChannel {
    fn send(&mut self, command: &str) -> io::Result<()>;

    /// One reply line, or whatever arrived before the read timed out.
    fn read_line(&mut self) -> io::Result<String>;
}

/// A serial port configured the way TEMPerX232 firmware expects:
/// 9600 baud, 8N1, no flow control. Closed when dropped.
pub struct SerialLine {
    port: Box<dyn SerialPort>,
}

impl SerialLine {
    pub fn open(path: &Path) -> Result<Self, serialport::Error> {
        let port = serialport::new(path.to_string_lossy(), BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(TIMEOUT)
            .open()?;
        Ok(Self { port })
    }
}

impl LineChannel for SerialLine {
    fn send(&mut self, command: &str) -> io::Result<()> {
        self.port.write_all(command.as_bytes())?;
        self.port.flush()
    }

    fn read_line(&mut self) -> io::Result<String> {
        read_line_from(&mut self.port, TIMEOUT)
    }
}

/// Read one byte at a time until `\n`, end of input, or a read timeout.
///
/// Whatever arrived so far is returned on timeout, including the newline when
/// one was seen. `limit` caps the total time spent on the line.
pub(crate) fn read_line_from<R: Read + ?Sized>(port: &mut R, limit: Duration) -> io::Result<String> {
    let deadline = Instant::now() + limit;
    let mut line = Vec::new();
    let mut byte = [0u8; 1];

    while Instant::now() < deadline {
        match port.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {
                line.push(byte[0]);
                if byte[0] == b'\n' {
                    break;
                }
            }
            Err(ref e) if e.kind() == ErrorKind::TimedOut => break,
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(line.iter().map(|&b| b as char).collect())
}

/// Parse a `ReadTemp` reply from a device that called itself `identifier`.
pub fn parse_reply(identifier: &str, reply: &str) -> Result<SensorReading, DecodeError> {
    let unparsable = || DecodeError::UnparsableReply(reply.to_string());
    let captures = READ_TEMP_REPLY.captures(reply).ok_or_else(unparsable)?;

    let celsius: f64 = captures[1].parse().map_err(|_| unparsable())?;
    let humidity: f64 = captures[2].parse().map_err(|_| unparsable())?;
    Ok(SensorReading::new(identifier, celsius, Some(humidity)))
}

pub(crate) fn exchange<C: LineChannel>(channel: &mut C) -> Result<SensorReading, ReadError> {
    channel.send("Version")?;
    let identifier = channel.read_line()?.trim().to_string();

    channel.send("ReadTemp")?;
    let reply = channel.read_line()?;
    let reply = reply.trim();
    debug!("serial identity {:?}, reply {:?}", identifier, reply);

    Ok(parse_reply(&identifier, reply)?)
}

pub fn read(path: &Path) -> Result<SensorReading, ReadError> {
    let start = Instant::now();
    let mut line = SerialLine::open(path)?;
    let result = exchange(&mut line);
    debug!(
        "serial read of {} took: {} ms",
        path.display(),
        start.elapsed().as_millis()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedLine {
        lines: VecDeque<&'static str>,
        sent: Vec<String>,
    }

    impl ScriptedLine {
        fn new(lines: &[&'static str]) -> Self {
            Self {
                lines: lines.iter().copied().collect(),
                sent: Vec::new(),
            }
        }
    }

    impl LineChannel for ScriptedLine {
        fn send(&mut self, command: &str) -> io::Result<()> {
            self.sent.push(command.to_string());
            Ok(())
        }

        fn read_line(&mut self) -> io::Result<String> {
            Ok(self.lines.pop_front().unwrap_or_default().to_string())
        }
    }

    #[test]
    fn test_parse_reply() {
        let reading = parse_reply("TEMPerX232_V2.0", "Temp-Inner:22.50 [C],55.10 [%RH]<").unwrap();
        assert_eq!(reading.identifier, "TEMPerX232_V2.0");
        assert!((reading.celsius - 22.5).abs() < 1e-9);
        assert!((reading.humidity.unwrap() - 55.1).abs() < 1e-9);
        assert_eq!(reading.fahrenheit, reading.celsius * 1.8 + 32.0);
    }

    #[test]
    fn test_parse_reply_variants() {
        let reading = parse_reply("x", "Temp-Inner:-3.25 [C], 40.19 [%RH]").unwrap();
        assert!((reading.celsius - -3.25).abs() < 1e-9);
        assert!((reading.humidity.unwrap() - 40.19).abs() < 1e-9);

        let reading = parse_reply("x", "Temp-Inner:30,39").unwrap();
        assert!((reading.celsius - 30.0).abs() < 1e-9);
        assert!((reading.humidity.unwrap() - 39.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_reply_garbage() {
        assert_eq!(
            parse_reply("x", "garbage"),
            Err(DecodeError::UnparsableReply("garbage".to_string()))
        );
        assert!(parse_reply("x", "Temp-Inner: [C], [%RH]").is_err());
        assert!(parse_reply("x", "").is_err());
    }

    #[test]
    fn test_exchange() {
        let mut line = ScriptedLine::new(&[
            "TEMPerX232_V2.0\r\n",
            "Temp-Inner:30.53 [C],39.92 [%RH]<\r\n",
        ]);

        let reading = exchange(&mut line).unwrap();
        assert_eq!(line.sent, vec!["Version", "ReadTemp"]);
        assert_eq!(reading.identifier, "TEMPerX232_V2.0");
        assert!((reading.celsius - 30.53).abs() < 1e-9);
        assert!((reading.humidity.unwrap() - 39.92).abs() < 1e-9);
    }

    #[test]
    fn test_exchange_unparsable_reply_keeps_raw_text() {
        let mut line = ScriptedLine::new(&["TEMPerX232_V2.0\r\n", "Type:Inner-H2\r\n"]);

        match exchange(&mut line) {
            Err(ReadError::Decode(DecodeError::UnparsableReply(raw))) => {
                assert_eq!(raw, "Type:Inner-H2")
            }
            other => panic!("expected decode failure, got {:?}", other),
        }
    }

    /// Hands out its bytes, then reports a read timeout like an idle port.
    struct StalledPort {
        data: io::Cursor<Vec<u8>>,
    }

    impl Read for StalledPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(io::Error::new(ErrorKind::TimedOut, "Operation timed out")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_read_line_stops_at_newline() {
        let mut port = io::Cursor::new(b"TEMPerX232_V2.0\r\nTemp-Inner".to_vec());

        let line = read_line_from(&mut port, TIMEOUT).unwrap();
        assert_eq!(line, "TEMPerX232_V2.0\r\n");
        assert_eq!(port.position(), 17);

        // Input ends without a newline.
        assert_eq!(read_line_from(&mut port, TIMEOUT).unwrap(), "Temp-Inner");
    }

    #[test]
    fn test_read_line_returns_partial_line_on_timeout() {
        let mut port = StalledPort {
            data: io::Cursor::new(b"Temp-Inner:30.53 [C]".to_vec()),
        };

        let line = read_line_from(&mut port, TIMEOUT).unwrap();
        assert_eq!(line, "Temp-Inner:30.53 [C]");
        assert_eq!(read_line_from(&mut port, TIMEOUT).unwrap(), "");
    }

    #[test]
    fn test_read_missing_node_is_transport_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let error = read(&dir.path().join("ttyUSB0")).unwrap_err();
        assert_eq!(error.kind(), crate::models::reading::ErrorKind::Transport);
    }
}
