/*!
    byte codes and frames exchanged on the tapper bus and on the host link

    host to master:
    - a single reserved [Control] byte, or
    - a `[recipient, parameter id]` header followed by the parameter value as a `\n` terminated string

    master to host: [Report] frames, whose first byte tells their size

    Host commands arrive byte by byte on a link that may pause in the middle of a command, so they are assembled by a [CommandParser] fed with whatever bytes are ready.

    Frames are at most 5 bytes laid out byte by byte, they are packed with `to_le_bytes`/`from_le_bytes` rather than derived byte layouts.
*/

use core::fmt::Write;
use strum::{FromRepr, IntoStaticStr};

use crate::{
    clock::Timestamp,
    error::Error,
    };


/// maximum number of tappers a master can drive
pub const MAX_TAPPERS: usize = 4;
/// recipient id of the master itself in host commands
pub const MASTER_ID: u8 = 0;
/// byte written to a tapper to ask it to pulse its handshake line
pub const REQUEST_ACK: u8 = 1;
/// terminator of parameter values, on the host link as on the bus
pub const TERMINATOR: u8 = b'\n';
/// longest parameter value accepted, terminator excluded
pub const MAX_VALUE: usize = 16;
/// raw asynchrony meaning that a tapper did not tap during a window
pub const NO_RESPONSE: i32 = -32000;

/// first byte of an error report
pub const REPORT_ERROR: u8 = 0xfc;
/// first byte of an adjustment diagnostic report
pub const REPORT_ADJUSTMENT: u8 = 0xfb;
/// longest report frame
pub const MAX_REPORT: usize = 5;


/// single byte commands from the host, their codes are reserved in the recipient byte
#[derive(FromRepr, IntoStaticStr, Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Control {
    Start = 0xff,
    Stop = 0xfe,
    QueryState = 0xfd,
}

/// parameter identifiers understood by the master and forwarded to tappers
#[derive(FromRepr, IntoStaticStr, Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum ParameterId {
    /// metronome adaptivity, float
    Alpha = 0,
    /// metronome tempo, integer bpm
    Tempo = 1,
    /// sound asset number, integer
    SoundAsset = 2,
    /// number of tappers the host expects, integer
    TapperCount = 3,
}

/// run state of the master as reported to the host
#[derive(FromRepr, IntoStaticStr, Debug, Copy, Clone, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Phase {
    #[default]
    Idle = 0,
    Running = 1,
}


/// typed parameter value
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Parameter {
    Alpha(f32),
    Tempo(u16),
    SoundAsset(u8),
    TapperCount(u8),
}
impl Parameter {
    /// parse the textual value of a parameter
    pub fn parse(id: u8, value: &str) -> Result<Self, Error> {
        let id = ParameterId::from_repr(id) .ok_or(Error::UnknownParameter(id))?;
        let value = value.trim();
        Ok(match id {
            ParameterId::Alpha => Self::Alpha(value.parse().map_err(|_| Error::InvalidValue)?),
            ParameterId::Tempo => Self::Tempo(value.parse().map_err(|_| Error::InvalidValue)?),
            ParameterId::SoundAsset => Self::SoundAsset(value.parse().map_err(|_| Error::InvalidValue)?),
            ParameterId::TapperCount => Self::TapperCount(value.parse().map_err(|_| Error::InvalidValue)?),
        })
    }
    pub fn id(&self) -> ParameterId {
        match self {
            Self::Alpha(_) => ParameterId::Alpha,
            Self::Tempo(_) => ParameterId::Tempo,
            Self::SoundAsset(_) => ParameterId::SoundAsset,
            Self::TapperCount(_) => ParameterId::TapperCount,
        }
    }
    /// textual value, without terminator
    pub fn value(&self) -> heapless::String<MAX_VALUE> {
        let mut text = heapless::String::new();
        // every variant fits in MAX_VALUE characters
        let _ = match self {
            Self::Alpha(value) => write!(text, "{}", value),
            Self::Tempo(value) => write!(text, "{}", value),
            Self::SoundAsset(value) => write!(text, "{}", value),
            Self::TapperCount(value) => write!(text, "{}", value),
        };
        text
    }
}

/// complete command received from the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Control(Control),
    /// set parameter `id` of `recipient`, the value is the raw text without terminator
    Set {recipient: u8, id: u8, value: heapless::Vec<u8, MAX_VALUE>},
}

/**
    assembles host commands from bytes as they arrive, never waiting for the rest of a command

    a value longer than [MAX_VALUE] is dropped up to its terminator and reported as [Error::InvalidValue]
*/
#[derive(Debug, Default)]
pub struct CommandParser {
    /// header and value received so far
    pending: heapless::Vec<u8, {MAX_VALUE+2}>,
    overflow: bool,
}
impl CommandParser {
    pub const fn new() -> Self {
        Self {pending: heapless::Vec::new(), overflow: false}
    }
    /// true if part of a command was received
    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }
    /// take one byte, returns a command once its last byte arrived
    pub fn feed(&mut self, byte: u8) -> Option<Result<Command, Error>> {
        if self.pending.is_empty() {
            if let Some(control) = Control::from_repr(byte) {
                return Some(Ok(Command::Control(control)));
            }
        }
        if self.pending.len() >= 2 && byte == TERMINATOR {
            let frame = core::mem::take(&mut self.pending);
            if core::mem::take(&mut self.overflow) {
                return Some(Err(Error::InvalidValue));
            }
            let mut value = heapless::Vec::new();
            return Some(value.extend_from_slice(&frame[2 ..])
                .map(|_| Command::Set {recipient: frame[0], id: frame[1], value})
                .map_err(|_| Error::InvalidValue));
        }
        self.overflow |= self.pending.push(byte).is_err();
        None
    }
}

/// build the bus message setting a parameter on a tapper: id, value, terminator
pub fn parameter_message(id: u8, value: &[u8]) -> Result<heapless::Vec<u8, {MAX_VALUE+2}>, Error> {
    let mut message = heapless::Vec::new();
    message.push(id) .map_err(|_| Error::InvalidValue)?;
    message.extend_from_slice(value) .map_err(|_| Error::InvalidValue)?;
    message.push(TERMINATOR) .map_err(|_| Error::InvalidValue)?;
    Ok(message)
}


/// frame sent from the master to the host
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Report {
    /// a tapper tapped at the given time, device is the tapper's recipient id
    Timing {device: u8, time: Timestamp},
    /// error code, see [Error::code]
    Error {code: u16},
    /// answer to [Control::QueryState]
    State {phase: Phase, connected: u8, requested: u8},
    /// adjustment applied by the last scheduling cycle, only sent in debug mode
    Adjustment(i16),
}
impl Report {
    /// size of the frame starting with the given byte, None if no frame starts with it
    pub fn size(first: u8) -> Option<usize> {
        match first {
            1 ..= 4 => Some(5),
            REPORT_ERROR | REPORT_ADJUSTMENT => Some(3),
            code if code == Control::QueryState as u8 => Some(4),
            _ => None,
        }
    }
    /// serialize into the start of `buffer`, multi-byte values low byte first
    pub fn encode<'b>(&self, buffer: &'b mut [u8; MAX_REPORT]) -> &'b [u8] {
        match *self {
            Self::Timing {device, time} => {
                buffer[0] = device;
                buffer[1 .. 5].copy_from_slice(&time.to_le_bytes());
                &buffer[.. 5]
            },
            Self::Error {code} => {
                buffer[0] = REPORT_ERROR;
                buffer[1 .. 3].copy_from_slice(&code.to_le_bytes());
                &buffer[.. 3]
            },
            Self::State {phase, connected, requested} => {
                buffer[.. 4].copy_from_slice(&[Control::QueryState as u8, phase as u8, connected, requested]);
                &buffer[.. 4]
            },
            Self::Adjustment(value) => {
                buffer[0] = REPORT_ADJUSTMENT;
                buffer[1 .. 3].copy_from_slice(&value.to_le_bytes());
                &buffer[.. 3]
            },
        }
    }
    /// parse a complete frame, as sized by [Self::size]
    pub fn decode(frame: &[u8]) -> Option<Self> {
        let first = *frame.first()?;
        if frame.len() != Self::size(first)? {
            return None;
        }
        Some(match first {
            1 ..= 4 => Self::Timing {
                device: first,
                time: Timestamp::from_le_bytes(frame[1 .. 5].try_into().ok()?),
                },
            REPORT_ERROR => Self::Error {code: u16::from_le_bytes([frame[1], frame[2]])},
            REPORT_ADJUSTMENT => Self::Adjustment(i16::from_le_bytes([frame[1], frame[2]])),
            _ => Self::State {
                phase: Phase::from_repr(frame[1])?,
                connected: frame[2],
                requested: frame[3],
                },
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_frame_is_little_endian() {
        let mut buffer = [0; MAX_REPORT];
        let frame = Report::Timing {device: 2, time: 0x1234_5678}.encode(&mut buffer);
        assert_eq!(frame, &[2, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(Report::decode(frame), Some(Report::Timing {device: 2, time: 0x1234_5678}));
    }

    #[test]
    fn parse_parameters() {
        assert_eq!(Parameter::parse(0, "0.25"), Ok(Parameter::Alpha(0.25)));
        assert_eq!(Parameter::parse(1, " 90\r"), Ok(Parameter::Tempo(90)));
        assert_eq!(Parameter::parse(1, "fast"), Err(Error::InvalidValue));
        assert_eq!(Parameter::parse(9, "1"), Err(Error::UnknownParameter(9)));
        assert_eq!(Parameter::Tempo(120).value().as_str(), "120");
    }

    #[test]
    fn commands_split_across_reads() {
        let mut parser = CommandParser::new();
        assert_eq!(parser.feed(0xfd), Some(Ok(Command::Control(Control::QueryState))));
        assert!(!parser.is_pending());
        for &byte in b"\x02\x0112" {
            assert_eq!(parser.feed(byte), None);
        }
        assert!(parser.is_pending());
        // reserved codes inside a command are plain bytes
        assert_eq!(parser.feed(0xff), None);
        let value = heapless::Vec::from_slice(&[b'1', b'2', 0xff]).unwrap();
        assert_eq!(parser.feed(b'\n'), Some(Ok(Command::Set {recipient: 2, id: 1, value})));
        assert!(!parser.is_pending());
    }

    #[test]
    fn overlong_value_is_dropped() {
        let mut parser = CommandParser::new();
        for &byte in b"\x00\x0112345678901234567890" {
            assert_eq!(parser.feed(byte), None);
        }
        assert_eq!(parser.feed(b'\n'), Some(Err(Error::InvalidValue)));
        for &byte in b"\x00\x0190" {
            parser.feed(byte);
        }
        let value = heapless::Vec::from_slice(b"90").unwrap();
        assert_eq!(parser.feed(b'\n'), Some(Ok(Command::Set {recipient: 0, id: 1, value})));
    }

    #[test]
    fn bus_message_is_terminated() {
        let message = parameter_message(ParameterId::Tempo as u8, b"100").unwrap();
        assert_eq!(&message[..], &[1, b'1', b'0', b'0', b'\n']);
    }
}
