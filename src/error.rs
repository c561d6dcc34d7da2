use thiserror::Error;
use crate::sound::SoundError;


/**
    error raised by the master node

    none of these errors is fatal for a run: they are reported to the host and the scheduling loop continues. Only a [Error::Config] at startup prevents the master from being built.
*/
#[derive(Error, Debug, Copy, Clone, PartialEq)]
pub enum Error {
    #[error("tempo {bpm} bpm is outside [{min}, {max}]")]
    TempoOutOfRange {bpm: u16, min: u16, max: u16},
    #[error("adaptivity {0} is outside [0, 1]")]
    AlphaOutOfRange(f32),
    #[error("unknown parameter id {0}")]
    UnknownParameter(u8),
    #[error("unknown recipient id {0}")]
    UnknownRecipient(u8),
    #[error("parameter value could not be parsed")]
    InvalidValue,
    #[error("tapper {0} did not answer the handshake")]
    HandshakeTimeout(u8),
    #[error("{connected} tappers connected, {requested} requested")]
    TapperCount {connected: u8, requested: u8},
    #[error("slot {0} cannot take this transition")]
    Transition(u8),
    #[error("problem with tapper bus: {0:?}")]
    Bus(embedded_hal::i2c::ErrorKind),
    #[error("problem with host link: {0:?}")]
    HostLink(embedded_io::ErrorKind),
    #[error("problem with sound playback: {0}")]
    Sound(SoundError),
    #[error("invalid configuration: {0}")]
    Config(&'static str),
}
impl Error {
    /// code relayed to the host in error frames
    pub fn code(&self) -> u16 {
        match self {
            Self::TempoOutOfRange {..} => 1,
            Self::AlphaOutOfRange(_) => 2,
            Self::UnknownParameter(_) => 3,
            Self::UnknownRecipient(_) => 4,
            Self::InvalidValue => 5,
            Self::HandshakeTimeout(_) => 10,
            Self::TapperCount {..} => 11,
            Self::Transition(_) => 12,
            Self::Bus(_) => 20,
            Self::HostLink(_) => 30,
            Self::Config(_) => 40,
            Self::Sound(error) => 100 + u16::from(*error as u8),
        }
    }
}
impl From<SoundError> for Error {
    fn from(error: SoundError) -> Self {
        Self::Sound(error)
    }
}
