use crate::{
    error::Error,
    metronome::{Heuristic, BPM_CEILING},
    protocol::MAX_TAPPERS,
    };


/**
    startup settings of a master

    all of them are fixed for the run, except alpha, tempo and sound asset that the host can change with set-parameter commands
*/
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Config {
    /// metronome adaptivity in [0, 1], 0 is a fixed metronome, 1 follows the group fully (and unstably)
    pub alpha: f32,
    /// lowest tempo accepted
    pub bpm_min: u16,
    /// highest tempo accepted, never above [BPM_CEILING]
    pub bpm_max: u16,
    /// tempo at startup
    pub bpm_init: u16,
    /// number of slots to initialize, at most [MAX_TAPPERS]
    pub max_tappers: u8,
    /// time a tapper has to answer the handshake request
    pub handshake_timeout_ms: u32,
    /// how asynchronies turn into tempo adjustments
    pub heuristic: Heuristic,
    /// sound asset loaded at startup
    pub sound_asset: u8,
    /// send diagnostic reports to the host
    pub debug: bool,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            bpm_min: 30,
            bpm_max: 150,
            bpm_init: 120,
            max_tappers: MAX_TAPPERS as u8,
            handshake_timeout_ms: 5,
            heuristic: Heuristic::Average,
            sound_asset: 0,
            debug: false,
        }
    }
}
impl Config {
    pub fn with_alpha(self, alpha: f32) -> Self {Self {alpha, .. self}}
    pub fn with_tempo(self, bpm_init: u16) -> Self {Self {bpm_init, .. self}}
    pub fn with_bounds(self, bpm_min: u16, bpm_max: u16) -> Self {Self {bpm_min, bpm_max, .. self}}
    pub fn with_tappers(self, max_tappers: u8) -> Self {Self {max_tappers, .. self}}
    pub fn with_handshake_timeout(self, handshake_timeout_ms: u32) -> Self {Self {handshake_timeout_ms, .. self}}
    pub fn with_heuristic(self, heuristic: Heuristic) -> Self {Self {heuristic, .. self}}
    pub fn with_sound_asset(self, sound_asset: u8) -> Self {Self {sound_asset, .. self}}
    pub fn with_debug(self, debug: bool) -> Self {Self {debug, .. self}}

    /// check the settings can start a run
    pub fn validate(&self) -> Result<(), Error> {
        if self.bpm_min == 0 {
            return Err(Error::Config("tempo must be positive"));
        }
        if self.bpm_min > self.bpm_max {
            return Err(Error::Config("minimum tempo above maximum tempo"));
        }
        if self.bpm_max > BPM_CEILING {
            return Err(Error::Config("maximum tempo overflows beat arithmetic"));
        }
        if !(self.bpm_min ..= self.bpm_max).contains(&self.bpm_init) {
            return Err(Error::Config("initial tempo outside tempo bounds"));
        }
        if !(0. ..= 1.).contains(&self.alpha) {
            return Err(Error::Config("alpha outside [0, 1]"));
        }
        if usize::from(self.max_tappers) > MAX_TAPPERS {
            return Err(Error::Config("too many tappers"));
        }
        Ok(())
    }
}
