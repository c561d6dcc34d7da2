/*!
    adaptive metronome

    Each scheduling cycle looks at how early or late the tappers were relative to the last beat, and moves the next beat by a fraction `alpha` of the group's mean asynchrony. With `alpha = 0` the metronome keeps a fixed tempo, with `alpha = 1` it fully follows the group.
*/

use log::*;

use crate::{
    clock::{Timestamp, reached},
    config::Config,
    error::Error,
    lock::{IrqCell, IrqScope},
    tapper::Sample,
    };


/// tempo above which the beat arithmetic overflows on small targets, never accepted
pub const BPM_CEILING: u16 = 300;
/// milliseconds in a minute
const MINUTE: u32 = 60_000;


/// strategy turning per-tapper asynchronies into a tempo adjustment
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Heuristic {
    /// adjust by the mean asynchrony of the tappers who responded
    #[default]
    Average,
    /// selector not known by this master, no adjustment is computed
    Unsupported(u8),
}
impl From<u8> for Heuristic {
    fn from(code: u8) -> Self {
        match code {
            1 => Self::Average,
            other => Self::Unsupported(other),
        }
    }
}

/**
    beats per minute together with the inter-onset interval derived from it

    the interval can only be obtained from a bpm, so the two can never disagree
*/
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Tempo {
    bpm: u16,
    ioi: u32,
}
impl Tempo {
    /// None for a null tempo
    pub const fn new(bpm: u16) -> Option<Self> {
        if bpm == 0 {
            return None;
        }
        Some(Self {bpm, ioi: MINUTE / bpm as u32})
    }
    pub const fn bpm(&self) -> u16 {self.bpm}
    /// inter-onset interval in milliseconds, `floor(60000 / bpm)`
    pub const fn ioi(&self) -> u32 {self.ioi}
}


/**
    tempo state and adaptive scheduling

    `next` and `played` are shared with the code triggering beats and may be touched from interrupt context, they are only accessed in narrow [IrqScope]s. Everything else belongs to the main loop.
*/
#[derive(Debug)]
pub struct Metronome {
    alpha: f32,
    min: u16,
    max: u16,
    tempo: Tempo,
    /// time of the next beat
    next: IrqCell<Timestamp>,
    /// whether the beat of the current window was already triggered
    played: IrqCell<bool>,
}
impl Metronome {
    pub fn new(config: &Config) -> Result<Self, Error> {
        config.validate()?;
        let tempo = Tempo::new(config.bpm_init) .ok_or(Error::Config("tempo must be positive"))?;
        Ok(Self {
            alpha: config.alpha,
            min: config.bpm_min,
            max: config.bpm_max,
            tempo,
            next: IrqCell::new(0),
            played: IrqCell::new(false),
        })
    }

    pub fn alpha(&self) -> f32 {self.alpha}
    pub fn tempo(&self) -> Tempo {self.tempo}
    pub fn ioi(&self) -> u32 {self.tempo.ioi()}
    pub fn next_beat(&self) -> Timestamp {self.next.load()}
    pub fn played(&self) -> bool {self.played.load()}

    /// change the tempo, the interval follows and the next beat time is left untouched
    pub fn set_tempo(&mut self, bpm: u16) -> Result<(), Error> {
        let out = Error::TempoOutOfRange {bpm, min: self.min, max: self.max};
        if bpm < self.min || bpm > self.max || bpm > BPM_CEILING {
            return Err(out);
        }
        self.tempo = Tempo::new(bpm) .ok_or(out)?;
        Ok(())
    }
    pub fn set_alpha(&mut self, alpha: f32) -> Result<(), Error> {
        if !(0. ..= 1.).contains(&alpha) {
            return Err(Error::AlphaOutOfRange(alpha));
        }
        self.alpha = alpha;
        Ok(())
    }

    /// place the first beat one interval after `now`
    pub fn start(&self, now: Timestamp) {
        let scope = IrqScope::acquire();
        self.next.set(&scope, now.wrapping_add(self.tempo.ioi()));
        self.played.set(&scope, false);
    }
    /// true if the beat of this window is not played yet and its time has come
    pub fn due(&self, now: Timestamp) -> bool {
        let scope = IrqScope::acquire();
        ! self.played.get(&scope) && reached(now, self.next.get(&scope))
    }
    pub fn mark_played(&self) {
        self.played.store(true)
    }

    /**
        schedule the next beat from the asynchronies of the current window

        samples are consumed one by one, so a lazy source can guard each read with its own scope instead of masking interrupts for the whole accumulation. The commit happens in a separate scope, a tap landing in between is accounted for in the next cycle.

        returns the adjustment added to the inter-onset interval
    */
    pub fn schedule_next(&mut self, samples: impl IntoIterator<Item=Sample>, heuristic: Heuristic) -> i32 {
        // accumulate
        let mut sum: i64 = 0;
        let mut responders: u32 = 0;
        for sample in samples {
            if let (true, Some(asynchrony)) = (sample.active, sample.asynchrony) {
                if heuristic == Heuristic::Average {
                    sum += i64::from(asynchrony);
                }
                responders += 1;
            }
        }

        // global adjustment
        let adjustment = match heuristic {
            Heuristic::Average if responders > 0 => {
                let mean = sum as f64 / f64::from(responders);
                floor(mean * f64::from(self.alpha))
            },
            Heuristic::Average => 0,
            Heuristic::Unsupported(code) => {
                debug!("heuristic {} unsupported, no adjustment", code);
                0
            },
        };
        debug!("{} responders, adjustment {}", responders, adjustment);

        // commit
        {
            let scope = IrqScope::acquire();
            let ioi = self.tempo.ioi();
            self.next.update(&scope, |next| next.wrapping_add(ioi).wrapping_add_signed(adjustment));
            self.played.set(&scope, false);
        }
        adjustment
    }
}

/// round toward negative infinity, saturating to the i32 range
///
/// `f64::floor` needs std, it is not available in `core`
fn floor(value: f64) -> i32 {
    let truncated = value as i32;
    if f64::from(truncated) > value {truncated - 1}
    else {truncated}
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_toward_negative_infinity() {
        assert_eq!(floor(2.0000001), 2);
        assert_eq!(floor(4.5), 4);
        assert_eq!(floor(-4.5), -5);
        assert_eq!(floor(-3.), -3);
        assert_eq!(floor(0.), 0);
    }

    #[test]
    fn interval_follows_tempo() {
        for bpm in 1 ..= BPM_CEILING {
            let tempo = Tempo::new(bpm).unwrap();
            assert_eq!(tempo.ioi(), 60_000 / u32::from(bpm));
        }
        assert_eq!(Tempo::new(0), None);
        assert_eq!(Tempo::new(120).unwrap().ioi(), 500);
        assert_eq!(Tempo::new(7).unwrap().ioi(), 8571);
    }

    #[test]
    fn heuristic_codes() {
        assert_eq!(Heuristic::from(1), Heuristic::Average);
        assert_eq!(Heuristic::from(7), Heuristic::Unsupported(7));
    }
}
