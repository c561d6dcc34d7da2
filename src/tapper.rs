/*!
    tapper slots: connection lifecycle and tap capture

    Hardware edges from a tapper's signal line are fed to [Registry::on_edge] from the interrupt handler. Depending on the slot state, an edge completes the handshake or records a tap, replacing the rebinding of interrupt callbacks by an explicit state machine.

    ```text
    Uninitialized --arm--> AwaitingHandshake --edge--> Connected --edge (tap)--> Connected
                                   |
                                   +--timeout--> Excluded
    ```
*/

use log::*;
use strum::IntoStaticStr;

use crate::{
    clock::Timestamp,
    error::Error,
    lock::{IrqCell, IrqScope},
    protocol::{MAX_TAPPERS, NO_RESPONSE},
    };


/// connection lifecycle of a slot, there is no way back from [SlotState::Connected] during a run
#[derive(IntoStaticStr, Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SlotState {
    #[default]
    Uninitialized,
    /// handshake requested, waiting for the tapper to pulse its line
    AwaitingHandshake,
    /// handshake done, edges are taps
    Connected,
    /// handshake failed, edges are ignored until the end of the run
    Excluded,
}

/// what happened to a slot
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SlotEvent {
    /// the master is about to request a handshake
    Arm,
    /// the tapper's signal line rose
    Edge,
    /// the handshake was not answered in time
    Timeout,
}

/// one tapper's contribution to a scheduling window
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Sample {
    /// the slot is connected and takes part in the run
    pub active: bool,
    /// time of the tap in this window, if any
    pub tap: Option<Timestamp>,
    /// tap time minus expected beat time, None when no tap arrived
    pub asynchrony: Option<i32>,
}
impl Sample {
    /// asynchrony with the numeric no-response sentinel
    pub fn raw_asynchrony(&self) -> i32 {
        self.asynchrony.unwrap_or(NO_RESPONSE)
    }
}


/// a tapper slot, its index in the [Registry] is its identity
#[derive(Debug, Default)]
pub struct Slot {
    state: IrqCell<SlotState>,
    /// last tap not yet consumed by a window, written from interrupt context only
    last_tap: IrqCell<Option<Timestamp>>,
}
impl Slot {
    pub const fn new() -> Self {
        Self {
            state: IrqCell::new(SlotState::Uninitialized),
            last_tap: IrqCell::new(None),
        }
    }
    pub fn state(&self) -> SlotState {
        self.state.load()
    }
    /// the single place where slot states change
    pub fn transition(&self, event: SlotEvent, now: Timestamp) -> Option<SlotState> {
        let scope = IrqScope::acquire();
        self.transition_in(&scope, event, now)
    }
    fn transition_in(&self, scope: &IrqScope, event: SlotEvent, now: Timestamp) -> Option<SlotState> {
        let next = match (self.state.get(scope), event) {
            (SlotState::Uninitialized, SlotEvent::Arm) => SlotState::AwaitingHandshake,
            (SlotState::AwaitingHandshake, SlotEvent::Edge) => SlotState::Connected,
            (SlotState::AwaitingHandshake, SlotEvent::Timeout) => SlotState::Excluded,
            (SlotState::Connected, SlotEvent::Edge) => {
                self.last_tap.set(scope, Some(now));
                SlotState::Connected
            },
            _ => return None,
        };
        self.state.set(scope, next);
        Some(next)
    }
    /// consume the pending tap and derive its asynchrony against `expected`
    fn sample(&self, expected: Timestamp) -> Sample {
        let (state, tap) = {
            let scope = IrqScope::acquire();
            (self.state.get(&scope), self.last_tap.take(&scope))
        };
        if state != SlotState::Connected {
            return Sample::default();
        }
        Sample {
            active: true,
            tap,
            asynchrony: tap.map(|tap| tap.wrapping_sub(expected) as i32),
        }
    }
}


/**
    fixed set of tapper slots

    meant to live in a `static` so that interrupt handlers can reach it:

    ```ignore
    static TAPPERS: Registry = Registry::new();

    fn on_tapper_line(slot: usize) {
        TAPPERS.on_edge(slot, clock.now());
    }
    ```
*/
#[derive(Debug, Default)]
pub struct Registry {
    slots: [Slot; MAX_TAPPERS],
}
impl Registry {
    pub const fn new() -> Self {
        Self {slots: [const { Slot::new() }; MAX_TAPPERS]}
    }
    pub fn slots(&self) -> &[Slot; MAX_TAPPERS] {&self.slots}

    pub fn state(&self, slot: usize) -> Option<SlotState> {
        self.slots.get(slot).map(Slot::state)
    }
    pub fn is_connected(&self, slot: usize) -> bool {
        self.state(slot) == Some(SlotState::Connected)
    }
    /// number of connected slots
    pub fn connected(&self) -> u8 {
        self.slots.iter().filter(|slot| slot.state() == SlotState::Connected).count() as u8
    }

    /// prepare a slot to accept a handshake edge
    pub fn arm(&self, slot: usize) -> Result<(), Error> {
        let index = slot as u8;
        self.slots.get(slot)
            .and_then(|tapper| tapper.transition(SlotEvent::Arm, 0))
            .map(|_| ())
            .ok_or(Error::Transition(index))
    }

    /// close the handshake window of a slot that did not answer
    pub fn exclude(&self, slot: usize) -> Result<(), Error> {
        self.slots.get(slot)
            .and_then(|tapper| tapper.transition(SlotEvent::Timeout, 0))
            .map(|_| ())
            .ok_or(Error::Transition(slot as u8))
    }

    /**
        interrupt handler for a tapper's signal line

        does nothing else than moving the slot state or storing the tap time, in a single narrow scope. Edges on unknown or unarmed slots are ignored.
    */
    pub fn on_edge(&self, slot: usize, now: Timestamp) {
        if let Some(tapper) = self.slots.get(slot) {
            tapper.transition(SlotEvent::Edge, now);
        }
    }

    /**
        samples of every slot for the window whose beat was expected at `expected`

        each slot is read in its own scope when the iterator reaches it, and its pending tap is consumed so it is not counted twice
    */
    pub fn window(&self, expected: Timestamp) -> impl Iterator<Item=Sample> + '_ {
        self.slots.iter().map(move |slot| slot.sample(expected))
    }

    /// forget taps received before a run starts
    pub fn clear_taps(&self) {
        for slot in &self.slots {
            slot.last_tap.store(None);
        }
    }

    /// log the state of all slots
    pub fn dump(&self) {
        for (index, slot) in self.slots.iter().enumerate() {
            let state: &'static str = slot.state().into();
            debug!("tapper {}: {}", index, state);
        }
    }
}
