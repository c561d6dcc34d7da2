//! simulated hardware for running a master on a desktop
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    convert::Infallible,
    sync::{Arc, mpsc, atomic::{AtomicU32, Ordering}},
    time::Duration,
    vec::Vec,
    };
use embedded_hal::{
    i2c::{self, Operation},
    delay::DelayNs,
    };
use tapcat::{
    clock::{Clock, Timestamp},
    protocol::{Report, REQUEST_ACK},
    sound::{Sound, SoundError},
    tapper::Registry,
    };


pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// clock advanced by hand, clones share the same time
#[derive(Clone, Default)]
pub struct ManualClock(Arc<AtomicU32>);
impl ManualClock {
    pub fn set(&self, time: Timestamp) {self.0.store(time, Ordering::SeqCst)}
    pub fn advance(&self, ms: u32) {self.0.fetch_add(ms, Ordering::SeqCst);}
}
impl Clock for ManualClock {
    fn now(&self) -> Timestamp {self.0.load(Ordering::SeqCst)}
}

/// delay moving a [ManualClock] forward instead of sleeping
pub struct FakeDelay(pub ManualClock);
impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.advance(ns / 1_000_000);
    }
    fn delay_ms(&mut self, ms: u32) {
        self.0.advance(ms);
    }
}

/// bus recording writes, the tappers listed in `answering` pulse their line when asked for a handshake
pub struct FakeBus<'r> {
    pub registry: &'r Registry,
    pub answering: Vec<u8>,
    pub refusing: Vec<u8>,
    pub writes: Vec<(u8, Vec<u8>)>,
}
impl<'r> FakeBus<'r> {
    pub fn new(registry: &'r Registry, answering: &[u8]) -> Self {
        Self {registry, answering: answering.to_vec(), refusing: Vec::new(), writes: Vec::new()}
    }
}
impl i2c::ErrorType for FakeBus<'_> {
    type Error = i2c::ErrorKind;
}
impl i2c::I2c for FakeBus<'_> {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        if self.refusing.contains(&address) {
            return Err(i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Address));
        }
        for operation in operations {
            if let Operation::Write(data) = operation {
                let data: &[u8] = data;
                self.writes.push((address, data.to_vec()));
                if data == [REQUEST_ACK] && self.answering.contains(&address) {
                    // the tapper pulses its line, as an interrupt would report it
                    self.registry.on_edge(usize::from(address) - 1, 0);
                }
            }
        }
        Ok(())
    }
}

/// decode and clear frames written by a master
fn take_reports(output: &mut Vec<u8>) -> Vec<Report> {
    let mut reports = Vec::new();
    let mut rest = &output[..];
    while let Some(&first) = rest.first() {
        let size = Report::size(first).expect("unexpected frame start");
        reports.push(Report::decode(&rest[.. size]).expect("malformed frame"));
        rest = &rest[size ..];
    }
    output.clear();
    reports
}

/**
    host link with scripted input and recorded output

    reading while nothing was received is a test failure, as it would block a real link. Once `closed`, the link reads end of file.
*/
#[derive(Default)]
pub struct FakeHost {
    pub input: VecDeque<u8>,
    pub output: Vec<u8>,
    pub closed: bool,
}
impl FakeHost {
    pub fn send(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }
    /// decode and clear everything written so far
    pub fn reports(&mut self) -> Vec<Report> {
        take_reports(&mut self.output)
    }
}
impl embedded_io::ErrorType for FakeHost {
    type Error = Infallible;
}
impl embedded_io::Read for FakeHost {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        assert!(self.closed || buf.is_empty() || !self.input.is_empty(), "read would block on an idle host link");
        let count = buf.len().min(self.input.len());
        for (slot, byte) in buf.iter_mut().zip(self.input.drain(.. count)) {
            *slot = byte;
        }
        Ok(count)
    }
}
impl embedded_io::ReadReady for FakeHost {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.closed || !self.input.is_empty())
    }
}
impl embedded_io::Write for FakeHost {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/**
    host link fed from another thread, reads block until a byte arrives like on a serial port

    a read blocked for longer than `patience` fails the test instead of hanging it
*/
pub struct UartHost {
    incoming: mpsc::Receiver<u8>,
    /// byte seen by `read_ready` and not read yet
    peeked: Option<u8>,
    patience: Duration,
    pub output: Vec<u8>,
}
impl UartHost {
    pub fn new() -> (Self, mpsc::Sender<u8>) {
        let (sender, incoming) = mpsc::channel();
        let host = Self {
            incoming,
            peeked: None,
            patience: Duration::from_millis(500),
            output: Vec::new(),
        };
        (host, sender)
    }
    pub fn reports(&mut self) -> Vec<Report> {
        take_reports(&mut self.output)
    }
}
impl embedded_io::ErrorType for UartHost {
    type Error = Infallible;
}
impl embedded_io::Read for UartHost {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let Some(first) = buf.first_mut() else {return Ok(0)};
        *first = match self.peeked.take() {
            Some(byte) => byte,
            None => self.incoming.recv_timeout(self.patience)
                .expect("master blocked reading the host link"),
        };
        Ok(1)
    }
}
impl embedded_io::ReadReady for UartHost {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        if self.peeked.is_none() {
            self.peeked = self.incoming.try_recv().ok();
        }
        Ok(self.peeked.is_some())
    }
}
impl embedded_io::Write for UartHost {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// sound counting its plays
#[derive(Default)]
pub struct FakeSound {
    pub selected: Option<u8>,
    pub plays: u32,
    /// assets that cannot be loaded
    pub missing: Vec<u8>,
}
impl Sound for FakeSound {
    fn select(&mut self, asset: u8) -> Result<(), SoundError> {
        if self.missing.contains(&asset) {
            return Err(SoundError::Open);
        }
        self.selected = Some(asset);
        Ok(())
    }
    fn play(&mut self) -> Result<(), SoundError> {
        if self.selected.is_none() {
            return Err(SoundError::NotLoaded);
        }
        self.plays += 1;
        Ok(())
    }
}
