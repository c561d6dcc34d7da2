/*!
    master node: drives the metronome, the tappers and the host link

    A typical firmware main loop looks like:

    ```ignore
    static TAPPERS: Registry = Registry::new();

    let mut master = Coordinator::new(&TAPPERS, Config::default(), i2c, delay, uart, sound, clock)?;
    master.initialize_tappers();
    loop {
        master.run_once();
    }
    ```
*/

use embedded_hal::{
    i2c::{I2c, Error as _},
    delay::DelayNs,
    };
use embedded_io::{Read, ReadReady, Write, Error as _};
use log::*;

use crate::{
    clock::{Clock, reached},
    config::Config,
    error::Error,
    metronome::Metronome,
    protocol::*,
    report::Reporter,
    sound::Sound,
    tapper::{Registry, Sample},
    };


/// the master node, generic over its hardware
pub struct Coordinator<'r, B, D, H, S, C> {
    /// tapper slots, shared with the interrupt handlers
    registry: &'r Registry,
    metronome: Metronome,
    config: Config,
    reporter: Reporter,
    phase: Phase,
    /// tapper count requested by the host, if any
    requested: Option<u8>,
    initialized: bool,
    /// host command being received
    parser: CommandParser,

    bus: B,
    delay: D,
    host: H,
    sound: S,
    clock: C,
}

impl<'r, B, D, H, S, C> Coordinator<'r, B, D, H, S, C>
where
    B: I2c,
    D: DelayNs,
    H: Read + ReadReady + Write,
    S: Sound,
    C: Clock,
{
    /// fails only if the configuration cannot start a run, a sound failure is reported to the host instead
    pub fn new(registry: &'r Registry, config: Config, bus: B, delay: D, host: H, sound: S, clock: C) -> Result<Self, Error> {
        let metronome = Metronome::new(&config)?;
        let mut new = Self {
            registry,
            metronome,
            config,
            reporter: Reporter::new(config.debug),
            phase: Phase::Idle,
            requested: None,
            initialized: false,
            parser: CommandParser::new(),
            bus,
            delay,
            host,
            sound,
            clock,
        };
        if let Err(error) = new.sound.select(config.sound_asset) {
            new.reporter.error(&mut new.host, error.into());
        }
        Ok(new)
    }

    pub fn metronome(&self) -> &Metronome {&self.metronome}
    pub fn reporter(&self) -> &Reporter {&self.reporter}
    pub fn phase(&self) -> Phase {self.phase}
    pub fn requested(&self) -> Option<u8> {self.requested}
    pub fn host_mut(&mut self) -> &mut H {&mut self.host}
    pub fn bus_mut(&mut self) -> &mut B {&mut self.bus}
    pub fn sound_mut(&mut self) -> &mut S {&mut self.sound}

    /**
        handshake with every tapper slot in turn, returns the number of connected tappers

        a slot that does not answer within the handshake timeout is excluded for the whole run, later edges on its line are ignored. Only the first call does the handshakes, later ones return the current count.
    */
    pub fn initialize_tappers(&mut self) -> u8 {
        if !self.initialized {
            self.initialized = true;
            for slot in 0 .. usize::from(self.config.max_tappers) {
                if let Err(error) = self.handshake(slot) {
                    // a late answer must not connect the slot, slots that were never armed stay as they are
                    self.registry.exclude(slot).ok();
                    self.reporter.error(&mut self.host, error);
                }
            }
            self.registry.dump();
        }
        let connected = self.registry.connected();
        info!("{} tappers connected", connected);
        self.check_count();
        connected
    }
    fn handshake(&mut self, slot: usize) -> Result<(), Error> {
        self.registry.arm(slot)?;
        self.bus.write(address(slot), &[REQUEST_ACK])
            .map_err(|error| Error::Bus(error.kind()))?;
        let mut waited = 0;
        loop {
            if self.registry.is_connected(slot) {
                info!("tapper {} connected", slot);
                return Ok(());
            }
            if waited >= self.config.handshake_timeout_ms {
                return Err(Error::HandshakeTimeout(slot as u8));
            }
            self.delay.delay_ms(1);
            waited += 1;
        }
    }
    /// report a difference between requested and connected tappers, once the handshakes are done
    fn check_count(&mut self) {
        if !self.initialized {
            return;
        }
        let connected = self.registry.connected();
        if let Some(requested) = self.requested {
            if requested != connected {
                self.reporter.error(&mut self.host, Error::TapperCount {connected, requested});
            }
        }
    }

    /**
        one iteration of the main loop: serve pending host commands, then beat and schedule

        only the bytes already received are read, a command still on the wire is completed by later iterations
    */
    pub fn run_once(&mut self) -> Option<i32> {
        loop {
            match self.host.read_ready() {
                Ok(true) => if let Err(error) = self.receive() {
                    let lost = matches!(error, Error::HostLink(_));
                    self.reporter.error(&mut self.host, error);
                    if lost {break}
                },
                Ok(false) => break,
                Err(error) => {
                    self.reporter.error(&mut self.host, Error::HostLink(error.kind()));
                    break
                },
            }
        }
        self.poll()
    }

    /**
        trigger the beat when due, and run the scheduling cycle at the end of the window

        the window of a beat ends half an interval after it, taps until then are attributed to that beat. Returns the adjustment when a cycle ran.
    */
    pub fn poll(&mut self) -> Option<i32> {
        if self.phase != Phase::Running {
            return None;
        }
        let now = self.clock.now();
        if self.metronome.due(now) {
            if let Err(error) = self.sound.play() {
                self.reporter.error(&mut self.host, error.into());
            }
            self.metronome.mark_played();
            trace!("beat at {}", now);
        }
        let beat = self.metronome.next_beat();
        let end = beat.wrapping_add(self.metronome.ioi() / 2);
        if self.metronome.played() && reached(now, end) {
            return Some(self.cycle(beat));
        }
        None
    }
    fn cycle(&mut self, beat: u32) -> i32 {
        let samples: heapless::Vec<Sample, MAX_TAPPERS> = self.registry.window(beat).collect();
        for (slot, sample) in samples.iter().enumerate() {
            if let Some(tap) = sample.tap {
                self.reporter.timing(&mut self.host, slot, tap);
            }
        }
        let adjustment = self.metronome.schedule_next(samples, self.config.heuristic);
        self.reporter.adjustment(&mut self.host, adjustment);
        adjustment
    }

    /// read one byte from the host, and execute the command it completes
    fn receive(&mut self) -> Result<(), Error> {
        let mut byte = [0];
        let read = self.host.read(&mut byte)
            .map_err(|error| Error::HostLink(error.kind()))?;
        if read == 0 {
            // end of file on the host link means it was closed
            return Err(Error::HostLink(embedded_io::ErrorKind::BrokenPipe));
        }
        match self.parser.feed(byte[0]) {
            Some(command) => self.process_command(command?),
            None => Ok(()),
        }
    }

    /// execute a complete command from the host
    pub fn process_command(&mut self, command: Command) -> Result<(), Error> {
        match command {
            Command::Control(control) => self.control(control),
            Command::Set {recipient: MASTER_ID, id, value} => {
                trace!("command for master: parameter {} = {:?}", id, value.as_slice());
                let value = core::str::from_utf8(&value) .map_err(|_| Error::InvalidValue)?;
                self.set_parameter(Parameter::parse(id, value)?)
            },
            Command::Set {recipient, id, value} if usize::from(recipient) <= MAX_TAPPERS =>
                self.forward(usize::from(recipient) - 1, id, &value),
            Command::Set {recipient, ..} => Err(Error::UnknownRecipient(recipient)),
        }
    }
    fn control(&mut self, control: Control) -> Result<(), Error> {
        let name: &'static str = control.into();
        debug!("control {}", name);
        match control {
            Control::Start => if self.phase == Phase::Idle {
                self.registry.clear_taps();
                self.metronome.start(self.clock.now());
                self.phase = Phase::Running;
                info!("run started at {} bpm", self.metronome.tempo().bpm());
            },
            Control::Stop => if self.phase == Phase::Running {
                self.phase = Phase::Idle;
                info!("run stopped");
            },
            Control::QueryState => {
                let report = Report::State {
                    phase: self.phase,
                    connected: self.registry.connected(),
                    requested: self.requested.unwrap_or(0),
                    };
                self.reporter.send(&mut self.host, report);
            },
        }
        Ok(())
    }

    /// apply a parameter to the master
    pub fn set_parameter(&mut self, parameter: Parameter) -> Result<(), Error> {
        debug!("set {:?}", parameter);
        match parameter {
            Parameter::Alpha(alpha) => self.metronome.set_alpha(alpha),
            Parameter::Tempo(bpm) => self.metronome.set_tempo(bpm),
            Parameter::SoundAsset(asset) => {
                self.sound.select(asset)?;
                self.config.sound_asset = asset;
                Ok(())
            },
            Parameter::TapperCount(requested) => {
                self.requested = Some(requested);
                self.check_count();
                Ok(())
            },
        }
    }
    /// send a parameter to a tapper, parameters for disconnected tappers are dropped
    fn forward(&mut self, slot: usize, id: u8, value: &[u8]) -> Result<(), Error> {
        ParameterId::from_repr(id) .ok_or(Error::UnknownParameter(id))?;
        if !self.registry.is_connected(slot) {
            warn!("tapper {} not connected, parameter {} dropped", slot, id);
            return Ok(());
        }
        let message = parameter_message(id, value)?;
        self.bus.write(address(slot), &message)
            .map_err(|error| Error::Bus(error.kind()))
    }
}

/// bus address of a tapper slot
fn address(slot: usize) -> u8 {
    slot as u8 + 1
}
