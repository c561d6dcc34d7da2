use embedded_io::{Write, Error as _};
use log::*;

use crate::{
    clock::Timestamp,
    error::Error,
    protocol::{Report, MAX_REPORT},
    };


/**
    sends reports to the host, the only sink of errors and diagnostics

    it keeps track of the last error reported
*/
#[derive(Debug, Default)]
pub struct Reporter {
    /// also send diagnostic frames
    debug: bool,
    last: Option<Error>,
}
impl Reporter {
    pub fn new(debug: bool) -> Self {
        Self {debug, last: None}
    }
    pub fn debug(&self) -> bool {self.debug}
    pub fn has_error(&self) -> bool {self.last.is_some()}
    pub fn last_error(&self) -> Option<Error> {self.last}

    /// relay an error to the host
    pub fn error<W: Write>(&mut self, host: &mut W, error: Error) {
        warn!("{}", error);
        self.last = Some(error);
        self.send(host, Report::Error {code: error.code()});
    }
    /// relay a tap time, `slot` is the index of the tapper
    pub fn timing<W: Write>(&mut self, host: &mut W, slot: usize, time: Timestamp) {
        self.send(host, Report::Timing {device: slot as u8 + 1, time});
    }
    /// relay the last adjustment, only in debug mode
    pub fn adjustment<W: Write>(&mut self, host: &mut W, adjustment: i32) {
        if self.debug {
            let clamped = adjustment.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
            self.send(host, Report::Adjustment(clamped));
        }
    }
    /// write a frame, failures of the host link cannot be reported anywhere but in logs
    pub fn send<W: Write>(&mut self, host: &mut W, report: Report) {
        let mut buffer = [0; MAX_REPORT];
        let frame = report.encode(&mut buffer);
        trace!("report {:?}", frame);
        if let Err(error) = host.write_all(frame).and_then(|_| host.flush()) {
            warn!("host link lost a report: {:?}", error.kind());
        }
    }
}
