/*!
    host side of the serial link, for the experiment controller

    The [Controller] sends commands to a master and decodes the reports it relays. It works on any tokio byte stream, typically a serial port.
*/

use std::{
    time::Duration,
    vec::Vec,
    };
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncReadExt, AsyncWriteExt},
    time::{Instant, timeout, timeout_at},
    };
use thiserror::Error;
use log::*;

use crate::protocol::{Control, Parameter, Report, MAX_REPORT, TERMINATOR, MASTER_ID, MAX_TAPPERS};


/// error regarding the host link
#[derive(Error, Debug)]
pub enum HostError {
    #[error("problem with serial link")]
    Link(#[from] std::io::Error),
    #[error("problem detected on host side: {0}")]
    Host(&'static str),
    #[error("no data arrived in expected time")]
    Timeout,
}

/// async driver of a master from the host
pub struct Controller<P> {
    port: P,
    timeout: Duration,
}
impl<P: AsyncRead + AsyncWrite + Unpin> Controller<P> {
    pub fn new(port: P) -> Self {
        Self {port, timeout: Duration::from_millis(100)}
    }
    /// time to wait for a report before giving up
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {timeout, .. self}
    }
    pub fn into_inner(self) -> P {self.port}

    pub async fn start(&mut self) -> Result<(), HostError> {
        self.control(Control::Start).await
    }
    pub async fn stop(&mut self) -> Result<(), HostError> {
        self.control(Control::Stop).await
    }
    /// ask for a state report, it arrives among the other reports
    pub async fn query_state(&mut self) -> Result<(), HostError> {
        self.control(Control::QueryState).await
    }
    async fn control(&mut self, control: Control) -> Result<(), HostError> {
        self.port.write_all(&[control as u8]).await?;
        self.port.flush().await?;
        Ok(())
    }

    /// set a parameter on the master (recipient 0) or on a tapper (recipients 1 to 4)
    pub async fn set(&mut self, recipient: u8, parameter: Parameter) -> Result<(), HostError> {
        if recipient != MASTER_ID && usize::from(recipient) > MAX_TAPPERS {
            return Err(HostError::Host("no such recipient"));
        }
        let value = parameter.value();
        let mut command = Vec::with_capacity(value.len() + 3);
        command.extend_from_slice(&[recipient, parameter.id() as u8]);
        command.extend_from_slice(value.as_bytes());
        command.push(TERMINATOR);
        debug!("set {:?} on {}", parameter, recipient);
        self.port.write_all(&command).await?;
        self.port.flush().await?;
        Ok(())
    }

    /**
        wait for the next report

        bytes that cannot start a frame are skipped, to catch up with the frame boundaries after a glitch
    */
    pub async fn receive(&mut self) -> Result<Report, HostError> {
        timeout(self.timeout, self.read_report()).await
            .map_err(|_| HostError::Timeout)?
    }
    async fn read_report(&mut self) -> Result<Report, HostError> {
        let mut frame = [0u8; MAX_REPORT];
        // loop until a frame start is found
        let size = loop {
            self.port.read_exact(&mut frame[.. 1]).await?;
            match Report::size(frame[0]) {
                Some(size) => break size,
                None => debug!("catching up frame, skipped {:#x}", frame[0]),
            }
        };
        self.port.read_exact(&mut frame[1 .. size]).await?;
        trace!("received {:?}", &frame[.. size]);
        Report::decode(&frame[.. size]) .ok_or(HostError::Host("malformed report"))
    }

    /**
        run an experiment for `duration`: start the master, collect every report it sends, then stop it

        reports arriving after the stop command are not collected
    */
    pub async fn acquire(&mut self, duration: Duration) -> Result<Vec<Report>, HostError> {
        let deadline = Instant::now() + duration;
        let mut reports = Vec::new();
        self.start().await?;
        loop {
            match timeout_at(deadline, self.read_report()).await {
                Ok(report) => {
                    let report = report?;
                    if let Report::Error {code} = report {
                        warn!("master reported error {}", code);
                    }
                    reports.push(report);
                },
                Err(_) => break,
            }
        }
        self.stop().await?;
        info!("acquired {} reports", reports.len());
        Ok(reports)
    }
}
