#![no_std]
#[cfg(any(feature = "std", test))]
extern crate std;

mod error;

pub mod lock;
pub mod clock;
pub mod config;
pub mod protocol;
pub mod metronome;
pub mod tapper;
pub mod sound;
pub mod report;
pub mod coordinator;
#[cfg(feature = "host")]
pub mod controller;

pub use error::Error;
pub use config::Config;
pub use coordinator::Coordinator;
