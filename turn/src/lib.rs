#![warn(rust_2018_idioms)]

pub mod client;
mod error;
pub mod proto;

pub use client::{TurnClient, TurnClientConfig, TurnClientObserver, TurnClientState};
pub use error::{Error, Result};
