//! # chademo-ctl - vehicle-side CHAdeMO fast-charge controller
//!
//! Control logic for an electric vehicle talking CHAdeMO to a DC fast-charging
//! station while listening to its own battery management system.
//!
//! ## Features
//!
//! - **Session state machine**: one `handle` entry point over a closed set of
//!   states and events, with charge-enable and contactor permission tied to
//!   the states that allow them
//! - **Current ramp**: rate-limited requests toward the lesser of the BMS and
//!   station limits, with constant-current and constant-voltage phases
//! - **Liveness supervision**: BMS and station silence ends the session
//! - **Wire codec**: BMS, station and vehicle frames, bit for bit
//! - **Async runtime**: a single dispatcher fed by frame pollers and an edge
//!   monitor through one queue
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `battery` / `station`: Snapshots of what the peers last reported
//! - `session`: Session fields, vehicle status flags, time estimates
//! - `ramp`: Current request ramp controller
//! - `liveness`: Peer time-to-live supervision
//! - `codec`: Inbound decoders and outbound encoders
//! - `hal`: Bus and signal line boundary traits
//! - `controller`: The charging session state machine
//! - `runtime`: Tokio dispatcher, timers and producers

pub mod battery;
pub mod codec;
pub mod config;
pub mod controller;
pub mod error;
pub mod hal;
pub mod liveness;
pub mod logging;
pub mod ramp;
pub mod runtime;
pub mod session;
pub mod station;

// Re-export commonly used types
pub use config::Config;
pub use controller::{Action, ChargeController, Event, State};
pub use error::{ChademoError, Result};
pub use runtime::{ChargeRuntime, Hardware};
