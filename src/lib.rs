#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod adaptive;
pub mod config;
pub mod duplicate;
pub mod error;
pub mod factpack;
pub mod pipeline;
pub mod rate;
pub mod safety;
pub mod store;

pub use config::Config;
pub use error::{BotError, Result};
pub use pipeline::{CycleReport, Orchestrator};
pub use rate::CycleOutcome;
