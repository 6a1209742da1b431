#![forbid(unsafe_code)]

pub mod config;
pub mod detect;
pub mod error;
pub mod language;
pub mod logging;
pub mod mangadex;
pub mod scheduler;
pub mod webhook;

pub use error::{Error, Result};
