pub mod boundary;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod forge;
pub mod git;
pub mod notes;
pub mod ui;
pub mod upgrade;

pub use error::{ReleaseError, Result};
