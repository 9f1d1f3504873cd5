pub mod analyzer;
pub mod boundary;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod git;
pub mod hosting;
pub mod license;
pub mod render;
pub mod ui;
pub mod vendor;

pub use error::{MirrorError, Result};
