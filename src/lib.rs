//! A structured command-line parser for heterogeneous message streams.
//!
//! See [`core::Alconna`] for the grammar builder and top-level `parse` entry
//! point, and [`manager::CommandManager`] for registering many commands
//! under a shared namespace.

pub mod analyser;
pub mod args;
pub mod argv;
pub mod builtin;
pub mod config;
pub mod core;
pub mod error;
pub mod header;
pub mod logging;
pub mod manager;
pub mod option;
pub mod param;
pub mod pattern;
pub mod result;
pub mod shortcut;
pub mod subcommand;

pub use core::{option as Option, subcommand as Subcommand, Alconna};
pub use error::{AlconnaError, ParseSignal};
pub use result::Arparma;
