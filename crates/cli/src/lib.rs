//! `auditwatch` command-line front end.
//!
//! Submits a contract (file upload or address fetch), starts the analysis
//! and prints workflow progress as the tracker reports it.

pub mod args;
pub mod render;
pub mod run;

pub use args::Cli;
pub use run::run;
