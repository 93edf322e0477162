//! # ucml
//!
//! Command-line driver for `ucml-core`. The binary in `main.rs` only sets up
//! logging and hands the parsed arguments to [`cli::execute`].

pub mod cli;
