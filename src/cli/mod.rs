//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{ParseCommand, RegressionCommand, TransitionCommand, TranslateCommand};
use std::ffi::OsString;

/// Node model tool for the KernelCI pipeline
#[derive(Debug, Parser, Clone)]
#[command(name = "kci-model")]
#[command(version = "0.1.0")]
#[command(about = "Validate nodes, translate queries and derive regressions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to model configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Validate a node document
    Parse(ParseCommand),

    /// Translate filter parameters into a store query
    Translate(TranslateCommand),

    /// Check a node state transition
    Transition(TransitionCommand),

    /// Derive a regression from a failing and a passing node
    Regression(RegressionCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
