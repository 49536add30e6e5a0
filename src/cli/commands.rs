//! CLI command definitions

use crate::core::state::StateValue;
use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use std::path::Path;

/// Validate a node document
#[derive(Debug, Args, Clone)]
pub struct ParseCommand {
    /// Path to a JSON or YAML node document
    #[arg(short, long)]
    pub file: String,

    /// Print the validated node as JSON
    #[arg(long)]
    pub json: bool,
}

/// Translate filter parameters
#[derive(Debug, Args, Clone)]
pub struct TranslateCommand {
    /// Node kind whose designated fields apply
    #[arg(short, long)]
    pub kind: Option<String>,

    /// Filter parameters (key=value, key__op=value)
    #[arg(value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,
}

/// Check a state transition
#[derive(Debug, Args, Clone)]
pub struct TransitionCommand {
    /// Current state
    #[arg(long)]
    pub from: StateValue,

    /// Proposed state
    #[arg(long)]
    pub to: StateValue,
}

/// Derive a regression
#[derive(Debug, Args, Clone)]
pub struct RegressionCommand {
    /// Path to the failing node document
    #[arg(long)]
    pub fail: String,

    /// Path to the passing node document
    #[arg(long)]
    pub pass: String,

    /// Print the regression as a plain document
    #[arg(long)]
    pub json: bool,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid key=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

/// Load a node document from a JSON or YAML file
pub fn load_document<P: AsRef<Path>>(path: P) -> Result<Value> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read node document: {}", path.display()))?;
    // YAML is a superset of JSON
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse node document: {}", path.display()))
}
