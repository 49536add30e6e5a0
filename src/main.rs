use anyhow::{Context, Result};
use kci_model::cli::commands::{load_document, ParseCommand, RegressionCommand, TransitionCommand, TranslateCommand};
use kci_model::cli::output::*;
use kci_model::cli::{Cli, Command};
use kci_model::core::{validate_node_state_transition, ModelConfig, Schema, SystemClock};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let config = match &cli.config {
        Some(path) => ModelConfig::from_file(path).context("Failed to load model config")?,
        None => ModelConfig::default(),
    };
    debug!("Model config: {:?}", config);
    let schema = Schema::new(config, Arc::new(SystemClock));

    // Execute command
    let ok = match &cli.command {
        Command::Parse(cmd) => parse_node(&schema, cmd)?,
        Command::Translate(cmd) => translate(&schema, cmd)?,
        Command::Transition(cmd) => transition(cmd),
        Command::Regression(cmd) => regression(&schema, cmd)?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_node(schema: &Schema, cmd: &ParseCommand) -> Result<bool> {
    let doc = load_document(&cmd.file)?;

    match schema.parse_node(&doc) {
        Ok(node) => {
            println!("{} Node document is valid!", CHECK);
            println!("{}", format_node(&node));
            println!("  Result: {}", format_result(node.result()));

            if cmd.json {
                let json = serde_json::to_string_pretty(&node.to_document(true)?)?;
                println!("\n{}", json);
            }
            Ok(true)
        }
        Err(e) => {
            println!("{}", format_model_error(&e));
            Ok(false)
        }
    }
}

fn translate(schema: &Schema, cmd: &TranslateCommand) -> Result<bool> {
    let params = cmd
        .params
        .iter()
        .map(|(key, value)| (key.as_str(), Value::String(value.clone())));

    match schema.translate(cmd.kind.as_deref(), params) {
        Ok(filter) => {
            println!(
                "{} Translated filter for {}:",
                INFO,
                style(cmd.kind.as_deref().unwrap_or("any node")).bold()
            );
            println!("{}", format_filter(&filter));
            println!("\n{}", serde_json::to_string_pretty(&filter)?);
            Ok(true)
        }
        Err(e) => {
            println!("{}", format_model_error(&e));
            Ok(false)
        }
    }
}

fn transition(cmd: &TransitionCommand) -> bool {
    let check = validate_node_state_transition(cmd.from, cmd.to);
    println!("{}", format_transition(cmd.from, cmd.to, &check));
    check.allowed
}

fn regression(schema: &Schema, cmd: &RegressionCommand) -> Result<bool> {
    let fail_doc = load_document(&cmd.fail)?;
    let pass_doc = load_document(&cmd.pass)?;

    let nodes = schema
        .parse_node(&fail_doc)
        .and_then(|fail| Ok((fail, schema.parse_node(&pass_doc)?)));
    let (fail, pass) = match nodes {
        Ok(nodes) => nodes,
        Err(e) => {
            println!("{}", format_model_error(&e));
            return Ok(false);
        }
    };

    if cmd.json {
        return match schema.create_regression_document(&fail, &pass) {
            Ok(doc) => {
                println!("{}", serde_json::to_string_pretty(&doc)?);
                Ok(true)
            }
            Err(e) => {
                println!("{}", format_model_error(&e));
                Ok(false)
            }
        };
    }

    match schema.create_regression(&fail, &pass) {
        Ok(regression) => {
            println!("{} Regression detected", WARN);
            println!("  Path: {}", style(regression.path.join("/")).bold());
            println!("  Fail node: {}", style(fail.display_id()).red());
            println!("  Pass node: {}", style(pass.display_id()).green());
            println!("  State: {}", format_state(regression.state));
            println!("  Result: {}", format_result(regression.result));
            Ok(true)
        }
        Err(e) => {
            println!("{} {}", CROSS, style(e).red());
            Ok(false)
        }
    }
}
