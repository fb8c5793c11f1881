//! Allstar CLI
//!
//! Command-line tools for serialized ATNs.

use std::fs;
use std::io::Read;
use std::sync::Arc;

use allstar_tools::cli::{Cli, Commands, OutputFormat};
use allstar_tools::{dot, inspect, lex, load};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { input, format } => {
            let atn = load::load_atn(&input.atn, input.words, &input.options())?;
            let summary = inspect::summarize(&atn);
            match format {
                OutputFormat::Text => print!("{}", inspect::render_text(&summary)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
            }
        }
        Commands::Dot {
            input,
            rule,
            rule_names,
            token_names,
            output,
        } => {
            let atn = load::load_atn(&input.atn, input.words, &input.options())?;
            let Some(content) = dot::rule_to_dot(&atn, rule, &rule_names, &token_names) else {
                return Err(format!("rule {rule} does not exist ({} rules)", atn.num_rules()).into());
            };
            if let Some(output_path) = output {
                fs::write(&output_path, content)?;
                eprintln!("Wrote rule {rule} to {}", output_path.display());
            } else {
                print!("{content}");
            }
        }
        Commands::Lex {
            input,
            text,
            file,
            show_dfa,
            format,
        } => {
            let atn = load::load_atn(&input.atn, input.words, &input.options())?;
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => fs::read_to_string(path)?,
                (None, None) => {
                    let mut buffer = String::new();
                    std::io::stdin().read_to_string(&mut buffer)?;
                    buffer
                }
            };
            let report = lex::lex(Arc::new(atn), &text, show_dfa)?;
            match format {
                OutputFormat::Text => print!("{}", lex::render_text(&report)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
            if !report.errors.is_empty() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
