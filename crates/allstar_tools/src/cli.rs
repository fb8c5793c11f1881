//! Command-line interface definition.

use std::path::PathBuf;

use allstar::options::DeserializationOptions;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "allstar")]
#[command(about = "Inspect serialized ATNs and run the lexer simulator")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// How the ATN file is read.
#[derive(Args, Debug, Clone)]
pub struct AtnInput {
    /// File with the serialized ATN (comma or whitespace separated integers)
    pub atn: PathBuf,

    /// Values are packed 16-bit words
    #[arg(long)]
    pub words: bool,

    /// Skip structural verification
    #[arg(long)]
    pub no_verify: bool,

    /// Add rule bypass transitions (parser ATNs)
    #[arg(long)]
    pub bypass: bool,
}

impl AtnInput {
    #[must_use]
    pub const fn options(&self) -> DeserializationOptions {
        DeserializationOptions {
            verify_atn: !self.no_verify,
            generate_rule_bypass_transitions: self.bypass,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Summarize states, rules and decisions
    Inspect {
        #[command(flatten)]
        input: AtnInput,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Export one rule's ATN as Graphviz
    Dot {
        #[command(flatten)]
        input: AtnInput,

        /// Rule index
        #[arg(short, long, default_value_t = 0)]
        rule: usize,

        /// Comma separated rule names, by index
        #[arg(long, value_delimiter = ',')]
        rule_names: Vec<String>,

        /// Comma separated token names, by token type
        #[arg(long, value_delimiter = ',')]
        token_names: Vec<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Tokenize text with a lexer ATN
    Lex {
        #[command(flatten)]
        input: AtnInput,

        /// Text to tokenize
        #[arg(short, long, conflicts_with = "file")]
        text: Option<String>,

        /// File to tokenize (default: stdin)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Print the lexer DFA of every mode after the tokens
        #[arg(long)]
        show_dfa: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {s}. Supported: text, json")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lex_command() {
        let cli = Cli::try_parse_from([
            "allstar", "lex", "atn.txt", "--words", "--text", "x1 42", "--format", "json",
        ])
        .unwrap();
        let Commands::Lex {
            input,
            text,
            format,
            show_dfa,
            ..
        } = cli.command
        else {
            panic!("expected lex");
        };
        assert!(input.words);
        assert!(input.options().verify_atn);
        assert_eq!(text.as_deref(), Some("x1 42"));
        assert_eq!(format, OutputFormat::Json);
        assert!(!show_dfa);
    }

    #[test]
    fn test_parse_dot_names() {
        let cli = Cli::try_parse_from([
            "allstar", "dot", "atn.txt", "--rule", "2", "--rule-names", "a,b,c", "--no-verify",
        ])
        .unwrap();
        let Commands::Dot {
            input,
            rule,
            rule_names,
            ..
        } = cli.command
        else {
            panic!("expected dot");
        };
        assert_eq!(rule, 2);
        assert_eq!(rule_names, vec!["a", "b", "c"]);
        assert!(!input.options().verify_atn);
    }

    #[test]
    fn test_unknown_format() {
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
