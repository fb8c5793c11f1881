//! Allstar Tools - command-line utilities for serialized ATNs
//!
//! Loading ATN files, structural summaries, Graphviz export of rules and
//! tokenizing text with a lexer ATN.

pub mod cli;
pub mod dot;
pub mod inspect;
pub mod lex;
pub mod load;
