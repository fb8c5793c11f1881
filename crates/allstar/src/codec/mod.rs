//! # ATN Codec
//!
//! Binary form of an [`Atn`](crate::atn::Atn): a flat sequence of integers,
//! optionally packed into 16-bit words for embedding in generated code.
//!
//! ## Overview
//!
//! The layout is, in order:
//!
//! 1. header: format version, grammar type, max token type
//! 2. states: type and rule index, plus the partner state of loop ends and
//!    block starts
//! 3. non-greedy decision states, then left-recursive rule start states
//! 4. rules: start state (and token type for lexers)
//! 5. mode start states
//! 6. interval sets: interval count, contains-EOF flag, bounds
//! 7. edges: source, target, kind and three kind-specific arguments
//! 8. decision states, in decision-number order
//! 9. lexer actions (lexers only): kind and two arguments
//!
//! Return edges out of rule stop states are not stored; [`deserialize`]
//! derives them from the rule transitions, links partner states, and
//! verifies the result before handing it out.

mod deserializer;
mod serializer;
mod words;

pub use deserializer::{deserialize, deserialize_words};
pub use serializer::{serialize, serialize_words};
pub use words::{decode_words, encode_words};

/// Version of the serialized format read and written by this crate.
pub const SERIALIZED_VERSION: i32 = 4;
