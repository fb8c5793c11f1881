//! Lexer commands attached to lexer rules (`-> skip`, `-> channel(HIDDEN)`,
//! embedded `{...}` actions).

use std::fmt;

use crate::error::StateError;
use crate::lexer::LexerState;
use crate::recognizer::LexerRecognizer;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LexerAction {
    Channel(i32),
    /// Embedded action, dispatched to the recognizer.
    Custom {
        rule_index: usize,
        action_index: usize,
    },
    Mode(usize),
    More,
    PopMode,
    PushMode(usize),
    Skip,
    Type(i32),
    /// A position-dependent action pinned to `offset` characters past the
    /// token start.
    Indexed {
        offset: usize,
        action: Box<LexerAction>,
    },
}

pub(crate) const CHANNEL: i32 = 0;
pub(crate) const CUSTOM: i32 = 1;
pub(crate) const MODE: i32 = 2;
pub(crate) const MORE: i32 = 3;
pub(crate) const POP_MODE: i32 = 4;
pub(crate) const PUSH_MODE: i32 = 5;
pub(crate) const SKIP: i32 = 6;
pub(crate) const TYPE: i32 = 7;

impl LexerAction {
    /// Serialized action-type code. Indexed actions serialize as their inner action.
    #[must_use]
    pub fn type_code(&self) -> i32 {
        match self {
            Self::Channel(_) => CHANNEL,
            Self::Custom { .. } => CUSTOM,
            Self::Mode(_) => MODE,
            Self::More => MORE,
            Self::PopMode => POP_MODE,
            Self::PushMode(_) => PUSH_MODE,
            Self::Skip => SKIP,
            Self::Type(_) => TYPE,
            Self::Indexed { action, .. } => action.type_code(),
        }
    }

    /// The two serialized data words.
    #[must_use]
    pub fn data(&self) -> (i32, i32) {
        match self {
            Self::Channel(channel) => (*channel, 0),
            Self::Custom {
                rule_index,
                action_index,
            } => (*rule_index as i32, *action_index as i32),
            Self::Mode(mode) | Self::PushMode(mode) => (*mode as i32, 0),
            Self::Type(token_type) => (*token_type, 0),
            Self::More | Self::PopMode | Self::Skip => (0, 0),
            Self::Indexed { action, .. } => action.data(),
        }
    }

    /// Inverse of [`LexerAction::type_code`] and [`LexerAction::data`].
    #[must_use]
    pub fn from_serialized(code: i32, data1: i32, data2: i32) -> Option<Self> {
        let index = |v: i32| usize::try_from(v).ok();
        Some(match code {
            CHANNEL => Self::Channel(data1),
            CUSTOM => Self::Custom {
                rule_index: index(data1)?,
                action_index: index(data2)?,
            },
            MODE => Self::Mode(index(data1)?),
            MORE => Self::More,
            POP_MODE => Self::PopMode,
            PUSH_MODE => Self::PushMode(index(data1)?),
            SKIP => Self::Skip,
            TYPE => Self::Type(data1),
            _ => return None,
        })
    }

    /// Actions that read the input position must run where they appeared in
    /// the rule, not at the end of the token.
    #[must_use]
    pub const fn is_position_dependent(&self) -> bool {
        matches!(self, Self::Custom { .. } | Self::Indexed { .. })
    }

    pub fn execute(
        &self,
        state: &mut LexerState,
        recognizer: &mut dyn LexerRecognizer,
    ) -> Result<(), StateError> {
        match self {
            Self::Channel(channel) => state.set_channel(*channel),
            Self::Custom {
                rule_index,
                action_index,
            } => recognizer.action(state, *rule_index, *action_index),
            Self::Mode(mode) => state.set_mode(*mode),
            Self::More => state.more(),
            Self::PopMode => {
                state.pop_mode()?;
            }
            Self::PushMode(mode) => state.push_mode(*mode),
            Self::Skip => state.skip(),
            Self::Type(token_type) => state.set_type(*token_type),
            Self::Indexed { action, .. } => action.execute(state, recognizer)?,
        }
        Ok(())
    }
}

impl fmt::Display for LexerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(channel) => write!(f, "channel({channel})"),
            Self::Custom {
                rule_index,
                action_index,
            } => write!(f, "action({rule_index}, {action_index})"),
            Self::Mode(mode) => write!(f, "mode({mode})"),
            Self::More => f.write_str("more"),
            Self::PopMode => f.write_str("popMode"),
            Self::PushMode(mode) => write!(f, "pushMode({mode})"),
            Self::Skip => f.write_str("skip"),
            Self::Type(token_type) => write!(f, "type({token_type})"),
            Self::Indexed { offset, action } => write!(f, "{action}@{offset}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_form_round_trips() {
        let actions = [
            LexerAction::Channel(1),
            LexerAction::Custom {
                rule_index: 2,
                action_index: 5,
            },
            LexerAction::Mode(1),
            LexerAction::More,
            LexerAction::PopMode,
            LexerAction::PushMode(3),
            LexerAction::Skip,
            LexerAction::Type(9),
        ];
        for action in actions {
            let (d1, d2) = action.data();
            assert_eq!(
                LexerAction::from_serialized(action.type_code(), d1, d2),
                Some(action)
            );
        }
        assert_eq!(LexerAction::from_serialized(8, 0, 0), None);
    }

    #[test]
    fn test_position_dependence() {
        assert!(!LexerAction::Skip.is_position_dependent());
        let custom = LexerAction::Custom {
            rule_index: 0,
            action_index: 0,
        };
        assert!(custom.is_position_dependent());
        let indexed = LexerAction::Indexed {
            offset: 2,
            action: Box::new(custom),
        };
        assert_eq!(indexed.type_code(), CUSTOM);
        assert_eq!(indexed.to_string(), "action(0, 0)@2");
    }
}
