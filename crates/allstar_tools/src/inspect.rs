//! Structural summary of a loaded ATN.

use std::collections::BTreeMap;
use std::fmt::Write;

use allstar::atn::NO_RULE;
use allstar::{Atn, AtnStateKind, GrammarType};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AtnSummary {
    pub grammar_type: GrammarType,
    pub max_token_type: i32,
    pub states: usize,
    pub transitions: usize,
    pub states_by_kind: BTreeMap<&'static str, usize>,
    pub rules: Vec<RuleSummary>,
    pub decisions: Vec<DecisionSummary>,
    pub modes: Vec<usize>,
    pub lexer_actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleSummary {
    pub index: usize,
    pub start_state: usize,
    pub stop_state: usize,
    /// Token type produced by a lexer rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<i32>,
    pub left_recursive: bool,
    pub states: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionSummary {
    pub decision: usize,
    pub state: usize,
    pub kind: &'static str,
    /// Rule of the decision state; absent for lexer mode starts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<usize>,
    pub alternatives: usize,
    pub non_greedy: bool,
    pub precedence: bool,
}

#[must_use]
pub fn summarize(atn: &Atn) -> AtnSummary {
    let mut states_by_kind = BTreeMap::new();
    let mut rule_sizes = vec![0; atn.num_rules()];
    for state in &atn.states {
        *states_by_kind.entry(state.kind.name()).or_insert(0) += 1;
        if let Some(size) = rule_sizes.get_mut(state.rule_index) {
            *size += 1;
        }
    }

    let rules = (0..atn.num_rules())
        .map(|index| RuleSummary {
            index,
            start_state: atn.rule_to_start_state[index],
            stop_state: atn.rule_to_stop_state[index],
            token_type: (atn.grammar_type == GrammarType::Lexer)
                .then(|| atn.rule_to_token_type.get(index).copied())
                .flatten(),
            left_recursive: atn.is_left_recursive(index),
            states: rule_sizes[index],
        })
        .collect();

    let decisions = atn
        .decision_to_state
        .iter()
        .enumerate()
        .map(|(decision, &state_number)| {
            let state = atn.state(state_number);
            DecisionSummary {
                decision,
                state: state_number,
                kind: state.kind.name(),
                rule: (state.rule_index != NO_RULE).then_some(state.rule_index),
                alternatives: state.num_transitions(),
                non_greedy: state.non_greedy,
                precedence: matches!(
                    state.kind,
                    AtnStateKind::StarLoopEntry {
                        is_precedence_decision: true,
                        ..
                    }
                ),
            }
        })
        .collect();

    AtnSummary {
        grammar_type: atn.grammar_type,
        max_token_type: atn.max_token_type,
        states: atn.states.len(),
        transitions: atn.num_transitions(),
        states_by_kind,
        rules,
        decisions,
        modes: atn.mode_to_start_state.clone(),
        lexer_actions: atn.lexer_actions.iter().map(ToString::to_string).collect(),
    }
}

/// Human-readable rendering of `summary`.
#[must_use]
pub fn render_text(summary: &AtnSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:?} ATN: {} states, {} transitions, max token type {}",
        summary.grammar_type, summary.states, summary.transitions, summary.max_token_type
    );
    out.push_str("\nstates by kind:\n");
    for (kind, count) in &summary.states_by_kind {
        let _ = writeln!(out, "  {kind:<16} {count}");
    }

    out.push_str("\nrules:\n");
    for rule in &summary.rules {
        let _ = write!(
            out,
            "  r{:<4} start {:<5} stop {:<5} {} states",
            rule.index, rule.start_state, rule.stop_state, rule.states
        );
        if let Some(token_type) = rule.token_type {
            let _ = write!(out, ", token type {token_type}");
        }
        if rule.left_recursive {
            out.push_str(", left-recursive");
        }
        out.push('\n');
    }

    out.push_str("\ndecisions:\n");
    for d in &summary.decisions {
        let _ = write!(
            out,
            "  d{:<4} s{:<5} {:<16} {} alts",
            d.decision, d.state, d.kind, d.alternatives
        );
        if let Some(rule) = d.rule {
            let _ = write!(out, " in r{rule}");
        }
        if d.non_greedy {
            out.push_str(", non-greedy");
        }
        if d.precedence {
            out.push_str(", precedence");
        }
        out.push('\n');
    }

    if !summary.modes.is_empty() {
        let _ = writeln!(out, "\nmodes: {:?}", summary.modes);
    }
    if !summary.lexer_actions.is_empty() {
        out.push_str("\nlexer actions:\n");
        for (i, action) in summary.lexer_actions.iter().enumerate() {
            let _ = writeln!(out, "  {i:<4} {action}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use allstar::atn::builder::AtnBuilder;
    use allstar::atn::lexer_action::LexerAction;

    use super::*;

    #[test]
    fn test_parser_summary() {
        let mut g = AtnBuilder::parser(2);
        let s = g.rule();
        let a = g.atom(s, 1);
        let b = g.atom(s, 2);
        let body = g.star(s, vec![a, b], false);
        g.set_rule_body(s, body);
        let atn = g.finish().unwrap();

        let summary = summarize(&atn);
        assert_eq!(summary.rules.len(), 1);
        assert_eq!(summary.rules[0].token_type, None);
        assert_eq!(summary.decisions.len(), 2);
        assert!(!summary.decisions[0].non_greedy);
        assert!(summary.decisions[1].non_greedy);
        assert_eq!(summary.decisions[1].kind, "STAR_LOOP_ENTRY");
        assert_eq!(summary.states_by_kind["STAR_LOOP_ENTRY"], 1);

        let text = render_text(&summary);
        assert!(text.starts_with("Parser ATN:"));
        assert!(text.contains("non-greedy"));
    }

    #[test]
    fn test_lexer_summary_json() {
        let mut g = AtnBuilder::lexer(1);
        let r = g.lexer_rule(0, 1);
        let x = g.atom(r, 'x' as i32);
        let skip = g.lexer_action(r, LexerAction::Skip);
        let body = g.sequence(r, vec![x, skip]);
        g.set_rule_body(r, body);
        let summary = summarize(&g.finish().unwrap());

        assert_eq!(summary.rules[0].token_type, Some(1));
        assert_eq!(summary.decisions[0].rule, None);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["grammar_type"], "Lexer");
        assert_eq!(json["lexer_actions"][0], "skip");
        assert_eq!(json["modes"].as_array().unwrap().len(), 1);
    }
}
