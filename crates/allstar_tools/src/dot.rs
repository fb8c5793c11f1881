//! Graphviz export of a single rule's ATN sub-graph.
//!
//! Rule invocations are drawn as dashed edges to the follow state, labelled
//! with the invoked rule; the callee's states are not expanded.

use std::collections::{BTreeSet, VecDeque};
use std::fmt::Write;

use allstar::{Atn, AtnStateKind, GrammarType, StateId, TransitionKind};

/// Renders rule `rule` as a `digraph`, or `None` if the rule does not exist.
/// `rule_names` and `token_names` label invocations and token edges when
/// given; missing names fall back to numbers.
#[must_use]
pub fn rule_to_dot(
    atn: &Atn,
    rule: usize,
    rule_names: &[String],
    token_names: &[String],
) -> Option<String> {
    let start = *atn.rule_to_start_state.get(rule)?;
    let rule_name = |r: usize| rule_names.get(r).cloned().unwrap_or_else(|| format!("r{r}"));

    let mut out = String::new();
    let _ = writeln!(out, "digraph \"{}\" {{", escape(&rule_name(rule)));
    out.push_str("  rankdir=LR;\n  node [shape=circle, fontsize=10];\n");

    let mut seen = BTreeSet::new();
    let mut pending = VecDeque::from([start]);
    let mut edges = String::new();
    while let Some(id) = pending.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        let state = atn.state(id);
        if state.is_rule_stop() {
            continue;
        }
        for transition in state.transitions() {
            let (target, label, style) = match &transition.kind {
                TransitionKind::Rule {
                    rule_index,
                    follow_state,
                    precedence,
                } => {
                    let mut label = rule_name(*rule_index);
                    if *precedence > 0 {
                        let _ = write!(label, "[{precedence}]");
                    }
                    (*follow_state, label, "dashed")
                }
                TransitionKind::Atom { label } => {
                    (transition.target, symbol_name(atn, *label, token_names), "solid")
                }
                _ => (transition.target, transition.to_string(), "solid"),
            };
            let _ = writeln!(
                edges,
                "  s{id} -> s{target} [label=\"{}\", style={style}];",
                escape(&label)
            );
            pending.push_back(target);
        }
    }

    for &id in &seen {
        let _ = writeln!(out, "  s{id} [{}];", node_attributes(atn, id));
    }
    out.push_str(&edges);
    out.push_str("}\n");
    Some(out)
}

fn node_attributes(atn: &Atn, id: StateId) -> String {
    let state = atn.state(id);
    let mut label = format!("s{id}");
    if let Some(decision) = state.decision {
        let _ = write!(label, "\\nd{decision}");
    }
    let shape = match state.kind {
        AtnStateKind::RuleStart { .. } => "doublecircle",
        AtnStateKind::RuleStop => "doubleoctagon",
        _ if state.decision.is_some() => "diamond",
        _ => "circle",
    };
    format!("label=\"{label}\", shape={shape}")
}

fn symbol_name(atn: &Atn, symbol: i32, token_names: &[String]) -> String {
    if symbol == -1 {
        return "EOF".to_owned();
    }
    if atn.grammar_type == GrammarType::Lexer {
        return match u32::try_from(symbol).ok().and_then(char::from_u32) {
            Some(c) if !c.is_control() => format!("'{c}'"),
            _ => format!("\\u{{{symbol:x}}}"),
        };
    }
    usize::try_from(symbol)
        .ok()
        .and_then(|s| token_names.get(s))
        .cloned()
        .unwrap_or_else(|| symbol.to_string())
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use allstar::atn::builder::AtnBuilder;

    use super::*;

    #[test]
    fn test_rule_graph_stops_at_invocations() {
        let mut g = AtnBuilder::parser(2);
        let s = g.rule();
        let a = g.rule();
        let call = g.rule_ref(s, a, 0);
        let tok = g.atom(s, 1);
        let body = g.sequence(s, vec![call, tok]);
        g.set_rule_body(s, body);
        let inner = g.atom(a, 2);
        g.set_rule_body(a, inner);
        let atn = g.finish().unwrap();

        let names = vec!["s".to_owned(), "a".to_owned()];
        let tokens = vec!["<INVALID>".to_owned(), "X".to_owned()];
        let dot = rule_to_dot(&atn, s, &names, &tokens).unwrap();
        assert!(dot.starts_with("digraph \"s\" {"));
        assert!(dot.contains("[label=\"a\", style=dashed]"));
        assert!(dot.contains("[label=\"X\", style=solid]"));
        assert!(!dot.contains(&format!("s{} [", atn.rule_to_start_state[a])));
        assert!(dot.contains("doubleoctagon"));
        assert!(rule_to_dot(&atn, 7, &[], &[]).is_none());
    }

    #[test]
    fn test_lexer_labels_are_characters() {
        let mut g = AtnBuilder::lexer(1);
        let r = g.lexer_rule(0, 1);
        let body = g.string(r, "ok");
        g.set_rule_body(r, body);
        let atn = g.finish().unwrap();
        let dot = rule_to_dot(&atn, r, &[], &[]).unwrap();
        assert!(dot.contains("label=\"'o'\""));
        assert!(dot.contains("label=\"'k'\""));
    }
}
