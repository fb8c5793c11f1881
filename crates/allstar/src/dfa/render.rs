use std::fmt::Write as _;

use super::{Dfa, DfaState};
use crate::options::LexerOptions;

fn state_label(state: &DfaState) -> String {
    let mut label = String::new();
    if state.is_accept_state {
        label.push(':');
    }
    let _ = write!(label, "s{}", state.state_number);
    if state.requires_full_context {
        label.push('^');
    }
    if state.is_accept_state {
        match &state.predicates {
            Some(preds) => {
                let preds: Vec<String> = preds.iter().map(ToString::to_string).collect();
                let _ = write!(label, "=>[{}]", preds.join(", "));
            }
            None => {
                let _ = write!(label, "=>{}", state.prediction);
            }
        }
    }
    label
}

impl Dfa {
    /// One `from-label->to` line per cached edge, states in creation order.
    /// `edge_label` names the symbol behind an edge index.
    #[must_use]
    pub fn render(&self, edge_label: impl Fn(usize) -> String) -> String {
        let snapshot = self.edges_snapshot();
        let mut out = String::new();
        for (state, edges) in &snapshot {
            for (index, target) in edges.iter().enumerate() {
                let Some(target) = target else { continue };
                if target.is_error() {
                    continue;
                }
                let Some((to, _)) = snapshot.get(target.index()) else {
                    continue;
                };
                let _ = writeln!(
                    out,
                    "{}-{}->{}",
                    state_label(state),
                    edge_label(index),
                    state_label(to)
                );
            }
        }
        out
    }

    /// Renders a lexer DFA with edges labelled by character.
    #[must_use]
    pub fn render_lexer(&self, options: &LexerOptions) -> String {
        self.render(|index| {
            let code = options.min_dfa_edge + index as i32;
            match char::from_u32(code as u32) {
                Some(c) if !c.is_control() => format!("'{c}'"),
                _ => format!("'\\u{{{code:x}}}'"),
            }
        })
    }

    /// Renders a parser DFA with edges labelled by token name, falling back
    /// to the token type number.
    #[must_use]
    pub fn render_parser(&self, token_names: &[&str]) -> String {
        self.render(|index| {
            if index == 0 {
                return "EOF".to_owned();
            }
            let token_type = index - 1;
            token_names
                .get(token_type)
                .map_or_else(|| token_type.to_string(), |name| (*name).to_owned())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::atn::builder::AtnBuilder;
    use crate::configs::{AtnConfig, AtnConfigSet};
    use crate::context::PredictionContext;

    #[test]
    fn test_render_edges() {
        let mut builder = AtnBuilder::parser(2);
        let rule = builder.rule();
        let a = builder.atom(rule, 1);
        let b = builder.atom(rule, 2);
        let body = builder.block(rule, vec![a, b]);
        builder.set_rule_body(rule, body);
        let atn = builder.finish().unwrap();
        let dfa = Dfa::new(&atn, 0, atn.decision_to_state[0]);

        let set = |state, alt| {
            let mut configs = AtnConfigSet::new(false);
            configs
                .add(AtnConfig::new(state, alt, PredictionContext::empty()), None)
                .unwrap();
            configs.set_readonly();
            DfaState::new(Arc::new(configs))
        };
        let s0 = dfa.add_state(set(1, 1));
        let mut accept = set(2, 2);
        accept.is_accept_state = true;
        accept.prediction = 2;
        let s1 = dfa.add_state(accept);
        dfa.set_edge(s0.state_number, 3, s1.state_number);

        assert_eq!(dfa.render_parser(&["<INVALID>", "A", "B"]), "s0-B->:s1=>2\n");
        assert_eq!(dfa.render(|i| i.to_string()), "s0-3->:s1=>2\n");
    }
}
