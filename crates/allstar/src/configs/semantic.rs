//! Semantic contexts: predicate expressions gating configurations.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::parser::RuleContext;
use crate::recognizer::Recognizer;

pub type SemanticRef = Arc<SemanticContext>;

/// A boolean combination of grammar predicates.
///
/// `And` and `Or` operands are de-duplicated and sorted, so operand order
/// never distinguishes two expressions; at most one precedence predicate
/// survives in each (the lowest for `And`, the highest for `Or`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SemanticContext {
    /// Always true.
    Empty,
    Predicate {
        rule_index: usize,
        pred_index: usize,
        is_ctx_dependent: bool,
    },
    PrecedencePredicate {
        precedence: i32,
    },
    And(Vec<SemanticRef>),
    Or(Vec<SemanticRef>),
}

static NONE: OnceLock<SemanticRef> = OnceLock::new();

impl SemanticContext {
    /// The shared always-true context.
    #[must_use]
    pub fn none() -> SemanticRef {
        NONE.get_or_init(|| Arc::new(Self::Empty)).clone()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    #[must_use]
    pub fn predicate(rule_index: usize, pred_index: usize, is_ctx_dependent: bool) -> SemanticRef {
        Arc::new(Self::Predicate {
            rule_index,
            pred_index,
            is_ctx_dependent,
        })
    }

    #[must_use]
    pub fn precedence(precedence: i32) -> SemanticRef {
        Arc::new(Self::PrecedencePredicate { precedence })
    }

    /// Evaluates the expression against `recognizer`. Context-dependent
    /// predicates see `outer`, others see no context.
    pub fn eval(&self, recognizer: &mut dyn Recognizer, outer: Option<&RuleContext>) -> bool {
        match self {
            Self::Empty => true,
            Self::Predicate {
                rule_index,
                pred_index,
                is_ctx_dependent,
            } => {
                let local = if *is_ctx_dependent { outer } else { None };
                recognizer.sempred(local, *rule_index, *pred_index)
            }
            Self::PrecedencePredicate { precedence } => recognizer.precpred(outer, *precedence),
            Self::And(operands) => operands.iter().all(|op| op.eval(recognizer, outer)),
            Self::Or(operands) => operands.iter().any(|op| op.eval(recognizer, outer)),
        }
    }

    /// Resolves precedence predicates against the recognizer's current
    /// precedence and simplifies the rest. Returns `None` when the result is
    /// false, and `this` unchanged when nothing could be resolved.
    pub fn eval_precedence(
        this: &SemanticRef,
        recognizer: &mut dyn Recognizer,
        outer: Option<&RuleContext>,
    ) -> Option<SemanticRef> {
        match this.as_ref() {
            Self::Empty | Self::Predicate { .. } => Some(this.clone()),
            Self::PrecedencePredicate { precedence } => recognizer
                .precpred(outer, *precedence)
                .then(Self::none),
            Self::And(operands) => {
                let mut differs = false;
                let mut reduced = Vec::with_capacity(operands.len());
                for op in operands {
                    let evaluated = Self::eval_precedence(op, recognizer, outer)?;
                    differs |= !Arc::ptr_eq(&evaluated, op);
                    if !evaluated.is_empty() {
                        reduced.push(evaluated);
                    }
                }
                if !differs {
                    return Some(this.clone());
                }
                Some(
                    reduced
                        .into_iter()
                        .reduce(|acc, op| Self::and(Some(&acc), Some(&op)))
                        .unwrap_or_else(Self::none),
                )
            }
            Self::Or(operands) => {
                let mut differs = false;
                let mut reduced = Vec::with_capacity(operands.len());
                for op in operands {
                    let evaluated = Self::eval_precedence(op, recognizer, outer);
                    differs |= !evaluated.as_ref().is_some_and(|e| Arc::ptr_eq(e, op));
                    match evaluated {
                        Some(e) if e.is_empty() => return Some(Self::none()),
                        Some(e) => reduced.push(e),
                        None => {}
                    }
                }
                if !differs {
                    return Some(this.clone());
                }
                reduced
                    .into_iter()
                    .reduce(|acc, op| Self::or(Some(&acc), Some(&op)))
            }
        }
    }

    /// Conjunction. A missing or empty operand yields the other side.
    #[must_use]
    pub fn and(a: Option<&SemanticRef>, b: Option<&SemanticRef>) -> SemanticRef {
        let (a, b) = match (a, b) {
            (None, None) => return Self::none(),
            (Some(x), None) | (None, Some(x)) => return x.clone(),
            (Some(a), Some(b)) => (a, b),
        };
        if a.is_empty() {
            return b.clone();
        }
        if b.is_empty() {
            return a.clone();
        }
        let operands = Self::combine(a, b, |ops| matches!(ops, Self::And(_)), i32::min);
        Self::wrap(operands, Self::And)
    }

    /// Disjunction. An empty operand makes the whole expression true.
    #[must_use]
    pub fn or(a: Option<&SemanticRef>, b: Option<&SemanticRef>) -> SemanticRef {
        let (a, b) = match (a, b) {
            (None, None) => return Self::none(),
            (Some(x), None) | (None, Some(x)) => return x.clone(),
            (Some(a), Some(b)) => (a, b),
        };
        if a.is_empty() || b.is_empty() {
            return Self::none();
        }
        let operands = Self::combine(a, b, |ops| matches!(ops, Self::Or(_)), i32::max);
        Self::wrap(operands, Self::Or)
    }

    fn combine(
        a: &SemanticRef,
        b: &SemanticRef,
        same_kind: impl Fn(&Self) -> bool,
        pick: impl Fn(i32, i32) -> i32,
    ) -> Vec<SemanticRef> {
        let mut operands: Vec<SemanticRef> = Vec::new();
        let mut precedence: Option<i32> = None;
        let flattened = [a, b].into_iter().flat_map(|side| {
            if same_kind(side.as_ref()) {
                match side.as_ref() {
                    Self::And(ops) | Self::Or(ops) => ops.clone(),
                    _ => vec![side.clone()],
                }
            } else {
                vec![side.clone()]
            }
        });
        for op in flattened {
            if let Self::PrecedencePredicate { precedence: p } = op.as_ref() {
                precedence = Some(precedence.map_or(*p, |q| pick(q, *p)));
            } else if !operands.contains(&op) {
                operands.push(op);
            }
        }
        if let Some(p) = precedence {
            operands.push(Self::precedence(p));
        }
        operands.sort_unstable();
        operands
    }

    fn wrap(mut operands: Vec<SemanticRef>, make: fn(Vec<SemanticRef>) -> Self) -> SemanticRef {
        if operands.len() == 1 {
            return operands.remove(0);
        }
        Arc::new(make(operands))
    }
}

fn join(f: &mut fmt::Formatter<'_>, ops: &[SemanticRef], sep: &str) -> fmt::Result {
    for (i, op) in ops.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{op}")?;
    }
    Ok(())
}

impl fmt::Display for SemanticContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("{true}?"),
            Self::Predicate {
                rule_index,
                pred_index,
                ..
            } => write!(f, "{{{rule_index}:{pred_index}}}?"),
            Self::PrecedencePredicate { precedence } => write!(f, "{{{precedence}>=prec}}?"),
            Self::And(ops) => join(f, ops, "&&"),
            Self::Or(ops) => join(f, ops, "||"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        precedence: i32,
        truth: bool,
    }

    impl Recognizer for Fixed {
        fn sempred(&mut self, _: Option<&RuleContext>, _: usize, _: usize) -> bool {
            self.truth
        }

        fn precedence(&self) -> i32 {
            self.precedence
        }
    }

    #[test]
    fn test_and_or_identities() {
        let p = SemanticContext::predicate(0, 1, false);
        let none = SemanticContext::none();
        assert!(Arc::ptr_eq(&SemanticContext::and(Some(&none), Some(&p)), &p));
        assert!(Arc::ptr_eq(&SemanticContext::and(None, Some(&p)), &p));
        assert!(SemanticContext::or(Some(&none), Some(&p)).is_empty());
        assert!(Arc::ptr_eq(&SemanticContext::or(None, Some(&p)), &p));
    }

    #[test]
    fn test_precedence_folding() {
        let p2 = SemanticContext::precedence(2);
        let p5 = SemanticContext::precedence(5);
        let and = SemanticContext::and(Some(&p2), Some(&p5));
        assert_eq!(*and, SemanticContext::PrecedencePredicate { precedence: 2 });
        let or = SemanticContext::or(Some(&p2), Some(&p5));
        assert_eq!(*or, SemanticContext::PrecedencePredicate { precedence: 5 });
    }

    #[test]
    fn test_operands_flatten_and_dedup() {
        let a = SemanticContext::predicate(0, 0, false);
        let b = SemanticContext::predicate(0, 1, false);
        let ab = SemanticContext::and(Some(&a), Some(&b));
        let aba = SemanticContext::and(Some(&ab), Some(&a));
        assert_eq!(*aba, *ab);
        assert_eq!(ab.to_string(), "{0:0}?&&{0:1}?");
    }

    #[test]
    fn test_operand_order_is_canonical() {
        let a = SemanticContext::predicate(0, 0, false);
        let b = SemanticContext::predicate(2, 1, true);
        let p = SemanticContext::precedence(3);
        let ab = SemanticContext::and(Some(&a), Some(&b));
        let ba = SemanticContext::and(Some(&b), Some(&a));
        assert_eq!(ab, ba);
        assert_eq!(ba.to_string(), "{0:0}?&&{2:1}?");

        let left = SemanticContext::or(Some(&SemanticContext::or(Some(&p), Some(&b))), Some(&a));
        let right = SemanticContext::or(Some(&a), Some(&SemanticContext::or(Some(&b), Some(&p))));
        assert_eq!(left, right);
    }

    #[test]
    fn test_eval_precedence_reduces() {
        let mut rec = Fixed {
            precedence: 3,
            truth: true,
        };
        let pred = SemanticContext::predicate(1, 0, false);
        let low = SemanticContext::precedence(1);
        let high = SemanticContext::precedence(4);

        // {1 >= 3}? is false, {3 >= 3}? and {4 >= 3}? are true
        let gated = SemanticContext::and(Some(&pred), Some(&low));
        assert!(SemanticContext::eval_precedence(&gated, &mut rec, None).is_none());

        let open = SemanticContext::and(Some(&pred), Some(&SemanticContext::precedence(3)));
        let reduced = SemanticContext::eval_precedence(&open, &mut rec, None).unwrap();
        assert_eq!(reduced, pred);

        let either = SemanticContext::or(Some(&pred), Some(&high));
        let reduced = SemanticContext::eval_precedence(&either, &mut rec, None).unwrap();
        assert!(reduced.is_empty());

        let untouched = SemanticContext::eval_precedence(&pred, &mut rec, None).unwrap();
        assert!(Arc::ptr_eq(&untouched, &pred));
    }

    #[test]
    fn test_eval_dispatches_to_recognizer() {
        let mut rec = Fixed {
            precedence: 0,
            truth: false,
        };
        let pred = SemanticContext::predicate(0, 0, false);
        assert!(!pred.eval(&mut rec, None));
        assert!(SemanticContext::none().eval(&mut rec, None));
        assert!(SemanticContext::precedence(0).eval(&mut rec, None));
    }
}
