//! Sets of integers stored as sorted, disjoint, closed intervals.
//!
//! Used for transition labels (character classes in lexers, token sets in
//! parsers) and for lookahead sets computed by the LL(1) analyzer.

use smallvec::SmallVec;
use std::fmt;

use crate::atn::{TOKEN_EOF, TOKEN_EPSILON};

/// A closed interval `[a, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Interval {
    pub a: i32,
    pub b: i32,
}

impl Interval {
    #[must_use]
    pub const fn new(a: i32, b: i32) -> Self {
        Self { a, b }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        if self.b < self.a {
            0
        } else {
            (self.b - self.a) as usize + 1
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.b < self.a
    }

    #[must_use]
    pub const fn contains(&self, value: i32) -> bool {
        self.a <= value && value <= self.b
    }

    /// Overlapping or directly adjacent intervals can be merged into one.
    const fn touches(&self, other: &Self) -> bool {
        !(self.b < other.a - 1 || other.b < self.a - 1)
    }
}

/// An ordered set of disjoint intervals.
///
/// Intervals are kept sorted by their lower bound and coalesced on insert,
/// so two sets representing the same integers compare equal.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct IntervalSet {
    intervals: SmallVec<[Interval; 2]>,
}

impl IntervalSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set holding the single value `value`.
    #[must_use]
    pub fn of(value: i32) -> Self {
        let mut set = Self::new();
        set.add_one(value);
        set
    }

    /// Set holding every value in `a..=b`.
    #[must_use]
    pub fn of_range(a: i32, b: i32) -> Self {
        let mut set = Self::new();
        set.add_range(a, b);
        set
    }

    pub fn add_one(&mut self, value: i32) {
        self.add_range(value, value);
    }

    pub fn add_range(&mut self, a: i32, b: i32) {
        self.add_interval(Interval::new(a, b));
    }

    pub fn add_interval(&mut self, mut added: Interval) {
        if added.is_empty() {
            return;
        }
        // first interval whose upper bound reaches the new one
        let start = self.intervals.partition_point(|iv| iv.b < added.a - 1);
        let mut end = start;
        while end < self.intervals.len() && self.intervals[end].touches(&added) {
            added.a = added.a.min(self.intervals[end].a);
            added.b = added.b.max(self.intervals[end].b);
            end += 1;
        }
        self.intervals.drain(start..end);
        self.intervals.insert(start, added);
    }

    pub fn add_set(&mut self, other: &Self) {
        for iv in &other.intervals {
            self.add_interval(*iv);
        }
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.add_set(other);
        result
    }

    #[must_use]
    pub fn contains(&self, value: i32) -> bool {
        let idx = self.intervals.partition_point(|iv| iv.b < value);
        self.intervals.get(idx).is_some_and(|iv| iv.a <= value)
    }

    pub fn remove_one(&mut self, value: i32) {
        let idx = self.intervals.partition_point(|iv| iv.b < value);
        let Some(iv) = self.intervals.get(idx).copied() else {
            return;
        };
        if !iv.contains(value) {
            return;
        }
        match (iv.a == value, iv.b == value) {
            (true, true) => {
                self.intervals.remove(idx);
            }
            (true, false) => self.intervals[idx].a = value + 1,
            (false, true) => self.intervals[idx].b = value - 1,
            (false, false) => {
                self.intervals[idx].b = value - 1;
                self.intervals.insert(idx + 1, Interval::new(value + 1, iv.b));
            }
        }
    }

    /// Values in `self` that are not in `other`.
    #[must_use]
    pub fn subtract(&self, other: &Self) -> Self {
        let mut result = Self::new();
        let mut j = 0;
        for iv in &self.intervals {
            let mut a = iv.a;
            let b = iv.b;
            while j < other.intervals.len() && other.intervals[j].b < a {
                j += 1;
            }
            let mut k = j;
            while a <= b {
                match other.intervals.get(k) {
                    Some(cut) if cut.a <= b => {
                        if cut.a > a {
                            result.intervals.push(Interval::new(a, cut.a - 1));
                        }
                        if cut.b >= b {
                            a = b + 1;
                        } else {
                            a = cut.b + 1;
                            k += 1;
                        }
                    }
                    _ => {
                        result.intervals.push(Interval::new(a, b));
                        a = b + 1;
                    }
                }
            }
        }
        result
    }

    /// Values of `vocabulary` that are not in `self`.
    #[must_use]
    pub fn complement(&self, vocabulary: &Self) -> Self {
        vocabulary.subtract(self)
    }

    #[must_use]
    pub fn complement_range(&self, min: i32, max: i32) -> Self {
        Self::of_range(min, max).subtract(self)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Number of integers in the set.
    #[must_use]
    pub fn size(&self) -> usize {
        self.intervals.iter().map(Interval::len).sum()
    }

    #[must_use]
    pub fn min_element(&self) -> Option<i32> {
        self.intervals.first().map(|iv| iv.a)
    }

    #[must_use]
    pub fn max_element(&self) -> Option<i32> {
        self.intervals.last().map(|iv| iv.b)
    }

    #[must_use]
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Every member, in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.intervals.iter().flat_map(|iv| iv.a..=iv.b)
    }

    /// Renders the set using `name` for each element, `{a, b..c}` style.
    pub fn render(&self, name: impl Fn(i32) -> String) -> String {
        if self.is_empty() {
            return "{}".to_string();
        }
        let parts: Vec<String> = self
            .intervals
            .iter()
            .map(|iv| {
                if iv.a == iv.b {
                    name(iv.a)
                } else {
                    format!("{}..{}", name(iv.a), name(iv.b))
                }
            })
            .collect();
        if parts.len() == 1 && self.size() == 1 {
            parts[0].clone()
        } else {
            format!("{{{}}}", parts.join(", "))
        }
    }
}

impl fmt::Debug for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self.render(|v| match v {
            TOKEN_EOF => "<EOF>".to_string(),
            TOKEN_EPSILON => "<EPSILON>".to_string(),
            other => other.to_string(),
        });
        f.write_str(&rendered)
    }
}

impl FromIterator<i32> for IntervalSet {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        let mut set = Self::new();
        for v in iter {
            set.add_one(v);
        }
        set
    }
}
