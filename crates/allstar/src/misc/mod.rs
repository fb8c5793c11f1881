//! Small shared data structures.

mod interval_set;

pub use interval_set::{Interval, IntervalSet};
