//! Query plan capture.
//!
//! - `explain`: the first row of a classic tabular `EXPLAIN`, as an ordered field map

pub mod explain;
