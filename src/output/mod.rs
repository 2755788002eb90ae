//! Operator-facing output: console text and the JSON run report

pub mod json;
pub mod text;
