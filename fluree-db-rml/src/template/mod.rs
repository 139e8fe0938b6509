//! Template engine
//!
//! Compiles `{expression}` template strings into segment sequences and
//! evaluates them against per-record expression values.

mod eval;
mod parser;

pub use eval::SlotValues;
pub use parser::{ExpressionSlot, Segment, SlotId, Template, TemplateParseError};
