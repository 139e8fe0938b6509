//! Template evaluation
//!
//! Each expression slot resolves to a list of lexical values. The lists are
//! index-aligned: the i-th result concatenates the i-th value of every slot.

use crate::error::{RmlError, RmlResult};

use super::parser::{ExpressionSlot, Segment, Template};

/// Lexical values resolved for one slot
///
/// A `None` entry is a null element inside a multi-valued source (for
/// example a `null` inside a JSON array). It drops that index from the
/// output without affecting the other indexes.
pub type SlotValues = Vec<Option<String>>;

impl Template {
    /// Evaluate the template against per-slot values
    ///
    /// `resolve` is called once per expression slot, in template order.
    /// Returns `Ok(None)` if any slot has no values at all (missing
    /// reference), and an error if the slots disagree on the number of
    /// values.
    pub fn evaluate<F>(&self, mut resolve: F) -> RmlResult<Option<Vec<String>>>
    where
        F: FnMut(&ExpressionSlot) -> RmlResult<SlotValues>,
    {
        let mut resolved: Vec<SlotValues> = Vec::new();
        for slot in self.slots() {
            let values = resolve(slot)?;
            if values.is_empty() {
                return Ok(None);
            }
            resolved.push(values);
        }

        if resolved.is_empty() {
            let text = self
                .segments()
                .iter()
                .filter_map(|s| match s {
                    Segment::Text(t) => Some(t.as_str()),
                    Segment::Expression(_) => None,
                })
                .collect::<String>();
            return Ok(Some(vec![text]));
        }

        let n = resolved[0].len();
        if resolved.iter().any(|v| v.len() != n) {
            return Err(RmlError::TemplateEvaluation {
                template: self.to_template_string(),
                counts: resolved.iter().map(Vec::len).collect(),
            });
        }

        let mut results = Vec::with_capacity(n);
        'rows: for i in 0..n {
            let mut out = String::new();
            let mut slot_idx = 0;
            for segment in self.segments() {
                match segment {
                    Segment::Text(text) => out.push_str(text),
                    Segment::Expression(_) => {
                        match &resolved[slot_idx][i] {
                            Some(value) => out.push_str(value),
                            None => {
                                tracing::trace!(
                                    template = %self,
                                    index = i,
                                    "null value in aligned template evaluation, dropping index"
                                );
                                continue 'rows;
                            }
                        }
                        slot_idx += 1;
                    }
                }
            }
            results.push(out);
        }

        if results.is_empty() {
            return Ok(None);
        }
        Ok(Some(results))
    }
}
