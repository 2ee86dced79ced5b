// src/evaluator.rs - threshold predicate

use crate::alarms::{AlarmDefinition, ComparisonKind};

/// Does `value` violate the definition's threshold?
///
/// Total over every input: unsupported comparison kinds and NaN never fire.
pub fn evaluate(definition: &AlarmDefinition, value: f64) -> bool {
    violates(&definition.kind, definition.threshold, value)
}

/// Comparison underlying [`evaluate`], usable without a full definition.
pub fn violates(kind: &ComparisonKind, threshold: f64, value: f64) -> bool {
    match kind {
        ComparisonKind::High => value > threshold,
        ComparisonKind::Low => value < threshold,
        ComparisonKind::Unsupported(_) => false,
    }
}
