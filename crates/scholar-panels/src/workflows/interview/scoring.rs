use super::domain::MAX_EVALUATORS;
use super::marks::Mark;

/// Final score for a candidate seated before `evaluator_count` examiners.
///
/// Only the first `evaluator_count` slots are read. One absence makes the whole result
/// absent; otherwise the numeric slots are averaged over the evaluator count, with missing
/// slots contributing zero, and rounded half away from zero.
pub fn average(marks: &[Mark], evaluator_count: usize) -> Mark {
    let considered = evaluator_count.min(MAX_EVALUATORS);
    if marks.is_empty() || considered == 0 {
        return Mark::Numeric(0);
    }

    let mut sum: u32 = 0;
    for mark in marks.iter().take(considered) {
        match mark {
            Mark::Absent => return Mark::Absent,
            Mark::Numeric(value) => sum += u32::from(*value),
        }
    }

    let divisor = considered as u32;
    let rounded = (sum * 2 + divisor) / (divisor * 2);
    Mark::Numeric(rounded as u8)
}
