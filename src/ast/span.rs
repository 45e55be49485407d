//! Source spans.

use std::ops::Range;

/// Byte range into the full query text (declarations included).
pub type Span = Range<usize>;

/// Returns the smallest span covering both `start` and `end`.
pub fn merge_spans(start: &Span, end: &Span) -> Span {
    start.start.min(end.start)..start.end.max(end.end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_covers_both_ranges() {
        assert_eq!(merge_spans(&(4..6), &(10..15)), 4..15);
        assert_eq!(merge_spans(&(10..15), &(4..6)), 4..15);
    }
}
