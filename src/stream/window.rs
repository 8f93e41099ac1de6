//! The range of materialized chapters.

use std::ops::RangeInclusive;

/// Contiguous range `[lo, hi]` of materialized spine indices, or empty.
///
/// Only the bounds are stored, so a window with a gap cannot be built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChapterWindow {
    bounds: Option<(usize, usize)>,
}

impl ChapterWindow {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn singleton(index: usize) -> Self {
        Self {
            bounds: Some((index, index)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    /// First materialized index.
    pub fn lo(&self) -> Option<usize> {
        self.bounds.map(|(lo, _)| lo)
    }

    /// Last materialized index.
    pub fn hi(&self) -> Option<usize> {
        self.bounds.map(|(_, hi)| hi)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.bounds.is_some_and(|(lo, hi)| (lo..=hi).contains(&index))
    }

    pub fn len(&self) -> usize {
        self.bounds.map_or(0, |(lo, hi)| hi - lo + 1)
    }

    pub fn range(&self) -> Option<RangeInclusive<usize>> {
        self.bounds.map(|(lo, hi)| lo..=hi)
    }

    pub fn iter(self) -> impl Iterator<Item = usize> {
        self.range().into_iter().flatten()
    }

    /// Index an ExtendForward would materialize, if any remain below `total`.
    pub fn next_forward(&self, total: usize) -> Option<usize> {
        let (_, hi) = self.bounds?;
        (hi + 1 < total).then_some(hi + 1)
    }

    /// Index an ExtendBackward would materialize, if any.
    pub fn next_backward(&self) -> Option<usize> {
        let (lo, _) = self.bounds?;
        lo.checked_sub(1)
    }

    /// The window grown by one at the end. Empty stays empty.
    pub fn extended_forward(self) -> Self {
        Self {
            bounds: self.bounds.map(|(lo, hi)| (lo, hi + 1)),
        }
    }

    /// The window grown by one at the start. Empty or starting at 0 is unchanged.
    pub fn extended_backward(self) -> Self {
        Self {
            bounds: self
                .bounds
                .map(|(lo, hi)| (lo.saturating_sub(1), hi)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_window() {
        let w = ChapterWindow::empty();
        assert!(w.is_empty());
        assert_eq!(w.len(), 0);
        assert_eq!(w.lo(), None);
        assert_eq!(w.next_forward(3), None);
        assert_eq!(w.next_backward(), None);
        assert_eq!(w.extended_forward(), w);
        assert_eq!(w.iter().count(), 0);
    }

    #[test]
    fn test_singleton_and_extend() {
        let w = ChapterWindow::singleton(1);
        assert_eq!(w.next_forward(3), Some(2));
        assert_eq!(w.next_backward(), Some(0));

        let w = w.extended_forward().extended_backward();
        assert_eq!(w.range(), Some(0..=2));
        assert_eq!(w.next_forward(3), None);
        assert_eq!(w.next_backward(), None);
        assert!(w.contains(0) && w.contains(2) && !w.contains(3));
        assert_eq!(w.iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    proptest! {
        #[test]
        fn prop_extensions_stay_contiguous_and_in_bounds(
            total in 1usize..40,
            start_seed in any::<usize>(),
            steps in prop::collection::vec(any::<bool>(), 0..80),
        ) {
            let start = start_seed % total;
            let mut w = ChapterWindow::singleton(start);
            for forward in steps {
                if forward {
                    if w.next_forward(total).is_some() {
                        w = w.extended_forward();
                    }
                } else if w.next_backward().is_some() {
                    w = w.extended_backward();
                }
                let (lo, hi) = (w.lo().unwrap(), w.hi().unwrap());
                prop_assert!(lo <= start && start <= hi);
                prop_assert!(hi < total);
                prop_assert_eq!(w.iter().count(), hi - lo + 1);
                prop_assert!(w.iter().zip(w.iter().skip(1)).all(|(a, b)| b == a + 1));
            }
        }
    }
}
