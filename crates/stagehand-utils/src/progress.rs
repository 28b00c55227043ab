//! Progress arithmetic shared by the scheduler and the pipeline state.

/// `round(100 * part / whole)`, half rounding up; 0 when `whole` is 0.
///
/// The result is capped at 100 so a stale `part` can never report more
/// than complete.
///
/// ```rust
/// use stagehand_utils::progress::percent;
///
/// assert_eq!(percent(2, 3), 67);
/// assert_eq!(percent(0, 0), 0);
/// ```
#[must_use]
pub fn percent(part: u64, whole: u64) -> u8 {
    if whole == 0 {
        return 0;
    }
    let pct = (200 * u128::from(part) + u128::from(whole)) / (2 * u128::from(whole));
    pct.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_percent_rounding() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 2), 50);
        assert_eq!(percent(1, 200), 1);
        assert_eq!(percent(65, 65), 100);
        assert_eq!(percent(7, 5), 100);
    }

    proptest! {
        #[test]
        fn prop_percent_is_bounded_and_monotonic(
            whole in 1u64..10_000,
            a in 0u64..10_000,
            b in 0u64..10_000,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(percent(hi, whole) <= 100);
            prop_assert!(percent(lo, whole) <= percent(hi, whole));
            prop_assert_eq!(percent(whole, whole), 100);
        }
    }
}
