//! Tick grid shared by every generator (4/4, 480 PPQ)

/// Ticks per quarter note
pub const TICKS_PER_BEAT: u32 = 480;
pub const BEATS_PER_BAR: u32 = 4;
pub const TICKS_PER_BAR: u32 = TICKS_PER_BEAT * BEATS_PER_BAR;
/// 16th-note slots per bar
pub const STEPS_PER_BAR: u32 = 16;
pub const TICKS_PER_STEP: u32 = TICKS_PER_BAR / STEPS_PER_BAR;

/// Split `bars` across `segments` root notes.
///
/// Every segment gets `bars / segments` bars; the last one also absorbs the
/// remainder. Segments may be zero bars long when there are more roots than bars.
pub fn partition_bars(bars: u32, segments: usize) -> Vec<u32> {
    if segments == 0 {
        return Vec::new();
    }
    let per_segment = bars / segments as u32;
    let mut counts = vec![per_segment; segments];
    if let Some(last) = counts.last_mut() {
        *last = bars - per_segment * (segments as u32 - 1);
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_sums_to_total() {
        for bars in 1..=24 {
            for roots in 1..=bars as usize {
                let parts = partition_bars(bars, roots);
                assert_eq!(parts.len(), roots);
                assert_eq!(parts.iter().sum::<u32>(), bars, "bars={bars} roots={roots}");
            }
        }
    }

    #[test]
    fn test_partition_remainder_goes_last() {
        assert_eq!(partition_bars(10, 3), vec![3, 3, 4]);
        assert_eq!(partition_bars(2, 4), vec![0, 0, 0, 2]);
        assert!(partition_bars(8, 0).is_empty());
    }

    #[test]
    fn test_grid() {
        assert_eq!(TICKS_PER_BAR, 1920);
        assert_eq!(TICKS_PER_STEP, 120);
    }
}
