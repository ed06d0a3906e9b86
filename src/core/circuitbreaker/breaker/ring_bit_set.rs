const BITS_PER_WORD: usize = u64::BITS as usize;

/// `RingBitSet` keeps the outcomes of the last `capacity` calls,
/// a set bit marks a failure.
/// The words are allocated once, recording is O(1) and the failure count
/// is maintained incrementally.
#[derive(Debug, Clone)]
pub(crate) struct RingBitSet {
    words: Box<[u64]>,
    capacity: usize,
    // next slot to be written
    index: usize,
    len: usize,
    failures: usize,
}

impl RingBitSet {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be positive");
        let word_count = (capacity + BITS_PER_WORD - 1) / BITS_PER_WORD;
        RingBitSet {
            words: vec![0; word_count].into_boxed_slice(),
            capacity,
            index: 0,
            len: 0,
            failures: 0,
        }
    }

    /// `record` stores one outcome, overwriting the oldest once the ring is full,
    /// and returns the failure rate afterwards.
    pub fn record(&mut self, is_failure: bool) -> Option<f32> {
        let word = self.index / BITS_PER_WORD;
        let mask = 1u64 << (self.index % BITS_PER_WORD);
        if self.len == self.capacity {
            if self.words[word] & mask != 0 {
                self.failures -= 1;
            }
        } else {
            self.len += 1;
        }
        if is_failure {
            self.words[word] |= mask;
            self.failures += 1;
        } else {
            self.words[word] &= !mask;
        }
        self.index += 1;
        if self.index == self.capacity {
            self.index = 0;
        }
        self.failure_rate()
    }

    /// Failure rate in percent, `None` until the ring is full.
    pub fn failure_rate(&self) -> Option<f32> {
        if self.is_full() {
            Some(self.failures as f32 * 100.0 / self.capacity as f32)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn failures(&self) -> usize {
        self.failures
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rate_undefined_until_full() {
        let mut ring = RingBitSet::new(4);
        assert_eq!(ring.record(true), None);
        assert_eq!(ring.record(true), None);
        assert_eq!(ring.record(false), None);
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.failures(), 2);
        assert_eq!(ring.record(false), Some(50.0));
        assert!(ring.is_full());
    }

    #[test]
    fn overwrite_evicts_oldest() {
        let mut ring = RingBitSet::new(3);
        ring.record(true);
        ring.record(false);
        ring.record(false);
        assert_eq!(ring.failures(), 1);
        // evicts the first failure
        assert_eq!(ring.record(false), Some(0.0));
        assert_eq!(ring.failures(), 0);
        // evicts a success
        let rate = ring.record(true).unwrap();
        assert!((rate - 100.0 / 3.0).abs() < 1e-4);
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.capacity(), 3);
    }

    #[test]
    fn spans_multiple_words() {
        let capacity = 130;
        let mut ring = RingBitSet::new(capacity);
        for i in 0..capacity {
            ring.record(i % 2 == 0);
        }
        assert_eq!(ring.failures(), 65);
        assert_eq!(ring.failure_rate(), Some(50.0));
        // second lap, all successes
        for _ in 0..capacity {
            ring.record(false);
        }
        assert_eq!(ring.failures(), 0);
        assert_eq!(ring.failure_rate(), Some(0.0));
        for _ in 0..capacity {
            ring.record(true);
        }
        assert_eq!(ring.failure_rate(), Some(100.0));
    }

    #[test]
    fn single_slot() {
        let mut ring = RingBitSet::new(1);
        assert_eq!(ring.record(true), Some(100.0));
        assert_eq!(ring.record(false), Some(0.0));
        assert_eq!(ring.failures(), 0);
    }

    #[test]
    #[should_panic(expected = "ring capacity must be positive")]
    fn zero_capacity() {
        RingBitSet::new(0);
    }
}
