// Timer query slots
//
// Timer queries use two timestamps each, from one device-wide query pool.
// Slots are tracked in a bitset of u64 words.

/// Hands out indices in `0..capacity`, lowest free index first.
#[derive(Clone, Debug)]
pub struct BitSetAllocator {
    words: Vec<u64>,
    capacity: usize,
}

impl BitSetAllocator {
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(64)],
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn allocate(&mut self) -> Option<usize> {
        for (word_idx, word) in self.words.iter_mut().enumerate() {
            if *word == u64::MAX {
                continue;
            }
            let bit_idx = word.trailing_ones() as usize;
            let index = word_idx * 64 + bit_idx;
            if index >= self.capacity {
                return None;
            }
            *word |= 1u64 << bit_idx;
            return Some(index);
        }
        None
    }

    pub fn release(&mut self, index: usize) {
        if index < self.capacity {
            self.words[index / 64] &= !(1u64 << (index % 64));
        }
    }

    pub fn is_allocated(&self, index: usize) -> bool {
        index < self.capacity && (self.words[index / 64] & (1u64 << (index % 64))) != 0
    }
}

/// A begin/end timestamp pair in the device's timer query pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerQuery {
    slot: u32,
}

impl TimerQuery {
    pub(crate) fn new(slot: u32) -> Self {
        Self { slot }
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Query index of the begin timestamp.
    pub fn begin_query_index(&self) -> u32 {
        self.slot * 2
    }

    /// Query index of the end timestamp.
    pub fn end_query_index(&self) -> u32 {
        self.slot * 2 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocates_lowest_free_slot() {
        let mut alloc = BitSetAllocator::new(130);
        for expected in 0..70 {
            assert_eq!(alloc.allocate(), Some(expected));
        }
        alloc.release(3);
        alloc.release(65);
        assert_eq!(alloc.allocate(), Some(3));
        assert_eq!(alloc.allocate(), Some(65));
        assert_eq!(alloc.allocate(), Some(70));
    }

    #[test]
    fn test_exhaustion() {
        let mut alloc = BitSetAllocator::new(2);
        assert_eq!(alloc.allocate(), Some(0));
        assert_eq!(alloc.allocate(), Some(1));
        assert_eq!(alloc.allocate(), None);
        alloc.release(0);
        assert!(!alloc.is_allocated(0));
        assert_eq!(alloc.allocate(), Some(0));

        let mut empty = BitSetAllocator::new(0);
        assert_eq!(empty.allocate(), None);
    }

    #[test]
    fn test_query_indices() {
        let query = TimerQuery::new(5);
        assert_eq!(query.begin_query_index(), 10);
        assert_eq!(query.end_query_index(), 11);
    }
}
