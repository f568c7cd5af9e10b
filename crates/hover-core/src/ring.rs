//! Fixed-capacity window buffer used by the feature extractor.

/// Storage reserved for every window; the active length is chosen at
/// construction and never exceeds this.
pub const RING_CAPACITY: usize = 64;

/// Ring buffer over the most recent `len` values.
///
/// Backed by an array plus a write cursor; the oldest value is overwritten
/// once the active length is reached.
#[derive(Debug, Clone)]
pub struct RingBuffer<const N: usize = RING_CAPACITY> {
    data: [f32; N],
    capacity: usize,
    head: usize,
    len: usize,
}

impl<const N: usize> RingBuffer<N> {
    /// `capacity` is clamped to `1..=N`.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: [0.0; N],
            capacity: capacity.clamp(1, N),
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, value: f32) {
        self.data[self.head] = value;
        self.head = (self.head + 1) % self.capacity;
        if self.len < self.capacity {
            self.len += 1;
        }
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Value `i` positions after the oldest one.
    fn at(&self, i: usize) -> f32 {
        let start = (self.head + self.capacity - self.len) % self.capacity;
        self.data[(start + i) % self.capacity]
    }

    /// Iterates oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        (0..self.len).map(move |i| self.at(i))
    }

    pub fn latest(&self) -> Option<f32> {
        if self.len == 0 {
            None
        } else {
            Some(self.at(self.len - 1))
        }
    }

    /// Mean of the `k` oldest values (fewer if the window holds fewer).
    pub fn oldest_mean(&self, k: usize) -> Option<f32> {
        let n = k.min(self.len);
        if n == 0 {
            return None;
        }
        let sum: f32 = (0..n).map(|i| self.at(i)).sum();
        Some(sum / n as f32)
    }

    pub fn mean(&self) -> Option<f32> {
        if self.len == 0 {
            return None;
        }
        Some(self.iter().sum::<f32>() / self.len as f32)
    }

    /// Population variance; 0.0 for an empty window.
    pub fn variance(&self) -> f32 {
        match self.mean() {
            Some(mean) => {
                self.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / self.len as f32
            }
            None => 0.0,
        }
    }

    /// max - min over the window; 0.0 when empty.
    pub fn peak_to_peak(&self) -> f32 {
        let mut it = self.iter();
        let Some(first) = it.next() else {
            return 0.0;
        };
        let (lo, hi) = it.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        hi - lo
    }
}
