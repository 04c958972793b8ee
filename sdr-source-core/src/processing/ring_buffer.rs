/// Fixed-capacity circular sample buffer.
///
/// Used per output tap by the degraded-mode fan-out. Not synchronized; wrap
/// the owner in a `parking_lot::Mutex` for cross-thread access.
///
/// Overflow behavior: drops oldest samples.
#[derive(Debug)]
pub struct RingBuffer<T> {
    buffer: Vec<T>,
    write_index: usize,
    read_index: usize,
    available: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![T::default(); capacity.max(1)],
            write_index: 0,
            read_index: 0,
            available: 0,
        }
    }

    /// Append samples. If `samples` is larger than the capacity only its
    /// tail is kept; otherwise the oldest buffered samples make room.
    pub fn write(&mut self, samples: &[T]) {
        let capacity = self.capacity();
        let samples = if samples.len() > capacity {
            &samples[samples.len() - capacity..]
        } else {
            samples
        };
        if samples.is_empty() {
            return;
        }

        let overflow = (self.available + samples.len()).saturating_sub(capacity);
        if overflow > 0 {
            self.read_index = (self.read_index + overflow) % capacity;
            self.available -= overflow;
        }

        // at most two contiguous copies
        let first = samples.len().min(capacity - self.write_index);
        self.buffer[self.write_index..self.write_index + first].copy_from_slice(&samples[..first]);
        self.buffer[..samples.len() - first].copy_from_slice(&samples[first..]);

        self.write_index = (self.write_index + samples.len()) % capacity;
        self.available += samples.len();
    }

    /// Move up to `out.len()` samples into `out`; returns how many were moved.
    pub fn read_into(&mut self, out: &mut [T]) -> usize {
        let capacity = self.capacity();
        let to_read = out.len().min(self.available);
        if to_read == 0 {
            return 0;
        }

        let first = to_read.min(capacity - self.read_index);
        out[..first].copy_from_slice(&self.buffer[self.read_index..self.read_index + first]);
        out[first..to_read].copy_from_slice(&self.buffer[..to_read - first]);

        self.read_index = (self.read_index + to_read) % capacity;
        self.available -= to_read;
        to_read
    }

    pub fn count(&self) -> usize {
        self.available
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    pub fn reset(&mut self) {
        self.write_index = 0;
        self.read_index = 0;
        self.available = 0;
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}
