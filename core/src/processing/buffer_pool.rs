use crate::prelude::StageError;

/// Scoped buffer pool that caps how many scratch buffers are live at once.
pub struct BufferPool<T> {
    buffers: Vec<Vec<T>>,
    outstanding: usize,
    max_capacity: usize,
}

impl<T: Clone + Default> BufferPool<T> {
    pub fn with_capacity(max_capacity: usize) -> Self {
        Self {
            buffers: Vec::with_capacity(max_capacity),
            outstanding: 0,
            max_capacity,
        }
    }

    /// Hands out a buffer of exactly `length` default elements.
    pub fn checkout(&mut self, length: usize) -> Result<Vec<T>, StageError> {
        if self.outstanding >= self.max_capacity {
            return Err(StageError::BufferExhaustion(format!(
                "{} buffers already checked out",
                self.outstanding
            )));
        }
        let buffer = match self.buffers.pop() {
            Some(mut buffer) => {
                buffer.resize(length, T::default());
                buffer
            }
            None => vec![T::default(); length],
        };
        self.outstanding += 1;
        Ok(buffer)
    }

    /// Returns a buffer back to the pool for reuse.
    pub fn release(&mut self, mut buffer: Vec<T>) {
        buffer.clear();
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.buffers.len() < self.max_capacity {
            self.buffers.push(buffer);
        }
    }

    pub fn idle(&self) -> usize {
        self.buffers.len()
    }

    pub fn reset(&mut self) {
        self.buffers.clear();
        self.outstanding = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_is_capped_until_release() {
        let mut pool: BufferPool<f64> = BufferPool::with_capacity(1);
        let buffer = pool.checkout(8).unwrap();
        assert_eq!(buffer.len(), 8);
        assert!(matches!(pool.checkout(4), Err(StageError::BufferExhaustion(_))));

        pool.release(buffer);
        assert_eq!(pool.idle(), 1);
        let reused = pool.checkout(3).unwrap();
        assert_eq!(reused, vec![0.0; 3]);
    }
}
