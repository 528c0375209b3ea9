//! Fixed-size pool of [`MusicChunk`]s shared between a decoder and the pipe
//! it feeds.

use std::sync::Mutex;

use crate::chunk::MusicChunk;

/// Thread-safe object pool of [`MusicChunk`]s: a fixed-capacity,
/// mutex-guarded free list with acquire/return semantics.
pub struct MusicBuffer {
    free: Mutex<Vec<Box<MusicChunk>>>,
    capacity: usize,
}

impl MusicBuffer {
    /// Pre-allocate `capacity` chunks.
    pub fn new(capacity: usize) -> Self {
        let free = (0..capacity).map(|_| Box::new(MusicChunk::new())).collect();
        Self { free: Mutex::new(free), capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of chunks currently available to `acquire`.
    pub fn available(&self) -> usize {
        self.free.lock().unwrap().len()
    }

    /// `acquire() -> chunk | none`.
    pub fn acquire(&self) -> Option<Box<MusicChunk>> {
        self.free.lock().unwrap().pop()
    }

    /// `return(chunk)`. Clears the chunk's contents before returning it to
    /// the pool so a stale tag or timestamp never leaks into the next
    /// session.
    pub fn give_back(&self, mut chunk: Box<MusicChunk>) {
        chunk.clear();
        let mut free = self.free.lock().unwrap();
        if free.len() < self.capacity {
            free.push(chunk);
        }
        // else: pool was over-subscribed (a bug upstream); drop the extra
        // chunk rather than grow unboundedly.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_drains_the_pool() {
        let buf = MusicBuffer::new(2);
        assert!(buf.acquire().is_some());
        assert!(buf.acquire().is_some());
        assert!(buf.acquire().is_none());
    }

    #[test]
    fn give_back_makes_it_available_again() {
        let buf = MusicBuffer::new(1);
        let chunk = buf.acquire().unwrap();
        assert_eq!(buf.available(), 0);
        buf.give_back(chunk);
        assert_eq!(buf.available(), 1);
    }

    #[test]
    fn give_back_clears_the_chunk() {
        use crate::format::{AudioFormat, SampleFormat};
        let buf = MusicBuffer::new(1);
        let mut chunk = buf.acquire().unwrap();
        chunk.write(AudioFormat::new(44_100, 2, SampleFormat::S16), 1.0, 1).unwrap();
        chunk.expand(10);
        buf.give_back(chunk);
        let chunk = buf.acquire().unwrap();
        assert_eq!(chunk.len(), 0);
    }
}
