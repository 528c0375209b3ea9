//! Bounded FIFO of chunk references shared between decoder and player.

use std::sync::Mutex;

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};

use crate::buffer::MusicBuffer;
use crate::chunk::MusicChunk;

/// Single-producer (decoder), single-consumer (player) bounded queue of
/// chunk handles, built on a `ringbuf::HeapRb` split into its producer
/// and consumer halves.
///
/// Each half is wrapped in its own `Mutex` rather than handed out to
/// separate owning threads: the command protocol already guarantees
/// `push` on the decoder thread never overlaps `clear`'s drain from the
/// decoder thread with `shift`/`peek` on the player thread, so the
/// mutexes are uncontended in practice and exist only so `MusicPipe` can
/// be shared behind one `Arc` like the rest of the control block.
pub struct MusicPipe {
    producer: Mutex<HeapProd<Box<MusicChunk>>>,
    consumer: Mutex<HeapCons<Box<MusicChunk>>>,
    capacity: usize,
}

impl MusicPipe {
    pub fn new(capacity: usize) -> Self {
        let rb = HeapRb::new(capacity);
        let (producer, consumer) = rb.split();
        Self {
            producer: Mutex::new(producer),
            consumer: Mutex::new(consumer),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.consumer.lock().unwrap().occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `push(chunk)`. Returns the chunk back on failure (pipe full) so the
    /// decoder thread can retry after the player drains some chunks.
    pub fn push(&self, chunk: Box<MusicChunk>) -> Result<(), Box<MusicChunk>> {
        self.producer.lock().unwrap().try_push(chunk)
    }

    /// `peek()`. Does not remove the chunk.
    pub fn peek<R>(&self, f: impl FnOnce(Option<&MusicChunk>) -> R) -> R {
        let consumer = self.consumer.lock().unwrap();
        f(consumer.iter().next().map(|b| b.as_ref()))
    }

    /// `shift()`. Removes and returns the oldest chunk, if any.
    pub fn shift(&self) -> Option<Box<MusicChunk>> {
        self.consumer.lock().unwrap().try_pop()
    }

    /// Drains every remaining chunk back to the pool. Used by
    /// `command_finished` when acknowledging a SEEK and by the player
    /// when tearing a session down.
    pub fn clear(&self, buffer: &MusicBuffer) {
        let mut consumer = self.consumer.lock().unwrap();
        while let Some(chunk) = consumer.try_pop() {
            buffer.give_back(chunk);
        }
    }
}
