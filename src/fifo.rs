//! # Receive ring buffer
//!
//! Fixed capacity circular byte queue holding socket payload which was pushed by the modem but not yet
//! consumed. One slot is always kept empty for distinguishing a full from an empty buffer, so a buffer of
//! `N` bytes stores at most `N - 1` bytes.
//!
//! The adapter is the single writer (while scanning the transport) and the socket owner the single reader.
//! The buffer itself does no locking.

/// Circular byte queue of `N` bytes
pub struct RxFifo<const N: usize> {
    buffer: [u8; N],

    /// Next index to write
    write: usize,

    /// Next index to read
    read: usize,
}

impl<const N: usize> RxFifo<N> {
    pub const fn new() -> Self {
        Self {
            buffer: [0x0; N],
            write: 0,
            read: 0,
        }
    }

    /// Appends a single byte. Returns false if the buffer is full.
    pub fn put(&mut self, byte: u8) -> bool {
        let next = self.advance(self.write);
        if next == self.read {
            return false;
        }

        self.buffer[self.write] = byte;
        self.write = next;
        true
    }

    /// Takes the oldest byte, if any
    pub fn get(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }

        let byte = self.buffer[self.read];
        self.read = self.advance(self.read);
        Some(byte)
    }

    /// Appends as many bytes as fit and returns the number of bytes stored
    pub fn put_slice(&mut self, data: &[u8]) -> usize {
        let count = data.len().min(self.free());

        for byte in &data[..count] {
            self.buffer[self.write] = *byte;
            self.write = self.advance(self.write);
        }

        count
    }

    /// Moves as many bytes as available into `buffer` and returns the number of bytes copied
    pub fn get_slice(&mut self, buffer: &mut [u8]) -> usize {
        let count = buffer.len().min(self.size());

        for slot in &mut buffer[..count] {
            *slot = self.buffer[self.read];
            self.read = self.advance(self.read);
        }

        count
    }

    /// Drops all buffered bytes
    pub fn clear(&mut self) {
        self.write = 0;
        self.read = 0;
    }

    /// Number of buffered bytes
    pub fn size(&self) -> usize {
        if N == 0 {
            return 0;
        }

        (self.write + N - self.read) % N
    }

    /// Number of bytes which may still be stored
    pub fn free(&self) -> usize {
        self.capacity() - self.size()
    }

    /// Max. number of bytes the buffer is able to hold
    pub const fn capacity(&self) -> usize {
        N.saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    pub fn is_full(&self) -> bool {
        self.free() == 0
    }

    fn advance(&self, index: usize) -> usize {
        if N == 0 {
            return 0;
        }

        (index + 1) % N
    }
}

impl<const N: usize> Default for RxFifo<N> {
    fn default() -> Self {
        Self::new()
    }
}
