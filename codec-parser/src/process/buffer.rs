/// Append-only byte accumulator with a logical read cursor.
///
/// Consumed bytes are dropped by moving a head offset; the backing storage is
/// compacted on the next [`push`](RawBuffer::push) once the dead prefix
/// outweighs the live bytes, so each input byte is moved at most a constant
/// number of times.
#[derive(Debug, Default)]
pub struct RawBuffer {
    data: Vec<u8>,
    head: usize,
    consumed: u64,
    total_in: u64,
}

impl RawBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            ..Default::default()
        }
    }

    /// Appends a chunk of input.
    pub fn push(&mut self, bytes: &[u8]) {
        if self.head > 0 && self.head >= self.data.len() - self.head {
            self.data.drain(..self.head);
            self.head = 0;
        }

        self.data.extend_from_slice(bytes);
        self.total_in += bytes.len() as u64;
    }

    /// Bytes available from the read cursor.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data[self.head..]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() - self.head
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the bytes starting at `offset` when at least `min_size + offset`
    /// bytes are buffered, `None` when the caller has to wait for more input.
    pub fn require(&self, min_size: usize, offset: usize) -> Option<&[u8]> {
        if self.len() < min_size + offset {
            return None;
        }

        Some(&self.data()[offset..])
    }

    /// Discards `n` bytes from the front; clamps at the end of the buffer.
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.len());
        self.head += n;
        self.consumed += n as u64;

        if self.head == self.data.len() {
            self.data.clear();
            self.head = 0;
        }
    }

    /// Total bytes discarded so far, i.e. the stream offset of [`data`](RawBuffer::data).
    #[inline]
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Total bytes pushed so far.
    #[inline]
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Drops all buffered bytes and counters.
    pub fn clear(&mut self) {
        self.data.clear();
        self.head = 0;
        self.consumed = 0;
        self.total_in = 0;
    }
}
