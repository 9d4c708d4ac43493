//! Pull-based streaming encryption/decryption.
//!
//! `EncryptStream` turns a sequence of plaintext chunks into one frame
//! per chunk. `DecryptStream` accepts byte fragments from a transport
//! that knows nothing about frame boundaries (1 byte or 10 MiB at a
//! time) and reassembles frames of a fixed `expected_frame_size` agreed
//! with the encoder out of band.
//!
//! Both are iterators: the consumer drives progress one frame at a time,
//! so memory stays O(frame size) regardless of stream length.

use cybs3_core::{CybsError, CybsResult};

use crate::frame::{open_frame, seal_frame};
use crate::kdf::DerivedKey;
use crate::FRAME_OVERHEAD;

/// Encrypts a stream of plaintext chunks into independent frames.
///
/// The producer decides chunk boundaries (normally via
/// [`chunk_size_for`](crate::frame::chunk_size_for)); each input chunk
/// becomes exactly one output frame.
pub struct EncryptStream<I> {
    key: DerivedKey,
    chunks: I,
}

impl<I> EncryptStream<I>
where
    I: Iterator<Item = CybsResult<Vec<u8>>>,
{
    pub fn new(key: &DerivedKey, chunks: I) -> Self {
        Self {
            key: key.clone(),
            chunks,
        }
    }
}

impl<I> Iterator for EncryptStream<I>
where
    I: Iterator<Item = CybsResult<Vec<u8>>>,
{
    type Item = CybsResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.chunks.next()? {
            Ok(chunk) => Some(seal_frame(&self.key, &chunk)),
            Err(e) => Some(Err(e)),
        }
    }
}

/// Decrypts an arbitrarily fragmented frame stream.
///
/// Buffers upstream fragments until `expected_frame_size` bytes are
/// available, slices exactly that many off the front, and opens them as
/// one frame. When upstream ends with a non-empty buffer, the remainder
/// is the final (possibly shorter) frame — valid only if it is at least
/// the 28-byte minimum.
pub struct DecryptStream<I> {
    key: DerivedKey,
    fragments: I,
    expected_frame_size: usize,
    buffer: Vec<u8>,
    upstream_done: bool,
    failed: bool,
}

impl<I> DecryptStream<I>
where
    I: Iterator<Item = CybsResult<Vec<u8>>>,
{
    pub fn new(key: &DerivedKey, fragments: I, expected_frame_size: usize) -> Self {
        Self {
            key: key.clone(),
            fragments,
            expected_frame_size,
            buffer: Vec::new(),
            upstream_done: false,
            failed: false,
        }
    }

    fn take_frame(&mut self, len: usize) -> Vec<u8> {
        let frame: Vec<u8> = self.buffer.drain(..len).collect();
        frame
    }
}

impl<I> Iterator for DecryptStream<I>
where
    I: Iterator<Item = CybsResult<Vec<u8>>>,
{
    type Item = CybsResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            if self.buffer.len() >= self.expected_frame_size {
                let frame = self.take_frame(self.expected_frame_size);
                let result = open_frame(&self.key, &frame);
                if result.is_err() {
                    self.failed = true;
                }
                return Some(result);
            }

            if self.upstream_done {
                if self.buffer.is_empty() {
                    return None;
                }
                // Trailing short frame: everything left, if it can hold
                // at least a nonce and tag.
                if self.buffer.len() < FRAME_OVERHEAD {
                    self.failed = true;
                    return Some(Err(CybsError::Crypto(format!(
                        "invalid trailing data: {} bytes (minimum frame is {FRAME_OVERHEAD})",
                        self.buffer.len()
                    ))));
                }
                let len = self.buffer.len();
                let frame = self.take_frame(len);
                let result = open_frame(&self.key, &frame);
                if result.is_err() {
                    self.failed = true;
                }
                return Some(result);
            }

            match self.fragments.next() {
                Some(Ok(fragment)) => self.buffer.extend_from_slice(&fragment),
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e));
                }
                None => self.upstream_done = true,
            }
        }
    }
}

/// Encrypt a whole in-memory buffer, chunked at `chunk_size`.
///
/// Output length always equals
/// [`encrypted_size`](crate::frame::encrypted_size)`(data.len(), chunk_size)`.
pub fn encrypt_bytes(key: &DerivedKey, data: &[u8], chunk_size: usize) -> CybsResult<Vec<u8>> {
    let chunks = data.chunks(chunk_size).map(|c| Ok(c.to_vec()));
    let mut out = Vec::new();
    for frame in EncryptStream::new(key, chunks) {
        out.extend_from_slice(&frame?);
    }
    Ok(out)
}

/// Decrypt a whole in-memory buffer of concatenated frames.
pub fn decrypt_bytes(
    key: &DerivedKey,
    data: &[u8],
    expected_frame_size: usize,
) -> CybsResult<Vec<u8>> {
    let fragments = std::iter::once(Ok(data.to_vec()));
    let mut out = Vec::new();
    for plaintext in DecryptStream::new(key, fragments, expected_frame_size) {
        out.extend_from_slice(&plaintext?);
    }
    Ok(out)
}
