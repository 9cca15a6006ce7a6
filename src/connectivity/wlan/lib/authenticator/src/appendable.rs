// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
#[error("buffer is too small")]
pub struct BufferTooSmall;

/// A byte sink that frame and element writers append into.
pub trait Appendable {
    fn append_bytes(&mut self, bytes: &[u8]) -> Result<(), BufferTooSmall>;

    fn append_bytes_zeroed(&mut self, len: usize) -> Result<&mut [u8], BufferTooSmall>;

    fn bytes_written(&self) -> usize;

    fn can_append(&self, bytes: usize) -> bool;

    fn append_byte(&mut self, byte: u8) -> Result<(), BufferTooSmall> {
        self.append_bytes(&[byte])
    }

    fn append_le_u16(&mut self, value: u16) -> Result<(), BufferTooSmall> {
        self.append_bytes(&value.to_le_bytes()[..])
    }

    fn append_be_u16(&mut self, value: u16) -> Result<(), BufferTooSmall> {
        self.append_bytes(&value.to_be_bytes()[..])
    }
}

impl Appendable for Vec<u8> {
    fn append_bytes(&mut self, bytes: &[u8]) -> Result<(), BufferTooSmall> {
        self.extend_from_slice(bytes);
        Ok(())
    }

    fn append_bytes_zeroed(&mut self, len: usize) -> Result<&mut [u8], BufferTooSmall> {
        let old_len = self.len();
        self.resize(old_len + len, 0);
        Ok(&mut self[old_len..])
    }

    fn bytes_written(&self) -> usize {
        self.len()
    }

    fn can_append(&self, _bytes: usize) -> bool {
        true
    }
}

/// A fixed capacity buffer for exercising writers against short buffers.
#[cfg(test)]
pub struct FixedSizedTestBuffer {
    buf: Vec<u8>,
    capacity: usize,
}

#[cfg(test)]
impl FixedSizedTestBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity), capacity }
    }
}

#[cfg(test)]
impl Appendable for FixedSizedTestBuffer {
    fn append_bytes(&mut self, bytes: &[u8]) -> Result<(), BufferTooSmall> {
        if !self.can_append(bytes.len()) {
            return Err(BufferTooSmall);
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn append_bytes_zeroed(&mut self, len: usize) -> Result<&mut [u8], BufferTooSmall> {
        if !self.can_append(len) {
            return Err(BufferTooSmall);
        }
        let old_len = self.buf.len();
        self.buf.resize(old_len + len, 0);
        Ok(&mut self.buf[old_len..])
    }

    fn bytes_written(&self) -> usize {
        self.buf.len()
    }

    fn can_append(&self, bytes: usize) -> bool {
        self.buf.len() + bytes <= self.capacity
    }
}
