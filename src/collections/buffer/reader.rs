use core::mem;

use zerocopy::FromBytes;

use crate::collections::buffer::ABSENT_LEN;
use crate::error::{CollectionError, Result};

/// Sequential typed reads over a byte slice, front to back.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    /// A reader positioned at the start of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    /// Whether every byte has been consumed.
    pub fn end_of_buffer(&self) -> bool {
        self.offset == self.bytes.len()
    }

    /// Reads the next `T`.
    ///
    /// # Panics
    /// Panics if fewer than `size_of::<T>()` bytes remain.
    #[track_caller]
    pub fn read_next<T: FromBytes>(&mut self) -> T {
        match self.try_read_next() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Reads the next `T`.
    ///
    /// # Errors
    /// `EndOfBuffer` if fewer than `size_of::<T>()` bytes remain; the offset
    /// is left unchanged.
    pub fn try_read_next<T: FromBytes>(&mut self) -> Result<T> {
        let bytes = self.read_next_bytes(mem::size_of::<T>())?;
        T::read_from(bytes).ok_or(CollectionError::EndOfBuffer {
            needed: mem::size_of::<T>(),
            remaining: bytes.len(),
        })
    }

    /// Borrows the next `len` bytes.
    ///
    /// # Errors
    /// `EndOfBuffer` if fewer remain.
    pub fn read_next_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(CollectionError::EndOfBuffer { needed: len, remaining });
        }
        let all = self.bytes;
        let bytes = &all[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    /// Reads an `i32`-prefixed array written by
    /// [`AppendBuffer::add_array`](super::AppendBuffer::add_array).
    ///
    /// # Errors
    /// `InvalidLength` for a negative prefix, `EndOfBuffer` if the elements
    /// run past the end. On error the offset is restored.
    pub fn read_next_array<T: FromBytes>(&mut self) -> Result<Vec<T>> {
        let start = self.offset;
        let result = self.read_array_body();
        if result.is_err() {
            self.offset = start;
        }
        result
    }

    fn read_array_body<T: FromBytes>(&mut self) -> Result<Vec<T>> {
        let len = self.read_length()?;
        let size = mem::size_of::<T>();
        let total = len.checked_mul(size).ok_or(CollectionError::CapacityOverflow)?;
        let bytes = self.read_next_bytes(total)?;
        if size == 0 {
            return Ok((0..len).map(|_| T::new_zeroed()).collect());
        }
        Ok(bytes.chunks_exact(size).filter_map(T::read_from).collect())
    }

    fn read_length(&mut self) -> Result<usize> {
        let len: i32 = self.try_read_next()?;
        usize::try_from(len).map_err(|_| CollectionError::InvalidLength(len))
    }

    /// Reads a string written by
    /// [`AppendBuffer::add_str`](super::AppendBuffer::add_str); `None` when
    /// the writer stored an absent string.
    ///
    /// # Errors
    /// `InvalidLength`, `EndOfBuffer` or `InvalidUtf8`. On error the offset
    /// is restored.
    pub fn read_next_str(&mut self) -> Result<Option<&'a str>> {
        let start = self.offset;
        let result = self.read_str_body();
        if result.is_err() {
            self.offset = start;
        }
        result
    }

    fn read_str_body(&mut self) -> Result<Option<&'a str>> {
        let len: i32 = self.try_read_next()?;
        if len == ABSENT_LEN {
            return Ok(None);
        }
        let len = usize::try_from(len).map_err(|_| CollectionError::InvalidLength(len))?;
        let bytes = self.read_next_bytes(len)?;
        core::str::from_utf8(bytes)
            .map(Some)
            .map_err(|_| CollectionError::InvalidUtf8)
    }
}
