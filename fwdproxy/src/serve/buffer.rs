/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use fwd_http::HeadPolicyError;

/// Fixed capacity byte buffer of one relay direction.
///
/// Data is read into `[r_off..]` and written out from `[w_off..r_off]`.
pub(crate) struct RelayBuffer {
    buf: Box<[u8]>,
    r_off: usize,
    w_off: usize,
}

impl RelayBuffer {
    pub(crate) fn new(size: usize) -> Self {
        RelayBuffer {
            buf: vec![0; size].into_boxed_slice(),
            r_off: 0,
            w_off: 0,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.r_off - self.w_off
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.r_off == self.w_off
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.len() == self.buf.len()
    }

    /// Get the free space to read into, moving pending data to the front
    /// first if the tail is used up.
    pub(crate) fn unfilled_mut(&mut self) -> &mut [u8] {
        if self.r_off == self.buf.len() {
            self.compact();
        }
        &mut self.buf[self.r_off..]
    }

    pub(crate) fn commit(&mut self, size: usize) {
        debug_assert!(self.r_off + size <= self.buf.len());
        self.r_off += size;
    }

    #[inline]
    pub(crate) fn filled(&self) -> &[u8] {
        &self.buf[self.w_off..self.r_off]
    }

    pub(crate) fn consume(&mut self, size: usize) {
        debug_assert!(size <= self.len());
        self.w_off += size;
        if self.w_off == self.r_off {
            self.w_off = 0;
            self.r_off = 0;
        }
    }

    pub(crate) fn compact(&mut self) {
        if self.w_off == 0 {
            return;
        }
        self.buf.copy_within(self.w_off..self.r_off, 0);
        self.r_off -= self.w_off;
        self.w_off = 0;
    }

    pub(crate) fn clear(&mut self) {
        self.r_off = 0;
        self.w_off = 0;
    }

    /// Replace the first `head_len` pending bytes with `head`, keeping the
    /// rest of the pending data right after it.
    pub(crate) fn replace_head(
        &mut self,
        head_len: usize,
        head: &[u8],
    ) -> Result<(), HeadPolicyError> {
        let left = self.len().saturating_sub(head_len);
        if head.len() + left > self.buf.len() {
            return Err(HeadPolicyError::PayloadTooLarge(self.buf.len()));
        }
        self.compact();
        let body_start = head_len.min(self.r_off);
        self.buf.copy_within(body_start..self.r_off, head.len());
        self.buf[..head.len()].copy_from_slice(head);
        self.r_off = head.len() + left;
        Ok(())
    }

    /// Drop all pending data and put `data` in its place.
    pub(crate) fn set_content(&mut self, data: &[u8]) -> Result<(), HeadPolicyError> {
        self.clear();
        self.replace_head(0, data)
    }
}
