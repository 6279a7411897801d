/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct HalfConnectionStats {
    pub(crate) rd_bytes: u64,
    pub(crate) wr_bytes: u64,
}

impl HalfConnectionStats {
    #[inline]
    pub(crate) fn add_read(&mut self, size: usize) {
        self.rd_bytes += size as u64;
    }

    #[inline]
    pub(crate) fn add_write(&mut self, size: usize) {
        self.wr_bytes += size as u64;
    }
}

/// Counters of one reactor, readable from other threads.
#[derive(Debug, Default)]
pub struct ReactorStats {
    accepted: AtomicU64,
    alive: AtomicU64,
    rejected: AtomicU64,
    finished: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReactorSnapshot {
    pub accepted: u64,
    pub alive: u64,
    pub rejected: u64,
    pub finished: u64,
}

impl ReactorStats {
    pub(crate) fn add_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.alive.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_finished(&self) {
        self.finished.fetch_add(1, Ordering::Relaxed);
        self.alive.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ReactorSnapshot {
        ReactorSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            alive: self.alive.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            finished: self.finished.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_lifecycle() {
        let stats = ReactorStats::default();
        stats.add_accepted();
        stats.add_accepted();
        stats.add_rejected();
        stats.add_finished();
        let s = stats.snapshot();
        assert_eq!(s.accepted, 2);
        assert_eq!(s.alive, 1);
        assert_eq!(s.rejected, 1);
        assert_eq!(s.finished, 1);
    }
}
