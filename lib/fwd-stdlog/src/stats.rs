/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct LogStats {
    total: AtomicU64,
    passed: AtomicU64,
    passed_size: AtomicU64,
    channel_overflow: AtomicU64,
    channel_closed: AtomicU64,
    format_failed: AtomicU64,
    peer_unreachable: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogSnapshot {
    pub total: u64,
    pub passed: u64,
    pub passed_size: u64,
    pub dropped: u64,
}

impl LogStats {
    pub(crate) fn add_total(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_passed(&self, size: usize) {
        self.passed.fetch_add(1, Ordering::Relaxed);
        self.passed_size.fetch_add(size as u64, Ordering::Relaxed);
    }

    pub(crate) fn add_channel_overflow(&self) {
        self.channel_overflow.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_channel_closed(&self) {
        self.channel_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_format_failed(&self) {
        self.format_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_peer_unreachable(&self) {
        self.peer_unreachable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LogSnapshot {
        let dropped = self.channel_overflow.load(Ordering::Relaxed)
            + self.channel_closed.load(Ordering::Relaxed)
            + self.format_failed.load(Ordering::Relaxed)
            + self.peer_unreachable.load(Ordering::Relaxed);
        LogSnapshot {
            total: self.total.load(Ordering::Relaxed),
            passed: self.passed.load(Ordering::Relaxed),
            passed_size: self.passed_size.load(Ordering::Relaxed),
            dropped,
        }
    }
}
