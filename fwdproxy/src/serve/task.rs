/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Per pair facts, kept by the client side unit.
pub(crate) struct TaskNotes {
    pub(crate) id: u64,
    pub(crate) client_addr: SocketAddr,
    pub(crate) upstream: Option<String>,
    start_at: Instant,
}

impl TaskNotes {
    pub(crate) fn new(id: u64, client_addr: SocketAddr) -> Self {
        TaskNotes {
            id,
            client_addr,
            upstream: None,
            start_at: Instant::now(),
        }
    }

    pub(crate) fn time_elapsed(&self) -> Duration {
        self.start_at.elapsed()
    }
}
