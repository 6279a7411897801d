/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

mod buffer;
use buffer::RelayBuffer;

mod error;
pub use error::{ServerTaskError, ServerTaskResult};

mod stats;
use stats::HalfConnectionStats;
pub use stats::{ReactorSnapshot, ReactorStats};

mod task;
pub(crate) use task::TaskNotes;

mod unit;
use unit::{HalfConnection, Role, UnitAction};

mod listen;

mod resolve;
pub use resolve::{HostResolver, SystemResolver};

mod reactor;
pub use reactor::{Reactor, ReactorHandle};
