/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use anyhow::Context;
use slog::{Drain, slog_o};
use slog_scope::GlobalLoggerGuard;

use fwd_stdlog::{AsyncLogConfig, LogSnapshot, LogStats};

use crate::opts::ProcArgs;

pub(crate) mod task;

const LOG_TYPE_TASK: &str = "Task";

const PROCESS_LOG_THREAD_NAME: &str = "log-process";

fn log_level(verbose_level: u8) -> log::Level {
    match verbose_level {
        0 => log::Level::Warn,
        1 => log::Level::Info,
        2 => log::Level::Debug,
        _ => log::Level::Trace,
    }
}

fn slog_level(level: log::Level) -> slog::Level {
    match level {
        log::Level::Error => slog::Level::Error,
        log::Level::Warn => slog::Level::Warning,
        log::Level::Info => slog::Level::Info,
        log::Level::Debug => slog::Level::Debug,
        log::Level::Trace => slog::Level::Trace,
    }
}

/// Keeps the process logger installed, and gives access to its counters.
pub struct ProcessLogGuard {
    _scope: GlobalLoggerGuard,
    stats: Arc<LogStats>,
}

impl ProcessLogGuard {
    pub fn snapshot(&self) -> LogSnapshot {
        self.stats.snapshot()
    }

    pub fn summary(&self) -> String {
        stats_summary(&self.snapshot())
    }
}

fn stats_summary(s: &LogSnapshot) -> String {
    format!(
        "process log: {} records, {} written ({} bytes), {} dropped",
        s.total, s.passed, s.passed_size, s.dropped
    )
}

pub fn setup(args: &ProcArgs) -> anyhow::Result<ProcessLogGuard> {
    let async_conf = AsyncLogConfig::with_name(PROCESS_LOG_THREAD_NAME);
    let drain = fwd_stdlog::new_async_logger(&async_conf, args.verbose_level > 2, false)
        .context("failed to spawn log thread")?;
    let stats = drain.get_stats();
    let level = log_level(args.verbose_level);
    // task logs are emitted at info level, and only show up with -v
    let logger = slog::Logger::root(drain.filter_level(slog_level(level)).fuse(), slog_o!());

    let scope_guard = slog_scope::set_global_logger(logger);

    slog_stdlog::init_with_level(level)?;
    Ok(ProcessLogGuard {
        _scope: scope_guard,
        stats,
    })
}
