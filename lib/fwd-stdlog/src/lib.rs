/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io::{self, Write};
use std::sync::Arc;

use chrono::Local;
use flume::{Receiver, Sender, TrySendError};
use slog::{Drain, Level, OwnedKVList, Record};

mod format;
use format::StdLogFormatter;

mod stats;
pub use stats::{LogSnapshot, LogStats};

const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Clone, Debug)]
pub struct AsyncLogConfig {
    pub channel_capacity: usize,
    pub thread_name: String,
}

impl AsyncLogConfig {
    pub fn with_name(thread_name: &str) -> Self {
        AsyncLogConfig {
            channel_capacity: 1024,
            thread_name: thread_name.to_string(),
        }
    }
}

impl Default for AsyncLogConfig {
    fn default() -> Self {
        AsyncLogConfig::with_name("log-async")
    }
}

pub struct StdLogValue {
    level: Level,
    message: String,
    kv_pairs: Vec<(String, String)>,
    location: Option<String>,
}

impl StdLogValue {
    fn message_str(&self) -> &str {
        if self.message.is_empty() {
            "()"
        } else {
            &self.message
        }
    }

    fn write_plain<IO: Write>(&self, io: &mut IO, time: &str) -> io::Result<()> {
        write!(io, "{time} {}", self.level.as_short_str())?;
        for (k, v) in &self.kv_pairs {
            write!(io, " {k}: {v},")?;
        }
        write!(io, " {}", self.message_str())?;
        if let Some(location) = &self.location {
            write!(io, " <{location}>")?;
        }
        writeln!(io)
    }
}

/// A slog drain that formats on the caller thread and writes on a
/// dedicated io thread, so that logging never blocks the caller.
pub struct AsyncStdLogger {
    sender: Sender<StdLogValue>,
    formatter: StdLogFormatter,
    stats: Arc<LogStats>,
}

impl AsyncStdLogger {
    pub fn get_stats(&self) -> Arc<LogStats> {
        Arc::clone(&self.stats)
    }
}

impl Drain for AsyncStdLogger {
    type Ok = ();
    type Err = slog::Error;

    fn log(&self, record: &Record, logger_values: &OwnedKVList) -> Result<(), slog::Error> {
        self.stats.add_total();

        match self.formatter.format_slog(record, logger_values) {
            Ok(v) => {
                match self.sender.try_send(v) {
                    Ok(_) => {}
                    Err(TrySendError::Full(_)) => self.stats.add_channel_overflow(),
                    Err(TrySendError::Disconnected(_)) => self.stats.add_channel_closed(),
                }
                Ok(())
            }
            Err(e) => {
                self.stats.add_format_failed();
                Err(e)
            }
        }
    }
}

pub fn new_async_logger(
    async_conf: &AsyncLogConfig,
    append_code_position: bool,
    use_stdout: bool,
) -> io::Result<AsyncStdLogger> {
    let (sender, receiver) = flume::bounded::<StdLogValue>(async_conf.channel_capacity);

    let stats = Arc::new(LogStats::default());

    let io_thread = AsyncIoThread {
        receiver,
        stats: Arc::clone(&stats),
    };

    let _detached_thread = std::thread::Builder::new()
        .name(async_conf.thread_name.clone())
        .spawn(move || {
            if use_stdout {
                io_thread.run(io::stdout())
            } else {
                io_thread.run(io::stderr())
            }
        })?;

    Ok(AsyncStdLogger {
        sender,
        formatter: StdLogFormatter::new(append_code_position),
        stats,
    })
}

struct AsyncIoThread {
    receiver: Receiver<StdLogValue>,
    stats: Arc<LogStats>,
}

impl AsyncIoThread {
    fn run<IO: Write>(self, mut io: IO) {
        let mut buf: Vec<u8> = Vec::with_capacity(1024);
        while let Ok(v) = self.receiver.recv() {
            self.write_value(&mut io, &mut buf, v);

            while let Ok(v) = self.receiver.try_recv() {
                self.write_value(&mut io, &mut buf, v);
            }

            let _ = io.flush();
        }
    }

    fn write_value<IO: Write>(&self, io: &mut IO, buf: &mut Vec<u8>, v: StdLogValue) {
        buf.clear();
        let time = Local::now().format(LOG_TIME_FORMAT).to_string();
        let _ = v.write_plain(buf, &time);
        match io.write_all(buf) {
            Ok(_) => self.stats.add_passed(buf.len()),
            Err(_) => self.stats.add_peer_unreachable(),
        }
    }
}
