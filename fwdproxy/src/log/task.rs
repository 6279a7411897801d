/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use slog::{Logger, slog_info, slog_o};

use crate::serve::{ServerTaskError, TaskNotes};

pub(crate) fn get_logger() -> Logger {
    slog_scope::logger().new(slog_o!(
        "log_type" => super::LOG_TYPE_TASK,
        "pid" => std::process::id(),
    ))
}

pub(crate) enum TaskEvent {
    Created,
    Connected,
    ClientShutdown,
    UpstreamShutdown,
    Finished,
}

impl TaskEvent {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            TaskEvent::Created => "Created",
            TaskEvent::Connected => "Connected",
            TaskEvent::ClientShutdown => "ClientShutdown",
            TaskEvent::UpstreamShutdown => "UpstreamShutdown",
            TaskEvent::Finished => "Finished",
        }
    }
}

pub(crate) struct TaskLogForRelay<'a> {
    pub(crate) logger: &'a Logger,
    pub(crate) task_notes: &'a TaskNotes,
    pub(crate) client_rd_bytes: u64,
    pub(crate) client_wr_bytes: u64,
    pub(crate) upstream_rd_bytes: u64,
    pub(crate) upstream_wr_bytes: u64,
}

impl TaskLogForRelay<'_> {
    pub(crate) fn log_created(&self) {
        slog_info!(self.logger, "";
            "task_type" => "HttpForward",
            "task_id" => self.task_notes.id,
            "task_event" => TaskEvent::Created.as_str(),
            "client_addr" => self.task_notes.client_addr,
        )
    }

    pub(crate) fn log_connected(&self) {
        slog_info!(self.logger, "";
            "task_type" => "HttpForward",
            "task_id" => self.task_notes.id,
            "task_event" => TaskEvent::Connected.as_str(),
            "client_addr" => self.task_notes.client_addr,
            "upstream" => self.task_notes.upstream.as_deref(),
            "total_time" => ?self.task_notes.time_elapsed(),
        )
    }

    fn log_partial_shutdown(&self, task_event: TaskEvent) {
        slog_info!(self.logger, "";
            "task_type" => "HttpForward",
            "task_id" => self.task_notes.id,
            "task_event" => task_event.as_str(),
            "client_addr" => self.task_notes.client_addr,
            "upstream" => self.task_notes.upstream.as_deref(),
            "total_time" => ?self.task_notes.time_elapsed(),
            "c_rd_bytes" => self.client_rd_bytes,
            "c_wr_bytes" => self.client_wr_bytes,
            "r_rd_bytes" => self.upstream_rd_bytes,
            "r_wr_bytes" => self.upstream_wr_bytes,
        )
    }

    pub(crate) fn log_client_shutdown(&self) {
        self.log_partial_shutdown(TaskEvent::ClientShutdown);
    }

    pub(crate) fn log_upstream_shutdown(&self) {
        self.log_partial_shutdown(TaskEvent::UpstreamShutdown);
    }

    pub(crate) fn log(&self, e: &ServerTaskError) {
        slog_info!(self.logger, "{}", e;
            "task_type" => "HttpForward",
            "task_id" => self.task_notes.id,
            "task_event" => TaskEvent::Finished.as_str(),
            "client_addr" => self.task_notes.client_addr,
            "upstream" => self.task_notes.upstream.as_deref(),
            "total_time" => ?self.task_notes.time_elapsed(),
            "c_rd_bytes" => self.client_rd_bytes,
            "c_wr_bytes" => self.client_wr_bytes,
            "r_rd_bytes" => self.upstream_rd_bytes,
            "r_wr_bytes" => self.upstream_wr_bytes,
            "reason" => e.brief(),
        )
    }
}
