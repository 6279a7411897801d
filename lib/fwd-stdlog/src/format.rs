/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt::{self, Write};

use slog::{KV, OwnedKVList, Record};

use super::StdLogValue;

pub(crate) struct StdLogFormatter {
    append_code_position: bool,
}

impl StdLogFormatter {
    pub(crate) fn new(append_code_position: bool) -> Self {
        StdLogFormatter {
            append_code_position,
        }
    }

    pub(crate) fn format_slog(
        &self,
        record: &Record,
        logger_values: &OwnedKVList,
    ) -> Result<StdLogValue, slog::Error> {
        let mut kv_formatter = KvFormatter::default();
        record.kv().serialize(record, &mut kv_formatter)?;
        logger_values.serialize(record, &mut kv_formatter)?;

        let location = if self.append_code_position {
            Some(format!("{}:{}", record.file(), record.line()))
        } else {
            None
        };

        Ok(StdLogValue {
            level: record.level(),
            message: record.msg().to_string(),
            kv_pairs: kv_formatter.pairs,
            location,
        })
    }
}

#[derive(Default)]
struct KvFormatter {
    pairs: Vec<(String, String)>,
}

impl slog::Serializer for KvFormatter {
    fn emit_arguments(&mut self, key: slog::Key, val: &fmt::Arguments) -> slog::Result {
        let mut v = String::new();
        v.write_fmt(*val)?;
        self.pairs.push((key.to_string(), v));
        Ok(())
    }

    fn emit_none(&mut self, key: slog::Key) -> slog::Result {
        self.pairs.push((key.to_string(), "none".to_string()));
        Ok(())
    }
}
