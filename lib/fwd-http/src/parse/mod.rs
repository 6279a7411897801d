/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

mod error;
pub use error::{HeadParseError, HttpLineParseError};

mod terminator;
pub use terminator::{HeadTerminator, find_head_end};

mod header_line;
pub use header_line::HttpHeaderLine;

mod request_line;
pub use request_line::HttpRequestLine;

mod status_line;
pub use status_line::HttpStatusLine;

mod version;

/// Iterate the lines of a head, yielding the offset of each line start and
/// the line content with the trailing CR stripped.
pub(crate) fn head_lines(buf: &[u8]) -> impl Iterator<Item = (usize, &[u8])> {
    let mut start = 0usize;
    std::iter::from_fn(move || {
        if start >= buf.len() {
            return None;
        }
        let offset = start;
        let (line, next) = match memchr::memchr(b'\n', &buf[start..]) {
            Some(p) => (&buf[start..start + p], start + p + 1),
            None => (&buf[start..], buf.len()),
        };
        start = next;
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        Some((offset, line))
    })
}
