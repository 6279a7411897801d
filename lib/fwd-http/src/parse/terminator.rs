/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

/// Location of the blank line that ends a message head.
///
/// `offset` is where the terminator starts, which is also the length of the
/// head content (the last field line without its line ending). The body
/// starts at `offset + len`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeadTerminator {
    pub offset: usize,
    pub len: usize,
}

impl HeadTerminator {
    #[inline]
    pub fn body_start(&self) -> usize {
        self.offset + self.len
    }
}

/// Find the head terminator in `buf`.
///
/// Accepts all of `CRLFCRLF`, `LFLF`, `CRLFLF` and `LFCRLF`. Only LF bytes at
/// or after `scan_from` are checked, the bytes before it are used as look
/// behind, so a caller that appends data can resume with the previous length
/// and still find a terminator that is split across deliveries.
pub fn find_head_end(buf: &[u8], scan_from: usize) -> Option<HeadTerminator> {
    if scan_from >= buf.len() {
        return None;
    }

    for p in memchr::memchr_iter(b'\n', &buf[scan_from..]) {
        let i = scan_from + p;
        if i >= 1 && buf[i - 1] == b'\n' {
            // LF LF, or CR LF LF
            let len = if i >= 2 && buf[i - 2] == b'\r' { 3 } else { 2 };
            return Some(HeadTerminator {
                offset: i + 1 - len,
                len,
            });
        }
        if i >= 2 && buf[i - 1] == b'\r' && buf[i - 2] == b'\n' {
            // LF CR LF, or CR LF CR LF
            let len = if i >= 3 && buf[i - 3] == b'\r' { 4 } else { 3 };
            return Some(HeadTerminator {
                offset: i + 1 - len,
                len,
            });
        }
    }
    None
}
