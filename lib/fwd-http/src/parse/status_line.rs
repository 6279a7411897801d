/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use super::HttpLineParseError;
use super::version::is_http_version;

pub struct HttpStatusLine<'a> {
    pub version: &'a str,
    pub code: &'a str,
    pub reason: &'a str,
}

impl<'a> HttpStatusLine<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<HttpStatusLine<'a>, HttpLineParseError> {
        let line = std::str::from_utf8(buf)?;

        let Some(p) = memchr::memchr(b' ', line.as_bytes()) else {
            return Err(HttpLineParseError::NoDelimiterFound(' '));
        };
        let version = &line[0..p];
        if !is_http_version(version.as_bytes()) {
            return Err(HttpLineParseError::InvalidVersion);
        }

        let left = &line[p + 1..];
        let b = left.as_bytes();
        if b.len() < 3 || !b[..3].iter().all(u8::is_ascii_digit) {
            return Err(HttpLineParseError::InvalidStatusCode);
        }
        let reason = match b.get(3) {
            None => "",
            Some(b' ') => left[4..].trim_matches([' ', '\t']),
            Some(_) => return Err(HttpLineParseError::InvalidStatusCode),
        };
        if reason.bytes().any(|c| c.is_ascii_control() && c != b'\t') {
            return Err(HttpLineParseError::InvalidReasonPhrase);
        }

        Ok(HttpStatusLine {
            version,
            code: &left[..3],
            reason,
        })
    }
}
