/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io::{self, Write};

use crate::parse::head_lines;
use crate::{DEFAULT_VERSION, HeadParseError, HeaderMap, HttpHeaderLine, HttpLineParseError};

mod error;
pub use error::HeadPolicyError;

mod request;
pub use request::{Method, RequestLine};

mod response;
pub use response::{ErrorResponse, StatusLine};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeadLine {
    Request(RequestLine),
    Response(StatusLine),
}

/// A fully parsed HTTP message head.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpHead {
    version: String,
    headers: HeaderMap,
    line: HeadLine,
}

impl HttpHead {
    fn new(version: String, line: HeadLine) -> Self {
        HttpHead {
            version,
            headers: HeaderMap::new(),
            line,
        }
    }

    #[inline]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn line(&self) -> &HeadLine {
        &self.line
    }

    pub fn request(&self) -> Option<&RequestLine> {
        match &self.line {
            HeadLine::Request(r) => Some(r),
            HeadLine::Response(_) => None,
        }
    }

    pub fn response(&self) -> Option<&StatusLine> {
        match &self.line {
            HeadLine::Request(_) => None,
            HeadLine::Response(s) => Some(s),
        }
    }

    /// Parse a request head from `buf`, which should end right before the
    /// head terminator.
    pub fn parse_request(buf: &[u8]) -> Result<Self, HeadParseError> {
        let mut lines = head_lines(buf);
        let Some((offset, first)) = lines.next() else {
            return Err(HeadParseError::new(0, HttpLineParseError::EmptyHead));
        };
        let (line, version) =
            RequestLine::parse(first).map_err(|e| HeadParseError::new(offset, e))?;
        let mut head = HttpHead::new(version, HeadLine::Request(line));
        head.parse_header_lines(lines)?;
        Ok(head)
    }

    /// Parse a response head from `buf`, which should end right before the
    /// head terminator.
    pub fn parse_response(buf: &[u8]) -> Result<Self, HeadParseError> {
        let mut lines = head_lines(buf);
        let Some((offset, first)) = lines.next() else {
            return Err(HeadParseError::new(0, HttpLineParseError::EmptyHead));
        };
        let (line, version) =
            StatusLine::parse(first).map_err(|e| HeadParseError::new(offset, e))?;
        let mut head = HttpHead::new(version, HeadLine::Response(line));
        head.parse_header_lines(lines)?;
        Ok(head)
    }

    fn parse_header_lines<'a, I>(&mut self, lines: I) -> Result<(), HeadParseError>
    where
        I: Iterator<Item = (usize, &'a [u8])>,
    {
        for (offset, line) in lines {
            let header =
                HttpHeaderLine::parse(line).map_err(|e| HeadParseError::new(offset, e))?;
            self.headers.set(header.name, header.value);
        }
        Ok(())
    }

    /// Apply the forwarding policy: downgrade to HTTP/1.0, force
    /// `Connection: close`, and for requests rewrite the request line to
    /// origin form.
    ///
    /// Applying it a second time has no effect.
    pub fn normalize(&mut self) -> Result<(), HeadPolicyError> {
        if let HeadLine::Request(req) = &mut self.line {
            req.normalize(&mut self.headers)?;
        }
        if self.version != DEFAULT_VERSION {
            self.version = DEFAULT_VERSION.to_string();
        }
        self.headers.set("Connection", "close");
        Ok(())
    }

    /// The origin host this request should be sent to.
    ///
    /// The authority in the request target is preferred, then the `Host`
    /// field. Any port is dropped as only the default port is allowed.
    pub fn upstream_host(&self) -> Option<&str> {
        let req = self.request()?;
        if let Some(host) = req.host() {
            return Some(host);
        }
        let value = self.headers.get_ignore_case("Host")?;
        let (host, _) = request::split_host_field(value);
        (!host.is_empty()).then_some(host)
    }

    pub fn serialized_len(&self) -> usize {
        let line_len = match &self.line {
            HeadLine::Request(r) => r.method.as_str().len() + 1 + r.uri_len() + 1,
            HeadLine::Response(s) => s.code().len() + 1 + s.reason().len() + 1,
        };
        let headers_len: usize = self
            .headers
            .iter()
            .map(|(k, v)| k.len() + 1 + v.len() + 2)
            .sum();
        line_len + self.version.len() + 2 + headers_len + 2
    }

    /// Render the head, including the terminating blank line.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        buf.reserve(self.serialized_len());
        // writing into a Vec won't fail
        let _ = self.write_first_line(buf);
        for (name, value) in self.headers.iter() {
            buf.extend_from_slice(name.as_bytes());
            buf.push(b':');
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        buf.extend_from_slice(b"\r\n");
    }

    fn write_first_line(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        match &self.line {
            HeadLine::Request(r) => {
                write!(buf, "{} ", r.method.as_str())?;
                r.write_uri(buf)?;
                write!(buf, " {}\r\n", self.version)
            }
            HeadLine::Response(s) => {
                write!(buf, "{} {} {}\r\n", self.version, s.code(), s.reason())
            }
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }
}
