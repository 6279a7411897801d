/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io::{self, Write};
use std::str::FromStr;

use super::HeadPolicyError;
use crate::{
    DEFAULT_PORT, DEFAULT_SCHEME, DEFAULT_VERSION, HeaderMap, HttpLineParseError, HttpRequestLine,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Head,
}

impl Method {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Head => "HEAD",
        }
    }
}

impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "HEAD" => Ok(Method::Head),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    scheme: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    path: String,
    query: String,
}

impl RequestLine {
    pub(super) fn parse(buf: &[u8]) -> Result<(Self, String), HttpLineParseError> {
        let line = HttpRequestLine::parse(buf)?;
        let req = RequestLine {
            method: line.method,
            scheme: line.scheme.map(str::to_string),
            host: line.host.map(str::to_string),
            port: line.port,
            path: line.path.to_string(),
            query: line.query.to_string(),
        };
        let version = line.version.unwrap_or(DEFAULT_VERSION).to_string();
        Ok((req, version))
    }

    #[inline]
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    #[inline]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    #[inline]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// The target up to the first `?`, so `/a/b` for `/a/b?c=d`.
    ///
    /// The split point does not affect the rendered target, which is always
    /// `path` followed by `query`.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Everything from the first `?` on, including the `?`, or empty.
    #[inline]
    pub fn query(&self) -> &str {
        &self.query
    }

    pub(super) fn normalize(&mut self, headers: &mut HeaderMap) -> Result<(), HeadPolicyError> {
        if let Some(port) = self.port {
            if port != DEFAULT_PORT {
                return Err(HeadPolicyError::UnsupportedPort(port));
            }
        }

        match headers.get_ignore_case("Host") {
            Some(value) => {
                if let (_, Some(port)) = split_host_field(value) {
                    if port != DEFAULT_PORT {
                        return Err(HeadPolicyError::UnsupportedPort(port));
                    }
                }
            }
            None => {
                let Some(host) = &self.host else {
                    return Err(HeadPolicyError::MissedHost);
                };
                headers.set("Host", host.as_str());
            }
        }

        let default_scheme = self
            .scheme
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case(DEFAULT_SCHEME))
            .unwrap_or(false);
        if default_scheme || self.host.is_some() || self.port.is_some() {
            self.scheme = None;
            self.host = None;
            self.port = None;
        }
        Ok(())
    }

    fn uri_parts(&self) -> (usize, bool) {
        let mut len = 0;
        if let Some(scheme) = &self.scheme {
            len += scheme.len() + 3;
        }
        if let Some(host) = &self.host {
            len += host.len();
            if let Some(port) = self.port {
                len += 1 + itoa::Buffer::new().format(port).len();
            }
        }
        len += self.path.len() + self.query.len();
        if len == 0 {
            // empty target, write "/"
            (1, true)
        } else {
            (len, false)
        }
    }

    pub(super) fn uri_len(&self) -> usize {
        self.uri_parts().0
    }

    pub(super) fn write_uri<W: Write>(&self, w: &mut W) -> io::Result<()> {
        if self.uri_parts().1 {
            return w.write_all(b"/");
        }
        if let Some(scheme) = &self.scheme {
            write!(w, "{scheme}://")?;
        }
        if let Some(host) = &self.host {
            w.write_all(host.as_bytes())?;
            if let Some(port) = self.port {
                w.write_all(b":")?;
                w.write_all(itoa::Buffer::new().format(port).as_bytes())?;
            }
        }
        w.write_all(self.path.as_bytes())?;
        w.write_all(self.query.as_bytes())
    }
}

/// Split a `Host` field value into host and the optional port.
///
/// A port that is not a valid number is kept as part of the host.
pub(super) fn split_host_field(value: &str) -> (&str, Option<u16>) {
    match value.rsplit_once(':') {
        Some((host, port)) => match u16::from_str(port) {
            Ok(port) => (host, Some(port)),
            Err(_) => (value, None),
        },
        None => (value, None),
    }
}
