/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::str::FromStr;

use atoi::FromRadix10Checked;

use super::HttpLineParseError;
use super::version::is_http_version;
use crate::{DEFAULT_SCHEME, Method};

/// The decomposed request-line.
///
/// The request target is split into `[scheme "://"] [host [":" port]] path query`,
/// where `query` is everything from the first `?` on.
#[derive(Debug)]
pub struct HttpRequestLine<'a> {
    pub method: Method,
    pub scheme: Option<&'a str>,
    pub host: Option<&'a str>,
    pub port: Option<u16>,
    pub path: &'a str,
    pub query: &'a str,
    pub version: Option<&'a str>,
}

impl<'a> HttpRequestLine<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<HttpRequestLine<'a>, HttpLineParseError> {
        let line = std::str::from_utf8(buf)?;

        let (method, left) = match memchr::memchr(b' ', line.as_bytes()) {
            Some(p) => (&line[..p], Some(&line[p + 1..])),
            None => (line, None),
        };
        let method =
            Method::from_str(method).map_err(|_| HttpLineParseError::UnsupportedMethod)?;
        let Some(left) = left else {
            return Err(HttpLineParseError::NoDelimiterFound(' '));
        };

        let (target, version) = match memchr::memchr(b' ', left.as_bytes()) {
            Some(p) => {
                let version = &left[p + 1..];
                if !is_http_version(version.as_bytes()) {
                    return Err(HttpLineParseError::InvalidVersion);
                }
                (&left[..p], Some(version))
            }
            None => (left, None),
        };
        if target.is_empty() {
            return Err(HttpLineParseError::InvalidRequestTarget);
        }

        let (scheme, left) = split_scheme(target)?;
        let (host, port, left) = if scheme.is_some() || !left.starts_with('/') {
            let end = left.find(['/', '?']).unwrap_or(left.len());
            let (host, port) = split_authority(&left[..end])?;
            (Some(host), port, &left[end..])
        } else {
            (None, None, left)
        };
        let (path, query) = match memchr::memchr(b'?', left.as_bytes()) {
            Some(p) => (&left[..p], &left[p..]),
            None => (left, ""),
        };

        Ok(HttpRequestLine {
            method,
            scheme,
            host,
            port,
            path,
            query,
            version,
        })
    }
}

fn split_scheme(target: &str) -> Result<(Option<&str>, &str), HttpLineParseError> {
    let Some(p) = target.find("://") else {
        return Ok((None, target));
    };
    let scheme = &target[..p];
    if scheme.is_empty() || !scheme.bytes().all(|b| b.is_ascii_alphabetic()) {
        // something like "/a?r=http://b"
        return Ok((None, target));
    }
    if !scheme.eq_ignore_ascii_case(DEFAULT_SCHEME) {
        return Err(HttpLineParseError::UnsupportedScheme);
    }
    Ok((Some(scheme), &target[p + 3..]))
}

fn split_authority(authority: &str) -> Result<(&str, Option<u16>), HttpLineParseError> {
    let (host, port) = match memchr::memchr(b':', authority.as_bytes()) {
        Some(p) => {
            let s = &authority[p + 1..];
            let (port, len) = u16::from_radix_10_checked(s.as_bytes());
            if len == 0 || len > 5 || len != s.len() {
                return Err(HttpLineParseError::InvalidPort);
            }
            let port = port.ok_or(HttpLineParseError::InvalidPort)?;
            (&authority[..p], Some(port))
        }
        None => (authority, None),
    };
    if host.is_empty() {
        return Err(HttpLineParseError::InvalidRequestTarget);
    }
    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_form() {
        let r = HttpRequestLine::parse(b"GET http://example.com/ HTTP/1.1").unwrap();
        assert_eq!(r.method, Method::Get);
        assert_eq!(r.scheme, Some("http"));
        assert_eq!(r.host, Some("example.com"));
        assert_eq!(r.port, None);
        assert_eq!(r.path, "/");
        assert_eq!(r.query, "");
        assert_eq!(r.version, Some("HTTP/1.1"));
    }

    #[test]
    fn absolute_form_with_port_and_query() {
        let r =
            HttpRequestLine::parse(b"POST http://api.example.com:8080/v1/files?ids=xyz HTTP/1.0")
                .unwrap();
        assert_eq!(r.method, Method::Post);
        assert_eq!(r.host, Some("api.example.com"));
        assert_eq!(r.port, Some(8080));
        assert_eq!(r.path, "/v1/files");
        assert_eq!(r.query, "?ids=xyz");
    }

    #[test]
    fn absolute_form_no_path() {
        let r = HttpRequestLine::parse(b"HEAD http://example.com?a=b HTTP/1.0").unwrap();
        assert_eq!(r.host, Some("example.com"));
        assert_eq!(r.path, "");
        assert_eq!(r.query, "?a=b");
    }

    #[test]
    fn origin_form() {
        let r = HttpRequestLine::parse(b"GET /x/y?r=http://other/ HTTP/1.0").unwrap();
        assert_eq!(r.scheme, None);
        assert_eq!(r.host, None);
        assert_eq!(r.path, "/x/y");
        assert_eq!(r.query, "?r=http://other/");
    }

    #[test]
    fn authority_without_scheme() {
        let r = HttpRequestLine::parse(b"GET example.com:80/index.html HTTP/1.0").unwrap();
        assert_eq!(r.scheme, None);
        assert_eq!(r.host, Some("example.com"));
        assert_eq!(r.port, Some(80));
        assert_eq!(r.path, "/index.html");
    }

    #[test]
    fn no_version() {
        let r = HttpRequestLine::parse(b"GET /").unwrap();
        assert_eq!(r.path, "/");
        assert_eq!(r.version, None);
    }

    #[test]
    fn unsupported_method() {
        for line in [
            b"FOO /x HTTP/1.0".as_slice(),
            b"CONNECT a:443 HTTP/1.1",
            b"get / HTTP/1.0",
            b"GARBAGE",
        ] {
            assert_eq!(
                HttpRequestLine::parse(line).err(),
                Some(HttpLineParseError::UnsupportedMethod)
            );
        }
    }

    #[test]
    fn unsupported_scheme() {
        assert_eq!(
            HttpRequestLine::parse(b"GET ftp://example.com/ HTTP/1.0").err(),
            Some(HttpLineParseError::UnsupportedScheme)
        );
        assert_eq!(
            HttpRequestLine::parse(b"GET https://example.com/ HTTP/1.1").err(),
            Some(HttpLineParseError::UnsupportedScheme)
        );
    }

    #[test]
    fn invalid() {
        assert_eq!(
            HttpRequestLine::parse(b"GET").err(),
            Some(HttpLineParseError::NoDelimiterFound(' '))
        );
        assert_eq!(
            HttpRequestLine::parse(b"GET  HTTP/1.0").err(),
            Some(HttpLineParseError::InvalidRequestTarget)
        );
        assert_eq!(
            HttpRequestLine::parse(b"GET / HTTP/x").err(),
            Some(HttpLineParseError::InvalidVersion)
        );
        assert_eq!(
            HttpRequestLine::parse(b"GET / HTTP/1.0 extra").err(),
            Some(HttpLineParseError::InvalidVersion)
        );
        assert_eq!(
            HttpRequestLine::parse(b"GET http://example.com:99999/ HTTP/1.0").err(),
            Some(HttpLineParseError::InvalidPort)
        );
        assert_eq!(
            HttpRequestLine::parse(b"GET http://example.com:/ HTTP/1.0").err(),
            Some(HttpLineParseError::InvalidPort)
        );
        assert_eq!(
            HttpRequestLine::parse(b"GET http:///x HTTP/1.0").err(),
            Some(HttpLineParseError::InvalidRequestTarget)
        );
    }
}
