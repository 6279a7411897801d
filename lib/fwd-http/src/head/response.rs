/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use http::StatusCode;

use super::{HeadLine, HttpHead};
use crate::{DEFAULT_VERSION, HttpLineParseError, HttpStatusLine};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusLine {
    code: String,
    reason: String,
}

impl StatusLine {
    pub(super) fn parse(buf: &[u8]) -> Result<(Self, String), HttpLineParseError> {
        let line = HttpStatusLine::parse(buf)?;
        let status = StatusLine {
            code: line.code.to_string(),
            reason: line.reason.to_string(),
        };
        Ok((status, line.version.to_string()))
    }

    #[inline]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[inline]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// The canned responses the proxy can generate by itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorResponse {
    BadRequest,
    InternalServerError,
    NotImplemented,
    BadGateway,
}

impl ErrorResponse {
    /// Map a status code onto the table, codes outside of it become 500.
    pub fn from_status(code: StatusCode) -> Self {
        match code {
            StatusCode::BAD_REQUEST => ErrorResponse::BadRequest,
            StatusCode::NOT_IMPLEMENTED => ErrorResponse::NotImplemented,
            StatusCode::BAD_GATEWAY => ErrorResponse::BadGateway,
            _ => ErrorResponse::InternalServerError,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorResponse::BadRequest => StatusCode::BAD_REQUEST,
            ErrorResponse::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            ErrorResponse::BadGateway => StatusCode::BAD_GATEWAY,
        }
    }

    pub const fn reason(&self) -> &'static str {
        match self {
            ErrorResponse::BadRequest => "Bad Request",
            ErrorResponse::InternalServerError => "Internal Server Error",
            ErrorResponse::NotImplemented => "Not Implemented",
            ErrorResponse::BadGateway => "Bad Gateway",
        }
    }

    pub fn to_head(self) -> HttpHead {
        let line = StatusLine {
            code: self.status_code().as_str().to_string(),
            reason: self.reason().to_string(),
        };
        let mut head = HttpHead::new(DEFAULT_VERSION.to_string(), HeadLine::Response(line));
        head.headers.set("Connection", "close");
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table() {
        for (code, reason) in [
            (400, "Bad Request"),
            (500, "Internal Server Error"),
            (501, "Not Implemented"),
            (502, "Bad Gateway"),
        ] {
            let code = StatusCode::from_u16(code).unwrap();
            let r = ErrorResponse::from_status(code);
            assert_eq!(r.status_code(), code);
            assert_eq!(r.reason(), reason);
        }
        assert_eq!(
            ErrorResponse::from_status(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE),
            ErrorResponse::InternalServerError
        );
    }

    #[test]
    fn serialize() {
        let head = ErrorResponse::NotImplemented.to_head();
        assert_eq!(
            head.serialize(),
            b"HTTP/1.0 501 Not Implemented\r\nConnection:close\r\n\r\n"
        );

        let mut normalized = head.clone();
        normalized.normalize().unwrap();
        assert_eq!(normalized, head);
    }
}
