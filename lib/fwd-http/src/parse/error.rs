/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::str::Utf8Error;

use http::StatusCode;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HttpLineParseError {
    #[error("empty head")]
    EmptyHead,
    #[error("invalid utf-8 encoding: {0}")]
    InvalidUtf8Encoding(#[from] Utf8Error),
    #[error("no delimiter '{0}' found")]
    NoDelimiterFound(char),
    #[error("unsupported method")]
    UnsupportedMethod,
    #[error("unsupported scheme")]
    UnsupportedScheme,
    #[error("invalid request target")]
    InvalidRequestTarget,
    #[error("invalid port")]
    InvalidPort,
    #[error("invalid header name")]
    InvalidHeaderName,
    #[error("invalid version")]
    InvalidVersion,
    #[error("invalid status code")]
    InvalidStatusCode,
    #[error("invalid reason phrase")]
    InvalidReasonPhrase,
}

/// A head parse failure, located at the start of the offending line.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind} (at offset {offset})")]
pub struct HeadParseError {
    pub offset: usize,
    pub kind: HttpLineParseError,
}

impl HeadParseError {
    pub(crate) fn new(offset: usize, kind: HttpLineParseError) -> Self {
        HeadParseError { offset, kind }
    }

    /// The status to answer a client with if this was found in its request head.
    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            HttpLineParseError::UnsupportedMethod | HttpLineParseError::UnsupportedScheme => {
                StatusCode::NOT_IMPLEMENTED
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
