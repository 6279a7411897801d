/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;

use http::StatusCode;
use thiserror::Error;

use fwd_http::{HeadParseError, HeadPolicyError};

#[derive(Error, Debug)]
pub enum ServerTaskError {
    #[error("internal server error: {0}")]
    InternalServerError(&'static str),
    #[error("invalid client request: {0}")]
    ClientParseFailed(HeadParseError),
    #[error("client request rejected: {0}")]
    ClientPolicyViolation(#[from] HeadPolicyError),
    #[error("invalid upstream response: {0}")]
    UpstreamProtocolError(HeadParseError),
    #[error("invalid upstream protocol: {0}")]
    InvalidUpstreamProtocol(&'static str),
    #[error("upstream not resolved: {0}")]
    UpstreamNotResolved(String),
    #[error("upstream not connected: {0:?}")]
    UpstreamNotConnected(io::Error),
    #[error("tcp read from client: {0:?}")]
    ClientTcpReadFailed(io::Error),
    #[error("tcp write to client: {0:?}")]
    ClientTcpWriteFailed(io::Error),
    #[error("read from upstream: {0:?}")]
    UpstreamReadFailed(io::Error),
    #[error("write to upstream: {0:?}")]
    UpstreamWriteFailed(io::Error),
    #[error("closed by upstream")]
    ClosedByUpstream,
    #[error("closed by client")]
    ClosedByClient,
    #[error("canceled as server quit")]
    CanceledAsServerQuit,
    #[error("finished")]
    Finished, // this isn't an error, for log only
}

impl ServerTaskError {
    pub fn brief(&self) -> &'static str {
        match self {
            ServerTaskError::InternalServerError(_) => "InternalServerError",
            ServerTaskError::ClientParseFailed(_) => "ClientParseFailed",
            ServerTaskError::ClientPolicyViolation(_) => "ClientPolicyViolation",
            ServerTaskError::UpstreamProtocolError(_) => "UpstreamProtocolError",
            ServerTaskError::InvalidUpstreamProtocol(_) => "InvalidUpstreamProtocol",
            ServerTaskError::UpstreamNotResolved(_) => "UpstreamNotResolved",
            ServerTaskError::UpstreamNotConnected(_) => "UpstreamNotConnected",
            ServerTaskError::ClientTcpReadFailed(_) => "ClientTcpReadFailed",
            ServerTaskError::ClientTcpWriteFailed(_) => "ClientTcpWriteFailed",
            ServerTaskError::UpstreamReadFailed(_) => "UpstreamReadFailed",
            ServerTaskError::UpstreamWriteFailed(_) => "UpstreamWriteFailed",
            ServerTaskError::ClosedByUpstream => "ClosedByUpstream",
            ServerTaskError::ClosedByClient => "ClosedByClient",
            ServerTaskError::CanceledAsServerQuit => "CanceledAsServerQuit",
            ServerTaskError::Finished => "Finished",
        }
    }

    /// The response the client should get for this error.
    ///
    /// Socket level errors have no response, the pair is just closed.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            ServerTaskError::InternalServerError(_) => Some(StatusCode::INTERNAL_SERVER_ERROR),
            ServerTaskError::ClientParseFailed(e) => Some(e.status_code()),
            ServerTaskError::ClientPolicyViolation(e) => Some(e.status_code()),
            ServerTaskError::UpstreamProtocolError(_)
            | ServerTaskError::InvalidUpstreamProtocol(_) => Some(StatusCode::BAD_GATEWAY),
            _ => None,
        }
    }
}

pub type ServerTaskResult<T> = Result<T, ServerTaskError>;
