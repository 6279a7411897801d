/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use http::StatusCode;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HeadPolicyError {
    #[error("unsupported port {0}")]
    UnsupportedPort(u16),
    #[error("missed host")]
    MissedHost,
    #[error("too large head, should be less than {0}")]
    PayloadTooLarge(usize),
}

impl HeadPolicyError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}
