/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

mod parse;
pub use parse::{
    HeadParseError, HeadTerminator, HttpHeaderLine, HttpLineParseError, HttpRequestLine,
    HttpStatusLine, find_head_end,
};

mod header_map;
pub use header_map::HeaderMap;

mod head;
pub use head::{
    ErrorResponse, HeadLine, HeadPolicyError, HttpHead, Method, RequestLine, StatusLine,
};

pub const DEFAULT_VERSION: &str = "HTTP/1.0";
pub const DEFAULT_SCHEME: &str = "http";
pub const DEFAULT_PORT: u16 = 80;
