/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

pub(crate) const VERSION: &str = env!("CARGO_PKG_VERSION");
pub(crate) const PKG_NAME: &str = env!("CARGO_PKG_NAME");

const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

const BUILD_DEBUG: bool = cfg!(debug_assertions);

pub(crate) fn print_version(verbose_level: u8) {
    println!("{PKG_NAME} {VERSION}");
    if verbose_level > 0 {
        println!("{PKG_DESCRIPTION}");
    }
    if verbose_level > 1 {
        println!(
            "Target: {}-{}, Debug: {BUILD_DEBUG}",
            std::env::consts::ARCH,
            std::env::consts::OS
        );
    }
}
