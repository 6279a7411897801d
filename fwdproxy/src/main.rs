/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use anyhow::Context;
use log::{debug, error, info};

use fwdproxy::serve::Reactor;

fn main() -> anyhow::Result<()> {
    let Some(proc_args) =
        fwdproxy::opts::parse_clap().context("failed to parse command line options")?
    else {
        return Ok(());
    };

    // set up process logger early, only proc args is used inside
    let log_guard = fwdproxy::log::setup(&proc_args).context("failed to setup logger")?;

    let config = fwdproxy::config::load(&proc_args)
        .context(format!("failed to load config, opts: {:?}", &proc_args))?;
    debug!("loaded config: {config:?}");

    if proc_args.test_config {
        info!("the format of the config file is ok");
        return Ok(());
    }

    let ret = Reactor::new(&config)
        .context(format!("failed to listen on {}", config.listen))
        .and_then(|mut reactor| reactor.run().context("reactor stopped with error"));
    if let Err(e) = &ret {
        error!("{e:?}");
    }
    info!("{}", log_guard.summary());
    ret
}
