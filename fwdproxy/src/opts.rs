/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint, value_parser};
use clap_complete::Shell;

const ARGS_COMPLETION: &str = "completion";
const ARGS_VERSION: &str = "version";
const ARGS_VERBOSE: &str = "verbose";
const ARGS_TEST_CONFIG: &str = "test-config";
const ARGS_CONFIG_FILE: &str = "config-file";
const ARGS_LISTEN: &str = "listen";

#[derive(Debug, Default)]
pub struct ProcArgs {
    pub verbose_level: u8,
    pub test_config: bool,
    pub config_file: Option<PathBuf>,
    pub listen: Option<SocketAddr>,
}

impl ProcArgs {
    fn parse_matches(args: &ArgMatches) -> anyhow::Result<Self> {
        let mut proc_args = ProcArgs::default();

        if let Some(verbose_level) = args.get_one::<u8>(ARGS_VERBOSE) {
            proc_args.verbose_level = *verbose_level;
        }
        if args.get_flag(ARGS_TEST_CONFIG) {
            proc_args.test_config = true;
        }
        if let Some(config_file) = args.get_one::<PathBuf>(ARGS_CONFIG_FILE) {
            if !config_file.is_file() {
                return Err(anyhow!(
                    "config file {} is not a regular file",
                    config_file.display()
                ));
            }
            proc_args.config_file = Some(config_file.to_path_buf());
        }
        if let Some(addr) = args.get_one::<SocketAddr>(ARGS_LISTEN) {
            proc_args.listen = Some(*addr);
        }

        Ok(proc_args)
    }
}

fn build_cli_args() -> Command {
    Command::new(crate::build::PKG_NAME)
        .disable_version_flag(true)
        .arg(
            Arg::new(ARGS_COMPLETION)
                .num_args(1)
                .value_name("SHELL")
                .long("completion")
                .value_parser(value_parser!(Shell))
                .exclusive(true),
        )
        .arg(
            Arg::new(ARGS_VERBOSE)
                .help("Show verbose output")
                .num_args(0)
                .action(ArgAction::Count)
                .short('v')
                .long("verbose"),
        )
        .arg(
            Arg::new(ARGS_VERSION)
                .help("Show version")
                .action(ArgAction::SetTrue)
                .short('V')
                .long("version"),
        )
        .arg(
            Arg::new(ARGS_TEST_CONFIG)
                .help("Test the format of config file and exit")
                .action(ArgAction::SetTrue)
                .short('t')
                .long("test-config"),
        )
        .arg(
            Arg::new(ARGS_CONFIG_FILE)
                .help("Config file path")
                .num_args(1)
                .value_name("CONFIG FILE")
                .value_hint(ValueHint::FilePath)
                .value_parser(value_parser!(PathBuf))
                .short('c')
                .long("config-file"),
        )
        .arg(
            Arg::new(ARGS_LISTEN)
                .help("Listen address, overrides the one in config file")
                .num_args(1)
                .value_name("ADDR")
                .value_parser(value_parser!(SocketAddr))
                .short('l')
                .long("listen"),
        )
}

pub fn parse_clap() -> anyhow::Result<Option<ProcArgs>> {
    let args_parser = build_cli_args();
    let args = args_parser.get_matches();

    if let Some(target) = args.get_one::<Shell>(ARGS_COMPLETION) {
        let mut app = build_cli_args();
        let bin_name = app.get_name().to_string();
        clap_complete::generate(*target, &mut app, bin_name, &mut io::stdout());
        return Ok(None);
    }

    if args.get_flag(ARGS_VERSION) {
        let verbose_level = args.get_one::<u8>(ARGS_VERBOSE).copied().unwrap_or(0);
        crate::build::print_version(verbose_level);
        return Ok(None);
    }

    ProcArgs::parse_matches(&args).map(Some)
}
