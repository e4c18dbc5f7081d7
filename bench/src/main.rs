// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! `amqbench`: runs filter experiments and writes their records as CSV to stdout.
//!
//! Logs go to stderr. `RUST_LOG` overrides the `-v`/`-q` flags.

use std::io;

use amqfilters::experiment::ExperimentConfig;
use amqfilters::experiment::run_dynamic;
use amqfilters::experiment::run_full;
use amqfilters::experiment::run_sanity;
use amqfilters::experiment::run_simple;
use amqfilters::experiment::run_space;
use amqfilters::experiment::run_threaded_scaling;
use anyhow::Context;
use clap::ArgAction;
use clap::Parser;
use clap::ValueEnum;
use csv::Writer;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Correctness check of every filter at a small size
    Sanity,
    /// Lookup throughput and tail latency
    #[value(alias = "simple_sweep")]
    Simple,
    /// Insert/delete throughput across load factors
    Dynamic,
    /// Throughput as the worker count grows
    Threaded,
    /// False-positive rate and bits per entry
    Space,
    /// Simple, dynamic, threaded and space in sequence
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scale {
    /// Original experiment sizes
    Paper,
    /// Reduced sizes for smoke runs
    Quick,
}

#[derive(Debug, Parser)]
#[command(
    name = "amqbench",
    version,
    about = "Benchmark approximate membership filters"
)]
struct Args {
    /// Experiment to run
    #[arg(long, value_enum, default_value_t = Mode::Sanity)]
    mode: Mode,

    /// Trials per configuration
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    trials: u64,

    /// Size preset
    #[arg(long, value_enum, default_value_t = Scale::Paper)]
    scale: Scale,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn env_filter(&self) -> EnvFilter {
        if std::env::var(EnvFilter::DEFAULT_ENV).is_ok_and(|v| !v.is_empty()) {
            return EnvFilter::from_default_env();
        }
        let level = match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        EnvFilter::new(level)
    }

    fn config(&self) -> ExperimentConfig {
        let config = match self.scale {
            Scale::Paper => ExperimentConfig::paper(),
            Scale::Quick => ExperimentConfig::quick(),
        };
        config.with_trials(self.trials as usize)
    }
}

fn write_csv<R: Serialize>(records: &[R]) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut writer = Writer::from_writer(stdout.lock());
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(args.env_filter())
        .with_writer(io::stderr)
        .init();

    let config = args.config();
    config
        .validate()
        .context("invalid experiment configuration")?;
    info!(mode = ?args.mode, scale = ?args.scale, trials = config.trials, "starting");

    match args.mode {
        Mode::Sanity => write_csv(&run_sanity(&config)?)?,
        Mode::Simple => write_csv(&run_simple(&config)?)?,
        Mode::Dynamic => write_csv(&run_dynamic(&config)?)?,
        Mode::Threaded => write_csv(&run_threaded_scaling(&config)?)?,
        Mode::Space => write_csv(&run_space(&config)?)?,
        Mode::Full => {
            let report = run_full(&config)?;
            write_csv(&report.simple)?;
            write_csv(&report.dynamic)?;
            write_csv(&report.threaded)?;
            write_csv(&report.space)?;
        }
    }

    info!("done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let args = Args::try_parse_from(["amqbench"]).unwrap();
        assert_eq!(args.mode, Mode::Sanity);
        assert_eq!(args.trials, 5);
        assert_eq!(args.config(), ExperimentConfig::paper());
    }

    #[test]
    fn test_parse_flags() {
        let argv = "amqbench --mode simple_sweep --trials 2 --scale quick";
        let args = Args::try_parse_from(argv.split_whitespace()).unwrap();
        assert_eq!(args.mode, Mode::Simple);
        assert_eq!(args.config(), ExperimentConfig::quick().with_trials(2));
    }

    #[test]
    fn test_reject_zero_trials() {
        assert!(Args::try_parse_from(["amqbench", "--trials", "0"]).is_err());
        assert!(Args::try_parse_from(["amqbench", "-v", "-q"]).is_err());
    }
}
