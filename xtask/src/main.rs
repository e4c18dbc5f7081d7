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

//! Developer tasks for the workspace, run as `cargo x <task>`.

use std::path::Path;
use std::process::Command as StdCommand;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(name = "x", about = "Workspace developer tasks")]
struct Command {
    #[command(subcommand)]
    sub: SubCommand,
}

impl Command {
    fn run(self) -> Result<(), String> {
        match self.sub {
            SubCommand::Build(cmd) => cmd.run(),
            SubCommand::Lint(cmd) => cmd.run(),
            SubCommand::Test(cmd) => cmd.run(),
            SubCommand::Bench(cmd) => cmd.run(),
        }
    }
}

#[derive(Subcommand)]
enum SubCommand {
    /// Compile workspace packages.
    Build(CommandBuild),
    /// Run format and clippy checks.
    Lint(CommandLint),
    /// Run unit and integration tests.
    Test(CommandTest),
    /// Run a quick-scale amqbench smoke run.
    Bench(CommandBench),
}

#[derive(Parser)]
struct CommandBuild {
    /// Assert that `Cargo.lock` will remain unchanged.
    #[arg(long)]
    locked: bool,
}

impl CommandBuild {
    fn run(self) -> Result<(), String> {
        let mut cmd = cargo()?;
        cmd.args(["build", "--workspace", "--all-targets"]);
        if self.locked {
            cmd.arg("--locked");
        }
        run_command(cmd)
    }
}

#[derive(Parser)]
struct CommandTest {
    /// Run tests serially and do not capture output.
    #[arg(long)]
    no_capture: bool,
}

impl CommandTest {
    fn run(self) -> Result<(), String> {
        let mut cmd = cargo()?;
        cmd.args(["test", "--workspace"]);
        if self.no_capture {
            cmd.args(["--", "--nocapture", "--test-threads=1"]);
        }
        run_command(cmd)
    }
}

#[derive(Parser)]
struct CommandLint {
    /// Automatically apply lint suggestions.
    #[arg(long)]
    fix: bool,
}

impl CommandLint {
    fn run(self) -> Result<(), String> {
        let mut clippy = cargo()?;
        clippy.args(["clippy", "--workspace", "--all-targets"]);
        if self.fix {
            clippy.args(["--fix", "--allow-dirty", "--allow-staged"]);
        }
        clippy.args(["--", "-D", "warnings"]);
        run_command(clippy)?;

        let mut fmt = cargo()?;
        fmt.args(["fmt", "--all"]);
        if !self.fix {
            fmt.arg("--check");
        }
        run_command(fmt)
    }
}

#[derive(Parser)]
struct CommandBench {
    /// Experiment mode passed to amqbench.
    #[arg(long, default_value = "sanity")]
    mode: String,
}

impl CommandBench {
    fn run(self) -> Result<(), String> {
        let mut cmd = cargo()?;
        cmd.args(["run", "--release", "--package", "amqbench", "--"]);
        cmd.args(["--scale", "quick", "--trials", "1", "--mode", self.mode.as_str()]);
        run_command(cmd)
    }
}

fn cargo() -> Result<StdCommand, String> {
    find_command("cargo")
}

fn find_command(name: &str) -> Result<StdCommand, String> {
    let exe = which::which(name).map_err(|err| format!("{name} not found: {err}"))?;
    let mut cmd = StdCommand::new(exe);
    cmd.current_dir(workspace_dir());
    Ok(cmd)
}

fn workspace_dir() -> &'static Path {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir.parent().unwrap_or(manifest_dir)
}

fn run_command(mut cmd: StdCommand) -> Result<(), String> {
    println!("{cmd:?}");
    let status = cmd
        .status()
        .map_err(|err| format!("failed to execute {cmd:?}: {err}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("command failed: {status}"))
    }
}

fn main() -> ExitCode {
    match Command::parse().run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
