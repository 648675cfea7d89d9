// cli-tools - command-line clients for self-hosted homelab services
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Process entry shared by every binary.

use crate::output;
use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::{generate, shells};
use std::io;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Log filter variable, e.g. `CLI_TOOLS_LOG=debug`.
pub const LOG_ENV: &str = "CLI_TOOLS_LOG";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Parses `C`, runs `handler` and turns its outcome into the exit status.
///
/// Usage errors exit 1 rather than clap's default 2, which is reserved for
/// authentication failures.
pub fn run_main<C: Parser>(handler: impl FnOnce(C) -> anyhow::Result<()>) -> ExitCode {
    init_tracing();
    let cli = match C::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match handler(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => ExitCode::from(output::report(&err)),
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}

pub fn print_completions<C: CommandFactory>(shell: CompletionShell) {
    let mut cmd = C::command();
    let bin = cmd.get_name().to_string();
    let out = &mut io::stdout();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, bin, out),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin, out),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin, out),
        CompletionShell::PowerShell => generate(shells::PowerShell, &mut cmd, bin, out),
    }
}
