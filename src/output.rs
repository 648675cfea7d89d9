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

use crate::error::{CliError, Result};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Debug, Serialize)]
struct ErrorDocument<'a> {
    error: ErrorBody<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
}

pub fn write_yaml<W: Write, T: Serialize + ?Sized>(writer: &mut W, value: &T) -> Result<()> {
    let rendered = serde_yaml::to_string(value)
        .map_err(|err| CliError::api(format!("failed to serialize: {err}")))?;
    writer
        .write_all(rendered.as_bytes())
        .map_err(|err| CliError::api(format!("failed to write output: {err}")))
}

pub fn print_yaml<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    write_yaml(&mut io::stdout().lock(), value)
}

pub fn write_error<W: Write>(writer: &mut W, err: &CliError) -> io::Result<()> {
    let document = ErrorDocument {
        error: ErrorBody {
            code: err.code(),
            message: err.to_string(),
        },
    };
    match serde_yaml::to_string(&document) {
        Ok(rendered) => writer.write_all(rendered.as_bytes()),
        Err(_) => writeln!(writer, "error: {err}"),
    }
}

/// Renders any top-level failure on stderr and returns the exit code.
pub fn report(err: &anyhow::Error) -> u8 {
    let mut stderr = io::stderr().lock();
    match err.downcast_ref::<CliError>() {
        Some(classified) => {
            let _ = write_error(&mut stderr, classified);
            classified.exit_code()
        }
        None => {
            let _ = writeln!(stderr, "error: {err:#}");
            1
        }
    }
}
