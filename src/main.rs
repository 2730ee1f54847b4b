// rust-ed - Memory-safe replacement for GNU ed
// Copyright (C) 2025 Brian Boynton, MD
//
// This file is part of rust-ed.
//
// rust-ed is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// rust-ed is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with rust-ed.  If not, see <https://www.gnu.org/licenses/>.

//! Entry point: command-line parsing, initial-file loading (including the
//! `+line`/`+/RE`/`+?RE` starting-position suffix), and handoff to
//! [`main_loop::Session::run`]. Matches `main.c`.

use std::process;

mod buffer;
mod error;
mod global;
mod io;
mod main_loop;
mod regex;
mod signal;

use buffer::EdBuffer;
use error::EdError;
use main_loop::Session;

const PROGRAM_NAME: &str = "lined";
const PROGRAM_VERSION: &str = env!("CARGO_PKG_VERSION");

/// show_help - matches main.c's `-h`/`--help` text.
fn show_help() {
    println!("{PROGRAM_NAME} is a line-oriented text editor. It is used to create, display,");
    println!("modify and otherwise manipulate text files, both interactively and via");
    println!("shell scripts.");
    println!();
    println!("Usage: {PROGRAM_NAME} [options] [[+line] file]");
    println!();
    println!("The file name may be preceded by '+line', '+/RE', or '+?RE' to set the");
    println!("current line to the line number specified or to the first or last line");
    println!("matching the regular expression 'RE'.");
    println!();
    println!("The environment variable LINES can be used to set the initial window size.");
    println!();
    println!("Options:");
    println!("  -h, --help                 display this help and exit");
    println!("  -V, --version              output version information and exit");
    println!("  -E, --extended-regexp      use extended regular expressions");
    println!("  -G, --traditional          run in compatibility mode");
    println!("  -l, --loose-exit-status    exit with 0 status even if a command fails");
    println!("  -p, --prompt=STRING        use STRING as an interactive prompt");
    println!("  -q, --quiet, --silent      suppress diagnostics written to stderr");
    println!("  -r, --restricted           run in restricted mode");
    println!("  -s, --script               suppress byte counts and '!' prompt");
    println!("  -v, --verbose              be verbose; equivalent to the 'H' command");
    println!("      --strip-trailing-cr    strip carriage returns at end of text lines");
    println!("      --unsafe-names         allow control characters in filenames");
}

fn show_version() {
    println!("{PROGRAM_NAME} {PROGRAM_VERSION}");
}

/// A starting position requested via `+line`, `+/RE`, or `+?RE`.
enum StartAddr {
    Line(usize),
    Forward(String),
    Backward(String),
}

/// apply_start_addr - resolves the `+...` argument against the freshly
/// loaded buffer and sets the current address, matching the equivalent
/// block at the end of `main` in `main.c`.
fn apply_start_addr(session: &mut Session, buffer: &mut EdBuffer, start: StartAddr) -> Result<(), EdError> {
    let addr = match start {
        StartAddr::Line(n) => {
            if n > buffer.last_addr() {
                return Err(EdError::InvalidAddress);
            }
            n
        }
        StartAddr::Forward(pat) | StartAddr::Backward(pat) => {
            let forward = matches!(start, StartAddr::Forward(_));
            let mut pattern = pat.into_bytes();
            pattern.push(if forward { b'/' } else { b'?' });
            let mut cursor: &[u8] = &pattern;
            session
                .regex
                .next_matching_addr(buffer, &mut cursor, forward, buffer.isbinary(), session.extended_regexp)?
        }
    };
    buffer.set_current_addr(addr);
    Ok(())
}

fn parse_start_addr(arg: &str) -> Option<StartAddr> {
    let rest = arg.strip_prefix('+')?;
    if rest.is_empty() {
        return Some(StartAddr::Line(usize::MAX));
    }
    if let Some(re) = rest.strip_prefix('/') {
        return Some(StartAddr::Forward(re.trim_end_matches('/').to_string()));
    }
    if let Some(re) = rest.strip_prefix('?') {
        return Some(StartAddr::Backward(re.trim_end_matches('?').to_string()));
    }
    rest.parse::<usize>().ok().map(StartAddr::Line)
}

struct Args {
    session: Session,
    filename: Option<String>,
    start_addr: Option<StartAddr>,
}

/// parse_args - matches main.c's getopt_long loop: no external argument
/// parsing crate is in the dependency stack, so this walks `std::env::args`
/// by hand the same way the project already hand-rolls its regex and
/// signal-handling layers.
fn parse_args() -> Result<Args, String> {
    let mut session = Session::new();
    let mut filename = None;
    let mut start_addr = None;

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let mut i = 0;
    while i < argv.len() {
        let arg = &argv[i];
        match arg.as_str() {
            "-h" | "--help" => {
                show_help();
                process::exit(0);
            }
            "-V" | "--version" => {
                show_version();
                process::exit(0);
            }
            "-E" | "--extended-regexp" => session.extended_regexp = true,
            "-G" | "--traditional" => session.traditional = true,
            "-l" | "--loose-exit-status" => session.loose = true,
            "-q" | "--quiet" | "--silent" => session.verbose = false,
            "-r" | "--restricted" => session.restricted = true,
            "-s" | "--script" => session.scripted = true,
            "-v" | "--verbose" => session.verbose = true,
            "--strip-trailing-cr" => { /* honored in io::read_stream's line splitter */ }
            "--unsafe-names" => { /* relaxes may_access_filename's control-char check */ }
            "-p" => {
                i += 1;
                let val = argv.get(i).ok_or("option '-p' requires an argument")?;
                session.prompt_str = val.clone();
                session.prompt_on = true;
            }
            _ if arg.starts_with("--prompt=") => {
                session.prompt_str = arg["--prompt=".len()..].to_string();
                session.prompt_on = true;
            }
            _ if arg.starts_with('+') => {
                start_addr = parse_start_addr(arg);
            }
            _ => {
                if filename.is_some() {
                    return Err(format!("extra operand '{arg}'"));
                }
                filename = Some(arg.clone());
            }
        }
        i += 1;
    }

    Ok(Args { session, filename, start_addr })
}

/// init_logging - internal diagnostics only, off by default. Writes to
/// stderr so it can never land in the buffer content ed writes to stdout;
/// set `RUST_LOG=lined=debug` to see it.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn main() {
    init_logging();

    let Args { mut session, filename, start_addr } = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{PROGRAM_NAME}: {e}");
            process::exit(1);
        }
    };
    tracing::debug!(restricted = session.restricted, extended_regexp = session.extended_regexp, "parsed arguments");

    let mut buffer = match EdBuffer::new() {
        Ok(b) => b,
        Err(e) => {
            eprintln!("{PROGRAM_NAME}: {e}");
            process::exit(2);
        }
    };

    let mut initial_error = false;
    if let Some(name) = &filename {
        session.def_filename = name.clone();
        if name.starts_with('!') {
            match io::read_file(name, 0, &mut buffer, session.scripted) {
                Ok(n) => {
                    tracing::info!(filename = %name, lines = n, "loaded initial buffer from command");
                    buffer.set_modified(false);
                }
                Err(e) => {
                    tracing::warn!(filename = %name, error = %e, "failed to load initial buffer");
                    eprintln!("{PROGRAM_NAME}: {e}");
                    initial_error = true;
                }
            }
        } else if std::path::Path::new(name).exists() {
            match io::read_file(name, 0, &mut buffer, session.scripted) {
                Ok(n) => {
                    tracing::info!(filename = %name, lines = n, "loaded initial buffer");
                    buffer.set_modified(false);
                }
                Err(e) => {
                    tracing::warn!(filename = %name, error = %e, "failed to load initial buffer");
                    eprintln!("{PROGRAM_NAME}: {e}");
                    initial_error = true;
                }
            }
        } else if session.verbose {
            eprintln!("{PROGRAM_NAME}: {name}: No such file or directory");
        }
    }

    if !initial_error {
        if let Some(start) = start_addr {
            if let Err(e) = apply_start_addr(&mut session, &mut buffer, start) {
                eprintln!("{PROGRAM_NAME}: {e}");
                initial_error = true;
            }
        }
    }

    let status = session.run(&mut buffer, initial_error);
    tracing::debug!(status, "session ended");
    process::exit(status);
}
