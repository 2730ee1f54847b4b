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

//! Line-oriented file and terminal I/O: the `l`/`n`/`p` print formatting,
//! reading/writing files and shell pipelines into and out of the scratch
//! buffer, and tty-line reading for the main loop and `a`/`i`/`c` text
//! input. Matches `io.c`.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicI32, Ordering};

use crate::buffer::EdBuffer;
use crate::error::EdError;
use crate::signal::window_columns;

static LINENUM: AtomicI32 = AtomicI32::new(0);

pub fn linenum() -> i32 {
    LINENUM.load(Ordering::Relaxed)
}

/// Print-suffix flags accepted by commands like `p`/`l`/`n`.
pub mod pf {
    pub const NONE: u8 = 0;
    pub const L: u8 = 1 << 0;
    pub const N: u8 = 1 << 1;
    pub const P: u8 = 1 << 2;
}

/// put_tty_line - matches io.c:51: write one line to stdout, honoring the
/// `l` (unambiguous, escaped, column-wrapped) and `n` (numbered) suffixes.
fn put_tty_line(out: &mut impl Write, text: &[u8], addr: usize, pflags: u8) -> io::Result<()> {
    if pflags & pf::N != 0 {
        write!(out, "{}\t", addr)?;
    }
    if pflags & pf::L == 0 {
        out.write_all(text)?;
        out.write_all(b"\n")?;
        return Ok(());
    }
    let mut col = 0usize;
    let width = window_columns().max(1) as usize;
    for &b in text {
        let needs_wrap = |out: &mut dyn Write, col: &mut usize| -> io::Result<()> {
            *col += 1;
            if *col >= width.saturating_sub(1) {
                out.write_all(b"\\\n")?;
                *col = 0;
            }
            Ok(())
        };
        match b {
            b'\\' => {
                out.write_all(b"\\\\")?;
                needs_wrap(out, &mut col)?;
            }
            0x07 => {
                out.write_all(b"\\a")?;
                needs_wrap(out, &mut col)?;
            }
            0x08 => {
                out.write_all(b"\\b")?;
                needs_wrap(out, &mut col)?;
            }
            0x0c => {
                out.write_all(b"\\f")?;
                needs_wrap(out, &mut col)?;
            }
            b'\r' => {
                out.write_all(b"\\r")?;
                needs_wrap(out, &mut col)?;
            }
            b'\t' => {
                out.write_all(b"\\t")?;
                needs_wrap(out, &mut col)?;
            }
            0x0b => {
                out.write_all(b"\\v")?;
                needs_wrap(out, &mut col)?;
            }
            b if b < 0x20 || b >= 0x7f => {
                write!(out, "\\{:03o}", b)?;
                needs_wrap(out, &mut col)?;
            }
            b => {
                out.write_all(&[b])?;
                needs_wrap(out, &mut col)?;
            }
        }
    }
    out.write_all(b"$\n")?;
    Ok(())
}

/// print_lines/display_lines - matches io.c:87: print every line in
/// `[from, to]`, updating `current_addr` to the last one printed.
pub fn print_lines(buffer: &mut EdBuffer, from: usize, to: usize, pflags: u8) -> Result<(), EdError> {
    if from == 0 || from > to || to > buffer.last_addr() {
        return Err(EdError::InvalidAddress);
    }
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    for addr in from..=to {
        let text = buffer.get_sbuf_line(addr)?.to_vec();
        put_tty_line(&mut lock, &text, addr, pflags).map_err(|e| EdError::IoError(e.to_string()))?;
    }
    buffer.set_current_addr(to);
    Ok(())
}

/// trailing_escape - matches io.c:106: true if `s` ends in an odd number
/// of backslashes, meaning the final one escapes the line break.
fn trailing_escape(s: &[u8]) -> bool {
    s.iter().rev().take_while(|&&b| b == b'\\').count() % 2 == 1
}

/// get_extended_line - matches io.c:119: join a command-list line with any
/// continuation lines whose trailing backslash escapes the newline,
/// stripping the escaping backslash itself from the joined text.
pub fn get_extended_line(first: &str, mut next_line: impl FnMut() -> Result<Option<String>, EdError>) -> Result<String, EdError> {
    let mut out = first.to_string();
    while trailing_escape(out.as_bytes()) {
        out.pop();
        match next_line()? {
            Some(more) => out.push_str(&more),
            None => break,
        }
    }
    Ok(out)
}

/// get_tty_line/get_stdin_line - matches io.c:158: read one line from
/// stdin, stripping the trailing newline, counting it for `linenum()`.
pub fn get_stdin_line() -> Result<Option<String>, EdError> {
    let mut input = String::new();
    let n = io::stdin().read_line(&mut input).map_err(|e| EdError::IoError(e.to_string()))?;
    if n == 0 {
        return Ok(None);
    }
    LINENUM.fetch_add(1, Ordering::Relaxed);
    if input.ends_with('\n') {
        input.pop();
    }
    Ok(Some(input))
}

/// read_stream - matches io.c:240: split a byte stream on `\n` into
/// scratch-buffer lines, appended in order after `addr`. Detects binary
/// content (an embedded NUL) and a missing final newline, same as the
/// original's heuristics.
fn read_stream(data: &[u8], addr: usize, buffer: &mut EdBuffer) -> Result<i64, EdError> {
    if data.contains(&0) {
        buffer.set_binary();
    }
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < data.len() {
        if data[i] == b'\n' {
            lines.push(data[start..i].to_vec());
            start = i + 1;
        }
        i += 1;
    }
    if start < data.len() {
        lines.push(data[start..].to_vec());
        buffer.set_newline_added();
    }
    let size = data.len() as i64;
    if !lines.is_empty() {
        buffer.append_lines(&lines, addr)?;
    }
    Ok(size)
}

/// read_file - matches io.c:288: load a file (or, if `filename` starts
/// with `!`, a shell command's stdout) into the buffer after `addr`.
/// Returns the number of lines read.
pub fn read_file(filename: &str, addr: usize, buffer: &mut EdBuffer, scripted: bool) -> Result<usize, EdError> {
    let data = if let Some(cmd) = filename.strip_prefix('!') {
        let output = Command::new("/bin/sh")
            .arg("-c")
            .arg(cmd)
            .output()
            .map_err(|e| EdError::IoError(e.to_string()))?;
        output.stdout
    } else {
        let mut f = File::open(filename).map_err(|e| classify_open_error(filename, e))?;
        if f.metadata().map(|m| m.is_dir()).unwrap_or(false) {
            return Err(EdError::IsADirectory);
        }
        let mut buf = Vec::new();
        f.read_to_end(&mut buf).map_err(|e| EdError::IoError(e.to_string()))?;
        buf
    };
    let before = buffer.current_addr();
    let size = read_stream(&data, addr, buffer)?;
    if !scripted {
        println!("{}", size);
    }
    Ok(buffer.current_addr() - before)
}

fn classify_open_error(filename: &str, e: std::io::Error) -> EdError {
    match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
            EdError::IoError(format!("{}: {}", filename, e))
        }
        _ => EdError::IoError(format!("{}: {}", filename, e)),
    }
}

/// write_stream - matches io.c:315: write `[from, to]` out, appending a
/// newline to every line except possibly the last, mirroring the
/// original's "don't invent a trailing newline the source never had" rule.
fn write_stream(out: &mut impl Write, from: usize, to: usize, buffer: &mut EdBuffer) -> Result<i64, EdError> {
    let mut size = 0i64;
    for addr in from..=to {
        let text = buffer.get_sbuf_line(addr)?.to_vec();
        out.write_all(&text).map_err(|e| EdError::IoError(e.to_string()))?;
        size += text.len() as i64;
        let omit_newline = addr == buffer.last_addr() && buffer.isbinary() && buffer.newline_added();
        if !omit_newline {
            out.write_all(b"\n").map_err(|e| EdError::IoError(e.to_string()))?;
            size += 1;
        }
    }
    out.flush().map_err(|e| EdError::IoError(e.to_string()))?;
    Ok(size)
}

/// write_file - matches io.c:346: write `[from, to]` to a file (truncating
/// unless `append`), or pipe it to a shell command if `filename` starts
/// with `!`. Returns the byte count written.
pub fn write_file(
    filename: &str,
    append: bool,
    from: usize,
    to: usize,
    buffer: &mut EdBuffer,
    scripted: bool,
) -> Result<i64, EdError> {
    if let Some(cmd) = filename.strip_prefix('!') {
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| EdError::IoError(e.to_string()))?;
        let size = {
            let stdin = child.stdin.as_mut().ok_or_else(|| EdError::IoError("broken pipe".into()))?;
            write_stream(stdin, from, to, buffer)?
        };
        let status = child.wait().map_err(|e| EdError::IoError(e.to_string()))?;
        if !status.success() {
            return Err(EdError::IoError(format!("{cmd}: exited with an error")));
        }
        if !scripted {
            println!("{}", size);
        }
        return Ok(size);
    }
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(!append)
        .append(append)
        .open(filename)
        .map_err(|e| classify_open_error(filename, e))?;
    let mut w = std::io::BufWriter::new(file);
    let size = write_stream(&mut w, from, to, buffer)?;
    if !scripted {
        println!("{}", size);
    }
    Ok(size)
}
