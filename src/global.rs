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

//! Driver for the `g`/`v`/`G`/`V` global commands. Marking matched lines
//! is `EdBuffer::set_active_by_addr`/`RegexEngine::build_active_list`; this
//! module only drives the per-line command execution loop described by
//! `exec_global` in `main_loop.c`. Command dispatch itself is supplied by
//! the caller (`main_loop.rs`) as a closure, so this module has no
//! knowledge of individual ed commands.

use crate::buffer::EdBuffer;
use crate::error::EdError;

/// Split one command off the front of a global command-list, honouring a
/// trailing backslash as an escaped (literal) newline the way
/// `get_extended_line` does. Returns `(command, rest)`.
fn split_one_command(text: &str) -> (String, &str) {
    let bytes = text.as_bytes();
    let mut out = String::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
            out.push('\n');
            i += 2;
            continue;
        }
        if bytes[i] == b'\n' {
            i += 1;
            break;
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    (out, &text[i..])
}

/// exec_global - matches main_loop.c:754, non-interactive branch (`g`/`v`):
/// runs `cmd_list` against every active line in turn. `exec_one(buffer,
/// command_text)` must behave like `exec_command(ibufpp, true)`.
pub fn exec_global(
    buffer: &mut EdBuffer,
    cmd_list: &str,
    mut exec_one: impl FnMut(&mut EdBuffer, &str) -> Result<(), EdError>,
) -> Result<(), EdError> {
    buffer.clear_undo_stack();
    loop {
        let addr = match buffer.next_active_addr() {
            Some(a) => a,
            None => break,
        };
        buffer.set_current_addr(addr);
        let mut rest: &str = cmd_list;
        while !rest.is_empty() {
            let (line, next) = split_one_command(rest);
            exec_one(buffer, &line)?;
            rest = next;
        }
    }
    Ok(())
}

/// exec_global - matches main_loop.c:754, interactive branch (`G`/`V`): for
/// each active line, print it, then read and run one command typed by the
/// user. A blank line is skipped; `&` repeats the previous command.
pub fn exec_global_interactive(
    buffer: &mut EdBuffer,
    mut print_one: impl FnMut(&mut EdBuffer, usize) -> Result<(), EdError>,
    mut read_one: impl FnMut() -> Result<Option<String>, EdError>,
    mut exec_one: impl FnMut(&mut EdBuffer, &str) -> Result<(), EdError>,
) -> Result<(), EdError> {
    buffer.clear_undo_stack();
    let mut last_cmd: Option<String> = None;
    loop {
        let addr = match buffer.next_active_addr() {
            Some(a) => a,
            None => break,
        };
        buffer.set_current_addr(addr);
        print_one(buffer, addr)?;
        let line = match read_one()? {
            Some(l) => l,
            None => return Err(EdError::Fatal("unexpected end of input".into())),
        };
        if line.is_empty() {
            continue;
        }
        let cmd = if line == "&" {
            last_cmd.clone().ok_or(EdError::NoPreviousCommand)?
        } else {
            last_cmd = Some(line.clone());
            line
        };
        let mut rest: &str = &cmd;
        while !rest.is_empty() {
            let (one, next) = split_one_command(rest);
            exec_one(buffer, &one)?;
            rest = next;
        }
    }
    Ok(())
}
