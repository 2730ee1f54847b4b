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

//! Command parsing and dispatch: address-range extraction, per-command
//! suffix parsing, the `s` and `!` state machines, and the read-eval loop
//! that drives them. Matches `main_loop.c`.
//!
//! The per-run process state `main_loop.c` keeps as file statics (the
//! default filename, the regex engine, the prompt, the various mode
//! flags) lives here on [`Session`] instead. `Session` does not own the
//! [`EdBuffer`]; every method that needs one takes it as an explicit
//! argument, the same way `global.rs` and `regex.rs` do. That keeps the
//! global-command closures in [`Session::run_global`] free to borrow the
//! rest of `Session` mutably while the buffer is reborrowed separately on
//! each call.

use std::io::Write as _;

use crate::buffer::EdBuffer;
use crate::error::EdError;
use crate::global;
use crate::io;
use crate::regex::RegexEngine;
use crate::signal::{self, PendingSignal};

/// What the top-level loop should do after one command ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdOutcome {
    Continue,
    Quit,
}

fn skip_blanks(cursor: &mut &[u8]) {
    while matches!(cursor.first(), Some(b' ') | Some(b'\t')) {
        *cursor = &cursor[1..];
    }
}

/// parse_uint - matches main_loop.c's inline digit-run parser. Leaves the
/// cursor untouched and returns `None` if it isn't looking at a digit.
fn parse_uint(cursor: &mut &[u8]) -> Option<i64> {
    let mut n: i64 = 0;
    let mut any = false;
    while matches!(cursor.first(), Some(b) if b.is_ascii_digit()) {
        any = true;
        n = n.saturating_mul(10).saturating_add((cursor[0] - b'0') as i64);
        *cursor = &cursor[1..];
    }
    any.then_some(n)
}

/// unexpected_command_suffix - matches main_loop.c:stop: the command must
/// end at a newline or end-of-input once its own syntax is consumed.
fn unexpected_command_suffix(cursor: &[u8]) -> Result<(), EdError> {
    match cursor.first() {
        None | Some(b'\n') => Ok(()),
        _ => Err(EdError::UnexpectedCommandSuffix),
    }
}

/// get_command_suffix - matches main_loop.c:353: a run of `l`/`n`/`p`
/// print-mode flags, then end of command.
fn get_command_suffix(cursor: &mut &[u8]) -> Result<u8, EdError> {
    let mut pflags = io::pf::NONE;
    loop {
        match cursor.first() {
            Some(b'l') => {
                pflags |= io::pf::L;
                *cursor = &cursor[1..];
            }
            Some(b'n') => {
                pflags |= io::pf::N;
                *cursor = &cursor[1..];
            }
            Some(b'p') => {
                pflags |= io::pf::P;
                *cursor = &cursor[1..];
            }
            _ => break,
        }
    }
    unexpected_command_suffix(cursor)?;
    Ok(pflags)
}

/// get_command_s_suffix - matches main_loop.c:390: the suffix of a
/// freshly-patterned `s` command — an optional repeat count, `g` (every
/// match), `i`/`I` (case-insensitive), and the usual print flags. Unlike
/// the repeat form of `s`, there is no `r` flag here: a fresh pattern has
/// no "previous search pattern" distinct from itself.
fn get_command_s_suffix(cursor: &mut &[u8]) -> Result<(i32, bool, u8), EdError> {
    let mut snum = 0i32;
    let mut global = false;
    let mut ignore_case = false;
    let mut pflags = io::pf::NONE;
    loop {
        match cursor.first() {
            Some(b) if b.is_ascii_digit() => {
                snum = parse_uint(cursor).unwrap_or(0) as i32;
            }
            Some(b'g') => {
                global = true;
                *cursor = &cursor[1..];
            }
            Some(b'i') | Some(b'I') => {
                ignore_case = true;
                *cursor = &cursor[1..];
            }
            Some(b'l') => {
                pflags |= io::pf::L;
                *cursor = &cursor[1..];
            }
            Some(b'n') => {
                pflags |= io::pf::N;
                *cursor = &cursor[1..];
            }
            Some(b'p') => {
                pflags |= io::pf::P;
                *cursor = &cursor[1..];
            }
            _ => break,
        }
    }
    unexpected_command_suffix(cursor)?;
    let snum = if global { 0 } else if snum == 0 { 1 } else { snum };
    Ok((snum, ignore_case, pflags))
}

/// Per-run editor state: everything `main_loop.c` keeps as file statics,
/// minus the buffer itself and minus the marks (which `EdBuffer` already
/// owns). One instance is built in `main` and lives for the process.
pub struct Session {
    pub regex: RegexEngine,
    pub def_filename: String,
    pub read_only: bool,
    pub prompt_str: String,
    pub prompt_on: bool,
    pub verbose: bool,
    pub scripted: bool,
    pub traditional: bool,
    pub extended_regexp: bool,
    pub restricted: bool,
    pub loose: bool,
    pub errmsg: String,
    last_shell_cmd: Option<String>,
    first_addr: i64,
    second_addr: i64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            regex: RegexEngine::new(),
            def_filename: String::new(),
            read_only: false,
            prompt_str: "*".to_string(),
            prompt_on: false,
            verbose: false,
            scripted: false,
            traditional: false,
            extended_regexp: false,
            restricted: false,
            loose: false,
            errmsg: String::new(),
            last_shell_cmd: None,
            first_addr: -1,
            second_addr: -1,
        }
    }

    // -- address parsing ---------------------------------------------------

    /// One address term: `.`, `$`, `'x`, `/RE/`, `?RE?`, a line number, or
    /// a run of `+`/`-`/`^` offsets (with or without a leading anchor).
    /// Matches the per-term cases of `extract_addresses` in `main_loop.c`.
    fn parse_one_address(&mut self, buffer: &mut EdBuffer, cursor: &mut &[u8]) -> Result<Option<i64>, EdError> {
        skip_blanks(cursor);
        let mut addr: i64 = match cursor.first().copied() {
            Some(b'.') => {
                *cursor = &cursor[1..];
                buffer.current_addr() as i64
            }
            Some(b'$') => {
                *cursor = &cursor[1..];
                buffer.last_addr() as i64
            }
            Some(b'\'') => {
                *cursor = &cursor[1..];
                let c = *cursor.first().ok_or(EdError::InvalidMarkChar)?;
                *cursor = &cursor[1..];
                buffer.get_marked_node_addr(c as char)? as i64
            }
            Some(b'/') | Some(b'?') => {
                let forward = cursor.first() == Some(&b'/');
                let addr = self
                    .regex
                    .next_matching_addr(buffer, cursor, forward, buffer.isbinary(), self.extended_regexp)?
                    as i64;
                let delim = if forward { b'/' } else { b'?' };
                if cursor.first() == Some(&delim) {
                    *cursor = &cursor[1..];
                }
                addr
            }
            Some(b) if b.is_ascii_digit() => parse_uint(cursor).expect("digit checked above"),
            Some(b'+') | Some(b'-') | Some(b'^') => buffer.current_addr() as i64,
            _ => return Ok(None),
        };
        loop {
            let save = *cursor;
            skip_blanks(cursor);
            match cursor.first().copied() {
                Some(b'+') => {
                    *cursor = &cursor[1..];
                    skip_blanks(cursor);
                    addr += parse_uint(cursor).unwrap_or(1);
                }
                Some(b'-') | Some(b'^') => {
                    *cursor = &cursor[1..];
                    skip_blanks(cursor);
                    addr -= parse_uint(cursor).unwrap_or(1);
                }
                _ => {
                    *cursor = save;
                    break;
                }
            }
        }
        if addr < 0 || addr > buffer.last_addr() as i64 {
            return Err(EdError::InvalidAddress);
        }
        Ok(Some(addr))
    }

    /// extract_addresses - matches main_loop.c:231: parse as many
    /// `,`/`;`-separated address terms as are present, leaving
    /// `self.first_addr`/`self.second_addr` set to the last pair seen.
    /// Returns how many terms were given (0, 1, or 2 — GNU ed keeps only
    /// the final two of a longer list, same as `1,2,3` meaning `2,3`).
    fn extract_addresses(&mut self, buffer: &mut EdBuffer, cursor: &mut &[u8]) -> Result<i32, EdError> {
        self.first_addr = -1;
        self.second_addr = -1;
        let first = match self.parse_one_address(buffer, cursor)? {
            Some(a) => a,
            None => return Ok(0),
        };
        self.second_addr = first;
        let mut addr_cnt = 1;
        loop {
            skip_blanks(cursor);
            match cursor.first().copied() {
                Some(b',') | Some(b';') => {
                    if cursor.first() == Some(&b';') {
                        buffer.set_current_addr(self.second_addr as usize);
                    }
                    *cursor = &cursor[1..];
                    self.first_addr = self.second_addr;
                    self.second_addr = match self.parse_one_address(buffer, cursor)? {
                        Some(a) => a,
                        None => buffer.current_addr() as i64,
                    };
                    addr_cnt = 2;
                }
                _ => break,
            }
        }
        Ok(addr_cnt)
    }

    /// get_third_addr - matches main_loop.c:310: parse the destination
    /// address for `m`/`t`, without disturbing the outer address pair.
    fn get_third_addr(&mut self, buffer: &mut EdBuffer, cursor: &mut &[u8]) -> Result<i64, EdError> {
        let saved_first = self.first_addr;
        let saved_second = self.second_addr;
        let cnt = self.extract_addresses(buffer, cursor)?;
        let third = if cnt == 0 { buffer.current_addr() as i64 } else { self.second_addr };
        self.first_addr = saved_first;
        self.second_addr = saved_second;
        if third < 0 || third > buffer.last_addr() as i64 {
            return Err(EdError::InvalidAddress);
        }
        Ok(third)
    }

    fn ensure_range(&mut self) {
        if self.first_addr < 0 {
            self.first_addr = self.second_addr;
        }
    }

    fn validate_range(&self, buffer: &EdBuffer) -> Result<(), EdError> {
        if self.first_addr < 0
            || self.second_addr < 0
            || self.first_addr > self.second_addr
            || self.second_addr > buffer.last_addr() as i64
        {
            return Err(EdError::InvalidAddress);
        }
        Ok(())
    }

    /// set_addr_range - matches main_loop.c:328: commands taking a range
    /// default to the current line alone when no address was given.
    fn default_current(&mut self, buffer: &EdBuffer, addr_cnt: i32) -> Result<(), EdError> {
        if addr_cnt == 0 {
            self.second_addr = buffer.current_addr() as i64;
        }
        self.ensure_range();
        self.validate_range(buffer)
    }

    /// set_addr_range2 - matches main_loop.c:340: commands (`g`/`v`/`w`)
    /// that default to the whole buffer when no address was given.
    fn default_whole_buffer(&mut self, buffer: &EdBuffer, addr_cnt: i32) -> Result<(), EdError> {
        if addr_cnt == 0 {
            self.first_addr = if buffer.last_addr() > 0 { 1 } else { 0 };
            self.second_addr = buffer.last_addr() as i64;
        } else {
            self.ensure_range();
        }
        self.validate_range(buffer)
    }

    fn maybe_print(&mut self, buffer: &mut EdBuffer, pflags: u8) -> Result<(), EdError> {
        if pflags != io::pf::NONE {
            let addr = buffer.current_addr();
            if addr > 0 {
                io::print_lines(buffer, addr, addr, pflags)?;
            }
        }
        Ok(())
    }

    // -- filenames and shell commands ---------------------------------------

    fn may_access_filename(&self, name: &str) -> Result<(), EdError> {
        if self.restricted {
            if name.starts_with('!') {
                return Err(EdError::ShellAccessRestricted);
            }
            if name.starts_with('/') || name.contains("../") {
                return Err(EdError::DirectoryAccessRestricted);
            }
        }
        Ok(())
    }

    /// get_filename - matches main_loop.c's comments above `get_filename`:
    /// `!shell-command`, a `~/`-prefixed home-relative path, or a plain
    /// path. An absent argument yields an empty string; callers decide
    /// whether that is acceptable for the command in question.
    fn get_filename(&mut self, cursor: &mut &[u8]) -> Result<String, EdError> {
        skip_blanks(cursor);
        if matches!(cursor.first(), None | Some(b'\n')) {
            return Ok(String::new());
        }
        if cursor.first() == Some(&b'!') {
            *cursor = &cursor[1..];
            return self.get_shell_command(cursor);
        }
        let mut name = String::new();
        if cursor.first() == Some(&b'~') && cursor.get(1) == Some(&b'/') {
            if let Some(home) = signal::home_directory() {
                name.push_str(&home);
                *cursor = &cursor[1..];
            }
        }
        name.push_str(&String::from_utf8_lossy(cursor));
        *cursor = &[];
        if name.len() > 4096 {
            return Err(EdError::FilenameTooLong);
        }
        self.may_access_filename(&name)?;
        Ok(name)
    }

    /// get_shell_command - matches main_loop.c's shell-command reader:
    /// `!!` repeats the previous command, `%` expands to the default
    /// filename, and a line ending in an odd number of backslashes
    /// continues onto the next input line. Always returns a string with
    /// a leading `!`.
    fn get_shell_command(&mut self, cursor: &mut &[u8]) -> Result<String, EdError> {
        if self.restricted {
            return Err(EdError::ShellAccessRestricted);
        }
        let first = String::from_utf8_lossy(cursor).to_string();
        let joined = io::get_extended_line(&first, io::get_stdin_line)?;
        *cursor = &[];
        let bytes = joined.as_bytes();
        let mut buf = String::new();
        let mut i = 0;
        let mut replacement = false;
        if bytes.first() != Some(&b'!') {
            buf.push('!');
        } else {
            match &self.last_shell_cmd {
                Some(prev) => buf.push_str(prev),
                None => return Err(EdError::NoPreviousCommand),
            }
            replacement = true;
            i = 1;
        }
        while i < bytes.len() {
            if bytes[i] == b'%' {
                if self.def_filename.is_empty() {
                    return Err(EdError::NoCurrentFilename);
                }
                buf.push_str(&self.def_filename);
                i += 1;
                replacement = true;
            } else if bytes[i] == b'\\' && i + 1 < bytes.len() {
                if bytes[i + 1] != b'%' {
                    buf.push('\\');
                }
                buf.push(bytes[i + 1] as char);
                i += 2;
            } else {
                buf.push(bytes[i] as char);
                i += 1;
            }
        }
        self.last_shell_cmd = Some(buf.clone());
        if replacement && !self.scripted {
            println!("{}", &buf[1..]);
        }
        Ok(buf)
    }

    // -- text input (a/i/c) --------------------------------------------------

    /// do_append - the text-collection loop shared by `a`/`i`/`c`: read
    /// lines from stdin until a line consisting of a lone `.`, applying
    /// the same backslash-continuation rule as command input.
    fn do_append(&mut self, buffer: &mut EdBuffer, addr: usize) -> Result<(), EdError> {
        let mut lines = Vec::new();
        loop {
            let line = match io::get_stdin_line()? {
                Some(l) => l,
                None => break,
            };
            let joined = io::get_extended_line(&line, io::get_stdin_line)?;
            if joined == "." {
                break;
            }
            lines.push(joined.into_bytes());
        }
        if !lines.is_empty() {
            buffer.append_lines(&lines, addr)?;
        }
        Ok(())
    }

    // -- s --------------------------------------------------------------------

    /// command_s - matches main_loop.c:417: either a fresh
    /// `s/re/repl/flags`, or a bare `s` (plus `g`/`p`/`l`/`n`/`r`/a repeat
    /// count) repeating the last substitution against the new address
    /// range.
    fn command_s(&mut self, buffer: &mut EdBuffer, cursor: &mut &[u8], addr_cnt: i32, isglobal: bool) -> Result<u8, EdError> {
        self.default_current(buffer, addr_cnt)?;
        if !isglobal {
            buffer.clear_undo_stack();
        }
        let fresh = matches!(cursor.first(), Some(b)
            if !b.is_ascii_digit()
                && !matches!(b, b' ' | b'\t' | b'\n' | b'g' | b'G' | b'p' | b'P' | b'r' | b'R' | b'l' | b'n'));
        if !fresh {
            if !self.regex.has_subst_regex() {
                return Err(EdError::NoPreviousSubstitution);
            }
            let mut snum = 0i32;
            let mut explicit_count = false;
            let mut global = false;
            let mut pflags = io::pf::NONE;
            loop {
                match cursor.first() {
                    Some(b) if b.is_ascii_digit() => {
                        snum = parse_uint(cursor).unwrap_or(1) as i32;
                        explicit_count = true;
                    }
                    Some(b'g') | Some(b'G') => {
                        global = true;
                        *cursor = &cursor[1..];
                    }
                    Some(b'p') => {
                        pflags |= io::pf::P;
                        *cursor = &cursor[1..];
                    }
                    Some(b'l') => {
                        pflags |= io::pf::L;
                        *cursor = &cursor[1..];
                    }
                    Some(b'n') => {
                        pflags |= io::pf::N;
                        *cursor = &cursor[1..];
                    }
                    Some(b'r') | Some(b'R') => {
                        self.regex.replace_subst_re_by_search_re()?;
                        *cursor = &cursor[1..];
                    }
                    _ => break,
                }
            }
            unexpected_command_suffix(cursor)?;
            if !explicit_count {
                snum = 1;
            }
            let n = if global { 0 } else { snum };
            self.regex.search_and_replace(buffer, self.first_addr as usize, self.second_addr as usize, n, isglobal)?;
            return Ok(pflags);
        }
        let isbinary = buffer.isbinary();
        let (delimiter, pat) = self.regex.extract_search_pattern(cursor, isbinary)?;
        self.regex.extract_replacement(cursor, isglobal)?;
        // A line consisting only of "s/re/repl" with no trailing delimiter
        // is short for "s/re/repl/p": the line is printed after substituting.
        let mut pflags = io::pf::NONE;
        if cursor.first() == Some(&delimiter) {
            *cursor = &cursor[1..];
        } else {
            pflags |= io::pf::P;
        }
        let (snum, ignore_case, suffix_pflags) = get_command_s_suffix(cursor)?;
        pflags |= suffix_pflags;
        self.regex.set_subst_regex(&pat, ignore_case, self.extended_regexp)?;
        self.regex.search_and_replace(buffer, self.first_addr as usize, self.second_addr as usize, snum, isglobal)?;
        Ok(pflags)
    }

    // -- ! ----------------------------------------------------------------------

    /// command_shell - matches main_loop.c:513: `!cmd` with no address runs
    /// a plain shell escape; with an address range it filters those lines
    /// through `cmd`, replacing them with its output.
    fn command_shell(&mut self, buffer: &mut EdBuffer, cursor: &mut &[u8], addr_cnt: i32, isglobal: bool) -> Result<(), EdError> {
        let fnp = self.get_shell_command(cursor)?;
        let cmd = fnp[1..].to_string();
        if addr_cnt == 0 {
            std::process::Command::new("/bin/sh")
                .arg("-c")
                .arg(&cmd)
                .status()
                .map_err(|e| EdError::IoError(format!("Can't create shell process: {e}")))?;
            if !self.scripted {
                println!("!");
            }
            return Ok(());
        }
        self.ensure_range();
        self.validate_range(buffer)?;
        if cmd.contains('<') || cmd.contains('>') {
            return Err(EdError::InvalidRedirection);
        }
        if !isglobal {
            buffer.clear_undo_stack();
        }
        let tmpname = std::env::temp_dir().join(format!("lined-{}-{}", std::process::id(), self.second_addr));
        let tmpname_str = tmpname.to_string_lossy().to_string();
        let full_cmd = format!("!{} >{} 2>&1", cmd, tmpname_str);
        io::write_file(&full_cmd, false, self.first_addr as usize, self.second_addr as usize, buffer, true)?;
        buffer.delete_lines(self.first_addr as usize, self.second_addr as usize, isglobal)?;
        let insert_at = buffer.current_addr();
        io::read_file(&tmpname_str, insert_at, buffer, true)?;
        let _ = std::fs::remove_file(&tmpname_str);
        Ok(())
    }

    // -- e/E ----------------------------------------------------------------------

    /// cmd_edit - matches main_loop.c's `e`/`E` case: discard the current
    /// buffer and load a new file (or the default filename) in its place.
    fn cmd_edit(&mut self, buffer: &mut EdBuffer, cursor: &mut &[u8]) -> Result<(), EdError> {
        let fname = self.get_filename(cursor)?;
        let target = if !fname.is_empty() {
            if !fname.starts_with('!') {
                self.def_filename = fname.clone();
            }
            fname
        } else if !self.def_filename.is_empty() {
            self.def_filename.clone()
        } else {
            return Err(EdError::NoCurrentFilename);
        };
        buffer.reset()?;
        io::read_file(&target, 0, buffer, self.scripted)?;
        buffer.set_modified(false);
        Ok(())
    }

    // -- global -------------------------------------------------------------

    /// run_global - matches main_loop.c:754 as adapted by `global.rs`:
    /// drives either the non-interactive (`g`/`v`) or interactive (`G`/`V`)
    /// command loop over the active line set `build_active_list` marked.
    fn run_global(&mut self, buffer: &mut EdBuffer, cursor: &mut &[u8], interactive: bool) -> Result<(), EdError> {
        if interactive {
            unexpected_command_suffix(cursor)?;
            global::exec_global_interactive(
                buffer,
                |buf, addr| io::print_lines(buf, addr, addr, io::pf::NONE),
                io::get_stdin_line,
                |buf, line| {
                    let bytes = line.as_bytes();
                    let mut c: &[u8] = bytes;
                    loop {
                        match self.exec_command(buf, &mut c, true)? {
                            CmdOutcome::Quit => return Err(EdError::Quit),
                            CmdOutcome::Continue => {}
                        }
                        if c.is_empty() {
                            break;
                        }
                    }
                    Ok(())
                },
            )
        } else {
            let first = String::from_utf8_lossy(cursor).to_string();
            let cmd_list = if self.traditional && first.is_empty() {
                "p".to_string()
            } else {
                io::get_extended_line(&first, io::get_stdin_line)?
            };
            *cursor = &[];
            global::exec_global(buffer, &cmd_list, |buf, line| {
                let bytes = line.as_bytes();
                let mut c: &[u8] = bytes;
                loop {
                    match self.exec_command(buf, &mut c, true)? {
                        CmdOutcome::Quit => return Err(EdError::Quit),
                        CmdOutcome::Continue => {}
                    }
                    if c.is_empty() {
                        break;
                    }
                }
                Ok(())
            })
        }
    }

    // -- dispatch -------------------------------------------------------------

    /// exec_command - matches main_loop.c:554: parse one address-prefixed
    /// command and carry it out. `isglobal` is true while running inside
    /// `g`/`v`/`G`/`V`, and disables nesting another global command.
    pub fn exec_command(&mut self, buffer: &mut EdBuffer, cursor: &mut &[u8], isglobal: bool) -> Result<CmdOutcome, EdError> {
        let addr_cnt = self.extract_addresses(buffer, cursor)?;
        skip_blanks(cursor);

        if matches!(cursor.first(), None | Some(b'\n')) {
            let addr = if addr_cnt == 0 { buffer.inc_current_addr() as i64 } else { self.second_addr };
            if addr <= 0 || addr as usize > buffer.last_addr() {
                return Err(EdError::InvalidAddress);
            }
            io::print_lines(buffer, addr as usize, addr as usize, io::pf::NONE)?;
            return Ok(CmdOutcome::Continue);
        }

        let cmd = cursor[0];
        *cursor = &cursor[1..];

        match cmd {
            b'#' => {
                while !matches!(cursor.first(), None | Some(b'\n')) {
                    *cursor = &cursor[1..];
                }
                Ok(CmdOutcome::Continue)
            }
            b'a' => {
                unexpected_command_suffix(cursor)?;
                self.default_current(buffer, addr_cnt)?;
                if !isglobal {
                    buffer.clear_undo_stack();
                }
                let addr = self.second_addr as usize;
                self.do_append(buffer, addr)?;
                Ok(CmdOutcome::Continue)
            }
            b'i' => {
                unexpected_command_suffix(cursor)?;
                self.default_current(buffer, addr_cnt)?;
                if !isglobal {
                    buffer.clear_undo_stack();
                }
                let addr = (self.second_addr as usize).saturating_sub(1);
                self.do_append(buffer, addr)?;
                Ok(CmdOutcome::Continue)
            }
            b'c' => {
                unexpected_command_suffix(cursor)?;
                self.default_current(buffer, addr_cnt)?;
                if !isglobal {
                    buffer.clear_undo_stack();
                }
                buffer.delete_lines(self.first_addr as usize, self.second_addr as usize, isglobal)?;
                let addr = buffer.current_addr();
                self.do_append(buffer, addr)?;
                Ok(CmdOutcome::Continue)
            }
            b'd' => {
                self.default_current(buffer, addr_cnt)?;
                let pflags = get_command_suffix(cursor)?;
                if !isglobal {
                    buffer.clear_undo_stack();
                }
                buffer.delete_lines(self.first_addr as usize, self.second_addr as usize, isglobal)?;
                if buffer.current_addr() == 0 && buffer.last_addr() > 0 {
                    buffer.set_current_addr(1);
                }
                self.maybe_print(buffer, pflags)?;
                Ok(CmdOutcome::Continue)
            }
            b'e' | b'E' => {
                if addr_cnt != 0 {
                    return Err(EdError::UnexpectedAddress);
                }
                if cmd == b'e' && buffer.modified() && !buffer.warned() {
                    return Err(EdError::BufferModified);
                }
                self.cmd_edit(buffer, cursor)?;
                Ok(CmdOutcome::Continue)
            }
            b'f' => {
                if addr_cnt != 0 {
                    return Err(EdError::UnexpectedAddress);
                }
                let fname = self.get_filename(cursor)?;
                if !fname.is_empty() {
                    if fname.starts_with('!') {
                        return Err(EdError::InvalidRedirection);
                    }
                    self.def_filename = fname;
                }
                if self.def_filename.is_empty() {
                    return Err(EdError::NoCurrentFilename);
                }
                println!("{}", self.def_filename);
                Ok(CmdOutcome::Continue)
            }
            b'g' | b'v' | b'G' | b'V' => {
                if isglobal {
                    return Err(EdError::CannotNestGlobalCommands);
                }
                self.default_whole_buffer(buffer, addr_cnt)?;
                let match_ = matches!(cmd, b'g' | b'G');
                let isbinary = buffer.isbinary();
                self.regex.build_active_list(
                    buffer,
                    cursor,
                    self.first_addr as usize,
                    self.second_addr as usize,
                    match_,
                    isbinary,
                    self.extended_regexp,
                )?;
                let interactive = matches!(cmd, b'G' | b'V');
                self.run_global(buffer, cursor, interactive)?;
                Ok(CmdOutcome::Continue)
            }
            b'h' => {
                if addr_cnt != 0 {
                    return Err(EdError::UnexpectedAddress);
                }
                unexpected_command_suffix(cursor)?;
                if !self.errmsg.is_empty() {
                    println!("{}", self.errmsg);
                }
                Ok(CmdOutcome::Continue)
            }
            b'H' => {
                if addr_cnt != 0 {
                    return Err(EdError::UnexpectedAddress);
                }
                unexpected_command_suffix(cursor)?;
                self.verbose = !self.verbose;
                if self.verbose && !self.errmsg.is_empty() {
                    println!("{}", self.errmsg);
                }
                Ok(CmdOutcome::Continue)
            }
            b'j' => {
                self.default_current(buffer, addr_cnt)?;
                if addr_cnt < 2 {
                    self.second_addr = (self.second_addr + 1).min(buffer.last_addr() as i64);
                }
                let pflags = get_command_suffix(cursor)?;
                if !isglobal {
                    buffer.clear_undo_stack();
                }
                if self.first_addr < self.second_addr {
                    buffer.join_lines(self.first_addr as usize, self.second_addr as usize, isglobal)?;
                }
                self.maybe_print(buffer, pflags)?;
                Ok(CmdOutcome::Continue)
            }
            b'k' => {
                if addr_cnt > 1 {
                    return Err(EdError::InvalidAddress);
                }
                self.default_current(buffer, addr_cnt)?;
                let c = *cursor.first().ok_or(EdError::InvalidMarkChar)?;
                *cursor = &cursor[1..];
                unexpected_command_suffix(cursor)?;
                buffer.mark_line_node(self.second_addr as usize, c as char)?;
                Ok(CmdOutcome::Continue)
            }
            b'l' | b'n' | b'p' => {
                self.default_current(buffer, addr_cnt)?;
                let mut pflags = match cmd {
                    b'l' => io::pf::L,
                    b'n' => io::pf::N,
                    _ => io::pf::P,
                };
                pflags |= get_command_suffix(cursor)?;
                io::print_lines(buffer, self.first_addr as usize, self.second_addr as usize, pflags)?;
                Ok(CmdOutcome::Continue)
            }
            b'm' => {
                self.default_current(buffer, addr_cnt)?;
                let dest = self.get_third_addr(buffer, cursor)?;
                let pflags = get_command_suffix(cursor)?;
                if dest >= self.first_addr && dest < self.second_addr {
                    return Err(EdError::InvalidDestination);
                }
                if !isglobal {
                    buffer.clear_undo_stack();
                }
                buffer.move_lines(self.first_addr as usize, self.second_addr as usize, dest as usize, isglobal)?;
                self.maybe_print(buffer, pflags)?;
                Ok(CmdOutcome::Continue)
            }
            b't' => {
                self.default_current(buffer, addr_cnt)?;
                let dest = self.get_third_addr(buffer, cursor)?;
                let pflags = get_command_suffix(cursor)?;
                if !isglobal {
                    buffer.clear_undo_stack();
                }
                buffer.copy_lines(self.first_addr as usize, self.second_addr as usize, dest as usize)?;
                self.maybe_print(buffer, pflags)?;
                Ok(CmdOutcome::Continue)
            }
            b'P' => {
                if addr_cnt != 0 {
                    return Err(EdError::UnexpectedAddress);
                }
                unexpected_command_suffix(cursor)?;
                self.prompt_on = !self.prompt_on;
                Ok(CmdOutcome::Continue)
            }
            b'q' => {
                if addr_cnt != 0 {
                    return Err(EdError::UnexpectedAddress);
                }
                unexpected_command_suffix(cursor)?;
                if buffer.modified() && !buffer.warned() {
                    return Err(EdError::BufferModified);
                }
                Ok(CmdOutcome::Quit)
            }
            b'Q' => {
                if addr_cnt != 0 {
                    return Err(EdError::UnexpectedAddress);
                }
                unexpected_command_suffix(cursor)?;
                Ok(CmdOutcome::Quit)
            }
            b'r' => {
                if addr_cnt > 1 {
                    return Err(EdError::InvalidAddress);
                }
                if addr_cnt == 0 {
                    self.second_addr = buffer.last_addr() as i64;
                }
                let addr = self.second_addr as usize;
                let fname = self.get_filename(cursor)?;
                let target = if fname.is_empty() {
                    if self.def_filename.is_empty() {
                        return Err(EdError::NoCurrentFilename);
                    }
                    self.def_filename.clone()
                } else {
                    if !fname.starts_with('!') {
                        self.def_filename = fname.clone();
                    }
                    fname
                };
                if !isglobal {
                    buffer.clear_undo_stack();
                }
                io::read_file(&target, addr, buffer, self.scripted)?;
                buffer.set_modified(true);
                Ok(CmdOutcome::Continue)
            }
            b's' => {
                let pflags = self.command_s(buffer, cursor, addr_cnt, isglobal)?;
                self.maybe_print(buffer, pflags)?;
                Ok(CmdOutcome::Continue)
            }
            b'u' => {
                if addr_cnt != 0 {
                    return Err(EdError::UnexpectedAddress);
                }
                let pflags = get_command_suffix(cursor)?;
                buffer.undo(isglobal)?;
                self.maybe_print(buffer, pflags)?;
                Ok(CmdOutcome::Continue)
            }
            b'w' | b'W' => {
                let append = cmd == b'W';
                let quit = matches!(cursor.first(), Some(b'q') | Some(b'Q'));
                if quit {
                    *cursor = &cursor[1..];
                }
                self.default_whole_buffer(buffer, addr_cnt)?;
                let fname = self.get_filename(cursor)?;
                let target = if fname.is_empty() {
                    if self.def_filename.is_empty() {
                        return Err(EdError::NoCurrentFilename);
                    }
                    self.def_filename.clone()
                } else {
                    if self.def_filename.is_empty() && !fname.starts_with('!') {
                        self.def_filename = fname.clone();
                    }
                    fname
                };
                io::write_file(&target, append, self.first_addr as usize, self.second_addr as usize, buffer, self.scripted)?;
                buffer.set_modified(false);
                if quit {
                    Ok(CmdOutcome::Quit)
                } else {
                    Ok(CmdOutcome::Continue)
                }
            }
            b'x' => {
                self.default_current(buffer, addr_cnt)?;
                let pflags = get_command_suffix(cursor)?;
                if !isglobal {
                    buffer.clear_undo_stack();
                }
                buffer.put_lines(self.second_addr as usize)?;
                self.maybe_print(buffer, pflags)?;
                Ok(CmdOutcome::Continue)
            }
            b'y' => {
                self.default_current(buffer, addr_cnt)?;
                unexpected_command_suffix(cursor)?;
                buffer.yank_lines(self.first_addr as usize, self.second_addr as usize)?;
                Ok(CmdOutcome::Continue)
            }
            b'z' => {
                self.default_current(buffer, addr_cnt)?;
                skip_blanks(cursor);
                if let Some(n) = parse_uint(cursor) {
                    signal::set_window_lines(n as i32);
                }
                let pflags = get_command_suffix(cursor)?;
                let start = (self.second_addr + 1).clamp(1, buffer.last_addr().max(1) as i64);
                let count = signal::window_lines().max(1) as i64;
                let end = (start + count - 1).min(buffer.last_addr() as i64);
                if start <= end {
                    io::print_lines(buffer, start as usize, end as usize, pflags)?;
                }
                Ok(CmdOutcome::Continue)
            }
            b'=' => {
                let pflags = get_command_suffix(cursor)?;
                let addr = if addr_cnt == 0 { buffer.last_addr() as i64 } else { self.second_addr };
                println!("{}", addr);
                let _ = pflags;
                Ok(CmdOutcome::Continue)
            }
            b'!' => {
                self.command_shell(buffer, cursor, addr_cnt, isglobal)?;
                Ok(CmdOutcome::Continue)
            }
            _ => Err(EdError::UnknownCommand),
        }
    }

    // -- top-level loop -------------------------------------------------------

    /// dump_and_exit - matches the `SIGHUP` handling in `main_loop.c`:
    /// best-effort save of a modified buffer to `ed.hup` before exiting.
    fn dump_and_exit(&mut self, buffer: &mut EdBuffer) {
        if buffer.modified() && buffer.last_addr() > 0 {
            let path = signal::home_directory()
                .map(|h| format!("{h}/ed.hup"))
                .unwrap_or_else(|| "ed.hup".to_string());
            let _ = io::write_file(&path, false, 1, buffer.last_addr(), buffer, true);
        }
    }

    /// main_loop - matches main_loop.c:808: read a command line, execute
    /// it, and print `"?\n"` plus (in verbose mode) the error text on
    /// failure. Exits at EOF or `q`/`Q`; a modified, unwarned buffer turns
    /// EOF into one soft refusal, mirroring the `q` command's own rule.
    pub fn run(&mut self, buffer: &mut EdBuffer, initial_error: bool) -> i32 {
        signal::set_signals();
        let mut exit_status = if initial_error { 1 } else { 0 };

        loop {
            if let Some(sig) = signal::poll_pending() {
                match sig {
                    PendingSignal::Hup => {
                        tracing::warn!("SIGHUP received, dumping modified buffer to ed.hup");
                        self.dump_and_exit(buffer);
                        return 2;
                    }
                    PendingSignal::Int => {
                        println!();
                        continue;
                    }
                }
            }

            if self.prompt_on {
                print!("{}", self.prompt_str);
                let _ = std::io::stdout().flush();
            }

            let line = match io::get_stdin_line() {
                Ok(Some(l)) => l,
                Ok(None) => {
                    if !buffer.modified() || buffer.warned() {
                        return exit_status;
                    }
                    buffer.set_warned(true);
                    println!("?");
                    self.errmsg = "warning: file modified".to_string();
                    if !self.loose {
                        exit_status = 1;
                    }
                    continue;
                }
                Err(_) => return 2,
            };

            let bytes = line.into_bytes();
            let mut cursor: &[u8] = &bytes;
            match self.exec_command(buffer, &mut cursor, false) {
                Ok(CmdOutcome::Continue) => {
                    if self.read_only && buffer.modified() {
                        self.read_only = false;
                        eprintln!("{}: warning: file is read only", env!("CARGO_PKG_NAME"));
                    }
                    buffer.set_warned(false);
                }
                Ok(CmdOutcome::Quit) => return exit_status,
                Err(EdError::Quit) => return exit_status,
                Err(e) => {
                    println!("?");
                    if !self.loose {
                        exit_status = 1;
                    }
                    let is_emod = matches!(e, EdError::BufferModified);
                    buffer.set_warned(is_emod);
                    self.errmsg = e.to_string();
                    tracing::debug!(error = %self.errmsg, command = %line, "command failed");
                    if self.verbose {
                        eprintln!("{}: {}", env!("CARGO_PKG_NAME"), self.errmsg);
                    }
                    if let EdError::Fatal(_) = e {
                        return 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(lines: &[&str]) -> (Session, EdBuffer) {
        let mut session = Session::new();
        let mut buffer = EdBuffer::new().unwrap();
        let owned: Vec<Vec<u8>> = lines.iter().map(|l| l.as_bytes().to_vec()).collect();
        buffer.append_lines(&owned, 0).unwrap();
        buffer.set_modified(false);
        buffer.reset_undo_state();
        session.def_filename = "test.txt".to_string();
        (session, buffer)
    }

    fn run(session: &mut Session, buffer: &mut EdBuffer, cmd: &str) -> Result<CmdOutcome, EdError> {
        let bytes = cmd.as_bytes();
        let mut cursor: &[u8] = bytes;
        session.exec_command(buffer, &mut cursor, false)
    }

    #[test]
    fn extract_addresses_defaults_to_current_line() {
        let (mut session, mut buffer) = seeded(&["one", "two", "three"]);
        buffer.set_current_addr(2);
        let mut cursor: &[u8] = b"";
        let cnt = session.extract_addresses(&mut buffer, &mut cursor).unwrap();
        assert_eq!(cnt, 0);
    }

    #[test]
    fn extract_addresses_parses_comma_range() {
        let (mut session, mut buffer) = seeded(&["one", "two", "three"]);
        let mut cursor: &[u8] = b"1,3";
        let cnt = session.extract_addresses(&mut buffer, &mut cursor).unwrap();
        assert_eq!(cnt, 2);
        assert_eq!(session.first_addr, 1);
        assert_eq!(session.second_addr, 3);
    }

    #[test]
    fn extract_addresses_offsets_combine() {
        let (mut session, mut buffer) = seeded(&["a", "b", "c", "d", "e"]);
        buffer.set_current_addr(2);
        let mut cursor: &[u8] = b".+2";
        let cnt = session.extract_addresses(&mut buffer, &mut cursor).unwrap();
        assert_eq!(cnt, 1);
        assert_eq!(session.second_addr, 4);
    }

    #[test]
    fn delete_moves_current_addr_to_following_line() {
        let (mut session, mut buffer) = seeded(&["one", "two", "three"]);
        run(&mut session, &mut buffer, "1d").unwrap();
        assert_eq!(buffer.last_addr(), 2);
        assert_eq!(buffer.current_addr(), 1);
    }

    #[test]
    fn append_inserts_after_given_address() {
        let (_session, mut buffer) = seeded(&["one"]);
        // do_append reads from stdin; exercise append_lines directly here,
        // mirroring what the 'a' case hands it.
        buffer.append_lines(&[b"two".to_vec()], 1).unwrap();
        assert_eq!(buffer.last_addr(), 2);
        assert_eq!(buffer.line_text(2).unwrap().unwrap(), b"two");
    }

    #[test]
    fn substitute_replaces_first_match_by_default() {
        let (mut session, mut buffer) = seeded(&["foo bar foo"]);
        run(&mut session, &mut buffer, "1s/foo/baz/").unwrap();
        assert_eq!(buffer.line_text(1).unwrap().unwrap(), b"baz bar foo");
    }

    #[test]
    fn substitute_global_flag_replaces_every_match() {
        let (mut session, mut buffer) = seeded(&["foo bar foo"]);
        run(&mut session, &mut buffer, "1s/foo/baz/g").unwrap();
        assert_eq!(buffer.line_text(1).unwrap().unwrap(), b"baz bar baz");
    }

    #[test]
    fn substitute_case_insensitive_flag_matches_mixed_case() {
        let (mut session, mut buffer) = seeded(&["Foo bar"]);
        run(&mut session, &mut buffer, "1s/foo/baz/i").unwrap();
        assert_eq!(buffer.line_text(1).unwrap().unwrap(), b"baz bar");
    }

    #[test]
    fn substitute_repeat_without_pattern_reuses_last_one() {
        let (mut session, mut buffer) = seeded(&["foo", "foo"]);
        run(&mut session, &mut buffer, "1s/foo/bar/").unwrap();
        run(&mut session, &mut buffer, "2s").unwrap();
        assert_eq!(buffer.line_text(2).unwrap().unwrap(), b"bar");
    }

    #[test]
    fn substitute_with_omitted_trailing_delimiter_implies_print_suffix() {
        let (mut session, mut buffer) = seeded(&["foo bar"]);
        let pflags = session.command_s(&mut buffer, &mut (b"/foo/baz".as_slice()), 0, false).unwrap();
        assert_eq!(pflags, io::pf::P);
        assert_eq!(buffer.line_text(1).unwrap().unwrap(), b"baz bar");
    }

    #[test]
    fn substitute_with_trailing_delimiter_consumes_it_and_reads_suffix_flags() {
        let (mut session, mut buffer) = seeded(&["foo foo"]);
        let pflags = session.command_s(&mut buffer, &mut (b"/foo/baz/gp".as_slice()), 0, false).unwrap();
        assert_eq!(pflags, io::pf::P);
        assert_eq!(buffer.line_text(1).unwrap().unwrap(), b"baz baz");
    }

    #[test]
    fn wq_suffix_writes_then_quits() {
        let (mut session, mut buffer) = seeded(&["one"]);
        session.def_filename = "/dev/null".to_string();
        let outcome = run(&mut session, &mut buffer, "1,$wq").unwrap();
        assert!(matches!(outcome, CmdOutcome::Quit));
        assert!(!buffer.modified());
    }

    #[test]
    fn undo_baseline_resets_so_a_second_edit_only_reverts_itself() {
        let (mut session, mut buffer) = seeded(&["one", "two", "three"]);
        run(&mut session, &mut buffer, "1d").unwrap();
        run(&mut session, &mut buffer, "1d").unwrap();
        run(&mut session, &mut buffer, "u").unwrap();
        // only the second delete is undone, not both
        assert_eq!(buffer.last_addr(), 2);
        assert_eq!(buffer.line_text(1).unwrap().unwrap(), b"two");
    }

    #[test]
    fn move_into_its_own_range_is_rejected() {
        let (mut session, mut buffer) = seeded(&["a", "b", "c", "d"]);
        let err = run(&mut session, &mut buffer, "1,3m2").unwrap_err();
        assert!(matches!(err, EdError::InvalidDestination));
    }

    #[test]
    fn copy_duplicates_the_range_after_destination() {
        let (mut session, mut buffer) = seeded(&["a", "b"]);
        run(&mut session, &mut buffer, "1,2t2").unwrap();
        assert_eq!(buffer.last_addr(), 4);
        assert_eq!(buffer.line_text(3).unwrap().unwrap(), b"a");
        assert_eq!(buffer.line_text(4).unwrap().unwrap(), b"b");
    }

    #[test]
    fn mark_and_address_by_mark_round_trip() {
        let (mut session, mut buffer) = seeded(&["a", "b", "c"]);
        run(&mut session, &mut buffer, "2ka").unwrap();
        assert_eq!(buffer.get_marked_node_addr('a').unwrap(), 2);
    }

    #[test]
    fn quit_with_unsaved_changes_is_refused_once() {
        let (mut session, mut buffer) = seeded(&["a"]);
        buffer.append_lines(&[b"b".to_vec()], 1).unwrap();
        let err = run(&mut session, &mut buffer, "q").unwrap_err();
        assert!(matches!(err, EdError::BufferModified));
        buffer.set_warned(true);
        let outcome = run(&mut session, &mut buffer, "q").unwrap();
        assert_eq!(outcome, CmdOutcome::Quit);
    }

    #[test]
    fn write_with_no_filename_and_none_set_errors() {
        let (mut session, mut buffer) = seeded(&["a"]);
        session.def_filename.clear();
        let err = run(&mut session, &mut buffer, "w").unwrap_err();
        assert!(matches!(err, EdError::NoCurrentFilename));
    }

    #[test]
    fn global_command_cannot_nest() {
        let (mut session, mut buffer) = seeded(&["a"]);
        let err = session.exec_command(&mut buffer, &mut &b"g/a/p"[..], true).unwrap_err();
        assert!(matches!(err, EdError::CannotNestGlobalCommands));
    }

    #[test]
    fn undo_restores_deleted_line() {
        let (mut session, mut buffer) = seeded(&["one", "two"]);
        run(&mut session, &mut buffer, "1d").unwrap();
        assert_eq!(buffer.last_addr(), 1);
        run(&mut session, &mut buffer, "u").unwrap();
        assert_eq!(buffer.last_addr(), 2);
        assert_eq!(buffer.line_text(1).unwrap().unwrap(), b"one");
    }
}
