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

//! Regular-expression glue: pattern extraction from the command cursor,
//! search-regex/subst-regex caching, the global-command active list, and
//! the `s` substitution engine. Matches `regex.c`.

use regex::bytes::{Captures, Regex, RegexBuilder};

use crate::buffer::EdBuffer;
use crate::error::EdError;
use crate::signal::InterruptGuard;

/// Per-session regex state: the last pattern used for a search or `s`
/// command, the most recent substitution's compiled pattern, and its
/// replacement template. GNU ed keeps these as process statics; here they
/// live on the editor's engine instance, one per run of the editor.
pub struct RegexEngine {
    last: Option<Regex>,
    subst: Option<Regex>,
    rbuf: Vec<u8>,
}

impl RegexEngine {
    pub fn new() -> Self {
        Self { last: None, subst: None, rbuf: Vec::new() }
    }

    /// subst_regex - matches regex.c:39
    pub fn has_subst_regex(&self) -> bool {
        self.subst.is_some()
    }

    /// parse_char_class - matches regex.c:65. `p` starts just past `[`.
    /// Returns the offset of the closing `]`, relative to `p`.
    fn parse_char_class(p: &[u8]) -> Option<usize> {
        let mut i = 0;
        if p.get(i) == Some(&b'^') {
            i += 1;
        }
        if p.get(i) == Some(&b']') {
            i += 1;
        }
        while i < p.len() && p[i] != b']' && p[i] != b'\n' {
            if p[i] == b'[' && matches!(p.get(i + 1), Some(b'.') | Some(b':') | Some(b'=')) {
                i += 1;
                let d = p[i];
                i += 1;
                let mut c = *p.get(i)?;
                loop {
                    if p.get(i) == Some(&b']') && c == d {
                        break;
                    }
                    c = *p.get(i)?;
                    if c == b'\n' {
                        return None;
                    }
                    i += 1;
                }
            }
            i += 1;
        }
        if p.get(i) == Some(&b']') {
            Some(i)
        } else {
            None
        }
    }

    /// extract_pattern - matches regex.c:84: copy a pattern out of the
    /// command cursor up to an unescaped `delimiter`.
    fn extract_pattern(cursor: &mut &[u8], delimiter: u8, isbinary: bool) -> Result<Vec<u8>, EdError> {
        let input = *cursor;
        let mut i = 0;
        while i < input.len() && input[i] != delimiter && input[i] != b'\n' {
            if input[i] == b'[' {
                let rel = Self::parse_char_class(&input[i + 1..]).ok_or(EdError::UnbalancedBrackets)?;
                i += 1 + rel + 1;
            } else if input[i] == b'\\' {
                i += 1;
                if i >= input.len() || input[i] == b'\n' {
                    return Err(EdError::TrailingBackslash);
                }
                i += 1;
            } else {
                i += 1;
            }
        }
        let mut pat = input[..i].to_vec();
        *cursor = &input[i..];
        if isbinary {
            translit(&mut pat, 0, b'\n');
        }
        Ok(pat)
    }

    /// Translate a POSIX basic regular expression to the syntax the
    /// `regex` crate accepts. ed's BRE dialect is the default; `-E` or
    /// `extended_regexp()` selects POSIX ERE, which the crate already
    /// understands almost verbatim.
    fn translate_bre(pat: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(pat.len());
        let mut i = 0;
        while i < pat.len() {
            match pat[i] {
                b'\\' if i + 1 < pat.len() && matches!(pat[i + 1], b'(' | b')' | b'{' | b'}' | b'|' | b'+' | b'?') => {
                    out.push(pat[i + 1]);
                    i += 2;
                }
                b'(' | b')' | b'{' | b'}' | b'|' | b'+' | b'?' => {
                    out.push(b'\\');
                    out.push(pat[i]);
                    i += 1;
                }
                _ => {
                    out.push(pat[i]);
                    i += 1;
                }
            }
        }
        out
    }

    /// compile_regex - matches regex.c:115
    fn compile(pat: &[u8], ignore_case: bool, extended: bool) -> Result<Regex, EdError> {
        let translated = if extended { pat.to_vec() } else { Self::translate_bre(pat) };
        RegexBuilder::new(&String::from_utf8_lossy(&translated))
            .case_insensitive(ignore_case)
            .build()
            .map_err(|e| EdError::InvalidRegex(e.to_string()))
    }

    /// get_compiled_regex - matches regex.c:109. Returns a clone of the
    /// cached last pattern on an empty RE (`//`); compiles and caches a new
    /// one otherwise. `test_delimiter` requires the closing delimiter to be
    /// present (used by the `s` command, not by addressing).
    fn get_compiled_regex(
        &mut self,
        cursor: &mut &[u8],
        test_delimiter: bool,
        isbinary: bool,
        extended: bool,
    ) -> Result<Regex, EdError> {
        let delimiter = *cursor.first().ok_or(EdError::InvalidPatternDelimiter)?;
        if delimiter == b' ' {
            return Err(EdError::InvalidPatternDelimiter);
        }
        if delimiter == b'\n' {
            return self.last.clone().ok_or(EdError::NoPreviousPattern);
        }
        *cursor = &cursor[1..];
        let empty_re = cursor.first() == Some(&delimiter) || (cursor.first() == Some(&b'\n') && !test_delimiter) || cursor.is_empty();
        if empty_re {
            return self.last.clone().ok_or(EdError::NoPreviousPattern);
        }
        let pat = Self::extract_pattern(cursor, delimiter, isbinary)?;
        if test_delimiter && cursor.first() != Some(&delimiter) {
            return Err(EdError::MissingPatternDelimiter);
        }
        let exp = Self::compile(&pat, false, extended)?;
        self.last = Some(exp.clone());
        Ok(exp)
    }

    /// get_pattern_for_s - matches main_loop.c:465: extract (but do not yet
    /// compile) the `s` command's search pattern. Compiling is deferred
    /// because the `i`/`I` case-sensitivity suffix is parsed afterward, once
    /// the replacement template (which needs the same delimiter) is out of
    /// the way. Returns the delimiter and the raw pattern bytes; an empty
    /// pattern means "reuse the last compiled one".
    pub fn extract_search_pattern(&mut self, cursor: &mut &[u8], isbinary: bool) -> Result<(u8, Vec<u8>), EdError> {
        let delimiter = *cursor.first().ok_or(EdError::InvalidPatternDelimiter)?;
        if delimiter == b' ' || delimiter == b'\n' {
            return Err(EdError::InvalidPatternDelimiter);
        }
        *cursor = &cursor[1..];
        if cursor.first() == Some(&delimiter) || cursor.is_empty() {
            return Ok((delimiter, Vec::new()));
        }
        let pat = Self::extract_pattern(cursor, delimiter, isbinary)?;
        Ok((delimiter, pat))
    }

    /// set_subst_regex - matches regex.c:144: compile (or, if `pat` is
    /// empty, reuse) the pattern returned by [`Self::extract_search_pattern`]
    /// as the new substitution regex.
    pub fn set_subst_regex(&mut self, pat: &[u8], ignore_case: bool, extended: bool) -> Result<(), EdError> {
        let _guard = InterruptGuard::new();
        let exp = if pat.is_empty() {
            self.last.clone().ok_or(EdError::NoPreviousPattern)?
        } else {
            let exp = Self::compile(pat, ignore_case, extended)?;
            self.last = Some(exp.clone());
            exp
        };
        self.subst = Some(exp);
        Ok(())
    }

    /// Re-point the substitution regex at the most recently used *search*
    /// pattern, for the `s` command's `r` suffix.
    pub fn replace_subst_re_by_search_re(&mut self) -> Result<(), EdError> {
        self.subst = Some(self.last.clone().ok_or(EdError::NoPreviousPattern)?);
        Ok(())
    }

    /// build_active_list - matches regex.c:161: mark every line in
    /// `[first_addr, second_addr]` whose match status equals `match_` as
    /// active for an upcoming `g`/`v` pass.
    pub fn build_active_list(
        &mut self,
        buffer: &mut EdBuffer,
        cursor: &mut &[u8],
        first_addr: usize,
        second_addr: usize,
        match_: bool,
        isbinary: bool,
        extended: bool,
    ) -> Result<(), EdError> {
        let delimiter = *cursor.first().ok_or(EdError::InvalidPatternDelimiter)?;
        if delimiter == b' ' || delimiter == b'\n' {
            return Err(EdError::InvalidPatternDelimiter);
        }
        let exp = self.get_compiled_regex(cursor, false, isbinary, extended)?;
        if cursor.first() == Some(&delimiter) {
            *cursor = &cursor[1..];
        }
        buffer.clear_active_list();
        for addr in first_addr..=second_addr {
            let mut line = buffer.get_sbuf_line(addr)?.to_vec();
            if isbinary {
                translit(&mut line, 0, b'\n');
            }
            if exp.is_match(&line) == match_ {
                buffer.set_active_by_addr(addr);
            }
        }
        Ok(())
    }

    /// next_matching_node_addr - matches regex.c:190: search forward or
    /// backward from the current address, wrapping around the buffer.
    pub fn next_matching_addr(
        &mut self,
        buffer: &mut EdBuffer,
        cursor: &mut &[u8],
        forward: bool,
        isbinary: bool,
        extended: bool,
    ) -> Result<usize, EdError> {
        let exp = self.get_compiled_regex(cursor, false, isbinary, extended)?;
        let start = buffer.current_addr();
        let mut addr = start;
        loop {
            addr = if forward { buffer.inc_addr(addr) } else { buffer.dec_addr(addr) };
            if addr != 0 {
                let mut line = buffer.get_sbuf_line(addr)?.to_vec();
                if isbinary {
                    translit(&mut line, 0, b'\n');
                }
                if exp.is_match(&line) {
                    return Ok(addr);
                }
            }
            if addr == start {
                return Err(EdError::NoMatch);
            }
        }
    }

    /// extract_replacement - matches regex.c:215: read the `s` command's
    /// replacement template, honouring the bare `%` ("repeat last
    /// replacement") shorthand and, outside a `g`-command list, the
    /// trailing-backslash line-continuation form.
    pub fn extract_replacement(&mut self, cursor: &mut &[u8], isglobal: bool) -> Result<(), EdError> {
        let delimiter = *cursor.first().ok_or(EdError::MissingPatternDelimiter)?;
        if delimiter == b'\n' {
            return Err(EdError::MissingPatternDelimiter);
        }
        *cursor = &cursor[1..];
        if cursor.first() == Some(&b'%') {
            let next = cursor.get(1).copied();
            if next == Some(delimiter) || (next == Some(b'\n') && (!isglobal || cursor.len() == 2)) {
                *cursor = &cursor[1..];
                if self.rbuf.is_empty() {
                    return Err(EdError::NoPreviousSubstitution);
                }
                return Ok(());
            }
        }
        let mut buf = Vec::new();
        while cursor.first() != Some(&delimiter) {
            match cursor.first() {
                None => break,
                Some(b'\n') if !isglobal || cursor.len() == 1 => break,
                Some(&b) => {
                    buf.push(b);
                    *cursor = &cursor[1..];
                    if b == b'\\' {
                        if let Some(&nb) = cursor.first() {
                            buf.push(nb);
                            *cursor = &cursor[1..];
                        }
                    }
                }
            }
        }
        let _guard = InterruptGuard::new();
        self.rbuf = buf;
        Ok(())
    }

    /// replace_matched_text - matches regex.c:260: expand `&` and `\1`-`\9`
    /// back-references from the replacement template against one match.
    fn replace_matched_text(&self, txt: &[u8], caps: &Captures) -> Vec<u8> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < self.rbuf.len() {
            if self.rbuf[i] == b'&' {
                if let Some(m) = caps.get(0) {
                    out.extend_from_slice(&txt[m.start()..m.end()]);
                }
                i += 1;
            } else if self.rbuf[i] == b'\\' && i + 1 < self.rbuf.len() && self.rbuf[i + 1].is_ascii_digit() && self.rbuf[i + 1] != b'0' {
                let n = (self.rbuf[i + 1] - b'0') as usize;
                if let Some(m) = caps.get(n) {
                    out.extend_from_slice(&txt[m.start()..m.end()]);
                }
                i += 2;
            } else {
                out.push(self.rbuf[i]);
                i += 1;
            }
        }
        out
    }

    /// line_replace - matches regex.c:297: replace either the `snum`th
    /// match or all matches (`snum <= 0`) in one line's text. Returns the
    /// new line text, or `None` if nothing changed. A zero-width match
    /// under `g` forces one byte of progress to guarantee termination,
    /// matching the "infinite substitution loop" guard in the original.
    fn line_replace(&self, txt: &[u8], snum: i32) -> Result<Option<Vec<u8>>, EdError> {
        let exp = self.subst.as_ref().ok_or(EdError::NoPreviousSubstitution)?;
        let global = snum <= 0;
        let mut out = Vec::new();
        let mut changed = false;
        let mut matchno = 0;
        let mut rest = txt;
        let mut saw_empty_match = false;
        while let Some(caps) = exp.captures(rest) {
            let m0 = caps.get(0).unwrap();
            matchno += 1;
            if global || snum == matchno {
                changed = true;
                out.extend_from_slice(&rest[..m0.start()]);
                out.extend_from_slice(&self.replace_matched_text(rest, &caps));
            } else {
                out.extend_from_slice(&rest[..m0.end()]);
            }
            let was_empty = m0.start() == m0.end();
            rest = &rest[m0.end()..];
            if global && was_empty {
                if saw_empty_match {
                    return Err(EdError::InfiniteSubstitutionLoop);
                }
                saw_empty_match = true;
                if let Some((&b, tail)) = rest.split_first() {
                    out.push(b);
                    rest = tail;
                }
            } else {
                saw_empty_match = false;
            }
            if rest.is_empty() || (!global && changed) {
                break;
            }
        }
        out.extend_from_slice(rest);
        if changed {
            Ok(Some(out))
        } else {
            Ok(None)
        }
    }

    /// search_and_replace - matches regex.c:352: apply [`line_replace`] to
    /// every line in the range, splicing changed lines back in through the
    /// buffer's normal delete+append path so undo sees ordinary atoms.
    pub fn search_and_replace(
        &mut self,
        buffer: &mut EdBuffer,
        first_addr: usize,
        second_addr: usize,
        snum: i32,
        isglobal: bool,
    ) -> Result<bool, EdError> {
        let mut match_found = false;
        let mut addr = first_addr;
        let count = second_addr + 1 - first_addr;
        for _ in 0..count {
            let mut txt = buffer.get_sbuf_line(addr)?.to_vec();
            if buffer.isbinary() {
                translit(&mut txt, 0, b'\n');
            }
            if let Some(new_text) = self.line_replace(&txt, snum)? {
                let mut pieces = split_lines(&new_text);
                if buffer.isbinary() {
                    for piece in pieces.iter_mut() {
                        translit(piece, b'\n', 0);
                    }
                }
                let _guard = InterruptGuard::new();
                buffer.delete_lines(addr, addr, isglobal)?;
                let insert_after = buffer.current_addr();
                buffer.append_lines(&pieces, insert_after)?;
                addr = buffer.current_addr();
                match_found = true;
            }
            addr += 1;
        }
        if !match_found && !isglobal {
            return Err(EdError::NoMatch);
        }
        Ok(match_found)
    }
}

/// translit_text - matches regex.c:43, used for binary-mode NUL<->newline
/// remapping since the scratch file uses `\n` as the line terminator.
fn translit(s: &mut [u8], from: u8, to: u8) {
    for b in s.iter_mut() {
        if *b == from {
            *b = to;
        }
    }
}

/// Split replacement output on embedded newlines into the one-line-per-node
/// pieces the scratch buffer expects; a replacement template containing a
/// literal newline produces more than one resulting line, same as ed.
fn split_lines(text: &[u8]) -> Vec<Vec<u8>> {
    text.split(|&b| b == b'\n').map(|s| s.to_vec()).collect()
}
