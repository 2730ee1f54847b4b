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

//! Scratch-file buffer: a circular doubly-linked list of line nodes, stored
//! as an arena of indices rather than pointers, with line text paged to a
//! temp file in `(pos, len)` ranges. Matches `buffer.c`.

use std::io::{Read, Seek, SeekFrom, Write};

use tempfile::tempfile;

use crate::error::EdError;
use crate::signal::InterruptGuard;

/// Index of the sentinel representing address 0 in the main line list.
const BUFFER_HEAD: usize = 0;
/// Index of the sentinel heading the yank (cut) buffer's own list.
const YANK_HEAD: usize = 1;

#[derive(Debug, Clone, Copy)]
struct LineNode {
    forw: usize,
    back: usize,
    pos: u64,
    len: usize,
    /// Global-command ("g"/"v"/"G"/"V") active-set membership, stored
    /// directly on the node instead of a separate process-wide set.
    active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UndoKind {
    Add = 0,
    Del = 1,
    Mov = 2,
    VMov = 3,
}

impl UndoKind {
    fn flip(self) -> UndoKind {
        match self {
            UndoKind::Add => UndoKind::Del,
            UndoKind::Del => UndoKind::Add,
            UndoKind::Mov => UndoKind::VMov,
            UndoKind::VMov => UndoKind::Mov,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct UndoAtom {
    kind: UndoKind,
    head: usize,
    tail: usize,
}

pub struct EdBuffer {
    nodes: Vec<LineNode>,
    free_list: Vec<usize>,

    current_addr_: usize,
    last_addr_: usize,
    isbinary_: bool,
    newline_added_: bool,
    modified_: u8,

    pub filename: Option<String>,
    marks: [Option<usize>; 26],
    markno: usize,

    scratch: std::fs::File,
    sfpos: i64,
    seek_write: bool,
    read_buf: Vec<u8>,

    ustack: Vec<UndoAtom>,
    u_current_addr: i64,
    u_last_addr: i64,
    u_modified: bool,

    cache_node: usize,
    cache_addr: i64,

    active_queue: std::collections::VecDeque<usize>,
}

impl EdBuffer {
    /// init_buffers - matches buffer.c:284
    pub fn new() -> Result<Self, EdError> {
        let scratch = tempfile().map_err(|e| EdError::IoError(format!("Cannot open temp file: {e}")))?;
        let head = LineNode { forw: BUFFER_HEAD, back: BUFFER_HEAD, pos: 0, len: 0, active: false };
        let yank_head = LineNode { forw: YANK_HEAD, back: YANK_HEAD, pos: 0, len: 0, active: false };
        Ok(Self {
            nodes: vec![head, yank_head],
            free_list: Vec::new(),
            current_addr_: 0,
            last_addr_: 0,
            isbinary_: false,
            newline_added_: false,
            modified_: 0,
            filename: None,
            marks: [None; 26],
            markno: 0,
            scratch,
            sfpos: 0,
            seek_write: false,
            read_buf: Vec::new(),
            ustack: Vec::new(),
            u_current_addr: -1,
            u_last_addr: -1,
            u_modified: false,
            cache_node: BUFFER_HEAD,
            cache_addr: 0,
            active_queue: std::collections::VecDeque::new(),
        })
    }

    // -- simple accessors, matching buffer.c's one-liners --------------

    pub fn current_addr(&self) -> usize {
        self.current_addr_
    }

    pub fn inc_current_addr(&mut self) -> usize {
        self.current_addr_ += 1;
        if self.current_addr_ > self.last_addr_ {
            self.current_addr_ = self.last_addr_;
        }
        self.current_addr_
    }

    pub fn set_current_addr(&mut self, addr: usize) {
        self.current_addr_ = addr;
    }

    pub fn last_addr(&self) -> usize {
        self.last_addr_
    }

    pub fn isbinary(&self) -> bool {
        self.isbinary_
    }

    pub fn set_binary(&mut self) {
        self.isbinary_ = true;
    }

    pub fn newline_added(&self) -> bool {
        self.newline_added_
    }

    pub fn set_newline_added(&mut self) {
        self.newline_added_ = true;
    }

    pub fn modified(&self) -> bool {
        (self.modified_ & 1) != 0
    }

    pub fn set_modified(&mut self, b: bool) {
        self.modified_ = (self.modified_ & !1) | (b as u8);
    }

    pub fn warned(&self) -> bool {
        (self.modified_ & 2) != 0
    }

    pub fn set_warned(&mut self, b: bool) {
        if b {
            self.modified_ |= 2;
        } else {
            self.modified_ &= !2;
        }
    }

    /// inc_addr - matches buffer.c:63 (wraps past `$` to 0)
    pub fn inc_addr(&self, addr: usize) -> usize {
        if addr + 1 > self.last_addr_ {
            0
        } else {
            addr + 1
        }
    }

    /// dec_addr - matches buffer.c:66
    pub fn dec_addr(&self, addr: usize) -> usize {
        if addr == 0 {
            self.last_addr_
        } else {
            addr - 1
        }
    }

    // -- arena/list primitives ------------------------------------------

    fn link_nodes(&mut self, prev: usize, next: usize) {
        self.nodes[prev].forw = next;
        self.nodes[next].back = prev;
    }

    fn insert_node(&mut self, node: usize, prev: usize) {
        let next = self.nodes[prev].forw;
        self.link_nodes(node, next);
        self.link_nodes(prev, node);
    }

    fn alloc_node(&mut self, pos: u64, len: usize) -> usize {
        let node = LineNode { forw: 0, back: 0, pos, len, active: false };
        if let Some(idx) = self.free_list.pop() {
            self.nodes[idx] = node;
            idx
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn free_node(&mut self, idx: usize) {
        self.unmark_line_node_by_index(idx);
        self.free_list.push(idx);
    }

    /// add_line_node - matches buffer.c:89
    fn add_line_node(&mut self, lp: usize, addr: usize) {
        let p = self.search_line_node(addr);
        self.insert_node(lp, p);
        self.last_addr_ += 1;
    }

    /// search_line_node - matches buffer.c:468, the nearest-of-cache/head/tail heuristic
    fn search_line_node(&mut self, addr: usize) -> usize {
        let addr = addr as i64;
        if self.cache_addr < addr {
            if self.cache_addr + self.last_addr_ as i64 >= 2 * addr {
                while self.cache_addr < addr {
                    self.cache_addr += 1;
                    self.cache_node = self.nodes[self.cache_node].forw;
                }
            } else {
                self.cache_node = self.nodes[BUFFER_HEAD].back;
                self.cache_addr = self.last_addr_ as i64;
                while self.cache_addr > addr {
                    self.cache_addr -= 1;
                    self.cache_node = self.nodes[self.cache_node].back;
                }
            }
        } else if self.cache_addr <= 2 * addr {
            while self.cache_addr > addr {
                self.cache_addr -= 1;
                self.cache_node = self.nodes[self.cache_node].back;
            }
        } else {
            self.cache_node = BUFFER_HEAD;
            self.cache_addr = 0;
            while self.cache_addr < addr {
                self.cache_addr += 1;
                self.cache_node = self.nodes[self.cache_node].forw;
            }
        }
        self.cache_node
    }

    /// get_line_node_addr - matches buffer.c:236
    fn get_line_node_addr(&self, lp: usize) -> Option<usize> {
        let mut cp = BUFFER_HEAD;
        let mut addr = 0;
        while cp != lp {
            cp = self.nodes[cp].forw;
            if cp == BUFFER_HEAD {
                return None;
            }
            addr += 1;
        }
        Some(addr)
    }

    /// put_sbuf_line - matches buffer.c:428: append text (no trailing
    /// newline) to the scratch file and splice a new node in after `addr`.
    pub fn put_sbuf_line(&mut self, text: &[u8], addr: usize) -> Result<(), EdError> {
        if text.len() >= i32::MAX as usize {
            return Err(EdError::LineTooLong);
        }
        if self.seek_write {
            let end = self
                .scratch
                .seek(SeekFrom::End(0))
                .map_err(|e| EdError::IoError(format!("Cannot seek temp file: {e}")))?;
            self.sfpos = end as i64;
            self.seek_write = false;
        }
        self.scratch
            .write_all(text)
            .map_err(|e| EdError::IoError(format!("Cannot write temp file: {e}")))?;
        let pos = self.sfpos as u64;
        let lp = self.alloc_node(pos, text.len());
        self.add_line_node(lp, addr);
        self.current_addr_ += 1;
        self.sfpos += text.len() as i64;
        Ok(())
    }

    /// get_sbuf_line - matches buffer.c:249: read a line's text back out of
    /// the scratch file into the reusable `read_buf`.
    pub fn get_sbuf_line(&mut self, lp_addr: usize) -> Result<&[u8], EdError> {
        let lp = self.search_line_node(lp_addr);
        self.get_sbuf_line_at(lp)
    }

    fn get_sbuf_line_at(&mut self, lp: usize) -> Result<&[u8], EdError> {
        if lp == BUFFER_HEAD {
            return Ok(&[]);
        }
        let node = self.nodes[lp];
        self.seek_write = true;
        if self.sfpos != node.pos as i64 {
            self.scratch
                .seek(SeekFrom::Start(node.pos))
                .map_err(|e| EdError::IoError(format!("Cannot seek temp file: {e}")))?;
            self.sfpos = node.pos as i64;
        }
        self.read_buf.resize(node.len, 0);
        self.scratch
            .read_exact(&mut self.read_buf)
            .map_err(|e| EdError::IoError(format!("Cannot read temp file: {e}")))?;
        self.sfpos += node.len as i64;
        Ok(&self.read_buf)
    }

    /// Text of the line at 1-based address `addr`, or `None` for address 0.
    pub fn line_text(&mut self, addr: usize) -> Result<Option<Vec<u8>>, EdError> {
        if addr == 0 {
            return Ok(None);
        }
        Ok(Some(self.get_sbuf_line(addr)?.to_vec()))
    }

    pub fn line_len(&mut self, addr: usize) -> usize {
        let lp = self.search_line_node(addr);
        self.nodes[lp].len
    }

    // -- line-count guard ------------------------------------------------

    fn too_many_lines(&self) -> bool {
        self.nodes.len() >= i32::MAX as usize - 2
    }

    // -- append / insert ---------------------------------------------------

    /// append_lines - matches buffer.c:114. `lines` are pre-split, each
    /// without a trailing newline. Consolidates one ADD atom over the run.
    pub fn append_lines(&mut self, lines: &[Vec<u8>], addr: usize) -> Result<(), EdError> {
        self.current_addr_ = addr;
        let mut up: Option<usize> = None;
        for line in lines {
            if self.too_many_lines() {
                return Err(EdError::OutOfMemory);
            }
            let _guard = InterruptGuard::new();
            self.put_sbuf_line(line, self.current_addr_)?;
            let tail = self.search_line_node(self.current_addr_);
            if let Some(idx) = up {
                self.ustack[idx].tail = tail;
            } else {
                let idx = self.push_undo_atom(UndoKind::Add, None, None)?;
                up = Some(idx);
            }
            self.modified_ |= 1;
        }
        Ok(())
    }

    // -- copy / delete / move / join --------------------------------------

    /// copy_lines - matches buffer.c:184
    pub fn copy_lines(&mut self, first_addr: usize, second_addr: usize, addr: usize) -> Result<(), EdError> {
        let mut n = second_addr - first_addr + 1;
        let mut m = 0usize;
        self.current_addr_ = addr;
        if addr >= first_addr && addr < second_addr {
            n = addr - first_addr + 1;
            m = second_addr - addr;
        }
        let mut np = self.search_line_node(first_addr);
        let mut up: Option<usize> = None;
        loop {
            for _ in 0..n {
                let _guard = InterruptGuard::new();
                let src = self.nodes[np];
                if self.too_many_lines() {
                    return Err(EdError::OutOfMemory);
                }
                let lp = self.alloc_node(src.pos, src.len);
                self.add_line_node(lp, self.current_addr_);
                self.current_addr_ += 1;
                if let Some(idx) = up {
                    self.ustack[idx].tail = lp;
                } else {
                    let idx = self.push_undo_atom(UndoKind::Add, None, None)?;
                    up = Some(idx);
                }
                self.modified_ |= 1;
                np = self.nodes[np].forw;
            }
            if m > 0 {
                n = m;
                m = 0;
                np = self.search_line_node(self.current_addr_ + 1);
            } else {
                break;
            }
        }
        Ok(())
    }

    /// delete_lines - matches buffer.c:215: yanks the range first, then
    /// performs a single splice and pushes one DEL atom for it.
    pub fn delete_lines(&mut self, from: usize, to: usize, isglobal: bool) -> Result<(), EdError> {
        self.yank_lines(from, to)?;
        let _guard = InterruptGuard::new();
        self.push_undo_atom(UndoKind::Del, Some(from), Some(to))?;
        let n = self.search_line_node(self.inc_addr(to));
        let p = self.search_line_node(from.saturating_sub(1));
        if isglobal {
            self.unset_active_range(self.nodes[p].forw, n);
        }
        self.link_nodes(p, n);
        self.last_addr_ -= to - from + 1;
        self.current_addr_ = from.saturating_sub(1);
        self.modified_ |= 1;
        Ok(())
    }

    /// join_lines - matches buffer.c:301
    pub fn join_lines(&mut self, from: usize, to: usize, isglobal: bool) -> Result<(), EdError> {
        let ep = self.search_line_node(self.inc_addr(to));
        let mut bp = self.search_line_node(from);
        let mut joined = Vec::new();
        while bp != ep {
            let len = self.nodes[bp].len;
            let text = self.get_sbuf_line_at(bp)?.to_vec();
            debug_assert_eq!(text.len(), len);
            joined.extend_from_slice(&text);
            bp = self.nodes[bp].forw;
        }
        joined.push(b'\n');
        self.delete_lines(from, to, isglobal)?;
        self.current_addr_ = from.saturating_sub(1);
        let _guard = InterruptGuard::new();
        let body = &joined[..joined.len() - 1];
        self.put_sbuf_line(body, self.current_addr_)?;
        self.push_undo_atom(UndoKind::Add, None, None)?;
        self.modified_ |= 1;
        Ok(())
    }

    /// move_lines - matches buffer.c:331: three splices relocate the range;
    /// a no-op destination (just before or just after the range) is handled
    /// as a pure current-address update with no undo atom.
    pub fn move_lines(&mut self, first_addr: usize, second_addr: usize, addr: usize, isglobal: bool) -> Result<(), EdError> {
        let _guard = InterruptGuard::new();
        let n = self.inc_addr(second_addr);
        let p = first_addr.saturating_sub(1);
        let (b2, a2);
        if addr == first_addr.saturating_sub(1) || addr == second_addr {
            a2 = self.search_line_node(n);
            b2 = self.search_line_node(p);
            self.current_addr_ = second_addr;
        } else {
            self.push_undo_atom(UndoKind::Mov, Some(p), Some(n))?;
            let inc_addr = self.inc_addr(addr);
            self.push_undo_atom(UndoKind::Mov, Some(addr), Some(inc_addr))?;
            let a1 = self.search_line_node(n);
            let b1;
            if addr < first_addr {
                b1 = self.search_line_node(p);
                b2 = self.search_line_node(addr);
            } else {
                b2 = self.search_line_node(addr);
                b1 = self.search_line_node(p);
            }
            a2 = self.nodes[b2].forw;
            self.link_nodes(b2, self.nodes[b1].forw);
            self.link_nodes(self.nodes[a1].back, a2);
            self.link_nodes(b1, a1);
            self.current_addr_ = addr + if addr < first_addr { second_addr - first_addr + 1 } else { 0 };
        }
        if isglobal {
            self.unset_active_range(self.nodes[b2].forw, a2);
        }
        self.modified_ |= 1;
        Ok(())
    }

    // -- yank / put --------------------------------------------------------

    fn clear_yank_buffer(&mut self) {
        let _guard = InterruptGuard::new();
        let mut lp = self.nodes[YANK_HEAD].forw;
        while lp != YANK_HEAD {
            let next = self.nodes[lp].forw;
            self.free_node(lp);
            lp = next;
        }
        self.nodes[YANK_HEAD] = LineNode { forw: YANK_HEAD, back: YANK_HEAD, pos: 0, len: 0, active: false };
    }

    /// yank_lines - matches buffer.c:495
    pub fn yank_lines(&mut self, from: usize, to: usize) -> Result<(), EdError> {
        let ep = self.search_line_node(self.inc_addr(to));
        let mut bp = self.search_line_node(from);
        self.clear_yank_buffer();
        let mut tail = YANK_HEAD;
        while bp != ep {
            let _guard = InterruptGuard::new();
            let src = self.nodes[bp];
            let cp = self.alloc_node(src.pos, src.len);
            self.insert_node(cp, tail);
            bp = self.nodes[bp].forw;
            tail = cp;
        }
        Ok(())
    }

    /// put_lines - matches buffer.c:403
    pub fn put_lines(&mut self, addr: usize) -> Result<(), EdError> {
        if self.nodes[YANK_HEAD].forw == YANK_HEAD {
            return Err(EdError::NothingToPut);
        }
        self.current_addr_ = addr;
        let mut lp = self.nodes[YANK_HEAD].forw;
        let mut up: Option<usize> = None;
        while lp != YANK_HEAD {
            let _guard = InterruptGuard::new();
            let src = self.nodes[lp];
            let cp = self.alloc_node(src.pos, src.len);
            self.add_line_node(cp, self.current_addr_);
            self.current_addr_ += 1;
            if let Some(idx) = up {
                self.ustack[idx].tail = cp;
            } else {
                let idx = self.push_undo_atom(UndoKind::Add, None, None)?;
                up = Some(idx);
            }
            self.modified_ |= 1;
            lp = self.nodes[lp].forw;
        }
        Ok(())
    }

    // -- undo engine ---------------------------------------------------------

    /// clear_undo_stack - matches buffer.c:524: frees only the nodes a DEL
    /// atom still holds (they were detached, never re-linked).
    pub fn clear_undo_stack(&mut self) {
        while let Some(atom) = self.ustack.pop() {
            if atom.kind == UndoKind::Del {
                let ep = self.nodes[atom.tail].forw;
                let mut lp = atom.head;
                while lp != ep {
                    let next = self.nodes[lp].forw;
                    self.free_node(lp);
                    lp = next;
                }
            }
        }
        self.u_current_addr = self.current_addr_ as i64;
        self.u_last_addr = self.last_addr_ as i64;
        self.u_modified = self.modified();
    }

    pub fn reset_undo_state(&mut self) {
        self.clear_undo_stack();
        self.u_current_addr = -1;
        self.u_last_addr = -1;
        self.u_modified = false;
    }

    /// push_undo_atom - matches buffer.c:555. `from`/`to` of `None` resolve
    /// to the current address, matching the C `-1` sentinel.
    fn push_undo_atom(&mut self, kind: UndoKind, from: Option<usize>, to: Option<usize>) -> Result<usize, EdError> {
        let tail_addr = to.unwrap_or(self.current_addr_);
        let head_addr = from.unwrap_or(self.current_addr_);
        let tail = self.search_line_node(tail_addr);
        let head = self.search_line_node(head_addr);
        self.ustack.push(UndoAtom { kind, head, tail });
        Ok(self.ustack.len() - 1)
    }

    /// undo - matches buffer.c:582: reverse-iterate the stack, re-splicing
    /// each atom's range, flip every atom's kind, and reverse stack order,
    /// so a second call to `undo` redoes the change.
    pub fn undo(&mut self, isglobal: bool) -> Result<(), EdError> {
        if self.ustack.is_empty() || self.u_current_addr < 0 || self.u_last_addr < 0 {
            return Err(EdError::NothingToUndo);
        }
        let o_current_addr = self.current_addr_;
        let o_last_addr = self.last_addr_;
        let o_modified = self.modified();

        self.search_line_node(0);
        let _guard = InterruptGuard::new();

        let mut n = self.ustack.len() as isize - 1;
        while n >= 0 {
            let idx = n as usize;
            match self.ustack[idx].kind {
                UndoKind::Add => {
                    let head_back = self.nodes[self.ustack[idx].head].back;
                    let tail_forw = self.nodes[self.ustack[idx].tail].forw;
                    self.link_nodes(head_back, tail_forw);
                }
                UndoKind::Del => {
                    let head = self.ustack[idx].head;
                    let tail = self.ustack[idx].tail;
                    let head_back = self.nodes[head].back;
                    let tail_forw = self.nodes[tail].forw;
                    self.link_nodes(head_back, head);
                    self.link_nodes(tail, tail_forw);
                }
                UndoKind::Mov | UndoKind::VMov => {
                    let prev = &self.ustack[idx - 1];
                    let (prev_head, prev_tail) = (prev.head, prev.tail);
                    let (head, tail) = (self.ustack[idx].head, self.ustack[idx].tail);
                    let head_forw = self.nodes[head].forw;
                    let tail_back = self.nodes[tail].back;
                    self.link_nodes(prev_head, head_forw);
                    self.link_nodes(tail_back, prev_tail);
                    self.link_nodes(head, tail);
                    n -= 1;
                }
            }
            self.ustack[idx].kind = self.ustack[idx].kind.flip();
            n -= 1;
        }

        self.ustack.reverse();
        if isglobal {
            self.clear_active_list();
        }

        self.current_addr_ = self.u_current_addr as usize;
        self.u_current_addr = o_current_addr as i64;
        self.last_addr_ = self.u_last_addr as usize;
        self.u_last_addr = o_last_addr as i64;
        self.set_modified(self.u_modified);
        self.u_modified = o_modified;
        Ok(())
    }

    // -- marks ---------------------------------------------------------------

    /// mark_line_node - matches main_loop.c:91
    pub fn mark_line_node(&mut self, addr: usize, c: char) -> Result<(), EdError> {
        let index = mark_index(c)?;
        if addr == 0 || addr > self.last_addr_ {
            return Err(EdError::InvalidAddress);
        }
        let lp = self.search_line_node(addr);
        if self.marks[index].is_none() {
            self.markno += 1;
        }
        self.marks[index] = Some(lp);
        Ok(())
    }

    fn unmark_line_node_by_index(&mut self, lp: usize) {
        for m in self.marks.iter_mut() {
            if *m == Some(lp) {
                *m = None;
                self.markno = self.markno.saturating_sub(1);
            }
        }
    }

    /// get_marked_node_addr - matches main_loop.c:111
    pub fn get_marked_node_addr(&mut self, c: char) -> Result<usize, EdError> {
        let index = mark_index(c)?;
        match self.marks[index] {
            Some(lp) => self.get_line_node_addr(lp).ok_or(EdError::InvalidAddress),
            None => Err(EdError::InvalidMarkChar),
        }
    }

    // -- active set (global commands) ----------------------------------------
    // Membership lives directly on the node (`LineNode::active`); `active_queue`
    // just remembers insertion order so `next_active_node` can drain it in
    // list order without rescanning the whole buffer. See global.rs for the
    // command-level driver built on top of these primitives.

    pub fn clear_active_list(&mut self) {
        for idx in self.active_queue.drain(..) {
            if idx < self.nodes.len() {
                self.nodes[idx].active = false;
            }
        }
    }

    fn unset_active_range(&mut self, from_node: usize, to_node_exclusive: usize) {
        let mut cp = from_node;
        while cp != to_node_exclusive {
            self.nodes[cp].active = false;
            cp = self.nodes[cp].forw;
        }
    }

    /// set_active_node - matches global.c
    pub fn set_active_by_addr(&mut self, addr: usize) -> bool {
        let lp = self.search_line_node(addr);
        if !self.nodes[lp].active {
            self.nodes[lp].active = true;
            self.active_queue.push_back(lp);
            true
        } else {
            false
        }
    }

    /// next_active_node - matches global.c: drains the queue, skipping any
    /// node whose active flag was cleared after being queued (e.g. by an
    /// intervening delete) and resolving survivors back to an address.
    pub fn next_active_addr(&mut self) -> Option<usize> {
        while let Some(lp) = self.active_queue.pop_front() {
            if self.nodes[lp].active {
                self.nodes[lp].active = false;
                return self.get_line_node_addr(lp);
            }
        }
        None
    }

    // -- lifecycle -------------------------------------------------------------

    /// close_sbuf - matches buffer.c:164
    pub fn close_sbuf(&mut self) {
        self.clear_yank_buffer();
        self.clear_undo_stack();
    }

    /// Replace the buffer's contents with a fresh, empty scratch file, the
    /// way `e`/`E` discard the previous session's buffer. Matches the effect
    /// of `open_sbuf` after `close_sbuf`.
    pub fn reset(&mut self) -> Result<(), EdError> {
        self.close_sbuf();
        self.active_queue.clear();
        self.nodes.clear();
        self.free_list.clear();
        self.nodes.push(LineNode { forw: BUFFER_HEAD, back: BUFFER_HEAD, pos: 0, len: 0, active: false });
        self.nodes.push(LineNode { forw: YANK_HEAD, back: YANK_HEAD, pos: 0, len: 0, active: false });
        self.scratch = tempfile().map_err(|e| EdError::IoError(format!("Cannot open temp file: {e}")))?;
        self.sfpos = 0;
        self.seek_write = false;
        self.isbinary_ = false;
        self.newline_added_ = false;
        self.current_addr_ = 0;
        self.last_addr_ = 0;
        self.modified_ = 0;
        self.marks = [None; 26];
        self.markno = 0;
        self.reset_undo_state();
        Ok(())
    }
}

fn mark_index(c: char) -> Result<usize, EdError> {
    if c.is_ascii_lowercase() {
        Ok((c as u8 - b'a') as usize)
    } else {
        Err(EdError::InvalidMarkChar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(lines: &[&str]) -> EdBuffer {
        let mut buffer = EdBuffer::new().unwrap();
        let owned: Vec<Vec<u8>> = lines.iter().map(|l| l.as_bytes().to_vec()).collect();
        buffer.append_lines(&owned, 0).unwrap();
        buffer
    }

    #[test]
    fn append_lines_grows_last_addr_and_moves_current() {
        let mut buffer = seeded(&["one"]);
        buffer.append_lines(&[b"two".to_vec(), b"three".to_vec()], 1).unwrap();
        assert_eq!(buffer.last_addr(), 3);
        assert_eq!(buffer.current_addr(), 3);
        assert_eq!(buffer.line_text(2).unwrap().unwrap(), b"two");
        assert_eq!(buffer.line_text(3).unwrap().unwrap(), b"three");
    }

    #[test]
    fn delete_lines_splices_the_range_out() {
        let mut buffer = seeded(&["a", "b", "c"]);
        buffer.delete_lines(2, 2, false).unwrap();
        assert_eq!(buffer.last_addr(), 2);
        assert_eq!(buffer.line_text(1).unwrap().unwrap(), b"a");
        assert_eq!(buffer.line_text(2).unwrap().unwrap(), b"c");
    }

    #[test]
    fn undo_reverses_a_delete_with_the_flipped_atom() {
        let mut buffer = seeded(&["a", "b", "c"]);
        buffer.delete_lines(1, 2, false).unwrap();
        assert_eq!(buffer.last_addr(), 1);
        buffer.undo(false).unwrap();
        assert_eq!(buffer.last_addr(), 3);
        assert_eq!(buffer.line_text(1).unwrap().unwrap(), b"a");
        assert_eq!(buffer.line_text(2).unwrap().unwrap(), b"b");
    }

    #[test]
    fn undo_reverses_an_append_by_deleting_it_again() {
        let mut buffer = seeded(&["a"]);
        buffer.append_lines(&[b"b".to_vec()], 1).unwrap();
        assert_eq!(buffer.last_addr(), 2);
        buffer.undo(false).unwrap();
        assert_eq!(buffer.last_addr(), 1);
        assert_eq!(buffer.line_text(1).unwrap().unwrap(), b"a");
    }

    #[test]
    fn move_lines_relocates_the_range_after_the_destination() {
        let mut buffer = seeded(&["a", "b", "c", "d"]);
        buffer.move_lines(1, 1, 3, false).unwrap();
        let text: Vec<Vec<u8>> = (1..=4).map(|a| buffer.line_text(a).unwrap().unwrap()).collect();
        assert_eq!(text, vec![b"b".to_vec(), b"c".to_vec(), b"a".to_vec(), b"d".to_vec()]);
    }

    #[test]
    fn copy_lines_duplicates_without_disturbing_the_source() {
        let mut buffer = seeded(&["a", "b"]);
        buffer.copy_lines(1, 1, 2).unwrap();
        assert_eq!(buffer.last_addr(), 3);
        assert_eq!(buffer.line_text(1).unwrap().unwrap(), b"a");
        assert_eq!(buffer.line_text(2).unwrap().unwrap(), b"b");
        assert_eq!(buffer.line_text(3).unwrap().unwrap(), b"a");
    }

    #[test]
    fn yank_then_put_duplicates_the_yanked_range() {
        let mut buffer = seeded(&["a", "b"]);
        buffer.yank_lines(1, 2).unwrap();
        buffer.put_lines(2).unwrap();
        assert_eq!(buffer.last_addr(), 4);
        assert_eq!(buffer.line_text(3).unwrap().unwrap(), b"a");
        assert_eq!(buffer.line_text(4).unwrap().unwrap(), b"b");
    }

    #[test]
    fn mark_and_lookup_round_trip_through_a_delete() {
        let mut buffer = seeded(&["a", "b", "c"]);
        buffer.mark_line_node(3, 'z').unwrap();
        buffer.delete_lines(1, 1, false).unwrap();
        assert_eq!(buffer.get_marked_node_addr('z').unwrap(), 2);
    }

    #[test]
    fn mark_rejects_non_lowercase_chars() {
        let mut buffer = seeded(&["a"]);
        let err = buffer.mark_line_node(1, '1').unwrap_err();
        assert!(matches!(err, EdError::InvalidMarkChar));
    }

    #[test]
    fn active_list_selects_only_marked_addresses() {
        let mut buffer = seeded(&["a", "b", "c"]);
        buffer.clear_active_list();
        buffer.set_active_by_addr(1);
        buffer.set_active_by_addr(3);
        let mut seen = Vec::new();
        while let Some(addr) = buffer.next_active_addr() {
            seen.push(addr);
        }
        assert_eq!(seen, vec![1, 3]);
    }

    #[test]
    fn reset_discards_lines_and_marks() {
        let mut buffer = seeded(&["a", "b"]);
        buffer.mark_line_node(1, 'x').unwrap();
        buffer.reset().unwrap();
        assert_eq!(buffer.last_addr(), 0);
        assert_eq!(buffer.current_addr(), 0);
        assert!(buffer.get_marked_node_addr('x').is_err());
    }
}
