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

//! Signal handling and terminal geometry.
//!
//! Real signal handlers may only touch `std::sync::atomic` state (the only
//! thing POSIX guarantees is async-signal-safe from a Rust `extern "C"`
//! handler); the actual work a signal implies (dumping the buffer to
//! `ed.hup`, unwinding to the prompt) happens cooperatively on the main
//! thread, driven by [`InterruptGuard`] and [`poll_pending`]. This is the
//! same disable/enable counter discipline as the original editor, translated
//! so nothing unsafe runs inside the handler itself.

use std::env;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

use crate::error::EdError;

static MUTEX: AtomicI32 = AtomicI32::new(0);
static USER_LINES: AtomicI32 = AtomicI32::new(-1);
static WINDOW_LINES: AtomicI32 = AtomicI32::new(22);
static WINDOW_COLUMNS: AtomicI32 = AtomicI32::new(76);

static SIGHUP_PENDING: AtomicBool = AtomicBool::new(false);
static SIGINT_PENDING: AtomicBool = AtomicBool::new(false);
static SIGWINCH_PENDING: AtomicBool = AtomicBool::new(false);

/// Outcome of draining pending signals at a safe point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingSignal {
    /// `SIGHUP` arrived: caller must dump the buffer and exit.
    Hup,
    /// `SIGINT` arrived: caller must abort the current command and reprompt.
    Int,
}

extern "C" fn sighup_handler(_: i32) {
    SIGHUP_PENDING.store(true, Ordering::SeqCst);
}

extern "C" fn sigint_handler(_: i32) {
    SIGINT_PENDING.store(true, Ordering::SeqCst);
}

extern "C" fn sigwinch_handler(_: i32) {
    SIGWINCH_PENDING.store(true, Ordering::SeqCst);
}

/// Install handlers for `SIGHUP`, `SIGINT`, `SIGWINCH`, and ignore `SIGQUIT`
/// the way the original editor does. Matches `set_signals` / `signal.c`.
pub fn set_signals() {
    unsafe {
        let flags = SaFlags::empty();
        let _ = signal::sigaction(
            Signal::SIGHUP,
            &SigAction::new(SigHandler::Handler(sighup_handler), flags, SigSet::empty()),
        );
        let _ = signal::sigaction(
            Signal::SIGINT,
            &SigAction::new(SigHandler::Handler(sigint_handler), flags, SigSet::empty()),
        );
        let _ = signal::sigaction(
            Signal::SIGWINCH,
            &SigAction::new(SigHandler::Handler(sigwinch_handler), flags, SigSet::empty()),
        );
        let _ = signal::sigaction(
            Signal::SIGPIPE,
            &SigAction::new(SigHandler::SigIgn, flags, SigSet::empty()),
        );
        let _ = signal::sigaction(
            Signal::SIGQUIT,
            &SigAction::new(SigHandler::SigIgn, flags, SigSet::empty()),
        );
    }
}

/// RAII guard matching `disable_interrupts`/`enable_interrupts`. Structural
/// mutations of the line list, undo stack, and address cache must hold one
/// of these for their duration.
pub struct InterruptGuard;

impl InterruptGuard {
    pub fn new() -> Self {
        disable_interrupts();
        InterruptGuard
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        enable_interrupts();
    }
}

pub fn disable_interrupts() {
    MUTEX.fetch_add(1, Ordering::SeqCst);
}

/// Decrements the nesting counter; once it reaches zero, pending signals
/// become visible to [`poll_pending`].
pub fn enable_interrupts() {
    MUTEX.fetch_sub(1, Ordering::SeqCst);
}

/// True while any code holds the critical section open.
fn interrupts_disabled() -> bool {
    MUTEX.load(Ordering::SeqCst) > 0
}

/// Drain pending signals at a point where acting on them is safe (top of
/// the command loop, after a blocking read). Returns the highest-priority
/// pending signal, if any, clearing its flag. `SIGWINCH` is handled inline
/// here since it only needs to refresh window geometry.
pub fn poll_pending() -> Option<PendingSignal> {
    if interrupts_disabled() {
        return None;
    }
    if SIGWINCH_PENDING.swap(false, Ordering::SeqCst) {
        refresh_window_size();
    }
    if SIGHUP_PENDING.swap(false, Ordering::SeqCst) {
        return Some(PendingSignal::Hup);
    }
    if SIGINT_PENDING.swap(false, Ordering::SeqCst) {
        return Some(PendingSignal::Int);
    }
    None
}

/// Read the current terminal size via `TIOCGWINSZ` and update the cached
/// window geometry, applying the same sanity bounds as `sigwinch_handler`.
pub fn refresh_window_size() {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws) };
    if rc == 0 {
        if ws.ws_row > 2 && ws.ws_row < 600 {
            WINDOW_LINES.store(ws.ws_row as i32 - 2, Ordering::SeqCst);
        }
        if ws.ws_col > 8 && ws.ws_col < 1800 {
            WINDOW_COLUMNS.store(ws.ws_col as i32 - 4, Ordering::SeqCst);
        }
    }
}

pub fn home_directory() -> Option<String> {
    env::var("HOME").ok().filter(|s| !s.is_empty())
}

pub fn set_window_lines(lines: i32) {
    USER_LINES.store(lines, Ordering::SeqCst);
}

pub fn window_columns() -> i32 {
    WINDOW_COLUMNS.load(Ordering::SeqCst)
}

pub fn window_lines() -> i32 {
    let mut user_lines = USER_LINES.load(Ordering::SeqCst);
    if user_lines < 0 {
        user_lines = env::var("LINES")
            .ok()
            .and_then(|s| s.parse::<i32>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(0);
        USER_LINES.store(user_lines, Ordering::SeqCst);
    }
    if user_lines > 0 {
        user_lines
    } else {
        WINDOW_LINES.load(Ordering::SeqCst)
    }
}

/// Grow `buf` to hold at least `min_size` bytes, the way `resize_buffer`
/// grows the editor's reusable static buffers, refusing sizes that would
/// not fit in a GNU-ed-compatible line length.
pub fn resize_buffer(buf: &mut Vec<u8>, min_size: usize) -> Result<(), EdError> {
    if min_size >= i32::MAX as usize {
        return Err(EdError::LineTooLong);
    }
    if buf.capacity() < min_size {
        buf.reserve(min_size - buf.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // The module under test is all process-global statics (signal flags,
    // the interrupt nesting counter, cached window geometry); serialize
    // the tests that touch them so they don't see each other's stores.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    fn clear_pending() {
        SIGHUP_PENDING.store(false, Ordering::SeqCst);
        SIGINT_PENDING.store(false, Ordering::SeqCst);
        SIGWINCH_PENDING.store(false, Ordering::SeqCst);
        MUTEX.store(0, Ordering::SeqCst);
    }

    #[test]
    fn poll_pending_reports_hup_and_clears_its_flag() {
        let _guard = TEST_LOCK.lock().unwrap();
        clear_pending();
        SIGHUP_PENDING.store(true, Ordering::SeqCst);
        assert_eq!(poll_pending(), Some(PendingSignal::Hup));
        assert_eq!(poll_pending(), None);
    }

    #[test]
    fn poll_pending_prefers_hup_over_int() {
        let _guard = TEST_LOCK.lock().unwrap();
        clear_pending();
        SIGHUP_PENDING.store(true, Ordering::SeqCst);
        SIGINT_PENDING.store(true, Ordering::SeqCst);
        assert_eq!(poll_pending(), Some(PendingSignal::Hup));
        // the int flag is still pending; a later poll reports it
        assert_eq!(poll_pending(), Some(PendingSignal::Int));
    }

    #[test]
    fn poll_pending_is_suppressed_while_interrupts_are_disabled() {
        let _guard = TEST_LOCK.lock().unwrap();
        clear_pending();
        disable_interrupts();
        SIGINT_PENDING.store(true, Ordering::SeqCst);
        assert_eq!(poll_pending(), None);
        enable_interrupts();
        assert_eq!(poll_pending(), Some(PendingSignal::Int));
    }

    #[test]
    fn interrupt_guard_nests_and_only_enables_once_all_drop() {
        let _guard = TEST_LOCK.lock().unwrap();
        clear_pending();
        let outer = InterruptGuard::new();
        assert!(interrupts_disabled());
        {
            let _inner = InterruptGuard::new();
            assert!(interrupts_disabled());
        }
        // inner dropped, but outer still holds the section open
        assert!(interrupts_disabled());
        drop(outer);
        assert!(!interrupts_disabled());
    }

    #[test]
    fn set_window_lines_overrides_the_cached_terminal_height() {
        let _guard = TEST_LOCK.lock().unwrap();
        USER_LINES.store(-1, Ordering::SeqCst);
        set_window_lines(40);
        assert_eq!(window_lines(), 40);
        USER_LINES.store(-1, Ordering::SeqCst);
    }

    #[test]
    fn window_lines_falls_back_to_cached_geometry_when_unset() {
        let _guard = TEST_LOCK.lock().unwrap();
        USER_LINES.store(-1, Ordering::SeqCst);
        std::env::remove_var("LINES");
        WINDOW_LINES.store(22, Ordering::SeqCst);
        assert_eq!(window_lines(), 22);
        USER_LINES.store(-1, Ordering::SeqCst);
    }

    #[test]
    fn resize_buffer_grows_capacity_and_rejects_absurd_sizes() {
        let mut buf = Vec::new();
        resize_buffer(&mut buf, 128).unwrap();
        assert!(buf.capacity() >= 128);
        assert!(resize_buffer(&mut buf, i32::MAX as usize).is_err());
    }

    #[test]
    fn home_directory_reads_the_home_env_var() {
        let _guard = TEST_LOCK.lock().unwrap();
        let prior = env::var("HOME").ok();
        env::set_var("HOME", "/home/tester");
        assert_eq!(home_directory(), Some("/home/tester".to_string()));
        env::set_var("HOME", "");
        assert_eq!(home_directory(), None);
        match prior {
            Some(v) => env::set_var("HOME", v),
            None => env::remove_var("HOME"),
        }
    }
}
