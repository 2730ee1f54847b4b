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

//! Error taxonomy for the editor core. Every fallible operation returns
//! `Result<T, EdError>`; `Quit` and `BufferModified` are used as soft
//! control-flow signals rather than hard failures.

#[derive(Debug, thiserror::Error)]
pub enum EdError {
    #[error("Invalid address")]
    InvalidAddress,

    #[error("Invalid command suffix")]
    InvalidCommandSuffix,

    #[error("Unknown command")]
    UnknownCommand,

    #[error("Unexpected address")]
    UnexpectedAddress,

    #[error("Unexpected command suffix")]
    UnexpectedCommandSuffix,

    #[error("No previous pattern")]
    NoPreviousPattern,

    #[error("No previous substitution")]
    NoPreviousSubstitution,

    #[error("No previous command")]
    NoPreviousCommand,

    #[error("No current filename")]
    NoCurrentFilename,

    #[error("Invalid pattern delimiter")]
    InvalidPatternDelimiter,

    #[error("Missing pattern delimiter")]
    MissingPatternDelimiter,

    #[error("Unbalanced brackets ([])")]
    UnbalancedBrackets,

    #[error("Trailing backslash (\\)")]
    TrailingBackslash,

    #[error("Invalid regular expression: {0}")]
    InvalidRegex(String),

    #[error("No match")]
    NoMatch,

    #[error("Infinite substitution loop")]
    InfiniteSubstitutionLoop,

    #[error("Cannot nest global commands")]
    CannotNestGlobalCommands,

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to put")]
    NothingToPut,

    #[error("Invalid destination")]
    InvalidDestination,

    #[error("Invalid mark character")]
    InvalidMarkChar,

    #[error("Invalid redirection")]
    InvalidRedirection,

    #[error("Filename too long")]
    FilenameTooLong,

    #[error("Is a directory")]
    IsADirectory,

    #[error("Shell access restricted")]
    ShellAccessRestricted,

    #[error("Directory access restricted")]
    DirectoryAccessRestricted,

    #[error("Unsafe filename character")]
    UnsafeFilenameChar,

    #[error("Line too long")]
    LineTooLong,

    #[error("Memory exhausted")]
    OutOfMemory,

    #[error("{0}")]
    IoError(String),

    #[error("Interrupt")]
    Interrupt,

    #[error("Warning: buffer modified")]
    BufferModified,

    #[error("")]
    Quit,

    #[error("{0}")]
    Fatal(String),
}

impl EdError {
    /// Exit status this error would produce if it terminated the process,
    /// absent `--loose-exit-status`.
    pub fn exit_code(&self) -> i32 {
        match self {
            EdError::Quit => 0,
            EdError::Fatal(_) => 1,
            EdError::IoError(_) | EdError::FilenameTooLong | EdError::IsADirectory => 2,
            EdError::OutOfMemory => 3,
            _ => 1,
        }
    }

    /// True for the soft "refuse once" statuses that do not count as a
    /// hard command failure on their own.
    pub fn is_soft(&self) -> bool {
        matches!(self, EdError::BufferModified | EdError::Quit)
    }
}
