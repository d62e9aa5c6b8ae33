// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! The per-file diagnostics reporter and the fatal (technical) error type.
//!
//! The reporter is created for a single source file and dropped when the
//! file is finished; it carries the file name, writes every message to
//! the diagnostics sink immediately, and keeps a sticky error flag. Once
//! the flag is set the passes keep running to collect further messages,
//! but they stop updating the images and no output files are produced.

use std::error::Error;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;

use w24_parser::Lexer;

/// Collects and prints the errors and warnings found in one source file.
pub struct Reporter<'a> {
    file_name: String,
    sink: &'a mut dyn Write,
    errored: bool,
}

impl<'a> Reporter<'a> {
    pub fn new(file_name: &str, sink: &'a mut dyn Write) -> Reporter<'a> {
        Reporter {
            file_name: file_name.to_owned(),
            sink,
            errored: false,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Reports an error and sets the sticky error status.
    pub fn error(&mut self, line: usize, message: &str) {
        self.errored = true;
        let _ = writeln!(
            self.sink,
            "ERROR - w24 assembly source '{}', line {}: {}",
            self.file_name, line, message
        );
    }

    /// Reports a warning. Warnings do not affect the error status.
    pub fn warning(&mut self, line: usize, message: &str) {
        let _ = writeln!(
            self.sink,
            "WARNING - w24 assembly source '{}', line {}: {}",
            self.file_name, line, message
        );
    }

    /// Sets the sticky error status without printing anything. The second
    /// pass uses this when it re-detects a syntax error that the first
    /// pass already reported.
    pub fn mark_error(&mut self) {
        self.errored = true;
    }

    pub fn has_errors(&self) -> bool {
        self.errored
    }
}

/// Checks that a statement line has no further tokens. A leftover token
/// is reported as an error built from `context`, naming the token where
/// the extraneous text starts. Returns true if the line ended properly.
pub fn expect_line_end(
    reporter: &mut Reporter,
    line: usize,
    lexer: &mut Lexer,
    context: &str,
) -> bool {
    match lexer.next_token() {
        None => true,
        Some(token) => {
            reporter.error(
                line,
                &format!("{} (starting at the '{}' token).", context, token.text()),
            );
            false
        }
    }
}

/// An unrecoverable technical failure: the assembler cannot continue and
/// the process terminates with a distinct exit code per kind. Assembly
/// errors in the source are never fatal; they go through [`Reporter`].
#[derive(Debug)]
pub enum FatalError {
    /// Opening, reading or closing a file failed.
    File { path: PathBuf, source: io::Error },
    /// Writing an output file failed.
    Write { path: PathBuf, source: io::Error },
}

impl FatalError {
    pub fn exit_code(&self) -> u8 {
        match self {
            FatalError::File { .. } => 2,
            FatalError::Write { .. } => 3,
        }
    }
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::File { path, source } => {
                write!(f, "cannot access file \"{}\": {}", path.display(), source)
            }
            FatalError::Write { path, source } => {
                write!(f, "cannot write to file \"{}\": {}", path.display(), source)
            }
        }
    }
}

impl Error for FatalError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FatalError::File { source, .. } | FatalError::Write { source, .. } => Some(source),
        }
    }
}
