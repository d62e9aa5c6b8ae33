// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! The w24 two-pass assembler.
//!
//! [`assemble_source`] turns one assembly source text into the machine
//! images, and [`process_file`] wraps it for the command line: it reads
//! `BASE.as` and, when the source is clean, writes `BASE.ob`, plus
//! `BASE.ext` when external symbols are referenced and `BASE.ent` when
//! entry symbols are declared. When errors are found, the diagnostics
//! go to standard error and no output files are produced; only
//! technical failures (I/O) are returned as [`FatalError`].

pub mod diagnostics;
pub mod first_pass;
pub mod image;
pub mod output;
pub mod second_pass;
pub mod symbol_table;

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::diagnostics::{FatalError, Reporter};
use crate::image::{ExternalsLog, WordImage};
use crate::symbol_table::SymbolTable;

/// Everything the two passes collect about one source file.
pub struct Program {
    pub code: WordImage,
    pub data: WordImage,
    pub symbols: SymbolTable,
    pub externals: ExternalsLog,
}

/// Runs both passes over `source`. The reporter carries the outcome:
/// when [`Reporter::has_errors`] is set afterwards, the images are
/// incomplete and must not be serialized.
pub fn assemble_source(source: &str, reporter: &mut Reporter) -> Program {
    let mut symbols = SymbolTable::new();
    let mut code = WordImage::new();
    let mut data = WordImage::new();
    first_pass::run(source, &mut symbols, &mut code, &mut data, reporter);
    debug!(
        "'{}': first pass done - {} code words, {} data words",
        reporter.file_name(),
        code.len(),
        data.len()
    );

    let mut externals = ExternalsLog::new();
    second_pass::run(source, &mut code, &mut symbols, &mut externals, reporter);
    debug!(
        "'{}': second pass done - {} external references",
        reporter.file_name(),
        externals.refs().len()
    );

    Program {
        code,
        data,
        symbols,
        externals,
    }
}

/// Processes the source file `BASE.as` for the base name `base` and
/// produces its output files next to it. Returns whether output files
/// were written (assembly errors suppress them without being fatal).
pub fn process_file(base: &str) -> Result<bool, FatalError> {
    let source_path = PathBuf::from(format!("{}.as", base));
    let source = fs::read_to_string(&source_path).map_err(|error| FatalError::File {
        path: source_path.clone(),
        source: error,
    })?;

    let mut stderr = io::stderr();
    let file_name = source_path.display().to_string();
    let mut reporter = Reporter::new(&file_name, &mut stderr);
    let program = assemble_source(&source, &mut reporter);
    let clean = !reporter.has_errors();
    drop(reporter);

    if !clean {
        eprintln!(
            "w24-as: errors were found in assembly source file \"{}\" - no output files were produced.",
            file_name
        );
        return Ok(false);
    }

    write_output_files(base, &program)?;
    Ok(true)
}

fn write_output_files(base: &str, program: &Program) -> Result<(), FatalError> {
    let object_path = PathBuf::from(format!("{}.ob", base));
    write_file(&object_path, |out| {
        output::write_object(out, &program.code, &program.data)
    })?;
    debug!("wrote object file {}", object_path.display());

    if !program.externals.is_empty() {
        let ext_path = PathBuf::from(format!("{}.ext", base));
        write_file(&ext_path, |out| {
            output::write_externals(out, &program.externals)
        })?;
        debug!("wrote externals file {}", ext_path.display());
    }

    if program.symbols.has_entries() {
        let ent_path = PathBuf::from(format!("{}.ent", base));
        write_file(&ent_path, |out| {
            output::write_entries(out, &program.symbols)
        })?;
        debug!("wrote entries file {}", ent_path.display());
    }

    Ok(())
}

fn write_file<F>(path: &Path, write: F) -> Result<(), FatalError>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let file = fs::File::create(path).map_err(|error| FatalError::File {
        path: path.to_owned(),
        source: error,
    })?;
    let mut out = BufWriter::new(file);
    write(&mut out)
        .and_then(|_| out.flush())
        .map_err(|error| FatalError::Write {
            path: path.to_owned(),
            source: error,
        })
}
