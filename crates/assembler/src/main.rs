// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::process::ExitCode;

use clap::Parser;

use w24_assembler::process_file;

/// Two-pass assembler for the w24 24-bit word machine.
///
/// Each BASE argument names an assembly source file BASE.as. A clean
/// source produces BASE.ob, plus BASE.ext when external symbols are
/// referenced and BASE.ent when entry symbols are declared. Assembly
/// errors are printed to standard error and suppress the output files
/// of that source; they do not stop the remaining files.
#[derive(Parser)]
#[command(name = "w24-as", version)]
struct Args {
    /// Base names of the assembly source files, without the ".as" suffix.
    bases: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    if args.bases.is_empty() {
        eprintln!(
            "w24-as: expected at least one assembly source file name (without the \".as\" suffix)."
        );
        return ExitCode::SUCCESS;
    }

    for base in &args.bases {
        if let Err(fatal) = process_file(base) {
            eprintln!(
                "w24-as: a technical error occurred while running the assembler: {}",
                fatal
            );
            return ExitCode::from(fatal.exit_code());
        }
    }
    ExitCode::SUCCESS
}
