// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! The textual output formats of the assembler.
//!
//! The object file starts with the code and data image sizes, then lists
//! one memory word per line as a 7-digit decimal address and a 6-digit
//! lowercase hexadecimal word, the code image first, a blank line, then
//! the data image with addresses continuing from the end of the code.
//! The externals and entries files list `NAME ADDRESS` records. None of
//! the files ends with a trailing newline.

use std::io::{self, Write};

use w24_types::{format_address, LOAD_ADDRESS};

use crate::image::{ExternalsLog, WordImage};
use crate::symbol_table::SymbolTable;

/// Writes the `.ob` object file content.
pub fn write_object(out: &mut dyn Write, code: &WordImage, data: &WordImage) -> io::Result<()> {
    write!(out, "{} {}", code.len(), data.len())?;
    let mut address = LOAD_ADDRESS;
    for word in code.words() {
        write!(out, "\n{} {}", format_address(address), word.to_hex())?;
        address += 1;
    }
    // the blank separator line only makes sense when a data section
    // follows; without one it would leave a trailing newline
    if !data.is_empty() {
        writeln!(out)?;
        for word in data.words() {
            write!(out, "\n{} {}", format_address(address), word.to_hex())?;
            address += 1;
        }
    }
    Ok(())
}

/// Writes the `.ext` externals file content: one record per external
/// reference, in the order the second pass recorded them.
pub fn write_externals(out: &mut dyn Write, externals: &ExternalsLog) -> io::Result<()> {
    for (index, reference) in externals.refs().iter().enumerate() {
        if index > 0 {
            writeln!(out)?;
        }
        write!(out, "{} {}", reference.name, format_address(reference.address))?;
    }
    Ok(())
}

/// Writes the `.ent` entries file content: one record per entry symbol,
/// in symbol insertion order.
pub fn write_entries(out: &mut dyn Write, symbols: &SymbolTable) -> io::Result<()> {
    let mut first = true;
    for (name, symbol) in symbols.entry_symbols() {
        if !first {
            writeln!(out)?;
        }
        write!(out, "{} {}", name, format_address(symbol.address()))?;
        first = false;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use w24_types::{data_word, operand_word, Word};

    use crate::symbol_table::Symbol;

    use super::*;

    fn render<F>(write: F) -> String
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()>,
    {
        let mut buffer = Vec::new();
        write(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_object_file_layout() {
        let mut code = WordImage::new();
        code.push(Word::from_bits(0x001b04));
        code.push(operand_word(5));
        code.push(Word::from_bits(0x3c0004));
        let mut data = WordImage::new();
        data.push(data_word(7));
        data.push(data_word(-1));

        let text = render(|out| write_object(out, &code, &data));
        assert_eq!(
            text,
            "3 2\n\
             0000100 001b04\n\
             0000101 00002c\n\
             0000102 3c0004\n\
             \n\
             0000103 000007\n\
             0000104 ffffff"
        );
    }

    #[test]
    fn test_object_file_without_data() {
        let mut code = WordImage::new();
        code.push(Word::from_bits(0x3c0004));
        let data = WordImage::new();

        let text = render(|out| write_object(out, &code, &data));
        assert_eq!(text, "1 0\n0000100 3c0004");
    }

    #[test]
    fn test_externals_file() {
        let mut externals = ExternalsLog::new();
        externals.record("EXT", 101);
        externals.record("EXT", 105);

        let text = render(|out| write_externals(out, &externals));
        assert_eq!(text, "EXT 0000101\nEXT 0000105");
    }

    #[test]
    fn test_entries_file() {
        let mut symbols = SymbolTable::new();
        symbols.insert("K", Symbol::new(101, false, true)).unwrap();
        symbols.insert("M", Symbol::new(100, false, false)).unwrap();
        symbols.lookup_mut("K").unwrap().is_entry = true;
        symbols.lookup_mut("M").unwrap().is_entry = true;

        let text = render(|out| write_entries(out, &symbols));
        assert_eq!(text, "K 0000101\nM 0000100");
    }
}
