// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! The second pass of the assembler.
//!
//! The first pass left a zero placeholder in the code image for every
//! operand that relies on a symbol. Now that the symbol table is
//! complete (and data symbols are relocated), this pass re-reads the
//! source, walks the code image with a cursor, and fills those slots:
//!
//! - a directly addressed symbol is replaced by its replacement word,
//!   and each appearance of an external symbol is recorded together with
//!   the address of the slot that refers to it;
//! - a relatively addressed symbol becomes the signed distance from the
//!   instruction's first word to the symbol, as an absolute payload.
//!
//! `.entry` statements are processed here as well, marking symbols for
//! the entries file. `.data`, `.string` and `.extern` were completed in
//! the first pass and are stepped over, as are lines the first pass
//! rejected; the pass still resolves symbols on clean lines of a
//! poisoned file so that the diagnostics are as complete as possible,
//! but it stops touching the code image once an error is known.

use w24_parser::{
    source::{LineContent, LineReader},
    Lexer, Token,
};
use w24_types::{
    directive_kind, find_instruction, operand_word, register_index, Directive, Word, LOAD_ADDRESS,
};

use crate::diagnostics::{expect_line_end, Reporter};
use crate::image::{ExternalsLog, WordImage};
use crate::symbol_table::SymbolTable;

/// Runs the second pass over `source`, completing `code`, recording
/// external references in `externals` and marking entry symbols in
/// `symbols`.
pub fn run(
    source: &str,
    code: &mut WordImage,
    symbols: &mut SymbolTable,
    externals: &mut ExternalsLog,
    reporter: &mut Reporter,
) {
    let mut pass = SecondPass {
        code,
        symbols,
        externals,
        reporter,
        cursor: 0,
        counter: LOAD_ADDRESS,
    };
    for input in LineReader::new(source) {
        match input.content {
            // already reported by the first pass
            LineContent::TooLong => {}
            LineContent::Text(text) => pass.process_line(input.number, text),
        }
    }
}

struct SecondPass<'a, 'w> {
    code: &'a mut WordImage,
    symbols: &'a mut SymbolTable,
    externals: &'a mut ExternalsLog,
    reporter: &'a mut Reporter<'w>,
    /// Index of the next unprocessed word in the code image.
    cursor: usize,
    /// The instruction counter: the code address the cursor stands at.
    counter: u32,
}

impl SecondPass<'_, '_> {
    fn emitting(&self) -> bool {
        !self.reporter.has_errors() && self.cursor < self.code.len()
    }

    fn process_line(&mut self, line: usize, text: &str) {
        if text.starts_with(';') {
            return;
        }
        let mut lexer = Lexer::new(text);
        let first = match lexer.next_token() {
            None => return,
            Some(token) => token,
        };

        let (has_label, keyword) = match first {
            Token::Word(word) if word.ends_with(':') => match lexer.next_token() {
                // a label on an empty line; warned about in the first pass
                None => return,
                Some(token) => (true, token),
            },
            token => (false, token),
        };

        let keyword = keyword.text();
        if let Some(directive_name) = keyword.strip_prefix('.') {
            if directive_kind(directive_name) == Some(Directive::Entry) {
                if has_label {
                    self.reporter.warning(
                        line,
                        "A symbol declaration was encountered in an \".entry\" statement - it is ignored.",
                    );
                }
                self.process_entry(line, &mut lexer);
            }
            // every other guidance statement was fully processed in the
            // first pass
        } else if find_instruction(keyword).is_some() {
            self.process_instruction(line, &mut lexer);
        } else {
            // an unknown keyword (or a stray comma); the first pass
            // already printed the error
            self.reporter.mark_error();
        }
    }

    fn process_entry(&mut self, line: usize, lexer: &mut Lexer) {
        let token = match lexer.next_token() {
            None => {
                self.reporter
                    .error(line, "A symbol name was expected in an \".entry\" statement.");
                return;
            }
            Some(token) => token,
        };
        let name = token.text();
        match self.symbols.lookup_mut(name) {
            None => {
                self.reporter.error(
                    line,
                    &format!("Unknown symbol \"{}\" was found in an \".entry\" statement.", name),
                );
                return;
            }
            Some(symbol) if symbol.is_extern => {
                self.reporter.error(
                    line,
                    &format!(
                        "An \".entry\" statement expects an internal symbol. The symbol \"{}\" is external.",
                        name
                    ),
                );
                return;
            }
            Some(symbol) => symbol.is_entry = true,
        }
        expect_line_end(
            self.reporter,
            line,
            lexer,
            "An \".entry\" statement expects a single parameter - extraneous text at the end of it was encountered",
        );
    }

    fn process_instruction(&mut self, line: usize, lexer: &mut Lexer) {
        // the distance of a relative operand is measured from the first
        // word of the instruction
        let head_address = self.counter;
        // the head word itself was fully encoded in the first pass
        self.skip_slot();

        // The first pass validated the operand list; a deviation found
        // here only re-confirms an already-reported error, so the status
        // is set silently and the line is abandoned.
        let mut first_operand = true;
        loop {
            let token = match lexer.next_token() {
                None => {
                    if !first_operand {
                        // a separating comma with no operand after it
                        self.reporter.mark_error();
                    }
                    return;
                }
                Some(token) => token,
            };
            let word = match token {
                Token::Comma => {
                    self.reporter.mark_error();
                    return;
                }
                Token::Word(word) => word,
            };
            if !self.process_operand(line, word, head_address) {
                return;
            }
            match lexer.next_token() {
                None => return,
                Some(Token::Comma) => {}
                Some(_) => {
                    self.reporter.mark_error();
                    return;
                }
            }
            first_operand = false;
        }
    }

    /// Resolves one operand against the code image. Returns false if the
    /// operand names a symbol that cannot be used, which abandons the
    /// line.
    fn process_operand(&mut self, line: usize, text: &str, head_address: u32) -> bool {
        if text.starts_with('#') {
            // the immediate word was emitted by the first pass
            self.skip_slot();
            return true;
        }
        if register_index(text).is_some() {
            // registers live in the head word and take no slot
            return true;
        }
        if let Some(name) = text.strip_prefix('&') {
            return self.resolve_relative(line, name, head_address);
        }
        self.resolve_direct(line, text)
    }

    fn resolve_relative(&mut self, line: usize, name: &str, head_address: u32) -> bool {
        let target = match self.symbols.lookup(name) {
            None => {
                self.reporter.error(
                    line,
                    &format!(
                        "Unknown symbol named \"{}\" was found after a '&' character, using the relative operand addressing method.",
                        name
                    ),
                );
                return false;
            }
            Some(symbol) => {
                if symbol.is_extern {
                    self.reporter.error(
                        line,
                        &format!(
                            "External symbol \"{}\" was found after a '&' character, using the relative operand addressing method. The relative addressing method can be applied to internal symbols only.",
                            name
                        ),
                    );
                    return false;
                }
                symbol.address()
            }
        };
        let distance = target as i64 - head_address as i64;
        self.fill_slot(operand_word(distance));
        true
    }

    fn resolve_direct(&mut self, line: usize, name: &str) -> bool {
        let symbol = match self.symbols.lookup(name) {
            None => {
                self.reporter.error(
                    line,
                    &format!(
                        "Unknown symbol named \"{}\" was found using the direct operand addressing method.",
                        name
                    ),
                );
                return false;
            }
            Some(symbol) => *symbol,
        };
        if self.emitting() && symbol.is_extern {
            // one record per textual appearance, at the address of the
            // slot that holds the reference
            self.externals.record(name, self.counter);
        }
        self.fill_slot(symbol.rep_word);
        true
    }

    /// Advances past a code word that the first pass already completed.
    fn skip_slot(&mut self) {
        if self.emitting() {
            self.cursor += 1;
            self.counter += 1;
        }
    }

    /// Writes `word` into the slot under the cursor and advances.
    fn fill_slot(&mut self, word: Word) {
        if self.emitting() {
            self.code.set(self.cursor, word);
            self.cursor += 1;
            self.counter += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use w24_types::{Are, Field};

    use crate::first_pass;

    use super::*;

    struct PassResult {
        symbols: SymbolTable,
        code: WordImage,
        data: WordImage,
        externals: ExternalsLog,
        errored: bool,
        diagnostics: String,
    }

    fn run_both_passes(source: &str) -> PassResult {
        let mut symbols = SymbolTable::new();
        let mut code = WordImage::new();
        let mut data = WordImage::new();
        let mut externals = ExternalsLog::new();
        let mut sink = Vec::new();
        let errored = {
            let mut reporter = Reporter::new("test.as", &mut sink);
            first_pass::run(source, &mut symbols, &mut code, &mut data, &mut reporter);
            run(source, &mut code, &mut symbols, &mut externals, &mut reporter);
            reporter.has_errors()
        };
        PassResult {
            symbols,
            code,
            data,
            externals,
            errored,
            diagnostics: String::from_utf8(sink).unwrap(),
        }
    }

    #[test]
    fn test_direct_reference_to_relocated_data_symbol() {
        let result = run_both_passes("      mov X, r0\n      stop\nX:    .data 7, -1\n");
        assert!(!result.errored, "{}", result.diagnostics);

        // X lives at data offset 0, relocated to 3 + 100 = 103; the slot
        // after the mov head holds X's replacement word with ARE=R
        let slot = result.code.get(1).unwrap();
        assert_eq!(slot.address(), 103);
        assert_eq!(slot.field(Field::ARE), Are::Relocatable.bits());
        assert_eq!(slot.to_hex(), "00033a");
        assert_eq!(result.data.len(), 2);
        assert!(result.externals.is_empty());
    }

    #[test]
    fn test_external_reference_is_recorded() {
        let result = run_both_passes("      .extern EXT\n      jmp EXT\n      stop\n");
        assert!(!result.errored, "{}", result.diagnostics);

        // the slot after the jmp head at 100 holds the reference
        let recorded: Vec<(&str, u32)> = result
            .externals
            .refs()
            .iter()
            .map(|r| (r.name.as_str(), r.address))
            .collect();
        assert_eq!(recorded, vec![("EXT", 101)]);

        // the slot itself encodes address 0 with ARE=E
        let slot = result.code.get(1).unwrap();
        assert_eq!(slot.bits(), 0b001);
        assert!(!result.symbols.has_entries());
    }

    #[test]
    fn test_every_external_appearance_is_recorded() {
        let result =
            run_both_passes(".extern EXT\njmp EXT\nmov EXT, r1\nstop\n");
        assert!(!result.errored, "{}", result.diagnostics);
        let addresses: Vec<u32> = result.externals.refs().iter().map(|r| r.address).collect();
        // jmp head at 100 (slot 101), mov head at 102 (slot 103)
        assert_eq!(addresses, vec![101, 103]);
    }

    #[test]
    fn test_relative_addressing_distance() {
        let result = run_both_passes("LOOP: inc r1\n      bne &LOOP\n      stop\n");
        assert!(!result.errored, "{}", result.diagnostics);

        // inc at 100, bne head at 101, its operand slot at 102, stop at
        // 103; distance = 100 - 101 = -1
        assert_eq!(result.code.len(), 4);
        let slot = result.code.get(2).unwrap();
        assert_eq!(slot.bits(), operand_word(-1).bits());
        assert_eq!(slot.to_hex(), "fffffc");
        // relative references are never logged as externals
        assert!(result.externals.is_empty());
    }

    #[test]
    fn test_forward_relative_distance_is_positive() {
        let result = run_both_passes("jmp &END\nEND: stop\n");
        assert!(!result.errored, "{}", result.diagnostics);
        // jmp head at 100, END at 102, distance = 2
        assert_eq!(result.code.get(1).unwrap().bits(), operand_word(2).bits());
    }

    #[test]
    fn test_entry_marking_after_definition() {
        let result = run_both_passes("      .entry K\nK:    .data 1\n      stop\n");
        assert!(!result.errored, "{}", result.diagnostics);

        // the code image is one word, so K relocates to 1 + 100
        let k = result.symbols.lookup("K").unwrap();
        assert!(k.is_entry);
        assert!(k.is_data);
        assert_eq!(k.address(), 101);
        assert!(result.symbols.has_entries());
    }

    #[test]
    fn test_entry_on_unknown_symbol() {
        let result = run_both_passes(".entry NOWHERE\nstop\n");
        assert!(result.errored);
        assert!(result
            .diagnostics
            .contains("Unknown symbol \"NOWHERE\" was found in an \".entry\" statement."));
    }

    #[test]
    fn test_entry_on_external_symbol() {
        let result = run_both_passes(".extern EXT\n.entry EXT\nstop\n");
        assert!(result.errored);
        assert!(result.diagnostics.contains(
            "An \".entry\" statement expects an internal symbol. The symbol \"EXT\" is external."
        ));
        assert!(!result.symbols.has_entries());
    }

    #[test]
    fn test_entry_with_label_warns_and_ignores_it() {
        let result = run_both_passes("L: .entry K\nK: stop\n");
        assert!(!result.errored, "{}", result.diagnostics);
        assert!(result.symbols.lookup("L").is_none());
        assert!(result.symbols.lookup("K").unwrap().is_entry);
        assert!(result
            .diagnostics
            .contains("A symbol declaration was encountered in an \".entry\" statement"));
    }

    #[test]
    fn test_unknown_direct_symbol() {
        let result = run_both_passes("jmp NOWHERE\nstop\n");
        assert!(result.errored);
        assert!(result.diagnostics.contains(
            "Unknown symbol named \"NOWHERE\" was found using the direct operand addressing method."
        ));
    }

    #[test]
    fn test_relative_addressing_rejects_externals() {
        let result = run_both_passes(".extern EXT\nbne &EXT\nstop\n");
        assert!(result.errored);
        assert!(result.diagnostics.contains(
            "The relative addressing method can be applied to internal symbols only."
        ));
        assert!(result.externals.is_empty());
    }

    #[test]
    fn test_poisoned_file_still_collects_pass_two_diagnostics() {
        // line 1 fails in the first pass; line 2's unknown symbol is
        // still reported by the second pass
        let result = run_both_passes("mov #5\njmp NOWHERE\n");
        assert!(result.errored);
        assert!(result
            .diagnostics
            .contains("The instruction expects 2 operands."));
        assert!(result
            .diagnostics
            .contains("Unknown symbol named \"NOWHERE\""));
        // nothing was emitted at all
        assert_eq!(result.code.len(), 0);
        assert!(result.externals.is_empty());
    }

    #[test]
    fn test_determinism() {
        let source = "MAIN: mov #5, r3\n.extern EXT\njmp EXT\nstop\n";
        let first = run_both_passes(source);
        let second = run_both_passes(source);
        assert_eq!(first.code.words(), second.code.words());
        assert_eq!(first.externals.refs(), second.externals.refs());
        assert_eq!(first.diagnostics, second.diagnostics);
    }
}
