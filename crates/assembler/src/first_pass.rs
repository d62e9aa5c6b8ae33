// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! The first pass of the assembler.
//!
//! The first pass validates the syntax of every statement, builds the
//! symbol table and the data image, and lays out the code image. The
//! first word of each instruction is fully encoded here; for an operand
//! that relies on a symbol (direct or relative addressing) only a zero
//! placeholder word is appended, because symbol addresses are not final
//! until the whole file has been read. The second pass fills those slots.
//!
//! The statement grammar, per line:
//!
//! ```text
//! line    := comment | blank | stmt
//! comment := ';' ...                   ;; only at the first column
//! stmt    := [symbol ':'] keyword args
//! keyword := instruction name | '.' guidance name
//! ```
//!
//! Operand lists take exactly one comma between operands; a leading,
//! trailing or doubled comma is an error with its own wording. Errors
//! are reported and the sticky error status is set, but scanning
//! continues so that one run surfaces as many diagnostics as possible.
//! After the first error the images are no longer updated.
//!
//! At the end of the pass every data symbol's address is shifted by the
//! final code size plus the load address, so that the data image follows
//! the code image in the unified address space.

use w24_parser::{
    literal::{self, IntegerError, StringError},
    source::{LineContent, LineReader},
    Lexer, Token,
};
use w24_types::{
    char_word, data_word, directive_kind, find_instruction, operand_word, register_index,
    validate_symbol_name, AddressingMode, Are, Directive, Field, Instruction, SymbolNameError,
    Word, LOAD_ADDRESS, MAX_LINE_LEN, MAX_SYMBOL_LEN,
};

use crate::diagnostics::{expect_line_end, Reporter};
use crate::image::WordImage;
use crate::symbol_table::{Symbol, SymbolTable};

/// Runs the first pass over `source`, filling `symbols`, `code` and
/// `data`, and reporting everything it finds through `reporter`. The
/// data-symbol relocation step runs at the end, so after this returns
/// the symbol table is ready for the second pass.
pub fn run(
    source: &str,
    symbols: &mut SymbolTable,
    code: &mut WordImage,
    data: &mut WordImage,
    reporter: &mut Reporter,
) {
    let mut pass = FirstPass {
        symbols,
        code,
        data,
        reporter,
    };
    for input in LineReader::new(source) {
        match input.content {
            LineContent::TooLong => pass.reporter.error(
                input.number,
                &format!(
                    "Line too long. An assembly line should be no longer than {} characters.",
                    MAX_LINE_LEN
                ),
            ),
            LineContent::Text(text) => pass.process_line(input.number, text),
        }
    }
    let delta = pass.code.len() as u32 + LOAD_ADDRESS;
    pass.symbols.relocate_data(delta);
}

/// An instruction operand as the first pass sees it. Operands that rely
/// on a symbol carry no payload here; their value is only known in the
/// second pass.
enum Operand {
    /// The fully encoded extra word of an immediate operand.
    Immediate(Word),
    Register(u8),
    Direct,
    Relative,
}

impl Operand {
    fn mode(&self) -> AddressingMode {
        match self {
            Operand::Immediate(_) => AddressingMode::Immediate,
            Operand::Register(_) => AddressingMode::DirectRegister,
            Operand::Direct => AddressingMode::Direct,
            Operand::Relative => AddressingMode::Relative,
        }
    }
}

struct FirstPass<'a, 'w> {
    symbols: &'a mut SymbolTable,
    code: &'a mut WordImage,
    data: &'a mut WordImage,
    reporter: &'a mut Reporter<'w>,
}

impl FirstPass<'_, '_> {
    /// True while no error has been found; once the status is poisoned
    /// the pass keeps parsing but stops growing the images.
    fn emitting(&self) -> bool {
        !self.reporter.has_errors()
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

        // a first token ending with ':' declares a symbol; the keyword
        // is then the next token
        let (label, keyword) = match first {
            Token::Word(word) if word.ends_with(':') => {
                let name = &word[..word.len() - 1];
                match lexer.next_token() {
                    None => {
                        self.reporter.warning(
                            line,
                            "A symbol declaration was encountered on an empty line - it is ignored.",
                        );
                        return;
                    }
                    Some(token) => (Some(name), token),
                }
            }
            token => (None, token),
        };

        let keyword = match keyword {
            Token::Comma => {
                let place = if label.is_some() {
                    "after a symbol declaration"
                } else {
                    "at the beginning of a statement"
                };
                self.reporter.error(
                    line,
                    &format!("An unexpected comma was encountered {}.", place),
                );
                return;
            }
            Token::Word(word) => word,
        };

        match keyword.strip_prefix('.') {
            Some(directive_name) => self.process_directive(line, directive_name, label, &mut lexer),
            None => self.process_instruction(line, keyword, label, &mut lexer),
        }
    }

    // ~~~ instruction statements ~~~

    fn process_instruction(
        &mut self,
        line: usize,
        name: &str,
        label: Option<&str>,
        lexer: &mut Lexer,
    ) {
        if let Some(symbol_name) = label {
            let address = self.code.len() as u32 + LOAD_ADDRESS;
            if !self.declare_symbol(line, symbol_name, address, false, false) {
                return;
            }
        }

        let instruction = match find_instruction(name) {
            None => {
                self.reporter
                    .error(line, &format!("Unknown instruction name \"{}\".", name));
                return;
            }
            Some(instruction) => instruction,
        };

        let (src, dest) = match self.parse_operands(line, instruction, lexer) {
            None => return,
            Some(operands) => operands,
        };

        if self.emitting() {
            self.code
                .push(head_word(instruction, src.as_ref(), dest.as_ref()));
            if let Some(operand) = &src {
                self.push_operand_word(operand);
            }
            if let Some(operand) = &dest {
                self.push_operand_word(operand);
            }
        }
    }

    /// Reads the operand list of `instruction`, checking the comma
    /// discipline, the addressing-mode admissibility, and that the line
    /// ends where the instruction expects it to. Returns the source and
    /// destination operands, each present per the operand count.
    fn parse_operands(
        &mut self,
        line: usize,
        instruction: &Instruction,
        lexer: &mut Lexer,
    ) -> Option<(Option<Operand>, Option<Operand>)> {
        match instruction.operands {
            0 => {
                if !expect_line_end(
                    self.reporter,
                    line,
                    lexer,
                    "The instruction expects no operands - extraneous text after the end of the instruction statement was encountered",
                ) {
                    return None;
                }
                Some((None, None))
            }
            1 => {
                let dest = self.parse_operand(
                    line,
                    lexer,
                    "Unexpected comma after the instruction name was encountered.",
                )?;
                self.check_operand_mode(line, instruction, &dest, false)?;
                if !expect_line_end(
                    self.reporter,
                    line,
                    lexer,
                    "The instruction expects a single operand - extraneous text after the end of the instruction statement was encountered",
                ) {
                    return None;
                }
                Some((None, Some(dest)))
            }
            _ => {
                let src = self.parse_operand(
                    line,
                    lexer,
                    "Unexpected comma after the instruction name was encountered.",
                )?;
                self.check_operand_mode(line, instruction, &src, true)?;
                self.expect_separating_comma(line, lexer)?;
                let dest = self.parse_operand(
                    line,
                    lexer,
                    "Multiple consecutive commas - expected a single comma between operands.",
                )?;
                self.check_operand_mode(line, instruction, &dest, false)?;
                if !expect_line_end(
                    self.reporter,
                    line,
                    lexer,
                    "The instruction expects exactly 2 operands - extraneous text after the end of the instruction statement was encountered",
                ) {
                    return None;
                }
                Some((Some(src), Some(dest)))
            }
        }
    }

    /// Reads one operand and classifies its addressing method from its
    /// syntactic shape. Symbol names are validated here but not
    /// resolved; resolution belongs to the second pass.
    fn parse_operand(
        &mut self,
        line: usize,
        lexer: &mut Lexer,
        at_comma_message: &str,
    ) -> Option<Operand> {
        let token = match lexer.next_token() {
            None => {
                self.reporter
                    .error(line, "Too few operands were found in a code line.");
                return None;
            }
            Some(token) => token,
        };
        let word = match token {
            Token::Comma => {
                self.reporter.error(line, at_comma_message);
                return None;
            }
            Token::Word(word) => word,
        };

        if let Some(number) = word.strip_prefix('#') {
            return self.parse_immediate(line, number);
        }
        if let Some(index) = register_index(word) {
            return Some(Operand::Register(index));
        }
        if let Some(symbol_name) = word.strip_prefix('&') {
            if !self.check_symbol_name(
                line,
                symbol_name,
                "after a '&' character (using the relative operand addressing method)",
            ) {
                return None;
            }
            return Some(Operand::Relative);
        }
        if !self.check_symbol_name(line, word, "while using the direct operand addressing method") {
            return None;
        }
        Some(Operand::Direct)
    }

    fn parse_immediate(&mut self, line: usize, text: &str) -> Option<Operand> {
        match literal::parse_integer(text) {
            Ok(value) => Some(Operand::Immediate(operand_word(value))),
            Err(IntegerError::Empty) => {
                self.reporter.error(
                    line,
                    "A decimal integer is missing after a '#' character (using the immediate operand addressing method).",
                );
                None
            }
            Err(IntegerError::NotANumber) => {
                self.reporter.error(
                    line,
                    &format!(
                        "A decimal integer was expected after a '#' character (using the immediate operand addressing method); '{}' is not a decimal integer.",
                        text
                    ),
                );
                None
            }
        }
    }

    fn check_operand_mode(
        &mut self,
        line: usize,
        instruction: &Instruction,
        operand: &Operand,
        is_source: bool,
    ) -> Option<()> {
        let (modes, position) = if is_source {
            (instruction.src_modes, "source")
        } else {
            (instruction.dest_modes, "destination")
        };
        if modes.permits(operand.mode()) {
            Some(())
        } else {
            self.reporter.error(
                line,
                &format!(
                    "The {} operand of the '{}' instruction is addressed using an inappropriate addressing method.",
                    position, instruction.name
                ),
            );
            None
        }
    }

    fn expect_separating_comma(&mut self, line: usize, lexer: &mut Lexer) -> Option<()> {
        match lexer.next_token() {
            None => {
                self.reporter.error(
                    line,
                    "The instruction expects 2 operands. The second operand is missing.",
                );
                None
            }
            Some(Token::Comma) => Some(()),
            Some(token) => {
                self.reporter.error(
                    line,
                    &format!(
                        "A comma is missing between operands (before the '{}' token).",
                        token.text()
                    ),
                );
                None
            }
        }
    }

    fn push_operand_word(&mut self, operand: &Operand) {
        match operand {
            Operand::Immediate(word) => self.code.push(*word),
            // the symbol's address is unknown in the first pass; the
            // second pass overwrites this placeholder
            Operand::Direct | Operand::Relative => self.code.push(Word::ZERO),
            // a register lives in the first instruction word and takes
            // no extra word
            Operand::Register(_) => {}
        }
    }

    // ~~~ guidance statements ~~~

    fn process_directive(
        &mut self,
        line: usize,
        name: &str,
        label: Option<&str>,
        lexer: &mut Lexer,
    ) {
        if name.is_empty() {
            self.reporter
                .error(line, "Expected a guidance statement name after a '.' character.");
            return;
        }
        match directive_kind(name) {
            Some(Directive::Data) => {
                if self.declare_data_symbol(line, label) {
                    self.process_data(line, lexer);
                }
            }
            Some(Directive::String) => {
                if self.declare_data_symbol(line, label) {
                    self.process_string(line, lexer);
                }
            }
            Some(Directive::Extern) => {
                if label.is_some() {
                    self.reporter.warning(
                        line,
                        "A symbol declaration was encountered in an \".extern\" statement - it is ignored.",
                    );
                }
                self.process_extern(line, lexer);
            }
            // ".entry" belongs to the second pass; here it is only
            // recognized
            Some(Directive::Entry) => {}
            None => self.reporter.error(
                line,
                &format!("Unknown guidance statement \".{}\".", name),
            ),
        }
    }

    fn declare_data_symbol(&mut self, line: usize, label: Option<&str>) -> bool {
        match label {
            None => true,
            Some(name) => self.declare_symbol(line, name, self.data.len() as u32, false, true),
        }
    }

    fn process_data(&mut self, line: usize, lexer: &mut Lexer) {
        if !self.read_data_value(
            line,
            lexer,
            "Unexpected comma after the \".data\" guidance statement name was encountered.",
            "Expected at least one parameter in a \".data\" guidance statement.",
        ) {
            return;
        }
        loop {
            match lexer.next_token() {
                None => return,
                Some(Token::Comma) => {}
                Some(token) => {
                    self.reporter.error(
                        line,
                        &format!(
                            "Expected a comma between the \".data\" statement's parameters (before the '{}' token).",
                            token.text()
                        ),
                    );
                    return;
                }
            }
            if !self.read_data_value(
                line,
                lexer,
                "Unexpected multiple consecutive commas were encountered after a parameter of the \".data\" statement.",
                "Unexpected comma at the end of the \".data\" statement was encountered.",
            ) {
                return;
            }
        }
    }

    fn read_data_value(
        &mut self,
        line: usize,
        lexer: &mut Lexer,
        at_comma_message: &str,
        line_end_message: &str,
    ) -> bool {
        let token = match lexer.next_token() {
            None => {
                self.reporter.error(line, line_end_message);
                return false;
            }
            Some(Token::Comma) => {
                self.reporter.error(line, at_comma_message);
                return false;
            }
            Some(Token::Word(word)) => word,
        };
        match literal::parse_integer(token) {
            Ok(value) => {
                if self.emitting() {
                    self.data.push(data_word(value));
                }
                true
            }
            Err(_) => {
                self.reporter.error(
                    line,
                    &format!(
                        "Every parameter of the \".data\" guidance statement is expected to be a decimal integer; '{}' is not a decimal number.",
                        token
                    ),
                );
                false
            }
        }
    }

    fn process_string(&mut self, line: usize, lexer: &Lexer) {
        // the argument is the raw remainder of the line; a quoted string
        // is not tokenized
        match literal::parse_string_literal(lexer.rest()) {
            Ok(content) => {
                if self.emitting() {
                    for byte in content.bytes() {
                        self.data.push(char_word(byte));
                    }
                    self.data.push(char_word(0));
                }
            }
            Err(StringError::Empty) => self.reporter.error(
                line,
                "Expected a character string after the \".string\" guidance statement name.",
            ),
            Err(StringError::MissingOpeningQuote) => self.reporter.error(
                line,
                "Invalid character string in a \".string\" guidance statement: an opening double-quote character ('\"') is missing.",
            ),
            Err(StringError::MissingClosingQuote) => self.reporter.error(
                line,
                "Invalid character string in a \".string\" guidance statement: a closing double-quote character ('\"') is missing.",
            ),
            Err(StringError::Unprintable) => self.reporter.error(
                line,
                "Invalid character string in a \".string\" guidance statement: a character string should include printable characters only.",
            ),
        }
    }

    fn process_extern(&mut self, line: usize, lexer: &mut Lexer) {
        let token = match lexer.next_token() {
            None => {
                self.reporter.error(
                    line,
                    "An external symbol name was expected in an \".extern\" statement.",
                );
                return;
            }
            Some(token) => token,
        };
        if !self.declare_extern_symbol(line, token.text()) {
            return;
        }
        expect_line_end(
            self.reporter,
            line,
            lexer,
            "An \".extern\" statement expects a single parameter - extraneous text at the end of it was encountered",
        );
    }

    // ~~~ symbol declarations ~~~

    fn declare_symbol(
        &mut self,
        line: usize,
        name: &str,
        address: u32,
        is_extern: bool,
        is_data: bool,
    ) -> bool {
        let place = if is_extern {
            "in an \".extern\" statement"
        } else {
            "while declaring a new symbol"
        };
        if !self.check_symbol_name(line, name, place) {
            return false;
        }
        match self.symbols.insert(name, Symbol::new(address, is_extern, is_data)) {
            Ok(()) => true,
            Err(_) => {
                self.reporter
                    .error(line, &format!("A symbol named \"{}\" already exists.", name));
                false
            }
        }
    }

    fn declare_extern_symbol(&mut self, line: usize, name: &str) -> bool {
        // an external symbol's address is unknown at assembly time
        self.declare_symbol(line, name, 0, true, false)
    }

    /// Validates a symbol name and reports the specific failure, with
    /// `place` describing where the name was expected.
    fn check_symbol_name(&mut self, line: usize, name: &str, place: &str) -> bool {
        let message = match validate_symbol_name(name) {
            Ok(()) => return true,
            Err(SymbolNameError::Empty) => format!(
                "Expected a symbol name {}, but no characters were found.",
                place
            ),
            Err(SymbolNameError::FirstNotAlphabetic) => format!(
                "Invalid symbol name '{}' was found {}. A symbol name should start with an alphabetic character.",
                name, place
            ),
            Err(SymbolNameError::NotAlphanumeric) => format!(
                "Invalid symbol name '{}' was found {}. A symbol name may include only alphabetic characters and decimal digits.",
                name, place
            ),
            Err(SymbolNameError::TooLong) => format!(
                "The symbol name '{}' that was found {} is too long. A symbol name should be no longer than {} characters.",
                name, place, MAX_SYMBOL_LEN
            ),
            Err(SymbolNameError::Reserved) => format!(
                "Invalid symbol name '{}' was found {}. A symbol name cannot be a reserved word of the assembly language.",
                name, place
            ),
        };
        self.reporter.error(line, &message);
        false
    }
}

/// Encodes the first memory word of an instruction: the static opcode
/// and funct fields, the addressing methods of the present operands, and
/// the register indexes of direct-register operands. Fields of absent
/// operands stay zero.
fn head_word(instruction: &Instruction, src: Option<&Operand>, dest: Option<&Operand>) -> Word {
    let mut word = Word::ZERO;
    word.set_are(Are::Absolute);
    word.set_field(Field::FUNCT, instruction.funct as i64);
    word.set_field(Field::OPCODE, instruction.opcode as i64);
    if let Some(dest) = dest {
        word.set_field(Field::DEST_ADSS, dest.mode().code() as i64);
        if let Operand::Register(index) = dest {
            word.set_field(Field::DEST_REG, *index as i64);
        }
    }
    if let Some(src) = src {
        word.set_field(Field::SRC_ADSS, src.mode().code() as i64);
        if let Operand::Register(index) = src {
            word.set_field(Field::SRC_REG, *index as i64);
        }
    }
    word
}
