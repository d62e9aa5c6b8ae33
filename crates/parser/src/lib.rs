// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! Source-text handling for the w24 assembler: the line reader with the
//! 80-column limit, the statement tokenizer, and the literal parsers for
//! decimal integers and quoted character strings.
//!
//! Both passes of the assembler re-read the source through this crate,
//! so the tokenization rules here are the single definition of the
//! language's lexical shape.

pub mod lexer;
pub mod literal;
pub mod source;

pub use lexer::{Lexer, Token};
pub use literal::{parse_integer, parse_string_literal, IntegerError, StringError};
pub use source::{InputLine, LineContent, LineReader};
