// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! The numbered line reader over an in-memory source file.
//!
//! A source line may be at most [`MAX_LINE_LEN`] characters long,
//! excluding the terminator. Longer lines are yielded as `TooLong`
//! rather than truncated, so the first pass can report them and the
//! second pass can step over them without the two passes disagreeing
//! on line numbers.

use std::iter::Enumerate;
use std::str::Lines;

use w24_types::MAX_LINE_LEN;

/// The content of one source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineContent<'a> {
    Text(&'a str),
    TooLong,
}

/// A source line together with its 1-based line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputLine<'a> {
    pub number: usize,
    pub content: LineContent<'a>,
}

/// Yields the lines of a source file in order. Both assembler passes
/// create a fresh reader over the same text.
#[derive(Debug, Clone)]
pub struct LineReader<'a> {
    lines: Enumerate<Lines<'a>>,
}

impl<'a> LineReader<'a> {
    pub fn new(source: &'a str) -> LineReader<'a> {
        LineReader {
            lines: source.lines().enumerate(),
        }
    }
}

impl<'a> Iterator for LineReader<'a> {
    type Item = InputLine<'a>;

    fn next(&mut self) -> Option<InputLine<'a>> {
        let (index, raw) = self.lines.next()?;
        let content = if raw.len() > MAX_LINE_LEN {
            LineContent::TooLong
        } else {
            LineContent::Text(raw)
        };
        Some(InputLine {
            number: index + 1,
            content,
        })
    }
}
