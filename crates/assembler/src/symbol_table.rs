// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! The symbol table of one source file.
//!
//! A symbol carries the memory word that replaces its name at
//! direct-addressing sites: the symbol's address in the non-ARE field,
//! and R (relocatable) or E (external) in the ARE field. Symbols that
//! point into the data image are inserted with their data offset as the
//! address; after the first pass [`SymbolTable::relocate_data`] shifts
//! every such symbol by the final code size plus the load address, in a
//! single bulk step.

use std::collections::HashMap;

use w24_types::{Are, Field, Word};

/// A symbol of the assembly source. The name is the key it is stored
/// under in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// The memory word that replaces the symbol's name.
    pub rep_word: Word,
    pub is_extern: bool,
    pub is_entry: bool,
    /// True if the symbol's address points into the data image, which
    /// means it still has to be relocated after the first pass.
    pub is_data: bool,
}

impl Symbol {
    pub fn new(address: u32, is_extern: bool, is_data: bool) -> Symbol {
        let mut rep_word = Word::ZERO;
        rep_word.set_field(Field::NON_ARE, address as i64);
        rep_word.set_are(if is_extern {
            Are::External
        } else {
            Are::Relocatable
        });
        Symbol {
            rep_word,
            is_extern,
            is_entry: false,
            is_data,
        }
    }

    /// The address the symbol represents.
    pub fn address(&self) -> u32 {
        self.rep_word.address()
    }
}

/// The error of inserting a name that is already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateSymbol;

/// Maps symbol names to symbols. Iteration visits symbols in insertion
/// order, which is also the order of the `.ent` output file.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    map: HashMap<String, Symbol>,
    order: Vec<String>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable {
            map: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn insert(&mut self, name: &str, symbol: Symbol) -> Result<(), DuplicateSymbol> {
        if self.map.contains_key(name) {
            return Err(DuplicateSymbol);
        }
        self.map.insert(name.to_owned(), symbol);
        self.order.push(name.to_owned());
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.map.get(name)
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.map.get_mut(name)
    }

    /// Adds `delta` to the address of every data symbol. Runs exactly
    /// once per file, between the two passes.
    pub fn relocate_data(&mut self, delta: u32) {
        for symbol in self.map.values_mut() {
            if symbol.is_data {
                let address = symbol.address() + delta;
                symbol.rep_word.set_field(Field::NON_ARE, address as i64);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Symbol)> {
        self.order.iter().map(|name| (name.as_str(), &self.map[name]))
    }

    pub fn entry_symbols(&self) -> impl Iterator<Item = (&str, &Symbol)> {
        self.iter().filter(|(_, symbol)| symbol.is_entry)
    }

    pub fn has_entries(&self) -> bool {
        self.map.values().any(|symbol| symbol.is_entry)
    }
}
