// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! End-to-end tests of the file driver: a base name in, output files
//! (or their suppression) out.

use std::fs;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use w24_assembler::process_file;

struct Fixture {
    // kept alive so the directory outlives the test body
    _dir: TempDir,
    base: PathBuf,
}

impl Fixture {
    fn new(source: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("prog");
        fs::write(base.with_extension("as"), source).unwrap();
        Fixture { _dir: dir, base }
    }

    fn base_str(&self) -> &str {
        self.base.to_str().unwrap()
    }

    fn read(&self, extension: &str) -> String {
        fs::read_to_string(self.base.with_extension(extension)).unwrap()
    }

    fn exists(&self, extension: &str) -> bool {
        self.base.with_extension(extension).exists()
    }
}

#[test]
fn test_tiny_program_object_file() {
    let fixture = Fixture::new("MAIN: mov #5, r3\n      stop\n");
    assert!(process_file(fixture.base_str()).unwrap());

    assert_eq!(
        fixture.read("ob"),
        "3 0\n\
         0000100 001b04\n\
         0000101 00002c\n\
         0000102 3c0004"
    );
    assert!(!fixture.exists("ext"));
    assert!(!fixture.exists("ent"));
}

#[test]
fn test_data_relocation_object_file() {
    let fixture = Fixture::new("      mov X, r0\n      stop\nX:    .data 7, -1\n");
    assert!(process_file(fixture.base_str()).unwrap());

    assert_eq!(
        fixture.read("ob"),
        "3 2\n\
         0000100 011804\n\
         0000101 00033a\n\
         0000102 3c0004\n\
         \n\
         0000103 000007\n\
         0000104 ffffff"
    );
}

#[test]
fn test_externals_file() {
    let fixture = Fixture::new("      .extern EXT\n      jmp EXT\n      stop\n");
    assert!(process_file(fixture.base_str()).unwrap());

    assert_eq!(fixture.read("ext"), "EXT 0000101");
    assert!(!fixture.exists("ent"));
    // the reference slot carries address 0 with ARE=E
    assert!(fixture.read("ob").contains("0000101 000001"));
}

#[test]
fn test_entries_file() {
    let fixture = Fixture::new("      .entry K\nK:    .data 1\n      stop\n");
    assert!(process_file(fixture.base_str()).unwrap());

    assert_eq!(fixture.read("ent"), "K 0000101");
    assert!(!fixture.exists("ext"));
}

#[test]
fn test_relative_addressing_object_file() {
    let fixture = Fixture::new("LOOP: inc r1\n      bne &LOOP\n      stop\n");
    assert!(process_file(fixture.base_str()).unwrap());

    let object = fixture.read("ob");
    assert!(object.starts_with("4 0\n"));
    assert!(object.contains("0000102 fffffc"));
}

#[test]
fn test_errors_suppress_all_output() {
    let fixture = Fixture::new("      mov #5\n      stop\n");
    assert!(!process_file(fixture.base_str()).unwrap());

    assert!(!fixture.exists("ob"));
    assert!(!fixture.exists("ext"));
    assert!(!fixture.exists("ent"));
}

#[test]
fn test_missing_source_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("nonexistent");
    let error = process_file(base.to_str().unwrap()).unwrap_err();
    assert_eq!(error.exit_code(), 2);
}

#[test]
fn test_processing_is_deterministic() {
    let source = "MAIN: mov #5, r3\n      .extern EXT\n      jmp EXT\n      stop\n";
    let first = Fixture::new(source);
    let second = Fixture::new(source);
    assert!(process_file(first.base_str()).unwrap());
    assert!(process_file(second.base_str()).unwrap());
    assert_eq!(first.read("ob"), second.read("ob"));
    assert_eq!(first.read("ext"), second.read("ext"));
}
