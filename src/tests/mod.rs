//! Cross-module scenario tests.
//!
//! These tests exercise the annotation file across load/append/save cycles
//! and the full path from a capture session to a written dataset.
