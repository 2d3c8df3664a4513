//! Type checking and semantic analysis module.
//!
//! This module performs semantic analysis on the AST, annotating it in place
//! while:
//!
//! - Assigning a type to every expression and checking operator rules
//! - Resolving names through a stack of lexical scopes
//! - Checking calls against routine signatures
//! - Tracking forward declarations, labels and `new`/`dispose` pairs
//! - Establishing each function's result
//!
//! Analysis stops at the first error.

pub mod expr;
pub mod library;
pub mod stmt;
pub mod symbol_table;
pub mod type_checker;
