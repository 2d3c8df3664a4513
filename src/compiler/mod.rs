//! Lowering of checked programs into LLVM IR.
//!
//! This module walks the annotated AST a second time and produces an inkwell
//! `Module`. It handles:
//!
//! - Globals for program variables, entry block allocas for formals, locals
//!   and function results
//! - Captured slots of enclosing routines, passed as trailing pointer parameters
//! - Expressions, dispatched on the static types set by the analyzer
//! - Control flow: `if`, `while`, labels, `goto` and `return` as blocks
//! - External declarations of the library routines

pub mod compiler;
pub mod expr;
pub mod stdlib;
pub mod stmt;

#[cfg(test)]
mod tests;
