#![allow(clippy::module_inception)]

//! Semantic analysis and lowering for a Pascal-family language.
//!
//! The crate consumes an already parsed [`ast::ast::Program`], checks it with
//! [`type_checker::type_checker::type_check`] (annotating every expression with
//! its [`ast::types::Type`]) and lowers the annotated tree into an LLVM module
//! through inkwell with [`compiler::compiler::compile`].
//! [`compiler::compiler::compile_program`] runs both passes.

use std::{fmt::Display, rc::Rc};

pub mod ast;
pub mod compiler;
pub mod errors;
pub mod macros;
pub mod type_checker;

#[derive(Debug, Clone, PartialEq)]
pub struct Position(pub u32, pub Rc<String>);

impl Position {
    pub fn null() -> Self {
        Position(0, Rc::new(String::from("<null>")))
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.1, self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn null() -> Self {
        Span {
            start: Position::null(),
            end: Position::null(),
        }
    }

    /// Builds a span covering `start..end` in `file`.
    pub fn new(start: u32, end: u32, file: &Rc<String>) -> Self {
        Span {
            start: Position(start, Rc::clone(file)),
            end: Position(end, Rc::clone(file)),
        }
    }
}
