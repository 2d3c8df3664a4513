use std::fmt::Display;

use crate::{Span, MK_EXPR};

use super::types::Type;

/// Expression node.
///
/// `ty` is empty when the parser hands the tree over and is filled in by the
/// type checker. Lowering refuses expressions that were never annotated.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Option<Type>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Integer(i32),
    Real(f64),
    Char(u8),
    /// String literals are unsized arrays of char stored in static memory.
    String(String),
    Boolean(bool),
    Nil,
    Symbol(String),
    /// The `result` pseudo-variable of the enclosing function.
    Result,
    Binary(BinaryExpr),
    Prefix(PrefixExpr),
    Index(IndexExpr),
    Deref(Box<Expr>),
    AddressOf(Box<Expr>),
    Call(CallExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub left: Box<Expr>,
    pub operator: BinaryOperator,
    pub right: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrefixExpr {
    pub operator: UnaryOperator,
    pub operand: Box<Expr>,
}

/// `base[index]`
#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpr {
    pub base: Box<Expr>,
    pub index: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub routine: String,
    pub arguments: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Plus,
    Minus,
    Star,
    Slash,
    Div,
    Mod,
    Equals,
    NotEquals,
    Less,
    Greater,
    LessEquals,
    GreaterEquals,
    And,
    Or,
}

/// Operators sharing one typing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorFamily {
    /// `+ - *`
    Arithmetic,
    /// `/`
    Divide,
    /// `div mod`
    IntegerDivision,
    /// `= <>`
    Equality,
    /// `< > <= >=`
    Relational,
    /// `and or`
    Logical,
}

impl BinaryOperator {
    pub fn family(&self) -> OperatorFamily {
        match self {
            BinaryOperator::Plus | BinaryOperator::Minus | BinaryOperator::Star => {
                OperatorFamily::Arithmetic
            }
            BinaryOperator::Slash => OperatorFamily::Divide,
            BinaryOperator::Div | BinaryOperator::Mod => OperatorFamily::IntegerDivision,
            BinaryOperator::Equals | BinaryOperator::NotEquals => OperatorFamily::Equality,
            BinaryOperator::Less
            | BinaryOperator::Greater
            | BinaryOperator::LessEquals
            | BinaryOperator::GreaterEquals => OperatorFamily::Relational,
            BinaryOperator::And | BinaryOperator::Or => OperatorFamily::Logical,
        }
    }
}

impl Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Star => "*",
            BinaryOperator::Slash => "/",
            BinaryOperator::Div => "div",
            BinaryOperator::Mod => "mod",
            BinaryOperator::Equals => "=",
            BinaryOperator::NotEquals => "<>",
            BinaryOperator::Less => "<",
            BinaryOperator::Greater => ">",
            BinaryOperator::LessEquals => "<=",
            BinaryOperator::GreaterEquals => ">=",
            BinaryOperator::And => "and",
            BinaryOperator::Or => "or",
        };
        write!(f, "{}", op)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Plus,
    Minus,
    Not,
}

impl Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Plus => write!(f, "+"),
            UnaryOperator::Minus => write!(f, "-"),
            UnaryOperator::Not => write!(f, "not"),
        }
    }
}

// CONSTRUCTORS

impl Expr {
    pub fn integer(value: i32) -> Self {
        MK_EXPR!(ExprKind::Integer(value), Span::null())
    }

    pub fn real(value: f64) -> Self {
        MK_EXPR!(ExprKind::Real(value), Span::null())
    }

    pub fn char(value: u8) -> Self {
        MK_EXPR!(ExprKind::Char(value), Span::null())
    }

    pub fn string(value: &str) -> Self {
        MK_EXPR!(ExprKind::String(value.to_string()), Span::null())
    }

    pub fn boolean(value: bool) -> Self {
        MK_EXPR!(ExprKind::Boolean(value), Span::null())
    }

    pub fn nil() -> Self {
        MK_EXPR!(ExprKind::Nil, Span::null())
    }

    pub fn symbol(name: &str) -> Self {
        MK_EXPR!(ExprKind::Symbol(name.to_string()), Span::null())
    }

    /// Typed as a placeholder until the analyzer knows the enclosing function.
    pub fn result() -> Self {
        let mut expr = MK_EXPR!(ExprKind::Result, Span::null());
        expr.ty = Some(Type::ResultPlaceholder);
        expr
    }

    pub fn binary(left: Expr, operator: BinaryOperator, right: Expr) -> Self {
        MK_EXPR!(
            ExprKind::Binary(BinaryExpr {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            }),
            Span::null()
        )
    }

    pub fn prefix(operator: UnaryOperator, operand: Expr) -> Self {
        MK_EXPR!(
            ExprKind::Prefix(PrefixExpr {
                operator,
                operand: Box::new(operand),
            }),
            Span::null()
        )
    }

    pub fn index(base: Expr, index: Expr) -> Self {
        MK_EXPR!(
            ExprKind::Index(IndexExpr {
                base: Box::new(base),
                index: Box::new(index),
            }),
            Span::null()
        )
    }

    pub fn deref(pointer: Expr) -> Self {
        MK_EXPR!(ExprKind::Deref(Box::new(pointer)), Span::null())
    }

    pub fn address_of(target: Expr) -> Self {
        MK_EXPR!(ExprKind::AddressOf(Box::new(target)), Span::null())
    }

    pub fn call(routine: &str, arguments: Vec<Expr>) -> Self {
        MK_EXPR!(
            ExprKind::Call(CallExpr {
                routine: routine.to_string(),
                arguments,
            }),
            Span::null()
        )
    }

    /// Replaces the span, for builders that track source locations.
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

impl Expr {
    /// Whether the expression denotes a storage location.
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Symbol(_)
                | ExprKind::Result
                | ExprKind::Index(_)
                | ExprKind::Deref(_)
                | ExprKind::String(_)
        )
    }

    /// The annotated type. `None` until the type checker has visited the node.
    pub fn get_type(&self) -> Option<&Type> {
        self.ty.as_ref()
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ExprKind::Integer(value) => write!(f, "{}", value),
            ExprKind::Real(value) => write!(f, "{:?}", value),
            ExprKind::Char(value) => write!(f, "'{}'", value.escape_ascii()),
            ExprKind::String(value) => write!(f, "\"{}\"", value),
            ExprKind::Boolean(value) => write!(f, "{}", value),
            ExprKind::Nil => write!(f, "nil"),
            ExprKind::Symbol(name) => write!(f, "{}", name),
            ExprKind::Result => write!(f, "result"),
            ExprKind::Binary(binary) => {
                write!(f, "({} {} {})", binary.left, binary.operator, binary.right)
            }
            ExprKind::Prefix(prefix) => match prefix.operator {
                UnaryOperator::Not => write!(f, "not {}", prefix.operand),
                _ => write!(f, "{}{}", prefix.operator, prefix.operand),
            },
            ExprKind::Index(index) => write!(f, "{}[{}]", index.base, index.index),
            ExprKind::Deref(pointer) => write!(f, "{}^", pointer),
            ExprKind::AddressOf(target) => write!(f, "@{}", target),
            ExprKind::Call(call) => {
                let arguments = call
                    .arguments
                    .iter()
                    .map(|argument| argument.to_string())
                    .collect::<Vec<String>>();
                write!(f, "{}({})", call.routine, arguments.join(", "))
            }
        }
    }
}
