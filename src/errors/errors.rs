use std::fmt::Display;

use thiserror::Error;

use crate::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    internal_error: ErrorImpl,
    position: Position,
}

impl Error {
    pub fn new(error_impl: ErrorImpl, position: Position) -> Self {
        Error {
            internal_error: error_impl,
            position,
        }
    }

    pub fn get_position(&self) -> &Position {
        &self.position
    }

    pub fn get_internal_error(&self) -> &ErrorImpl {
        &self.internal_error
    }

    pub fn get_error_name(&self) -> &str {
        match &self.internal_error {
            ErrorImpl::DuplicateDeclaration { .. } => "DuplicateDeclaration",
            ErrorImpl::UnknownIdentifier { .. } => "UnknownIdentifier",
            ErrorImpl::OperatorTypeMismatch { .. } => "OperatorTypeMismatch",
            ErrorImpl::UnaryOperatorTypeMismatch { .. } => "UnaryOperatorTypeMismatch",
            ErrorImpl::AssignmentTypeMismatch { .. } => "AssignmentTypeMismatch",
            ErrorImpl::ArgumentTypeMismatch { .. } => "ArgumentTypeMismatch",
            ErrorImpl::ConditionTypeMismatch { .. } => "ConditionTypeMismatch",
            ErrorImpl::IndexTypeMismatch { .. } => "IndexTypeMismatch",
            ErrorImpl::NotAnArray { .. } => "NotAnArray",
            ErrorImpl::AllocationSizeTypeMismatch { .. } => "AllocationSizeTypeMismatch",
            ErrorImpl::ArityMismatch { .. } => "ArityMismatch",
            ErrorImpl::ForwardSignatureMismatch { .. } => "ForwardSignatureMismatch",
            ErrorImpl::UnresolvedForwardDeclaration { .. } => "UnresolvedForwardDeclaration",
            ErrorImpl::InvalidDereferenceTarget { .. } => "InvalidDereferenceTarget",
            ErrorImpl::InvalidAllocationTarget { .. } => "InvalidAllocationTarget",
            ErrorImpl::DisposeOfUnallocated { .. } => "DisposeOfUnallocated",
            ErrorImpl::UndeclaredLabel { .. } => "UndeclaredLabel",
            ErrorImpl::UnboundLabel { .. } => "UnboundLabel",
            ErrorImpl::LabelAlreadyBound { .. } => "LabelAlreadyBound",
            ErrorImpl::NonLocalLabel { .. } => "NonLocalLabel",
            ErrorImpl::MissingFunctionResult { .. } => "MissingFunctionResult",
            ErrorImpl::ArrayReturnTypeForbidden { .. } => "ArrayReturnTypeForbidden",
            ErrorImpl::NilDereference { .. } => "NilDereference",
            ErrorImpl::ResultTypeMismatch { .. } => "ResultTypeMismatch",
            ErrorImpl::ResultOutsideFunction { .. } => "ResultOutsideFunction",
            ErrorImpl::CallToForwardRoutine { .. } => "CallToForwardRoutine",
            ErrorImpl::NotCallable { .. } => "NotCallable",
            ErrorImpl::NotAValue { .. } => "NotAValue",
            ErrorImpl::NotAssignable { .. } => "NotAssignable",
            ErrorImpl::ReferenceArgumentNotLvalue { .. } => "ReferenceArgumentNotLvalue",
            ErrorImpl::LoweringInvariant { .. } => "LoweringInvariant",
        }
    }

    pub fn get_tip(&self) -> ErrorTip {
        match &self.internal_error {
            ErrorImpl::DuplicateDeclaration { name } => ErrorTip::Suggestion(format!(
                "`{}` is already declared in this scope, rename one of them",
                name
            )),
            ErrorImpl::UnknownIdentifier { name } => ErrorTip::Suggestion(format!(
                "`{}` is not declared in this scope or any enclosing one",
                name
            )),
            ErrorImpl::OperatorTypeMismatch { .. } | ErrorImpl::UnaryOperatorTypeMismatch { .. } => {
                ErrorTip::Suggestion(String::from(
                    "Arithmetic needs integer or real operands, `div`/`mod` need integers, `and`/`or`/`not` need booleans",
                ))
            }
            ErrorImpl::AssignmentTypeMismatch { target, value, .. } => ErrorTip::Suggestion(format!(
                "Expected a value of type `{}`, found `{}` (integers are never promoted on assignment)",
                target, value
            )),
            ErrorImpl::ArgumentTypeMismatch { expected, received, .. } => {
                ErrorTip::Suggestion(format!(
                    "Expected argument type `{}`, received `{}`",
                    expected, received
                ))
            }
            ErrorImpl::ConditionTypeMismatch { .. } => {
                ErrorTip::Suggestion(String::from("Conditions must be of type `boolean`"))
            }
            ErrorImpl::IndexTypeMismatch { .. } => {
                ErrorTip::Suggestion(String::from("Array indices must be of type `integer`"))
            }
            ErrorImpl::AllocationSizeTypeMismatch { .. } => {
                ErrorTip::Suggestion(String::from("The element count of `new [n]` must be an integer"))
            }
            ErrorImpl::ArityMismatch { expected, received, .. } => ErrorTip::Suggestion(format!(
                "Expected {} arguments, received {}",
                expected, received
            )),
            ErrorImpl::ForwardSignatureMismatch { declared, .. } => ErrorTip::Suggestion(format!(
                "Define the routine with the forward signature `{}`",
                declared
            )),
            ErrorImpl::UnresolvedForwardDeclaration { .. } => ErrorTip::Suggestion(String::from(
                "Every forward declaration needs a definition in the same scope",
            )),
            ErrorImpl::DisposeOfUnallocated { .. } => ErrorTip::Suggestion(String::from(
                "Only pointers allocated with `new` in this scope can be disposed, and only once",
            )),
            ErrorImpl::UndeclaredLabel { label } => ErrorTip::Suggestion(format!(
                "Declare it first with `label {};`",
                label
            )),
            ErrorImpl::UnboundLabel { label } => ErrorTip::Suggestion(format!(
                "Attach `{}` to a statement with `{}: ...`",
                label, label
            )),
            ErrorImpl::MissingFunctionResult { function } => ErrorTip::Suggestion(format!(
                "Assign the function's value with `result := ...` or `{} := ...`",
                function
            )),
            ErrorImpl::CallToForwardRoutine { routine } => ErrorTip::Suggestion(format!(
                "Define `{}` before calling it",
                routine
            )),
            ErrorImpl::LoweringInvariant { .. } => ErrorTip::Suggestion(String::from(
                "Run semantic analysis on the program before lowering it",
            )),
            _ => ErrorTip::None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.internal_error, self.position)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorTip {
    None,
    Suggestion(String),
}

impl Display for ErrorTip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorTip::None => write!(f, ""),
            ErrorTip::Suggestion(suggestion) => write!(f, "{}", suggestion),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorImpl {
    #[error("duplicate variable {name}")]
    DuplicateDeclaration { name: String },
    #[error("unknown variable {name}")]
    UnknownIdentifier { name: String },
    #[error("type mismatch in `{construct}`: {left} {operator} {right}")]
    OperatorTypeMismatch {
        construct: String,
        operator: String,
        left: String,
        right: String,
    },
    #[error("type mismatch in `{construct}`: {operator} {operand}")]
    UnaryOperatorTypeMismatch {
        construct: String,
        operator: String,
        operand: String,
    },
    #[error("assignment type mismatch in `{construct}`: {target} := {value}")]
    AssignmentTypeMismatch {
        construct: String,
        target: String,
        value: String,
    },
    #[error("type mismatch on arguments of {routine}: formal {formal} has type {expected} but `{argument}` has type {received}")]
    ArgumentTypeMismatch {
        routine: String,
        formal: String,
        argument: String,
        expected: String,
        received: String,
    },
    #[error("condition of {construct} must be boolean but `{condition}` has type {received}")]
    ConditionTypeMismatch {
        construct: String,
        condition: String,
        received: String,
    },
    #[error("bracket expression of `{construct}` must be integer but has type {received}")]
    IndexTypeMismatch { construct: String, received: String },
    #[error("`{construct}` is not of type array but of type {received}")]
    NotAnArray { construct: String, received: String },
    #[error("in `{construct}` the element count must be integer but has type {received}")]
    AllocationSizeTypeMismatch { construct: String, received: String },
    #[error("routine {routine} expected {expected} arguments, got {received}")]
    ArityMismatch {
        routine: String,
        expected: usize,
        received: usize,
    },
    #[error("routine {routine} was previously declared with signature {declared} but is now defined with signature {defined}")]
    ForwardSignatureMismatch {
        routine: String,
        declared: String,
        defined: String,
    },
    #[error("forward declared but never defined: {}", routines.join(", "))]
    UnresolvedForwardDeclaration { routines: Vec<String> },
    #[error("`{construct}` cannot be dereferenced, it has type {received}")]
    InvalidDereferenceTarget { construct: String, received: String },
    #[error("in `{construct}` the target must be {expected} but has type {received}")]
    InvalidAllocationTarget {
        construct: String,
        expected: String,
        received: String,
    },
    #[error("`{target}` was not created by new in this scope or was already disposed")]
    DisposeOfUnallocated { target: String },
    #[error("{label} is not a declared label")]
    UndeclaredLabel { label: String },
    #[error("label {label} does not correspond to a statement")]
    UnboundLabel { label: String },
    #[error("label {label} is already attached to a statement")]
    LabelAlreadyBound { label: String },
    #[error("label {label} belongs to an enclosing routine")]
    NonLocalLabel { label: String },
    #[error("function {function} does not have a result")]
    MissingFunctionResult { function: String },
    #[error("function {function} cannot return an array ({received})")]
    ArrayReturnTypeForbidden { function: String, received: String },
    #[error("nil cannot be dereferenced in `{construct}`")]
    NilDereference { construct: String },
    #[error("function {function} is of type {declared} but returns type {returned}")]
    ResultTypeMismatch {
        function: String,
        declared: String,
        returned: String,
    },
    #[error("`{construct}` assigns a result outside of a function")]
    ResultOutsideFunction { construct: String },
    #[error("cannot call {routine} because it is forward declared, but not defined")]
    CallToForwardRoutine { routine: String },
    #[error("{name} is not a procedure or function")]
    NotCallable { name: String },
    #[error("{name} is a {kind} and cannot be used as a value")]
    NotAValue { name: String, kind: String },
    #[error("`{construct}` is not an l-value")]
    NotAssignable { construct: String },
    #[error("argument `{argument}` for by-reference formal {formal} of {routine} must be an l-value")]
    ReferenceArgumentNotLvalue {
        routine: String,
        formal: String,
        argument: String,
    },
    #[error("lowering invariant violated: {detail}")]
    LoweringInvariant { detail: String },
}
