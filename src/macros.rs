//! Utility macros for the compiler.
//!
//! This module defines helper macros used throughout the compiler:
//!
//! - `MK_ERROR!` - Creates a positioned Error from an ErrorImpl variant
//! - `MK_EXPR!` - Creates an unannotated Expr from an ExprKind
//!
//! These macros reduce boilerplate in the analyzer, the lowering pass and
//! the AST constructor helpers.

/// Creates an `Error` for the given `ErrorImpl` variant and position.
///
/// # Arguments
///
/// * `$variant` - The ErrorImpl variant, written as a `::` separated path
/// * `$position` - The `Position` the error is reported at
/// * `$field: $value` - The variant's fields
///
/// # Example
///
/// ```ignore
/// return Err(MK_ERROR!(ErrorImpl::UnknownIdentifier, pos.clone(), name: name.to_string()));
/// ```
#[macro_export]
macro_rules! MK_ERROR {
    ($($variant:ident)::+, $position:expr $(, $field:ident : $value:expr)* $(,)?) => {
        $crate::errors::errors::Error::new(
            $($variant)::+ { $($field: $value),* },
            $position,
        )
    };
}

/// Creates an `Expr` with no type annotation.
///
/// # Arguments
///
/// * `$kind` - The ExprKind
/// * `$span` - The source span
///
/// # Example
///
/// ```ignore
/// let expr = MK_EXPR!(ExprKind::Integer(42), span);
/// ```
#[macro_export]
macro_rules! MK_EXPR {
    ($kind:expr, $span:expr) => {
        $crate::ast::expressions::Expr {
            kind: $kind,
            ty: None,
            span: $span,
        }
    };
}
