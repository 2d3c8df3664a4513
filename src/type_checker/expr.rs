//! Expression typing.
//!
//! Every expression node is typed bottom-up and annotated in place, so the
//! lowering pass can read static types straight off the tree.

use crate::{
    ast::{
        expressions::{BinaryExpr, CallExpr, Expr, ExprKind, IndexExpr, OperatorFamily, PrefixExpr, UnaryOperator},
        types::Type,
    },
    errors::errors::{Error, ErrorImpl},
    Position, MK_ERROR,
};

use super::{symbol_table::SymbolKind, type_checker::TypeChecker};

/// Types `ast` and its children, storing the result in each node's `ty`.
pub fn type_check_expr(type_checker: &mut TypeChecker, ast: &mut Expr) -> Result<Type, Error> {
    let position = ast.span.start.clone();
    let ty = match &mut ast.kind {
        ExprKind::Integer(_) => Type::Integer,
        ExprKind::Real(_) => Type::Real,
        ExprKind::Char(_) => Type::Char,
        ExprKind::String(_) => Type::array(Type::Char, None),
        ExprKind::Boolean(_) => Type::Boolean,
        ExprKind::Nil => Type::Nil,
        ExprKind::Symbol(name) => type_check_symbol(type_checker, name, position)?,
        ExprKind::Result => type_checker.declared_result_type("result", position)?,
        ExprKind::Binary(binary) => type_check_binary(type_checker, binary, position)?,
        ExprKind::Prefix(prefix) => type_check_prefix(type_checker, prefix, position)?,
        ExprKind::Index(index) => type_check_index(type_checker, index, position)?,
        ExprKind::Deref(pointer) => {
            let pointer_type = type_check_expr(type_checker, pointer)?;
            dereference(&pointer_type, &format!("{}^", pointer), position)?
        }
        ExprKind::AddressOf(target) => {
            if !target.is_lvalue() {
                return Err(MK_ERROR!(
                    ErrorImpl::NotAssignable,
                    position,
                    construct: target.to_string()
                ));
            }
            Type::pointer(type_check_expr(type_checker, target)?)
        }
        ExprKind::Call(call) => type_check_call(type_checker, call, position)?,
    };

    ast.ty = Some(ty.clone());
    Ok(ty)
}

/// Pointee of a dereferenced pointer of type `pointer_type`.
pub fn dereference(pointer_type: &Type, construct: &str, position: Position) -> Result<Type, Error> {
    match pointer_type {
        Type::Pointer { pointee } => Ok((**pointee).clone()),
        Type::Nil => Err(MK_ERROR!(
            ErrorImpl::NilDereference,
            position,
            construct: construct.to_string()
        )),
        _ => Err(MK_ERROR!(
            ErrorImpl::InvalidDereferenceTarget,
            position,
            construct: construct.to_string(),
            received: pointer_type.to_string()
        )),
    }
}

fn type_check_symbol(type_checker: &mut TypeChecker, name: &str, position: Position) -> Result<Type, Error> {
    let symbol = type_checker.symbol_table.lookup(name, position.clone())?;
    let own_function = type_checker.symbol_table.enclosing_routine_name() == Some(name);
    match &symbol.kind {
        SymbolKind::Variable { .. } => Ok(symbol.ty.clone()),
        // Inside its own body a function's name reads its result.
        SymbolKind::Routine(info) if info.is_function && own_function => Ok(symbol.ty.clone()),
        kind => Err(MK_ERROR!(
            ErrorImpl::NotAValue,
            position,
            name: name.to_string(),
            kind: kind.describe().to_string()
        )),
    }
}

fn type_check_binary(
    type_checker: &mut TypeChecker,
    ast: &mut BinaryExpr,
    position: Position,
) -> Result<Type, Error> {
    let left = type_check_expr(type_checker, &mut ast.left)?;
    let right = type_check_expr(type_checker, &mut ast.right)?;

    let both_numeric = left.is_numeric() && right.is_numeric();
    let result = match ast.operator.family() {
        OperatorFamily::Arithmetic if both_numeric => match (&left, &right) {
            (Type::Integer, Type::Integer) => Some(Type::Integer),
            _ => Some(Type::Real),
        },
        OperatorFamily::Divide if both_numeric => Some(Type::Real),
        OperatorFamily::IntegerDivision if left == Type::Integer && right == Type::Integer => {
            Some(Type::Integer)
        }
        OperatorFamily::Equality
            if both_numeric
                || (!left.is_array() && !right.is_array() && left.is_compatible_with(&right)) =>
        {
            Some(Type::Boolean)
        }
        OperatorFamily::Relational if both_numeric => Some(Type::Boolean),
        OperatorFamily::Logical if left == Type::Boolean && right == Type::Boolean => {
            Some(Type::Boolean)
        }
        _ => None,
    };

    result.ok_or_else(|| {
        MK_ERROR!(
            ErrorImpl::OperatorTypeMismatch,
            position,
            construct: format!("{} {} {}", ast.left, ast.operator, ast.right),
            operator: ast.operator.to_string(),
            left: left.to_string(),
            right: right.to_string()
        )
    })
}

fn type_check_prefix(
    type_checker: &mut TypeChecker,
    ast: &mut PrefixExpr,
    position: Position,
) -> Result<Type, Error> {
    let operand = type_check_expr(type_checker, &mut ast.operand)?;
    let accepted = match ast.operator {
        UnaryOperator::Plus | UnaryOperator::Minus => operand.is_numeric(),
        UnaryOperator::Not => operand == Type::Boolean,
    };

    if !accepted {
        return Err(MK_ERROR!(
            ErrorImpl::UnaryOperatorTypeMismatch,
            position,
            construct: format!("{} {}", ast.operator, ast.operand),
            operator: ast.operator.to_string(),
            operand: operand.to_string()
        ));
    }
    Ok(operand)
}

fn type_check_index(
    type_checker: &mut TypeChecker,
    ast: &mut IndexExpr,
    position: Position,
) -> Result<Type, Error> {
    let base = type_check_expr(type_checker, &mut ast.base)?;
    let index = type_check_expr(type_checker, &mut ast.index)?;
    let construct = format!("{}[{}]", ast.base, ast.index);

    let element = match &base {
        Type::Array { element, .. } => (**element).clone(),
        _ => {
            return Err(MK_ERROR!(
                ErrorImpl::NotAnArray,
                position,
                construct: ast.base.to_string(),
                received: base.to_string()
            ))
        }
    };
    if index != Type::Integer {
        return Err(MK_ERROR!(
            ErrorImpl::IndexTypeMismatch,
            position,
            construct: construct,
            received: index.to_string()
        ));
    }
    Ok(element)
}

/// Checks a call in statement or expression position and returns the
/// callee's return type (`Type::Procedure` for procedures).
pub fn type_check_call(
    type_checker: &mut TypeChecker,
    ast: &mut CallExpr,
    position: Position,
) -> Result<Type, Error> {
    for argument in ast.arguments.iter_mut() {
        type_check_expr(type_checker, argument)?;
    }

    let symbol = type_checker.symbol_table.lookup(&ast.routine, position.clone())?;
    let info = match symbol.routine() {
        Some(info) => info,
        None => {
            return Err(MK_ERROR!(
                ErrorImpl::NotCallable,
                position,
                name: ast.routine.clone()
            ))
        }
    };

    let expected: usize = info.formals.iter().map(|formal| formal.names.len()).sum();
    if expected != ast.arguments.len() {
        return Err(MK_ERROR!(
            ErrorImpl::ArityMismatch,
            position,
            routine: ast.routine.clone(),
            expected: expected,
            received: ast.arguments.len()
        ));
    }

    let parameters = info
        .formals
        .iter()
        .flat_map(|formal| formal.names.iter().map(move |name| (name, formal)));
    for ((name, formal), argument) in parameters.zip(ast.arguments.iter()) {
        let received = argument.ty.clone().unwrap_or(Type::Nil);
        if !formal.ty.is_compatible_with(&received) {
            return Err(MK_ERROR!(
                ErrorImpl::ArgumentTypeMismatch,
                argument.span.start.clone(),
                routine: ast.routine.clone(),
                formal: name.clone(),
                argument: argument.to_string(),
                expected: formal.ty.to_string(),
                received: received.to_string()
            ));
        }
        if formal.by_reference && !argument.is_lvalue() {
            return Err(MK_ERROR!(
                ErrorImpl::ReferenceArgumentNotLvalue,
                argument.span.start.clone(),
                routine: ast.routine.clone(),
                formal: name.clone(),
                argument: argument.to_string()
            ));
        }
    }

    // Nested bodies may call a forward sibling before its definition; the
    // declaring scope's own body may not.
    let declared_here = matches!(
        type_checker.symbol_table.find_with_depth(&ast.routine),
        Some((depth, _)) if depth + 1 == type_checker.symbol_table.depth()
    );
    if info.forward && declared_here {
        return Err(MK_ERROR!(
            ErrorImpl::CallToForwardRoutine,
            position,
            routine: ast.routine.clone()
        ));
    }
    Ok(symbol.ty.clone())
}
