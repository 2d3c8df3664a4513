//! Statement checking.
//!
//! Assignments, result establishment, labels and gotos, and the `new` and
//! `dispose` rules, including the `nil` rebinding that follows a dispose.

use log::trace;

use crate::{
    ast::{
        ast::StmtRef,
        expressions::{Expr, ExprKind},
        statements::{AssignStmt, DisposeStmt, LabeledStmt, NewStmt, Stmt},
        types::Type,
    },
    errors::errors::{Error, ErrorImpl},
    Position, MK_ERROR,
};

use super::{
    expr::{dereference, type_check_call, type_check_expr},
    type_checker::{type_check_block, TypeChecker, RESULT},
};

pub fn type_check_stmt(type_checker: &mut TypeChecker, ast: &mut Stmt) -> Result<(), Error> {
    match ast {
        Stmt::Empty(_) | Stmt::Return(_) => Ok(()),
        Stmt::Assign(assign_stmt) => type_check_assign(type_checker, assign_stmt),
        Stmt::DerefAssign(assign_stmt) => type_check_deref_assign(type_checker, assign_stmt),
        Stmt::Block(block_stmt) => type_check_block(type_checker, block_stmt),
        Stmt::Call(call_stmt) => {
            let ty = type_check_call(type_checker, &mut call_stmt.call, call_stmt.span.start.clone())?;
            call_stmt.ty = Some(ty);
            Ok(())
        }
        Stmt::If(if_stmt) => {
            check_condition(type_checker, &mut if_stmt.condition, "if")?;
            type_check_stmt(type_checker, &mut if_stmt.consequent)?;
            if let Some(alternate) = if_stmt.alternate.as_mut() {
                type_check_stmt(type_checker, alternate)?;
            }
            Ok(())
        }
        Stmt::While(while_stmt) => {
            check_condition(type_checker, &mut while_stmt.condition, "while")?;
            type_check_stmt(type_checker, &mut while_stmt.body)
        }
        Stmt::Labeled(labeled_stmt) => type_check_labeled(type_checker, labeled_stmt),
        Stmt::Goto(goto_stmt) => {
            let position = goto_stmt.span.start.clone();
            check_label_scope(type_checker, &goto_stmt.label, position.clone())?;
            type_checker.record_goto(&goto_stmt.label, position);
            Ok(())
        }
        Stmt::New(new_stmt) => type_check_new(type_checker, new_stmt),
        Stmt::Dispose(dispose_stmt) => type_check_dispose(type_checker, dispose_stmt),
    }
}

fn check_condition(type_checker: &mut TypeChecker, condition: &mut Expr, construct: &str) -> Result<(), Error> {
    let ty = type_check_expr(type_checker, condition)?;
    if ty != Type::Boolean {
        return Err(MK_ERROR!(
            ErrorImpl::ConditionTypeMismatch,
            condition.span.start.clone(),
            construct: construct.to_string(),
            condition: condition.to_string(),
            received: ty.to_string()
        ));
    }
    Ok(())
}

/// Label lookup shared by gotos and labeled statements: the label must be
/// declared, and declared by the routine being analyzed.
fn check_label_scope(type_checker: &TypeChecker, label: &str, position: Position) -> Result<(), Error> {
    let table = &type_checker.symbol_table;
    match table.find_with_depth(label) {
        Some((depth, symbol)) if symbol.is_label() => {
            if depth + 1 != table.depth() {
                return Err(MK_ERROR!(
                    ErrorImpl::NonLocalLabel,
                    position,
                    label: label.to_string()
                ));
            }
            Ok(())
        }
        _ => Err(MK_ERROR!(
            ErrorImpl::UndeclaredLabel,
            position,
            label: label.to_string()
        )),
    }
}

fn type_check_labeled(type_checker: &mut TypeChecker, ast: &mut LabeledStmt) -> Result<(), Error> {
    let position = ast.span.start.clone();
    check_label_scope(type_checker, &ast.label, position.clone())?;
    type_checker
        .symbol_table
        .bind_label(&ast.label, StmtRef(ast.span.clone()), position)?;
    trace!("bound label {}", ast.label);
    type_check_stmt(type_checker, &mut ast.stmt)
}

/// Whether `target` assigns the enclosing function's value: `result`, or
/// the routine's own name.
fn is_result_target(type_checker: &TypeChecker, target: &Expr) -> bool {
    match &target.kind {
        ExprKind::Result => true,
        ExprKind::Symbol(name) => {
            type_checker.symbol_table.enclosing_routine_name() == Some(name.as_str())
                && matches!(
                    type_checker.symbol_table.find(name),
                    Some(symbol) if symbol.routine().is_some()
                )
        }
        _ => false,
    }
}

/// Establishes or confirms the enclosing function's result.
fn assign_result(
    type_checker: &mut TypeChecker,
    target: &mut Expr,
    value: Type,
    construct: String,
    position: Position,
) -> Result<(), Error> {
    let (function, declared) = match type_checker.enclosing_routine() {
        Some(symbol) if matches!(symbol.routine(), Some(info) if info.is_function) => {
            (symbol.name.clone(), symbol.ty.clone())
        }
        _ => {
            return Err(MK_ERROR!(
                ErrorImpl::ResultOutsideFunction,
                position,
                construct: construct
            ))
        }
    };

    if declared.is_array() {
        return Err(MK_ERROR!(
            ErrorImpl::ArrayReturnTypeForbidden,
            position,
            function: function,
            received: declared.to_string()
        ));
    }
    if !value.is_compatible_with(&declared) {
        return Err(MK_ERROR!(
            ErrorImpl::ResultTypeMismatch,
            position,
            function: function,
            declared: declared.to_string(),
            returned: value.to_string()
        ));
    }

    match type_checker.symbol_table.lookup_in_current(RESULT) {
        Some(result) => {
            if !value.is_compatible_with(&result.ty) {
                return Err(MK_ERROR!(
                    ErrorImpl::ResultTypeMismatch,
                    position,
                    function: function,
                    declared: result.ty.to_string(),
                    returned: value.to_string()
                ));
            }
        }
        None => {
            trace!("{} establishes its result as {}", function, value);
            type_checker
                .symbol_table
                .declare_variable(RESULT, value, false, position)?;
        }
    }

    target.ty = Some(declared);
    Ok(())
}

/// Rebinds a disposed plain name to its declared pointer type.
fn restore_disposed(type_checker: &mut TypeChecker, target: &mut Expr) -> Result<Option<Type>, Error> {
    let name = match &target.kind {
        ExprKind::Symbol(name) => name.clone(),
        _ => return Ok(None),
    };
    let position = target.span.start.clone();
    let declared = type_checker
        .symbol_table
        .lookup(&name, position.clone())?
        .declared
        .clone();
    if !declared.is_pointer() {
        return Ok(None);
    }

    type_checker
        .symbol_table
        .rebind_type(&name, declared.clone(), position)?;
    target.ty = Some(declared.clone());
    Ok(Some(declared))
}

/// Types an assignment target. A disposed name gets its declared type back
/// when a live pointer is assigned to it.
fn type_check_target(
    type_checker: &mut TypeChecker,
    target: &mut Expr,
    value: &Type,
) -> Result<Type, Error> {
    if !target.is_lvalue() {
        return Err(MK_ERROR!(
            ErrorImpl::NotAssignable,
            target.span.start.clone(),
            construct: target.to_string()
        ));
    }

    let ty = type_check_expr(type_checker, target)?;
    if ty == Type::Nil && value.is_pointer() {
        if let Some(declared) = restore_disposed(type_checker, target)? {
            return Ok(declared);
        }
    }
    Ok(ty)
}

fn type_check_assign(type_checker: &mut TypeChecker, ast: &mut AssignStmt) -> Result<(), Error> {
    let position = ast.span.start.clone();
    let value = type_check_expr(type_checker, &mut ast.value)?;

    if is_result_target(type_checker, &ast.target) {
        let construct = format!("{} := {}", ast.target, ast.value);
        return assign_result(type_checker, &mut ast.target, value, construct, position);
    }

    let target = type_check_target(type_checker, &mut ast.target, &value)?;
    if !target.is_compatible_with(&value) {
        return Err(MK_ERROR!(
            ErrorImpl::AssignmentTypeMismatch,
            position,
            construct: format!("{} := {}", ast.target, ast.value),
            target: target.to_string(),
            value: value.to_string()
        ));
    }
    Ok(())
}

fn type_check_deref_assign(type_checker: &mut TypeChecker, ast: &mut AssignStmt) -> Result<(), Error> {
    let position = ast.span.start.clone();
    let construct = format!("{} ^:= {}", ast.target, ast.value);
    let pointer = type_check_expr(type_checker, &mut ast.value)?;
    let value = dereference(&pointer, &construct, position.clone())?;

    if is_result_target(type_checker, &ast.target) {
        return assign_result(type_checker, &mut ast.target, value, construct, position);
    }

    let target = type_check_target(type_checker, &mut ast.target, &value)?;
    if !target.is_compatible_with(&value) {
        return Err(MK_ERROR!(
            ErrorImpl::AssignmentTypeMismatch,
            position,
            construct: construct,
            target: target.to_string(),
            value: value.to_string()
        ));
    }
    Ok(())
}

/// Types the l-value of `new`/`dispose`. The result pseudo-variable reads as
/// the declared return type.
fn type_check_allocation_target(type_checker: &mut TypeChecker, target: &mut Expr) -> Result<Type, Error> {
    if !target.is_lvalue() {
        return Err(MK_ERROR!(
            ErrorImpl::NotAssignable,
            target.span.start.clone(),
            construct: target.to_string()
        ));
    }
    type_check_expr(type_checker, target)
}

fn type_check_new(type_checker: &mut TypeChecker, ast: &mut NewStmt) -> Result<(), Error> {
    let position = ast.span.start.clone();
    let construct = Stmt::New(ast.clone()).to_string();
    let mut target = type_check_allocation_target(type_checker, &mut ast.target)?;

    // A disposed name may be allocated again.
    if target == Type::Nil {
        if let Some(declared) = restore_disposed(type_checker, &mut ast.target)? {
            target = declared;
        }
    }

    match ast.size.as_mut() {
        Some(size) => {
            let size_type = type_check_expr(type_checker, size)?;
            if !matches!(&target, Type::Pointer { pointee } if pointee.is_array()) {
                return Err(MK_ERROR!(
                    ErrorImpl::InvalidAllocationTarget,
                    position,
                    construct: construct,
                    expected: String::from("a pointer to an array"),
                    received: target.to_string()
                ));
            }
            if size_type != Type::Integer {
                return Err(MK_ERROR!(
                    ErrorImpl::AllocationSizeTypeMismatch,
                    position,
                    construct: construct,
                    received: size_type.to_string()
                ));
            }
        }
        None => match &target {
            Type::Pointer { pointee } => {
                if let Type::Array { size: None, .. } = **pointee {
                    return Err(MK_ERROR!(
                        ErrorImpl::InvalidAllocationTarget,
                        position,
                        construct: construct,
                        expected: String::from("a pointer to a type of known size"),
                        received: target.to_string()
                    ));
                }
            }
            _ => {
                return Err(MK_ERROR!(
                    ErrorImpl::InvalidAllocationTarget,
                    position,
                    construct: construct,
                    expected: String::from("a pointer"),
                    received: target.to_string()
                ))
            }
        },
    }

    type_checker.symbol_table.mark_allocated(&ast.target.to_string());
    Ok(())
}

fn type_check_dispose(type_checker: &mut TypeChecker, ast: &mut DisposeStmt) -> Result<(), Error> {
    let position = ast.span.start.clone();
    let construct = Stmt::Dispose(ast.clone()).to_string();
    let target = type_check_allocation_target(type_checker, &mut ast.target)?;

    let pointee = match &target {
        Type::Pointer { pointee } => pointee,
        _ => {
            return Err(MK_ERROR!(
                ErrorImpl::InvalidAllocationTarget,
                position,
                construct: construct,
                expected: String::from("a pointer"),
                received: target.to_string()
            ))
        }
    };

    let key = ast.target.to_string();
    if !type_checker.symbol_table.is_allocated(&key) {
        return Err(MK_ERROR!(ErrorImpl::DisposeOfUnallocated, position, target: key));
    }
    if ast.array_form && !pointee.is_array() {
        return Err(MK_ERROR!(
            ErrorImpl::InvalidAllocationTarget,
            position,
            construct: construct,
            expected: String::from("a pointer to an array"),
            received: target.to_string()
        ));
    }

    type_checker.symbol_table.unmark_allocated(&key);
    if let ExprKind::Symbol(name) = &ast.target.kind {
        type_checker
            .symbol_table
            .rebind_type(name, Type::Nil, position)?;
    }
    ast.target.ty = Some(Type::Nil);
    Ok(())
}
