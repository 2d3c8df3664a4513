//! Expression lowering.
//!
//! Values are produced from the static types the analyzer left on each node:
//! integers promote to reals where an operand is real, `/` always divides
//! reals and `div`/`mod` stay integral.

use inkwell::{
    values::{BasicMetadataValueEnum, BasicValueEnum, FloatValue, IntValue, PointerValue},
    AddressSpace, FloatPredicate, IntPredicate,
};

use crate::{
    ast::{
        expressions::{BinaryExpr, BinaryOperator, CallExpr, Expr, ExprKind, PrefixExpr, UnaryOperator},
        types::Type,
    },
    errors::errors::Error,
    Position,
};

use super::compiler::{as_pointer, backend, invariant, Binding, Compiler};

/// The type the analyzer assigned to `expr`.
pub fn static_type(expr: &Expr) -> Result<&Type, Error> {
    expr.get_type()
        .ok_or_else(|| invariant(&expr.span.start, &format!("{} was never type checked", expr)))
}

fn as_int<'a>(value: BasicValueEnum<'a>, position: &Position) -> Result<IntValue<'a>, Error> {
    match value {
        BasicValueEnum::IntValue(int) => Ok(int),
        value => Err(invariant(position, &format!("{:?} is not an integer", value))),
    }
}

fn as_float<'a>(value: BasicValueEnum<'a>, position: &Position) -> Result<FloatValue<'a>, Error> {
    match value {
        BasicValueEnum::FloatValue(float) => Ok(float),
        value => Err(invariant(position, &format!("{:?} is not a real", value))),
    }
}

/// Generates the value of `expression`.
pub fn gen_expression<'a>(compiler: &mut Compiler<'a>, expression: &Expr) -> Result<BasicValueEnum<'a>, Error> {
    let position = &expression.span.start;
    match &expression.kind {
        ExprKind::Integer(value) => Ok(compiler
            .context
            .i32_type()
            .const_int(*value as u64, true)
            .into()),
        ExprKind::Real(value) => Ok(compiler.context.f64_type().const_float(*value).into()),
        ExprKind::Char(value) => Ok(compiler
            .context
            .i8_type()
            .const_int(*value as u64, false)
            .into()),
        ExprKind::Boolean(value) => Ok(compiler
            .context
            .bool_type()
            .const_int(*value as u64, false)
            .into()),
        ExprKind::Nil => Ok(compiler
            .context
            .i8_type()
            .ptr_type(AddressSpace::default())
            .const_null()
            .into()),
        // A string is used through the address of its first character.
        ExprKind::String(_) => Ok(gen_address(compiler, expression)?.into()),
        ExprKind::Symbol(_) | ExprKind::Result | ExprKind::Index(_) | ExprKind::Deref(_) => {
            if let Type::Array { size: None, .. } = static_type(expression)? {
                return Err(invariant(
                    position,
                    &format!("{} has no size and cannot be loaded", expression),
                ));
            }
            let address = gen_address(compiler, expression)?;
            compiler.load(address, "")
        }
        ExprKind::AddressOf(target) => Ok(gen_address(compiler, target)?.into()),
        ExprKind::Binary(binary) => gen_binary(compiler, binary, position),
        ExprKind::Prefix(prefix) => gen_prefix(compiler, prefix, position),
        ExprKind::Call(call) => gen_call(compiler, call, position)?.ok_or_else(|| {
            invariant(
                position,
                &format!("procedure {} used as a value", call.routine),
            )
        }),
    }
}

/// Generates the address of the l-value `expression`.
pub fn gen_address<'a>(
    compiler: &mut Compiler<'a>,
    expression: &Expr,
) -> Result<PointerValue<'a>, Error> {
    let position = &expression.span.start;
    match &expression.kind {
        ExprKind::Symbol(name) => {
            let current = compiler.current_function()?;
            match compiler.resolve(name).cloned() {
                Some(Binding::Global { pointer }) => Ok(pointer),
                Some(Binding::Local { slot, reference }) => {
                    let address = compiler.slot_address(slot, position)?;
                    match reference {
                        true => as_pointer(compiler.load(address, name)?, position),
                        false => Ok(address),
                    }
                }
                // The enclosing function's own name stands for its result.
                Some(Binding::Routine(routine)) if routine.function == current => {
                    compiler.result_slot(position)
                }
                _ => Err(invariant(position, &format!("{} has no storage", name))),
            }
        }
        ExprKind::Result => compiler.result_slot(position),
        ExprKind::Index(index) => {
            let sized = matches!(static_type(&index.base)?, Type::Array { size: Some(_), .. });
            let base = gen_address(compiler, &index.base)?;
            let offset = as_int(gen_expression(compiler, &index.index)?, position)?;
            let indices = match sized {
                true => vec![compiler.context.i32_type().const_zero(), offset],
                false => vec![offset],
            };
            // The analyzer only admits integer indices into array typed bases.
            unsafe {
                compiler
                    .builder
                    .build_in_bounds_gep(base, &indices, "element")
                    .map_err(backend)
            }
        }
        ExprKind::Deref(pointer) => {
            let value = gen_expression(compiler, pointer)?;
            as_pointer(value, position)
        }
        ExprKind::String(value) => Ok(compiler
            .builder
            .build_global_string_ptr(value, "string")
            .map_err(backend)?
            .as_pointer_value()),
        _ => Err(invariant(
            position,
            &format!("{} is not an l-value", expression),
        )),
    }
}

/// Converts an integer operand to a real one.
fn promote<'a>(
    compiler: &Compiler<'a>,
    value: BasicValueEnum<'a>,
    position: &Position,
) -> Result<FloatValue<'a>, Error> {
    match value {
        BasicValueEnum::IntValue(int) => compiler
            .builder
            .build_signed_int_to_float(int, compiler.context.f64_type(), "promoted")
            .map_err(backend),
        value => as_float(value, position),
    }
}

fn predicates(operator: BinaryOperator) -> Option<(IntPredicate, FloatPredicate)> {
    match operator {
        BinaryOperator::Equals => Some((IntPredicate::EQ, FloatPredicate::OEQ)),
        BinaryOperator::NotEquals => Some((IntPredicate::NE, FloatPredicate::ONE)),
        BinaryOperator::Less => Some((IntPredicate::SLT, FloatPredicate::OLT)),
        BinaryOperator::Greater => Some((IntPredicate::SGT, FloatPredicate::OGT)),
        BinaryOperator::LessEquals => Some((IntPredicate::SLE, FloatPredicate::OLE)),
        BinaryOperator::GreaterEquals => Some((IntPredicate::SGE, FloatPredicate::OGE)),
        _ => None,
    }
}

fn gen_compare<'a>(
    compiler: &Compiler<'a>,
    (int_predicate, float_predicate): (IntPredicate, FloatPredicate),
    (left, left_type): (BasicValueEnum<'a>, &Type),
    (right, right_type): (BasicValueEnum<'a>, &Type),
    position: &Position,
) -> Result<BasicValueEnum<'a>, Error> {
    let builder = &compiler.builder;
    if left_type.is_numeric() && right_type.is_numeric() && (left.is_float_value() || right.is_float_value()) {
        let left = promote(compiler, left, position)?;
        let right = promote(compiler, right, position)?;
        return Ok(builder
            .build_float_compare(float_predicate, left, right, "compare")
            .map_err(backend)?
            .into());
    }

    let (left, right) = match (left, right) {
        (BasicValueEnum::PointerValue(left), BasicValueEnum::PointerValue(right)) => {
            // Pointers of different pointees, `nil` included, compare as addresses.
            let address = compiler.context.i64_type();
            (
                builder.build_ptr_to_int(left, address, "address").map_err(backend)?,
                builder.build_ptr_to_int(right, address, "address").map_err(backend)?,
            )
        }
        (left, right) => (as_int(left, position)?, as_int(right, position)?),
    };
    Ok(builder
        .build_int_compare(int_predicate, left, right, "compare")
        .map_err(backend)?
        .into())
}

/// Both operands are always evaluated, left first; there is no short circuit.
fn gen_binary<'a>(
    compiler: &mut Compiler<'a>,
    ast: &BinaryExpr,
    position: &Position,
) -> Result<BasicValueEnum<'a>, Error> {
    let left_type = static_type(&ast.left)?.clone();
    let right_type = static_type(&ast.right)?.clone();
    let left = gen_expression(compiler, &ast.left)?;
    let right = gen_expression(compiler, &ast.right)?;
    let integers = left_type == Type::Integer && right_type == Type::Integer;

    if let Some(predicates) = predicates(ast.operator) {
        return gen_compare(
            compiler,
            predicates,
            (left, &left_type),
            (right, &right_type),
            position,
        );
    }

    let builder = &compiler.builder;
    let value: BasicValueEnum = match ast.operator {
        BinaryOperator::Plus | BinaryOperator::Minus | BinaryOperator::Star if integers => {
            let left = as_int(left, position)?;
            let right = as_int(right, position)?;
            match ast.operator {
                BinaryOperator::Plus => builder.build_int_add(left, right, "add"),
                BinaryOperator::Minus => builder.build_int_sub(left, right, "sub"),
                _ => builder.build_int_mul(left, right, "mul"),
            }
            .map_err(backend)?
            .into()
        }
        BinaryOperator::Plus | BinaryOperator::Minus | BinaryOperator::Star | BinaryOperator::Slash => {
            let left = promote(compiler, left, position)?;
            let right = promote(compiler, right, position)?;
            match ast.operator {
                BinaryOperator::Plus => builder.build_float_add(left, right, "add"),
                BinaryOperator::Minus => builder.build_float_sub(left, right, "sub"),
                BinaryOperator::Star => builder.build_float_mul(left, right, "mul"),
                _ => builder.build_float_div(left, right, "div"),
            }
            .map_err(backend)?
            .into()
        }
        BinaryOperator::Div | BinaryOperator::Mod | BinaryOperator::And | BinaryOperator::Or => {
            let left = as_int(left, position)?;
            let right = as_int(right, position)?;
            match ast.operator {
                BinaryOperator::Div => builder.build_int_signed_div(left, right, "div"),
                BinaryOperator::Mod => builder.build_int_signed_rem(left, right, "mod"),
                BinaryOperator::And => builder.build_and(left, right, "and"),
                _ => builder.build_or(left, right, "or"),
            }
            .map_err(backend)?
            .into()
        }
        _ => {
            return Err(invariant(
                position,
                &format!("operator {} has no lowering", ast.operator),
            ))
        }
    };
    Ok(value)
}

fn gen_prefix<'a>(
    compiler: &mut Compiler<'a>,
    ast: &PrefixExpr,
    position: &Position,
) -> Result<BasicValueEnum<'a>, Error> {
    let operand = gen_expression(compiler, &ast.operand)?;
    let builder = &compiler.builder;
    match (ast.operator, static_type(&ast.operand)?) {
        (UnaryOperator::Plus, _) => Ok(operand),
        (UnaryOperator::Minus, Type::Integer) => Ok(builder
            .build_int_neg(as_int(operand, position)?, "neg")
            .map_err(backend)?
            .into()),
        (UnaryOperator::Minus, Type::Real) => Ok(builder
            .build_float_neg(as_float(operand, position)?, "neg")
            .map_err(backend)?
            .into()),
        (UnaryOperator::Not, Type::Boolean) => Ok(builder
            .build_not(as_int(operand, position)?, "not")
            .map_err(backend)?
            .into()),
        (operator, ty) => Err(invariant(
            position,
            &format!("operator {} has no lowering for {}", operator, ty),
        )),
    }
}

/// Generates a call. By-reference and array arguments are passed by
/// address, followed by the addresses of the slots the callee captures.
///
/// Returns `None` for procedures.
pub fn gen_call<'a>(
    compiler: &mut Compiler<'a>,
    ast: &CallExpr,
    position: &Position,
) -> Result<Option<BasicValueEnum<'a>>, Error> {
    let routine = compiler.resolve_routine(&ast.routine, position)?;
    if routine.params.len() != ast.arguments.len() {
        return Err(invariant(
            position,
            &format!("call of {} does not match its signature", ast.routine),
        ));
    }

    let mut arguments: Vec<BasicMetadataValueEnum> = vec![];
    for ((by_reference, ty), argument) in routine.params.iter().zip(ast.arguments.iter()) {
        let param_type = compiler.parameter_type(*by_reference, ty, position)?;
        let value: BasicValueEnum = match *by_reference || ty.is_array() {
            true => gen_address(compiler, argument)?.into(),
            false => gen_expression(compiler, argument)?,
        };
        arguments.push(compiler.coerce(value, param_type)?.into());
    }
    for slot in routine.captures.iter() {
        arguments.push(compiler.slot_address(*slot, position)?.into());
    }

    let call = compiler
        .builder
        .build_call(routine.function, &arguments, "")
        .map_err(backend)?;
    Ok(call.try_as_basic_value().left())
}
