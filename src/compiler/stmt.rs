//! Statement lowering.
//!
//! Control flow becomes basic blocks: `if` splits into then/else/ifcont,
//! `while` into whilecond/whilebody/whileend with a back edge, and labels get
//! a block of their own that `goto` branches to.

use inkwell::{types::BasicTypeEnum, values::BasicValueEnum};
use log::trace;

use crate::{
    ast::statements::{AssignStmt, BlockStmt, DisposeStmt, IfStmt, NewStmt, Stmt, WhileStmt},
    errors::errors::Error,
};

use super::{
    compiler::{as_pointer, backend, invariant, Compiler},
    expr::{gen_address, gen_call, gen_expression},
};

pub fn gen_block(compiler: &mut Compiler, block: &BlockStmt) -> Result<(), Error> {
    for stmt in block.body.iter() {
        gen_statement(compiler, stmt)?;
    }
    Ok(())
}

pub fn gen_statement(compiler: &mut Compiler, statement: &Stmt) -> Result<(), Error> {
    match statement {
        Stmt::Empty(_) => Ok(()),
        Stmt::Assign(assign_stmt) => gen_assign(compiler, assign_stmt),
        Stmt::DerefAssign(assign_stmt) => gen_deref_assign(compiler, assign_stmt),
        Stmt::Block(block_stmt) => gen_block(compiler, block_stmt),
        Stmt::Call(call_stmt) => {
            gen_call(compiler, &call_stmt.call, &call_stmt.span.start)?;
            Ok(())
        }
        Stmt::If(if_stmt) => gen_if(compiler, if_stmt),
        Stmt::While(while_stmt) => gen_while(compiler, while_stmt),
        Stmt::Labeled(labeled_stmt) => {
            let block = compiler.label_block(&labeled_stmt.label)?;
            if !compiler.is_terminated() {
                compiler
                    .builder
                    .build_unconditional_branch(block)
                    .map_err(backend)?;
            }
            compiler.builder.position_at_end(block);
            gen_statement(compiler, &labeled_stmt.stmt)
        }
        Stmt::Goto(goto_stmt) => {
            let block = compiler.label_block(&goto_stmt.label)?;
            compiler
                .builder
                .build_unconditional_branch(block)
                .map_err(backend)?;
            continue_after(compiler, "aftergoto")
        }
        Stmt::Return(_) => {
            compiler.gen_return()?;
            continue_after(compiler, "afterreturn")
        }
        Stmt::New(new_stmt) => gen_new(compiler, new_stmt),
        Stmt::Dispose(dispose_stmt) => gen_dispose(compiler, dispose_stmt),
    }
}

/// Starts an unreachable block for the statements following a jump.
fn continue_after(compiler: &mut Compiler, name: &str) -> Result<(), Error> {
    let block = compiler.append_block(name)?;
    compiler.builder.position_at_end(block);
    Ok(())
}

fn gen_assign(compiler: &mut Compiler, ast: &AssignStmt) -> Result<(), Error> {
    let address = gen_address(compiler, &ast.target)?;
    let value = gen_expression(compiler, &ast.value)?;
    compiler.store(address, value, &ast.span.start)
}

/// `target ^:= pointer` stores the value `pointer` points to.
fn gen_deref_assign(compiler: &mut Compiler, ast: &AssignStmt) -> Result<(), Error> {
    let address = gen_address(compiler, &ast.target)?;
    let pointer = as_pointer(gen_expression(compiler, &ast.value)?, &ast.span.start)?;
    let value = compiler.load(pointer, "pointee")?;
    compiler.store(address, value, &ast.span.start)
}

fn gen_if(compiler: &mut Compiler, ast: &IfStmt) -> Result<(), Error> {
    let condition = match gen_expression(compiler, &ast.condition)? {
        BasicValueEnum::IntValue(condition) => condition,
        value => {
            return Err(invariant(
                &ast.span.start,
                &format!("{:?} is not a condition", value),
            ))
        }
    };

    let then_block = compiler.append_block("then")?;
    let else_block = compiler.append_block("else")?;
    let merge_block = compiler.append_block("ifcont")?;
    trace!("if {} lowered to then/else/ifcont", ast.condition);

    compiler
        .builder
        .build_conditional_branch(condition, then_block, else_block)
        .map_err(backend)?;

    compiler.builder.position_at_end(then_block);
    gen_statement(compiler, &ast.consequent)?;
    if !compiler.is_terminated() {
        compiler
            .builder
            .build_unconditional_branch(merge_block)
            .map_err(backend)?;
    }

    compiler.builder.position_at_end(else_block);
    if let Some(alternate) = &ast.alternate {
        gen_statement(compiler, alternate)?;
    }
    if !compiler.is_terminated() {
        compiler
            .builder
            .build_unconditional_branch(merge_block)
            .map_err(backend)?;
    }

    compiler.builder.position_at_end(merge_block);
    Ok(())
}

fn gen_while(compiler: &mut Compiler, ast: &WhileStmt) -> Result<(), Error> {
    let cond_block = compiler.append_block("whilecond")?;
    let body_block = compiler.append_block("whilebody")?;
    let end_block = compiler.append_block("whileend")?;

    compiler
        .builder
        .build_unconditional_branch(cond_block)
        .map_err(backend)?;

    compiler.builder.position_at_end(cond_block);
    let condition = match gen_expression(compiler, &ast.condition)? {
        BasicValueEnum::IntValue(condition) => condition,
        value => {
            return Err(invariant(
                &ast.span.start,
                &format!("{:?} is not a condition", value),
            ))
        }
    };
    compiler
        .builder
        .build_conditional_branch(condition, body_block, end_block)
        .map_err(backend)?;

    compiler.builder.position_at_end(body_block);
    gen_statement(compiler, &ast.body)?;
    if !compiler.is_terminated() {
        compiler
            .builder
            .build_unconditional_branch(cond_block)
            .map_err(backend)?;
    }

    compiler.builder.position_at_end(end_block);
    Ok(())
}

/// Allocates on the heap and stores the block in the target pointer. The
/// allocation size follows from the pointer's own LLVM type, so a pointer
/// left typed `nil` by an earlier dispose still gets its declared pointee.
fn gen_new(compiler: &mut Compiler, ast: &NewStmt) -> Result<(), Error> {
    let position = &ast.span.start;
    let address = gen_address(compiler, &ast.target)?;
    let pointee = match compiler.pointee(address, position)? {
        BasicTypeEnum::PointerType(pointer) => compiler.element_type(pointer, position)?,
        ty => {
            return Err(invariant(
                position,
                &format!("cannot allocate through {:?}", ty),
            ))
        }
    };

    let block = match &ast.size {
        Some(size) => {
            let count = match gen_expression(compiler, size)? {
                BasicValueEnum::IntValue(count) => count,
                value => return Err(invariant(position, &format!("{:?} is not a size", value))),
            };
            compiler
                .builder
                .build_array_malloc(pointee, count, "block")
                .map_err(backend)?
        }
        None => compiler
            .builder
            .build_malloc(pointee, "block")
            .map_err(backend)?,
    };
    compiler.store(address, block.into(), position)
}

/// Frees the block and leaves `nil` in the pointer.
fn gen_dispose(compiler: &mut Compiler, ast: &DisposeStmt) -> Result<(), Error> {
    let position = &ast.span.start;
    let address = gen_address(compiler, &ast.target)?;
    let block = as_pointer(compiler.load(address, "block")?, position)?;
    compiler.builder.build_free(block).map_err(backend)?;
    compiler.store(address, block.get_type().const_null().into(), position)
}
