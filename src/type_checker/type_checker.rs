use log::debug;

use crate::{
    ast::{
        ast::{Body, Local, Program},
        statements::{BlockStmt, RoutineDeclStmt},
        types::Type,
    },
    errors::errors::{Error, ErrorImpl},
    Position, MK_ERROR,
};

use super::{
    library::LIBRARY_ROUTINES,
    stmt::type_check_stmt,
    symbol_table::{AllocationTracking, Symbol, SymbolTable},
};

/// Name of the symbol holding a function's value.
pub const RESULT: &str = "result";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyzerOptions {
    pub allocation_tracking: AllocationTracking,
}

#[derive(Debug)]
pub struct TypeChecker {
    pub symbol_table: SymbolTable,
    pub options: AnalyzerOptions,
    /// Gotos of each body being analyzed, checked once the body is done.
    pending_gotos: Vec<Vec<(String, Position)>>,
}

impl TypeChecker {
    /// Creates a checker whose outermost scope holds the library routines.
    pub fn new(options: AnalyzerOptions) -> Result<Self, Error> {
        let mut symbol_table = SymbolTable::new(options.allocation_tracking);
        symbol_table.open_scope(None);
        for routine in LIBRARY_ROUTINES.iter() {
            symbol_table.declare_library_routine(&routine.header())?;
        }

        Ok(TypeChecker {
            symbol_table,
            options,
            pending_gotos: vec![],
        })
    }

    /// The routine whose body is being analyzed.
    pub fn enclosing_routine(&self) -> Option<&Symbol> {
        self.symbol_table.enclosing_routine()
    }

    /// Declared return type of the enclosing function.
    pub fn declared_result_type(&self, construct: &str, position: Position) -> Result<Type, Error> {
        match self.enclosing_routine() {
            Some(symbol) if matches!(symbol.routine(), Some(info) if info.is_function) => {
                Ok(symbol.ty.clone())
            }
            _ => Err(MK_ERROR!(
                ErrorImpl::ResultOutsideFunction,
                position,
                construct: construct.to_string()
            )),
        }
    }

    pub fn record_goto(&mut self, label: &str, position: Position) {
        if let Some(gotos) = self.pending_gotos.last_mut() {
            gotos.push((label.to_string(), position));
        }
    }
}

pub fn type_check_block(type_checker: &mut TypeChecker, ast: &mut BlockStmt) -> Result<(), Error> {
    for stmt in ast.body.iter_mut() {
        type_check_stmt(type_checker, stmt)?;
    }
    Ok(())
}

fn type_check_local(type_checker: &mut TypeChecker, local: &mut Local) -> Result<(), Error> {
    match local {
        Local::Variables(var_decl_stmt) => {
            for name in var_decl_stmt.names.iter() {
                type_checker.symbol_table.declare_variable(
                    name,
                    var_decl_stmt.ty.clone(),
                    false,
                    var_decl_stmt.span.start.clone(),
                )?;
            }
            Ok(())
        }
        Local::Labels(label_decl_stmt) => {
            for name in label_decl_stmt.names.iter() {
                type_checker
                    .symbol_table
                    .declare_label(name, label_decl_stmt.span.start.clone())?;
            }
            Ok(())
        }
        Local::Forward(header) => type_checker
            .symbol_table
            .declare_forward_routine(header, header.span.start.clone()),
        Local::Routine(routine_decl_stmt) => type_check_routine(type_checker, routine_decl_stmt),
    }
}

/// Analyzes local declarations and the block of a body in the current scope.
pub fn type_check_body(type_checker: &mut TypeChecker, ast: &mut Body) -> Result<(), Error> {
    type_checker.pending_gotos.push(vec![]);

    for local in ast.locals.iter_mut() {
        type_check_local(type_checker, local)?;
    }
    type_check_block(type_checker, &mut ast.block)?;

    let gotos = type_checker.pending_gotos.pop().unwrap_or_default();
    for (label, position) in gotos {
        if !type_checker.symbol_table.label_is_bound(&label) {
            return Err(MK_ERROR!(ErrorImpl::UnboundLabel, position, label: label));
        }
    }
    Ok(())
}

pub fn type_check_routine(type_checker: &mut TypeChecker, ast: &mut RoutineDeclStmt) -> Result<(), Error> {
    let header = &ast.header;
    let position = header.span.start.clone();

    // Declared before the body so the routine can call itself.
    if !type_checker.symbol_table.resolve_forward(header, position.clone())? {
        type_checker.symbol_table.declare_routine(header, position)?;
    }

    debug!("analyzing {}", header.signature());
    type_checker.symbol_table.open_scope(Some(&header.name));
    for formal in header.formals.iter() {
        for name in formal.names.iter() {
            type_checker.symbol_table.declare_variable(
                name,
                formal.ty.clone(),
                formal.by_reference,
                formal.span.start.clone(),
            )?;
        }
    }

    type_check_body(type_checker, &mut ast.body)?;

    let end = ast.body.span.end.clone();
    if ast.header.is_function() && type_checker.symbol_table.lookup_in_current(RESULT).is_none() {
        return Err(MK_ERROR!(
            ErrorImpl::MissingFunctionResult,
            end,
            function: ast.header.name.clone()
        ));
    }
    type_checker.symbol_table.close_scope(end)?;
    Ok(())
}

/// Checks `program`, annotating every expression with its type.
///
/// Stops at the first error.
pub fn type_check(program: &mut Program, options: AnalyzerOptions) -> Result<(), Error> {
    let mut type_checker = TypeChecker::new(options)?;

    debug!("analyzing program {}", program.name);
    type_checker.symbol_table.open_scope(None);
    type_check_body(&mut type_checker, &mut program.body)?;
    type_checker
        .symbol_table
        .close_scope(program.body.span.end.clone())?;
    type_checker
        .symbol_table
        .close_scope(program.span.end.clone())?;
    Ok(())
}
