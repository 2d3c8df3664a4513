//! Main compiler module.
//!
//! This module contains the core Compiler structure and drives lowering of a
//! checked program into an LLVM module through inkwell: module globals for
//! program variables, one function per routine with its formals, locals and
//! result in entry block allocas, and `main` for the program body.

use std::collections::{HashMap, HashSet};

use inkwell::{
    basic_block::BasicBlock,
    builder::{Builder, BuilderError},
    context::Context,
    module::{Linkage, Module},
    types::{AnyTypeEnum, BasicMetadataTypeEnum, BasicType, BasicTypeEnum, FunctionType, PointerType},
    values::{BasicValue, BasicValueEnum, FunctionValue, PointerValue},
    AddressSpace,
};
use log::{debug, trace};

use crate::{
    ast::{
        ast::{Local, Program},
        statements::{Header, RoutineDeclStmt},
        types::Type,
    },
    errors::errors::{Error, ErrorImpl},
    type_checker::type_checker::{type_check, AnalyzerOptions},
    Position, MK_ERROR,
};

use super::{stdlib::declare_library, stmt::gen_block};

/// Configuration of the whole pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    /// Name given to the produced LLVM module
    pub module_name: String,
    pub analyzer: AnalyzerOptions,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            module_name: String::from("pcl"),
            analyzer: AnalyzerOptions::default(),
        }
    }
}

/// A callable routine as seen by the lowering pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineBinding<'a> {
    pub function: FunctionValue<'a>,
    /// Flattened formals: `(by_reference, declared type)`
    pub params: Vec<(bool, Type)>,
    /// Stack slots of enclosing routines, passed by address after the formals
    pub captures: Vec<usize>,
}

/// Where a name lives once lowered.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding<'a> {
    /// A program variable, stored in a module global.
    Global { pointer: PointerValue<'a> },
    /// A stack slot of some routine. With `reference` set the slot holds the
    /// address of the variable rather than the variable itself.
    Local { slot: usize, reference: bool },
    Routine(RoutineBinding<'a>),
}

/// What `return` hands back from the function being built.
#[derive(Debug, Clone, PartialEq)]
pub enum Returns<'a> {
    /// `main` exits with status 0.
    Zero,
    /// A function returns the content of its result slot.
    Result(PointerValue<'a>),
    Nothing,
}

/// State of the LLVM function currently being built.
#[derive(Debug, Clone)]
pub struct RoutineContext<'a> {
    pub function: FunctionValue<'a>,
    pub returns: Returns<'a>,
    /// Blocks started by labeled statements, created on first mention.
    pub labels: HashMap<String, BasicBlock<'a>>,
    /// Address of every stack slot reachable from this function: its own
    /// allocas and the captured slots it received as parameters.
    pub addresses: HashMap<usize, PointerValue<'a>>,
    /// Slots allocated by this function
    pub frame: Vec<usize>,
}

impl<'a> RoutineContext<'a> {
    fn new(function: FunctionValue<'a>, returns: Returns<'a>) -> Self {
        RoutineContext {
            function,
            returns,
            labels: HashMap::new(),
            addresses: HashMap::new(),
            frame: vec![],
        }
    }
}

/// The main compiler structure that holds the state of the lowering process.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the LLVM context
pub struct Compiler<'a> {
    /// Reference to the LLVM context
    pub context: &'a Context,
    /// The LLVM module being built
    pub module: Module<'a>,
    /// The LLVM IR builder
    pub builder: Builder<'a>,
    /// Bindings of each open lexical scope, innermost last
    scopes: Vec<HashMap<String, Binding<'a>>>,
    /// Functions being built, innermost last. Nested routines are lowered
    /// while their parent is still open.
    routines: Vec<RoutineContext<'a>>,
    /// Storage type of every stack slot, indexed by slot
    slot_types: Vec<BasicTypeEnum<'a>>,
    /// Module level names handed out so far
    names: HashSet<String>,
}

impl<'a> Compiler<'a> {
    pub fn new(context: &'a Context, module_name: &str) -> Self {
        Compiler {
            context,
            module: context.create_module(module_name),
            builder: context.create_builder(),
            scopes: vec![],
            routines: vec![],
            slot_types: vec![],
            names: HashSet::new(),
        }
    }

    pub fn open_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn close_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn bind(&mut self, name: &str, binding: Binding<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), binding);
        }
    }

    /// Innermost binding of `name`.
    pub fn resolve(&self, name: &str) -> Option<&Binding<'a>> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn resolve_routine(&self, name: &str, position: &Position) -> Result<RoutineBinding<'a>, Error> {
        match self.resolve(name) {
            Some(Binding::Routine(routine)) => Ok(routine.clone()),
            _ => Err(invariant(position, &format!("{} is not a lowered routine", name))),
        }
    }

    /// Module level name for `name`; a clash gets a `.N` suffix.
    pub fn unique_name(&mut self, name: &str) -> String {
        let mut candidate = name.to_string();
        let mut suffix = 1;
        while self.names.contains(&candidate) {
            candidate = format!("{}.{}", name, suffix);
            suffix += 1;
        }
        self.names.insert(candidate.clone());
        candidate
    }

    pub fn routine_context(&self) -> Result<&RoutineContext<'a>, Error> {
        self.routines
            .last()
            .ok_or_else(|| invariant(&Position::null(), "statement outside of any function"))
    }

    fn routine_context_mut(&mut self) -> Result<&mut RoutineContext<'a>, Error> {
        self.routines
            .last_mut()
            .ok_or_else(|| invariant(&Position::null(), "statement outside of any function"))
    }

    pub fn current_function(&self) -> Result<FunctionValue<'a>, Error> {
        Ok(self.routine_context()?.function)
    }

    /// Appends a block to the function being built.
    pub fn append_block(&self, name: &str) -> Result<BasicBlock<'a>, Error> {
        let function = self.current_function()?;
        trace!("appending block {} to {:?}", name, function.get_name());
        Ok(self.context.append_basic_block(function, name))
    }

    /// Whether the insertion block already ends in a terminator.
    pub fn is_terminated(&self) -> bool {
        self.builder
            .get_insert_block()
            .map_or(false, |block| block.get_terminator().is_some())
    }

    /// Block of `label` in the function being built.
    pub fn label_block(&mut self, label: &str) -> Result<BasicBlock<'a>, Error> {
        if let Some(block) = self.routine_context()?.labels.get(label) {
            return Ok(*block);
        }

        let block = self.append_block(&format!("label.{}", label))?;
        self.routine_context_mut()?
            .labels
            .insert(label.to_string(), block);
        Ok(block)
    }

    /// Address of `slot` as seen from the function being built.
    pub fn slot_address(&self, slot: usize, position: &Position) -> Result<PointerValue<'a>, Error> {
        self.routine_context()?
            .addresses
            .get(&slot)
            .copied()
            .ok_or_else(|| invariant(position, &format!("stack slot {} is out of reach", slot)))
    }

    pub fn result_slot(&self, position: &Position) -> Result<PointerValue<'a>, Error> {
        match self.routine_context()?.returns {
            Returns::Result(slot) => Ok(slot),
            _ => Err(invariant(position, "result outside of a function")),
        }
    }

    /// Converts a source type to the LLVM type of its storage.
    ///
    /// Unsized arrays only occur behind an address and convert to a pointer
    /// to their element.
    pub fn convert_type(&self, ty: &Type, position: &Position) -> Result<BasicTypeEnum<'a>, Error> {
        match ty {
            Type::Integer => Ok(self.context.i32_type().into()),
            Type::Real => Ok(self.context.f64_type().into()),
            Type::Boolean => Ok(self.context.bool_type().into()),
            Type::Char => Ok(self.context.i8_type().into()),
            Type::Array {
                element,
                size: Some(size),
            } => Ok(self.convert_type(element, position)?.array_type(*size).into()),
            Type::Array { size: None, .. } => Ok(self.address_type(ty, position)?.into()),
            Type::Pointer { pointee } => Ok(self.address_type(pointee, position)?.into()),
            Type::Nil => Ok(self.context.i8_type().ptr_type(AddressSpace::default()).into()),
            Type::Procedure | Type::ResultPlaceholder | Type::LabelMarker => Err(invariant(
                position,
                &format!("{} has no storage representation", ty),
            )),
        }
    }

    /// Type of an address of a `ty` value. The address of an unsized array
    /// points at its first element.
    pub fn address_type(&self, ty: &Type, position: &Position) -> Result<PointerType<'a>, Error> {
        match ty {
            Type::Array {
                element,
                size: None,
            } => Ok(self
                .convert_type(element, position)?
                .ptr_type(AddressSpace::default())),
            _ => Ok(self
                .convert_type(ty, position)?
                .ptr_type(AddressSpace::default())),
        }
    }

    /// LLVM type of a parameter: by-reference formals and arrays travel as addresses.
    pub fn parameter_type(
        &self,
        by_reference: bool,
        ty: &Type,
        position: &Position,
    ) -> Result<BasicTypeEnum<'a>, Error> {
        if by_reference || ty.is_array() {
            return Ok(self.address_type(ty, position)?.into());
        }
        self.convert_type(ty, position)
    }

    pub fn function_type(
        &self,
        params: &[BasicMetadataTypeEnum<'a>],
        ret: Option<BasicTypeEnum<'a>>,
    ) -> FunctionType<'a> {
        match ret {
            Some(ty) => ty.fn_type(params, false),
            None => self.context.void_type().fn_type(params, false),
        }
    }

    /// Type stored behind `address`.
    pub fn pointee(&self, address: PointerValue<'a>, position: &Position) -> Result<BasicTypeEnum<'a>, Error> {
        self.element_type(address.get_type(), position)
    }

    pub fn element_type(&self, pointer: PointerType<'a>, position: &Position) -> Result<BasicTypeEnum<'a>, Error> {
        match pointer.get_element_type() {
            AnyTypeEnum::ArrayType(ty) => Ok(ty.into()),
            AnyTypeEnum::FloatType(ty) => Ok(ty.into()),
            AnyTypeEnum::IntType(ty) => Ok(ty.into()),
            AnyTypeEnum::PointerType(ty) => Ok(ty.into()),
            AnyTypeEnum::StructType(ty) => Ok(ty.into()),
            AnyTypeEnum::VectorType(ty) => Ok(ty.into()),
            ty => Err(invariant(position, &format!("cannot store through a pointer to {:?}", ty))),
        }
    }

    /// Adjusts `value` to the storage type `ty`: integers widen to reals and
    /// pointers are cast to the expected pointee.
    pub fn coerce(&self, value: BasicValueEnum<'a>, ty: BasicTypeEnum<'a>) -> Result<BasicValueEnum<'a>, Error> {
        match (value, ty) {
            (BasicValueEnum::PointerValue(pointer), BasicTypeEnum::PointerType(target))
                if pointer.get_type() != target =>
            {
                Ok(self
                    .builder
                    .build_pointer_cast(pointer, target, "cast")
                    .map_err(backend)?
                    .into())
            }
            (BasicValueEnum::IntValue(int), BasicTypeEnum::FloatType(target)) => Ok(self
                .builder
                .build_signed_int_to_float(int, target, "promoted")
                .map_err(backend)?
                .into()),
            _ => Ok(value),
        }
    }

    pub fn load(&self, address: PointerValue<'a>, name: &str) -> Result<BasicValueEnum<'a>, Error> {
        self.builder.build_load(address, name).map_err(backend)
    }

    /// Stores `value` at `address`, coerced to the stored type.
    pub fn store(&self, address: PointerValue<'a>, value: BasicValueEnum<'a>, position: &Position) -> Result<(), Error> {
        let value = self.coerce(value, self.pointee(address, position)?)?;
        self.builder.build_store(address, value).map_err(backend)?;
        Ok(())
    }

    /// Allocates a stack slot in the function being built.
    fn new_slot(&mut self, ty: BasicTypeEnum<'a>, name: &str) -> Result<usize, Error> {
        let address = self.builder.build_alloca(ty, name).map_err(backend)?;
        let slot = self.slot_types.len();
        self.slot_types.push(ty);

        let context = self.routine_context_mut()?;
        context.addresses.insert(slot, address);
        context.frame.push(slot);
        Ok(slot)
    }

    fn new_global(&mut self, ty: BasicTypeEnum<'a>, name: &str, position: &Position) -> Result<PointerValue<'a>, Error> {
        let name = self.unique_name(name);
        let global = self.module.add_global(ty, None, &name);
        global.set_initializer(&zero(ty, position)?);
        Ok(global.as_pointer_value())
    }

    /// Creates the LLVM function of a routine and binds its name. Every slot
    /// of the enclosing routines becomes a trailing pointer parameter.
    fn declare_routine(&mut self, header: &Header) -> Result<RoutineBinding<'a>, Error> {
        let position = header.span.start.clone();
        let params: Vec<(bool, Type)> = header
            .formals
            .iter()
            .flat_map(|formal| {
                formal
                    .names
                    .iter()
                    .map(move |_| (formal.by_reference, formal.ty.clone()))
            })
            .collect();
        let captures: Vec<usize> = self
            .routines
            .iter()
            .flat_map(|routine| routine.frame.iter().copied())
            .collect();

        let mut param_types = params
            .iter()
            .map(|(by_reference, ty)| {
                self.parameter_type(*by_reference, ty, &position)
                    .map(BasicMetadataTypeEnum::from)
            })
            .collect::<Result<Vec<_>, Error>>()?;
        param_types.extend(
            captures
                .iter()
                .map(|slot| BasicMetadataTypeEnum::from(self.slot_types[*slot].ptr_type(AddressSpace::default()))),
        );
        let ret = match header.is_function() {
            true => Some(self.convert_type(&header.return_type(), &position)?),
            false => None,
        };

        let name = self.unique_name(&header.name);
        let function = self.module.add_function(
            &name,
            self.function_type(&param_types, ret),
            Some(Linkage::External),
        );
        debug!(
            "declared {} as {} with {} captured slots",
            header.signature(),
            name,
            captures.len()
        );

        let routine = RoutineBinding {
            function,
            params,
            captures,
        };
        self.bind(&header.name, Binding::Routine(routine.clone()));
        Ok(routine)
    }

    /// Declares the variables of a body, then lowers its nested routines,
    /// each into a complete LLVM function of its own.
    ///
    /// Storage for every variable exists before the first nested routine is
    /// declared, so its captures cover the whole frame. Names are still bound
    /// in declaration order.
    fn gen_locals(&mut self, locals: &[Local], global: bool) -> Result<(), Error> {
        let mut storage = vec![];
        for var_decl_stmt in locals.iter().filter_map(Local::as_variables) {
            let position = &var_decl_stmt.span.start;
            let ty = self.convert_type(&var_decl_stmt.ty, position)?;
            for name in var_decl_stmt.names.iter() {
                storage.push(match global {
                    true => Binding::Global {
                        pointer: self.new_global(ty, name, position)?,
                    },
                    false => Binding::Local {
                        slot: self.new_slot(ty, name)?,
                        reference: false,
                    },
                });
            }
        }

        let mut storage = storage.into_iter();
        for local in locals.iter() {
            match local {
                Local::Variables(var_decl_stmt) => {
                    for name in var_decl_stmt.names.iter() {
                        if let Some(binding) = storage.next() {
                            self.bind(name, binding);
                        }
                    }
                }
                Local::Labels(_) => {}
                Local::Forward(header) => {
                    self.declare_routine(header)?;
                }
                Local::Routine(routine_decl_stmt) => self.gen_routine(routine_decl_stmt)?,
            }
        }
        Ok(())
    }

    fn gen_routine(&mut self, ast: &RoutineDeclStmt) -> Result<(), Error> {
        let header = &ast.header;
        let position = header.span.start.clone();
        let declared = match self.scopes.last().and_then(|scope| scope.get(&header.name)) {
            Some(Binding::Routine(routine)) => Some(routine.clone()),
            _ => None,
        };
        let routine = match declared {
            Some(routine) => routine,
            None => self.declare_routine(header)?,
        };
        debug!("lowering {}", header.signature());

        let previous_position = self.builder.get_insert_block();
        let entry = self.context.append_basic_block(routine.function, "entry");
        self.builder.position_at_end(entry);
        self.routines
            .push(RoutineContext::new(routine.function, Returns::Nothing));
        self.open_scope();

        let mut params = routine.function.get_param_iter();
        for formal in header.formals.iter() {
            for name in formal.names.iter() {
                let param = params
                    .next()
                    .ok_or_else(|| invariant(&position, &format!("{} lost its parameter {}", header.name, name)))?;
                let copied = !formal.by_reference
                    && matches!(formal.ty, Type::Array { size: Some(_), .. });

                if formal.by_reference || (formal.ty.is_array() && !copied) {
                    let slot = self.new_slot(param.get_type(), name)?;
                    let address = self.slot_address(slot, &position)?;
                    self.store(address, param, &position)?;
                    self.bind(name, Binding::Local { slot, reference: true });
                } else {
                    let ty = self.convert_type(&formal.ty, &position)?;
                    let slot = self.new_slot(ty, name)?;
                    let value = match copied {
                        true => self.load(as_pointer(param, &position)?, name)?,
                        false => param,
                    };
                    let address = self.slot_address(slot, &position)?;
                    self.store(address, value, &position)?;
                    self.bind(name, Binding::Local { slot, reference: false });
                }
            }
        }
        for slot in routine.captures.iter() {
            let param = params
                .next()
                .ok_or_else(|| invariant(&position, &format!("{} lost a captured slot", header.name)))?;
            let address = as_pointer(param, &position)?;
            self.routine_context_mut()?.addresses.insert(*slot, address);
        }

        if header.is_function() {
            let ty = self.convert_type(&header.return_type(), &position)?;
            let slot = self.builder.build_alloca(ty, "result").map_err(backend)?;
            self.routine_context_mut()?.returns = Returns::Result(slot);
        }

        self.gen_locals(&ast.body.locals, false)?;
        gen_block(self, &ast.body.block)?;
        self.finish_function()?;

        self.close_scope();
        match previous_position {
            Some(block) => self.builder.position_at_end(block),
            None => self.builder.clear_insertion_position(),
        }
        Ok(())
    }

    /// Returns from the function being built.
    pub fn gen_return(&mut self) -> Result<(), Error> {
        match self.routine_context()?.returns {
            Returns::Zero => {
                let zero = self.context.i32_type().const_zero();
                self.builder.build_return(Some(&zero)).map_err(backend)?;
            }
            Returns::Result(slot) => {
                let value = self.load(slot, "result")?;
                self.builder.build_return(Some(&value)).map_err(backend)?;
            }
            Returns::Nothing => {
                self.builder.build_return(None).map_err(backend)?;
            }
        }
        Ok(())
    }

    fn finish_function(&mut self) -> Result<(), Error> {
        if !self.is_terminated() {
            self.gen_return()?;
        }
        self.routines.pop();
        Ok(())
    }

    fn gen_program(&mut self, program: &Program) -> Result<(), Error> {
        debug!("lowering program {}", program.name);
        // `malloc` and `free` are declared by the builder on first use.
        let main = self.unique_name("main");
        self.unique_name("malloc");
        self.unique_name("free");

        self.open_scope();
        declare_library(self)?;

        let function = self.module.add_function(
            &main,
            self.context.i32_type().fn_type(&[], false),
            Some(Linkage::External),
        );
        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);
        self.routines
            .push(RoutineContext::new(function, Returns::Zero));

        self.open_scope();
        self.gen_locals(&program.body.locals, true)?;
        gen_block(self, &program.body.block)?;
        self.finish_function()?;

        self.close_scope();
        self.close_scope();
        Ok(())
    }
}

fn zero<'a>(ty: BasicTypeEnum<'a>, position: &Position) -> Result<BasicValueEnum<'a>, Error> {
    match ty {
        BasicTypeEnum::ArrayType(ty) => Ok(ty.const_zero().as_basic_value_enum()),
        BasicTypeEnum::FloatType(ty) => Ok(ty.const_zero().as_basic_value_enum()),
        BasicTypeEnum::IntType(ty) => Ok(ty.const_zero().as_basic_value_enum()),
        BasicTypeEnum::PointerType(ty) => Ok(ty.const_null().as_basic_value_enum()),
        ty => Err(invariant(position, &format!("no zero value for {:?}", ty))),
    }
}

pub fn as_pointer<'a>(value: BasicValueEnum<'a>, position: &Position) -> Result<PointerValue<'a>, Error> {
    match value {
        BasicValueEnum::PointerValue(pointer) => Ok(pointer),
        value => Err(invariant(position, &format!("{:?} is not an address", value))),
    }
}

pub fn invariant(position: &Position, detail: &str) -> Error {
    MK_ERROR!(
        ErrorImpl::LoweringInvariant,
        position.clone(),
        detail: detail.to_string()
    )
}

/// Lifts a failed LLVM builder call.
pub fn backend(error: BuilderError) -> Error {
    invariant(&Position::null(), &error.to_string())
}

/// Lowers a checked program into a verified LLVM module.
///
/// Every expression must carry the type assigned by
/// [`type_check`](crate::type_checker::type_checker::type_check); an
/// unannotated tree fails with `LoweringInvariant`.
pub fn compile<'a>(context: &'a Context, program: &Program, module_name: &str) -> Result<Module<'a>, Error> {
    let mut compiler = Compiler::new(context, module_name);
    compiler.gen_program(program)?;
    compiler
        .module
        .verify()
        .map_err(|message| invariant(&Position::null(), &message.to_string()))?;
    Ok(compiler.module)
}

/// Checks `program`, then lowers it.
pub fn compile_program<'a>(
    context: &'a Context,
    program: &mut Program,
    options: &CompileOptions,
) -> Result<Module<'a>, Error> {
    type_check(program, options.analyzer.clone())?;
    compile(context, program, &options.module_name)
}
