//! Standard library declarations.
//!
//! The library routines are implemented by the runtime the module is linked
//! against. Lowering only declares them as external functions and binds their
//! names in the outermost scope so calls resolve like calls to user routines.

use inkwell::{module::Linkage, types::BasicMetadataTypeEnum};

use crate::{
    errors::errors::Error,
    type_checker::library::LIBRARY_ROUTINES,
    Position,
};

use super::compiler::{Binding, Compiler, RoutineBinding};

pub fn declare_library(compiler: &mut Compiler) -> Result<(), Error> {
    let position = Position::null();

    for routine in LIBRARY_ROUTINES.iter() {
        let params = routine
            .parameters
            .iter()
            .map(|parameter| (parameter.by_reference, parameter.ty.to_type()))
            .collect::<Vec<_>>();
        let param_types = params
            .iter()
            .map(|(by_reference, ty)| {
                compiler
                    .parameter_type(*by_reference, ty, &position)
                    .map(BasicMetadataTypeEnum::from)
            })
            .collect::<Result<Vec<_>, Error>>()?;
        let ret = match routine.return_type {
            Some(ty) => Some(compiler.convert_type(&ty.to_type(), &position)?),
            None => None,
        };

        let name = compiler.unique_name(routine.name);
        let function = compiler.module.add_function(
            &name,
            compiler.function_type(&param_types, ret),
            Some(Linkage::External),
        );
        compiler.bind(
            routine.name,
            Binding::Routine(RoutineBinding {
                function,
                params,
                captures: vec![],
            }),
        );
    }
    Ok(())
}
