//! The predefined library routines every program can call.

use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::ast::{
    statements::{Formal, Header},
    types::Type,
};

/// Parameter and return types that occur in library signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LibraryType {
    Integer,
    Real,
    Boolean,
    Char,
    /// `array of char`
    CharArray,
}

impl LibraryType {
    pub fn to_type(self) -> Type {
        match self {
            LibraryType::Integer => Type::Integer,
            LibraryType::Real => Type::Real,
            LibraryType::Boolean => Type::Boolean,
            LibraryType::Char => Type::Char,
            LibraryType::CharArray => Type::array(Type::Char, None),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryParameter {
    pub name: &'static str,
    pub by_reference: bool,
    pub ty: LibraryType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryRoutine {
    pub name: &'static str,
    pub parameters: Vec<LibraryParameter>,
    /// `None` for procedures.
    pub return_type: Option<LibraryType>,
}

impl LibraryRoutine {
    /// The routine's header, as if it had been declared in source.
    pub fn header(&self) -> Header {
        let formals = self
            .parameters
            .iter()
            .map(|parameter| match parameter.by_reference {
                true => Formal::by_reference(&[parameter.name], parameter.ty.to_type()),
                false => Formal::by_value(&[parameter.name], parameter.ty.to_type()),
            })
            .collect();
        match self.return_type {
            Some(ty) => Header::function(self.name, formals, ty.to_type()),
            None => Header::procedure(self.name, formals),
        }
    }
}

fn value(name: &'static str, ty: LibraryType) -> LibraryParameter {
    LibraryParameter {
        name,
        by_reference: false,
        ty,
    }
}

fn reference(name: &'static str, ty: LibraryType) -> LibraryParameter {
    LibraryParameter {
        name,
        by_reference: true,
        ty,
    }
}

fn routine(
    name: &'static str,
    parameters: Vec<LibraryParameter>,
    return_type: Option<LibraryType>,
) -> LibraryRoutine {
    LibraryRoutine {
        name,
        parameters,
        return_type,
    }
}

lazy_static! {
    /// The standard library, in registration order.
    pub static ref LIBRARY_ROUTINES: Vec<LibraryRoutine> = {
        use LibraryType::*;
        vec![
            routine("writeInteger", vec![value("n", Integer)], None),
            routine("writeBoolean", vec![value("b", Boolean)], None),
            routine("writeChar", vec![value("c", Char)], None),
            routine("writeReal", vec![value("r", Real)], None),
            routine("writeString", vec![reference("s", CharArray)], None),
            routine("readInteger", vec![], Some(Integer)),
            routine("readBoolean", vec![], Some(Boolean)),
            routine("readChar", vec![], Some(Char)),
            routine("readReal", vec![], Some(Real)),
            routine("readString", vec![value("size", Integer), reference("s", CharArray)], None),
            routine("abs", vec![value("n", Integer)], Some(Integer)),
            routine("fabs", vec![value("r", Real)], Some(Real)),
            routine("sqrt", vec![value("r", Real)], Some(Real)),
            routine("sin", vec![value("r", Real)], Some(Real)),
            routine("cos", vec![value("r", Real)], Some(Real)),
            routine("tan", vec![value("r", Real)], Some(Real)),
            routine("arctan", vec![value("r", Real)], Some(Real)),
            routine("exp", vec![value("r", Real)], Some(Real)),
            routine("ln", vec![value("r", Real)], Some(Real)),
            routine("pi", vec![], Some(Real)),
            routine("trunc", vec![value("r", Real)], Some(Integer)),
            routine("round", vec![value("r", Real)], Some(Integer)),
            routine("ord", vec![value("c", Char)], Some(Integer)),
            routine("chr", vec![value("n", Integer)], Some(Char)),
        ]
    };

    pub static ref LIBRARY_LOOKUP: HashMap<&'static str, usize> = {
        let mut map = HashMap::new();
        for (index, routine) in LIBRARY_ROUTINES.iter().enumerate() {
            map.insert(routine.name, index);
        }
        map
    };
}

pub fn get_library_routine(name: &str) -> Option<&'static LibraryRoutine> {
    LIBRARY_LOOKUP
        .get(name)
        .and_then(|index| LIBRARY_ROUTINES.get(*index))
}
