//! Type system definitions for the AST.
//!
//! This module defines the types of the language:
//!
//! - Scalar types (integer, real, boolean, char)
//! - Composite types (sized and unsized arrays, pointers)
//! - Marker types used by the analyzer (procedure, nil, result, label)
//!
//! Types are immutable values. Composite types share their components through
//! `Rc`, so cloning a type never copies more than a reference count.

use std::{fmt::Display, rc::Rc};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Integer,
    Real,
    Boolean,
    Char,
    /// `array [n] of T` when `size` is set, `array of T` otherwise.
    Array {
        element: Rc<Type>,
        size: Option<u32>,
    },
    Pointer {
        pointee: Rc<Type>,
    },
    /// The "type" of a procedure symbol and of a procedure call.
    Procedure,
    Nil,
    /// Stands for a function's result until the analyzer rewrites it to the
    /// declared return type.
    ResultPlaceholder,
    /// Tags label symbols.
    LabelMarker,
}

impl Type {
    pub fn array(element: Type, size: Option<u32>) -> Self {
        Type::Array {
            element: Rc::new(element),
            size,
        }
    }

    pub fn pointer(pointee: Type) -> Self {
        Type::Pointer {
            pointee: Rc::new(pointee),
        }
    }

    /// Directional structural compatibility: is a `self` value acceptable
    /// where `other` is checked against it?
    ///
    /// The relation is not symmetric for arrays. A sized array demands the
    /// exact same size on the other side, an unsized one accepts any size.
    pub fn is_compatible_with(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Nil, Type::Nil | Type::Pointer { .. }) => true,
            (Type::Pointer { .. }, Type::Nil) => true,
            (Type::Pointer { pointee: a }, Type::Pointer { pointee: b }) => {
                a.is_compatible_with(b)
            }
            (
                Type::Array {
                    element: a,
                    size: Some(n),
                },
                Type::Array { element: b, size },
            ) => a.is_compatible_with(b) && *size == Some(*n),
            (Type::Array { element: a, size: None }, Type::Array { element: b, .. }) => {
                a.is_compatible_with(b)
            }
            (Type::Array { .. }, _) | (Type::Pointer { .. }, _) => false,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Integer | Type::Real)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }

    /// The element type of an array or the pointee of a pointer.
    pub fn element_type(&self) -> Option<Type> {
        match self {
            Type::Array { element, .. } => Some((**element).clone()),
            Type::Pointer { pointee } => Some((**pointee).clone()),
            _ => None,
        }
    }
}

/// `a` checked against `b`, in that order. See [`Type::is_compatible_with`].
pub fn equals_or_compatible(a: &Type, b: &Type) -> bool {
    a.is_compatible_with(b)
}

pub fn is_numeric(t: &Type) -> bool {
    t.is_numeric()
}

pub fn element_type(t: &Type) -> Option<Type> {
    t.element_type()
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Integer => write!(f, "integer"),
            Type::Real => write!(f, "real"),
            Type::Boolean => write!(f, "boolean"),
            Type::Char => write!(f, "char"),
            Type::Array {
                element,
                size: Some(n),
            } => write!(f, "array [{}] of {}", n, element),
            Type::Array {
                element,
                size: None,
            } => write!(f, "array of {}", element),
            Type::Pointer { pointee } => write!(f, "^{}", pointee),
            Type::Procedure => write!(f, "procedure"),
            Type::Nil => write!(f, "nil"),
            Type::ResultPlaceholder => write!(f, "result"),
            Type::LabelMarker => write!(f, "label"),
        }
    }
}
