//! Unit tests for the AST and the type system.

use crate::ast::{
    expressions::{BinaryOperator, Expr, OperatorFamily, UnaryOperator},
    statements::{Formal, Header, Stmt},
    types::{element_type, equals_or_compatible, is_numeric, Type},
};

fn all_types() -> Vec<Type> {
    vec![
        Type::Integer,
        Type::Real,
        Type::Boolean,
        Type::Char,
        Type::array(Type::Integer, Some(10)),
        Type::array(Type::Char, None),
        Type::pointer(Type::Real),
        Type::pointer(Type::array(Type::Integer, None)),
        Type::Procedure,
        Type::Nil,
        Type::ResultPlaceholder,
        Type::LabelMarker,
    ]
}

#[test]
fn test_compatibility_is_reflexive() {
    for ty in all_types() {
        assert!(equals_or_compatible(&ty, &ty), "{} is not compatible with itself", ty);
    }
}

#[test]
fn test_distinct_scalars_are_incompatible() {
    assert!(!equals_or_compatible(&Type::Integer, &Type::Real));
    assert!(!equals_or_compatible(&Type::Real, &Type::Integer));
    assert!(!equals_or_compatible(&Type::Char, &Type::Integer));
    assert!(!equals_or_compatible(&Type::Boolean, &Type::Integer));
}

#[test]
fn test_nil_and_pointer_are_mutually_compatible() {
    for pointee in [Type::Integer, Type::array(Type::Real, Some(3)), Type::pointer(Type::Char)] {
        let pointer = Type::pointer(pointee);
        assert!(equals_or_compatible(&Type::Nil, &pointer));
        assert!(equals_or_compatible(&pointer, &Type::Nil));
    }
    assert!(!equals_or_compatible(&Type::Nil, &Type::Integer));
    assert!(!equals_or_compatible(&Type::Integer, &Type::Nil));
}

#[test]
fn test_pointer_compatibility_follows_pointee() {
    assert!(equals_or_compatible(
        &Type::pointer(Type::Integer),
        &Type::pointer(Type::Integer)
    ));
    assert!(!equals_or_compatible(
        &Type::pointer(Type::Integer),
        &Type::pointer(Type::Real)
    ));
}

#[test]
fn test_sized_array_demands_exact_size() {
    let ten = Type::array(Type::Integer, Some(10));
    let five = Type::array(Type::Integer, Some(5));
    assert!(!equals_or_compatible(&ten, &five));
    assert!(!equals_or_compatible(&five, &ten));
}

#[test]
fn test_unsized_array_compatibility_is_directional() {
    let sized = Type::array(Type::Char, Some(6));
    let unsized_array = Type::array(Type::Char, None);

    // The unsized side accepts any size.
    assert!(equals_or_compatible(&unsized_array, &sized));
    // The sized side demands its own size on the other side.
    assert!(!equals_or_compatible(&sized, &unsized_array));
}

#[test]
fn test_array_element_mismatch() {
    assert!(!equals_or_compatible(
        &Type::array(Type::Char, None),
        &Type::array(Type::Integer, Some(3))
    ));
}

#[test]
fn test_pointer_to_unsized_array_is_directional() {
    let to_sized = Type::pointer(Type::array(Type::Integer, Some(4)));
    let to_unsized = Type::pointer(Type::array(Type::Integer, None));
    assert!(equals_or_compatible(&to_unsized, &to_sized));
    assert!(!equals_or_compatible(&to_sized, &to_unsized));
}

#[test]
fn test_numeric_and_element_type() {
    assert!(is_numeric(&Type::Integer));
    assert!(is_numeric(&Type::Real));
    assert!(!is_numeric(&Type::Char));
    assert_eq!(element_type(&Type::array(Type::Real, Some(2))), Some(Type::Real));
    assert_eq!(element_type(&Type::pointer(Type::Char)), Some(Type::Char));
    assert_eq!(element_type(&Type::Integer), None);
}

#[test]
fn test_type_display() {
    assert_eq!(Type::array(Type::Integer, Some(10)).to_string(), "array [10] of integer");
    assert_eq!(Type::array(Type::Char, None).to_string(), "array of char");
    assert_eq!(Type::pointer(Type::Real).to_string(), "^real");
    assert_eq!(Type::Nil.to_string(), "nil");
}

#[test]
fn test_shared_types_compare_structurally() {
    let element = Type::array(Type::Integer, Some(3));
    let a = Type::pointer(element.clone());
    let b = Type::pointer(element);
    assert_eq!(a, b);
}

#[test]
fn test_operator_families() {
    assert_eq!(BinaryOperator::Star.family(), OperatorFamily::Arithmetic);
    assert_eq!(BinaryOperator::Slash.family(), OperatorFamily::Divide);
    assert_eq!(BinaryOperator::Mod.family(), OperatorFamily::IntegerDivision);
    assert_eq!(BinaryOperator::NotEquals.family(), OperatorFamily::Equality);
    assert_eq!(BinaryOperator::GreaterEquals.family(), OperatorFamily::Relational);
    assert_eq!(BinaryOperator::Or.family(), OperatorFamily::Logical);
}

#[test]
fn test_expression_display() {
    let expr = Expr::binary(
        Expr::index(Expr::symbol("a"), Expr::integer(1)),
        BinaryOperator::Div,
        Expr::prefix(UnaryOperator::Minus, Expr::deref(Expr::symbol("p"))),
    );
    assert_eq!(expr.to_string(), "(a[1] div -p^)");
    assert_eq!(Expr::call("f", vec![Expr::real(1.5), Expr::char(b'x')]).to_string(), "f(1.5, 'x')");
}

#[test]
fn test_lvalues() {
    assert!(Expr::symbol("x").is_lvalue());
    assert!(Expr::deref(Expr::symbol("p")).is_lvalue());
    assert!(Expr::index(Expr::symbol("a"), Expr::integer(0)).is_lvalue());
    assert!(Expr::string("hello").is_lvalue());
    assert!(!Expr::integer(1).is_lvalue());
    assert!(!Expr::call("f", vec![]).is_lvalue());
}

#[test]
fn test_header_signature_and_arity() {
    let header = Header::function(
        "f",
        vec![
            Formal::by_value(&["a", "b"], Type::Integer),
            Formal::by_reference(&["s"], Type::array(Type::Char, None)),
        ],
        Type::Real,
    );
    assert_eq!(header.arity(), 3);
    assert_eq!(
        header.signature(),
        "function f(a, b: integer; var s: array of char): real"
    );
    assert_eq!(header.return_type(), Type::Real);
    assert!(Header::procedure("p", vec![]).return_type() == Type::Procedure);
}

#[test]
fn test_statement_display() {
    assert_eq!(Stmt::new_array(Expr::integer(4), Expr::symbol("p")).to_string(), "new [4] p");
    assert_eq!(Stmt::dispose_array(Expr::symbol("p")).to_string(), "dispose [] p");
    assert_eq!(Stmt::goto("L").to_string(), "goto L");
}
