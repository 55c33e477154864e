use jlclass::JavaType;
use jlexpr::build::*;
use jlexpr::{BuildResult, Expression, TypeConverter, UnaryOp, Value};

fn p(ty: JavaType, index: usize) -> Expression {
    parameter(ty, index).unwrap()
}

fn to(ty: JavaType, expression: &Expression) -> Expression {
    TypeConverter::new(ty).convert(expression).unwrap()
}

#[test]
fn same_type_returns_the_same_node() {
    let x = add(p(JavaType::INT, 0), constant_of(2)).unwrap();
    assert!(to(JavaType::INT, &x).ptr_eq(&x));
}

#[test]
fn integer_literals_become_booleans() {
    assert_eq!(to(JavaType::BOOLEAN, &constant_of(1)).as_bool_constant(), Some(true));
    assert_eq!(to(JavaType::BOOLEAN, &constant_of(0)).as_bool_constant(), Some(false));

    let error = TypeConverter::new(JavaType::BOOLEAN)
        .convert(&constant_of(2))
        .unwrap_err();
    assert!(error.is_illegal_conversion(), "{error}");
}

#[test]
fn numeric_constants_are_cast_at_build_time() {
    let widened = to(JavaType::LONG, &constant_of(3));
    assert_eq!(widened.as_constant(), Some(&Value::Long(3)));
    assert_eq!(widened.result_type(), &JavaType::LONG);

    assert_eq!(to(JavaType::DOUBLE, &constant_of(3)).as_constant(), Some(&Value::Double(3.0)));
    assert_eq!(to(JavaType::INT, &constant_of(3.7)).as_constant(), Some(&Value::Int(3)));
    assert_eq!(to(JavaType::BYTE, &constant_of(300)).as_constant(), Some(&Value::Byte(44)));
    assert_eq!(to(JavaType::CHAR, &constant_of(65)).as_constant(), Some(&Value::Char(65)));
}

#[test]
fn constants_box_and_unbox() {
    let integer = JavaType::class("java/lang/Integer");
    let boxed = to(integer.clone(), &constant_of(5));
    assert_eq!(boxed.as_constant(), Some(&Value::Int(5)));
    assert_eq!(boxed.result_type(), &integer);

    let unboxed = to(JavaType::LONG, &boxed);
    assert_eq!(unboxed.as_constant(), Some(&Value::Long(5)));

    let object = to(JavaType::object(), &constant_of(5));
    assert_eq!(object.result_type(), &JavaType::object());
}

#[test]
fn null_adopts_any_reference_type() {
    let null = null(JavaType::object()).unwrap();
    let typed = to(JavaType::string(), &null);
    assert_eq!(typed.as_constant(), Some(&Value::Null));
    assert_eq!(typed.result_type(), &JavaType::string());
}

#[test]
fn conversion_is_pushed_into_conditional_arms() {
    let test = greater_than(p(JavaType::INT, 0), constant_of(5)).unwrap();
    let arms = condition(test.clone(), constant_of(1), constant_of(0)).unwrap();
    assert_eq!(arms.result_type(), &JavaType::INT);
    assert_eq!(to(JavaType::BOOLEAN, &arms), test);

    let inverted = condition(test.clone(), constant_of(0), constant_of(1)).unwrap();
    assert_eq!(to(JavaType::BOOLEAN, &inverted), logical_not(test).unwrap());
}

#[test]
fn reference_parameters_are_narrowed_in_place() {
    let refined = to(JavaType::string(), &p(JavaType::object(), 1));
    assert_eq!(refined.as_parameter(), Some(1));
    assert_eq!(refined.result_type(), &JavaType::string());

    let widened = p(JavaType::string(), 0);
    assert!(to(JavaType::object(), &widened).ptr_eq(&widened));

    // Unrelated classes keep an explicit cast.
    let cast = to(JavaType::class("com/acme/Order"), &p(JavaType::class("com/acme/Customer"), 0));
    assert_eq!(cast.as_unary().map(|(op, _)| op), Some(UnaryOp::Convert));
}

#[test]
fn primitive_parameters_are_wrapped() {
    let widened = to(JavaType::LONG, &p(JavaType::INT, 0));
    let (op, operand) = widened.as_unary().unwrap();
    assert_eq!(op, UnaryOp::Convert);
    assert_eq!(operand.as_parameter(), Some(0));
    assert_eq!(widened.result_type(), &JavaType::LONG);
}

#[test]
fn converting_twice_is_converting_once() {
    let cases = [
        (JavaType::LONG, p(JavaType::INT, 0)),
        (JavaType::BOOLEAN, constant_of(1)),
        (JavaType::string(), p(JavaType::object(), 0)),
        (JavaType::DOUBLE, add(p(JavaType::INT, 0), constant_of(1)).unwrap()),
    ];
    for (ty, expression) in cases {
        let once = to(ty.clone(), &expression);
        let twice = to(ty, &once);
        assert!(twice.ptr_eq(&once), "{once} converted again became {twice}");
    }
}

#[test]
fn boolean_bitwise_operators_over_int_conditionals() {
    let above = greater_than(p(JavaType::INT, 0), constant_of(3)).unwrap();
    let below = less_than(p(JavaType::INT, 0), constant_of(10)).unwrap();
    let as_int = |test: &Expression| condition(test.clone(), constant_of(1), constant_of(0)).unwrap();

    let operators: [fn(Expression, Expression) -> BuildResult<Expression>; 3] =
        [bitwise_and, bitwise_or, exclusive_or];
    for op in operators {
        let lowered = op(as_int(&above), as_int(&below)).unwrap();
        assert_eq!(lowered.result_type(), &JavaType::INT);

        let converted = to(JavaType::BOOLEAN, &lowered);
        assert_eq!(converted, op(above.clone(), below.clone()).unwrap());
        assert_eq!(converted.result_type(), &JavaType::BOOLEAN);
    }

    let error = TypeConverter::new(JavaType::BOOLEAN)
        .convert(&bitwise_and(as_int(&above), constant_of(6)).unwrap())
        .unwrap_err();
    assert!(error.is_illegal_conversion(), "{error}");
}
