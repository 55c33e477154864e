use std::sync::Arc;

use jlclass::JavaType;
use jlexpr::build::*;
use jlexpr::{
    EvalError, Expression, Host, HostObject, MemberHandle, StandardHost, Value, compile, evaluate,
};

fn p(ty: JavaType, index: usize) -> Expression {
    parameter(ty, index).unwrap()
}

fn host() -> Arc<dyn Host> {
    Arc::new(StandardHost::new())
}

fn run(body: Expression, parameters: Vec<JavaType>, args: &[Value]) -> Result<Value, EvalError> {
    evaluate(&lambda(body, parameters).unwrap(), host(), args)
}

fn string_method(name: &str, descriptor: &str) -> MemberHandle {
    MemberHandle::method("java/lang/String", name, descriptor, false).unwrap()
}

#[test]
fn integer_arithmetic_wraps() {
    let sum = add(p(JavaType::INT, 0), p(JavaType::INT, 1)).unwrap();
    let result = run(sum, vec![JavaType::INT; 2], &[Value::Int(i32::MAX), Value::Int(1)]);
    assert_eq!(result, Ok(Value::Int(i32::MIN)));

    let quotient = divide(p(JavaType::INT, 0), p(JavaType::INT, 1)).unwrap();
    let result = run(quotient, vec![JavaType::INT; 2], &[Value::Int(i32::MIN), Value::Int(-1)]);
    assert_eq!(result, Ok(Value::Int(i32::MIN)));
}

#[test]
fn integral_division_by_zero_throws() {
    let remainder = modulo(p(JavaType::LONG, 0), constant_of(0i64)).unwrap();
    let result = run(remainder, vec![JavaType::LONG], &[Value::Long(7)]);
    assert_eq!(result, Err(EvalError::Arithmetic("/ by zero")));

    let quotient = divide(p(JavaType::DOUBLE, 0), constant_of(0.0)).unwrap();
    let result = run(quotient, vec![JavaType::DOUBLE], &[Value::Double(1.0)]);
    assert_eq!(result, Ok(Value::Double(f64::INFINITY)));
}

#[test]
fn shift_distance_is_masked() {
    let shifted = left_shift(p(JavaType::INT, 0), constant_of(33)).unwrap();
    assert_eq!(run(shifted, vec![JavaType::INT], &[Value::Int(1)]), Ok(Value::Int(2)));

    let unsigned = unsigned_right_shift(p(JavaType::INT, 0), constant_of(28)).unwrap();
    assert_eq!(run(unsigned, vec![JavaType::INT], &[Value::Int(-1)]), Ok(Value::Int(15)));

    let signed = right_shift(p(JavaType::LONG, 0), constant_of(65)).unwrap();
    assert_eq!(run(signed, vec![JavaType::LONG], &[Value::Long(-8)]), Ok(Value::Long(-4)));
}

#[test]
fn nan_compares_false() {
    let greater = greater_than(p(JavaType::DOUBLE, 0), constant_of(0.0)).unwrap();
    let result = run(greater.clone(), vec![JavaType::DOUBLE], &[Value::Double(f64::NAN)]);
    assert_eq!(result, Ok(Value::Boolean(false)));

    // `!(x > 0)` is `x <= 0`, which is also false for NaN.
    let negated = logical_not(greater).unwrap();
    let result = run(negated, vec![JavaType::DOUBLE], &[Value::Double(f64::NAN)]);
    assert_eq!(result, Ok(Value::Boolean(false)));

    let different = not_equal(p(JavaType::DOUBLE, 0), p(JavaType::DOUBLE, 0)).unwrap();
    let result = run(different, vec![JavaType::DOUBLE], &[Value::Double(f64::NAN)]);
    assert_eq!(result, Ok(Value::Boolean(true)));
}

#[test]
fn floating_to_integral_casts_saturate() {
    let cast = convert(p(JavaType::DOUBLE, 0), JavaType::INT).unwrap();
    let eval = |value: f64| run(cast.clone(), vec![JavaType::DOUBLE], &[Value::Double(value)]);
    assert_eq!(eval(1e20), Ok(Value::Int(i32::MAX)));
    assert_eq!(eval(-1e20), Ok(Value::Int(i32::MIN)));
    assert_eq!(eval(f64::NAN), Ok(Value::Int(0)));
    assert_eq!(eval(-3.9), Ok(Value::Int(-3)));
}

#[test]
fn arguments_are_widened_on_call() {
    let doubled = multiply(p(JavaType::LONG, 0), constant_of(2i64)).unwrap();
    let result = run(doubled, vec![JavaType::LONG], &[Value::Int(21)]);
    assert_eq!(result, Ok(Value::Long(42)));

    let error = run(p(JavaType::INT, 0), vec![JavaType::INT], &[Value::string("x")]).unwrap_err();
    assert!(error.is_type_mismatch());
}

#[test]
fn argument_count_is_checked() {
    let compiled = compile(
        &lambda(p(JavaType::INT, 0), vec![JavaType::INT]).unwrap(),
        host(),
    );
    assert_eq!(
        compiled.call(&[]),
        Err(EvalError::ArgumentCount {
            expected: 1,
            found: 0
        })
    );
}

#[test]
fn logical_operators_short_circuit() {
    let s = p(JavaType::string(), 0);
    let length = invoke(Some(s.clone()), string_method("length", "()I"), []).unwrap();
    let guarded = logical_and(
        is_non_null(s.clone()).unwrap(),
        greater_than(length, constant_of(0)).unwrap(),
    )
    .unwrap();

    assert_eq!(
        run(guarded.clone(), vec![JavaType::string()], &[Value::Null]),
        Ok(Value::Boolean(false))
    );
    assert_eq!(
        run(guarded, vec![JavaType::string()], &[Value::string("abc")]),
        Ok(Value::Boolean(true))
    );
}

#[test]
fn null_receiver_throws() {
    let length = invoke(Some(p(JavaType::string(), 0)), string_method("length", "()I"), []).unwrap();
    let error = run(length, vec![JavaType::string()], &[Value::Null]).unwrap_err();
    assert!(error.is_null_pointer(), "{error}");
}

#[test]
fn string_methods_follow_host_semantics() {
    let s = p(JavaType::string(), 0);
    let first = invoke(
        Some(s.clone()),
        string_method("substring", "(II)Ljava/lang/String;"),
        [constant_of(0), constant_of(1)],
    )
    .unwrap();
    let upper = invoke(Some(first), string_method("toUpperCase", "()Ljava/lang/String;"), []).unwrap();
    assert_eq!(
        run(upper, vec![JavaType::string()], &[Value::string("david")]),
        Ok(Value::string("D"))
    );

    let char_at = invoke(Some(s.clone()), string_method("charAt", "(I)C"), [constant_of(1)]).unwrap();
    assert_eq!(
        run(char_at.clone(), vec![JavaType::string()], &[Value::string("h\u{e9}llo")]),
        Ok(Value::Char(0xe9))
    );
    let error = run(char_at, vec![JavaType::string()], &[Value::string("")]).unwrap_err();
    assert!(error.is_host());

    let equals = invoke(
        Some(s),
        string_method("equals", "(Ljava/lang/Object;)Z"),
        [constant_of("Jane")],
    )
    .unwrap();
    assert_eq!(
        run(equals, vec![JavaType::string()], &[Value::string("Jane")]),
        Ok(Value::Boolean(true))
    );
}

#[test]
fn string_equality_is_structural() {
    let same = equal(p(JavaType::string(), 0), constant_of("Jane")).unwrap();
    let result = run(same, vec![JavaType::string()], &[Value::string(String::from("Ja") + "ne")]);
    assert_eq!(result, Ok(Value::Boolean(true)));
}

#[test]
fn conditionals_evaluate_one_arm() {
    let safe = condition(
        equal(p(JavaType::INT, 0), constant_of(0)).unwrap(),
        constant_of(-1),
        divide(constant_of(100), p(JavaType::INT, 0)).unwrap(),
    )
    .unwrap();
    assert_eq!(run(safe.clone(), vec![JavaType::INT], &[Value::Int(0)]), Ok(Value::Int(-1)));
    assert_eq!(run(safe, vec![JavaType::INT], &[Value::Int(4)]), Ok(Value::Int(25)));
}

#[test]
fn arrays_are_bounds_checked() {
    let element = array_index(p(JavaType::array_of(JavaType::INT), 0), p(JavaType::INT, 1)).unwrap();
    let array = Value::array(JavaType::INT, vec![Value::Int(10), Value::Int(20)]);
    let parameters = vec![JavaType::array_of(JavaType::INT), JavaType::INT];

    assert_eq!(
        run(element.clone(), parameters.clone(), &[array.clone(), Value::Int(1)]),
        Ok(Value::Int(20))
    );
    assert_eq!(
        run(element, parameters, &[array, Value::Int(2)]),
        Err(EvalError::ArrayIndexOutOfBounds { index: 2, length: 2 })
    );
}

#[test]
fn reference_casts_are_checked_for_builtin_values() {
    let cast = convert(p(JavaType::object(), 0), JavaType::string()).unwrap();
    let error = run(cast.clone(), vec![JavaType::object()], &[Value::Int(3)]).unwrap_err();
    assert!(error.is_class_cast(), "{error}");
    assert_eq!(
        run(cast, vec![JavaType::object()], &[Value::string("ok")]),
        Ok(Value::string("ok"))
    );
}

#[test]
fn instance_of_uses_the_host_hierarchy() {
    let test = instance_of(p(JavaType::object(), 0), JavaType::class("java/lang/Number")).unwrap();
    let eval = |value: Value| run(test.clone(), vec![JavaType::object()], &[value]);
    assert_eq!(eval(Value::Int(1)), Ok(Value::Boolean(true)));
    assert_eq!(eval(Value::string("1")), Ok(Value::Boolean(false)));
    assert_eq!(eval(Value::Null), Ok(Value::Boolean(false)));
}

#[test]
fn nested_lambdas_get_their_own_frame() {
    let inner = lambda(
        subtract(p(JavaType::INT, 0), p(JavaType::INT, 1)).unwrap(),
        vec![JavaType::INT, JavaType::INT],
    )
    .unwrap();
    let body = invocation(inner, [constant_of(10), p(JavaType::INT, 0)]).unwrap();
    assert_eq!(run(body, vec![JavaType::INT], &[Value::Int(3)]), Ok(Value::Int(7)));
}

#[derive(Debug)]
struct Customer {
    name: &'static str,
    age: i32,
}

impl HostObject for Customer {
    fn class_name(&self) -> &str {
        "com/acme/Customer"
    }

    fn get_field(&self, name: &str) -> Option<Value> {
        (name == "age").then_some(Value::Int(self.age))
    }

    fn invoke(&self, method: &MemberHandle, _args: &[Value]) -> Option<Result<Value, EvalError>> {
        (method.name() == "getName").then(|| Ok(Value::string(self.name)))
    }
}

#[test]
fn host_objects_expose_fields_and_methods() {
    let customer = JavaType::class("com/acme/Customer");
    let age = MemberHandle::field("com/acme/Customer", "age", "I", false).unwrap();
    let name = MemberHandle::method("com/acme/Customer", "getName", "()Ljava/lang/String;", false)
        .unwrap();

    let adult = greater_than_or_equal(field(Some(p(customer.clone(), 0)), age).unwrap(), constant_of(18))
        .unwrap();
    let jane = Value::object(Customer { name: "Jane", age: 32 });
    assert_eq!(
        run(adult, vec![customer.clone()], &[jane.clone()]),
        Ok(Value::Boolean(true))
    );

    let greeting = invoke(Some(p(customer.clone(), 0)), name, []).unwrap();
    assert_eq!(run(greeting, vec![customer], &[jane]), Ok(Value::string("Jane")));
}

#[test]
fn registered_members_take_precedence() {
    let host = StandardHost::new();
    let twice = MemberHandle::method("com/acme/MathUtil", "twice", "(I)I", true).unwrap();
    host.register(twice.clone(), |_, args| match args {
        [Value::Int(v)] => Ok(Value::Int(v * 2)),
        _ => Err(EvalError::Host("bad arguments".to_string())),
    });

    let body = invoke(None, twice, [p(JavaType::INT, 0)]).unwrap();
    let compiled = compile(&lambda(body, vec![JavaType::INT]).unwrap(), Arc::new(host));
    assert_eq!(compiled.call(&[Value::Int(21)]), Ok(Value::Int(42)));

    let unknown = MemberHandle::method("com/acme/MathUtil", "thrice", "(I)I", true).unwrap();
    let body = invoke(None, unknown, [p(JavaType::INT, 0)]).unwrap();
    let error = run(body, vec![JavaType::INT], &[Value::Int(1)]).unwrap_err();
    assert!(error.is_no_such_member());
}

#[test]
fn boxing_round_trips_through_wrappers() {
    let value_of =
        MemberHandle::method("java/lang/Integer", "valueOf", "(I)Ljava/lang/Integer;", true)
            .unwrap();
    let int_value = MemberHandle::method("java/lang/Integer", "intValue", "()I", false).unwrap();
    let boxed = invoke(None, value_of, [p(JavaType::INT, 0)]).unwrap();
    let unboxed = invoke(Some(boxed), int_value, []).unwrap();
    assert_eq!(run(unboxed, vec![JavaType::INT], &[Value::Int(5)]), Ok(Value::Int(5)));

    let unbox_null = convert(p(JavaType::class("java/lang/Integer"), 0), JavaType::INT).unwrap();
    let error = run(
        unbox_null,
        vec![JavaType::class("java/lang/Integer")],
        &[Value::Null],
    )
    .unwrap_err();
    assert!(error.is_null_pointer());
}
