mod common;

use common::*;
use jlclass::writer::BootstrapArgument;
use jlclass::{JavaType, MethodHandleKind, Opcode};
use jlcore::Resolver;
use jlexpr::build::*;
use jlexpr::{MemberHandle, Value};

const CONCAT_BOOTSTRAP: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/invoke/CallSite;";

fn int(value: i32) -> Value {
    Value::Int(value)
}

#[test]
fn ternary_over_comparisons() {
    // t -> t > 6 ? t < 12 : t > 2
    let lifted = resolve_static(PREDICATE, TEST, "(I)Z", |code| {
        let otherwise = code.new_label();
        let low = code.new_label();
        let high = code.new_label();
        let join = code.new_label();
        let end = code.new_label();
        code.op(Opcode::Iload0)
            .iconst(6)
            .jump(Opcode::IfIcmple, otherwise)
            .op(Opcode::Iload0)
            .iconst(12)
            .jump(Opcode::IfIcmpge, low)
            .iconst(1)
            .jump(Opcode::Goto, join)
            .bind(low)
            .iconst(0)
            .bind(join)
            .jump(Opcode::Goto, end)
            .bind(otherwise)
            .op(Opcode::Iload0)
            .iconst(2)
            .jump(Opcode::IfIcmple, high)
            .iconst(1)
            .jump(Opcode::Goto, end)
            .bind(high)
            .iconst(0)
            .bind(end)
            .op(Opcode::Ireturn);
    })
    .unwrap();

    let t = || p(JavaType::INT, 0);
    let expected = lambda(
        condition(
            greater_than(t(), constant_of(6)).unwrap(),
            less_than(t(), constant_of(12)).unwrap(),
            greater_than(t(), constant_of(2)).unwrap(),
        )
        .unwrap(),
        vec![JavaType::INT],
    )
    .unwrap();
    assert_eq!(lifted, expected);

    for t in [4, 7, 12, 14] {
        let direct = if t > 6 { t < 12 } else { t > 2 };
        assert_eq!(call(&lifted, &[int(t)]), Value::Boolean(direct), "t = {t}");
    }
}

#[test]
fn constant_supplier() {
    let lifted = resolve_static(SUPPLIER, GET, "()F", |code| {
        code.fconst(23.0).op(Opcode::Freturn);
    })
    .unwrap();
    assert_eq!(lifted, lambda(constant_of(23.0f32), Vec::new()).unwrap());
    assert_eq!(call(&lifted, &[]), Value::Float(23.0));
}

#[test]
fn boxed_constant_supplier() {
    let lifted = resolve_static(SUPPLIER, GET, "()Ljava/lang/Float;", |code| {
        code.fconst(23.0)
            .invoke(
                Opcode::Invokestatic,
                "java/lang/Float",
                "valueOf",
                "(F)Ljava/lang/Float;",
            )
            .op(Opcode::Areturn);
    })
    .unwrap();
    assert_eq!(lifted.result_type(), &JavaType::class("java/lang/Float"));
    assert_eq!(call(&lifted, &[]).as_f64(), Some(23.0));
}

#[test]
fn string_equality_call() {
    let lifted = resolve_static(PREDICATE, TEST, "(Ljava/lang/String;)Z", |code| {
        code.op(Opcode::Aload0)
            .ldc_string("abc")
            .invoke(
                Opcode::Invokevirtual,
                "java/lang/String",
                "equals",
                "(Ljava/lang/Object;)Z",
            )
            .op(Opcode::Ireturn);
    })
    .unwrap();

    let equals =
        MemberHandle::method("java/lang/String", "equals", "(Ljava/lang/Object;)Z", false).unwrap();
    let body = invoke(
        Some(p(JavaType::string(), 0)),
        equals,
        [constant_of(Value::string("abc"))],
    )
    .unwrap();
    assert_eq!(lifted, lambda(body, vec![JavaType::string()]).unwrap());

    assert_eq!(call(&lifted, &[Value::string("abc")]), Value::Boolean(true));
    assert_eq!(call(&lifted, &[Value::string("abd")]), Value::Boolean(false));
}

#[test]
fn short_circuit_chain() {
    // r -> (r < 6 || r > 25) && r < 23 || r > 25
    let lifted = resolve_static(PREDICATE, TEST, "(I)Z", |code| {
        let second = code.new_label();
        let last = code.new_label();
        let yes = code.new_label();
        let no = code.new_label();
        let end = code.new_label();
        code.op(Opcode::Iload0)
            .iconst(6)
            .jump(Opcode::IfIcmplt, second)
            .op(Opcode::Iload0)
            .iconst(25)
            .jump(Opcode::IfIcmple, last)
            .bind(second)
            .op(Opcode::Iload0)
            .iconst(23)
            .jump(Opcode::IfIcmplt, yes)
            .bind(last)
            .op(Opcode::Iload0)
            .iconst(25)
            .jump(Opcode::IfIcmple, no)
            .bind(yes)
            .iconst(1)
            .jump(Opcode::Goto, end)
            .bind(no)
            .iconst(0)
            .bind(end)
            .op(Opcode::Ireturn);
    })
    .unwrap();

    let r = || p(JavaType::INT, 0);
    let either = logical_or(
        less_than(r(), constant_of(6)).unwrap(),
        greater_than(r(), constant_of(25)).unwrap(),
    )
    .unwrap();
    let body = logical_or(
        logical_and(either, less_than(r(), constant_of(23)).unwrap()).unwrap(),
        greater_than(r(), constant_of(25)).unwrap(),
    )
    .unwrap();
    assert_eq!(lifted, lambda(body, vec![JavaType::INT]).unwrap());

    for r in [5, 11, 14, 18, 23, 25, 26, 29] {
        let direct = (r < 6 || r > 25) && r < 23 || r > 25;
        assert_eq!(call(&lifted, &[int(r)]), Value::Boolean(direct), "r = {r}");
    }
}

#[test]
fn chained_string_calls() {
    let lifted = resolve_static(
        FUNCTION,
        APPLY,
        "(Ljava/lang/String;)Ljava/lang/String;",
        |code| {
            code.op(Opcode::Aload0)
                .iconst(0)
                .iconst(1)
                .invoke(
                    Opcode::Invokevirtual,
                    "java/lang/String",
                    "substring",
                    "(II)Ljava/lang/String;",
                )
                .invoke(
                    Opcode::Invokevirtual,
                    "java/lang/String",
                    "toUpperCase",
                    "()Ljava/lang/String;",
                )
                .op(Opcode::Areturn);
        },
    )
    .unwrap();

    let (body, parameters) = lifted.as_lambda().unwrap();
    assert_eq!(body.to_string(), "P0.substring(0, 1).toUpperCase()");
    assert_eq!(parameters, &[JavaType::string()]);
    assert_eq!(call(&lifted, &[Value::string("abc")]), Value::string("A"));
}

#[test]
fn float_comparison_against_zero() {
    let lifted = resolve_static(PREDICATE, TEST, "(F)Z", |code| {
        let otherwise = code.new_label();
        code.op(Opcode::Fload0)
            .fconst(6.0)
            .op(Opcode::Fcmpl)
            .jump(Opcode::Ifle, otherwise)
            .iconst(1)
            .op(Opcode::Ireturn)
            .bind(otherwise)
            .iconst(0)
            .op(Opcode::Ireturn);
    })
    .unwrap();

    assert_eq!(lifted.to_string(), "{(float P0) -> (P0 > 6.0)}");
    assert_eq!(call(&lifted, &[Value::Float(6.5)]), Value::Boolean(true));
    assert_eq!(call(&lifted, &[Value::Float(6.0)]), Value::Boolean(false));
    assert_eq!(call(&lifted, &[Value::Float(f32::NAN)]), Value::Boolean(false));
}

#[test]
fn long_comparison_is_split() {
    let lifted = resolve_static(PREDICATE, TEST, "(J)Z", |code| {
        let otherwise = code.new_label();
        code.op(Opcode::Lload0)
            .lconst(1_000_000)
            .op(Opcode::Lcmp)
            .jump(Opcode::Ifle, otherwise)
            .iconst(1)
            .op(Opcode::Ireturn)
            .bind(otherwise)
            .iconst(0)
            .op(Opcode::Ireturn);
    })
    .unwrap();

    let body = greater_than(p(JavaType::LONG, 0), constant_of(1_000_000i64)).unwrap();
    assert_eq!(lifted, lambda(body, vec![JavaType::LONG]).unwrap());
    assert_eq!(call(&lifted, &[Value::Long(1_000_001)]), Value::Boolean(true));
    assert_eq!(call(&lifted, &[Value::Long(-1)]), Value::Boolean(false));
}

#[test]
fn string_concatenation_recipe() {
    let mut class = main_class();
    let bootstrap = class.bootstrap_method(
        MethodHandleKind::InvokeStatic,
        "java/lang/invoke/StringConcatFactory",
        "makeConcatWithConstants",
        CONCAT_BOOTSTRAP,
        &[BootstrapArgument::String("n=\u{1} (\u{1})".into())],
    );
    let descriptor = "(ILjava/lang/String;)Ljava/lang/String;";
    class
        .method(synthetic_static(), LAMBDA, descriptor, |code| {
            code.op(Opcode::Iload0)
                .op(Opcode::Aload1)
                .invokedynamic(bootstrap, "makeConcatWithConstants", descriptor)
                .op(Opcode::Areturn);
        })
        .unwrap();

    let resolver = Resolver::new(classes([(MAIN, class.to_bytes())]));
    let value = serializable(
        BI_FUNCTION,
        APPLY2,
        serialized(MethodHandleKind::InvokeStatic, LAMBDA, descriptor),
    );
    let lifted = resolver.resolve(&value).unwrap();

    assert_eq!(
        call(&lifted, &[int(7), Value::string("seven")]),
        Value::string("n=7 (seven)")
    );
    assert_eq!(
        call(&lifted, &[int(-1), Value::Null]),
        Value::string("n=-1 (null)")
    );
}

#[test]
fn null_check_branch() {
    let lifted = resolve_static(PREDICATE, TEST, "(Ljava/lang/String;)Z", |code| {
        let present = code.new_label();
        code.op(Opcode::Aload0)
            .jump(Opcode::Ifnonnull, present)
            .iconst(1)
            .op(Opcode::Ireturn)
            .bind(present)
            .iconst(0)
            .op(Opcode::Ireturn);
    })
    .unwrap();

    let body = is_null(p(JavaType::string(), 0)).unwrap();
    assert_eq!(lifted, lambda(body, vec![JavaType::string()]).unwrap());
    assert_eq!(call(&lifted, &[Value::Null]), Value::Boolean(true));
    assert_eq!(call(&lifted, &[Value::string("x")]), Value::Boolean(false));
}

#[test]
fn constructor_call() {
    let lifted = resolve_static(
        FUNCTION,
        APPLY,
        "(Ljava/lang/String;)Ljava/lang/String;",
        |code| {
            code.type_op(Opcode::New, "java/lang/String")
                .op(Opcode::Dup)
                .op(Opcode::Aload0)
                .invoke(
                    Opcode::Invokespecial,
                    "java/lang/String",
                    "<init>",
                    "(Ljava/lang/String;)V",
                )
                .op(Opcode::Areturn);
        },
    )
    .unwrap();

    let constructor = MemberHandle::constructor("java/lang/String", "(Ljava/lang/String;)V").unwrap();
    let body = invoke(None, constructor, [p(JavaType::string(), 0)]).unwrap();
    assert_eq!(lifted, lambda(body, vec![JavaType::string()]).unwrap());
    assert_eq!(lifted.to_string(), "{(java.lang.String P0) -> new java.lang.String(P0)}");
    assert_eq!(call(&lifted, &[Value::string("copy")]), Value::string("copy"));
}

#[test]
fn static_field_read() {
    let lifted = resolve_static(SUPPLIER, GET, "()Ljava/lang/Boolean;", |code| {
        code.field(
            Opcode::Getstatic,
            "java/lang/Boolean",
            "TRUE",
            "Ljava/lang/Boolean;",
        )
        .op(Opcode::Areturn);
    })
    .unwrap();

    let handle =
        MemberHandle::field("java/lang/Boolean", "TRUE", "Ljava/lang/Boolean;", true).unwrap();
    assert_eq!(lifted, lambda(field(None, handle).unwrap(), Vec::new()).unwrap());
    assert_eq!(call(&lifted, &[]), Value::Boolean(true));
}

#[test]
fn duplicated_operand() {
    let lifted = resolve_static(FUNCTION, APPLY, "(I)I", |code| {
        code.op(Opcode::Iload0)
            .op(Opcode::Dup)
            .op(Opcode::Imul)
            .op(Opcode::Ireturn);
    })
    .unwrap();

    let t = || p(JavaType::INT, 0);
    assert_eq!(
        lifted,
        lambda(multiply(t(), t()).unwrap(), vec![JavaType::INT]).unwrap()
    );
    assert_eq!(call(&lifted, &[int(7)]), int(49));
}

#[test]
fn type_test_and_cast() {
    let instance_test = resolve_static(PREDICATE, TEST, "(Ljava/lang/Object;)Z", |code| {
        code.op(Opcode::Aload0)
            .type_op(Opcode::Instanceof, "java/lang/String")
            .op(Opcode::Ireturn);
    })
    .unwrap();
    let body = instance_of(p(JavaType::object(), 0), JavaType::string()).unwrap();
    assert_eq!(
        instance_test,
        lambda(body, vec![JavaType::object()]).unwrap()
    );
    assert_eq!(call(&instance_test, &[Value::string("x")]), Value::Boolean(true));
    assert_eq!(call(&instance_test, &[Value::Null]), Value::Boolean(false));

    let length = resolve_static(FUNCTION, APPLY, "(Ljava/lang/Object;)I", |code| {
        code.op(Opcode::Aload0)
            .type_op(Opcode::Checkcast, "java/lang/String")
            .invoke(Opcode::Invokevirtual, "java/lang/String", "length", "()I")
            .op(Opcode::Ireturn);
    })
    .unwrap();
    assert_eq!(call(&length, &[Value::string("hello")]), int(5));
}

#[test]
fn arithmetic_and_conversions() {
    // (a, b) -> (double) (a * 2 + b) / 3.0
    let lifted = resolve_static(BI_FUNCTION, APPLY2, "(IJ)D", |code| {
        code.op(Opcode::Iload0)
            .iconst(2)
            .op(Opcode::Imul)
            .op(Opcode::I2l)
            .op(Opcode::Lload1)
            .op(Opcode::Ladd)
            .op(Opcode::L2d)
            .dconst(3.0)
            .op(Opcode::Ddiv)
            .op(Opcode::Dreturn);
    })
    .unwrap();

    let (_, parameters) = lifted.as_lambda().unwrap();
    assert_eq!(parameters, &[JavaType::INT, JavaType::LONG]);
    assert_eq!(call(&lifted, &[int(3), Value::Long(3)]), Value::Double(3.0));
}

#[test]
fn bitwise_complement() {
    // r -> ~r
    let lifted = resolve_static(FUNCTION, APPLY, "(I)I", |code| {
        code.op(Opcode::Iload0)
            .iconst(-1)
            .op(Opcode::Ixor)
            .op(Opcode::Ireturn);
    })
    .unwrap();

    assert_eq!(
        lifted,
        lambda(bitwise_not(p(JavaType::INT, 0)).unwrap(), vec![JavaType::INT]).unwrap()
    );
    assert_eq!(call(&lifted, &[int(5)]), int(-6));
    assert_eq!(call(&lifted, &[int(-10)]), int(9));
    assert_eq!(call(&lifted, &[int(29)]), int(-30));
}

#[test]
fn non_short_circuit_operators() {
    // r -> r > 3 & r < 10, and the same with `|` and `^`
    let operators: [(Opcode, fn(bool, bool) -> bool); 3] = [
        (Opcode::Iand, |a, b| a & b),
        (Opcode::Ior, |a, b| a | b),
        (Opcode::Ixor, |a, b| a ^ b),
    ];
    for (opcode, apply) in operators {
        let lifted = resolve_static(PREDICATE, TEST, "(I)Z", |code| {
            let (low, low_done, high, high_done) = (
                code.new_label(),
                code.new_label(),
                code.new_label(),
                code.new_label(),
            );
            code.op(Opcode::Iload0)
                .iconst(3)
                .jump(Opcode::IfIcmple, low)
                .iconst(1)
                .jump(Opcode::Goto, low_done)
                .bind(low)
                .iconst(0)
                .bind(low_done)
                .op(Opcode::Iload0)
                .iconst(10)
                .jump(Opcode::IfIcmpge, high)
                .iconst(1)
                .jump(Opcode::Goto, high_done)
                .bind(high)
                .iconst(0)
                .bind(high_done)
                .op(opcode)
                .op(Opcode::Ireturn);
        })
        .unwrap_or_else(|e| panic!("{opcode:?}: {e}"));

        let (body, _) = lifted.as_lambda().unwrap();
        assert_eq!(body.result_type(), &JavaType::BOOLEAN, "{opcode:?}: {lifted}");
        for r in [-1, 3, 4, 9, 10, 12] {
            assert_eq!(
                call(&lifted, &[int(r)]),
                Value::Boolean(apply(r > 3, r < 10)),
                "{opcode:?}, r = {r}: lifted as {lifted}"
            );
        }
    }
}
