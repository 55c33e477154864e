#![allow(dead_code)]

pub mod javac;

use jlclass::{AccessFlags, ClassWriter, CodeBuilder, JavaType, MethodHandleKind};
use jlcore::{Closure, MemorySource, Resolver, SerializedLambda};
use jlexpr::build::parameter;
use jlexpr::{Expression, Value};

pub const MAIN: &str = "com/acme/Main";
pub const PROXY: &str = "com.acme.Main$$Lambda/0x0000000800c01000";
pub const PROXY_CLASS: &str = "com/acme/Main$$Lambda";
pub const LAMBDA: &str = "lambda$main$0";

pub const PREDICATE: &str = "java/util/function/Predicate";
pub const FUNCTION: &str = "java/util/function/Function";
pub const SUPPLIER: &str = "java/util/function/Supplier";
pub const BI_FUNCTION: &str = "java/util/function/BiFunction";

pub const TEST: (&str, &str) = ("test", "(Ljava/lang/Object;)Z");
pub const APPLY: (&str, &str) = ("apply", "(Ljava/lang/Object;)Ljava/lang/Object;");
pub const GET: (&str, &str) = ("get", "()Ljava/lang/Object;");
pub const APPLY2: (&str, &str) = (
    "apply",
    "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;",
);

pub fn synthetic_static() -> AccessFlags {
    AccessFlags::PRIVATE | AccessFlags::STATIC | AccessFlags::SYNTHETIC
}

pub fn main_class() -> ClassWriter {
    ClassWriter::new(AccessFlags::PUBLIC | AccessFlags::SUPER, MAIN, "java/lang/Object")
}

/// `com/acme/Main` declaring a single private static synthetic method.
pub fn lambda_class(descriptor: &str, body: impl FnOnce(&mut CodeBuilder<'_>)) -> Vec<u8> {
    let mut class = main_class();
    class.method(synthetic_static(), LAMBDA, descriptor, body).unwrap();
    class.to_bytes()
}

pub fn serialized(kind: MethodHandleKind, name: &str, descriptor: &str) -> SerializedLambda {
    SerializedLambda::new(kind, MAIN, name, descriptor)
}

/// Serialisable closure implementing `interface.method` through `serialized`.
pub fn serializable(
    interface: &str,
    (method, erased): (&str, &str),
    serialized: SerializedLambda,
) -> Value {
    let serialized = serialized.functional_interface(interface, method, erased);
    Closure::new(PROXY, interface)
        .method(method, erased)
        .serialized(serialized)
        .into_value()
}

pub fn classes(entries: impl IntoIterator<Item = (&'static str, Vec<u8>)>) -> MemorySource {
    entries
        .into_iter()
        .fold(MemorySource::new(), |source, (name, bytes)| source.with(name, bytes))
}

/// Resolves the serialisable closure of the static synthetic `LAMBDA` with
/// `descriptor` and `body`.
pub fn resolve_static(
    interface: &str,
    method: (&str, &str),
    descriptor: &str,
    body: impl FnOnce(&mut CodeBuilder<'_>),
) -> jlcore::Result<Expression> {
    let resolver = Resolver::new(classes([(MAIN, lambda_class(descriptor, body))]));
    let value = serializable(
        interface,
        method,
        serialized(MethodHandleKind::InvokeStatic, LAMBDA, descriptor),
    );
    resolver.resolve(&value)
}

pub fn p(ty: JavaType, index: usize) -> Expression {
    parameter(ty, index).unwrap()
}

pub fn call(lambda: &Expression, args: &[Value]) -> Value {
    jlcore::compile(lambda).call(args).unwrap()
}
