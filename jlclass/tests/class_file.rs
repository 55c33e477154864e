use jlclass::insn::decode;
use jlclass::writer::BootstrapArgument;
use jlclass::{
    AccessFlags, ClassFile, ClassFileError, ClassWriter, Loadable, MethodHandleKind, Opcode,
    Operand,
};

fn sample() -> Vec<u8> {
    let mut class = ClassWriter::new(
        AccessFlags::PUBLIC | AccessFlags::SUPER,
        "com/acme/Sample",
        "java/lang/Object",
    );
    class
        .interface("java/util/function/Predicate")
        .field(AccessFlags::PRIVATE | AccessFlags::FINAL, "arg$1", "I");
    class
        .method(AccessFlags::STATIC | AccessFlags::SYNTHETIC, "lambda$main$0", "(J)Z", |code| {
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
    class.abstract_method(AccessFlags::PUBLIC, "test", "(Ljava/lang/Object;)Z");
    class.bootstrap_method(
        MethodHandleKind::InvokeStatic,
        "java/lang/invoke/StringConcatFactory",
        "makeConcatWithConstants",
        "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/invoke/CallSite;",
        &[BootstrapArgument::String("Hello \u{1}!".into())],
    );
    class.to_bytes()
}

#[test]
fn writer_output_parses_back() {
    let class = ClassFile::parse(&sample()).unwrap();
    assert_eq!(&*class.this_class, "com/acme/Sample");
    assert_eq!(class.super_class.as_deref(), Some("java/lang/Object"));
    assert_eq!(class.interfaces.len(), 1);
    assert!(class.find_field("arg$1").is_some());
    assert_eq!(class.bootstrap_methods.len(), 1);

    let method = class.find_method("lambda$main$0", "(J)Z").unwrap();
    assert!(method.is_static());
    assert!(method.is_synthetic());
    let code = method.code.as_ref().unwrap();
    assert!(code.exception_table.is_empty());

    let test = class.find_method("test", "(Ljava/lang/Object;)Z").unwrap();
    assert!(test.code.is_none());
    assert!(test.access.contains(AccessFlags::ABSTRACT));
}

#[test]
fn decodes_jumps_as_absolute_targets() {
    let class = ClassFile::parse(&sample()).unwrap();
    let method = class.find_method("lambda$main$0", "(J)Z").unwrap();
    let insns = method.code.as_ref().unwrap().instructions().unwrap();

    let opcodes: Vec<Opcode> = insns.iter().map(|i| i.opcode).collect();
    assert_eq!(
        opcodes,
        vec![
            Opcode::Lload0,
            Opcode::Ldc2W,
            Opcode::Lcmp,
            Opcode::Ifle,
            Opcode::Iconst1,
            Opcode::Ireturn,
            Opcode::Iconst0,
            Opcode::Ireturn,
        ]
    );
    let branch = &insns[3];
    assert_eq!(branch.jump_target(), Some(insns[6].offset));

    let Operand::Pool(index) = insns[1].operand else {
        panic!("ldc2_w should reference the pool");
    };
    assert_eq!(class.pool.loadable(index).unwrap(), Loadable::Long(1_000_000));
}

#[test]
fn decodes_switches_and_wide() {
    let mut class = ClassWriter::new(AccessFlags::PUBLIC, "Switch", "java/lang/Object");
    class
        .method(AccessFlags::STATIC, "pick", "(I)I", |code| {
            let a = code.new_label();
            let b = code.new_label();
            let other = code.new_label();
            code.op(Opcode::Iload0)
                .tableswitch(1, other, &[a, b])
                .bind(a)
                .iconst(10)
                .op(Opcode::Ireturn)
                .bind(b)
                .local(Opcode::Iload, 300)
                .op(Opcode::Ireturn)
                .bind(other)
                .iinc(0, 1000)
                .iconst(0)
                .op(Opcode::Ireturn);
        })
        .unwrap();
    let parsed = ClassFile::parse(&class.to_bytes()).unwrap();
    let insns = parsed.methods[0].code.as_ref().unwrap().instructions().unwrap();

    let Operand::Switch { default, cases } = &insns[1].operand else {
        panic!("expected a switch operand");
    };
    assert_eq!(cases.len(), 2);
    assert_eq!(cases[0].0, 1);
    assert_eq!(cases[1].0, 2);
    assert_eq!(cases[0].1, insns[2].offset);
    assert!(*default > cases[1].1);

    let wide_load = insns.iter().find(|i| i.opcode == Opcode::Iload).unwrap();
    assert!(wide_load.wide);
    assert_eq!(wide_load.operand, Operand::Local(300));

    let iinc = insns.iter().find(|i| i.opcode == Opcode::Iinc).unwrap();
    assert_eq!(iinc.operand, Operand::Iinc { slot: 0, delta: 1000 });
}

#[test]
fn strings_survive_modified_utf8() {
    let text = "caf\u{e9} \u{0} \u{1F600}";
    let mut class = ClassWriter::new(AccessFlags::PUBLIC, "Text", "java/lang/Object");
    class
        .method(AccessFlags::STATIC, "get", "()Ljava/lang/String;", |code| {
            code.ldc_string(text).op(Opcode::Areturn);
        })
        .unwrap();
    let parsed = ClassFile::parse(&class.to_bytes()).unwrap();
    let insns = parsed.methods[0].code.as_ref().unwrap().instructions().unwrap();
    let Operand::Pool(index) = insns[0].operand else {
        panic!("ldc should reference the pool");
    };
    assert_eq!(
        parsed.pool.loadable(index).unwrap(),
        Loadable::String(text.into())
    );
}

#[test]
fn rejects_bad_input() {
    assert!(matches!(
        ClassFile::parse(&[0xCA, 0xFE]),
        Err(ClassFileError::UnexpectedEnd(_))
    ));
    assert!(matches!(
        ClassFile::parse(&[0, 0, 0, 0, 0, 0, 0, 0]),
        Err(ClassFileError::BadMagic(0))
    ));
    assert!(matches!(
        decode(&[0xcb]),
        Err(ClassFileError::InvalidOpcode { opcode: 0xcb, offset: 0 })
    ));
    assert!(matches!(
        decode(&[Opcode::Goto.as_u8(), 0x7f, 0x00]),
        Err(ClassFileError::BadJumpTarget { .. })
    ));

    let mut truncated = sample();
    truncated.truncate(truncated.len() / 2);
    assert!(ClassFile::parse(&truncated).is_err());
}
