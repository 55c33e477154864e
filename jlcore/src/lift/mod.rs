//! Symbolic execution of a method body.
//!
//! The lifter walks the instructions in program order and replays them on a
//! symbolic stack of [`Expression`]s. Conditional jumps fork the stack (see
//! [`stack`]), jump targets merge the stacks that reach them (see [`reduce`])
//! and the single value left by the typed returns is the lifted body.
//!
//! Only forward jumps are accepted. Anything with an effect (stores, field
//! writes, array creation, exceptions, monitors) is rejected with
//! [`Error::UnsupportedOpcode`].

mod reduce;
mod stack;

use std::collections::HashMap;
use std::fmt;

use jlclass::pool::InvokeDynamicRef;
use jlclass::{
    ClassFile, Instruction, JavaType, Loadable, MemberRef, MethodDescriptor, MethodInfo, Opcode,
    Operand, PrimitiveType,
};
use jlexpr::build::{self, constant_of};
use jlexpr::{BinaryOp, BuildResult, Expression, MemberHandle, TypeConverter, Value};
use log::{debug, trace};

use crate::error::{Error, Result, Violation};
use stack::{Forest, StackKey};

const STRING_CONCAT_FACTORY: &str = "java/lang/invoke/StringConcatFactory";
const RECIPE_ARGUMENT: char = '\u{1}';
const RECIPE_CONSTANT: char = '\u{2}';

/// What slot 0 of an instance method stands for.
#[derive(Debug, Clone)]
pub enum Receiver {
    /// No receiver is available; loading slot 0 of an instance method fails.
    Static,
    /// A known receiver, typically the closure itself. Loads of slot 0 push
    /// this expression and are reported in [`Lifted::receiver_loaded`].
    Captured(Expression),
    /// The receiver is the leading parameter `P0` of the lifted lambda.
    Argument(JavaType),
}

/// Result of lifting one method.
#[derive(Debug, Clone)]
pub struct Lifted {
    /// Body converted to [`Lifted::return_type`].
    pub body: Expression,
    /// Parameters in `Parameter` index order, including an [`Receiver::Argument`] receiver.
    pub parameters: Vec<JavaType>,
    pub return_type: JavaType,
    /// Whether the body loads a [`Receiver::Captured`] receiver.
    pub receiver_loaded: bool,
}

impl Lifted {
    pub fn into_lambda(self) -> Result<Expression> {
        Ok(build::lambda(self.body, self.parameters)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Target {
    Offset(usize),
    /// Sentinel collecting the stacks of every typed return.
    End,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Offset(offset) => write!(f, "bytecode offset {offset}"),
            Target::End => f.write_str("the end of the method"),
        }
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Receiver,
    Parameter(usize, JavaType),
    /// Second half of a `long` or `double` parameter.
    Upper,
}

/// Lifts `method` of `class` into a single expression.
pub fn lift(class: &ClassFile, method: &MethodInfo, receiver: Receiver) -> Result<Lifted> {
    let owner = &*class.this_class;
    let signature = format!("{owner}.{}{}", method.name, method.descriptor);
    let code = method
        .code
        .as_ref()
        .ok_or_else(|| Error::not_a_closure(owner, format!("`{signature}` has no body")))?;
    let descriptor = method
        .parsed_descriptor()
        .map_err(|e| Error::unavailable(&signature, e))?;
    let instructions = code
        .instructions()
        .map_err(|e| Error::class_file(owner, e))?;

    if descriptor.return_type.is_void() {
        let offset = instructions
            .iter()
            .find(|insn| insn.opcode == Opcode::Return)
            .map_or(0, |insn| insn.offset);
        return Err(Error::opcode(Opcode::Return, offset));
    }
    if let Some(handler) = code.exception_table.first() {
        return Err(Error::UnsupportedOpcode {
            opcode: None,
            name: "try/catch",
            offset: handler.start as usize,
        });
    }

    debug!("Lifting `{signature}` ({} instructions)", instructions.len());
    let mut lifter = Lifter::new(class, method, &descriptor, receiver);
    for insn in &instructions {
        lifter.visit_label(insn.offset)?;
        trace!("{:>5}: {} {:?}", insn.offset, insn.opcode.name(), insn.operand);
        lifter.step(insn)?;
    }

    let end = code.bytecode.len();
    if let Some(current) = lifter.current.take() {
        lifter.pending.entry(Target::End).or_default().push(current);
    }
    let stack = lifter
        .merge(Target::End)?
        .ok_or(Violation::FinalStack { count: 0 })?;
    let count = lifter.forest.len(stack);
    if count != 1 {
        return Err(Violation::FinalStack { count }.into());
    }
    let body = lifter.forest.pop(stack, end)?;
    let body = TypeConverter::new(descriptor.return_type.clone()).convert(&body)?;
    debug!("Lifted `{signature}` into `{body}`");

    Ok(Lifted {
        body,
        parameters: lifter.parameters,
        return_type: descriptor.return_type,
        receiver_loaded: lifter.receiver_loaded,
    })
}

struct Lifter<'a> {
    class: &'a ClassFile,
    forest: Forest,
    /// `None` after an unconditional transfer until the next jump target.
    current: Option<StackKey>,
    pending: HashMap<Target, Vec<StackKey>>,
    slots: Vec<Slot>,
    parameters: Vec<JavaType>,
    receiver: Option<Expression>,
    receiver_loaded: bool,
}

impl<'a> Lifter<'a> {
    fn new(
        class: &'a ClassFile,
        method: &MethodInfo,
        descriptor: &MethodDescriptor,
        receiver: Receiver,
    ) -> Self {
        let mut slots = Vec::new();
        let mut parameters = Vec::new();
        let mut bound = None;

        if !method.is_static() {
            match receiver {
                Receiver::Static => slots.push(Slot::Receiver),
                Receiver::Captured(expression) => {
                    bound = Some(expression);
                    slots.push(Slot::Receiver);
                }
                Receiver::Argument(ty) => {
                    slots.push(Slot::Parameter(0, ty.clone()));
                    parameters.push(ty);
                }
            }
        }
        for ty in &descriptor.parameters {
            slots.push(Slot::Parameter(parameters.len(), ty.clone()));
            if ty.slot_size() == 2 {
                slots.push(Slot::Upper);
            }
            parameters.push(ty.clone());
        }

        let mut forest = Forest::new();
        let root = forest.new_root();
        Self {
            class,
            forest,
            current: Some(root),
            pending: HashMap::new(),
            slots,
            parameters,
            receiver: bound,
            receiver_loaded: false,
        }
    }

    fn current(&self, offset: usize) -> Result<StackKey> {
        self.current
            .ok_or_else(|| Violation::UnreachableCode { offset }.into())
    }

    fn pop(&mut self, offset: usize) -> Result<Expression> {
        let stack = self.current(offset)?;
        self.forest.pop(stack, offset)
    }

    fn push(&mut self, offset: usize, expression: Expression) -> Result<()> {
        let stack = self.current(offset)?;
        self.forest.push(stack, expression);
        Ok(())
    }

    fn unary(
        &mut self,
        offset: usize,
        op: impl FnOnce(Expression) -> BuildResult<Expression>,
    ) -> Result<()> {
        let operand = self.pop(offset)?;
        self.push(offset, op(operand)?)
    }

    fn binary(
        &mut self,
        offset: usize,
        op: impl FnOnce(Expression, Expression) -> BuildResult<Expression>,
    ) -> Result<()> {
        let second = self.pop(offset)?;
        let first = self.pop(offset)?;
        self.push(offset, op(first, second)?)
    }

    fn convert(&mut self, offset: usize, to: PrimitiveType) -> Result<()> {
        self.unary(offset, |operand| build::convert(operand, to.into()))
    }

    /// Merges the stacks pending at `target` with the current one.
    fn merge(&mut self, target: Target) -> Result<Option<StackKey>> {
        let mut list = self.pending.remove(&target).unwrap_or_default();
        if let Some(current) = self.current.take() {
            list.push(current);
        }
        if list.is_empty() {
            return Ok(None);
        }
        let count = list.len();
        let stack = reduce::reduce(&mut self.forest, list, &target.to_string())?;
        if count > 1 {
            debug!("Merged {count} stacks at {target}");
        }
        Ok(Some(stack))
    }

    fn visit_label(&mut self, offset: usize) -> Result<()> {
        if self.pending.contains_key(&Target::Offset(offset)) {
            self.current = self.merge(Target::Offset(offset))?;
        }
        if self.current.is_none() {
            return Err(Violation::UnreachableCode { offset }.into());
        }
        Ok(())
    }

    fn jump_to(&mut self, insn: &Instruction) -> Result<Target> {
        match insn.jump_target() {
            Some(target) if target > insn.offset => Ok(Target::Offset(target)),
            _ => Err(Error::opcode(insn.opcode, insn.offset)),
        }
    }

    fn goto(&mut self, insn: &Instruction) -> Result<()> {
        let target = self.jump_to(insn)?;
        let stack = self.current(insn.offset)?;
        self.pending.entry(target).or_default().push(stack);
        self.current = None;
        Ok(())
    }

    /// Forks on `test`: the fall-through side continues, the other side waits at the target.
    fn branch(&mut self, insn: &Instruction, test: Expression) -> Result<()> {
        let target = self.jump_to(insn)?;
        let stack = self.current(insn.offset)?;
        let (on_true, on_false) = self.forest.fork(stack, test);
        self.pending.entry(target).or_default().push(on_false);
        self.current = Some(on_true);
        Ok(())
    }

    /// `if<cond>` against zero. The `Subtract` left by `lcmp`, `fcmp<op>` and
    /// `dcmp<op>` is split back into its operands.
    fn compare_with_zero(&mut self, insn: &Instruction, op: BinaryOp) -> Result<()> {
        let top = self.pop(insn.offset)?;
        let (first, second) = match top.as_binary() {
            Some((BinaryOp::Subtract, first, second, None))
                if matches!(
                    top.result_type().as_primitive(),
                    Some(PrimitiveType::Long | PrimitiveType::Float | PrimitiveType::Double)
                ) =>
            {
                (first.clone(), second.clone())
            }
            _ => {
                let zero = match top.result_type() {
                    ty if ty.is_boolean() => constant_of(false),
                    _ => constant_of(0),
                };
                (top, zero)
            }
        };
        let test = build::binary(op, first, second)?;
        self.branch(insn, test)
    }

    fn compare(&mut self, insn: &Instruction, op: BinaryOp) -> Result<()> {
        let second = self.pop(insn.offset)?;
        let first = self.pop(insn.offset)?;
        let test = build::binary(op, first, second)?;
        self.branch(insn, test)
    }

    fn load(&mut self, opcode: Opcode, slot: usize, offset: usize) -> Result<()> {
        let expression = match self.slots.get(slot) {
            Some(Slot::Parameter(index, ty)) => build::parameter(ty.clone(), *index)?,
            Some(Slot::Receiver) => match &self.receiver {
                Some(receiver) => {
                    self.receiver_loaded = true;
                    receiver.clone()
                }
                None => return Err(Violation::MissingReceiver.into()),
            },
            Some(Slot::Upper) | None => return Err(Error::opcode(opcode, offset)),
        };
        self.push(offset, expression)
    }

    /// Duplicates the top `copy` words and inserts them below the next `skip` words.
    fn dup(&mut self, copy: usize, skip: usize, offset: usize) -> Result<()> {
        let stack = self.current(offset)?;
        let mut copies = Vec::new();
        let mut depth = 0;
        let mut words = 0;
        while words < copy {
            let entry = self.forest.peek_at(stack, depth, offset)?;
            words += entry.result_type().slot_size();
            copies.push(entry.clone());
            depth += 1;
        }
        let mut words = 0;
        while words < skip {
            words += self
                .forest
                .peek_at(stack, depth, offset)?
                .result_type()
                .slot_size();
            depth += 1;
        }
        for (index, copy) in copies.into_iter().enumerate() {
            self.forest.insert_below(stack, depth + index, copy, offset)?;
        }
        Ok(())
    }

    fn pool_index(insn: &Instruction) -> Result<u16> {
        match insn.operand {
            Operand::Pool(index) | Operand::InvokeInterface { method: index, .. } => Ok(index),
            _ => Err(Error::opcode(insn.opcode, insn.offset)),
        }
    }

    fn class_error(&self, error: jlclass::ClassFileError) -> Error {
        Error::class_file(&self.class.this_class, error)
    }

    fn member_ref(&self, insn: &Instruction) -> Result<MemberRef> {
        let index = Self::pool_index(insn)?;
        self.class
            .pool
            .member_ref(index)
            .map_err(|e| self.class_error(e))
    }

    fn class_type(&self, insn: &Instruction) -> Result<JavaType> {
        let index = Self::pool_index(insn)?;
        self.class
            .pool
            .class_type(index)
            .map_err(|e| self.class_error(e))
    }

    fn ldc(&mut self, insn: &Instruction) -> Result<()> {
        let index = Self::pool_index(insn)?;
        let value = match self.class.pool.loadable(index).map_err(|e| self.class_error(e))? {
            Loadable::Int(v) => Value::Int(v),
            Loadable::Float(v) => Value::Float(v),
            Loadable::Long(v) => Value::Long(v),
            Loadable::Double(v) => Value::Double(v),
            Loadable::String(s) => Value::String(s),
            Loadable::Class(ty) => Value::Class(ty),
            Loadable::MethodType(_) | Loadable::MethodHandle { .. } | Loadable::Dynamic { .. } => {
                return Err(Error::opcode(insn.opcode, insn.offset));
            }
        };
        self.push(insn.offset, constant_of(value))
    }

    fn field(&mut self, insn: &Instruction, is_static: bool) -> Result<()> {
        let member = self.member_ref(insn)?;
        let handle = MemberHandle::field(member.owner, member.name, member.descriptor, is_static)
            .map_err(|e| self.class_error(e.into()))?;
        let instance = if is_static {
            None
        } else {
            Some(self.pop(insn.offset)?)
        };
        let expression = build::field(instance, handle)?;
        self.push(insn.offset, expression)
    }

    fn arguments(&mut self, count: usize, offset: usize) -> Result<Vec<Expression>> {
        let mut arguments = Vec::with_capacity(count);
        for _ in 0..count {
            arguments.push(self.pop(offset)?);
        }
        arguments.reverse();
        Ok(arguments)
    }

    fn invoke(&mut self, insn: &Instruction) -> Result<()> {
        let offset = insn.offset;
        let member = self.member_ref(insn)?;
        let descriptor =
            MethodDescriptor::parse(&member.descriptor).map_err(|e| self.class_error(e.into()))?;
        let arguments = self.arguments(descriptor.parameters.len(), offset)?;

        if insn.opcode == Opcode::Invokespecial && &*member.name == "<init>" {
            let handle = MemberHandle::constructor(member.owner, member.descriptor)
                .map_err(|e| self.class_error(e.into()))?;
            self.pop_new_placeholder(&handle, offset)?;
            let stack = self.current(offset)?;
            if self
                .forest
                .peek(stack)
                .is_some_and(|top| is_new_placeholder(top, &handle))
            {
                self.pop(offset)?;
            }
            let created = build::invoke(None, handle, arguments)?;
            return self.push(offset, created);
        }

        if descriptor.return_type.is_void() {
            return Err(Error::opcode(insn.opcode, offset));
        }

        let is_static = insn.opcode == Opcode::Invokestatic;
        let handle = MemberHandle::method(member.owner, member.name, member.descriptor, is_static)
            .map_err(|e| self.class_error(e.into()))?;
        let instance = if is_static {
            None
        } else {
            Some(self.pop(offset)?)
        };
        let call = build::invoke(instance, handle, arguments)?;
        self.push(offset, call)
    }

    fn pop_new_placeholder(&mut self, handle: &MemberHandle, offset: usize) -> Result<()> {
        let receiver = self.pop(offset)?;
        if !is_new_placeholder(&receiver, handle) {
            return Err(Violation::MalformedNew { offset }.into());
        }
        Ok(())
    }

    fn invokedynamic(&mut self, insn: &Instruction) -> Result<()> {
        let offset = insn.offset;
        let index = Self::pool_index(insn)?;
        let site = self
            .class
            .pool
            .invoke_dynamic(index)
            .map_err(|e| self.class_error(e))?;
        let Some(recipe) = self.concat_recipe(&site)? else {
            return Err(Error::opcode(insn.opcode, offset));
        };

        let descriptor =
            MethodDescriptor::parse(&site.descriptor).map_err(|e| self.class_error(e.into()))?;
        let arguments = self.arguments(descriptor.parameters.len(), offset)?;
        let concatenated = concatenate(&recipe, arguments, offset)?;
        self.push(offset, concatenated)
    }

    /// Recipe and constants of a `makeConcatWithConstants` call site, `None` for other bootstraps.
    fn concat_recipe(&self, site: &InvokeDynamicRef) -> Result<Option<Recipe>> {
        let pool = &self.class.pool;
        let Some(bootstrap) = self.class.bootstrap_methods.get(site.bootstrap as usize) else {
            return Ok(None);
        };
        let (_, handle) = pool
            .method_handle(bootstrap.method)
            .map_err(|e| self.class_error(e))?;
        if &*handle.owner != STRING_CONCAT_FACTORY || &*handle.name != "makeConcatWithConstants" {
            return Ok(None);
        }

        let mut constants = Vec::new();
        for &argument in &bootstrap.arguments {
            let value = match pool.loadable(argument).map_err(|e| self.class_error(e))? {
                Loadable::String(s) => s.to_string(),
                Loadable::Int(v) => v.to_string(),
                Loadable::Long(v) => v.to_string(),
                Loadable::Float(v) => Value::Float(v).to_string(),
                Loadable::Double(v) => Value::Double(v).to_string(),
                Loadable::Class(ty) => ty.to_string(),
                _ => return Ok(None),
            };
            constants.push(value);
        }
        if constants.is_empty() {
            return Ok(None);
        }
        let template = constants.remove(0);
        Ok(Some(Recipe {
            template,
            constants,
        }))
    }

    fn step(&mut self, insn: &Instruction) -> Result<()> {
        use Opcode::*;

        let offset = insn.offset;
        match insn.opcode {
            Nop => Ok(()),

            AconstNull => self.push(offset, build::null(JavaType::object())?),
            IconstM1 | Iconst0 | Iconst1 | Iconst2 | Iconst3 | Iconst4 | Iconst5 => {
                let value = insn.opcode.as_u8() as i32 - Iconst0.as_u8() as i32;
                self.push(offset, constant_of(value))
            }
            Lconst0 | Lconst1 => {
                let value = (insn.opcode.as_u8() - Lconst0.as_u8()) as i64;
                self.push(offset, constant_of(value))
            }
            Fconst0 | Fconst1 | Fconst2 => {
                let value = (insn.opcode.as_u8() - Fconst0.as_u8()) as f32;
                self.push(offset, constant_of(value))
            }
            Dconst0 | Dconst1 => {
                let value = (insn.opcode.as_u8() - Dconst0.as_u8()) as f64;
                self.push(offset, constant_of(value))
            }
            Bipush | Sipush => match insn.operand {
                Operand::Immediate(value) => self.push(offset, constant_of(value)),
                _ => Err(Error::opcode(insn.opcode, offset)),
            },
            Ldc | LdcW | Ldc2W => self.ldc(insn),

            Iload | Lload | Fload | Dload | Aload => match insn.operand {
                Operand::Local(slot) => self.load(insn.opcode, slot as usize, offset),
                _ => Err(Error::opcode(insn.opcode, offset)),
            },
            Iload0 | Iload1 | Iload2 | Iload3 | Lload0 | Lload1 | Lload2 | Lload3 | Fload0
            | Fload1 | Fload2 | Fload3 | Dload0 | Dload1 | Dload2 | Dload3 | Aload0 | Aload1
            | Aload2 | Aload3 => {
                let slot = (insn.opcode.as_u8() - Iload0.as_u8()) % 4;
                self.load(insn.opcode, slot as usize, offset)
            }

            Iaload | Laload | Faload | Daload | Aaload | Baload | Caload | Saload => {
                self.binary(offset, build::array_index)
            }
            Arraylength => self.unary(offset, build::array_length),

            Dup => self.dup(1, 0, offset),
            DupX1 => self.dup(1, 1, offset),
            DupX2 => self.dup(1, 2, offset),
            Dup2 => self.dup(2, 0, offset),
            Dup2X1 => self.dup(2, 1, offset),
            Dup2X2 => self.dup(2, 2, offset),
            Swap => {
                let top = self.pop(offset)?;
                let below = self.pop(offset)?;
                self.push(offset, top)?;
                self.push(offset, below)
            }

            Iadd | Ladd | Fadd | Dadd => self.binary(offset, build::add),
            Isub | Lsub | Fsub | Dsub => self.binary(offset, build::subtract),
            Imul | Lmul | Fmul | Dmul => self.binary(offset, build::multiply),
            Idiv | Ldiv | Fdiv | Ddiv => self.binary(offset, build::divide),
            Irem | Lrem | Frem | Drem => self.binary(offset, build::modulo),
            Ineg | Lneg | Fneg | Dneg => self.unary(offset, build::negate),
            Ishl | Lshl => self.binary(offset, build::left_shift),
            Ishr | Lshr => self.binary(offset, build::right_shift),
            Iushr | Lushr => self.binary(offset, build::unsigned_right_shift),
            Iand | Land => self.binary(offset, build::bitwise_and),
            Ior | Lor => self.binary(offset, build::bitwise_or),
            Ixor | Lxor => self.binary(offset, build::exclusive_or),

            I2l | F2l | D2l => self.convert(offset, PrimitiveType::Long),
            I2f | L2f | D2f => self.convert(offset, PrimitiveType::Float),
            I2d | L2d | F2d => self.convert(offset, PrimitiveType::Double),
            L2i | F2i | D2i => self.convert(offset, PrimitiveType::Int),
            I2b => self.convert(offset, PrimitiveType::Byte),
            I2c => self.convert(offset, PrimitiveType::Char),
            I2s => self.convert(offset, PrimitiveType::Short),

            Lcmp | Fcmpl | Fcmpg | Dcmpl | Dcmpg => self.binary(offset, build::subtract),

            // Branch tests hold on the fall-through side, hence the dual predicates.
            Ifeq => self.compare_with_zero(insn, BinaryOp::NotEqual),
            Ifne => self.compare_with_zero(insn, BinaryOp::Equal),
            Iflt => self.compare_with_zero(insn, BinaryOp::GreaterThanOrEqual),
            Ifge => self.compare_with_zero(insn, BinaryOp::LessThan),
            Ifgt => self.compare_with_zero(insn, BinaryOp::LessThanOrEqual),
            Ifle => self.compare_with_zero(insn, BinaryOp::GreaterThan),
            IfIcmpeq | IfAcmpeq => self.compare(insn, BinaryOp::NotEqual),
            IfIcmpne | IfAcmpne => self.compare(insn, BinaryOp::Equal),
            IfIcmplt => self.compare(insn, BinaryOp::GreaterThanOrEqual),
            IfIcmpge => self.compare(insn, BinaryOp::LessThan),
            IfIcmpgt => self.compare(insn, BinaryOp::LessThanOrEqual),
            IfIcmple => self.compare(insn, BinaryOp::GreaterThan),
            Ifnull => {
                let operand = self.pop(offset)?;
                self.branch(insn, build::is_non_null(operand)?)
            }
            Ifnonnull => {
                let operand = self.pop(offset)?;
                self.branch(insn, build::is_null(operand)?)
            }
            Goto | GotoW => self.goto(insn),

            Ireturn | Lreturn | Freturn | Dreturn | Areturn => {
                let stack = self.current(offset)?;
                self.pending.entry(Target::End).or_default().push(stack);
                self.current = None;
                Ok(())
            }

            Getstatic => self.field(insn, true),
            Getfield => self.field(insn, false),
            Invokevirtual | Invokespecial | Invokestatic | Invokeinterface => self.invoke(insn),
            Invokedynamic => self.invokedynamic(insn),

            New => {
                let ty = self.class_type(insn)?;
                self.push(offset, build::null(ty)?)
            }
            Checkcast => {
                let ty = self.class_type(insn)?;
                if ty.is_object() {
                    return Ok(());
                }
                self.unary(offset, |operand| TypeConverter::new(ty).convert(&operand))
            }
            Instanceof => {
                let ty = self.class_type(insn)?;
                self.unary(offset, |operand| build::instance_of(operand, ty))
            }

            Istore | Lstore | Fstore | Dstore | Astore | Istore0 | Istore1 | Istore2 | Istore3
            | Lstore0 | Lstore1 | Lstore2 | Lstore3 | Fstore0 | Fstore1 | Fstore2 | Fstore3
            | Dstore0 | Dstore1 | Dstore2 | Dstore3 | Astore0 | Astore1 | Astore2 | Astore3
            | Iastore | Lastore | Fastore | Dastore | Aastore | Bastore | Castore | Sastore
            | Pop | Pop2 | Iinc | Jsr | JsrW | Ret | Tableswitch | Lookupswitch | Return
            | Putstatic | Putfield | Newarray | Anewarray | Multianewarray | Athrow
            | Monitorenter | Monitorexit | Wide => Err(Error::opcode(insn.opcode, offset)),
        }
    }
}

fn is_new_placeholder(expression: &Expression, constructor: &MemberHandle) -> bool {
    matches!(expression.as_constant(), Some(Value::Null))
        && expression.result_type() == constructor.result_type()
}

struct Recipe {
    template: String,
    constants: Vec<String>,
}

/// Lowers a string concatenation recipe to `String.valueOf` and `String.concat` calls.
fn concatenate(recipe: &Recipe, arguments: Vec<Expression>, offset: usize) -> Result<Expression> {
    let concat = string_method("concat", "(Ljava/lang/String;)Ljava/lang/String;", false)?;
    let mut arguments = arguments.into_iter();
    let mut constants = recipe.constants.iter();
    let mut parts = Vec::new();
    let mut literal = String::new();

    for c in recipe.template.chars() {
        match c {
            RECIPE_ARGUMENT => {
                flush(&mut literal, &mut parts);
                let argument = arguments
                    .next()
                    .ok_or(Violation::StackUnderflow { offset })?;
                parts.push(to_string(argument)?);
            }
            RECIPE_CONSTANT => {
                let constant = constants
                    .next()
                    .ok_or(Error::opcode(Opcode::Invokedynamic, offset))?;
                literal.push_str(constant);
            }
            c => literal.push(c),
        }
    }
    flush(&mut literal, &mut parts);

    let mut parts = parts.into_iter();
    let Some(mut result) = parts.next() else {
        return Ok(constant_of(""));
    };
    for part in parts {
        result = build::invoke(Some(result), concat.clone(), [part])?;
    }
    Ok(result)
}

fn flush(literal: &mut String, parts: &mut Vec<Expression>) {
    if !literal.is_empty() {
        parts.push(constant_of(std::mem::take(literal)));
    }
}

fn to_string(argument: Expression) -> Result<Expression> {
    let descriptor = match argument.result_type().as_primitive() {
        Some(PrimitiveType::Boolean) => "(Z)Ljava/lang/String;",
        Some(PrimitiveType::Char) => "(C)Ljava/lang/String;",
        Some(PrimitiveType::Long) => "(J)Ljava/lang/String;",
        Some(PrimitiveType::Float) => "(F)Ljava/lang/String;",
        Some(PrimitiveType::Double) => "(D)Ljava/lang/String;",
        Some(_) => "(I)Ljava/lang/String;",
        None => "(Ljava/lang/Object;)Ljava/lang/String;",
    };
    let value_of = string_method("valueOf", descriptor, true)?;
    Ok(build::invoke(None, value_of, [argument])?)
}

fn string_method(name: &str, descriptor: &str, is_static: bool) -> Result<MemberHandle> {
    MemberHandle::method(jlclass::types::STRING, name, descriptor, is_static)
        .map_err(|e| Error::unavailable(jlclass::types::STRING, e))
}
