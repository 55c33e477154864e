//! Conditions compiled the way javac lays them out.
//!
//! A condition compiles to an [`Item`]: a trailing conditional jump that is
//! not emitted yet, plus chains of jumps already emitted towards the true and
//! false outcomes. Resolving a chain binds its labels at the next emitted
//! instruction; a `goto` emitted while jumps are pending takes them over, so
//! no jump ever lands on a `goto`.

use jlclass::{CodeBuilder, Label, Opcode};

pub type Chain = Vec<Label>;

pub struct Item {
    /// Jumps when the condition holds.
    pub opcode: Opcode,
    pub true_jumps: Chain,
    pub false_jumps: Chain,
}

impl Item {
    fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            true_jumps: Chain::new(),
            false_jumps: Chain::new(),
        }
    }
}

pub fn negate(opcode: Opcode) -> Opcode {
    use Opcode::*;

    match opcode {
        IfIcmpeq => IfIcmpne,
        IfIcmpne => IfIcmpeq,
        IfIcmplt => IfIcmpge,
        IfIcmpge => IfIcmplt,
        IfIcmpgt => IfIcmple,
        IfIcmple => IfIcmpgt,
        Ifeq => Ifne,
        Ifne => Ifeq,
        Iflt => Ifge,
        Ifge => Iflt,
        Ifgt => Ifle,
        Ifle => Ifgt,
        other => panic!("{other:?} is not a conditional jump"),
    }
}

/// `if_icmp<cond>` turned into `if<cond>` against zero.
fn against_zero(opcode: Opcode) -> Opcode {
    use Opcode::*;

    match opcode {
        IfIcmpeq => Ifeq,
        IfIcmpne => Ifne,
        IfIcmplt => Iflt,
        IfIcmpge => Ifge,
        IfIcmpgt => Ifgt,
        IfIcmple => Ifle,
        other => panic!("{other:?} is not an int comparison"),
    }
}

pub struct Javac<'c, 'a> {
    code: &'c mut CodeBuilder<'a>,
    pending: Chain,
}

impl<'c, 'a> Javac<'c, 'a> {
    pub fn new(code: &'c mut CodeBuilder<'a>) -> Self {
        Self {
            code,
            pending: Chain::new(),
        }
    }

    /// Builder positioned at the next instruction, pending jumps bound to it.
    pub fn emit(&mut self) -> &mut CodeBuilder<'a> {
        for label in self.pending.drain(..) {
            self.code.bind(label);
        }
        &mut *self.code
    }

    pub fn resolve(&mut self, chain: Chain) {
        self.pending.extend(chain);
    }

    pub fn branch(&mut self, opcode: Opcode) -> Chain {
        let label = self.code.new_label();
        if opcode == Opcode::Goto {
            let mut chain = std::mem::take(&mut self.pending);
            self.code.jump(opcode, label);
            chain.push(label);
            return chain;
        }
        self.emit().jump(opcode, label);
        vec![label]
    }

    pub fn jump_true(&mut self, item: Item) -> Chain {
        let mut chain = item.true_jumps;
        chain.extend(self.branch(item.opcode));
        chain
    }

    pub fn jump_false(&mut self, item: Item) -> Chain {
        let mut chain = item.false_jumps;
        chain.extend(self.branch(negate(item.opcode)));
        chain
    }

    /// `P0 <cond> constant` for an `int P0`, `cond` given as `if_icmp<cond>`.
    pub fn compare(&mut self, opcode: Opcode, constant: i32) -> Item {
        self.emit().op(Opcode::Iload0);
        if constant == 0 {
            return Item::new(against_zero(opcode));
        }
        self.emit().iconst(constant);
        Item::new(opcode)
    }

    pub fn and(
        &mut self,
        first: impl FnOnce(&mut Self) -> Item,
        second: impl FnOnce(&mut Self) -> Item,
    ) -> Item {
        let first = first(self);
        let true_jumps = first.true_jumps.clone();
        let mut false_jumps = self.jump_false(Item {
            true_jumps: Chain::new(),
            ..first
        });
        self.resolve(true_jumps);
        let second = second(self);
        false_jumps.extend(second.false_jumps);
        Item {
            opcode: second.opcode,
            true_jumps: second.true_jumps,
            false_jumps,
        }
    }

    pub fn or(
        &mut self,
        first: impl FnOnce(&mut Self) -> Item,
        second: impl FnOnce(&mut Self) -> Item,
    ) -> Item {
        let first = first(self);
        let false_jumps = first.false_jumps.clone();
        let mut true_jumps = self.jump_true(Item {
            false_jumps: Chain::new(),
            ..first
        });
        self.resolve(false_jumps);
        let second = second(self);
        true_jumps.extend(second.true_jumps);
        Item {
            opcode: second.opcode,
            true_jumps,
            false_jumps: second.false_jumps,
        }
    }

    /// `test ? first : second` over conditions.
    pub fn choice(
        &mut self,
        test: impl FnOnce(&mut Self) -> Item,
        first: impl FnOnce(&mut Self) -> Item,
        second: impl FnOnce(&mut Self) -> Item,
    ) -> Item {
        let test = test(self);
        let test_true = test.true_jumps.clone();
        let otherwise = self.jump_false(Item {
            true_jumps: Chain::new(),
            ..test
        });
        self.resolve(test_true);

        let first = first(self);
        let first_true = first.true_jumps.clone();
        let mut false_jumps = self.jump_false(Item {
            true_jumps: Chain::new(),
            ..first
        });
        self.resolve(first_true);
        let mut true_jumps = self.branch(Opcode::Goto);

        self.resolve(otherwise);
        let second = second(self);
        true_jumps.extend(second.true_jumps);
        false_jumps.extend(second.false_jumps);
        Item {
            opcode: second.opcode,
            true_jumps,
            false_jumps,
        }
    }

    /// Leaves `1` or `0` on the stack.
    pub fn load(&mut self, item: Item) {
        let true_jumps = item.true_jumps.clone();
        let false_chain = self.jump_false(Item {
            true_jumps: Chain::new(),
            ..item
        });
        self.resolve(true_jumps);
        self.emit().iconst(1);
        let exit = self.branch(Opcode::Goto);
        self.resolve(false_chain);
        self.emit().iconst(0);
        self.resolve(exit);
    }

    /// `test ? first : second` over values.
    pub fn select(
        &mut self,
        test: Item,
        first: impl FnOnce(&mut Self),
        second: impl FnOnce(&mut Self),
    ) {
        let test_true = test.true_jumps.clone();
        let otherwise = self.jump_false(Item {
            true_jumps: Chain::new(),
            ..test
        });
        self.resolve(test_true);
        first(self);
        let exit = self.branch(Opcode::Goto);
        self.resolve(otherwise);
        second(self);
        self.resolve(exit);
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Cmp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Cmp {
    pub const ALL: [Cmp; 6] = [Cmp::Lt, Cmp::Le, Cmp::Gt, Cmp::Ge, Cmp::Eq, Cmp::Ne];

    pub fn holds(self, a: i32, b: i32) -> bool {
        match self {
            Cmp::Lt => a < b,
            Cmp::Le => a <= b,
            Cmp::Gt => a > b,
            Cmp::Ge => a >= b,
            Cmp::Eq => a == b,
            Cmp::Ne => a != b,
        }
    }

    /// `if_icmp<cmp>`, jumping when the comparison holds.
    pub fn opcode(self) -> Opcode {
        match self {
            Cmp::Lt => Opcode::IfIcmplt,
            Cmp::Le => Opcode::IfIcmple,
            Cmp::Gt => Opcode::IfIcmpgt,
            Cmp::Ge => Opcode::IfIcmpge,
            Cmp::Eq => Opcode::IfIcmpeq,
            Cmp::Ne => Opcode::IfIcmpne,
        }
    }
}

/// Boolean expression over `int P0`.
#[derive(Debug, Clone)]
pub enum Cond {
    /// `P0 <cmp> constant`
    Compare(Cmp, i32),
    And(Box<Cond>, Box<Cond>),
    Or(Box<Cond>, Box<Cond>),
    /// `test ? first : second`
    Choice(Box<Cond>, Box<Cond>, Box<Cond>),
}

impl Cond {
    pub fn compare(cmp: Cmp, constant: i32) -> Self {
        Cond::Compare(cmp, constant)
    }

    pub fn and(self, other: Cond) -> Self {
        Cond::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Cond) -> Self {
        Cond::Or(Box::new(self), Box::new(other))
    }

    pub fn choice(self, first: Cond, second: Cond) -> Self {
        Cond::Choice(Box::new(self), Box::new(first), Box::new(second))
    }

    pub fn holds(&self, p: i32) -> bool {
        match self {
            Cond::Compare(cmp, c) => cmp.holds(p, *c),
            Cond::And(a, b) => a.holds(p) && b.holds(p),
            Cond::Or(a, b) => a.holds(p) || b.holds(p),
            Cond::Choice(test, a, b) => {
                if test.holds(p) {
                    a.holds(p)
                } else {
                    b.holds(p)
                }
            }
        }
    }

    pub fn lower(&self, g: &mut Javac<'_, '_>) -> Item {
        match self {
            Cond::Compare(cmp, c) => g.compare(cmp.opcode(), *c),
            Cond::And(a, b) => g.and(|g| a.lower(g), |g| b.lower(g)),
            Cond::Or(a, b) => g.or(|g| a.lower(g), |g| b.lower(g)),
            Cond::Choice(test, a, b) => g.choice(|g| test.lower(g), |g| a.lower(g), |g| b.lower(g)),
        }
    }
}

/// Body of `(I)Z` returning `cond`.
pub fn predicate(cond: &Cond) -> impl FnOnce(&mut CodeBuilder<'_>) + '_ {
    move |code| {
        let mut g = Javac::new(code);
        let item = cond.lower(&mut g);
        g.load(item);
        g.emit().op(Opcode::Ireturn);
    }
}
