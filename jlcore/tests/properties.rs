//! Randomised round trips through bytecode.
//!
//! Conditions and integer expressions over `int P0` are compiled to bytecode,
//! lifted back and evaluated. The lifted lambda must agree with a direct
//! evaluation on every sample. Conditions are laid out both the way javac
//! threads its jumps and in a compact form jumping straight to each outcome.

mod common;

use common::javac::{Cmp, Cond, Javac};
use common::*;
use jlclass::Opcode;
use jlexpr::Value;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

const SEEDS: u64 = 96;

/// Compact layout: every condition jumps straight to the outcome it rules
/// out, with no threading of jumps through shared exits.
mod compact {
    use jlclass::{CodeBuilder, Label, Opcode};

    use super::common::javac::{Cond, negate};

    /// Falls through when `cond` holds, jumps to `target` otherwise.
    pub fn jump_if_false(cond: &Cond, code: &mut CodeBuilder<'_>, target: Label) {
        match cond {
            Cond::Compare(cmp, c) => {
                code.op(Opcode::Iload0)
                    .iconst(*c)
                    .jump(negate(cmp.opcode()), target);
            }
            Cond::And(a, b) => {
                jump_if_false(a, code, target);
                jump_if_false(b, code, target);
            }
            Cond::Or(a, b) => {
                let rest = code.new_label();
                jump_if_true(a, code, rest);
                jump_if_false(b, code, target);
                code.bind(rest);
            }
            Cond::Choice(test, a, b) => {
                let (otherwise, done) = (code.new_label(), code.new_label());
                jump_if_false(test, code, otherwise);
                jump_if_false(a, code, target);
                code.jump(Opcode::Goto, done).bind(otherwise);
                jump_if_false(b, code, target);
                code.bind(done);
            }
        }
    }

    /// Falls through when `cond` fails, jumps to `target` otherwise.
    pub fn jump_if_true(cond: &Cond, code: &mut CodeBuilder<'_>, target: Label) {
        match cond {
            Cond::Compare(cmp, c) => {
                code.op(Opcode::Iload0).iconst(*c).jump(cmp.opcode(), target);
            }
            Cond::And(a, b) => {
                let rest = code.new_label();
                jump_if_false(a, code, rest);
                jump_if_true(b, code, target);
                code.bind(rest);
            }
            Cond::Or(a, b) => {
                jump_if_true(a, code, target);
                jump_if_true(b, code, target);
            }
            Cond::Choice(test, a, b) => {
                let (otherwise, done) = (code.new_label(), code.new_label());
                jump_if_false(test, code, otherwise);
                jump_if_true(a, code, target);
                code.jump(Opcode::Goto, done).bind(otherwise);
                jump_if_true(b, code, target);
                code.bind(done);
            }
        }
    }

    /// Body of `(I)Z` returning `cond`.
    pub fn predicate(cond: &Cond) -> impl FnOnce(&mut CodeBuilder<'_>) + '_ {
        move |code| {
            let (otherwise, end) = (code.new_label(), code.new_label());
            jump_if_false(cond, code, otherwise);
            code.iconst(1)
                .jump(Opcode::Goto, end)
                .bind(otherwise)
                .iconst(0)
                .bind(end)
                .op(Opcode::Ireturn);
        }
    }
}

#[derive(Debug, Clone)]
enum IntExpr {
    Param,
    Const(i32),
    Add(Box<IntExpr>, Box<IntExpr>),
    Sub(Box<IntExpr>, Box<IntExpr>),
    Mul(Box<IntExpr>, Box<IntExpr>),
    Choose(Cond, Box<IntExpr>, Box<IntExpr>),
}

impl IntExpr {
    fn eval(&self, p: i32) -> i32 {
        match self {
            IntExpr::Param => p,
            IntExpr::Const(c) => *c,
            IntExpr::Add(a, b) => a.eval(p).wrapping_add(b.eval(p)),
            IntExpr::Sub(a, b) => a.eval(p).wrapping_sub(b.eval(p)),
            IntExpr::Mul(a, b) => a.eval(p).wrapping_mul(b.eval(p)),
            IntExpr::Choose(test, a, b) => {
                if test.holds(p) {
                    a.eval(p)
                } else {
                    b.eval(p)
                }
            }
        }
    }

    fn lower(&self, g: &mut Javac<'_, '_>) {
        match self {
            IntExpr::Param => {
                g.emit().op(Opcode::Iload0);
            }
            IntExpr::Const(c) => {
                g.emit().iconst(*c);
            }
            IntExpr::Add(a, b) | IntExpr::Sub(a, b) | IntExpr::Mul(a, b) => {
                a.lower(g);
                b.lower(g);
                g.emit().op(match self {
                    IntExpr::Add(..) => Opcode::Iadd,
                    IntExpr::Sub(..) => Opcode::Isub,
                    _ => Opcode::Imul,
                });
            }
            IntExpr::Choose(test, a, b) => {
                let test = test.lower(g);
                g.select(test, |g| a.lower(g), |g| b.lower(g));
            }
        }
    }
}

fn compare(rng: &mut ChaCha20Rng) -> Cond {
    let cmp = Cmp::ALL[rng.random_range(0..Cmp::ALL.len())];
    Cond::Compare(cmp, rng.random_range(-5..25))
}

fn cond(rng: &mut ChaCha20Rng, depth: u32) -> Cond {
    if depth == 0 || rng.random_bool(0.25) {
        return compare(rng);
    }
    match rng.random_range(0..5) {
        0 | 1 => Cond::And(
            Box::new(cond(rng, depth - 1)),
            Box::new(cond(rng, depth - 1)),
        ),
        2 | 3 => Cond::Or(
            Box::new(cond(rng, depth - 1)),
            Box::new(cond(rng, depth - 1)),
        ),
        _ => Cond::Choice(
            Box::new(compare(rng)),
            Box::new(compare(rng)),
            Box::new(compare(rng)),
        ),
    }
}

fn int_expr(rng: &mut ChaCha20Rng, depth: u32) -> IntExpr {
    if depth == 0 || rng.random_bool(0.3) {
        return if rng.random_bool(0.5) {
            IntExpr::Param
        } else {
            IntExpr::Const(rng.random_range(-3..8))
        };
    }
    let (a, b) = (
        Box::new(int_expr(rng, depth - 1)),
        Box::new(int_expr(rng, depth - 1)),
    );
    match rng.random_range(0..4) {
        0 => IntExpr::Add(a, b),
        1 => IntExpr::Sub(a, b),
        2 => IntExpr::Mul(a, b),
        _ => IntExpr::Choose(cond(rng, 2), a, b),
    }
}

fn samples(rng: &mut ChaCha20Rng) -> Vec<i32> {
    let mut samples: Vec<i32> = (0..12).map(|_| rng.random_range(-8..30)).collect();
    samples.extend([-5, 0, 24, 25]);
    samples
}

#[test]
fn short_circuit_conditions_round_trip() {
    for seed in 0..SEEDS {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let tree = cond(&mut rng, 4);

        let lifted = [
            ("javac", resolve_static(PREDICATE, TEST, "(I)Z", common::javac::predicate(&tree))),
            ("compact", resolve_static(PREDICATE, TEST, "(I)Z", compact::predicate(&tree))),
        ];
        let samples = samples(&mut rng);
        for (layout, lambda) in lifted {
            let lambda =
                lambda.unwrap_or_else(|e| panic!("seed {seed}, {layout} layout: {tree:?}: {e}"));
            for &p in &samples {
                assert_eq!(
                    call(&lambda, &[Value::Int(p)]),
                    Value::Boolean(tree.holds(p)),
                    "seed {seed}, {layout} layout, P0 = {p}: {tree:?} lifted as {lambda}"
                );
            }
        }
    }
}

#[test]
fn conditional_values_round_trip() {
    for seed in 0..SEEDS {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let tree = int_expr(&mut rng, 3);

        let lambda = resolve_static(FUNCTION, APPLY, "(I)I", |code| {
            let mut g = Javac::new(code);
            tree.lower(&mut g);
            g.emit().op(Opcode::Ireturn);
        })
        .unwrap_or_else(|e| panic!("seed {seed}: {tree:?}: {e}"));

        for p in samples(&mut rng) {
            assert_eq!(
                call(&lambda, &[Value::Int(p)]),
                Value::Int(tree.eval(p)),
                "seed {seed}, P0 = {p}: {tree:?} lifted as {lambda}"
            );
        }
    }
}
