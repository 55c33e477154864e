//! Folding of the stacks that meet at a jump target.
//!
//! The stacks reaching a label are leaves of the branch tree. Their lowest
//! common branch is rewritten into `reach ? merged : rest`, where
//!
//! - `reach` is the condition, relative to that branch, under which control
//!   arrives at one of the merging leaves. Every path contributes the tests
//!   along it, each taken on the side the path follows;
//! - `merged` holds the values carried by the merging leaves, joined with
//!   conditionals where the paths disagree;
//! - `rest` is the subtree with the merging leaves cut out. A branch left
//!   with a single side is replaced by that side, since control reaching it
//!   outside of `reach` can only take that side.
//!
//! When every leaf below the common branch merges, the branch disappears and
//! the merged values land on the stack holding it. The classic shapes are
//! instances of this rewrite: both sides of one branch joining into a
//! ternary, sibling branches meeting at a shared target, and a deeper branch
//! joining the older path it was nested in.

use jlexpr::Expression;
use jlexpr::build;
use log::debug;
use smallvec::SmallVec;

use super::stack::{BranchKey, Forest, StackKey};
use crate::error::{Result, Violation};

type Leaves = SmallVec<StackKey, 4>;

/// Reduces a non-empty pending list to a single stack.
pub(crate) fn reduce(forest: &mut Forest, pending: Vec<StackKey>, target: &str) -> Result<StackKey> {
    let mut leaves = Leaves::new();
    for stack in pending {
        let stack = forest.resolve(stack);
        if forest.placeholder(stack).is_some() {
            return Err(irreducible(target));
        }
        if !leaves.contains(&stack) {
            leaves.push(stack);
        }
    }

    match leaves.as_slice() {
        [] => Err(irreducible(target)),
        [single] => Ok(*single),
        _ => merge(forest, &leaves, target),
    }
}

fn irreducible(target: &str) -> crate::Error {
    Violation::Irreducible {
        target: target.to_string(),
    }
    .into()
}

fn merge(forest: &mut Forest, leaves: &[StackKey], target: &str) -> Result<StackKey> {
    let key = common_branch(forest, leaves).ok_or_else(|| irreducible(target))?;
    let branch = forest.branch(key);
    let (test, on_true, on_false, holder) = (
        branch.test.clone(),
        branch.on_true,
        branch.on_false,
        branch.parent,
    );
    if forest.placeholder(holder) != Some(key) {
        return Err(irreducible(target));
    }

    let reach = Reach::branch(
        test.clone(),
        reach(forest, on_true, leaves)?,
        reach(forest, on_false, leaves)?,
    )?;
    let values = join(forest, key, Vec::new(), leaves, target)?.ok_or_else(|| irreducible(target))?;

    let rest = match (
        prune(forest, on_true, leaves),
        prune(forest, on_false, leaves),
    ) {
        (None, None) => None,
        (Some(on_true), Some(on_false)) => {
            forest.set_sides(key, on_true, on_false);
            Some(forest.wrap(key))
        }
        (Some(side), None) | (None, Some(side)) => Some(side),
    };

    let Some(rest) = rest else {
        forest.pop_placeholder(holder);
        for value in values {
            forest.push(holder, value);
        }
        debug!("Joined every path below `{test}` at {target}");
        return Ok(holder);
    };

    let Reach::When(reach) = reach else {
        return Err(irreducible(target));
    };
    debug!("Paths meeting at {target} are reached when `{reach}`");
    let merged = forest.new_stack(values);
    forest
        .attach(holder, reach, merged, rest)
        .ok_or_else(|| irreducible(target))?;
    Ok(merged)
}

/// Deepest branch above every leaf.
fn common_branch(forest: &Forest, leaves: &[StackKey]) -> Option<BranchKey> {
    let (first, others) = leaves.split_first()?;
    let mut common = forest.ancestors(*first);
    for &leaf in others {
        let ancestors = forest.ancestors(leaf);
        let shared = common
            .iter()
            .zip(&ancestors)
            .take_while(|(a, b)| a == b)
            .count();
        common.truncate(shared);
    }
    common.last().copied()
}

/// Condition under which control below some branch ends up in a merging leaf.
enum Reach {
    Never,
    Always,
    When(Expression),
}

impl Reach {
    fn branch(test: Expression, on_true: Reach, on_false: Reach) -> Result<Reach> {
        use Reach::*;

        let reach = match (on_true, on_false) {
            (Never, Never) => Never,
            (Always, Always) => Always,
            (Always, Never) => When(test),
            (Never, Always) => When(build::logical_not(test)?),
            (Always, When(x)) => When(build::logical_or(test, x)?),
            (When(x), Always) => When(build::logical_or(build::logical_not(test)?, x)?),
            (Never, When(x)) => When(build::logical_and(build::logical_not(test)?, x)?),
            (When(x), Never) => When(build::logical_and(test, x)?),
            (When(x), When(y)) => When(build::condition(test, x, y)?),
        };
        Ok(reach)
    }
}

fn reach(forest: &Forest, stack: StackKey, leaves: &[StackKey]) -> Result<Reach> {
    let Some(key) = forest.placeholder(stack) else {
        return Ok(if leaves.contains(&stack) {
            Reach::Always
        } else {
            Reach::Never
        });
    };
    let branch = forest.branch(key);
    Reach::branch(
        branch.test.clone(),
        reach(forest, branch.on_true, leaves)?,
        reach(forest, branch.on_false, leaves)?,
    )
}

/// Values the merging leaves below branch `key` carry on top of `prefix`,
/// `None` when no merging leaf hangs below it.
fn join(
    forest: &Forest,
    key: BranchKey,
    prefix: Vec<Expression>,
    leaves: &[StackKey],
    target: &str,
) -> Result<Option<Vec<Expression>>> {
    let branch = forest.branch(key);
    let when_true = values(forest, branch.on_true, prefix.clone(), leaves, target)?;
    let when_false = values(forest, branch.on_false, prefix, leaves, target)?;

    match (when_true, when_false) {
        (Some(when_true), Some(when_false)) => {
            if when_true.len() != when_false.len() {
                return Err(irreducible(target));
            }
            when_true
                .into_iter()
                .zip(when_false)
                .map(|(a, b)| -> Result<Expression> {
                    if a == b {
                        Ok(a)
                    } else {
                        Ok(build::condition(branch.test.clone(), a, b)?)
                    }
                })
                .collect::<Result<Vec<_>>>()
                .map(Some)
        }
        (Some(values), None) | (None, Some(values)) => Ok(Some(values)),
        (None, None) => Ok(None),
    }
}

fn values(
    forest: &Forest,
    stack: StackKey,
    mut prefix: Vec<Expression>,
    leaves: &[StackKey],
    target: &str,
) -> Result<Option<Vec<Expression>>> {
    prefix.extend(forest.values(stack).cloned());
    match forest.placeholder(stack) {
        Some(key) => join(forest, key, prefix, leaves, target),
        None if leaves.contains(&stack) => Ok(Some(prefix)),
        None => Ok(None),
    }
}

/// Cuts the merging leaves out of the subtree rooted at `stack`; `None` when
/// nothing is left.
fn prune(forest: &mut Forest, stack: StackKey, leaves: &[StackKey]) -> Option<StackKey> {
    let Some(key) = forest.placeholder(stack) else {
        return (!leaves.contains(&stack)).then_some(stack);
    };
    let (on_true, on_false) = {
        let branch = forest.branch(key);
        (branch.on_true, branch.on_false)
    };

    match (
        prune(forest, on_true, leaves),
        prune(forest, on_false, leaves),
    ) {
        (Some(on_true), Some(on_false)) => {
            forest.set_sides(key, on_true, on_false);
            Some(stack)
        }
        (Some(side), None) | (None, Some(side)) => {
            forest.splice(stack, side);
            Some(stack)
        }
        (None, None) => None,
    }
}
