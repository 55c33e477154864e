//! Symbolic stacks and the branch tree linking them.
//!
//! Every conditional jump forks the current stack: a [`Branch`] placeholder is
//! pushed on it and two child stacks are created, one for the fall-through path
//! and one for the jump target. All nodes live in one [`Forest`] arena owned by
//! a single lift and dropped with it.
//!
//! A stack without a placeholder on top is a leaf: the state of one pending
//! control path. Merging may splice a leaf into the stack holding its parent
//! branch; the leaf then forwards to that stack (see [`Forest::resolve`]).

use jlexpr::Expression;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::error::{Result, Violation};

new_key_type! {
    pub(crate) struct StackKey;
    pub(crate) struct BranchKey;
}

/// Branches from the root down to a stack, outermost first.
pub(crate) type Ancestors = SmallVec<BranchKey, 8>;

#[derive(Debug, Clone)]
pub(crate) enum Entry {
    Expr(Expression),
    /// Placeholder for a fork that has not been merged yet.
    Branch(BranchKey),
}

#[derive(Debug, Default)]
pub(crate) struct Stack {
    entries: Vec<Entry>,
    parent: Option<BranchKey>,
    /// Stack this one was spliced into.
    moved_to: Option<StackKey>,
}

#[derive(Debug)]
pub(crate) struct Branch {
    /// Holds on the `on_true` side.
    pub test: Expression,
    /// Fall-through side.
    pub on_true: StackKey,
    /// Jump side.
    pub on_false: StackKey,
    /// Stack carrying the placeholder.
    pub parent: StackKey,
}

#[derive(Debug, Default)]
pub(crate) struct Forest {
    stacks: SlotMap<StackKey, Stack>,
    branches: SlotMap<BranchKey, Branch>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_root(&mut self) -> StackKey {
        self.stacks.insert(Stack::default())
    }

    /// Detached stack holding `values`, to be attached with [`Forest::attach`].
    pub fn new_stack(&mut self, values: Vec<Expression>) -> StackKey {
        self.stacks.insert(Stack {
            entries: values.into_iter().map(Entry::Expr).collect(),
            ..Default::default()
        })
    }

    pub fn branch(&self, key: BranchKey) -> &Branch {
        &self.branches[key]
    }

    pub fn parent(&self, stack: StackKey) -> Option<BranchKey> {
        self.stacks[stack].parent
    }

    /// Follows splices down to the stack now standing for `stack`.
    pub fn resolve(&self, mut stack: StackKey) -> StackKey {
        while let Some(next) = self.stacks[stack].moved_to {
            stack = next;
        }
        stack
    }

    pub fn ancestors(&self, stack: StackKey) -> Ancestors {
        let mut ancestors = Ancestors::new();
        let mut cursor = self.stacks[stack].parent;
        while let Some(branch) = cursor {
            ancestors.push(branch);
            cursor = self.stacks[self.branches[branch].parent].parent;
        }
        ancestors.reverse();
        ancestors
    }

    pub fn depth(&self, stack: StackKey) -> usize {
        self.ancestors(stack).len()
    }

    pub fn len(&self, stack: StackKey) -> usize {
        self.stacks[stack].entries.len()
    }

    pub fn push(&mut self, stack: StackKey, expression: Expression) {
        self.stacks[stack].entries.push(Entry::Expr(expression));
    }

    /// Pops a value. A placeholder on top is left in place.
    pub fn pop(&mut self, stack: StackKey, offset: usize) -> Result<Expression> {
        let entries = &mut self.stacks[stack].entries;
        if matches!(entries.last(), Some(Entry::Branch(_))) {
            return Err(Violation::UnexpectedBranch { offset }.into());
        }
        match entries.pop() {
            Some(Entry::Expr(expression)) => Ok(expression),
            _ => Err(Violation::StackUnderflow { offset }.into()),
        }
    }

    pub fn peek(&self, stack: StackKey) -> Option<&Expression> {
        match self.stacks[stack].entries.last() {
            Some(Entry::Expr(expression)) => Some(expression),
            _ => None,
        }
    }

    /// Expression `depth` entries below the top, `0` being the top itself.
    pub fn peek_at(&self, stack: StackKey, depth: usize, offset: usize) -> Result<&Expression> {
        let entries = &self.stacks[stack].entries;
        let index = entries
            .len()
            .checked_sub(depth + 1)
            .ok_or(Violation::StackUnderflow { offset })?;
        match &entries[index] {
            Entry::Expr(expression) => Ok(expression),
            Entry::Branch(_) => Err(Violation::UnexpectedBranch { offset }.into()),
        }
    }

    /// Inserts `expression` below the `depth` top-most entries.
    pub fn insert_below(
        &mut self,
        stack: StackKey,
        depth: usize,
        expression: Expression,
        offset: usize,
    ) -> Result<()> {
        let entries = &mut self.stacks[stack].entries;
        let index = entries
            .len()
            .checked_sub(depth)
            .ok_or(Violation::StackUnderflow { offset })?;
        entries.insert(index, Entry::Expr(expression));
        Ok(())
    }

    /// Values of `stack`, bottom first, without its placeholder.
    pub fn values(&self, stack: StackKey) -> impl Iterator<Item = &Expression> {
        self.stacks[stack].entries.iter().filter_map(|entry| match entry {
            Entry::Expr(expression) => Some(expression),
            Entry::Branch(_) => None,
        })
    }

    /// Splits `stack` on `test`: pushes the placeholder and returns the new
    /// `(on_true, on_false)` children.
    pub fn fork(&mut self, stack: StackKey, test: Expression) -> (StackKey, StackKey) {
        let on_true = self.stacks.insert(Stack::default());
        let on_false = self.stacks.insert(Stack::default());
        let key = self.attach_branch(stack, test, on_true, on_false);
        self.stacks[stack].entries.push(Entry::Branch(key));
        (on_true, on_false)
    }

    pub fn placeholder(&self, stack: StackKey) -> Option<BranchKey> {
        match self.stacks[stack].entries.last() {
            Some(Entry::Branch(key)) => Some(*key),
            _ => None,
        }
    }

    /// Replaces the placeholder on top of `holder` by a new branch adopting
    /// two existing stacks.
    pub fn attach(
        &mut self,
        holder: StackKey,
        test: Expression,
        on_true: StackKey,
        on_false: StackKey,
    ) -> Option<BranchKey> {
        self.pop_placeholder(holder)?;
        let key = self.attach_branch(holder, test, on_true, on_false);
        self.stacks[holder].entries.push(Entry::Branch(key));
        Some(key)
    }

    fn attach_branch(
        &mut self,
        holder: StackKey,
        test: Expression,
        on_true: StackKey,
        on_false: StackKey,
    ) -> BranchKey {
        let key = self.branches.insert(Branch {
            test,
            on_true,
            on_false,
            parent: holder,
        });
        self.stacks[on_true].parent = Some(key);
        self.stacks[on_false].parent = Some(key);
        key
    }

    /// Points the sides of `key` at `on_true` and `on_false`.
    pub fn set_sides(&mut self, key: BranchKey, on_true: StackKey, on_false: StackKey) {
        let branch = &mut self.branches[key];
        branch.on_true = on_true;
        branch.on_false = on_false;
        self.stacks[on_true].parent = Some(key);
        self.stacks[on_false].parent = Some(key);
    }

    /// Detached empty stack carrying the existing branch `key`.
    pub fn wrap(&mut self, key: BranchKey) -> StackKey {
        let stack = self.stacks.insert(Stack {
            entries: vec![Entry::Branch(key)],
            ..Default::default()
        });
        self.branches[key].parent = stack;
        stack
    }

    /// Replaces the placeholder on top of `holder` by the content of `child`,
    /// which from now on forwards to `holder`.
    pub fn splice(&mut self, holder: StackKey, child: StackKey) {
        if holder == child {
            return;
        }
        self.pop_placeholder(holder);
        let entries = std::mem::take(&mut self.stacks[child].entries);
        if let Some(Entry::Branch(key)) = entries.last() {
            self.branches[*key].parent = holder;
        }
        self.stacks[holder].entries.extend(entries);
        let child = &mut self.stacks[child];
        child.parent = None;
        child.moved_to = Some(holder);
    }

    /// Removes the placeholder on top of `stack`.
    pub fn pop_placeholder(&mut self, stack: StackKey) -> Option<BranchKey> {
        let entries = &mut self.stacks[stack].entries;
        match entries.last() {
            Some(Entry::Branch(key)) => {
                let key = *key;
                entries.pop();
                Some(key)
            }
            _ => None,
        }
    }
}
