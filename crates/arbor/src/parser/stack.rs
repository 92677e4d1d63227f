//! Parse stacks with shared prefixes.
//!
//! Forking a stack is O(1): both forks keep `Arc` references to the common
//! prefix and only diverge above it. Entries pair an automaton state with the
//! tree elements accumulated for that position, so trivia travels with the
//! token it precedes.

use crate::syntax::GreenChild;
use smallvec::SmallVec;
use std::sync::Arc;

#[derive(Debug)]
struct Link {
    state: u32,
    children: SmallVec<[GreenChild; 4]>,
    prev: Option<Arc<Link>>,
    depth: u32,
}

impl Link {
    fn new(state: u32, children: SmallVec<[GreenChild; 4]>, prev: Option<Arc<Link>>) -> Arc<Self> {
        let depth = prev.as_ref().map_or(1, |p| p.depth + 1);
        Arc::new(Self {
            state,
            children,
            prev,
            depth,
        })
    }
}

/// One parse head's stack. Cloning shares the whole chain.
#[derive(Debug, Clone)]
pub struct ParseStack {
    head: Arc<Link>,
}

impl ParseStack {
    #[must_use]
    pub fn new(initial_state: u32) -> Self {
        Self {
            head: Link::new(initial_state, SmallVec::new(), None),
        }
    }

    /// State on top of the stack.
    #[must_use]
    pub fn state(&self) -> u32 {
        self.head.state
    }

    #[must_use]
    pub fn depth(&self) -> u32 {
        self.head.depth
    }

    pub fn push(&mut self, state: u32, children: SmallVec<[GreenChild; 4]>) {
        self.head = Link::new(state, children, Some(Arc::clone(&self.head)));
    }

    /// Pop `count` entries, returning each entry's children as its own group,
    /// in source order. The stack root entry is never popped.
    pub fn pop_groups(&mut self, count: usize) -> SmallVec<[SmallVec<[GreenChild; 4]>; 8]> {
        let mut groups: SmallVec<[SmallVec<[GreenChild; 4]>; 8]> = SmallVec::new();
        for _ in 0..count {
            let Some(prev) = self.head.prev.clone() else {
                break;
            };
            groups.push(self.head.children.clone());
            self.head = prev;
        }
        groups.reverse();
        groups
    }

    /// Pop `count` entries, returning their children flattened in source
    /// order.
    pub fn pop(&mut self, count: usize) -> Vec<GreenChild> {
        let mut out = Vec::new();
        for group in self.pop_groups(count) {
            out.extend(group);
        }
        out
    }

    /// Append elements to the top entry without changing state. Used to
    /// attach skipped error tokens.
    pub fn append_to_top(&mut self, extra: impl IntoIterator<Item = GreenChild>) {
        let mut children = self.head.children.clone();
        children.extend(extra);
        let state = self.head.state;
        let prev = self.head.prev.clone();
        self.head = Link::new(state, children, prev);
    }

    /// Bottom-to-top state sequence, used as a merge key for heads at the
    /// same input position.
    #[must_use]
    pub fn state_signature(&self) -> SmallVec<[u32; 16]> {
        let mut states: SmallVec<[u32; 16]> = SmallVec::new();
        let mut current = Some(&self.head);
        while let Some(link) = current {
            states.push(link.state);
            current = link.prev.as_ref();
        }
        states.reverse();
        states
    }

    /// Whether two stacks share their entire chain.
    #[must_use]
    pub fn is_identical(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.head, &other.head)
    }

    /// Every element currently on the stack, in source order. Used when a
    /// parse must be forced to completion.
    #[must_use]
    pub fn flatten(&self) -> Vec<GreenChild> {
        let mut groups: Vec<&SmallVec<[GreenChild; 4]>> = Vec::new();
        let mut current = Some(&self.head);
        while let Some(link) = current {
            groups.push(&link.children);
            current = link.prev.as_ref();
        }
        let mut out = Vec::new();
        for group in groups.into_iter().rev() {
            out.extend(group.iter().cloned());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{GreenElement, GreenToken, Kind, NodeFlags};

    fn leaf(text: &str) -> GreenChild {
        GreenChild::new(GreenElement::Token(GreenToken::new(
            Kind::new(1),
            NodeFlags::empty(),
            text,
        )))
    }

    fn children(texts: &[&str]) -> SmallVec<[GreenChild; 4]> {
        texts.iter().map(|t| leaf(t)).collect()
    }

    fn texts(popped: &[GreenChild]) -> Vec<String> {
        popped
            .iter()
            .map(|c| c.element.as_token().unwrap().text().to_string())
            .collect()
    }

    #[test]
    fn pop_preserves_source_order() {
        let mut stack = ParseStack::new(0);
        stack.push(1, children(&["a"]));
        stack.push(2, children(&[" ", "+"]));
        stack.push(3, children(&["b"]));

        let popped = stack.pop(3);
        assert_eq!(texts(&popped), vec!["a", " ", "+", "b"]);
        assert_eq!(stack.state(), 0);
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn fork_shares_prefix() {
        let mut stack = ParseStack::new(0);
        stack.push(1, children(&["x"]));

        let mut fork = stack.clone();
        assert!(stack.is_identical(&fork));

        fork.push(2, children(&["y"]));
        assert!(!stack.is_identical(&fork));
        assert_eq!(stack.state(), 1);
        assert_eq!(fork.state(), 2);
        assert_eq!(fork.state_signature().as_slice(), &[0, 1, 2]);
    }

    #[test]
    fn append_to_top_keeps_state() {
        let mut stack = ParseStack::new(0);
        stack.push(4, children(&["a"]));
        stack.append_to_top([leaf("@")]);
        assert_eq!(stack.state(), 4);
        let popped = stack.pop(1);
        assert_eq!(texts(&popped), vec!["a", "@"]);
    }

    #[test]
    fn flatten_collects_everything() {
        let mut stack = ParseStack::new(0);
        stack.push(1, children(&["a"]));
        stack.push(2, children(&["b", "c"]));
        assert_eq!(texts(&stack.flatten()), vec!["a", "b", "c"]);
    }
}
