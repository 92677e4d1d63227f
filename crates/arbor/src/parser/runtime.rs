//! The GLR parse driver.
//!
//! Parsing advances a set of heads over the input. Each head owns a
//! shared-prefix stack and its own position; at every step the head lexes
//! with the terminals its state can consume, applies reduces until a shift
//! is possible, and shifts. Forked table entries clone the head per action;
//! heads that land on the same position with the same state stack merge,
//! keeping the one with the higher dynamic-precedence score. Lower summed
//! production index breaks remaining ties, so ranking is deterministic.

use crate::compile::{Action, Language, SymbolId};
use crate::error::{Diagnostic, ParseError};
use crate::incremental::ReuseCursor;
use crate::lexer::Lexeme;
use crate::parser::recovery::{self, RecoverOutcome};
use crate::parser::stack::ParseStack;
use crate::parser::tree::SyntaxTree;
use crate::syntax::{GreenChild, GreenElement, GreenNode, GreenToken, NodeFlags, TextSize};
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::sync::Arc;

/// Upper bound on simultaneously live heads. Lowest-ranked heads are dropped
/// beyond it.
const DEFAULT_MAX_HEADS: usize = 16;

/// A reusable parser for one compiled language.
#[derive(Debug, Clone)]
pub struct Parser {
    language: Arc<Language>,
    max_heads: usize,
    operation_budget: Option<u64>,
}

/// A completed parse: the tree plus everything recovery had to do to
/// produce it.
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub tree: SyntaxTree,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub(crate) struct Head {
    pub(crate) stack: ParseStack,
    pub(crate) pos: TextSize,
    pub(crate) score: i64,
    pub(crate) tiebreak: u64,
    /// Trivia lexed but not yet attached to a shifted entry.
    pub(crate) pending: SmallVec<[GreenChild; 2]>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) missing_count: u32,
}

impl Head {
    fn initial() -> Self {
        Self {
            stack: ParseStack::new(0),
            pos: TextSize::zero(),
            score: 0,
            tiebreak: 0,
            pending: SmallVec::new(),
            diagnostics: Vec::new(),
            missing_count: 0,
        }
    }
}

#[derive(Debug)]
struct Finished {
    root: Arc<GreenNode>,
    score: i64,
    tiebreak: u64,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    #[must_use]
    pub fn new(language: Arc<Language>) -> Self {
        Self {
            language,
            max_heads: DEFAULT_MAX_HEADS,
            operation_budget: None,
        }
    }

    /// Cap the number of concurrently explored parse paths.
    #[must_use]
    pub fn with_max_heads(mut self, max_heads: usize) -> Self {
        self.max_heads = max_heads.max(1);
        self
    }

    /// Abort with [`ParseError::Cancelled`] once this many parse operations
    /// have run. No tree is produced on cancellation.
    #[must_use]
    pub fn with_operation_budget(mut self, budget: u64) -> Self {
        self.operation_budget = Some(budget);
        self
    }

    #[must_use]
    pub const fn language(&self) -> &Arc<Language> {
        &self.language
    }

    /// Parse `source` from scratch.
    ///
    /// # Errors
    ///
    /// Only cancellation fails; malformed input yields a tree plus
    /// diagnostics.
    pub fn parse(&self, source: &str) -> Result<ParseOutput, ParseError> {
        self.parse_with_reuse(source, None)
    }

    pub(crate) fn parse_with_reuse(
        &self,
        source: &str,
        reuse: Option<&ReuseCursor>,
    ) -> Result<ParseOutput, ParseError> {
        let mut heads = vec![Head::initial()];
        let mut finished: Vec<Finished> = Vec::new();
        let mut operations = 0u64;

        while !heads.is_empty() {
            let mut shifted: Vec<Head> = Vec::new();
            for head in heads.drain(..) {
                self.advance(head, source, reuse, &mut shifted, &mut finished, &mut operations)?;
            }
            heads = self.merge_heads(shifted);
            if heads.len() > self.max_heads {
                heads.sort_unstable_by(|a, b| {
                    b.score.cmp(&a.score).then(a.tiebreak.cmp(&b.tiebreak))
                });
                heads.truncate(self.max_heads);
            }
        }

        let best = finished
            .into_iter()
            .min_by(|a, b| {
                b.score
                    .cmp(&a.score)
                    .then(a.diagnostics.len().cmp(&b.diagnostics.len()))
                    .then(a.tiebreak.cmp(&b.tiebreak))
            })
            .map(|f| ParseOutput {
                tree: SyntaxTree::new(Arc::clone(&self.language), f.root),
                diagnostics: f.diagnostics,
            });

        // Recovery always drives at least one head to completion.
        best.ok_or(ParseError::Cancelled {
            operations: usize::try_from(operations).unwrap_or(usize::MAX),
        })
    }

    /// Run one head until it shifts, finishes, or dies, collecting any forks
    /// it spawns along the way.
    fn advance(
        &self,
        head: Head,
        source: &str,
        reuse: Option<&ReuseCursor>,
        shifted: &mut Vec<Head>,
        finished: &mut Vec<Finished>,
        operations: &mut u64,
    ) -> Result<(), ParseError> {
        let language = &self.language;
        let mut work = vec![head];

        while let Some(mut head) = work.pop() {
            *operations += 1;
            if self
                .operation_budget
                .is_some_and(|budget| *operations > budget)
            {
                return Err(ParseError::Cancelled {
                    operations: usize::try_from(*operations).unwrap_or(usize::MAX),
                });
            }

            let state = head.stack.state();

            if let Some(cursor) = reuse {
                // Old nodes carry their leading trivia, so the candidate
                // position is before any trivia already buffered on the head.
                let pending_len = head
                    .pending
                    .iter()
                    .fold(TextSize::zero(), |len, child| {
                        len + child.element.text_len()
                    });
                let reuse_start = head.pos.checked_sub(pending_len).unwrap_or(head.pos);
                if let Some(node) = cursor.candidate(reuse_start, state, language) {
                    let goto = language
                        .state(state)
                        .gotos
                        .get(&SymbolId::new(node.kind().raw()))
                        .copied();
                    if let Some(target) = goto {
                        // The reused subtree covers the buffered trivia bytes.
                        head.pending.clear();
                        head.pos = reuse_start + node.text_len();
                        let children: SmallVec<[GreenChild; 4]> =
                            SmallVec::from_iter([GreenChild::new(GreenElement::Node(node))]);
                        head.stack.push(target, children);
                        work.push(head);
                        continue;
                    }
                }
            }

            let lexed = language
                .lexer()
                .next(source, head.pos, &language.state(state).terminals);
            for lexeme in &lexed.trivia {
                head.pending.push(self.trivia_child(source, lexeme));
                head.pos = lexeme.range.end();
            }

            let at_end = u32::from(head.pos) as usize == source.len();
            let terminal = match lexed.token {
                Some(lexeme) => Some(lexeme),
                None if at_end => None,
                None => {
                    // Unlexable input: recovery consumes it.
                    match recovery::recover(&mut head, language, source, None) {
                        RecoverOutcome::Continue => work.push(head),
                        RecoverOutcome::Finished(root) => finished.push(finish(head, root)),
                    }
                    continue;
                }
            };

            let lookup = terminal.map_or(language.eof(), |l| l.terminal);
            let actions = language.state(state).actions.get(&lookup).cloned();
            let Some(actions) = actions else {
                match recovery::recover(&mut head, language, source, terminal) {
                    RecoverOutcome::Continue => work.push(head),
                    RecoverOutcome::Finished(root) => finished.push(finish(head, root)),
                }
                continue;
            };

            for action in actions.iter().skip(1) {
                let fork = head.clone();
                self.apply(fork, *action, terminal, source, &mut work, shifted, finished);
            }
            self.apply(head, actions[0], terminal, source, &mut work, shifted, finished);
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn apply(
        &self,
        mut head: Head,
        action: Action,
        token: Option<Lexeme>,
        source: &str,
        work: &mut Vec<Head>,
        shifted: &mut Vec<Head>,
        finished: &mut Vec<Finished>,
    ) {
        let language = &self.language;
        match action {
            Action::Shift(target) => {
                let Some(lexeme) = token else {
                    return;
                };
                let info = language.symbol(lexeme.terminal);
                let flags = if info.named {
                    NodeFlags::NAMED
                } else {
                    NodeFlags::empty()
                };
                let leaf = GreenToken::new(
                    language.kind_of(lexeme.terminal),
                    flags,
                    range_text(source, lexeme.range),
                );
                let mut children: SmallVec<[GreenChild; 4]> = head.pending.drain(..).collect();
                children.push(GreenChild::new(GreenElement::Token(leaf)));
                head.stack.push(target, children);
                head.pos = lexeme.range.end();
                shifted.push(head);
            }
            Action::Reduce(production) => {
                if self.reduce(&mut head, production) {
                    work.push(head);
                }
            }
            Action::Accept => finished.push(self.accept(head)),
        }
    }

    /// Pop one entry per production step, assemble the node, and push it on
    /// the goto state. Fields and aliases come from the production steps;
    /// transparent children are spliced in place.
    pub(crate) fn reduce(&self, head: &mut Head, production: u32) -> bool {
        let language = &self.language;
        let prod = language.production(production);
        let groups = head.stack.pop_groups(prod.steps.len());

        let mut children: SmallVec<[GreenChild; 4]> = SmallVec::new();
        for (group, step) in groups.into_iter().zip(prod.steps.iter()) {
            // The entry holds leading trivia, the shifted element, and any
            // error leaves recovery attached after it.
            let Some(at) = group.iter().rposition(|child| {
                let flags = child.element.flags();
                !flags.contains(NodeFlags::TRIVIA) && !flags.contains(NodeFlags::ERROR)
            }) else {
                children.extend(group);
                continue;
            };
            children.extend(group.iter().take(at).cloned());
            let mut child = group[at].clone();
            if let Some(alias) = step.alias {
                child.element = realias(language, &child.element, alias);
            }
            let transparent = match &child.element {
                GreenElement::Node(node) => {
                    !node.kind().is_error()
                        && step.alias.is_none()
                        && language.symbol(SymbolId::new(node.kind().raw())).transparent
                }
                GreenElement::Token(_) => false,
            };
            if transparent {
                if let GreenElement::Node(node) = &child.element {
                    // A field on a hidden reference lands on the children
                    // that take its place.
                    for spliced in node.children() {
                        let mut spliced = spliced.clone();
                        if spliced.field.is_none()
                            && !spliced.element.flags().contains(NodeFlags::TRIVIA)
                        {
                            spliced.field = step.field;
                        }
                        children.push(spliced);
                    }
                }
            } else {
                child.field = step.field;
                children.push(child);
            }
            children.extend(group.iter().skip(at + 1).cloned());
        }

        let base = head.stack.state();
        let info = language.symbol(prod.lhs);
        let flags = if info.named {
            NodeFlags::NAMED
        } else {
            NodeFlags::empty()
        };
        let node = GreenNode::new(language.kind_of(prod.lhs), base, flags, children);
        let Some(&target) = language.state(base).gotos.get(&prod.lhs) else {
            return false;
        };
        head.stack
            .push(target, SmallVec::from_iter([GreenChild::new(node.into())]));
        head.score += i64::from(prod.dynamic);
        head.tiebreak += u64::from(production);
        true
    }

    fn accept(&self, mut head: Head) -> Finished {
        let leftover = {
            let groups = head.stack.pop_groups(1);
            let mut before = head.stack.flatten();
            let group = groups.into_iter().next().unwrap_or_default();
            before.extend(group);
            before
        };

        // The last element is the start rule's node; everything else is
        // trivia or recovered error text that must stay in the tree.
        let root = rebuild_root(&leftover, std::mem::take(&mut head.pending));
        finish(head, root)
    }

    fn trivia_child(&self, source: &str, lexeme: &Lexeme) -> GreenChild {
        let info = self.language.symbol(lexeme.terminal);
        let mut flags = NodeFlags::TRIVIA;
        if info.named {
            flags |= NodeFlags::NAMED;
        }
        GreenChild::new(GreenElement::Token(GreenToken::new(
            self.language.kind_of(lexeme.terminal),
            flags,
            range_text(source, lexeme.range),
        )))
    }

    fn merge_heads(&self, shifted: Vec<Head>) -> Vec<Head> {
        let mut best: HashMap<(u32, SmallVec<[u32; 16]>), Head, ahash::RandomState> =
            HashMap::default();
        for head in shifted {
            let key = (u32::from(head.pos), head.stack.state_signature());
            match best.get(&key) {
                Some(existing)
                    if (existing.score, std::cmp::Reverse(existing.tiebreak))
                        >= (head.score, std::cmp::Reverse(head.tiebreak)) => {}
                _ => {
                    best.insert(key, head);
                }
            }
        }
        best.into_values().collect()
    }
}

/// Rebuild the accepted root so that leading leftovers and trailing trivia
/// end up inside it, keeping exact text coverage.
fn rebuild_root(leftover: &[GreenChild], pending: SmallVec<[GreenChild; 2]>) -> Arc<GreenNode> {
    let (root_child, before) = match leftover.split_last() {
        Some((last, before)) => (Some(last), before),
        None => (None, leftover),
    };

    match root_child.map(|c| &c.element) {
        Some(GreenElement::Node(node)) if before.is_empty() && pending.is_empty() => {
            Arc::clone(node)
        }
        Some(GreenElement::Node(node)) => {
            let mut children: Vec<GreenChild> = before.to_vec();
            children.extend(node.children().iter().cloned());
            children.extend(pending);
            GreenNode::new(node.kind(), node.parse_state(), node.flags(), children)
        }
        // Start rule collapsed to a single token, or nothing at all.
        _ => {
            let mut children: Vec<GreenChild> = leftover.to_vec();
            children.extend(pending);
            GreenNode::new(crate::syntax::Kind::ERROR, 0, NodeFlags::ERROR, children)
        }
    }
}

fn finish(head: Head, root: Arc<GreenNode>) -> Finished {
    Finished {
        root,
        score: head.score,
        tiebreak: head.tiebreak,
        diagnostics: head.diagnostics,
    }
}

fn realias(language: &Language, element: &GreenElement, alias: SymbolId) -> GreenElement {
    let info = language.symbol(alias);
    let named = if info.named {
        NodeFlags::NAMED
    } else {
        NodeFlags::empty()
    };
    match element {
        GreenElement::Token(token) => {
            let flags = named.union(if token.is_missing() {
                NodeFlags::MISSING
            } else {
                NodeFlags::empty()
            });
            GreenElement::Token(GreenToken::new(
                language.kind_of(alias),
                flags,
                token.text(),
            ))
        }
        GreenElement::Node(node) => GreenElement::Node(GreenNode::new(
            language.kind_of(alias),
            node.parse_state(),
            named,
            node.children().iter().cloned(),
        )),
    }
}

pub(crate) fn range_text(source: &str, range: crate::syntax::TextRange) -> &str {
    &source[u32::from(range.start()) as usize..u32::from(range.end()) as usize]
}
