//! Error recovery.
//!
//! Recovery keeps the parse moving when no table action applies. Three
//! strategies, tried in order:
//!
//! 1. Missing insertion: if fabricating one expected terminal as a zero-width
//!    leaf makes the offending token consumable, insert it and retry.
//! 2. Skip: wrap the offending token, or the shortest unlexable byte run, in
//!    an error leaf attached to the current stack entry.
//! 3. Force finish: when nothing else applies at end of input, or too many
//!    leaves have been fabricated, close the parse with an error root that
//!    still covers the full source.
//!
//! Every strategy records a [`Diagnostic`] on the head; none of them loses
//! source text.

use crate::compile::{Action, Language};
use crate::error::Diagnostic;
use crate::lexer::Lexeme;
use crate::parser::runtime::{range_text, Head};
use crate::syntax::{
    GreenChild, GreenElement, GreenNode, GreenToken, Kind, NodeFlags, TextRange, TextSize,
};
use smallvec::SmallVec;
use std::sync::Arc;

/// Fabricated-leaf cap per head. Beyond it the head stops inventing structure
/// and closes out instead.
const MAX_MISSING: u32 = 32;

#[derive(Debug)]
pub(crate) enum RecoverOutcome {
    /// The head changed state or position and should continue parsing.
    Continue,
    /// The head was driven to completion with an error root.
    Finished(Arc<GreenNode>),
}

/// Recover a head that has no action for `token` (`None` means the lexer
/// found nothing consumable at the head's position).
pub(crate) fn recover(
    head: &mut Head,
    language: &Language,
    source: &str,
    token: Option<Lexeme>,
) -> RecoverOutcome {
    if head.missing_count >= MAX_MISSING {
        return RecoverOutcome::Finished(force_finish(head));
    }

    match token {
        Some(lexeme) => {
            if try_insert_missing(head, language, Some(lexeme)) {
                RecoverOutcome::Continue
            } else {
                skip_token(head, language, source, lexeme);
                RecoverOutcome::Continue
            }
        }
        // Unlexable bytes are consumed before any insertion is considered.
        None if (u32::from(head.pos) as usize) < source.len() => {
            skip_garbage(head, language, source);
            RecoverOutcome::Continue
        }
        None => {
            if try_insert_missing(head, language, None) {
                RecoverOutcome::Continue
            } else {
                // End of input with nothing insertable.
                RecoverOutcome::Finished(force_finish(head))
            }
        }
    }
}

/// Try fabricating one expected terminal as a zero-width missing leaf. Only
/// accepted when the offending lookahead becomes consumable in the shifted
/// state, so a single bad token cannot trigger a cascade of inventions.
fn try_insert_missing(head: &mut Head, language: &Language, token: Option<Lexeme>) -> bool {
    let state = head.stack.state();
    let lookahead = token.map_or(language.eof(), |l| l.terminal);

    let mut candidates: Vec<_> = language
        .state(state)
        .actions
        .iter()
        .filter_map(|(&terminal, actions)| match actions.first() {
            Some(&Action::Shift(target)) if terminal != language.eof() => {
                Some((terminal, target))
            }
            _ => None,
        })
        .collect();
    // Deterministic across hash map iteration orders.
    candidates.sort_unstable_by_key(|&(terminal, _)| terminal);

    for (terminal, target) in candidates {
        if !language.state(target).actions.contains_key(&lookahead) {
            continue;
        }
        let leaf = GreenToken::missing(language.kind_of(terminal));
        let mut children: SmallVec<[GreenChild; 4]> = head.pending.drain(..).collect();
        children.push(GreenChild::new(GreenElement::Token(leaf)));
        head.stack.push(target, children);
        head.missing_count += 1;
        head.diagnostics.push(Diagnostic::missing(
            TextRange::empty(head.pos),
            vec![language.symbol(terminal).name.to_string()],
        ));
        return true;
    }
    false
}

/// Consume one lexed token the automaton cannot use, keeping its text in the
/// tree as an error leaf.
fn skip_token(head: &mut Head, language: &Language, source: &str, lexeme: Lexeme) {
    head.diagnostics.push(Diagnostic::unexpected(
        lexeme.range,
        language.expected_terminals(head.stack.state()),
    ));
    append_error_text(head, range_text(source, lexeme.range));
    head.pos = lexeme.range.end();
}

/// Consume the shortest byte run after which the lexer can make progress
/// again, keeping the skipped text as an error leaf.
fn skip_garbage(head: &mut Head, language: &Language, source: &str) {
    let start = head.pos;
    let valid = &language.state(head.stack.state()).terminals;
    let mut at = u32::from(start) as usize;

    loop {
        let Some(ch) = source[at..].chars().next() else {
            break;
        };
        at += ch.len_utf8();
        if at >= source.len() {
            break;
        }
        #[allow(clippy::cast_possible_truncation)]
        let lexed = language
            .lexer()
            .next(source, TextSize::from(at as u32), valid);
        if lexed.token.is_some() || !lexed.trivia.is_empty() {
            break;
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    let end = TextSize::from(at as u32);
    let range = TextRange::new(start, end);
    head.diagnostics.push(Diagnostic::unexpected(
        range,
        language.expected_terminals(head.stack.state()),
    ));
    append_error_text(head, range_text(source, range));
    head.pos = end;
}

fn append_error_text(head: &mut Head, text: &str) {
    let mut extra: Vec<GreenChild> = head.pending.drain(..).collect();
    extra.push(GreenChild::new(GreenElement::Token(GreenToken::new(
        Kind::ERROR,
        NodeFlags::ERROR,
        text,
    ))));
    head.stack.append_to_top(extra);
}

/// Close out a head that cannot reach an accept action. Everything parsed so
/// far, plus any pending trivia, lands under an error root so the tree still
/// reproduces the source exactly.
fn force_finish(head: &mut Head) -> Arc<GreenNode> {
    let mut children = head.stack.flatten();
    children.extend(head.pending.drain(..));
    GreenNode::new(Kind::ERROR, 0, NodeFlags::ERROR, children)
}
