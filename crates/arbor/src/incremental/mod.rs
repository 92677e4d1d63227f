//! Incremental reparsing.
//!
//! Green subtrees carry only lengths and the automaton state they were built
//! under, so a subtree from a previous parse can be spliced into a new parse
//! unchanged when three things hold: the new parse has reached the same
//! automaton state, the subtree lies entirely outside every edited span, and
//! the subtree is error free. The [`ReuseCursor`] answers that query for the
//! runtime; [`IncrementalParser`] wraps it together with a whole-source
//! result cache.

use crate::error::ParseError;
use crate::parser::runtime::{ParseOutput, Parser};
use crate::parser::tree::SyntaxTree;
use crate::compile::{Language, SymbolId};
use crate::syntax::{GreenElement, GreenNode, TextEdit, TextSize};
use lru::LruCache;
use std::hash::{BuildHasher, Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Extra bytes around every edit treated as damaged. A token adjacent to an
/// edit can lex differently even when its own bytes are untouched.
const DAMAGE_MARGIN: u32 = 1;

const DEFAULT_CACHE_CAPACITY: usize = 8;

/// Read-only view of a previous parse, queried by the runtime for reusable
/// subtrees. Edits must be expressed against the old text, sorted by start
/// and non-overlapping.
#[derive(Debug)]
pub struct ReuseCursor {
    root: Arc<GreenNode>,
    edits: Vec<TextEdit>,
}

impl ReuseCursor {
    #[must_use]
    pub fn new(old_tree: &SyntaxTree, edits: &[TextEdit]) -> Self {
        let mut edits = edits.to_vec();
        edits.sort_unstable_by_key(|edit| edit.start);
        Self {
            root: Arc::clone(old_tree.green_root()),
            edits,
        }
    }

    /// The largest old subtree that starts at new-text position `pos`, was
    /// built under automaton state `state`, and survives the edits intact.
    pub(crate) fn candidate(
        &self,
        pos: TextSize,
        state: u32,
        language: &Language,
    ) -> Option<Arc<GreenNode>> {
        let old_pos = self.map_new_to_old(pos)?;

        let mut node = &self.root;
        let mut offset = TextSize::zero();
        loop {
            if offset == old_pos && self.reusable(node, offset, state, language) {
                return Some(Arc::clone(node));
            }
            let mut next = None;
            for child in node.children() {
                let end = offset + child.element.text_len();
                if u32::from(old_pos) < u32::from(end) {
                    if let GreenElement::Node(inner) = &child.element {
                        next = Some(inner);
                    }
                    break;
                }
                offset = end;
            }
            node = next?;
        }
    }

    fn reusable(
        &self,
        node: &Arc<GreenNode>,
        old_start: TextSize,
        state: u32,
        language: &Language,
    ) -> bool {
        if node.text_len() == TextSize::zero() || node.has_error() || node.is_error() {
            return false;
        }
        if node.parse_state() != state {
            return false;
        }
        // Only nonterminals can be pushed back via a goto edge.
        if language.is_terminal(SymbolId::new(node.kind().raw())) {
            return false;
        }
        let old_end = old_start + node.text_len();
        self.clear_of_damage(old_start, old_end)
    }

    /// Whether the old span stays at least [`DAMAGE_MARGIN`] bytes away from
    /// every edited span.
    fn clear_of_damage(&self, start: TextSize, end: TextSize) -> bool {
        let start = u32::from(start);
        let end = u32::from(end);
        self.edits.iter().all(|edit| {
            let damage_start = u32::from(edit.start).saturating_sub(DAMAGE_MARGIN);
            let damage_end = u32::from(edit.old_end) + DAMAGE_MARGIN;
            end <= damage_start || start >= damage_end
        })
    }

    /// Map a new-text offset back to the old text. Offsets inside or adjacent
    /// to an edited span have no usable image.
    fn map_new_to_old(&self, pos: TextSize) -> Option<TextSize> {
        let pos = u32::from(pos);
        let mut delta: i64 = 0;
        for edit in &self.edits {
            let new_start = i64::from(u32::from(edit.start)) + delta;
            let new_end = i64::from(u32::from(edit.new_end)) + delta;
            if i64::from(pos) < new_start.saturating_sub(i64::from(DAMAGE_MARGIN)) {
                break;
            }
            if i64::from(pos) < new_end + i64::from(DAMAGE_MARGIN) {
                return None;
            }
            delta += i64::from(u32::from(edit.new_end)) - i64::from(u32::from(edit.old_end));
        }
        let old = i64::from(pos) - delta;
        u32::try_from(old).ok().map(TextSize::from)
    }
}

/// A parser with an edit-aware reuse path and a small whole-source cache.
///
/// `parse_incremental` is always correct to call with any combination of old
/// tree and edits; reuse only changes how much work the parse does, never its
/// result.
#[derive(Debug)]
pub struct IncrementalParser {
    parser: Parser,
    cache: LruCache<u64, ParseOutput>,
    hasher: ahash::RandomState,
}

impl IncrementalParser {
    #[must_use]
    pub fn new(language: Arc<Language>) -> Self {
        Self::with_parser(Parser::new(language))
    }

    #[must_use]
    pub fn with_parser(parser: Parser) -> Self {
        let capacity = NonZeroUsize::new(DEFAULT_CACHE_CAPACITY)
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            parser,
            cache: LruCache::new(capacity),
            hasher: ahash::RandomState::new(),
        }
    }

    #[must_use]
    pub const fn parser(&self) -> &Parser {
        &self.parser
    }

    /// Parse from scratch, consulting and filling the whole-source cache.
    ///
    /// # Errors
    ///
    /// Fails only on cancellation, like [`Parser::parse`].
    pub fn parse(&mut self, source: &str) -> Result<ParseOutput, ParseError> {
        let key = self.source_key(source);
        if let Some(output) = self.cache.get(&key) {
            return Ok(output.clone());
        }
        let output = self.parser.parse(source)?;
        self.cache.put(key, output.clone());
        Ok(output)
    }

    /// Reparse an edited source, reusing unchanged subtrees of `old_tree`.
    ///
    /// # Errors
    ///
    /// Fails only on cancellation, like [`Parser::parse`].
    pub fn parse_incremental(
        &mut self,
        source: &str,
        old_tree: &SyntaxTree,
        edits: &[TextEdit],
    ) -> Result<ParseOutput, ParseError> {
        let key = self.source_key(source);
        if let Some(output) = self.cache.get(&key) {
            return Ok(output.clone());
        }
        let cursor = ReuseCursor::new(old_tree, edits);
        let output = self.parser.parse_with_reuse(source, Some(&cursor))?;
        self.cache.put(key, output.clone());
        Ok(output)
    }

    fn source_key(&self, source: &str) -> u64 {
        let mut hasher = self.hasher.build_hasher();
        source.hash(&mut hasher);
        hasher.finish()
    }
}
