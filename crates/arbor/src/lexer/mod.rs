//! State-driven tokenizer.
//!
//! There is no fixed token stream: at each step the parser hands the lexer
//! the set of terminals valid in its current automaton state, and the lexer
//! matches only those (plus the grammar's trivia terminals). The same source
//! bytes can lex differently in different states, which is what lets one
//! grammar give `<` both operator and type-argument readings.
//!
//! Disambiguation at one position: longest match wins; among equal-length
//! matches the terminal listed earlier in the state's order wins, and states
//! order literal terminals before pattern terminals so keywords beat the
//! identifier pattern.

pub mod pattern;

pub use pattern::{CharSet, Pattern};

use crate::compile::SymbolId;
use crate::syntax::{TextRange, TextSize};
use smallvec::SmallVec;

/// A single matched terminal occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lexeme {
    pub terminal: SymbolId,
    pub range: TextRange,
}

/// Result of one lexing step: leading trivia followed by at most one token.
/// `token` is `None` at end of input or when nothing valid matches.
#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub trivia: SmallVec<[Lexeme; 2]>,
    pub token: Option<Lexeme>,
}

/// Compiled terminal matchers, indexed by terminal symbol id.
#[derive(Debug)]
pub struct Lexer {
    patterns: Vec<Pattern>,
    /// Terminals produced by `extras` rules, matched between real tokens in
    /// every state.
    extras: Vec<SymbolId>,
    /// The `word` rule's pattern, when declared. A keyword literal may not
    /// match a proper prefix of a word: `if` must not be split off `ifx`.
    word: Option<Pattern>,
    /// Per-terminal flag: literal fully matched by the word pattern.
    keyword: Vec<bool>,
}

impl Lexer {
    #[must_use]
    pub fn new(
        patterns: Vec<Pattern>,
        extras: Vec<SymbolId>,
        word: Option<Pattern>,
        keyword: Vec<bool>,
    ) -> Self {
        debug_assert_eq!(patterns.len(), keyword.len());
        Self {
            patterns,
            extras,
            word,
            keyword,
        }
    }

    #[must_use]
    pub fn pattern(&self, terminal: SymbolId) -> &Pattern {
        &self.patterns[terminal.index()]
    }

    /// Lex one token at `pos`, trying only the `valid` terminals after
    /// consuming any leading trivia.
    #[must_use]
    pub fn next(&self, source: &str, pos: TextSize, valid: &[SymbolId]) -> Lexed {
        let mut out = Lexed::default();
        let mut at = u32::from(pos) as usize;

        loop {
            let Some(lexeme) = self.match_extras(source, at) else {
                break;
            };
            at = u32::from(lexeme.range.end()) as usize;
            out.trivia.push(lexeme);
        }

        out.token = self.match_valid(source, at, valid);
        out
    }

    /// Longest trivia match at `at`, if any extra matches non-emptily.
    fn match_extras(&self, source: &str, at: usize) -> Option<Lexeme> {
        let mut best: Option<(SymbolId, usize)> = None;
        for &extra in &self.extras {
            if let Some(len) = self.patterns[extra.index()].match_at(source, at) {
                if len > 0 && best.is_none_or(|(_, best_len)| len > best_len) {
                    best = Some((extra, len));
                }
            }
        }
        best.map(|(terminal, len)| lexeme(terminal, at, len))
    }

    fn match_valid(&self, source: &str, at: usize, valid: &[SymbolId]) -> Option<Lexeme> {
        let mut best: Option<(SymbolId, usize)> = None;
        for &terminal in valid {
            let Some(len) = self.patterns[terminal.index()].match_at(source, at) else {
                continue;
            };
            if len == 0 {
                continue;
            }
            if self.keyword[terminal.index()] && self.word_match_exceeds(source, at, len) {
                continue;
            }
            // Strict comparison keeps the earliest of equal-length matches.
            if best.is_none_or(|(_, best_len)| len > best_len) {
                best = Some((terminal, len));
            }
        }
        best.map(|(terminal, len)| lexeme(terminal, at, len))
    }

    fn word_match_exceeds(&self, source: &str, at: usize, len: usize) -> bool {
        self.word
            .as_ref()
            .and_then(|word| word.match_at(source, at))
            .is_some_and(|word_len| word_len > len)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn lexeme(terminal: SymbolId, at: usize, len: usize) -> Lexeme {
    Lexeme {
        terminal,
        range: TextRange::at(TextSize::from(at as u32), TextSize::from(len as u32)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KW_IF: SymbolId = SymbolId::new(0);
    const IDENT: SymbolId = SymbolId::new(1);
    const NUMBER: SymbolId = SymbolId::new(2);
    const LT: SymbolId = SymbolId::new(3);
    const SHIFT_LEFT: SymbolId = SymbolId::new(4);
    const WHITESPACE: SymbolId = SymbolId::new(5);
    const COMMENT: SymbolId = SymbolId::new(6);

    fn ident_pattern() -> Pattern {
        Pattern::seq([
            Pattern::class(CharSet::word_start()),
            Pattern::repeat(Pattern::class(CharSet::word_continue())),
        ])
    }

    fn test_lexer() -> Lexer {
        let patterns = vec![
            Pattern::lit("if"),
            ident_pattern(),
            Pattern::repeat1(Pattern::class(CharSet::digits())),
            Pattern::lit("<"),
            Pattern::lit("<<"),
            Pattern::repeat1(Pattern::class(CharSet::whitespace())),
            Pattern::seq([Pattern::lit("//"), Pattern::until("\n", None)]),
        ];
        let keyword = vec![true, false, false, false, false, false, false];
        Lexer::new(
            patterns,
            vec![WHITESPACE, COMMENT],
            Some(ident_pattern()),
            keyword,
        )
    }

    fn lex(lexer: &Lexer, source: &str, at: u32, valid: &[SymbolId]) -> Lexed {
        lexer.next(source, TextSize::from(at), valid)
    }

    #[test]
    fn skips_trivia_then_matches() {
        let lexer = test_lexer();
        let out = lex(&lexer, "  // note\n  42", 0, &[NUMBER]);
        assert_eq!(out.trivia.len(), 3);
        let token = out.token.unwrap();
        assert_eq!(token.terminal, NUMBER);
        assert_eq!(token.range, TextRange::at(TextSize::from(12), TextSize::from(2)));
    }

    #[test]
    fn keyword_beats_identifier_on_tie() {
        let lexer = test_lexer();
        let out = lex(&lexer, "if", 0, &[KW_IF, IDENT]);
        assert_eq!(out.token.unwrap().terminal, KW_IF);
    }

    #[test]
    fn longer_identifier_beats_keyword_prefix() {
        let lexer = test_lexer();
        let out = lex(&lexer, "ifx", 0, &[KW_IF, IDENT]);
        let token = out.token.unwrap();
        assert_eq!(token.terminal, IDENT);
        assert_eq!(u32::from(token.range.len()), 3);
    }

    #[test]
    fn keyword_never_splits_a_word() {
        let lexer = test_lexer();
        // Only the keyword is valid; it still must not take a prefix of `ifx`.
        let out = lex(&lexer, "ifx", 0, &[KW_IF]);
        assert!(out.token.is_none());
    }

    #[test]
    fn validity_depends_on_state() {
        let lexer = test_lexer();
        let shifted = lex(&lexer, "<<", 0, &[LT, SHIFT_LEFT]);
        assert_eq!(shifted.token.unwrap().terminal, SHIFT_LEFT);

        // A state that only expects `<` reads the same bytes differently.
        let lt_only = lex(&lexer, "<<", 0, &[LT]);
        let token = lt_only.token.unwrap();
        assert_eq!(token.terminal, LT);
        assert_eq!(u32::from(token.range.len()), 1);
    }

    #[test]
    fn eof_and_no_match() {
        let lexer = test_lexer();
        let eof = lex(&lexer, "  ", 0, &[NUMBER]);
        assert_eq!(eof.trivia.len(), 1);
        assert!(eof.token.is_none());

        let garbage = lex(&lexer, "@", 0, &[NUMBER, IDENT]);
        assert!(garbage.token.is_none());
    }
}
