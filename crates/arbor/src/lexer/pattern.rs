use compact_str::CompactString;
use smallvec::SmallVec;

/// A terminal's matcher, interpreted directly against the source text.
///
/// Patterns are built by grammar compilation from literals and from `token`
/// rule bodies. Matching is greedy and does not backtrack; `Choice` takes the
/// longest-matching branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Exact string.
    Literal(CompactString),
    /// A single character drawn from a character set.
    Class(CharSet),
    /// Any single character.
    AnyChar,
    /// All parts in order.
    Seq(Vec<Pattern>),
    /// Longest-matching branch.
    Choice(Vec<Pattern>),
    /// `min` or more repetitions, up to `max` when bounded.
    Repeat {
        pattern: Box<Pattern>,
        min: u32,
        max: Option<u32>,
    },
    Optional(Box<Pattern>),
    /// Consume forward up to (not including) the next unescaped occurrence of
    /// `stop`, or to the end of input. Used for string and comment bodies.
    /// The escape character must be ASCII.
    Until {
        stop: CompactString,
        escape: Option<char>,
    },
}

impl Pattern {
    #[must_use]
    pub fn lit(text: &str) -> Self {
        Self::Literal(CompactString::new(text))
    }

    #[must_use]
    pub const fn class(set: CharSet) -> Self {
        Self::Class(set)
    }

    #[must_use]
    pub fn seq(parts: impl IntoIterator<Item = Pattern>) -> Self {
        Self::Seq(parts.into_iter().collect())
    }

    #[must_use]
    pub fn choice(branches: impl IntoIterator<Item = Pattern>) -> Self {
        Self::Choice(branches.into_iter().collect())
    }

    #[must_use]
    pub fn repeat(pattern: Pattern) -> Self {
        Self::Repeat {
            pattern: Box::new(pattern),
            min: 0,
            max: None,
        }
    }

    #[must_use]
    pub fn repeat1(pattern: Pattern) -> Self {
        Self::Repeat {
            pattern: Box::new(pattern),
            min: 1,
            max: None,
        }
    }

    #[must_use]
    pub fn optional(pattern: Pattern) -> Self {
        Self::Optional(Box::new(pattern))
    }

    #[must_use]
    pub fn until(stop: &str, escape: Option<char>) -> Self {
        debug_assert!(escape.is_none_or(|c| c.is_ascii()));
        Self::Until {
            stop: CompactString::new(stop),
            escape,
        }
    }

    /// Match this pattern at byte offset `start`, returning the matched byte
    /// length. A `Some(0)` result is a legitimate empty match.
    #[must_use]
    pub fn match_at(&self, text: &str, start: usize) -> Option<usize> {
        match self {
            Self::Literal(lit) => text[start..].starts_with(lit.as_str()).then(|| lit.len()),
            Self::Class(set) => {
                let c = text[start..].chars().next()?;
                set.contains(c).then(|| c.len_utf8())
            }
            Self::AnyChar => text[start..].chars().next().map(char::len_utf8),
            Self::Seq(parts) => {
                let mut len = 0;
                for part in parts {
                    len += part.match_at(text, start + len)?;
                }
                Some(len)
            }
            Self::Choice(branches) => branches
                .iter()
                .filter_map(|branch| branch.match_at(text, start))
                .max(),
            Self::Repeat { pattern, min, max } => {
                let mut len = 0;
                let mut count = 0u32;
                while max.is_none_or(|m| count < m) {
                    match pattern.match_at(text, start + len) {
                        Some(0) | None => break,
                        Some(step) => {
                            len += step;
                            count += 1;
                        }
                    }
                }
                (count >= *min).then_some(len)
            }
            Self::Optional(pattern) => Some(pattern.match_at(text, start).unwrap_or(0)),
            Self::Until { stop, escape } => {
                Some(scan_until(&text.as_bytes()[start..], stop.as_bytes(), *escape))
            }
        }
    }
}

/// Byte offset of the next unescaped `stop` in `haystack`, or the haystack
/// length when absent.
fn scan_until(haystack: &[u8], stop: &[u8], escape: Option<char>) -> usize {
    let Some(escape) = escape else {
        return memchr::memmem::find(haystack, stop).unwrap_or(haystack.len());
    };
    let escape = escape as u8;
    for candidate in memchr::memmem::find_iter(haystack, stop) {
        let escapes = haystack[..candidate]
            .iter()
            .rev()
            .take_while(|&&b| b == escape)
            .count();
        if escapes % 2 == 0 {
            return candidate;
        }
    }
    haystack.len()
}

/// A set of character ranges, optionally negated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharSet {
    ranges: SmallVec<[(char, char); 4]>,
    negated: bool,
}

impl CharSet {
    #[must_use]
    pub fn ranges(ranges: impl IntoIterator<Item = (char, char)>) -> Self {
        Self {
            ranges: ranges.into_iter().collect(),
            negated: false,
        }
    }

    /// Set containing exactly the listed characters.
    #[must_use]
    pub fn of(chars: &str) -> Self {
        Self::ranges(chars.chars().map(|c| (c, c)))
    }

    #[must_use]
    pub fn digits() -> Self {
        Self::ranges([('0', '9')])
    }

    #[must_use]
    pub fn hex_digits() -> Self {
        Self::ranges([('0', '9'), ('a', 'f'), ('A', 'F')])
    }

    #[must_use]
    pub fn whitespace() -> Self {
        Self::of(" \t\r\n\u{0c}")
    }

    #[must_use]
    pub fn letters() -> Self {
        Self::ranges([('a', 'z'), ('A', 'Z')])
    }

    #[must_use]
    pub fn word_start() -> Self {
        Self::ranges([('a', 'z'), ('A', 'Z'), ('_', '_'), ('$', '$')])
    }

    #[must_use]
    pub fn word_continue() -> Self {
        Self::ranges([('a', 'z'), ('A', 'Z'), ('0', '9'), ('_', '_'), ('$', '$')])
    }

    /// Invert the set.
    #[must_use]
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    #[must_use]
    pub fn union(mut self, other: &Self) -> Self {
        debug_assert_eq!(self.negated, other.negated);
        self.ranges.extend_from_slice(&other.ranges);
        self
    }

    #[must_use]
    pub fn contains(&self, c: char) -> bool {
        let in_ranges = self.ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi);
        in_ranges != self.negated
    }
}
