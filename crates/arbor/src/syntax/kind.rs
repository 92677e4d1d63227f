use std::fmt;

/// Identifier of a node or token kind within a compiled language.
///
/// Kinds are indices into the language's symbol table; the grammar rule or
/// terminal they stand for is resolved through
/// [`Language::kind_name`](crate::compile::Language::kind_name). Two reserved
/// kinds exist for recovery-produced nodes: [`Kind::ERROR`] and
/// [`Kind::MISSING`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Kind(u16);

impl Kind {
    /// Kind of nodes wrapping unparsable input.
    pub const ERROR: Self = Self(u16::MAX);
    /// Kind of zero-width leaves inserted for absent required tokens.
    pub const MISSING: Self = Self(u16::MAX - 1);

    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn is_error(self) -> bool {
        self.0 == Self::ERROR.0
    }

    #[must_use]
    pub const fn is_missing(self) -> bool {
        self.0 == Self::MISSING.0
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a field label within a compiled language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(u16);

impl FieldId {
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

/// Per-node flag bits carried on green elements.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeFlags(u8);

impl NodeFlags {
    /// The element corresponds to a named grammar rule (not an anonymous
    /// literal token).
    pub const NAMED: Self = Self(1);
    /// Zero-width leaf inserted by error recovery.
    pub const MISSING: Self = Self(1 << 1);
    /// Node or leaf covering unparsable input.
    pub const ERROR: Self = Self(1 << 2);
    /// Some descendant is an error or missing element.
    pub const HAS_ERROR: Self = Self(1 << 3);
    /// Trivia leaf produced by an `extras` rule.
    pub const TRIVIA: Self = Self(1 << 4);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for NodeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for NodeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for NodeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        for (bit, name) in [
            (Self::NAMED, "NAMED"),
            (Self::MISSING, "MISSING"),
            (Self::ERROR, "ERROR"),
            (Self::HAS_ERROR, "HAS_ERROR"),
            (Self::TRIVIA, "TRIVIA"),
        ] {
            if self.contains(bit) {
                names.push(name);
            }
        }
        write!(f, "NodeFlags({})", names.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_kinds() {
        assert!(Kind::ERROR.is_error());
        assert!(Kind::MISSING.is_missing());
        assert!(!Kind::new(0).is_error());
    }

    #[test]
    fn flag_bits() {
        let flags = NodeFlags::NAMED | NodeFlags::HAS_ERROR;
        assert!(flags.contains(NodeFlags::NAMED));
        assert!(flags.contains(NodeFlags::HAS_ERROR));
        assert!(!flags.contains(NodeFlags::MISSING));
    }
}
