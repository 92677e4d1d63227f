use crate::error::CompileError;
use crate::grammar::expr::RuleExpr;
use crate::grammar::validate;
use compact_str::CompactString;
use hashbrown::{HashMap, HashSet};
use lasso::{Rodeo, Spur};

/// A named rule. Rules whose names start with `_` are hidden: they match
/// normally but never produce a node of their own.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: Spur,
    pub body: RuleExpr,
    pub hidden: bool,
}

/// A validated grammar, ready for table compilation.
///
/// Rule order is preserved: the first rule is the start rule, and order
/// breaks ties wherever the compiler needs a deterministic choice.
#[derive(Debug)]
pub struct Grammar {
    name: CompactString,
    rules: Vec<Rule>,
    index: HashMap<Spur, usize, ahash::RandomState>,
    extras: Vec<RuleExpr>,
    word: Option<Spur>,
    supertypes: HashSet<Spur, ahash::RandomState>,
    inline: HashSet<Spur, ahash::RandomState>,
    conflicts: Vec<Vec<Spur>>,
    interner: Rodeo,
}

impl Grammar {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[must_use]
    pub fn rule(&self, name: Spur) -> Option<&Rule> {
        self.index.get(&name).map(|&i| &self.rules[i])
    }

    /// Look up a rule body by source name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&RuleExpr> {
        let key = self.interner.get(name)?;
        self.rule(key).map(|rule| &rule.body)
    }

    #[must_use]
    pub fn rule_name(&self, key: Spur) -> &str {
        self.interner.resolve(&key)
    }

    #[must_use]
    pub fn extras(&self) -> &[RuleExpr] {
        &self.extras
    }

    #[must_use]
    pub const fn word(&self) -> Option<Spur> {
        self.word
    }

    #[must_use]
    pub fn is_supertype(&self, name: Spur) -> bool {
        self.supertypes.contains(&name)
    }

    #[must_use]
    pub fn is_inline(&self, name: Spur) -> bool {
        self.inline.contains(&name)
    }

    /// Declared ambiguity sets: rule groups allowed to stay in conflict in
    /// the tables, resolved at parse time by forking.
    #[must_use]
    pub fn conflicts(&self) -> &[Vec<Spur>] {
        &self.conflicts
    }

    #[must_use]
    pub const fn interner(&self) -> &Rodeo {
        &self.interner
    }
}

/// Builder for [`Grammar`]. Declarations may come in any order; everything is
/// checked once at [`build`](GrammarBuilder::build).
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    name: CompactString,
    rules: Vec<(CompactString, RuleExpr)>,
    extras: Vec<RuleExpr>,
    word: Option<CompactString>,
    supertypes: Vec<CompactString>,
    inline: Vec<CompactString>,
    conflicts: Vec<Vec<CompactString>>,
}

impl GrammarBuilder {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Define a rule. The first rule defined is the start rule.
    #[must_use]
    pub fn rule(mut self, name: &str, body: RuleExpr) -> Self {
        self.rules.push((name.into(), body));
        self
    }

    /// Add a trivia rule, matched between any two tokens in every state.
    #[must_use]
    pub fn extra(mut self, expr: RuleExpr) -> Self {
        self.extras.push(expr);
        self
    }

    /// Name the keyword-bearing terminal rule. Literal terminals that this
    /// rule's pattern would also match become keywords and must not match a
    /// proper prefix of it.
    #[must_use]
    pub fn word(mut self, name: &str) -> Self {
        self.word = Some(name.into());
        self
    }

    /// Mark a rule as a supertype: its node is elided and its chosen
    /// alternative appears directly in its place.
    #[must_use]
    pub fn supertype(mut self, name: &str) -> Self {
        self.supertypes.push(name.into());
        self
    }

    /// Mark a rule for inline expansion at every use site.
    #[must_use]
    pub fn inline(mut self, name: &str) -> Self {
        self.inline.push(name.into());
        self
    }

    /// Declare a set of rules that are genuinely ambiguous with each other.
    /// Table conflicts between exactly these rules fork the parse instead of
    /// failing compilation.
    #[must_use]
    pub fn conflict<'a>(mut self, rules: impl IntoIterator<Item = &'a str>) -> Self {
        self.conflicts
            .push(rules.into_iter().map(CompactString::new).collect());
        self
    }

    /// Validate the declarations and produce a [`Grammar`].
    ///
    /// # Errors
    ///
    /// Returns the first [`CompileError`] found: duplicate or undefined rule
    /// names, invalid `extras` or `word` declarations, or a rule marked both
    /// `inline` and supertype.
    pub fn build(self) -> Result<Grammar, CompileError> {
        let mut interner = Rodeo::default();
        let mut rules = Vec::with_capacity(self.rules.len());
        let mut index = HashMap::with_hasher(ahash::RandomState::new());

        for (name, body) in self.rules {
            let hidden = name.starts_with('_');
            let key = interner.get_or_intern(&name);
            if index.insert(key, rules.len()).is_some() {
                return Err(CompileError::DuplicateRule(name.into()));
            }
            rules.push(Rule {
                name: key,
                body,
                hidden,
            });
        }

        let resolve_listed = |interner: &mut Rodeo,
                              index: &HashMap<Spur, usize, ahash::RandomState>,
                              name: &CompactString|
         -> Result<Spur, CompileError> {
            let key = interner.get_or_intern(name);
            if index.contains_key(&key) {
                Ok(key)
            } else {
                Err(CompileError::UndefinedRule(name.to_string()))
            }
        };

        let word = self
            .word
            .as_ref()
            .map(|name| resolve_listed(&mut interner, &index, name))
            .transpose()?;
        let supertypes = self
            .supertypes
            .iter()
            .map(|name| resolve_listed(&mut interner, &index, name))
            .collect::<Result<HashSet<_, ahash::RandomState>, _>>()?;
        let inline = self
            .inline
            .iter()
            .map(|name| resolve_listed(&mut interner, &index, name))
            .collect::<Result<HashSet<_, ahash::RandomState>, _>>()?;
        let conflicts = self
            .conflicts
            .iter()
            .map(|set| {
                set.iter()
                    .map(|name| resolve_listed(&mut interner, &index, name))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let grammar = Grammar {
            name: self.name,
            rules,
            index,
            extras: self.extras,
            word,
            supertypes,
            inline,
            conflicts,
            interner,
        };
        validate::validate(&grammar)?;
        Ok(grammar)
    }
}
