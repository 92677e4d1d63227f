//! Lowering from rule expressions to a flat symbol table and productions.
//!
//! The symbol id space is laid out in regions: terminals first (so they can
//! index the lexer's pattern table directly), then alias kinds, then
//! nonterminals in rule order, then generated helpers. Repetitions desugar to
//! hidden left-recursive helper nonterminals so list growth keeps the stack
//! flat; `inline` rules are expanded into their use sites before table
//! construction.

use crate::error::CompileError;
use crate::grammar::{Associativity, Grammar, RuleExpr};
use crate::lexer::Pattern;
use crate::syntax::FieldId;
use compact_str::CompactString;
use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

/// Index into a compiled language's symbol table. Doubles as the node kind
/// of the tree nodes the symbol produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u16);

impl SymbolId {
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Static description of one symbol.
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub name: CompactString,
    /// Produces named nodes (grammar rules and named aliases) rather than
    /// anonymous ones (literals).
    pub named: bool,
    pub terminal: bool,
    /// Anonymous exact-text terminal. Ordered before pattern terminals in
    /// each state's lexing order.
    pub literal: bool,
    /// Matched between tokens by the `extras` machinery.
    pub trivia: bool,
    /// Never produces a node; its children splice into the parent.
    pub transparent: bool,
    pub supertype: bool,
    /// Literal also matched by the `word` rule's pattern.
    pub keyword: bool,
}

impl SymbolInfo {
    fn rule(name: &str, named: bool) -> Self {
        Self {
            name: name.into(),
            named,
            terminal: false,
            literal: false,
            trivia: false,
            transparent: false,
            supertype: false,
            keyword: false,
        }
    }
}

/// One element of a production body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductionStep {
    pub symbol: SymbolId,
    pub field: Option<FieldId>,
    /// Present the matched element under this symbol's kind instead.
    pub alias: Option<SymbolId>,
}

impl ProductionStep {
    #[must_use]
    pub const fn new(symbol: SymbolId) -> Self {
        Self {
            symbol,
            field: None,
            alias: None,
        }
    }
}

/// A flattened alternative of a rule.
#[derive(Debug, Clone)]
pub struct Production {
    pub lhs: SymbolId,
    pub steps: SmallVec<[ProductionStep; 8]>,
    /// Static precedence; unannotated productions sit at level 0.
    pub precedence: i32,
    pub assoc: Associativity,
    /// Score applied to a parse path when this production wins a forked
    /// ambiguity.
    pub dynamic: i32,
}

/// Output of lowering, consumed by the table builder.
#[derive(Debug)]
pub struct Lowered {
    pub symbols: Vec<SymbolInfo>,
    pub terminal_count: u16,
    pub eof: SymbolId,
    /// Augmented start nonterminal; production 0 derives the first rule.
    pub start: SymbolId,
    pub productions: Vec<Production>,
    pub fields: Vec<CompactString>,
    /// Terminal matchers, indexed by terminal symbol id.
    pub patterns: Vec<Pattern>,
    pub extras: Vec<SymbolId>,
    pub word_pattern: Option<Pattern>,
    pub keyword_flags: Vec<bool>,
    /// Declared ambiguity sets, as nonterminal symbol ids.
    pub conflict_sets: Vec<HashSet<SymbolId, ahash::RandomState>>,
}

/// One lowered alternative, before it becomes a production.
#[derive(Debug, Clone, Default)]
struct Variant {
    steps: SmallVec<[ProductionStep; 8]>,
    precedence: Option<(i32, Associativity)>,
    dynamic: Option<i32>,
}

impl Variant {
    fn concat(&self, other: &Variant) -> Variant {
        let mut steps = self.steps.clone();
        steps.extend_from_slice(&other.steps);
        Variant {
            steps,
            // Leftmost annotation wins when several appear in one sequence.
            precedence: self.precedence.or(other.precedence),
            dynamic: self.dynamic.or(other.dynamic),
        }
    }
}

struct Lowering<'g> {
    grammar: &'g Grammar,
    symbols: Vec<SymbolInfo>,
    patterns: Vec<Pattern>,
    literal_ids: HashMap<CompactString, SymbolId, ahash::RandomState>,
    pattern_ids: Vec<(Pattern, SymbolId)>,
    alias_ids: HashMap<(CompactString, bool), SymbolId, ahash::RandomState>,
    rule_ids: HashMap<lasso::Spur, SymbolId, ahash::RandomState>,
    fields: Vec<CompactString>,
    field_ids: HashMap<CompactString, FieldId, ahash::RandomState>,
    productions: Vec<Production>,
    helper_counter: usize,
    /// Generated helper nonterminals and the rule each one was generated for.
    helper_owners: Vec<(SymbolId, SymbolId)>,
}

pub(crate) fn lower(grammar: &Grammar) -> Result<Lowered, CompileError> {
    let mut lowering = Lowering {
        grammar,
        symbols: Vec::new(),
        patterns: Vec::new(),
        literal_ids: HashMap::default(),
        pattern_ids: Vec::new(),
        alias_ids: HashMap::default(),
        rule_ids: HashMap::default(),
        fields: Vec::new(),
        field_ids: HashMap::default(),
        productions: Vec::new(),
        helper_counter: 0,
        helper_owners: Vec::new(),
    };
    lowering.run()
}

impl<'g> Lowering<'g> {
    fn run(mut self) -> Result<Lowered, CompileError> {
        let grammar = self.grammar;
        // A rule is lexical only when its own body is character-level. A
        // `Symbol` reference keeps the rule syntactic even when the
        // referenced rule is itself a terminal; collapsing such rules would
        // swallow their internal structure into one token.
        let terminal_rule =
            |rule: &crate::grammar::Rule| rule.body.is_terminal_body(&|_| None);

        // Terminal region: terminal rules, then anonymous terminals in order
        // of appearance, then trivia-only extras, then end of input.
        for rule in grammar.rules() {
            if terminal_rule(rule) {
                let name = grammar.rule_name(rule.name);
                let id = self.push_symbol(SymbolInfo {
                    terminal: true,
                    ..SymbolInfo::rule(name, !rule.hidden)
                });
                self.patterns.push(expr_to_pattern(&rule.body, grammar));
                self.rule_ids.insert(rule.name, id);
            }
        }
        for rule in grammar.rules() {
            if !terminal_rule(rule) {
                self.collect_anonymous_terminals(&rule.body);
            }
        }

        let mut extras = Vec::new();
        for extra in grammar.extras() {
            let id = match extra {
                RuleExpr::Symbol(name) => grammar
                    .interner()
                    .get(name.as_str())
                    .and_then(|key| self.rule_ids.get(&key).copied())
                    .ok_or_else(|| CompileError::InvalidExtra(name.to_string()))?,
                other => self.anonymous_terminal(other),
            };
            self.symbols[id.index()].trivia = true;
            extras.push(id);
        }

        let eof = self.push_symbol(SymbolInfo {
            terminal: true,
            ..SymbolInfo::rule("end", false)
        });
        self.patterns.push(Pattern::lit(""));

        let terminal_count = u16::try_from(self.symbols.len()).unwrap_or(u16::MAX);

        // Alias kinds referenced anywhere in the grammar.
        for rule in grammar.rules() {
            self.collect_aliases(&rule.body);
        }

        // Nonterminal rules, in declaration order.
        for rule in grammar.rules() {
            if !self.rule_ids.contains_key(&rule.name) {
                let name = grammar.rule_name(rule.name);
                let supertype = grammar.is_supertype(rule.name);
                let transparent = rule.hidden || supertype || grammar.is_inline(rule.name);
                let id = self.push_symbol(SymbolInfo {
                    transparent,
                    supertype,
                    ..SymbolInfo::rule(name, !rule.hidden)
                });
                self.rule_ids.insert(rule.name, id);
            }
        }

        // Augmented start wrapping the first rule.
        let first = self.rule_ids[&grammar.rules()[0].name];
        let start = self.push_symbol(SymbolInfo {
            transparent: true,
            ..SymbolInfo::rule("start", false)
        });
        self.productions.push(Production {
            lhs: start,
            steps: SmallVec::from_slice(&[ProductionStep::new(first)]),
            precedence: 0,
            assoc: Associativity::None,
            dynamic: 0,
        });

        // Productions for every nonterminal rule.
        for rule in grammar.rules() {
            let lhs = self.rule_ids[&rule.name];
            if self.symbols[lhs.index()].terminal {
                continue;
            }
            let variants = self.lower_expr(&rule.body, lhs);
            for variant in variants {
                let (precedence, assoc) = variant.precedence.unwrap_or((0, Associativity::None));
                self.productions.push(Production {
                    lhs,
                    steps: variant.steps,
                    precedence,
                    assoc,
                    dynamic: variant.dynamic.unwrap_or(0),
                });
            }
        }

        self.expand_inline_rules();

        let word_pattern = grammar
            .word()
            .and_then(|word| grammar.rule(word))
            .map(|rule| expr_to_pattern(&rule.body, grammar));
        let keyword_flags: Vec<bool> = self
            .symbols
            .iter()
            .take(terminal_count as usize)
            .map(|info| {
                info.literal
                    && word_pattern.as_ref().is_some_and(|word| {
                        word.match_at(&info.name, 0) == Some(info.name.len())
                    })
            })
            .collect();
        for (index, &flag) in keyword_flags.iter().enumerate() {
            self.symbols[index].keyword = flag;
        }

        // A repeat helper belongs to the rule it was generated for, so a
        // declared conflict covers the rule's helpers too.
        let conflict_sets = grammar
            .conflicts()
            .iter()
            .map(|set| {
                let mut ids: HashSet<SymbolId, ahash::RandomState> = set
                    .iter()
                    .filter_map(|name| self.rule_ids.get(name).copied())
                    .collect();
                for &(helper, owner) in &self.helper_owners {
                    if ids.contains(&owner) {
                        ids.insert(helper);
                    }
                }
                ids
            })
            .collect();

        Ok(Lowered {
            symbols: self.symbols,
            terminal_count,
            eof,
            start,
            productions: self.productions,
            fields: self.fields,
            patterns: self.patterns,
            extras,
            word_pattern,
            keyword_flags,
            conflict_sets,
        })
    }

    fn push_symbol(&mut self, info: SymbolInfo) -> SymbolId {
        let id = SymbolId::new(u16::try_from(self.symbols.len()).unwrap_or(u16::MAX));
        self.symbols.push(info);
        id
    }

    /// Walk a nonterminal body registering every literal, inline pattern, and
    /// `token` sub-expression as an anonymous terminal.
    fn collect_anonymous_terminals(&mut self, expr: &RuleExpr) {
        match expr {
            RuleExpr::Blank | RuleExpr::Symbol(_) => {}
            RuleExpr::Literal(_) | RuleExpr::Pattern(_) | RuleExpr::Token(_) => {
                let _ = self.anonymous_terminal(expr);
            }
            RuleExpr::Seq(parts) | RuleExpr::Choice(parts) => {
                for part in parts {
                    self.collect_anonymous_terminals(part);
                }
            }
            RuleExpr::Repeat(inner)
            | RuleExpr::Repeat1(inner)
            | RuleExpr::Optional(inner)
            | RuleExpr::Field { expr: inner, .. }
            | RuleExpr::Alias { expr: inner, .. }
            | RuleExpr::Prec { expr: inner, .. }
            | RuleExpr::PrecDynamic { expr: inner, .. } => {
                self.collect_anonymous_terminals(inner);
            }
        }
    }

    /// Terminal id for a literal, inline pattern, or `token` expression,
    /// deduplicated by text or pattern structure.
    fn anonymous_terminal(&mut self, expr: &RuleExpr) -> SymbolId {
        if let RuleExpr::Literal(text) = expr {
            if let Some(&id) = self.literal_ids.get(text) {
                return id;
            }
            let id = self.push_symbol(SymbolInfo {
                terminal: true,
                literal: true,
                ..SymbolInfo::rule(text, false)
            });
            self.patterns.push(Pattern::Literal(text.clone()));
            self.literal_ids.insert(text.clone(), id);
            return id;
        }
        let pattern = expr_to_pattern(expr, self.grammar);
        if let Some((_, id)) = self.pattern_ids.iter().find(|(p, _)| *p == pattern) {
            return *id;
        }
        let name = format!("_token{}", self.pattern_ids.len());
        let id = self.push_symbol(SymbolInfo {
            terminal: true,
            ..SymbolInfo::rule(&name, false)
        });
        self.patterns.push(pattern.clone());
        self.pattern_ids.push((pattern, id));
        id
    }

    fn collect_aliases(&mut self, expr: &RuleExpr) {
        match expr {
            RuleExpr::Alias { name, named, expr } => {
                let key = (name.clone(), *named);
                if !self.alias_ids.contains_key(&key) {
                    let id = self.push_symbol(SymbolInfo::rule(name, *named));
                    self.alias_ids.insert(key, id);
                }
                self.collect_aliases(expr);
            }
            RuleExpr::Seq(parts) | RuleExpr::Choice(parts) => {
                for part in parts {
                    self.collect_aliases(part);
                }
            }
            RuleExpr::Repeat(inner)
            | RuleExpr::Repeat1(inner)
            | RuleExpr::Optional(inner)
            | RuleExpr::Field { expr: inner, .. }
            | RuleExpr::Prec { expr: inner, .. }
            | RuleExpr::PrecDynamic { expr: inner, .. } => self.collect_aliases(inner),
            RuleExpr::Blank
            | RuleExpr::Literal(_)
            | RuleExpr::Pattern(_)
            | RuleExpr::Symbol(_)
            | RuleExpr::Token(_) => {}
        }
    }

    fn field_id(&mut self, name: &str) -> FieldId {
        if let Some(&id) = self.field_ids.get(name) {
            return id;
        }
        let id = FieldId::new(u16::try_from(self.fields.len()).unwrap_or(u16::MAX));
        self.fields.push(name.into());
        self.field_ids.insert(name.into(), id);
        id
    }

    /// Lower an expression into its alternatives. `owner` names generated
    /// helper nonterminals.
    fn lower_expr(&mut self, expr: &RuleExpr, owner: SymbolId) -> Vec<Variant> {
        match expr {
            RuleExpr::Blank => vec![Variant::default()],
            RuleExpr::Literal(_) | RuleExpr::Pattern(_) | RuleExpr::Token(_) => {
                let id = self.anonymous_terminal(expr);
                vec![single_step(id)]
            }
            RuleExpr::Symbol(name) => {
                // References were validated at grammar build time.
                let id = self
                    .grammar
                    .interner()
                    .get(name.as_str())
                    .and_then(|key| self.rule_ids.get(&key).copied());
                id.map_or_else(Vec::new, |id| vec![single_step(id)])
            }
            RuleExpr::Seq(parts) => {
                let mut variants = vec![Variant::default()];
                for part in parts {
                    let part_variants = self.lower_expr(part, owner);
                    let mut next = Vec::with_capacity(variants.len() * part_variants.len());
                    for prefix in &variants {
                        for suffix in &part_variants {
                            next.push(prefix.concat(suffix));
                        }
                    }
                    variants = next;
                }
                variants
            }
            RuleExpr::Choice(branches) => branches
                .iter()
                .flat_map(|branch| self.lower_expr(branch, owner))
                .collect(),
            RuleExpr::Optional(inner) => {
                let mut variants = self.lower_expr(inner, owner);
                variants.push(Variant::default());
                variants
            }
            RuleExpr::Repeat(inner) => {
                let helper = self.repeat_helper(inner, owner);
                vec![single_step(helper), Variant::default()]
            }
            RuleExpr::Repeat1(inner) => {
                let helper = self.repeat_helper(inner, owner);
                vec![single_step(helper)]
            }
            RuleExpr::Field { name, expr } => {
                let field = self.field_id(name);
                let mut variants = self.lower_expr(expr, owner);
                for variant in &mut variants {
                    for step in &mut variant.steps {
                        step.field.get_or_insert(field);
                    }
                }
                variants
            }
            RuleExpr::Alias { name, named, expr } => {
                let alias = self.alias_ids[&(name.clone(), *named)];
                let mut variants = self.lower_expr(expr, owner);
                for variant in &mut variants {
                    for step in &mut variant.steps {
                        step.alias.get_or_insert(alias);
                    }
                }
                variants
            }
            RuleExpr::Prec { level, assoc, expr } => {
                let mut variants = self.lower_expr(expr, owner);
                for variant in &mut variants {
                    variant.precedence.get_or_insert((*level, *assoc));
                }
                variants
            }
            RuleExpr::PrecDynamic { level, expr } => {
                let mut variants = self.lower_expr(expr, owner);
                for variant in &mut variants {
                    variant.dynamic.get_or_insert(*level);
                }
                variants
            }
        }
    }

    /// Hidden left-recursive helper for one-or-more repetition:
    /// `h -> item | h item`.
    fn repeat_helper(&mut self, inner: &RuleExpr, owner: SymbolId) -> SymbolId {
        let name = format!(
            "{}_repeat{}",
            self.symbols[owner.index()].name, self.helper_counter
        );
        self.helper_counter += 1;
        let helper = self.push_symbol(SymbolInfo {
            transparent: true,
            ..SymbolInfo::rule(&name, false)
        });
        self.helper_owners.push((helper, owner));
        let inner_variants = self.lower_expr(inner, owner);
        for variant in &inner_variants {
            self.productions.push(Production {
                lhs: helper,
                steps: variant.steps.clone(),
                precedence: 0,
                assoc: Associativity::None,
                dynamic: 0,
            });
            let mut recursive = SmallVec::from_slice(&[ProductionStep::new(helper)]);
            recursive.extend_from_slice(&variant.steps);
            self.productions.push(Production {
                lhs: helper,
                steps: recursive,
                precedence: 0,
                assoc: Associativity::None,
                dynamic: 0,
            });
        }
        helper
    }

    /// Substitute `inline` rules into their use sites. Recursive inline rules
    /// are left in place; their transparent flag still splices them at reduce
    /// time.
    fn expand_inline_rules(&mut self) {
        let inline: HashSet<SymbolId, ahash::RandomState> = self
            .grammar
            .rules()
            .iter()
            .filter(|rule| self.grammar.is_inline(rule.name))
            .filter_map(|rule| self.rule_ids.get(&rule.name).copied())
            .filter(|id| !self.symbols[id.index()].terminal)
            .collect();
        if inline.is_empty() {
            return;
        }

        for _ in 0..8 {
            let mut changed = false;
            let snapshot = self.productions.clone();
            let mut next = Vec::with_capacity(snapshot.len());
            for production in &snapshot {
                let inline_at = production
                    .steps
                    .iter()
                    .position(|step| inline.contains(&step.symbol) && step.symbol != production.lhs);
                let Some(at) = inline_at else {
                    next.push(production.clone());
                    continue;
                };
                changed = true;
                let site = production.steps[at];
                for body in snapshot.iter().filter(|p| p.lhs == site.symbol) {
                    let mut steps: SmallVec<[ProductionStep; 8]> =
                        SmallVec::from_slice(&production.steps[..at]);
                    for inner in &body.steps {
                        let mut step = *inner;
                        if step.field.is_none() {
                            step.field = site.field;
                        }
                        if step.alias.is_none() {
                            step.alias = site.alias;
                        }
                        steps.push(step);
                    }
                    steps.extend_from_slice(&production.steps[at + 1..]);
                    next.push(Production {
                        lhs: production.lhs,
                        steps,
                        precedence: production.precedence,
                        assoc: production.assoc,
                        dynamic: production.dynamic,
                    });
                }
            }
            self.productions = next;
            if !changed {
                break;
            }
        }

        // Drop productions of fully expanded inline rules.
        let still_used: HashSet<SymbolId, ahash::RandomState> = self
            .productions
            .iter()
            .flat_map(|p| p.steps.iter().map(|s| s.symbol))
            .collect();
        self.productions
            .retain(|p| !inline.contains(&p.lhs) || still_used.contains(&p.lhs));
    }
}

fn single_step(symbol: SymbolId) -> Variant {
    Variant {
        steps: SmallVec::from_slice(&[ProductionStep::new(symbol)]),
        precedence: None,
        dynamic: None,
    }
}

/// Collapse a terminal-only expression into a character-level pattern.
fn expr_to_pattern(expr: &RuleExpr, grammar: &Grammar) -> Pattern {
    match expr {
        RuleExpr::Blank => Pattern::lit(""),
        RuleExpr::Literal(text) => Pattern::Literal(text.clone()),
        RuleExpr::Pattern(pattern) => pattern.clone(),
        RuleExpr::Symbol(name) => grammar
            .resolve(name)
            .map_or_else(|| Pattern::lit(""), |body| expr_to_pattern(body, grammar)),
        RuleExpr::Seq(parts) => {
            Pattern::seq(parts.iter().map(|part| expr_to_pattern(part, grammar)))
        }
        RuleExpr::Choice(branches) => {
            Pattern::choice(branches.iter().map(|branch| expr_to_pattern(branch, grammar)))
        }
        RuleExpr::Repeat(inner) => Pattern::repeat(expr_to_pattern(inner, grammar)),
        RuleExpr::Repeat1(inner) => Pattern::repeat1(expr_to_pattern(inner, grammar)),
        RuleExpr::Optional(inner) => Pattern::optional(expr_to_pattern(inner, grammar)),
        RuleExpr::Token(inner)
        | RuleExpr::Field { expr: inner, .. }
        | RuleExpr::Alias { expr: inner, .. }
        | RuleExpr::Prec { expr: inner, .. }
        | RuleExpr::PrecDynamic { expr: inner, .. } => expr_to_pattern(inner, grammar),
    }
}
