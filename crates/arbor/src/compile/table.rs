//! Canonical LR(1) automaton construction and the compiled [`Language`].

use crate::compile::resolve::{self, ConflictContext, ShiftCandidate};
use crate::compile::symbols::{self, Lowered, Production, SymbolId, SymbolInfo};
use crate::error::CompileError;
use crate::grammar::Grammar;
use crate::lexer::Lexer;
use crate::syntax::{FieldId, Kind};
use compact_str::CompactString;
use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use std::sync::Arc;

/// A parse action. A state may carry several actions for one terminal when
/// the grammar declares the ambiguity; the runtime forks over all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Shift(u32),
    Reduce(u32),
    Accept,
}

/// One automaton state.
#[derive(Debug)]
pub struct State {
    pub actions: HashMap<SymbolId, SmallVec<[Action; 2]>, ahash::RandomState>,
    pub gotos: HashMap<SymbolId, u32, ahash::RandomState>,
    /// Terminals this state can consume, in lexing order: literals before
    /// patterns so keywords out-rank the word rule on length ties.
    pub terminals: Vec<SymbolId>,
}

/// An immutable compiled language: symbol table, productions, parse states,
/// and the lexer. Shared by `Arc` between concurrent parse sessions.
#[derive(Debug)]
pub struct Language {
    name: CompactString,
    symbols: Vec<SymbolInfo>,
    terminal_count: u16,
    eof: SymbolId,
    productions: Vec<Production>,
    states: Vec<State>,
    fields: Vec<CompactString>,
    lexer: Lexer,
}

impl Language {
    /// Compile a validated grammar into parse tables.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::UnresolvedConflict`] when a table conflict
    /// survives precedence and associativity and is not covered by a
    /// declared ambiguity set.
    pub fn compile(grammar: &Grammar) -> Result<Arc<Self>, CompileError> {
        let lowered = symbols::lower(grammar)?;
        let states = build_states(&lowered)?;
        let lexer = Lexer::new(
            lowered.patterns,
            lowered.extras,
            lowered.word_pattern,
            lowered.keyword_flags,
        );
        Ok(Arc::new(Self {
            name: grammar.name().into(),
            symbols: lowered.symbols,
            terminal_count: lowered.terminal_count,
            eof: lowered.eof,
            productions: lowered.productions,
            states,
            fields: lowered.fields,
            lexer,
        }))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn symbol(&self, id: SymbolId) -> &SymbolInfo {
        &self.symbols[id.index()]
    }

    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub const fn terminal_count(&self) -> u16 {
        self.terminal_count
    }

    #[must_use]
    pub const fn eof(&self) -> SymbolId {
        self.eof
    }

    #[must_use]
    pub fn is_terminal(&self, id: SymbolId) -> bool {
        id.raw() < self.terminal_count
    }

    #[must_use]
    pub fn states(&self) -> &[State] {
        &self.states
    }

    #[must_use]
    pub fn state(&self, id: u32) -> &State {
        &self.states[id as usize]
    }

    #[must_use]
    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    #[must_use]
    pub fn production(&self, id: u32) -> &Production {
        &self.productions[id as usize]
    }

    #[must_use]
    pub const fn lexer(&self) -> &Lexer {
        &self.lexer
    }

    /// The node kind a symbol produces.
    #[must_use]
    pub fn kind_of(&self, id: SymbolId) -> Kind {
        Kind::new(id.raw())
    }

    /// Human-readable name of a node kind.
    #[must_use]
    pub fn kind_name(&self, kind: Kind) -> &str {
        if kind.is_error() {
            "ERROR"
        } else if kind.is_missing() {
            "MISSING"
        } else {
            &self.symbols[kind.raw() as usize].name
        }
    }

    /// Kind of the named rule or alias, if the language defines it.
    #[must_use]
    pub fn kind(&self, name: &str) -> Option<Kind> {
        self.symbols
            .iter()
            .position(|info| info.name == name)
            .and_then(|index| u16::try_from(index).ok())
            .map(Kind::new)
    }

    /// Whether a kind names a supertype rule. Supertype nodes are elided
    /// from trees; membership is still answerable through
    /// [`supertype_members`](Self::supertype_members).
    #[must_use]
    pub fn is_supertype(&self, kind: Kind) -> bool {
        self.symbols
            .get(kind.raw() as usize)
            .is_some_and(|info| info.supertype)
    }

    /// The kinds a supertype can stand for: the kinds produced by its
    /// single-element alternatives.
    #[must_use]
    pub fn supertype_members(&self, supertype: Kind) -> Vec<Kind> {
        if !self.is_supertype(supertype) {
            return Vec::new();
        }
        let lhs = SymbolId::new(supertype.raw());
        let mut members = Vec::new();
        for production in &self.productions {
            if production.lhs != lhs || production.steps.len() != 1 {
                continue;
            }
            let step = production.steps[0];
            let kind = self.kind_of(step.alias.unwrap_or(step.symbol));
            if !members.contains(&kind) {
                members.push(kind);
            }
        }
        members
    }

    #[must_use]
    pub fn is_supertype_of(&self, supertype: Kind, kind: Kind) -> bool {
        self.supertype_members(supertype).contains(&kind)
    }

    #[must_use]
    pub fn field_name(&self, field: FieldId) -> &str {
        &self.fields[field.raw() as usize]
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<FieldId> {
        self.fields
            .iter()
            .position(|f| f == name)
            .and_then(|index| u16::try_from(index).ok())
            .map(FieldId::new)
    }

    /// Display names of the terminals a state can consume, for diagnostics.
    /// Literals are quoted.
    #[must_use]
    pub fn expected_terminals(&self, state: u32) -> Vec<String> {
        let state = self.state(state);
        let mut names: Vec<String> = state
            .terminals
            .iter()
            .map(|&t| {
                let info = self.symbol(t);
                if info.literal {
                    format!("\"{}\"", info.name)
                } else {
                    info.name.to_string()
                }
            })
            .collect();
        if state.actions.contains_key(&self.eof) {
            names.push("end of file".to_string());
        }
        names
    }
}

/// An LR(1) item: a production, a dot position, and one lookahead terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct Item {
    production: u32,
    dot: u32,
    lookahead: SymbolId,
}

struct Builder<'a> {
    lowered: &'a Lowered,
    first: HashMap<SymbolId, HashSet<SymbolId, ahash::RandomState>, ahash::RandomState>,
    nullable: HashSet<SymbolId, ahash::RandomState>,
}

fn build_states(lowered: &Lowered) -> Result<Vec<State>, CompileError> {
    let (first, nullable) = first_sets(lowered);
    let builder = Builder {
        lowered,
        first,
        nullable,
    };
    builder.run()
}

impl<'a> Builder<'a> {
    fn run(&self) -> Result<Vec<State>, CompileError> {
        let initial_kernel = vec![Item {
            production: 0,
            dot: 0,
            lookahead: self.lowered.eof,
        }];

        let mut kernels: Vec<Vec<Item>> = vec![initial_kernel.clone()];
        let mut kernel_ids: HashMap<Vec<Item>, u32, ahash::RandomState> = HashMap::default();
        kernel_ids.insert(initial_kernel, 0);
        let mut transitions: Vec<Vec<(SymbolId, u32)>> = vec![Vec::new()];
        let mut closures: Vec<Vec<Item>> = vec![Vec::new()];

        let mut worklist = vec![0u32];
        while let Some(state) = worklist.pop() {
            let closure = self.closure(&kernels[state as usize]);

            // Group advanced items by the symbol after the dot.
            let mut next_kernels: HashMap<SymbolId, Vec<Item>, ahash::RandomState> =
                HashMap::default();
            for item in &closure {
                let production = &self.lowered.productions[item.production as usize];
                if let Some(step) = production.steps.get(item.dot as usize) {
                    next_kernels.entry(step.symbol).or_default().push(Item {
                        production: item.production,
                        dot: item.dot + 1,
                        lookahead: item.lookahead,
                    });
                }
            }

            let mut outgoing: Vec<(SymbolId, Vec<Item>)> = next_kernels.into_iter().collect();
            outgoing.sort_unstable_by_key(|(symbol, _)| *symbol);
            for (symbol, mut kernel) in outgoing {
                kernel.sort_unstable();
                kernel.dedup();
                let id = if let Some(&id) = kernel_ids.get(&kernel) {
                    id
                } else {
                    let id = u32::try_from(kernels.len()).unwrap_or(u32::MAX);
                    kernels.push(kernel.clone());
                    kernel_ids.insert(kernel, id);
                    transitions.push(Vec::new());
                    closures.push(Vec::new());
                    worklist.push(id);
                    id
                };
                transitions[state as usize].push((symbol, id));
            }
            closures[state as usize] = closure;
        }

        self.build_actions(&closures, &transitions)
    }

    fn build_actions(
        &self,
        closures: &[Vec<Item>],
        transitions: &[Vec<(SymbolId, u32)>],
    ) -> Result<Vec<State>, CompileError> {
        let lowered = self.lowered;
        let mut states = Vec::with_capacity(closures.len());

        for (state_id, closure) in closures.iter().enumerate() {
            let mut actions: HashMap<SymbolId, SmallVec<[Action; 2]>, ahash::RandomState> =
                HashMap::default();
            let mut gotos: HashMap<SymbolId, u32, ahash::RandomState> = HashMap::default();

            // Reduce candidates per lookahead, from completed items.
            let mut reduces: HashMap<SymbolId, Vec<u32>, ahash::RandomState> = HashMap::default();
            let mut accept_on_eof = false;
            for item in closure {
                let production = &lowered.productions[item.production as usize];
                if (item.dot as usize) < production.steps.len() {
                    continue;
                }
                if item.production == 0 {
                    accept_on_eof = true;
                } else {
                    let entry = reduces.entry(item.lookahead).or_default();
                    if !entry.contains(&item.production) {
                        entry.push(item.production);
                    }
                }
            }

            for &(symbol, target) in &transitions[state_id] {
                if !symbol_is_terminal(lowered, symbol) {
                    gotos.insert(symbol, target);
                    continue;
                }
                let mut shift = ShiftCandidate {
                    next: target,
                    precedences: SmallVec::new(),
                    lhs: SmallVec::new(),
                };
                for item in closure {
                    let production = &lowered.productions[item.production as usize];
                    if production
                        .steps
                        .get(item.dot as usize)
                        .is_some_and(|step| step.symbol == symbol)
                    {
                        shift.precedences.push(production.precedence);
                        if !shift.lhs.contains(&production.lhs) {
                            shift.lhs.push(production.lhs);
                        }
                    }
                }
                let reduce_candidates = reduces.remove(&symbol).unwrap_or_default();
                let ctx = ConflictContext {
                    state: state_id,
                    productions: &lowered.productions,
                    symbols: &lowered.symbols,
                    conflict_sets: &lowered.conflict_sets,
                };
                let resolved = resolve::resolve(&ctx, Some(shift), reduce_candidates)?;
                actions.insert(symbol, resolved);
            }

            // Pure reduce entries, no competing shift.
            let mut remaining: Vec<(SymbolId, Vec<u32>)> = reduces.into_iter().collect();
            remaining.sort_unstable_by_key(|(symbol, _)| *symbol);
            for (symbol, mut candidates) in remaining {
                candidates.sort_unstable();
                let ctx = ConflictContext {
                    state: state_id,
                    productions: &lowered.productions,
                    symbols: &lowered.symbols,
                    conflict_sets: &lowered.conflict_sets,
                };
                let resolved = resolve::resolve(&ctx, None, candidates)?;
                actions.insert(symbol, resolved);
            }

            if accept_on_eof {
                actions.insert(lowered.eof, SmallVec::from_slice(&[Action::Accept]));
            }

            let mut terminals: Vec<SymbolId> = actions
                .keys()
                .copied()
                .filter(|&t| t != lowered.eof)
                .collect();
            terminals.sort_unstable_by_key(|&t| (!lowered.symbols[t.index()].literal, t));

            states.push(State {
                actions,
                gotos,
                terminals,
            });
        }

        Ok(states)
    }

    /// LR(1) closure: expand nonterminals after the dot, propagating
    /// lookaheads through FIRST of the remaining suffix.
    fn closure(&self, kernel: &[Item]) -> Vec<Item> {
        let lowered = self.lowered;
        let mut seen: HashSet<Item, ahash::RandomState> = kernel.iter().copied().collect();
        let mut queue: Vec<Item> = kernel.to_vec();
        let mut out: Vec<Item> = kernel.to_vec();

        while let Some(item) = queue.pop() {
            let production = &lowered.productions[item.production as usize];
            let Some(step) = production.steps.get(item.dot as usize) else {
                continue;
            };
            if symbol_is_terminal(lowered, step.symbol) {
                continue;
            }
            let lookaheads =
                self.first_of_suffix(&production.steps, item.dot as usize + 1, item.lookahead);
            for (index, candidate) in lowered.productions.iter().enumerate() {
                if candidate.lhs != step.symbol {
                    continue;
                }
                for &lookahead in &lookaheads {
                    let new_item = Item {
                        production: u32::try_from(index).unwrap_or(u32::MAX),
                        dot: 0,
                        lookahead,
                    };
                    if seen.insert(new_item) {
                        out.push(new_item);
                        queue.push(new_item);
                    }
                }
            }
        }

        out
    }

    /// FIRST of the steps from `start` on, falling through to `lookahead`
    /// when the whole suffix is nullable.
    fn first_of_suffix(
        &self,
        steps: &[crate::compile::symbols::ProductionStep],
        start: usize,
        lookahead: SymbolId,
    ) -> SmallVec<[SymbolId; 4]> {
        let mut out: SmallVec<[SymbolId; 4]> = SmallVec::new();
        for step in &steps[start.min(steps.len())..] {
            if symbol_is_terminal(self.lowered, step.symbol) {
                if !out.contains(&step.symbol) {
                    out.push(step.symbol);
                }
                return out;
            }
            if let Some(first) = self.first.get(&step.symbol) {
                for &t in first {
                    if !out.contains(&t) {
                        out.push(t);
                    }
                }
            }
            if !self.nullable.contains(&step.symbol) {
                return out;
            }
        }
        if !out.contains(&lookahead) {
            out.push(lookahead);
        }
        out
    }
}

fn symbol_is_terminal(lowered: &Lowered, symbol: SymbolId) -> bool {
    symbol.raw() < lowered.terminal_count
}

/// Fixpoint computation of FIRST sets and nullability for every nonterminal.
#[allow(clippy::type_complexity)]
fn first_sets(
    lowered: &Lowered,
) -> (
    HashMap<SymbolId, HashSet<SymbolId, ahash::RandomState>, ahash::RandomState>,
    HashSet<SymbolId, ahash::RandomState>,
) {
    let mut first: HashMap<SymbolId, HashSet<SymbolId, ahash::RandomState>, ahash::RandomState> =
        HashMap::default();
    let mut nullable: HashSet<SymbolId, ahash::RandomState> = HashSet::default();

    loop {
        let mut changed = false;
        for production in &lowered.productions {
            let mut all_nullable = true;
            for step in &production.steps {
                if symbol_is_terminal(lowered, step.symbol) {
                    changed |= first
                        .entry(production.lhs)
                        .or_default()
                        .insert(step.symbol);
                    all_nullable = false;
                    break;
                }
                let step_first: Vec<SymbolId> = first
                    .get(&step.symbol)
                    .map(|set| set.iter().copied().collect())
                    .unwrap_or_default();
                let entry = first.entry(production.lhs).or_default();
                for t in step_first {
                    changed |= entry.insert(t);
                }
                if !nullable.contains(&step.symbol) {
                    all_nullable = false;
                    break;
                }
            }
            if all_nullable {
                changed |= nullable.insert(production.lhs);
            }
        }
        if !changed {
            break;
        }
    }

    (first, nullable)
}
