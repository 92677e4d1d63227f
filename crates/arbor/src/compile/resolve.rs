//! Parse-table conflict resolution.
//!
//! When a state has several possible actions on one terminal, they are
//! resolved in a fixed order: static precedence first, then associativity
//! for shift/reduce ties, then the grammar's declared ambiguity sets. An
//! ambiguity covered by a declared set keeps all surviving actions and forks
//! the parse at runtime; anything else is a compile error.

use crate::compile::symbols::{Production, SymbolId, SymbolInfo};
use crate::compile::table::Action;
use crate::error::CompileError;
use crate::grammar::Associativity;
use hashbrown::HashSet;
use smallvec::SmallVec;

pub(crate) struct ConflictContext<'a> {
    pub state: usize,
    pub productions: &'a [Production],
    pub symbols: &'a [SymbolInfo],
    pub conflict_sets: &'a [HashSet<SymbolId, ahash::RandomState>],
}

/// A possible shift, with the precedences and left-hand sides of the items
/// that want it.
pub(crate) struct ShiftCandidate {
    pub next: u32,
    pub precedences: SmallVec<[i32; 4]>,
    pub lhs: SmallVec<[SymbolId; 4]>,
}

pub(crate) fn resolve(
    ctx: &ConflictContext<'_>,
    shift: Option<ShiftCandidate>,
    reduces: Vec<u32>,
) -> Result<SmallVec<[Action; 2]>, CompileError> {
    match (&shift, reduces.len()) {
        (Some(shift), 0) => return Ok(SmallVec::from_slice(&[Action::Shift(shift.next)])),
        (None, 1) => return Ok(SmallVec::from_slice(&[Action::Reduce(reduces[0])])),
        _ => {}
    }

    // A shift whose items disagree on precedence cannot be compared; only a
    // declared ambiguity can save it.
    let shift_precedence = shift.as_ref().and_then(|s| uniform(&s.precedences));
    let comparable = shift.is_none() || shift_precedence.is_some();

    let mut keep_shift = shift.is_some();
    let mut keep_reduces = reduces.clone();

    if comparable {
        let mut max = i32::MIN;
        if let Some(p) = shift_precedence {
            max = max.max(p);
        }
        for &r in &reduces {
            max = max.max(ctx.productions[r as usize].precedence);
        }
        keep_shift = shift_precedence == Some(max);
        keep_reduces.retain(|&r| ctx.productions[r as usize].precedence == max);

        // Shift/reduce tie at equal precedence falls back to associativity.
        if keep_shift && !keep_reduces.is_empty() {
            let assocs: HashSet<Associativity, ahash::RandomState> = keep_reduces
                .iter()
                .map(|&r| ctx.productions[r as usize].assoc)
                .collect();
            if assocs.len() == 1 {
                match assocs.into_iter().next().unwrap_or(Associativity::None) {
                    Associativity::Left => keep_shift = false,
                    Associativity::Right => keep_reduces.clear(),
                    Associativity::None => {}
                }
            }
        }
    }

    let survivors = usize::from(keep_shift) + keep_reduces.len();
    if survivors == 1 {
        return Ok(if keep_shift {
            SmallVec::from_slice(&[Action::Shift(shift.map_or(0, |s| s.next))])
        } else {
            SmallVec::from_slice(&[Action::Reduce(keep_reduces[0])])
        });
    }

    // Still ambiguous: permitted only when every involved rule belongs to one
    // declared conflict set.
    let mut involved: HashSet<SymbolId, ahash::RandomState> = HashSet::default();
    if keep_shift {
        if let Some(shift) = &shift {
            involved.extend(shift.lhs.iter().copied());
        }
    }
    for &r in &keep_reduces {
        involved.insert(ctx.productions[r as usize].lhs);
    }

    let declared = ctx
        .conflict_sets
        .iter()
        .any(|set| involved.iter().all(|sym| set.contains(sym)));
    if declared {
        let mut actions = SmallVec::new();
        if keep_shift {
            if let Some(shift) = shift {
                actions.push(Action::Shift(shift.next));
            }
        }
        for r in keep_reduces {
            actions.push(Action::Reduce(r));
        }
        return Ok(actions);
    }

    let mut names: Vec<String> = involved
        .iter()
        .map(|sym| ctx.symbols[sym.index()].name.to_string())
        .collect();
    names.sort_unstable();
    Err(CompileError::UnresolvedConflict {
        state: ctx.state,
        productions: names,
    })
}

fn uniform(values: &[i32]) -> Option<i32> {
    let first = *values.first()?;
    values.iter().all(|&v| v == first).then_some(first)
}
