//! Rank arithmetic for ordered collections.
//!
//! Lists and tasks share one ordering contract: ranks are positive integers,
//! unique among siblings, ascending = display order. The functions here are
//! pure and generic over the id type; they take the current ascending-rank
//! sequence and produce the minimal set of rank writes for the caller to
//! persist.

/// An item participating in the ordering contract, reduced to what the rank
/// arithmetic needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ranked<I> {
    pub id: I,
    pub rank: u32,
}

/// A single pending rank write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankChange<I> {
    pub id: I,
    pub rank: u32,
}

/// Rank for an item appended to a collection: one past the current maximum.
///
/// Collections that lost items to cross-moves may carry gaps, so this is
/// max+1 rather than len+1.
pub fn next_rank<I>(seq: &[Ranked<I>]) -> u32 {
    seq.iter().map(|r| r.rank).max().unwrap_or(0) + 1
}

/// Same-collection reorder with array-move semantics: the moved item is pulled
/// out and reinserted at the anchor's index (both indices taken on the
/// pre-removal sequence), shifting exactly the intervening span. The resulting
/// sequence is renumbered contiguously to 1..N and only items whose stored
/// rank differs are returned, in sequence order.
///
/// Returns an empty plan when the drop is a no-op (anchor == moved) or when
/// either id is missing from the sequence (stale drag state).
pub fn reorder<I: Copy + PartialEq>(
    seq: &[Ranked<I>],
    moved: I,
    anchor: I,
) -> Vec<RankChange<I>> {
    if moved == anchor {
        return Vec::new();
    }
    let Some(old_index) = seq.iter().position(|r| r.id == moved) else {
        return Vec::new();
    };
    let Some(new_index) = seq.iter().position(|r| r.id == anchor) else {
        return Vec::new();
    };

    let mut order = seq.to_vec();
    let item = order.remove(old_index);
    order.insert(new_index, item);

    order
        .iter()
        .enumerate()
        .filter_map(|(i, r)| {
            let rank = (i + 1) as u32;
            (r.rank != rank).then_some(RankChange { id: r.id, rank })
        })
        .collect()
}

/// Cross-collection insertion onto an anchor item.
///
/// Computes the 1-based rank the moved item takes (the anchor's position in
/// the target sequence) and the shift plan that opens the slot: every target
/// item whose stored rank is at least the target rank moves up by one, in
/// ascending original-rank order.
///
/// Returns `None` when the anchor is missing from the target (stale drag
/// state).
pub fn open_slot<I: Copy + PartialEq>(
    target: &[Ranked<I>],
    anchor: I,
) -> Option<(u32, Vec<RankChange<I>>)> {
    let position = target.iter().position(|r| r.id == anchor)?;
    let target_rank = (position + 1) as u32;

    let shifts = target
        .iter()
        .filter(|r| r.rank >= target_rank)
        .map(|r| RankChange {
            id: r.id,
            rank: r.rank + 1,
        })
        .collect();

    Some((target_rank, shifts))
}
