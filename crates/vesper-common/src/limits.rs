//! Centralized limits and thresholds for the front end.
//!
//! Shared constants for walk bounds and capacity limits used by the scope
//! analysis crates. Centralizing them prevents duplicate definitions with
//! inconsistent values and documents the rationale for each limit.

// =============================================================================
// Walk Bounds
// =============================================================================
// These prevent runaway loops when an internal invariant is broken (a cyclic
// parent link would otherwise hang instead of failing the invariant check).

/// Maximum iterations when walking a scope-unit parent chain.
///
/// Unit nesting in real code is tiny (tens of levels); generated code can be
/// deeper, but anything beyond this bound means a corrupted parent link.
///
/// ```js
/// function a() { function b() { function c() { /* ... */ } } }
/// ```
pub const MAX_UNIT_WALK_ITERATIONS: usize = 10_000;

/// Maximum iterations when walking a block parent chain within one unit.
///
/// Bounds the block-chain search in identifier resolution. Block nesting is
/// bounded by source nesting depth:
///
/// ```js
/// { { { { let deep = 1; } } } }
/// ```
pub const MAX_BLOCK_WALK_ITERATIONS: usize = 10_000;

// =============================================================================
// Capacity Limits
// =============================================================================

/// Pre-allocation size for scope units per program.
///
/// Most scripts declare far fewer functions; this just avoids early
/// reallocation of the unit arena for typical inputs.
pub const UNIT_PREALLOC: usize = 64;
