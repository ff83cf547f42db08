// Centralized Protocol Constants

// Capacity Limits
// ===============

/// Maximum number of (participant, mint, index) stake lots held by one match.
/// Bounds the Match account size; 64 lots * 80 bytes stays under the 10KiB init limit.
pub const MAX_STAKES: usize = 64;

/// Maximum number of lots one participant may hold across all mints of a match.
pub const MAX_LOTS_PER_PARTICIPANT: usize = 4;

/// Maximum number of distinct mints escrowed by one match.
pub const MAX_MINTS: usize = 8;

/// Maximum number of explicit per-mint entry rules.
pub const MAX_ENTRY_RULES: usize = 8;

/// Maximum number of explicit transfers an oracle can carry inline.
/// Larger outcome sets must be committed as a merkle root.
pub const MAX_EXPLICIT_TRANSFERS: usize = 16;

/// Transfer indices are tracked in a 256-bit bitmap on the match.
pub const MAX_ORACLE_TRANSFERS: usize = 256;

/// Longest merkle proof accepted (2^32 leaves).
pub const MAX_PROOF_DEPTH: usize = 32;

// Defaults
// ========

/// Cooldown between oracle finalization and settlement when the creator passes none (seconds).
pub const DEFAULT_WIN_ORACLE_COOLDOWN: u64 = 0;

/// Initial version for account structures.
pub const INITIAL_VERSION: u16 = 1;
