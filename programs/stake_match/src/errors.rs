use anchor_lang::prelude::*;

#[error_code]
pub enum MatchError {
    #[msg("Unauthorized")]
    Unauthorized,

    // -----------------
    // Lifecycle
    // -----------------
    #[msg("Match state does not permit this transition")]
    InvalidStateTransition,
    #[msg("Match already deactivated")]
    MatchAlreadyDeactivated,
    #[msg("Join window not open yet")]
    JoinWindowNotOpen,
    #[msg("Join not allowed in current match state")]
    JoinNotAllowed,
    #[msg("Leave not allowed before settlement")]
    LeaveNotAllowed,

    // -----------------
    // Entry validation
    // -----------------
    #[msg("Mint is not whitelisted for this match")]
    MintNotWhitelisted,
    #[msg("Merkle proof does not resolve to the stored root")]
    InvalidProof,
    #[msg("Amount violates the entry constraint")]
    AmountConstraintViolated,
    #[msg("Invalid entry validation rules")]
    InvalidEntryValidation,

    // -----------------
    // Stakes / escrow
    // -----------------
    #[msg("Invalid stake amount")]
    InvalidAmount,
    #[msg("Insufficient stake")]
    InsufficientStake,
    #[msg("Too many participant stakes")]
    TooManyStakes,
    #[msg("Participant holds too many lots")]
    TooManyLots,
    #[msg("Too many escrowed mints")]
    TooManyMints,
    #[msg("Mint mismatch")]
    MintMismatch,
    #[msg("Missing token account")]
    MissingTokenAccount,
    #[msg("Escrow / stake invariant violated")]
    InvariantViolation,
    #[msg("Math overflow")]
    MathOverflow,

    // -----------------
    // Oracle / settlement
    // -----------------
    #[msg("Oracle already finalized")]
    AlreadyFinalized,
    #[msg("Oracle not finalized")]
    OracleNotFinalized,
    #[msg("Oracle cooldown not elapsed")]
    OracleCooldownNotElapsed,
    #[msg("Oracle does not match the match record")]
    OracleMismatch,
    #[msg("Oracle account space too small")]
    OracleSpaceTooSmall,
    #[msg("Oracle still referenced by an active match")]
    OracleInUse,
    #[msg("Invalid transfer index")]
    InvalidTransferIndex,
    #[msg("Transfer not present in oracle")]
    TransferNotInOracle,
    #[msg("Transfer already applied")]
    TransferAlreadyApplied,
}
