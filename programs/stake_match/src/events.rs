use anchor_lang::prelude::*;
use crate::state::MatchState;

// --- ORACLE ---
#[event]
pub struct OracleUpdated {
    pub oracle: Pubkey,
    pub authority: Pubkey,
    pub uses_root: bool,
}

#[event]
pub struct OracleFinalized {
    pub oracle: Pubkey,
    pub finalized_at: i64,
}

// --- MATCH LIFECYCLE ---
#[event]
pub struct MatchCreated {
    pub match_key: Pubkey,
    pub authority: Pubkey,
    pub win_oracle: Pubkey,
}

#[event]
pub struct MatchStateChanged {
    pub match_key: Pubkey,
    pub from: MatchState,
    pub to: MatchState,
    pub timestamp: i64,
}

// --- STAKES ---
#[event]
pub struct StakeJoined {
    pub match_key: Pubkey,
    pub participant: Pubkey,
    pub mint: Pubkey,
    pub index: u64,
    pub amount: u64,
}

#[event]
pub struct StakeLeft {
    pub match_key: Pubkey,
    pub participant: Pubkey,
    pub mint: Pubkey,
    pub index: u64,
    pub amount: u64,
}

// --- SETTLEMENT ---
#[event]
pub struct TransferDisbursed {
    pub match_key: Pubkey,
    pub index: u16,
    pub mint: Pubkey,
    pub recipient: Pubkey,
    pub amount: u64,
}

#[event]
pub struct StakeRefunded {
    pub match_key: Pubkey,
    pub mint: Pubkey,
    pub recipient: Pubkey,
    pub amount: u64,
}

#[event]
pub struct SurplusSwept {
    pub match_key: Pubkey,
    pub mint: Pubkey,
    pub recipient: Pubkey,
    pub amount: u64,
}
