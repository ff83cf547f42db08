// programs/stake_match/src/contexts.rs

use anchor_lang::prelude::*;
use anchor_spl::token::{Mint, Token, TokenAccount};

use crate::{
    errors::MatchError,
    state::{EntryValidation, Match, Oracle, OracleTransfers, TokenTransfer},
    validation::EntryProof,
};

// ----------------------------
// Instruction payloads
// ----------------------------
#[derive(AnchorSerialize, AnchorDeserialize, Clone)]
pub struct CreateOrUpdateOracleArgs {
    pub seed: Pubkey,
    /// Account size requested by the creator; must hold a full `Oracle` and
    /// match the existing size on update.
    pub space: u64,
    pub finalized: bool,
    pub transfers: OracleTransfers,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone)]
pub struct CreateMatchArgs {
    pub win_oracle_cooldown: Option<u64>,
    pub entry_validation: EntryValidation,
    pub leave_allowed: bool,
    pub join_allowed_during_start: bool,
    pub minimum_allowed_entry_time: Option<i64>,
    pub desired_namespace_array_size: u16,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Default)]
pub struct UpdateMatchArgs {
    pub win_oracle_cooldown: Option<u64>,
    pub entry_validation: Option<EntryValidation>,
    pub leave_allowed: Option<bool>,
    pub join_allowed_during_start: Option<bool>,
    pub minimum_allowed_entry_time: Option<i64>,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone)]
pub struct JoinMatchArgs {
    pub amount: u64,
    pub index: u64,
    pub proof: Option<EntryProof>,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone)]
pub struct LeaveMatchArgs {
    pub amount: u64,
    pub index: u64,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone)]
pub struct DisburseArgs {
    pub transfer: TokenTransfer,
    pub proof: Option<Vec<[u8; 32]>>,
}

// ----------------------------
// Oracle
// ----------------------------
#[derive(Accounts)]
#[instruction(args: CreateOrUpdateOracleArgs)]
pub struct CreateOrUpdateOracle<'info> {
    #[account(
        init_if_needed,
        payer = authority,
        space = args.space as usize,
        seeds = [crate::ORACLE_SEED, authority.key().as_ref(), args.seed.as_ref()],
        bump
    )]
    pub oracle: Box<Account<'info, Oracle>>,

    #[account(mut)]
    pub authority: Signer<'info>,

    pub system_program: Program<'info, System>,
    pub rent: Sysvar<'info, Rent>,
}

#[derive(Accounts)]
pub struct FinalizeOracle<'info> {
    #[account(
        mut,
        seeds = [crate::ORACLE_SEED, oracle.authority.as_ref(), oracle.seed.as_ref()],
        bump = oracle.bump
    )]
    pub oracle: Box<Account<'info, Oracle>>,

    pub authority: Signer<'info>,
}

#[derive(Accounts)]
pub struct DrainOracle<'info> {
    #[account(
        mut,
        seeds = [crate::ORACLE_SEED, oracle.authority.as_ref(), oracle.seed.as_ref()],
        bump = oracle.bump,
        has_one = authority @ MatchError::Unauthorized,
        close = authority
    )]
    pub oracle: Box<Account<'info, Oracle>>,

    /// CHECK: match PDA for this oracle; may be absent. Address enforced by seeds.
    #[account(
        seeds = [crate::MATCH_SEED, oracle.key().as_ref()],
        bump
    )]
    pub match_state: UncheckedAccount<'info>,

    #[account(mut)]
    pub authority: Signer<'info>,
}

// ----------------------------
// Match lifecycle
// ----------------------------
#[derive(Accounts)]
pub struct CreateMatch<'info> {
    #[account(
        init,
        payer = authority,
        space = 8 + Match::INIT_SPACE,
        seeds = [crate::MATCH_SEED, win_oracle.key().as_ref()],
        bump
    )]
    pub match_state: Box<Account<'info, Match>>,

    /// CHECK: the oracle may be created later; initialize_match requires it to exist.
    pub win_oracle: UncheckedAccount<'info>,

    #[account(mut)]
    pub authority: Signer<'info>,

    pub system_program: Program<'info, System>,
    pub rent: Sysvar<'info, Rent>,
}

#[derive(Accounts)]
pub struct UpdateMatch<'info> {
    #[account(
        mut,
        seeds = [crate::MATCH_SEED, match_state.win_oracle.as_ref()],
        bump = match_state.bump
    )]
    pub match_state: Box<Account<'info, Match>>,

    pub authority: Signer<'info>,
}

#[derive(Accounts)]
pub struct InitializeMatch<'info> {
    #[account(
        mut,
        seeds = [crate::MATCH_SEED, match_state.win_oracle.as_ref()],
        bump = match_state.bump
    )]
    pub match_state: Box<Account<'info, Match>>,

    #[account(address = match_state.win_oracle @ MatchError::OracleMismatch)]
    pub win_oracle: Box<Account<'info, Oracle>>,

    pub authority: Signer<'info>,
}

#[derive(Accounts)]
pub struct StartMatch<'info> {
    #[account(
        mut,
        seeds = [crate::MATCH_SEED, match_state.win_oracle.as_ref()],
        bump = match_state.bump
    )]
    pub match_state: Box<Account<'info, Match>>,

    pub authority: Signer<'info>,
}

/// Remaining accounts: every escrow PDA of the match plus one writable token
/// account per (recipient, mint) receiving a payout.
#[derive(Accounts)]
pub struct DeactivateMatch<'info> {
    #[account(
        mut,
        seeds = [crate::MATCH_SEED, match_state.win_oracle.as_ref()],
        bump = match_state.bump
    )]
    pub match_state: Box<Account<'info, Match>>,

    /// CHECK: address enforced; deserialized only when oracle transfers are applied.
    #[account(address = match_state.win_oracle @ MatchError::OracleMismatch)]
    pub win_oracle: UncheckedAccount<'info>,

    pub authority: Signer<'info>,

    pub token_program: Program<'info, Token>,
}

/// Remaining accounts: the match's (empty) escrow PDAs, closed to `authority`.
#[derive(Accounts)]
pub struct DrainMatch<'info> {
    #[account(
        mut,
        seeds = [crate::MATCH_SEED, match_state.win_oracle.as_ref()],
        bump = match_state.bump,
        has_one = authority @ MatchError::Unauthorized,
        close = authority
    )]
    pub match_state: Box<Account<'info, Match>>,

    #[account(mut)]
    pub authority: Signer<'info>,

    pub token_program: Program<'info, Token>,
}

// ----------------------------
// Stakes
// ----------------------------
#[derive(Accounts)]
pub struct JoinMatch<'info> {
    #[account(
        mut,
        seeds = [crate::MATCH_SEED, match_state.win_oracle.as_ref()],
        bump = match_state.bump
    )]
    pub match_state: Box<Account<'info, Match>>,

    pub mint: Box<Account<'info, Mint>>,

    #[account(
        init_if_needed,
        payer = participant,
        seeds = [crate::ESCROW_SEED, match_state.key().as_ref(), mint.key().as_ref()],
        bump,
        token::mint = mint,
        token::authority = match_state
    )]
    pub escrow: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        constraint = source.owner == participant.key() @ MatchError::Unauthorized,
        constraint = source.mint == mint.key() @ MatchError::MintMismatch
    )]
    pub source: Box<Account<'info, TokenAccount>>,

    #[account(mut)]
    pub participant: Signer<'info>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
    pub rent: Sysvar<'info, Rent>,
}

#[derive(Accounts)]
pub struct LeaveMatch<'info> {
    #[account(
        mut,
        seeds = [crate::MATCH_SEED, match_state.win_oracle.as_ref()],
        bump = match_state.bump
    )]
    pub match_state: Box<Account<'info, Match>>,

    pub mint: Box<Account<'info, Mint>>,

    #[account(
        mut,
        seeds = [crate::ESCROW_SEED, match_state.key().as_ref(), mint.key().as_ref()],
        bump,
        token::mint = mint,
        token::authority = match_state
    )]
    pub escrow: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        constraint = destination.owner == participant.key() @ MatchError::Unauthorized,
        constraint = destination.mint == mint.key() @ MatchError::MintMismatch
    )]
    pub destination: Box<Account<'info, TokenAccount>>,

    pub participant: Signer<'info>,

    pub token_program: Program<'info, Token>,
}

// ----------------------------
// Settlement
// ----------------------------
#[derive(Accounts)]
#[instruction(args: DisburseArgs)]
pub struct DisburseTokensByOracle<'info> {
    #[account(
        mut,
        seeds = [crate::MATCH_SEED, match_state.win_oracle.as_ref()],
        bump = match_state.bump
    )]
    pub match_state: Box<Account<'info, Match>>,

    #[account(address = match_state.win_oracle @ MatchError::OracleMismatch)]
    pub win_oracle: Box<Account<'info, Oracle>>,

    #[account(
        mut,
        seeds = [crate::ESCROW_SEED, match_state.key().as_ref(), args.transfer.mint.as_ref()],
        bump,
        token::authority = match_state,
        constraint = escrow.mint == args.transfer.mint @ MatchError::MintMismatch
    )]
    pub escrow: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        constraint = destination.owner == args.transfer.to @ MatchError::Unauthorized,
        constraint = destination.mint == args.transfer.mint @ MatchError::MintMismatch
    )]
    pub destination: Box<Account<'info, TokenAccount>>,

    pub cranker: Signer<'info>,

    pub token_program: Program<'info, Token>,
}
