use anchor_lang::prelude::*;

pub mod constants;
pub mod contexts;
pub mod errors;
pub mod events;
pub mod instructions;
pub mod state;
pub mod utils;
pub mod validation;

pub use constants::*;
pub use contexts::*;
pub use errors::*;
pub use state::*;
pub use utils::*;

#[cfg(not(feature = "no-entrypoint"))]
use solana_security_txt::security_txt;

#[cfg(not(feature = "no-entrypoint"))]
security_txt! {
    // Required fields
    name: "stake_match",
    project_url: "https://github.com/stake-match/stake-match",
    contacts: "link:https://github.com/stake-match/stake-match/issues",
    policy: "https://github.com/stake-match/stake-match/blob/main/SECURITY.md",

    // Optional fields
    preferred_languages: "en",
    source_code: "https://github.com/stake-match/stake-match"
}

declare_id!("7KqzN5dWjkW1pQK1dQe9W1bq9uJ4aRg1ZrVX6o3nYyH2");

#[program]
pub mod stake_match {
    use super::*;
    use crate::instructions::{join, leave, lifecycle, oracle, settle};

    // ----------------------------
    // Oracle
    // ----------------------------
    pub fn create_or_update_oracle(
        ctx: Context<CreateOrUpdateOracle>,
        args: CreateOrUpdateOracleArgs,
    ) -> Result<()> {
        oracle::create_or_update_oracle(ctx, args)
    }

    pub fn finalize_oracle(ctx: Context<FinalizeOracle>) -> Result<()> {
        oracle::finalize_oracle(ctx)
    }

    pub fn drain_oracle(ctx: Context<DrainOracle>) -> Result<()> {
        oracle::drain_oracle(ctx)
    }

    // ----------------------------
    // Match lifecycle
    // ----------------------------
    pub fn create_match(ctx: Context<CreateMatch>, args: CreateMatchArgs) -> Result<()> {
        lifecycle::create_match(ctx, args)
    }

    pub fn update_match(ctx: Context<UpdateMatch>, args: UpdateMatchArgs) -> Result<()> {
        lifecycle::update_match(ctx, args)
    }

    pub fn initialize_match(ctx: Context<InitializeMatch>) -> Result<()> {
        lifecycle::initialize_match(ctx)
    }

    pub fn start_match(ctx: Context<StartMatch>) -> Result<()> {
        lifecycle::start_match(ctx)
    }

    pub fn deactivate_match<'info>(
        ctx: Context<'_, '_, 'info, 'info, DeactivateMatch<'info>>,
        apply_oracle_transfers: bool,
    ) -> Result<()> {
        lifecycle::deactivate_match(ctx, apply_oracle_transfers)
    }

    pub fn drain_match<'info>(ctx: Context<'_, '_, 'info, 'info, DrainMatch<'info>>) -> Result<()> {
        lifecycle::drain_match(ctx)
    }

    // ----------------------------
    // Stakes
    // ----------------------------
    pub fn join_match(ctx: Context<JoinMatch>, args: JoinMatchArgs) -> Result<()> {
        join::join_match(ctx, args)
    }

    pub fn leave_match(ctx: Context<LeaveMatch>, args: LeaveMatchArgs) -> Result<()> {
        leave::leave_match(ctx, args)
    }

    // ----------------------------
    // Settlement
    // ----------------------------
    pub fn disburse_tokens_by_oracle(
        ctx: Context<DisburseTokensByOracle>,
        args: DisburseArgs,
    ) -> Result<()> {
        settle::disburse_tokens_by_oracle(ctx, args)
    }
}
