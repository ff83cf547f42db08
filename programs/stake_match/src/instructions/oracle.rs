use anchor_lang::prelude::*;

use crate::{
    constants::INITIAL_VERSION,
    errors::MatchError,
    events::{OracleFinalized, OracleUpdated},
    state::{Match, MatchState, Oracle, OracleTransfers},
    utils::Authority,
    CreateOrUpdateOracle, CreateOrUpdateOracleArgs, DrainOracle, FinalizeOracle,
};

pub fn create_or_update_oracle(
    ctx: Context<CreateOrUpdateOracle>,
    args: CreateOrUpdateOracleArgs,
) -> Result<()> {
    require!(
        args.space as usize >= 8 + Oracle::INIT_SPACE,
        MatchError::OracleSpaceTooSmall
    );

    let now = Clock::get()?.unix_timestamp;
    let authority = ctx.accounts.authority.key();
    let oracle = &mut ctx.accounts.oracle;

    // fresh account: zeroed data
    if oracle.authority == Pubkey::default() {
        oracle.seed = args.seed;
        oracle.authority = authority;
        oracle.bump = ctx.bumps.oracle;
        oracle.finalized = false;
        oracle.finalized_at = 0;
        oracle.created_at = now;
        oracle.version = INITIAL_VERSION;
    } else {
        oracle.assert_authority(&authority)?;
    }

    let uses_root = matches!(args.transfers, OracleTransfers::Root { .. });
    oracle.update(args.transfers, now)?;

    emit!(OracleUpdated {
        oracle: oracle.key(),
        authority,
        uses_root,
    });

    if args.finalized {
        oracle.finalize(now)?;
        msg!("oracle {} finalized at {}", oracle.key(), now);
        emit!(OracleFinalized {
            oracle: oracle.key(),
            finalized_at: now,
        });
    }

    Ok(())
}

pub fn finalize_oracle(ctx: Context<FinalizeOracle>) -> Result<()> {
    let oracle = &mut ctx.accounts.oracle;
    oracle.assert_authority(&ctx.accounts.authority.key())?;

    let now = Clock::get()?.unix_timestamp;
    oracle.finalize(now)?;

    msg!("oracle {} finalized at {}", oracle.key(), now);
    emit!(OracleFinalized {
        oracle: oracle.key(),
        finalized_at: now,
    });
    Ok(())
}

pub fn drain_oracle(ctx: Context<DrainOracle>) -> Result<()> {
    ctx.accounts
        .oracle
        .assert_authority(&ctx.accounts.authority.key())?;

    // A referencing match must be gone or deactivated.
    let match_ai = &ctx.accounts.match_state;
    if match_ai.lamports() > 0 && !match_ai.data_is_empty() {
        require_keys_eq!(*match_ai.owner, crate::ID, MatchError::OracleInUse);
        let data = match_ai.try_borrow_data()?;
        let mut slice: &[u8] = &data;
        let match_state = Match::try_deserialize(&mut slice)?;
        require!(
            match_state.state == MatchState::Deactivated,
            MatchError::OracleInUse
        );
    }

    // `close = authority` returns the rent.
    Ok(())
}
