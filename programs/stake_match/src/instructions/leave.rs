use anchor_lang::prelude::*;

use crate::instructions::escrow;
use crate::{errors::MatchError, events::StakeLeft, LeaveMatch, LeaveMatchArgs};

pub fn leave_match(ctx: Context<LeaveMatch>, args: LeaveMatchArgs) -> Result<()> {
    require!(args.amount > 0, MatchError::InvalidAmount);

    let now = Clock::get()?.unix_timestamp;
    let participant = ctx.accounts.participant.key();
    let mint = ctx.accounts.mint.key();
    let before = ctx.accounts.escrow.amount;

    {
        let m = &ctx.accounts.match_state;
        m.assert_leave_allowed()?;
        require!(
            m.stake_of(&participant, &mint, args.index) >= args.amount,
            MatchError::InsufficientStake
        );
        m.assert_conserved(&mint, before)?;
    }

    // CPI before the &mut borrow: the match PDA signs
    escrow::release(
        ctx.accounts.token_program.to_account_info(),
        ctx.accounts.escrow.to_account_info(),
        ctx.accounts.destination.to_account_info(),
        ctx.accounts.match_state.to_account_info(),
        &ctx.accounts.match_state,
        args.amount,
    )?;

    let m = &mut ctx.accounts.match_state;
    m.record_leave(&participant, &mint, args.index, args.amount)?;
    m.updated_at = now;

    ctx.accounts.escrow.reload()?;
    let after = ctx.accounts.escrow.amount;
    escrow::expect_balance(&ctx.accounts.escrow.key(), before.checked_sub(args.amount), after)?;
    ctx.accounts.match_state.assert_conserved(&mint, after)?;

    emit!(StakeLeft {
        match_key: ctx.accounts.match_state.key(),
        participant,
        mint,
        index: args.index,
        amount: args.amount,
    });
    Ok(())
}
