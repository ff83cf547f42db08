use anchor_lang::prelude::*;

use crate::instructions::escrow;
use crate::{events::StakeJoined, validation::require_entry, JoinMatch, JoinMatchArgs};

pub fn join_match(ctx: Context<JoinMatch>, args: JoinMatchArgs) -> Result<()> {
    let now = Clock::get()?.unix_timestamp;
    let participant = ctx.accounts.participant.key();
    let mint = ctx.accounts.mint.key();
    let before = ctx.accounts.escrow.amount;

    {
        let m = &ctx.accounts.match_state;
        m.assert_join(now, args.amount)?;
        require_entry(&m.entry_validation, &mint, args.amount, args.proof.as_ref())?;
        m.assert_conserved(&mint, before)?;
    }

    // --- TRANSFER stake into escrow ---
    escrow::deposit(
        ctx.accounts.token_program.to_account_info(),
        ctx.accounts.source.to_account_info(),
        ctx.accounts.escrow.to_account_info(),
        ctx.accounts.participant.to_account_info(),
        args.amount,
    )?;

    let m = &mut ctx.accounts.match_state;
    m.record_join(&participant, &mint, args.index, args.amount)?;
    m.updated_at = now;

    ctx.accounts.escrow.reload()?;
    let after = ctx.accounts.escrow.amount;
    escrow::expect_balance(&ctx.accounts.escrow.key(), before.checked_add(args.amount), after)?;
    ctx.accounts.match_state.assert_conserved(&mint, after)?;

    emit!(StakeJoined {
        match_key: ctx.accounts.match_state.key(),
        participant,
        mint,
        index: args.index,
        amount: args.amount,
    });
    Ok(())
}
