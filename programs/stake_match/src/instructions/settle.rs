use anchor_lang::prelude::*;

use crate::instructions::escrow;
use crate::{
    errors::MatchError,
    events::{MatchStateChanged, TransferDisbursed},
    state::MatchState,
    DisburseArgs, DisburseTokensByOracle,
};

/// Applies one oracle transfer. Anyone may crank this once the oracle is
/// finalized and the cooldown has elapsed; the last disbursal that empties the
/// match deactivates it.
pub fn disburse_tokens_by_oracle(
    ctx: Context<DisburseTokensByOracle>,
    args: DisburseArgs,
) -> Result<()> {
    let now = Clock::get()?.unix_timestamp;
    let transfer = args.transfer;
    let before = ctx.accounts.escrow.amount;

    {
        let m = &ctx.accounts.match_state;
        m.assert_active()?;
        let oracle = &ctx.accounts.win_oracle;
        oracle.assert_settleable(m.win_oracle_cooldown, now)?;
        oracle.transfers.resolve(&transfer, args.proof.as_deref())?;
        m.assert_conserved(&transfer.mint, before)?;
    }

    let payout = ctx.accounts.match_state.apply_transfer(&transfer)?;

    if payout.amount > 0 {
        escrow::release(
            ctx.accounts.token_program.to_account_info(),
            ctx.accounts.escrow.to_account_info(),
            ctx.accounts.destination.to_account_info(),
            ctx.accounts.match_state.to_account_info(),
            &ctx.accounts.match_state,
            payout.amount,
        )?;
    }

    ctx.accounts.escrow.reload()?;
    let after = ctx.accounts.escrow.amount;
    escrow::expect_balance(&ctx.accounts.escrow.key(), before.checked_sub(payout.amount), after)?;
    ctx.accounts
        .match_state
        .assert_conserved(&transfer.mint, after)?;

    let match_key = ctx.accounts.match_state.key();
    emit!(TransferDisbursed {
        match_key,
        index: transfer.index,
        mint: payout.mint,
        recipient: payout.recipient,
        amount: payout.amount,
    });

    let m = &mut ctx.accounts.match_state;
    m.updated_at = now;
    if !m.has_outstanding_stake() {
        require!(
            m.escrow.iter().all(|e| e.amount == 0),
            MatchError::InvariantViolation
        );
        let from = m.state;
        m.transition(MatchState::Deactivated, now)?;
        msg!("match {} settled by oracle", match_key);
        emit!(MatchStateChanged {
            match_key,
            from,
            to: MatchState::Deactivated,
            timestamp: now,
        });
    }
    Ok(())
}
