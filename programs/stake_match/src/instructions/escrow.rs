// programs/stake_match/src/instructions/escrow.rs
//
// Custody moves for the per-(match, mint) escrow token accounts.
// Token authority of every escrow PDA is the match PDA.
use anchor_lang::prelude::*;
use anchor_spl::token::{self, CloseAccount, Transfer};

use crate::{errors::MatchError, state::Match, utils::read_token_account, MATCH_SEED};

/// Participant -> escrow (participant signs).
pub(crate) fn deposit<'info>(
    token_program: AccountInfo<'info>,
    source: AccountInfo<'info>,
    escrow: AccountInfo<'info>,
    participant: AccountInfo<'info>,
    amount: u64,
) -> Result<()> {
    token::transfer(
        CpiContext::new(
            token_program,
            Transfer {
                from: source,
                to: escrow,
                authority: participant,
            },
        ),
        amount,
    )
}

/// Escrow -> recipient (match PDA signs).
pub(crate) fn release<'info>(
    token_program: AccountInfo<'info>,
    escrow: AccountInfo<'info>,
    destination: AccountInfo<'info>,
    match_info: AccountInfo<'info>,
    match_state: &Match,
    amount: u64,
) -> Result<()> {
    let signer_seeds: &[&[&[u8]]] = &[&[
        MATCH_SEED,
        match_state.win_oracle.as_ref(),
        &[match_state.bump],
    ]];

    token::transfer(
        CpiContext::new_with_signer(
            token_program,
            Transfer {
                from: escrow,
                to: destination,
                authority: match_info,
            },
            signer_seeds,
        ),
        amount,
    )
}

/// The escrow must read exactly `expected` after a custody move.
pub(crate) fn expect_balance(escrow: &Pubkey, expected: Option<u64>, actual: u64) -> Result<()> {
    let expected = expected.ok_or_else(|| error!(MatchError::MathOverflow))?;
    if actual != expected {
        msg!(
            "escrow {} moved unexpectedly: expected={} actual={}",
            escrow,
            expected,
            actual
        );
        return err!(MatchError::InvariantViolation);
    }
    Ok(())
}

/// Closes an empty escrow account, rent to `destination`.
pub(crate) fn close<'info>(
    token_program: AccountInfo<'info>,
    escrow: AccountInfo<'info>,
    destination: AccountInfo<'info>,
    match_info: AccountInfo<'info>,
    match_state: &Match,
) -> Result<()> {
    require!(
        read_token_account(&escrow)?.amount == 0,
        MatchError::InvariantViolation
    );

    let signer_seeds: &[&[&[u8]]] = &[&[
        MATCH_SEED,
        match_state.win_oracle.as_ref(),
        &[match_state.bump],
    ]];

    token::close_account(CpiContext::new_with_signer(
        token_program,
        CloseAccount {
            account: escrow,
            destination,
            authority: match_info,
        },
        signer_seeds,
    ))
}
