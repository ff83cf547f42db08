use anchor_lang::prelude::*;

use crate::constants::*;
use crate::instructions::escrow;
use crate::{
    errors::MatchError,
    events::{MatchCreated, MatchStateChanged, StakeRefunded, SurplusSwept, TransferDisbursed},
    state::{MatchState, Oracle, PayoutKind},
    utils::{find_escrow_account, find_owner_token_account, read_token_account, Authority},
    CreateMatch, CreateMatchArgs, DeactivateMatch, DrainMatch, InitializeMatch, StartMatch,
    UpdateMatch, UpdateMatchArgs,
};

pub fn create_match(ctx: Context<CreateMatch>, args: CreateMatchArgs) -> Result<()> {
    args.entry_validation.check_well_formed()?;

    let now = Clock::get()?.unix_timestamp;
    let m = &mut ctx.accounts.match_state;

    m.authority = ctx.accounts.authority.key();
    m.win_oracle = ctx.accounts.win_oracle.key();
    m.bump = ctx.bumps.match_state;
    m.state = MatchState::Draft;

    m.win_oracle_cooldown = args
        .win_oracle_cooldown
        .unwrap_or(DEFAULT_WIN_ORACLE_COOLDOWN);
    m.entry_validation = args.entry_validation;
    m.leave_allowed = args.leave_allowed;
    m.join_allowed_during_start = args.join_allowed_during_start;
    m.minimum_allowed_entry_time = args.minimum_allowed_entry_time.unwrap_or(0);
    m.desired_namespace_array_size = args.desired_namespace_array_size;

    m.stakes = Vec::new();
    m.escrow = Vec::new();
    m.applied_transfers = [0u8; 32];

    m.created_at = now;
    m.updated_at = now;
    m.version = INITIAL_VERSION;

    emit!(MatchCreated {
        match_key: m.key(),
        authority: m.authority,
        win_oracle: m.win_oracle,
    });
    Ok(())
}

pub fn update_match(ctx: Context<UpdateMatch>, args: UpdateMatchArgs) -> Result<()> {
    let m = &mut ctx.accounts.match_state;
    m.assert_authority(&ctx.accounts.authority.key())?;
    require!(
        m.state != MatchState::Deactivated,
        MatchError::MatchAlreadyDeactivated
    );

    // Settlement terms freeze once the match leaves Draft.
    if args.win_oracle_cooldown.is_some() || args.entry_validation.is_some() {
        require!(m.state == MatchState::Draft, MatchError::InvalidStateTransition);
    }
    if let Some(validation) = args.entry_validation {
        validation.check_well_formed()?;
        m.entry_validation = validation;
    }
    if let Some(cooldown) = args.win_oracle_cooldown {
        m.win_oracle_cooldown = cooldown;
    }
    if let Some(v) = args.leave_allowed {
        m.leave_allowed = v;
    }
    if let Some(v) = args.join_allowed_during_start {
        m.join_allowed_during_start = v;
    }
    if let Some(t) = args.minimum_allowed_entry_time {
        m.minimum_allowed_entry_time = t;
    }

    m.updated_at = Clock::get()?.unix_timestamp;
    Ok(())
}

pub fn initialize_match(ctx: Context<InitializeMatch>) -> Result<()> {
    let now = Clock::get()?.unix_timestamp;
    let oracle_key = ctx.accounts.win_oracle.key();
    let m = &mut ctx.accounts.match_state;
    m.assert_authority(&ctx.accounts.authority.key())?;

    let from = m.state;
    m.initialize(&oracle_key, now)?;

    emit!(MatchStateChanged {
        match_key: m.key(),
        from,
        to: m.state,
        timestamp: now,
    });
    Ok(())
}

pub fn start_match(ctx: Context<StartMatch>) -> Result<()> {
    let now = Clock::get()?.unix_timestamp;
    let m = &mut ctx.accounts.match_state;
    m.assert_authority(&ctx.accounts.authority.key())?;

    let from = m.state;
    m.start(now)?;

    emit!(MatchStateChanged {
        match_key: m.key(),
        from,
        to: m.state,
        timestamp: now,
    });
    Ok(())
}

/// Authority-forced deactivation. Applies the oracle's explicit transfers when
/// `apply_oracle_transfers` is set (settlement preconditions then apply),
/// refunds every remaining lot to its depositor and zeroes the escrow ledger.
/// Escrows keep only donated surplus, swept later by `drain_match`.
pub fn deactivate_match<'info>(
    ctx: Context<'_, '_, 'info, 'info, DeactivateMatch<'info>>,
    apply_oracle_transfers: bool,
) -> Result<()> {
    let now = Clock::get()?.unix_timestamp;
    let match_key = ctx.accounts.match_state.key();
    let remaining = ctx.remaining_accounts;

    ctx.accounts
        .match_state
        .assert_authority(&ctx.accounts.authority.key())?;
    ctx.accounts.match_state.assert_active()?;

    // Refuse to move anything out of a drifted record.
    let mut held: Vec<(Pubkey, u64)> = Vec::with_capacity(ctx.accounts.match_state.escrow.len());
    for e in ctx.accounts.match_state.escrow.iter() {
        let ai = find_escrow_account(remaining, ctx.program_id, &match_key, &e.mint)?;
        let amount = read_token_account(ai)?.amount;
        ctx.accounts.match_state.assert_conserved(&e.mint, amount)?;
        held.push((e.mint, amount));
    }

    let oracle = if apply_oracle_transfers {
        let ai = ctx.accounts.win_oracle.to_account_info();
        require_keys_eq!(*ai.owner, crate::ID, MatchError::OracleMismatch);
        let data = ai.try_borrow_data()?;
        let mut slice: &[u8] = &data;
        Some(Oracle::try_deserialize(&mut slice)?)
    } else {
        None
    };

    let from = ctx.accounts.match_state.state;
    let payouts = ctx.accounts.match_state.settle(oracle.as_ref(), now)?;

    let match_info = ctx.accounts.match_state.to_account_info();
    let token_program = ctx.accounts.token_program.to_account_info();
    for p in payouts.iter().filter(|p| p.amount > 0) {
        let escrow_ai = find_escrow_account(remaining, ctx.program_id, &match_key, &p.mint)?;
        let dest_ai = find_owner_token_account(remaining, &p.recipient, &p.mint)?;
        escrow::release(
            token_program.clone(),
            escrow_ai.clone(),
            dest_ai.clone(),
            match_info.clone(),
            &ctx.accounts.match_state,
            p.amount,
        )?;

        match p.kind {
            PayoutKind::Transfer { index } => emit!(TransferDisbursed {
                match_key,
                index,
                mint: p.mint,
                recipient: p.recipient,
                amount: p.amount,
            }),
            PayoutKind::Refund => emit!(StakeRefunded {
                match_key,
                mint: p.mint,
                recipient: p.recipient,
                amount: p.amount,
            }),
        }
    }

    // Each escrow keeps only its surplus once the ledger is swept.
    for (mint, before) in held {
        let paid = payouts
            .iter()
            .filter(|p| p.mint == mint)
            .try_fold(0u64, |acc, p| acc.checked_add(p.amount))
            .ok_or_else(|| error!(MatchError::MathOverflow))?;
        let ai = find_escrow_account(remaining, ctx.program_id, &match_key, &mint)?;
        escrow::expect_balance(ai.key, before.checked_sub(paid), read_token_account(ai)?.amount)?;
    }

    msg!(
        "match {} deactivated: {} payouts, oracle transfers applied={}",
        match_key,
        payouts.len(),
        apply_oracle_transfers
    );
    emit!(MatchStateChanged {
        match_key,
        from,
        to: MatchState::Deactivated,
        timestamp: now,
    });
    Ok(())
}

pub fn drain_match<'info>(ctx: Context<'_, '_, 'info, 'info, DrainMatch<'info>>) -> Result<()> {
    let match_key = ctx.accounts.match_state.key();
    let m = &ctx.accounts.match_state;
    m.assert_authority(&ctx.accounts.authority.key())?;
    require!(
        m.state == MatchState::Deactivated,
        MatchError::InvalidStateTransition
    );

    let authority = ctx.accounts.authority.key();
    let remaining = ctx.remaining_accounts;
    let match_info = m.to_account_info();
    for e in m.escrow.iter() {
        require!(e.amount == 0, MatchError::InvariantViolation);
        let escrow_ai = find_escrow_account(remaining, ctx.program_id, &match_key, &e.mint)?;

        // Tokens sent to the escrow outside of a join belong to no participant.
        let surplus = m.escrow_surplus(&e.mint, read_token_account(escrow_ai)?.amount);
        if surplus > 0 {
            let dest_ai = find_owner_token_account(remaining, &authority, &e.mint)?;
            escrow::release(
                ctx.accounts.token_program.to_account_info(),
                escrow_ai.clone(),
                dest_ai.clone(),
                match_info.clone(),
                m,
                surplus,
            )?;
            msg!("escrow {} surplus {} swept to authority", escrow_ai.key, surplus);
            emit!(SurplusSwept {
                match_key,
                mint: e.mint,
                recipient: authority,
                amount: surplus,
            });
        }

        escrow::close(
            ctx.accounts.token_program.to_account_info(),
            escrow_ai.clone(),
            ctx.accounts.authority.to_account_info(),
            match_info.clone(),
            m,
        )?;
    }

    msg!("match {} drained", match_key);
    // `close = authority` reclaims the match account itself.
    Ok(())
}
