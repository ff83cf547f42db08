use anchor_lang::prelude::*;

use crate::{
    constants::*,
    errors::MatchError,
    utils::{transfer_leaf, verify_proof, Authority},
};

// ----------------------------
// Entry validation rules
// ----------------------------

/// Amount constraint committed in an entry merkle leaf.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq, InitSpace)]
pub enum AmountConstraint {
    Any,
    Exact(u64),
    Positive,
    AtMost(u64),
}

impl AmountConstraint {
    /// (tag, value) pair hashed into the leaf. Tags are part of the v1 leaf format.
    pub fn encode(&self) -> (u8, u64) {
        match *self {
            AmountConstraint::Any => (0, 0),
            AmountConstraint::Exact(v) => (1, v),
            AmountConstraint::Positive => (2, 0),
            AmountConstraint::AtMost(v) => (3, v),
        }
    }

    pub fn admits(&self, amount: u64) -> bool {
        match *self {
            AmountConstraint::Any => true,
            AmountConstraint::Exact(v) => amount == v,
            AmountConstraint::Positive => amount > 0,
            AmountConstraint::AtMost(v) => amount <= v,
        }
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq, InitSpace)]
pub enum TokenType {
    Any,
    ExactAmount { amount: u64 },
    PositiveAmount,
    /// Amount constraint for this mint is proven against `root`.
    ProofRequired { root: [u8; 32] },
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq, InitSpace)]
pub struct EntryRule {
    pub mint: Pubkey,
    pub token_type: TokenType,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq, InitSpace)]
pub enum EntryValidation {
    Rules {
        #[max_len(MAX_ENTRY_RULES)]
        rules: Vec<EntryRule>,
    },
    Root {
        root: [u8; 32],
    },
}

impl EntryValidation {
    pub fn check_well_formed(&self) -> Result<()> {
        if let EntryValidation::Rules { rules } = self {
            require!(
                !rules.is_empty() && rules.len() <= MAX_ENTRY_RULES,
                MatchError::InvalidEntryValidation
            );
            for (i, rule) in rules.iter().enumerate() {
                require!(
                    rules[..i].iter().all(|r| r.mint != rule.mint),
                    MatchError::InvalidEntryValidation
                );
            }
        }
        Ok(())
    }
}

// ----------------------------
// Oracle
// ----------------------------

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq, InitSpace)]
pub struct TokenTransfer {
    /// Slot in the match's applied-transfer bitmap.
    pub index: u16,
    /// Depositor whose stake is debited.
    pub from: Pubkey,
    pub to: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq, InitSpace)]
pub enum OracleTransfers {
    List {
        #[max_len(MAX_EXPLICIT_TRANSFERS)]
        transfers: Vec<TokenTransfer>,
    },
    Root {
        root: [u8; 32],
    },
}

impl OracleTransfers {
    pub fn check_well_formed(&self) -> Result<()> {
        if let OracleTransfers::List { transfers } = self {
            require!(
                transfers.len() <= MAX_EXPLICIT_TRANSFERS,
                MatchError::InvalidTransferIndex
            );
            for (i, t) in transfers.iter().enumerate() {
                require!(t.index as usize == i, MatchError::InvalidTransferIndex);
            }
        }
        Ok(())
    }

    /// Confirms `transfer` is one of this outcome's instructions.
    pub fn resolve(&self, transfer: &TokenTransfer, proof: Option<&[[u8; 32]]>) -> Result<()> {
        require!(
            (transfer.index as usize) < MAX_ORACLE_TRANSFERS,
            MatchError::InvalidTransferIndex
        );
        match self {
            OracleTransfers::List { transfers } => {
                let listed = transfers
                    .get(transfer.index as usize)
                    .ok_or_else(|| error!(MatchError::TransferNotInOracle))?;
                require!(listed == transfer, MatchError::TransferNotInOracle);
            }
            OracleTransfers::Root { root } => {
                let proof = proof.ok_or_else(|| error!(MatchError::InvalidProof))?;
                require!(
                    verify_proof(transfer_leaf(transfer), proof, root),
                    MatchError::InvalidProof
                );
            }
        }
        Ok(())
    }
}

#[account]
#[derive(InitSpace)]
pub struct Oracle {
    pub seed: Pubkey,
    pub authority: Pubkey,
    pub bump: u8,

    pub finalized: bool,
    pub finalized_at: i64,

    pub transfers: OracleTransfers,

    pub created_at: i64,
    pub updated_at: i64,
    pub version: u16,
}

impl Authority for Oracle {
    fn authority(&self) -> &Pubkey {
        &self.authority
    }
}

impl Oracle {
    pub fn update(&mut self, transfers: OracleTransfers, now: i64) -> Result<()> {
        require!(!self.finalized, MatchError::AlreadyFinalized);
        transfers.check_well_formed()?;
        self.transfers = transfers;
        self.updated_at = now;
        Ok(())
    }

    /// One-shot. A second call fails so duplicate settlement races surface.
    pub fn finalize(&mut self, now: i64) -> Result<()> {
        require!(!self.finalized, MatchError::AlreadyFinalized);
        self.finalized = true;
        self.finalized_at = now;
        self.updated_at = now;
        Ok(())
    }

    pub fn assert_settleable(&self, cooldown: u64, now: i64) -> Result<()> {
        require!(self.finalized, MatchError::OracleNotFinalized);
        let cooldown = i64::try_from(cooldown).map_err(|_| error!(MatchError::MathOverflow))?;
        let ready_at = self
            .finalized_at
            .checked_add(cooldown)
            .ok_or_else(|| error!(MatchError::MathOverflow))?;
        require!(now >= ready_at, MatchError::OracleCooldownNotElapsed);
        Ok(())
    }
}

// ----------------------------
// Match
// ----------------------------

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq, InitSpace)]
pub enum MatchState {
    Draft,
    Initialized,
    Started,
    Deactivated,
}

impl MatchState {
    pub fn can_advance_to(self, next: MatchState) -> bool {
        matches!(
            (self, next),
            (MatchState::Draft, MatchState::Initialized)
                | (MatchState::Initialized, MatchState::Started)
                | (MatchState::Draft, MatchState::Deactivated)
                | (MatchState::Initialized, MatchState::Deactivated)
                | (MatchState::Started, MatchState::Deactivated)
        )
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq, InitSpace)]
pub struct ParticipantStake {
    pub participant: Pubkey,
    pub mint: Pubkey,
    /// Lot number; a participant may hold several lots of one mint.
    pub index: u64,
    pub amount: u64,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq, InitSpace)]
pub struct EscrowBalance {
    pub mint: Pubkey,
    pub amount: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayoutKind {
    Transfer { index: u16 },
    Refund,
}

/// One escrow -> recipient movement produced by settlement bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Payout {
    pub kind: PayoutKind,
    pub mint: Pubkey,
    pub recipient: Pubkey,
    pub amount: u64,
}

#[account]
#[derive(InitSpace)]
pub struct Match {
    pub authority: Pubkey,
    pub win_oracle: Pubkey,
    pub bump: u8,

    pub state: MatchState,

    /// Seconds that must pass after oracle finalization before settlement.
    pub win_oracle_cooldown: u64,
    pub entry_validation: EntryValidation,

    pub leave_allowed: bool,
    pub join_allowed_during_start: bool,
    pub minimum_allowed_entry_time: i64,

    // bookkeeping only
    pub desired_namespace_array_size: u16,

    #[max_len(MAX_STAKES)]
    pub stakes: Vec<ParticipantStake>,

    #[max_len(MAX_MINTS)]
    pub escrow: Vec<EscrowBalance>,

    // bit i set => oracle transfer i disbursed
    pub applied_transfers: [u8; 32],

    pub created_at: i64,
    pub updated_at: i64,
    pub version: u16,
}

impl Authority for Match {
    fn authority(&self) -> &Pubkey {
        &self.authority
    }
}

impl Match {
    // -------------------------
    // State machine
    // -------------------------
    pub fn transition(&mut self, next: MatchState, now: i64) -> Result<()> {
        self.assert_active()?;
        require!(
            self.state.can_advance_to(next),
            MatchError::InvalidStateTransition
        );
        self.state = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn initialize(&mut self, oracle_key: &Pubkey, now: i64) -> Result<()> {
        require_keys_eq!(self.win_oracle, *oracle_key, MatchError::OracleMismatch);
        self.entry_validation.check_well_formed()?;
        self.transition(MatchState::Initialized, now)
    }

    pub fn start(&mut self, now: i64) -> Result<()> {
        self.transition(MatchState::Started, now)
    }

    pub fn assert_join_allowed(&self, now: i64) -> Result<()> {
        require!(
            now >= self.minimum_allowed_entry_time,
            MatchError::JoinWindowNotOpen
        );
        match self.state {
            MatchState::Deactivated => err!(MatchError::JoinNotAllowed),
            MatchState::Started if !self.join_allowed_during_start => {
                err!(MatchError::JoinNotAllowed)
            }
            _ => Ok(()),
        }
    }

    /// Join gates in order: window, state, then a non-zero amount.
    pub fn assert_join(&self, now: i64, amount: u64) -> Result<()> {
        self.assert_join_allowed(now)?;
        require!(amount > 0, MatchError::InvalidAmount);
        Ok(())
    }

    pub fn assert_active(&self) -> Result<()> {
        require!(
            self.state != MatchState::Deactivated,
            MatchError::MatchAlreadyDeactivated
        );
        Ok(())
    }

    pub fn assert_leave_allowed(&self) -> Result<()> {
        require!(
            self.leave_allowed || self.state == MatchState::Deactivated,
            MatchError::LeaveNotAllowed
        );
        Ok(())
    }

    // -------------------------
    // Stake records
    // -------------------------
    fn lot_position(&self, participant: &Pubkey, mint: &Pubkey, index: u64) -> Option<usize> {
        self.stakes
            .iter()
            .position(|s| s.participant == *participant && s.mint == *mint && s.index == index)
    }

    pub fn stake_of(&self, participant: &Pubkey, mint: &Pubkey, index: u64) -> u64 {
        self.lot_position(participant, mint, index)
            .map_or(0, |i| self.stakes[i].amount)
    }

    pub fn staked_total(&self, mint: &Pubkey) -> Result<u64> {
        self.stakes
            .iter()
            .filter(|s| s.mint == *mint)
            .try_fold(0u64, |acc, s| acc.checked_add(s.amount))
            .ok_or_else(|| error!(MatchError::MathOverflow))
    }

    fn lots_held_by(&self, participant: &Pubkey) -> usize {
        self.stakes
            .iter()
            .filter(|s| s.participant == *participant)
            .count()
    }

    pub fn has_outstanding_stake(&self) -> bool {
        self.stakes.iter().any(|s| s.amount > 0)
    }

    /// Merges `amount` into the lot and credits the escrow ledger. Callers move
    /// the tokens in the same instruction.
    pub fn record_join(
        &mut self,
        participant: &Pubkey,
        mint: &Pubkey,
        index: u64,
        amount: u64,
    ) -> Result<()> {
        require!(amount > 0, MatchError::InvalidAmount);
        // Every check runs before the first write.
        self.escrow_balance(mint)
            .checked_add(amount)
            .ok_or_else(|| error!(MatchError::MathOverflow))?;
        require!(
            self.escrow.len() < MAX_MINTS || self.escrow.iter().any(|e| e.mint == *mint),
            MatchError::TooManyMints
        );
        let lot = self.lot_position(participant, mint, index);
        if lot.is_none() {
            require!(
                self.lots_held_by(participant) < MAX_LOTS_PER_PARTICIPANT,
                MatchError::TooManyLots
            );
            require!(self.stakes.len() < MAX_STAKES, MatchError::TooManyStakes);
        }

        match lot {
            Some(i) => self.stakes[i].amount += amount,
            None => self.stakes.push(ParticipantStake {
                participant: *participant,
                mint: *mint,
                index,
                amount,
            }),
        }
        self.credit_escrow(mint, amount)
    }

    pub fn record_leave(
        &mut self,
        participant: &Pubkey,
        mint: &Pubkey,
        index: u64,
        amount: u64,
    ) -> Result<()> {
        require!(amount > 0, MatchError::InvalidAmount);
        let i = self
            .lot_position(participant, mint, index)
            .ok_or_else(|| error!(MatchError::InsufficientStake))?;
        require!(self.stakes[i].amount >= amount, MatchError::InsufficientStake);
        self.debit_lot(i, amount);
        self.debit_escrow(mint, amount)
    }

    fn debit_lot(&mut self, i: usize, amount: u64) {
        self.stakes[i].amount -= amount;
        if self.stakes[i].amount == 0 {
            self.stakes.remove(i);
        }
    }

    // -------------------------
    // Escrow ledger
    // -------------------------
    pub fn escrow_balance(&self, mint: &Pubkey) -> u64 {
        self.escrow
            .iter()
            .find(|e| e.mint == *mint)
            .map_or(0, |e| e.amount)
    }

    fn credit_escrow(&mut self, mint: &Pubkey, amount: u64) -> Result<()> {
        match self.escrow.iter_mut().find(|e| e.mint == *mint) {
            Some(entry) => {
                entry.amount = entry
                    .amount
                    .checked_add(amount)
                    .ok_or_else(|| error!(MatchError::MathOverflow))?;
            }
            None => {
                require!(self.escrow.len() < MAX_MINTS, MatchError::TooManyMints);
                self.escrow.push(EscrowBalance { mint: *mint, amount });
            }
        }
        Ok(())
    }

    fn debit_escrow(&mut self, mint: &Pubkey, amount: u64) -> Result<()> {
        let entry = self
            .escrow
            .iter_mut()
            .find(|e| e.mint == *mint)
            .ok_or_else(|| error!(MatchError::InvariantViolation))?;
        entry.amount = entry
            .amount
            .checked_sub(amount)
            .ok_or_else(|| error!(MatchError::InvariantViolation))?;
        Ok(())
    }

    /// Stake records must equal the ledger for `mint`, and the custodian must
    /// hold at least the ledger. Tokens sent to the escrow from outside are
    /// surplus, swept to the authority by `drain_match`.
    pub fn assert_conserved(&self, mint: &Pubkey, custodied: u64) -> Result<()> {
        let ledger = self.escrow_balance(mint);
        if self.staked_total(mint)? != ledger || custodied < ledger {
            msg!(
                "escrow invariant violated: mint={} stakes_ledger={} custodied={}",
                mint,
                ledger,
                custodied
            );
            return err!(MatchError::InvariantViolation);
        }
        Ok(())
    }

    pub fn escrow_surplus(&self, mint: &Pubkey, custodied: u64) -> u64 {
        custodied.saturating_sub(self.escrow_balance(mint))
    }

    // -------------------------
    // Settlement
    // -------------------------
    pub fn is_transfer_applied(&self, index: u16) -> bool {
        let i = index as usize;
        i < MAX_ORACLE_TRANSFERS && self.applied_transfers[i / 8] & (1 << (i % 8)) != 0
    }

    fn mark_transfer_applied(&mut self, index: u16) {
        let i = index as usize;
        self.applied_transfers[i / 8] |= 1 << (i % 8);
    }

    /// Debits `transfer.from`'s lots of `transfer.mint` in ascending lot order.
    pub fn apply_transfer(&mut self, transfer: &TokenTransfer) -> Result<Payout> {
        require!(
            (transfer.index as usize) < MAX_ORACLE_TRANSFERS,
            MatchError::InvalidTransferIndex
        );
        require!(
            !self.is_transfer_applied(transfer.index),
            MatchError::TransferAlreadyApplied
        );

        let mut lots: Vec<(u64, usize)> = self
            .stakes
            .iter()
            .enumerate()
            .filter(|(_, s)| s.participant == transfer.from && s.mint == transfer.mint)
            .map(|(i, s)| (s.index, i))
            .collect();
        lots.sort_unstable();

        let available = lots
            .iter()
            .try_fold(0u64, |acc, (_, i)| acc.checked_add(self.stakes[*i].amount))
            .ok_or_else(|| error!(MatchError::MathOverflow))?;
        require!(available >= transfer.amount, MatchError::InsufficientStake);

        let mut remaining = transfer.amount;
        for (_, i) in &lots {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(self.stakes[*i].amount);
            self.stakes[*i].amount -= take;
            remaining -= take;
        }
        self.stakes.retain(|s| s.amount > 0);
        self.debit_escrow(&transfer.mint, transfer.amount)?;
        self.mark_transfer_applied(transfer.index);

        Ok(Payout {
            kind: PayoutKind::Transfer {
                index: transfer.index,
            },
            mint: transfer.mint,
            recipient: transfer.to,
            amount: transfer.amount,
        })
    }

    /// Terminal sweep. Applies the oracle's explicit transfers when `oracle` is
    /// given, refunds every remaining lot to its depositor and deactivates.
    pub fn settle(&mut self, oracle: Option<&Oracle>, now: i64) -> Result<Vec<Payout>> {
        self.assert_active()?;

        let mut payouts = Vec::new();
        if let Some(oracle) = oracle {
            oracle.assert_settleable(self.win_oracle_cooldown, now)?;
            if let OracleTransfers::List { transfers } = &oracle.transfers {
                for t in transfers {
                    if !self.is_transfer_applied(t.index) {
                        payouts.push(self.apply_transfer(t)?);
                    }
                }
            }
        }

        for stake in std::mem::take(&mut self.stakes) {
            self.debit_escrow(&stake.mint, stake.amount)?;
            payouts.push(Payout {
                kind: PayoutKind::Refund,
                mint: stake.mint,
                recipient: stake.participant,
                amount: stake.amount,
            });
        }

        require!(
            self.escrow.iter().all(|e| e.amount == 0),
            MatchError::InvariantViolation
        );
        self.transition(MatchState::Deactivated, now)?;
        Ok(payouts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn code_of(res: Result<impl std::fmt::Debug>) -> u32 {
        match res.expect_err("expected error") {
            anchor_lang::error::Error::AnchorError(e) => e.error_code_number,
            other => panic!("unexpected error {other:?}"),
        }
    }

    fn assert_fails<T: std::fmt::Debug>(res: Result<T>, expected: MatchError) {
        assert_eq!(code_of(res), u32::from(expected));
    }

    fn new_oracle(transfers: OracleTransfers) -> Oracle {
        Oracle {
            seed: Pubkey::new_unique(),
            authority: Pubkey::new_unique(),
            bump: 255,
            finalized: false,
            finalized_at: 0,
            transfers,
            created_at: 0,
            updated_at: 0,
            version: INITIAL_VERSION,
        }
    }

    fn new_match(mints: &[Pubkey]) -> Match {
        Match {
            authority: Pubkey::new_unique(),
            win_oracle: Pubkey::new_unique(),
            bump: 255,
            state: MatchState::Draft,
            win_oracle_cooldown: 100,
            entry_validation: EntryValidation::Rules {
                rules: mints
                    .iter()
                    .map(|m| EntryRule {
                        mint: *m,
                        token_type: TokenType::Any,
                    })
                    .collect(),
            },
            leave_allowed: true,
            join_allowed_during_start: false,
            minimum_allowed_entry_time: 0,
            desired_namespace_array_size: 0,
            stakes: vec![],
            escrow: vec![],
            applied_transfers: [0u8; 32],
            created_at: 0,
            updated_at: 0,
            version: INITIAL_VERSION,
        }
    }

    /// Minimal token custodian: balances keyed by (owner, mint).
    #[derive(Default)]
    struct Custodian {
        balances: HashMap<(Pubkey, Pubkey), u64>,
    }

    impl Custodian {
        fn balance(&self, owner: &Pubkey, mint: &Pubkey) -> u64 {
            *self.balances.get(&(*owner, *mint)).unwrap_or(&0)
        }

        fn transfer(&mut self, from: &Pubkey, to: &Pubkey, mint: &Pubkey, amount: u64) {
            let src = self.balances.entry((*from, *mint)).or_default();
            assert!(*src >= amount, "custodian overdraft");
            *src -= amount;
            *self.balances.entry((*to, *mint)).or_default() += amount;
        }

        fn join(
            &mut self,
            m: &mut Match,
            escrow: &Pubkey,
            who: &Pubkey,
            mint: &Pubkey,
            index: u64,
            amount: u64,
        ) {
            m.record_join(who, mint, index, amount).unwrap();
            self.transfer(who, escrow, mint, amount);
            m.assert_conserved(mint, self.balance(escrow, mint)).unwrap();
        }

        fn pay(&mut self, escrow: &Pubkey, payouts: &[Payout]) {
            for p in payouts {
                self.transfer(escrow, &p.recipient, &p.mint, p.amount);
            }
        }
    }

    #[test]
    fn state_advances_forward_only() {
        let mut m = new_match(&[Pubkey::new_unique()]);
        let oracle = m.win_oracle;

        assert_fails(m.start(1), MatchError::InvalidStateTransition);
        m.initialize(&oracle, 1).unwrap();
        assert_eq!(m.state, MatchState::Initialized);
        assert_fails(m.initialize(&oracle, 2), MatchError::InvalidStateTransition);
        m.start(3).unwrap();
        assert_eq!(m.state, MatchState::Started);
        assert_fails(m.transition(MatchState::Initialized, 4), MatchError::InvalidStateTransition);
        assert_fails(m.transition(MatchState::Draft, 4), MatchError::InvalidStateTransition);

        m.settle(None, 5).unwrap();
        assert_eq!(m.state, MatchState::Deactivated);
        for next in [
            MatchState::Draft,
            MatchState::Initialized,
            MatchState::Started,
            MatchState::Deactivated,
        ] {
            assert_fails(m.transition(next, 6), MatchError::MatchAlreadyDeactivated);
        }
        assert_eq!(m.updated_at, 5);
    }

    #[test]
    fn draft_can_be_deactivated_directly() {
        let mut m = new_match(&[Pubkey::new_unique()]);
        assert!(m.settle(None, 1).unwrap().is_empty());
        assert_eq!(m.state, MatchState::Deactivated);
    }

    #[test]
    fn initialize_checks_oracle_and_rules() {
        let mut m = new_match(&[]);
        let oracle = m.win_oracle;
        assert_fails(m.initialize(&Pubkey::new_unique(), 1), MatchError::OracleMismatch);
        assert_fails(m.initialize(&oracle, 1), MatchError::InvalidEntryValidation);

        let dup = Pubkey::new_unique();
        let mut m = new_match(&[dup, dup]);
        let oracle = m.win_oracle;
        assert_fails(m.initialize(&oracle, 1), MatchError::InvalidEntryValidation);
        assert_eq!(m.state, MatchState::Draft);

        let mut m = new_match(&[]);
        m.entry_validation = EntryValidation::Root { root: [7u8; 32] };
        let oracle = m.win_oracle;
        m.initialize(&oracle, 1).unwrap();
    }

    #[test]
    fn late_join_rejected_before_entry_time() {
        let t = 1_700_000_000;
        let mut m = new_match(&[Pubkey::new_unique()]);
        m.minimum_allowed_entry_time = t + 3600;
        assert_fails(m.assert_join_allowed(t), MatchError::JoinWindowNotOpen);
        m.assert_join_allowed(t + 3600).unwrap();
    }

    #[test]
    fn join_gates_precede_amount_check() {
        let t = 1_700_000_000;
        let mut m = new_match(&[Pubkey::new_unique()]);
        m.minimum_allowed_entry_time = t + 3600;
        assert_fails(m.assert_join(t, 0), MatchError::JoinWindowNotOpen);
        assert_fails(m.assert_join(t + 3600, 0), MatchError::InvalidAmount);
        m.assert_join(t + 3600, 1).unwrap();

        m.settle(None, t).unwrap();
        assert_fails(m.assert_join(t + 3600, 0), MatchError::JoinNotAllowed);
    }

    #[test]
    fn deactivated_match_reports_terminal_state() {
        let mut m = new_match(&[Pubkey::new_unique()]);
        m.assert_active().unwrap();
        m.settle(None, 1).unwrap();
        assert_fails(m.assert_active(), MatchError::MatchAlreadyDeactivated);
        assert_fails(m.settle(None, 2), MatchError::MatchAlreadyDeactivated);
    }

    #[test]
    fn join_gated_by_state() {
        let mut m = new_match(&[Pubkey::new_unique()]);
        let oracle = m.win_oracle;
        m.assert_join_allowed(0).unwrap();
        m.initialize(&oracle, 0).unwrap();
        m.assert_join_allowed(0).unwrap();
        m.start(0).unwrap();
        assert_fails(m.assert_join_allowed(0), MatchError::JoinNotAllowed);
        m.join_allowed_during_start = true;
        m.assert_join_allowed(0).unwrap();
        m.settle(None, 0).unwrap();
        assert_fails(m.assert_join_allowed(0), MatchError::JoinNotAllowed);
    }

    #[test]
    fn leave_gated_until_deactivated() {
        let mut m = new_match(&[Pubkey::new_unique()]);
        m.leave_allowed = false;
        assert_fails(m.assert_leave_allowed(), MatchError::LeaveNotAllowed);
        m.state = MatchState::Deactivated;
        m.assert_leave_allowed().unwrap();
    }

    #[test]
    fn join_merges_lots_and_leave_removes_empty() {
        let mint = Pubkey::new_unique();
        let alice = Pubkey::new_unique();
        let mut m = new_match(&[mint]);

        m.record_join(&alice, &mint, 0, 40).unwrap();
        m.record_join(&alice, &mint, 0, 60).unwrap();
        m.record_join(&alice, &mint, 1, 5).unwrap();
        assert_eq!(m.stake_of(&alice, &mint, 0), 100);
        assert_eq!(m.stakes.len(), 2);
        assert_eq!(m.escrow_balance(&mint), 105);

        assert_fails(m.record_leave(&alice, &mint, 1, 6), MatchError::InsufficientStake);
        assert_fails(m.record_leave(&alice, &mint, 7, 1), MatchError::InsufficientStake);
        m.record_leave(&alice, &mint, 1, 5).unwrap();
        assert_eq!(m.stakes.len(), 1);
        assert_eq!(m.escrow_balance(&mint), 100);
        m.assert_conserved(&mint, 100).unwrap();
    }

    #[test]
    fn zero_amounts_rejected() {
        let mint = Pubkey::new_unique();
        let alice = Pubkey::new_unique();
        let mut m = new_match(&[mint]);
        assert_fails(m.record_join(&alice, &mint, 0, 0), MatchError::InvalidAmount);
        assert_fails(m.record_leave(&alice, &mint, 0, 0), MatchError::InvalidAmount);
    }

    #[test]
    fn stake_capacity_enforced() {
        let mint = Pubkey::new_unique();
        let mut m = new_match(&[mint]);
        let holders = MAX_STAKES / MAX_LOTS_PER_PARTICIPANT;
        let mut last = Pubkey::default();
        for _ in 0..holders {
            last = Pubkey::new_unique();
            for i in 0..MAX_LOTS_PER_PARTICIPANT as u64 {
                m.record_join(&last, &mint, i, 1).unwrap();
            }
        }
        assert_eq!(m.stakes.len(), MAX_STAKES);
        assert_fails(
            m.record_join(&Pubkey::new_unique(), &mint, 0, 1),
            MatchError::TooManyStakes,
        );
        // merging into an existing lot still works at capacity
        m.record_join(&last, &mint, 0, 1).unwrap();
    }

    #[test]
    fn one_participant_cannot_exhaust_lots() {
        let mint = Pubkey::new_unique();
        let (spammer, honest) = (Pubkey::new_unique(), Pubkey::new_unique());
        let mut m = new_match(&[mint]);

        for i in 0..MAX_LOTS_PER_PARTICIPANT as u64 {
            m.record_join(&spammer, &mint, i, 1).unwrap();
        }
        for i in MAX_LOTS_PER_PARTICIPANT as u64..MAX_STAKES as u64 {
            assert_fails(m.record_join(&spammer, &mint, i, 1), MatchError::TooManyLots);
        }
        assert_eq!(m.stakes.len(), MAX_LOTS_PER_PARTICIPANT);

        m.record_join(&honest, &mint, 0, 1_000_000).unwrap();
        assert_eq!(m.stake_of(&honest, &mint, 0), 1_000_000);
        m.record_join(&spammer, &mint, 0, 1).unwrap();
        m.assert_conserved(&mint, 1_000_000 + MAX_LOTS_PER_PARTICIPANT as u64 + 1)
            .unwrap();
    }

    #[test]
    fn escrow_conserved_across_join_leave_sequences() {
        let mints = [Pubkey::new_unique(), Pubkey::new_unique()];
        let people = [Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique()];
        let escrow = Pubkey::new_unique();
        let mut m = new_match(&mints);
        let mut custodian = Custodian::default();
        for p in &people {
            for mint in &mints {
                custodian.balances.insert((*p, *mint), 1_000);
            }
        }

        // deterministic pseudo-random walk
        let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let who = &people[(seed % 3) as usize];
            let mint = &mints[((seed >> 8) % 2) as usize];
            let index = (seed >> 16) % 3;
            let amount = (seed >> 24) % 50 + 1;

            if (seed >> 40) % 2 == 0 {
                if custodian.balance(who, mint) >= amount
                    && m.record_join(who, mint, index, amount).is_ok()
                {
                    custodian.transfer(who, &escrow, mint, amount);
                }
            } else if m.record_leave(who, mint, index, amount).is_ok() {
                custodian.transfer(&escrow, who, mint, amount);
            }

            for mint in &mints {
                m.assert_conserved(mint, custodian.balance(&escrow, mint)).unwrap();
            }
        }
    }

    #[test]
    fn join_then_leave_restores_balances() {
        let mint = Pubkey::new_unique();
        let alice = Pubkey::new_unique();
        let escrow = Pubkey::new_unique();
        let mut m = new_match(&[mint]);
        let mut custodian = Custodian::default();
        custodian.balances.insert((alice, mint), 500);

        custodian.join(&mut m, &escrow, &alice, &mint, 2, 500);
        m.record_leave(&alice, &mint, 2, 500).unwrap();
        custodian.transfer(&escrow, &alice, &mint, 500);

        assert_eq!(custodian.balance(&alice, &mint), 500);
        assert_eq!(custodian.balance(&escrow, &mint), 0);
        assert!(m.stakes.is_empty());
        assert_eq!(m.escrow_balance(&mint), 0);
    }

    #[test]
    fn conservation_detects_drift() {
        let mint = Pubkey::new_unique();
        let alice = Pubkey::new_unique();
        let mut m = new_match(&[mint]);
        m.record_join(&alice, &mint, 0, 10).unwrap();
        assert_fails(m.assert_conserved(&mint, 9), MatchError::InvariantViolation);
        m.stakes[0].amount = 9;
        assert_fails(m.assert_conserved(&mint, 10), MatchError::InvariantViolation);
    }

    #[test]
    fn donated_tokens_do_not_halt_settlement() {
        let mint = Pubkey::new_unique();
        let (p1, p2, outsider) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        let escrow = Pubkey::new_unique();
        let mut custodian = Custodian::default();
        custodian.balances.insert((p1, mint), 500);
        custodian.balances.insert((p2, mint), 500);
        custodian.balances.insert((outsider, mint), 1);

        let mut m = new_match(&[mint]);
        custodian.join(&mut m, &escrow, &p1, &mint, 0, 500);
        custodian.join(&mut m, &escrow, &p2, &mint, 0, 500);
        custodian.transfer(&outsider, &escrow, &mint, 1);

        let held = custodian.balance(&escrow, &mint);
        m.assert_conserved(&mint, held).unwrap();
        assert_eq!(m.escrow_surplus(&mint, held), 1);

        // joins and leaves keep working around the surplus
        m.record_leave(&p2, &mint, 0, 200).unwrap();
        custodian.transfer(&escrow, &p2, &mint, 200);
        m.assert_conserved(&mint, custodian.balance(&escrow, &mint)).unwrap();

        let payouts = m.settle(None, 1).unwrap();
        custodian.pay(&escrow, &payouts);
        assert_eq!(m.state, MatchState::Deactivated);
        assert_eq!(custodian.balance(&p1, &mint), 500);
        assert_eq!(custodian.balance(&p2, &mint), 500);
        assert_eq!(m.escrow_balance(&mint), 0);

        let left = custodian.balance(&escrow, &mint);
        m.assert_conserved(&mint, left).unwrap();
        assert_eq!(m.escrow_surplus(&mint, left), 1);
    }

    #[test]
    fn finalize_twice_rejected_and_transfers_frozen() {
        let t = TokenTransfer {
            index: 0,
            from: Pubkey::new_unique(),
            to: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            amount: 1,
        };
        let mut oracle = new_oracle(OracleTransfers::List { transfers: vec![t.clone()] });
        oracle.finalize(10).unwrap();
        let frozen = oracle.transfers.clone();

        assert_fails(oracle.finalize(11), MatchError::AlreadyFinalized);
        assert_fails(
            oracle.update(OracleTransfers::Root { root: [1u8; 32] }, 12),
            MatchError::AlreadyFinalized,
        );
        assert_eq!(oracle.transfers, frozen);
        assert_eq!(oracle.finalized_at, 10);
    }

    #[test]
    fn oracle_list_indices_must_be_positional() {
        let mut oracle = new_oracle(OracleTransfers::List { transfers: vec![] });
        let t = TokenTransfer {
            index: 1,
            from: Pubkey::new_unique(),
            to: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            amount: 1,
        };
        assert_fails(
            oracle.update(OracleTransfers::List { transfers: vec![t] }, 1),
            MatchError::InvalidTransferIndex,
        );
    }

    #[test]
    fn settlement_waits_for_finalize_and_cooldown() {
        let mut oracle = new_oracle(OracleTransfers::List { transfers: vec![] });
        assert_fails(oracle.assert_settleable(100, 1_000), MatchError::OracleNotFinalized);
        oracle.finalize(1_000).unwrap();
        assert_fails(oracle.assert_settleable(100, 1_099), MatchError::OracleCooldownNotElapsed);
        oracle.assert_settleable(100, 1_100).unwrap();
        oracle.assert_settleable(0, 1_000).unwrap();
    }

    #[test]
    fn transfer_debits_lots_in_index_order() {
        let mint = Pubkey::new_unique();
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        let mut m = new_match(&[mint]);
        m.record_join(&alice, &mint, 5, 30).unwrap();
        m.record_join(&alice, &mint, 1, 20).unwrap();

        let t = TokenTransfer { index: 9, from: alice, to: bob, mint, amount: 25 };
        let payout = m.apply_transfer(&t).unwrap();
        assert_eq!(payout.recipient, bob);
        assert_eq!(payout.kind, PayoutKind::Transfer { index: 9 });
        assert_eq!(m.stake_of(&alice, &mint, 1), 0);
        assert_eq!(m.stake_of(&alice, &mint, 5), 25);
        assert_eq!(m.stakes.len(), 1);
        assert!(m.is_transfer_applied(9));
        assert!(!m.is_transfer_applied(8));

        assert_fails(m.apply_transfer(&t), MatchError::TransferAlreadyApplied);
        let too_much = TokenTransfer { index: 10, amount: 26, ..t };
        assert_fails(m.apply_transfer(&too_much), MatchError::InsufficientStake);
        m.assert_conserved(&mint, 25).unwrap();
    }

    #[test]
    fn root_oracle_resolves_with_proof() {
        let a = TokenTransfer {
            index: 0,
            from: Pubkey::new_unique(),
            to: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            amount: 7,
        };
        let b = TokenTransfer { index: 1, amount: 8, ..a.clone() };
        let (la, lb) = (transfer_leaf(&a), transfer_leaf(&b));
        let root = crate::utils::hash_pair(&la, &lb);
        let transfers = OracleTransfers::Root { root };

        transfers.resolve(&a, Some(&[lb])).unwrap();
        transfers.resolve(&b, Some(&[la])).unwrap();
        assert_fails(transfers.resolve(&a, None), MatchError::InvalidProof);
        let forged = TokenTransfer { amount: 70, ..a.clone() };
        assert_fails(transfers.resolve(&forged, Some(&[lb])), MatchError::InvalidProof);

        let list = OracleTransfers::List { transfers: vec![a.clone()] };
        list.resolve(&a, None).unwrap();
        assert_fails(list.resolve(&forged, None), MatchError::TransferNotInOracle);
        assert_fails(list.resolve(&b, None), MatchError::TransferNotInOracle);
    }

    #[test]
    fn full_lifecycle_swaps_stakes() {
        let (x, y) = (Pubkey::new_unique(), Pubkey::new_unique());
        let (p1, p2) = (Pubkey::new_unique(), Pubkey::new_unique());
        let escrow = Pubkey::new_unique();
        let mut custodian = Custodian::default();
        custodian.balances.insert((p1, x), 1_000_000);
        custodian.balances.insert((p2, y), 1_000_000);

        let mut oracle = new_oracle(OracleTransfers::List { transfers: vec![] });
        let mut m = new_match(&[x, y]);
        m.win_oracle_cooldown = 100;
        m.leave_allowed = false;
        m.join_allowed_during_start = false;
        let oracle_key = m.win_oracle;

        m.initialize(&oracle_key, 0).unwrap();
        m.assert_join_allowed(1).unwrap();
        custodian.join(&mut m, &escrow, &p1, &x, 0, 1_000_000);
        custodian.join(&mut m, &escrow, &p2, &y, 0, 1_000_000);
        m.start(2).unwrap();

        assert_fails(m.assert_leave_allowed(), MatchError::LeaveNotAllowed);

        oracle
            .update(
                OracleTransfers::List {
                    transfers: vec![
                        TokenTransfer { index: 0, from: p1, to: p2, mint: x, amount: 1_000_000 },
                        TokenTransfer { index: 1, from: p2, to: p1, mint: y, amount: 1_000_000 },
                    ],
                },
                3,
            )
            .unwrap();
        oracle.finalize(10).unwrap();

        assert_fails(m.settle(Some(&oracle), 109), MatchError::OracleCooldownNotElapsed);
        assert_eq!(m.state, MatchState::Started);

        let payouts = m.settle(Some(&oracle), 110).unwrap();
        custodian.pay(&escrow, &payouts);

        assert_eq!(m.state, MatchState::Deactivated);
        assert_eq!(custodian.balance(&escrow, &x), 0);
        assert_eq!(custodian.balance(&escrow, &y), 0);
        assert_eq!(custodian.balance(&p2, &x), 1_000_000);
        assert_eq!(custodian.balance(&p1, &y), 1_000_000);
        assert_eq!(custodian.balance(&p1, &x), 0);
        assert!(payouts.iter().all(|p| p.kind != PayoutKind::Refund));
        m.assert_conserved(&x, 0).unwrap();
        m.assert_conserved(&y, 0).unwrap();
    }

    #[test]
    fn forced_deactivation_refunds_uncovered_stake() {
        let mint = Pubkey::new_unique();
        let (p1, p2) = (Pubkey::new_unique(), Pubkey::new_unique());
        let escrow = Pubkey::new_unique();
        let mut custodian = Custodian::default();
        custodian.balances.insert((p1, mint), 300);
        custodian.balances.insert((p2, mint), 300);

        let mut m = new_match(&[mint]);
        m.win_oracle_cooldown = 0;
        custodian.join(&mut m, &escrow, &p1, &mint, 0, 300);
        custodian.join(&mut m, &escrow, &p2, &mint, 0, 300);

        let mut oracle = new_oracle(OracleTransfers::List {
            transfers: vec![TokenTransfer { index: 0, from: p1, to: p2, mint, amount: 100 }],
        });
        oracle.finalize(5).unwrap();

        let payouts = m.settle(Some(&oracle), 5).unwrap();
        custodian.pay(&escrow, &payouts);

        assert_eq!(custodian.balance(&escrow, &mint), 0);
        assert_eq!(custodian.balance(&p1, &mint), 200);
        assert_eq!(custodian.balance(&p2, &mint), 400);
        assert_eq!(payouts.iter().filter(|p| p.kind == PayoutKind::Refund).count(), 2);
    }

    #[test]
    fn settle_skips_already_disbursed_transfers() {
        let mint = Pubkey::new_unique();
        let (p1, p2) = (Pubkey::new_unique(), Pubkey::new_unique());
        let mut m = new_match(&[mint]);
        m.win_oracle_cooldown = 0;
        m.record_join(&p1, &mint, 0, 50).unwrap();

        let t = TokenTransfer { index: 0, from: p1, to: p2, mint, amount: 50 };
        let mut oracle = new_oracle(OracleTransfers::List { transfers: vec![t.clone()] });
        oracle.finalize(1).unwrap();

        m.apply_transfer(&t).unwrap();
        assert!(!m.has_outstanding_stake());
        let payouts = m.settle(Some(&oracle), 1).unwrap();
        assert!(payouts.is_empty());
    }

    #[test]
    fn uncoverable_transfer_blocks_oracle_settlement() {
        let mint = Pubkey::new_unique();
        let (p1, p2) = (Pubkey::new_unique(), Pubkey::new_unique());
        let mut m = new_match(&[mint]);
        m.win_oracle_cooldown = 0;
        m.record_join(&p1, &mint, 0, 10).unwrap();

        let mut oracle = new_oracle(OracleTransfers::List {
            transfers: vec![TokenTransfer { index: 0, from: p1, to: p2, mint, amount: 11 }],
        });
        oracle.finalize(1).unwrap();

        // deactivate_match(apply_oracle_transfers = false) refunds instead
        assert_fails(m.settle(Some(&oracle), 1), MatchError::InsufficientStake);
        let mut m = new_match(&[mint]);
        m.record_join(&p1, &mint, 0, 10).unwrap();
        let payouts = m.settle(None, 1).unwrap();
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].recipient, p1);
    }
}
