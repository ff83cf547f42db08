use anchor_lang::prelude::*;

use crate::{
    errors::MatchError,
    state::{AmountConstraint, EntryValidation, TokenType},
    utils::{entry_leaf, verify_proof},
};

/// Leaf payload and sibling path proving `(mint, constraint)` is in an entry root.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct EntryProof {
    pub constraint: AmountConstraint,
    pub proof: Vec<[u8; 32]>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryRejection {
    MintNotWhitelisted,
    InvalidProof,
    AmountConstraintViolated,
}

impl From<EntryRejection> for MatchError {
    fn from(r: EntryRejection) -> Self {
        match r {
            EntryRejection::MintNotWhitelisted => MatchError::MintNotWhitelisted,
            EntryRejection::InvalidProof => MatchError::InvalidProof,
            EntryRejection::AmountConstraintViolated => MatchError::AmountConstraintViolated,
        }
    }
}

/// Decides whether `amount` of `mint` may be staked. Pure; safe to call for
/// dry runs off chain.
pub fn validate_entry(
    validation: &EntryValidation,
    mint: &Pubkey,
    amount: u64,
    proof: Option<&EntryProof>,
) -> std::result::Result<(), EntryRejection> {
    match validation {
        EntryValidation::Rules { rules } => {
            let rule = rules
                .iter()
                .find(|r| r.mint == *mint)
                .ok_or(EntryRejection::MintNotWhitelisted)?;
            let constraint = match rule.token_type {
                TokenType::Any => AmountConstraint::Any,
                TokenType::ExactAmount { amount } => AmountConstraint::Exact(amount),
                TokenType::PositiveAmount => AmountConstraint::Positive,
                TokenType::ProofRequired { root } => {
                    return check_proof(&root, mint, amount, proof);
                }
            };
            admit(&constraint, amount)
        }
        EntryValidation::Root { root } => check_proof(root, mint, amount, proof),
    }
}

fn check_proof(
    root: &[u8; 32],
    mint: &Pubkey,
    amount: u64,
    proof: Option<&EntryProof>,
) -> std::result::Result<(), EntryRejection> {
    let p = proof.ok_or(EntryRejection::InvalidProof)?;
    if !verify_proof(entry_leaf(mint, &p.constraint), &p.proof, root) {
        return Err(EntryRejection::InvalidProof);
    }
    admit(&p.constraint, amount)
}

fn admit(constraint: &AmountConstraint, amount: u64) -> std::result::Result<(), EntryRejection> {
    if constraint.admits(amount) {
        Ok(())
    } else {
        Err(EntryRejection::AmountConstraintViolated)
    }
}

/// On-chain wrapper mapping rejections into program errors.
pub fn require_entry(
    validation: &EntryValidation,
    mint: &Pubkey,
    amount: u64,
    proof: Option<&EntryProof>,
) -> Result<()> {
    validate_entry(validation, mint, amount, proof).map_err(|r| {
        msg!("entry rejected: mint={} amount={} reason={:?}", mint, amount, r);
        error!(MatchError::from(r))
    })
}
