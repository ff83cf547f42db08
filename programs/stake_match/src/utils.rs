use anchor_lang::prelude::*;
use anchor_spl::token::TokenAccount;
use solana_sha256_hasher::hashv;

use crate::{
    constants::MAX_PROOF_DEPTH,
    errors::MatchError,
    state::{AmountConstraint, TokenTransfer},
};

// -----------------
// Seeds / constants
// -----------------
pub const ORACLE_SEED: &[u8] = b"oracle_v1";
pub const MATCH_SEED: &[u8] = b"match_v1";
pub const ESCROW_SEED: &[u8] = b"escrow_v1";

pub const ENTRY_LEAF_DOMAIN: &[u8] = b"stake_match:entry_v1";
pub const TRANSFER_LEAF_DOMAIN: &[u8] = b"stake_match:transfer_v1";

const LEAF_PREFIX: &[u8] = &[0x00];
const NODE_PREFIX: &[u8] = &[0x01];

// -------------------------
// Authorization guard
// -------------------------

/// Records that carry a designated authority. Every mutating instruction
/// calls `assert_authority` first.
pub trait Authority {
    fn authority(&self) -> &Pubkey;

    fn assert_authority(&self, signer: &Pubkey) -> Result<()> {
        require_keys_eq!(*self.authority(), *signer, MatchError::Unauthorized);
        Ok(())
    }
}

// -------------------------
// Merkle leaves (format v1)
// -------------------------
pub fn entry_leaf(mint: &Pubkey, constraint: &AmountConstraint) -> [u8; 32] {
    let (tag, value) = constraint.encode();
    hashv(&[
        LEAF_PREFIX,
        ENTRY_LEAF_DOMAIN,
        mint.as_ref(),
        &[tag],
        value.to_le_bytes().as_ref(),
    ])
    .to_bytes()
}

pub fn transfer_leaf(transfer: &TokenTransfer) -> [u8; 32] {
    hashv(&[
        LEAF_PREFIX,
        TRANSFER_LEAF_DOMAIN,
        transfer.index.to_le_bytes().as_ref(),
        transfer.from.as_ref(),
        transfer.to.as_ref(),
        transfer.mint.as_ref(),
        transfer.amount.to_le_bytes().as_ref(),
    ])
    .to_bytes()
}

/// Internal node over a sorted pair, so proofs carry no left/right flags.
pub fn hash_pair(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    hashv(&[NODE_PREFIX, lo.as_ref(), hi.as_ref()]).to_bytes()
}

/// Folds `proof` over `leaf`. Returns `None` when the proof is deeper than
/// `MAX_PROOF_DEPTH`.
pub fn compute_root(leaf: [u8; 32], proof: &[[u8; 32]]) -> Option<[u8; 32]> {
    if proof.len() > MAX_PROOF_DEPTH {
        return None;
    }
    Some(proof.iter().fold(leaf, |acc, sibling| hash_pair(&acc, sibling)))
}

pub fn verify_proof(leaf: [u8; 32], proof: &[[u8; 32]], root: &[u8; 32]) -> bool {
    compute_root(leaf, proof).map_or(false, |r| r == *root)
}

// -------------------------
// Token account lookup (remaining accounts)
// -------------------------
pub fn escrow_address(program_id: &Pubkey, match_key: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[ESCROW_SEED, match_key.as_ref(), mint.as_ref()], program_id).0
}

pub fn read_token_account(ai: &AccountInfo) -> Result<TokenAccount> {
    require_keys_eq!(*ai.owner, anchor_spl::token::ID, MatchError::MissingTokenAccount);
    let data = ai
        .try_borrow_data()
        .map_err(|_| error!(MatchError::MissingTokenAccount))?;
    let mut slice: &[u8] = &data;
    TokenAccount::try_deserialize(&mut slice)
}

/// Finds the escrow PDA for `mint` among `accounts`.
pub fn find_escrow_account<'a, 'info>(
    accounts: &'a [AccountInfo<'info>],
    program_id: &Pubkey,
    match_key: &Pubkey,
    mint: &Pubkey,
) -> Result<&'a AccountInfo<'info>> {
    let expected = escrow_address(program_id, match_key, mint);
    accounts
        .iter()
        .find(|ai| *ai.key == expected)
        .ok_or_else(|| error!(MatchError::MissingTokenAccount))
}

/// Finds a writable token account owned by `owner` for `mint` among `accounts`.
pub fn find_owner_token_account<'a, 'info>(
    accounts: &'a [AccountInfo<'info>],
    owner: &Pubkey,
    mint: &Pubkey,
) -> Result<&'a AccountInfo<'info>> {
    for ai in accounts.iter().filter(|ai| ai.is_writable) {
        if *ai.owner != anchor_spl::token::ID {
            continue;
        }
        if let Ok(ta) = read_token_account(ai) {
            if ta.owner == *owner && ta.mint == *mint {
                return Ok(ai);
            }
        }
    }
    err!(MatchError::MissingTokenAccount)
}
