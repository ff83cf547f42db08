pub mod escrow;
pub mod join;
pub mod leave;
pub mod lifecycle;
pub mod oracle;
pub mod settle;
