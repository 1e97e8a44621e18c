//! Transaction construction for staking-trick validators
//!
//! Three patterns lock funds at a script address whose stake credential is a
//! validator parameterized by the owner's key hash:
//!
//! * Owner: a spending validator plus a separate owner-gated stake validator
//! * DRY: the same split, with spending delegated to the stake validator
//! * Withdraw0: one validator in both roles, where a zero-value withdrawal
//!   checks every locked input in a single execution
//!
//! [`Assembler`] turns each user action into a balanced
//! [`BuiltTransaction`](staking_tricks_txbuilder::prelude::BuiltTransaction).
//! [`StakingClient`] wires it to a [`ChainOracle`] for chain time, reward
//! balances and locked outputs.

use staking_tricks_txbuilder::prelude::Input;
use thiserror::Error;

mod assembler;
mod blueprint;
mod client;
mod credential;
mod datum;
mod eligibility;
mod oracle;
mod pattern;
mod script;

pub use assembler::{Assembler, WalletContext};
pub use blueprint::{Blueprint, BlueprintValidator, Preamble, TemplateTitles};
pub use client::{ClientConfig, StakingClient};
pub use credential::{
    derive_reward_address, derive_spending_address, derive_stake_credential, parse_pool_id,
    payment_key_hash, DerivedScripts, Deriver,
};
pub use datum::{void, SpendRedeemer, TimeLockDatum};
pub use eligibility::select_unlockable;
pub use oracle::{bounded, ChainOracle, OracleError, SubmitError, Submitter};
pub use pattern::{Pattern, PatternTemplates};
pub use script::{ScriptInstance, ScriptTemplate, SpendingValidator, WithdrawalValidator};

pub use staking_tricks_txbuilder as txbuilder;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid network tag {0}")]
    InvalidNetwork(u8),

    #[error("can't apply script parameters: {0}")]
    ScriptApplication(String),

    #[error("invalid blueprint: {0}")]
    Blueprint(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The wallet address is not guarded by a payment key
    #[error("wallet address has no payment key hash")]
    NotAKeyAddress,

    #[error("invalid pool id {0}")]
    InvalidPoolId(String),

    #[error("{inputs} outputs selected for {amounts} top-up amounts")]
    MismatchedBatch { inputs: usize, amounts: usize },

    #[error("no outputs selected for top-up")]
    EmptyBatch,

    /// A selected output doesn't sit at the caller's own script address
    #[error("output {0} is not locked at the caller's address")]
    ForeignOutput(Input),

    #[error("no stake reward yet")]
    NoRewardsYet,

    #[error("nothing to claim")]
    NothingToClaim,

    #[error("client is not connected to a wallet")]
    Uninitialized,

    #[error("{action} is not available for the {pattern:?} pattern")]
    UnsupportedAction {
        pattern: pattern::Pattern,
        action: &'static str,
    },

    #[error("datum can't be encoded")]
    UnencodableDatum,

    #[error(transparent)]
    Builder(#[from] staking_tricks_txbuilder::TxBuilderError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Submit(#[from] SubmitError),
}

impl Error {
    /// Whether repeating the whole flow may succeed: oracle outages and
    /// network-side submission failures
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Oracle(_) | Error::Submit(SubmitError::NetworkSubmitError(_))
        )
    }
}
