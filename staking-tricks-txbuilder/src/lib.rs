//! Conway transaction builder for script-locked staking patterns
//!
//! Transactions are staged with caller-ordered inputs and finalized by
//! [`StagingTransaction::complete`](prelude::StagingTransaction::complete),
//! which selects wallet inputs, adds change and collateral, converges the fee
//! and only then fixes the canonical input order. Redeemers that refer to
//! input positions are registered as deferred and resolved against that final
//! order.

use pallas_crypto::hash::Hash;
use thiserror::Error;

mod balance;
mod conway;
mod correlate;
mod evaluate;
mod fee;
mod params;
mod scriptdata;
mod transaction;

pub mod plutus;
pub mod prelude;

pub use params::{NetworkParams, ProtocolParams, Ratio, SlotConfig};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxBuilderError {
    /// The transaction has no inputs and the wallet offered none to select
    #[error("transaction has no inputs")]
    NoInputs,

    /// The same output reference was added twice
    #[error("duplicate input {0}#{1}")]
    DuplicateInput(Hash<32>, u64),

    /// A redeemer points at an input, withdrawal or certificate that is not
    /// part of the transaction
    #[error("redeemer target is missing from the transaction")]
    RedeemerTargetMissing,

    /// A correlation was registered with input and output lists of different
    /// lengths
    #[error("correlation pairs {inputs} inputs with {outputs} outputs")]
    MismatchedCorrelation { inputs: usize, outputs: usize },

    /// A correlation refers to an output position past the end of the
    /// output list
    #[error("correlated output {0} does not exist")]
    CorrelatedOutputMissing(usize),

    /// A deferred redeemer carries a token this transaction never issued
    #[error("unknown correlation token")]
    UnknownCorrelation,

    #[error("datum is malformed")]
    MalformedDatum,

    #[error("invalid network id {0}")]
    InvalidNetworkId(u8),

    /// The timestamp precedes the network's first Shelley slot
    #[error("timestamp {0} has no slot on this network")]
    InvalidTimestamp(u64),

    /// Script execution was requested but no PlutusV3 cost model is
    /// configured, so the script data hash can't be computed
    #[error("no plutus v3 cost model configured")]
    MissingCostModel,

    /// A script failed, or its result could not be read back, while
    /// measuring execution units
    #[error("script evaluation failed: {0}")]
    ScriptEvaluation(String),

    #[error("no change address configured")]
    MissingChangeAddress,

    #[error("insufficient funds, missing {0} lovelace")]
    InsufficientFunds(u64),

    #[error("wallet can't cover the native assets being paid out")]
    InsufficientAssets,

    #[error("no wallet utxo can serve as collateral for {0} lovelace")]
    NoSuitableCollateral(u64),

    #[error("output holds {lovelace} lovelace, below the minimum of {minimum}")]
    OutputBelowMinimum { lovelace: u64, minimum: u64 },

    #[error("fee did not converge after {0} rounds")]
    FeeDidNotConverge(usize),

    #[error("value overflow")]
    ValueOverflow,

    /// The transaction can not be encoded to CBOR.
    #[error("transaction can't be encoded")]
    UnencodableTransaction,
}
