//! Capabilities the engine consumes but doesn't implement: chain queries and
//! wallet submission

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use pallas_addresses::Address;
use pallas_crypto::hash::Hash;
use staking_tricks_txbuilder::prelude::{BuiltTransaction, Utxo};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("wallet rejected the transaction: {0}")]
    WalletRejected(String),

    #[error("network rejected the transaction: {0}")]
    NetworkSubmitError(String),
}

/// Read access to chain state
#[async_trait]
pub trait ChainOracle: Send + Sync {
    /// Withdrawable rewards of a reward address, `None` when the account is
    /// not registered
    async fn current_reward_balance(&self, reward_address: &Address)
        -> Result<Option<u64>, OracleError>;

    /// POSIX time of the chain tip in milliseconds
    async fn current_chain_time(&self) -> Result<u64, OracleError>;

    async fn list_utxos_at(&self, address: &Address) -> Result<Vec<Utxo>, OracleError>;
}

#[async_trait]
pub trait Submitter: Send + Sync {
    async fn sign_and_submit(&self, tx: &BuiltTransaction) -> Result<Hash<32>, SubmitError>;
}

/// Runs an oracle call, failing with [`OracleError::Unavailable`] once
/// `timeout` elapses
pub async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T, OracleError>
where
    F: Future<Output = Result<T, OracleError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(?timeout, "oracle call timed out");
            Err(OracleError::Unavailable(format!(
                "no answer within {}ms",
                timeout.as_millis()
            )))
        }
    }
}
