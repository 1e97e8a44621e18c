use std::{future::Future, time::Duration};

use pallas_addresses::Address;
use pallas_crypto::hash::Hash;
use serde::{Deserialize, Serialize};
use staking_tricks_txbuilder::prelude::{BuiltTransaction, DRep, Utxo};
use tracing::{debug, info, warn};

use crate::{
    assembler::{check_batch, Assembler, WalletContext},
    credential::{parse_pool_id, payment_key_hash},
    datum::TimeLockDatum,
    oracle::{bounded, ChainOracle, OracleError, Submitter},
    pattern::Pattern,
    Error,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "ClientConfig::default_oracle_timeout_ms")]
    pub oracle_timeout_ms: u64,
}

impl ClientConfig {
    fn default_oracle_timeout_ms() -> u64 {
        10_000
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            oracle_timeout_ms: Self::default_oracle_timeout_ms(),
        }
    }
}

/// Runs user actions end to end: validates arguments, queries the oracle for
/// chain state and hands the result to the [`Assembler`]
pub struct StakingClient<O> {
    oracle: O,
    assembler: Assembler,
    config: ClientConfig,
    wallet: Option<Address>,
}

impl<O: ChainOracle> StakingClient<O> {
    pub fn new(oracle: O, assembler: Assembler, config: ClientConfig) -> Self {
        Self {
            oracle,
            assembler,
            config,
            wallet: None,
        }
    }

    /// Binds the client to a wallet, whose address must be key-locked
    pub fn connect(&mut self, address: Address) -> Result<(), Error> {
        payment_key_hash(&address)?;

        info!(wallet = ?address, "connected wallet");
        self.wallet = Some(address);

        Ok(())
    }

    pub fn assembler(&self) -> &Assembler {
        &self.assembler
    }

    fn wallet_address(&self) -> Result<&Address, Error> {
        self.wallet.as_ref().ok_or(Error::Uninitialized)
    }

    async fn call<T>(
        &self,
        what: &'static str,
        call: impl Future<Output = Result<T, OracleError>>,
    ) -> Result<T, Error> {
        debug!(what, "oracle call");

        Ok(bounded(self.config.oracle_timeout(), call).await?)
    }

    async fn wallet(&self) -> Result<WalletContext, Error> {
        let address = self.wallet_address()?.clone();
        let utxos = self.call("wallet utxos", self.oracle.list_utxos_at(&address)).await?;

        WalletContext::new(address, utxos)
    }

    fn owner(&self) -> Result<Hash<28>, Error> {
        payment_key_hash(self.wallet_address()?)
    }

    pub async fn deposit(&self, pattern: Pattern, lovelace: u64) -> Result<BuiltTransaction, Error> {
        let wallet = self.wallet().await?;
        self.assembler.deposit(pattern, &wallet, lovelace)
    }

    /// Locks `lovelace` under the caller's Withdraw0 script for
    /// `beneficiary`, claimable after `spendable_after`
    pub async fn create(
        &self,
        beneficiary: &Address,
        spendable_after: u64,
        lovelace: u64,
    ) -> Result<BuiltTransaction, Error> {
        let datum = TimeLockDatum::new(spendable_after, payment_key_hash(beneficiary)?);

        let wallet = self.wallet().await?;
        self.assembler.create(&wallet, &datum, lovelace)
    }

    /// Outputs locked under the caller's own address of `pattern`
    pub async fn locked_outputs(&self, pattern: Pattern) -> Result<Vec<Utxo>, Error> {
        let derived = self.assembler.derive(pattern, &self.owner()?)?;

        self.call("locked utxos", self.oracle.list_utxos_at(&derived.address))
            .await
    }

    pub async fn withdraw(&self, pattern: Pattern) -> Result<BuiltTransaction, Error> {
        if pattern == Pattern::Withdraw0 {
            return Err(Error::UnsupportedAction {
                pattern,
                action: "withdraw",
            });
        }

        let wallet = self.wallet().await?;
        let locked = self.locked_outputs(pattern).await?;

        self.assembler.withdraw(pattern, &wallet, &locked)
    }

    /// Tops up each of `selected` by the amount at the same position
    pub async fn top_up(
        &self,
        selected: &[Utxo],
        top_ups: &[u64],
    ) -> Result<BuiltTransaction, Error> {
        check_batch(selected.len(), top_ups.len())?;

        let wallet = self.wallet().await?;
        let derived = self.assembler.derive(Pattern::Withdraw0, &wallet.key_hash)?;

        let balance = self
            .call(
                "reward balance",
                self.oracle.current_reward_balance(&derived.reward_address),
            )
            .await?;

        let balance = balance.unwrap_or_else(|| {
            warn!(account = ?derived.reward_address, "reward account not found, withdrawing zero");
            0
        });

        self.assembler.top_up(&wallet, selected, top_ups, balance)
    }

    /// Claims whatever `sender` locked for the caller that has expired
    pub async fn claim(&self, sender: &Address) -> Result<BuiltTransaction, Error> {
        let sender = payment_key_hash(sender)?;

        let wallet = self.wallet().await?;
        let from = self.assembler.derive(Pattern::Withdraw0, &sender)?;

        let now = self.call("chain time", self.oracle.current_chain_time()).await?;

        let candidates = self
            .call("locked utxos", self.oracle.list_utxos_at(&from.address))
            .await?;

        self.assembler.claim(&wallet, &sender, &candidates, now)
    }

    pub async fn delegate_stake(
        &self,
        pattern: Pattern,
        pool: &str,
        drep: DRep,
    ) -> Result<BuiltTransaction, Error> {
        let pool = parse_pool_id(pool)?;

        let wallet = self.wallet().await?;
        self.assembler.delegate_stake(pattern, &wallet, pool, drep)
    }

    pub async fn withdraw_stake(&self, pattern: Pattern) -> Result<BuiltTransaction, Error> {
        let wallet = self.wallet().await?;
        let derived = self.assembler.derive(pattern, &wallet.key_hash)?;

        let balance = self
            .call(
                "reward balance",
                self.oracle.current_reward_balance(&derived.reward_address),
            )
            .await?;

        self.assembler.withdraw_stake(pattern, &wallet, balance)
    }

    pub async fn unregister_stake(&self, pattern: Pattern) -> Result<BuiltTransaction, Error> {
        let wallet = self.wallet().await?;
        self.assembler.unregister_stake(pattern, &wallet)
    }

    /// Hands a built transaction to the wallet for signing and submission
    pub async fn submit<S: Submitter>(
        &self,
        submitter: &S,
        tx: &BuiltTransaction,
    ) -> Result<Hash<32>, Error> {
        self.wallet_address()?;

        let id = submitter.sign_and_submit(tx).await?;
        info!(%id, "submitted transaction");

        Ok(id)
    }
}
