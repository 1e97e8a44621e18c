use std::sync::Arc;

use pallas_addresses::Address;
use pallas_crypto::hash::Hash;
use staking_tricks_txbuilder::{
    prelude::{
        BuiltTransaction, Certificate, DRep, Datum, Input, Output, RedeemerPurpose, ScriptKind,
        StagingTransaction, Utxo,
    },
    NetworkParams, TxBuilderError,
};
use tracing::{debug, info, instrument};

use crate::{
    credential::{payment_key_hash, DerivedScripts, Deriver},
    datum::{void, SpendRedeemer, TimeLockDatum},
    eligibility::select_unlockable,
    pattern::{Pattern, PatternTemplates},
    script::ScriptInstance,
    Error,
};

/// The connected wallet: where change goes, who signs, what pays
#[derive(Debug, Clone)]
pub struct WalletContext {
    pub address: Address,
    pub key_hash: Hash<28>,
    pub utxos: Vec<Utxo>,
}

impl WalletContext {
    pub fn new(address: Address, utxos: Vec<Utxo>) -> Result<Self, Error> {
        Ok(Self {
            key_hash: payment_key_hash(&address)?,
            address,
            utxos,
        })
    }
}

/// Builds the transaction of every user action, balanced against the
/// wallet's outputs
#[derive(Debug)]
pub struct Assembler {
    params: NetworkParams,
    deriver: Deriver,
}

impl Assembler {
    pub fn new(params: NetworkParams, templates: PatternTemplates) -> Result<Self, Error> {
        Ok(Self {
            deriver: Deriver::new(params.network_id, templates)?,
            params,
        })
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    pub fn derive(&self, pattern: Pattern, owner: &Hash<28>) -> Result<Arc<DerivedScripts>, Error> {
        self.deriver.derive(pattern, owner)
    }

    fn staging(&self, wallet: &WalletContext) -> StagingTransaction {
        StagingTransaction::new()
            .network_id(self.params.network_id)
            .change_address(wallet.address.clone())
    }

    fn finish(
        &self,
        action: &'static str,
        tx: StagingTransaction,
        wallet: &WalletContext,
    ) -> Result<BuiltTransaction, Error> {
        let built = tx.complete(&wallet.utxos, &self.params)?;

        info!(
            action,
            tx_hash = %built.tx_hash,
            fee = built.fee,
            inputs = built.inputs.len(),
            "assembled transaction"
        );

        Ok(built)
    }

    /// Locks `lovelace` at the owner's script address
    #[instrument(skip_all, fields(?pattern, lovelace = lovelace))]
    pub fn deposit(
        &self,
        pattern: Pattern,
        wallet: &WalletContext,
        lovelace: u64,
    ) -> Result<BuiltTransaction, Error> {
        let derived = self.derive(pattern, &wallet.key_hash)?;

        let tx = self
            .staging(wallet)
            .output(Output::new(derived.address.clone(), lovelace));

        self.finish("deposit", tx, wallet)
    }

    /// Locks `lovelace` at the creator's Withdraw0 address for whoever
    /// `datum` names
    #[instrument(skip_all, fields(lovelace = lovelace, spendable_after = datum.spendable_after))]
    pub fn create(
        &self,
        wallet: &WalletContext,
        datum: &TimeLockDatum,
        lovelace: u64,
    ) -> Result<BuiltTransaction, Error> {
        let derived = self.derive(Pattern::Withdraw0, &wallet.key_hash)?;

        let output =
            Output::new(derived.address.clone(), lovelace).set_inline_datum(datum.to_cbor()?);

        let tx = self.staging(wallet).output(output);

        self.finish("create", tx, wallet)
    }

    /// Sends every `locked` output of an Owner or DRY address back to the
    /// wallet
    #[instrument(skip_all, fields(?pattern, locked = locked.len()))]
    pub fn withdraw(
        &self,
        pattern: Pattern,
        wallet: &WalletContext,
        locked: &[Utxo],
    ) -> Result<BuiltTransaction, Error> {
        if pattern == Pattern::Withdraw0 {
            return Err(Error::UnsupportedAction {
                pattern,
                action: "withdraw",
            });
        }

        if locked.is_empty() {
            return Err(Error::NothingToClaim);
        }

        let derived = self.derive(pattern, &wallet.key_hash)?;
        check_owned(&derived, locked)?;

        let mut tx = attach(self.staging(wallet), derived.spending.script());

        for utxo in locked {
            tx = tx
                .input(utxo.clone())
                .add_spend_redeemer(utxo.input, void(), None);
        }

        self.finish("withdraw", tx, wallet)
    }

    /// Adds `top_ups[i]` lovelace to `selected[i]`, recreating each output
    /// with its datum and reference script at the same address. The whole
    /// live reward balance is withdrawn, and the withdrawal redeemer pairs
    /// every spent output with its continuation.
    #[instrument(skip_all, fields(batch = selected.len(), reward_balance = reward_balance))]
    pub fn top_up(
        &self,
        wallet: &WalletContext,
        selected: &[Utxo],
        top_ups: &[u64],
        reward_balance: u64,
    ) -> Result<BuiltTransaction, Error> {
        check_batch(selected.len(), top_ups.len())?;

        let derived = self.derive(Pattern::Withdraw0, &wallet.key_hash)?;
        check_owned(&derived, selected)?;

        let mut tx = attach(self.staging(wallet), derived.spending.script());
        tx = attach(tx, derived.stake.script());

        for (utxo, amount) in selected.iter().zip(top_ups) {
            let mut continued = utxo.output.clone();

            continued.value.lovelace = continued
                .value
                .lovelace
                .checked_add(*amount)
                .ok_or(TxBuilderError::ValueOverflow)?;

            tx = tx
                .input(utxo.clone())
                .add_spend_redeemer(utxo.input, SpendRedeemer::In.into(), None)
                .output(continued);
        }

        let inputs: Vec<Input> = selected.iter().map(|x| x.input).collect();
        let outputs: Vec<usize> = (0..selected.len()).collect();

        let account = derived.reward_account.clone();

        tx = tx
            .withdrawal(account.clone(), reward_balance)
            .add_correlated_redeemer(RedeemerPurpose::Reward(account), inputs, outputs, None)?
            .disclosed_signer(wallet.key_hash);

        self.finish("top_up", tx, wallet)
    }

    /// Spends the outputs `sender` locked for the wallet owner that have
    /// expired by `now`
    #[instrument(skip_all, fields(%sender, now = now))]
    pub fn claim(
        &self,
        wallet: &WalletContext,
        sender: &Hash<28>,
        candidates: &[Utxo],
        now: u64,
    ) -> Result<BuiltTransaction, Error> {
        let from = self.derive(Pattern::Withdraw0, sender)?;
        let own = self.derive(Pattern::Withdraw0, &wallet.key_hash)?;

        let eligible = select_unlockable(
            candidates,
            &from.address,
            &own.address,
            now,
            &wallet.key_hash,
        );

        if eligible.is_empty() {
            return Err(Error::NothingToClaim);
        }

        let deadline = eligible
            .iter()
            .filter_map(|x| match &x.output.datum {
                Some(Datum::Inline(bytes)) => TimeLockDatum::from_cbor(bytes),
                _ => None,
            })
            .map(|x| x.spendable_after)
            .max();

        let mut tx = attach(self.staging(wallet), from.spending.script())
            .valid_from_slot(self.claim_lower_bound(now, deadline)?)
            .disclosed_signer(wallet.key_hash);

        for utxo in eligible {
            tx = tx
                .add_spend_redeemer(utxo.input, SpendRedeemer::Out.into(), None)
                .input(utxo);
        }

        self.finish("claim", tx, wallet)
    }

    /// Slot containing `now`, or the next one when that slot starts at or
    /// before `deadline`: the lower bound the validator sees is the slot's
    /// start, which has to be strictly after every claimed deadline
    fn claim_lower_bound(&self, now: u64, deadline: Option<u64>) -> Result<u64, Error> {
        let slot = self.params.timestamp_to_slot(now)?;

        match deadline {
            Some(deadline) if self.params.timestamp_to_slot(deadline)? >= slot => Ok(slot + 1),
            _ => Ok(slot),
        }
    }

    /// Registers the owner's stake credential, delegating to `pool` and
    /// voting through `drep`
    #[instrument(skip_all, fields(?pattern, %pool))]
    pub fn delegate_stake(
        &self,
        pattern: Pattern,
        wallet: &WalletContext,
        pool: Hash<28>,
        drep: DRep,
    ) -> Result<BuiltTransaction, Error> {
        let derived = self.derive(pattern, &wallet.key_hash)?;

        let certificate = Certificate::RegisterAndDelegate {
            credential: derived.stake_credential(),
            pool,
            drep,
            deposit: self.params.protocol.key_deposit,
        };

        let tx = self.stake_action(pattern, &derived, wallet).certificate(certificate);
        let tx = tx.add_cert_redeemer(0, pattern.stake_redeemer(), None);

        self.finish("delegate_stake", tx, wallet)
    }

    /// Withdraws the whole reward `balance`, which must be positive
    #[instrument(skip_all, fields(?pattern, ?balance))]
    pub fn withdraw_stake(
        &self,
        pattern: Pattern,
        wallet: &WalletContext,
        balance: Option<u64>,
    ) -> Result<BuiltTransaction, Error> {
        let balance = match balance {
            Some(x) if x > 0 => x,
            _ => return Err(Error::NoRewardsYet),
        };

        let derived = self.derive(pattern, &wallet.key_hash)?;
        let account = derived.reward_account.clone();

        let tx = self
            .stake_action(pattern, &derived, wallet)
            .withdrawal(account.clone(), balance)
            .add_reward_redeemer(account, pattern.stake_redeemer(), None);

        self.finish("withdraw_stake", tx, wallet)
    }

    #[instrument(skip_all, fields(?pattern))]
    pub fn unregister_stake(
        &self,
        pattern: Pattern,
        wallet: &WalletContext,
    ) -> Result<BuiltTransaction, Error> {
        let derived = self.derive(pattern, &wallet.key_hash)?;

        let certificate = Certificate::Deregister {
            credential: derived.stake_credential(),
            refund: self.params.protocol.key_deposit,
        };

        let tx = self
            .stake_action(pattern, &derived, wallet)
            .certificate(certificate)
            .add_cert_redeemer(0, pattern.stake_redeemer(), None);

        self.finish("unregister_stake", tx, wallet)
    }

    fn stake_action(
        &self,
        pattern: Pattern,
        derived: &DerivedScripts,
        wallet: &WalletContext,
    ) -> StagingTransaction {
        debug!(?pattern, stake = %derived.stake.hash(), "stake action");

        attach(self.staging(wallet), derived.stake.script()).disclosed_signer(wallet.key_hash)
    }
}

fn attach(tx: StagingTransaction, script: &ScriptInstance) -> StagingTransaction {
    tx.script(ScriptKind::PlutusV3, script.bytes().to_vec())
}

pub(crate) fn check_batch(inputs: usize, amounts: usize) -> Result<(), Error> {
    if inputs != amounts {
        return Err(Error::MismatchedBatch { inputs, amounts });
    }

    if inputs == 0 {
        return Err(Error::EmptyBatch);
    }

    Ok(())
}

fn check_owned(derived: &DerivedScripts, locked: &[Utxo]) -> Result<(), Error> {
    match locked.iter().find(|x| x.output.address != derived.address) {
        Some(foreign) => Err(Error::ForeignOutput(foreign.input)),
        None => Ok(()),
    }
}
