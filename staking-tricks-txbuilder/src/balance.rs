use std::collections::BTreeSet;

use pallas_addresses::Address;
use tracing::{debug, instrument};

use crate::{
    evaluate::eval_tx,
    fee::{min_utxo_lovelace, vkey_witnesses_size, Fee},
    prelude::{BuiltTransaction, Output, PubKeyHash, StagingTransaction, Utxo, Value},
    NetworkParams, TxBuilderError,
};

/// Rounds of fee re-estimation before giving up
pub const MAX_FEE_ROUNDS: usize = 10;

impl StagingTransaction {
    /// Balances the transaction against the wallet's utxos and builds it.
    ///
    /// Wallet outputs are selected to cover outputs, deposits and the fee,
    /// leftover value goes to the change address and, when scripts run, one
    /// wallet output is set aside as collateral. Every round runs the scripts
    /// to measure the execution units it pays for, and the fee is
    /// re-estimated until it covers the transaction it's part of. Input order
    /// and every deferred redeemer are fixed by the last round only.
    #[instrument(skip_all)]
    pub fn complete(
        self,
        wallet: &[Utxo],
        params: &NetworkParams,
    ) -> Result<BuiltTransaction, TxBuilderError> {
        let change_address = self
            .change_address
            .clone()
            .ok_or(TxBuilderError::MissingChangeAddress)?;

        for output in self.outputs.iter() {
            let minimum = min_utxo_lovelace(&params.protocol, output)?;

            if output.lovelace() < minimum {
                return Err(TxBuilderError::OutputBelowMinimum {
                    lovelace: output.lovelace(),
                    minimum,
                });
            }
        }

        let candidates = self.selection_candidates(wallet);
        let mut fee = self.fee.unwrap_or_default();

        for round in 0..MAX_FEE_ROUNDS {
            let (mut tx, effective_fee) =
                self.clone()
                    .select_inputs(&candidates, &change_address, fee, params)?;

            if !tx.redeemers.is_empty() {
                tx = tx.attach_collateral(wallet, &change_address, effective_fee, params)?;
            }

            let tx = tx.fee(effective_fee).measure_ex_units(params)?;
            let assembled = tx.assemble(params)?;

            let size = assembled.tx_bytes.len() as u64 + vkey_witnesses_size(tx.signers().len());
            let min_fee = Fee::linear(&params.protocol).min_fee(size, assembled.ex_units);

            debug!(
                round,
                fee = effective_fee,
                min_fee,
                size,
                mem = assembled.ex_units.mem,
                steps = assembled.ex_units.steps,
                "fee round"
            );

            if min_fee <= effective_fee {
                return Ok(assembled.into_built(effective_fee, tx.outputs));
            }

            fee = min_fee;
        }

        Err(TxBuilderError::FeeDidNotConverge(MAX_FEE_ROUNDS))
    }

    /// Runs the scripts against the transaction as staged and sets the
    /// measured units, plus a margin, on every redeemer that didn't declare
    /// its own
    fn measure_ex_units(mut self, params: &NetworkParams) -> Result<Self, TxBuilderError> {
        if self.redeemers.is_empty() {
            return Ok(self);
        }

        let assembled = self.assemble(params)?;

        let resolved: Vec<_> = self
            .inputs
            .iter()
            .chain(self.collateral_inputs.iter())
            .cloned()
            .collect();

        for result in eval_tx(&assembled.tx_bytes, &resolved, params)? {
            let position = assembled
                .redeemers
                .iter()
                .position(|x| x.tag == result.tag && x.index == result.index)
                .ok_or(TxBuilderError::RedeemerTargetMissing)?;

            let purpose = &assembled.purposes[position];

            if let Some((_, units)) = self.redeemers.get_mut(purpose) {
                if units.is_none() {
                    *units = Some(result.units.with_margin());
                }
            }
        }

        Ok(self)
    }

    /// Key hashes expected to sign: disclosed signers plus the owners of
    /// every key-locked input and collateral input
    pub fn signers(&self) -> BTreeSet<PubKeyHash> {
        self.inputs
            .iter()
            .chain(self.collateral_inputs.iter())
            .filter_map(|x| x.output.payment_key_hash())
            .chain(self.disclosed_signers.iter().copied())
            .collect()
    }

    /// Wallet utxos not already spent, pure-ada ones first, larger first
    fn selection_candidates(&self, wallet: &[Utxo]) -> Vec<Utxo> {
        let mut candidates: Vec<_> = wallet
            .iter()
            .filter(|x| !self.spends(&x.input))
            .filter(|x| x.output.datum.is_none() && x.output.script.is_none())
            .cloned()
            .collect();

        candidates.sort_by_key(|x| {
            (
                x.output.value.has_assets(),
                std::cmp::Reverse(x.output.lovelace()),
            )
        });

        candidates
    }

    /// Value entering the transaction: spent outputs, withdrawals and
    /// deposit refunds
    fn provided(&self) -> Result<Value, TxBuilderError> {
        let spent = self
            .inputs
            .iter()
            .try_fold(Value::default(), |acc, x| acc.checked_add(&x.output.value))
            .ok_or(TxBuilderError::ValueOverflow)?;

        let extra = self
            .withdrawals
            .values()
            .copied()
            .chain(self.certificates.iter().map(|x| x.refund()))
            .try_fold(0u64, u64::checked_add)
            .ok_or(TxBuilderError::ValueOverflow)?;

        spent
            .checked_add(&Value::lovelace(extra))
            .ok_or(TxBuilderError::ValueOverflow)
    }

    /// Value leaving the transaction: outputs, deposits and the fee
    fn required(&self, fee: u64) -> Result<Value, TxBuilderError> {
        let paid = self
            .outputs
            .iter()
            .try_fold(Value::default(), |acc, x| acc.checked_add(&x.value))
            .ok_or(TxBuilderError::ValueOverflow)?;

        let extra = self
            .certificates
            .iter()
            .map(|x| x.deposit())
            .chain(std::iter::once(fee))
            .try_fold(0u64, u64::checked_add)
            .ok_or(TxBuilderError::ValueOverflow)?;

        paid.checked_add(&Value::lovelace(extra))
            .ok_or(TxBuilderError::ValueOverflow)
    }

    /// Adds candidates until the transaction can pay for itself and return a
    /// valid change output. Change too small to stand on its own is left to
    /// the fee when no candidate is left to top it up.
    fn select_inputs(
        mut self,
        candidates: &[Utxo],
        change_address: &Address,
        fee: u64,
        params: &NetworkParams,
    ) -> Result<(Self, u64), TxBuilderError> {
        let required = self.required(fee)?;
        let mut remaining = candidates.iter();

        loop {
            let provided = self.provided()?;

            let next = if self.inputs.is_empty() {
                None
            } else {
                match provided.checked_sub(&required) {
                    Some(change) if change == Value::default() => return Ok((self, fee)),
                    Some(change) => {
                        let output = Output::with_value(change_address.clone(), change);
                        let minimum = min_utxo_lovelace(&params.protocol, &output)?;

                        if output.lovelace() >= minimum {
                            return Ok((self.output(output), fee));
                        }

                        Some((output, minimum))
                    }
                    None => None,
                }
            };

            match remaining.next() {
                Some(utxo) => {
                    self = self.input(utxo.clone());
                }
                None => {
                    return match next {
                        Some((dust, _)) if !dust.value.has_assets() => {
                            let fee = fee + dust.lovelace();
                            Ok((self, fee))
                        }
                        Some((dust, minimum)) => Err(TxBuilderError::InsufficientFunds(
                            minimum - dust.lovelace(),
                        )),
                        None if self.inputs.is_empty() => Err(TxBuilderError::NoInputs),
                        None => {
                            let missing = required.lovelace.saturating_sub(provided.lovelace);

                            if missing > 0 {
                                Err(TxBuilderError::InsufficientFunds(missing))
                            } else {
                                Err(TxBuilderError::InsufficientAssets)
                            }
                        }
                    };
                }
            }
        }
    }

    /// Picks the smallest key-locked, pure-ada wallet output able to cover
    /// the required collateral and return the rest
    fn attach_collateral(
        self,
        wallet: &[Utxo],
        change_address: &Address,
        fee: u64,
        params: &NetworkParams,
    ) -> Result<Self, TxBuilderError> {
        let required = (fee * params.protocol.collateral_percentage).div_ceil(100);

        let mut eligible: Vec<_> = wallet
            .iter()
            .filter(|x| !x.output.value.has_assets())
            .filter(|x| x.output.datum.is_none() && x.output.script.is_none())
            .filter(|x| x.output.payment_key_hash().is_some())
            .collect();

        eligible.sort_by_key(|x| x.output.lovelace());

        for utxo in eligible {
            let Some(change) = utxo.output.lovelace().checked_sub(required) else {
                continue;
            };

            if change == 0 {
                return Ok(self
                    .collateral_input(utxo.clone())
                    .total_collateral(required));
            }

            let output = Output::new(change_address.clone(), change);

            if change >= min_utxo_lovelace(&params.protocol, &output)? {
                return Ok(self
                    .collateral_input(utxo.clone())
                    .collateral_output(output)
                    .total_collateral(required));
            }
        }

        Err(TxBuilderError::NoSuitableCollateral(required))
    }
}
