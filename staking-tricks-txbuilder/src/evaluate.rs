use pallas_primitives::{
    conway::{CostModels, Redeemer},
    Fragment,
};
use tracing::{debug, instrument};

use crate::{
    conway::transaction_input,
    prelude::{ExUnits, RedeemerTag, Utxo},
    NetworkParams, TxBuilderError,
};

/// Headroom over the measured units, in percent
pub const EX_UNITS_MARGIN: u64 = 5;

/// Units one redeemer's script consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxEvalResult {
    pub tag: RedeemerTag,
    pub index: u32,
    pub units: ExUnits,
}

impl ExUnits {
    pub fn with_margin(self) -> Self {
        let grow = |x: u64| x.saturating_mul(100 + EX_UNITS_MARGIN).div_ceil(100);

        Self {
            mem: grow(self.mem),
            steps: grow(self.steps),
        }
    }
}

fn failed(reason: impl ToString) -> TxBuilderError {
    TxBuilderError::ScriptEvaluation(reason.to_string())
}

fn resolved_inputs(utxos: &[Utxo]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, TxBuilderError> {
    utxos
        .iter()
        .map(|utxo| {
            let input = transaction_input(&utxo.input)
                .encode_fragment()
                .map_err(|_| TxBuilderError::UnencodableTransaction)?;

            let output = utxo
                .output
                .build_babbage_raw()?
                .encode_fragment()
                .map_err(|_| TxBuilderError::UnencodableTransaction)?;

            Ok((input, output))
        })
        .collect()
}

/// Runs every redeemer of an encoded transaction against the outputs it
/// spends, within the per-transaction budget. Fails on the first script
/// that errors.
#[instrument(skip_all, fields(size = tx_bytes.len(), utxos = utxos.len()))]
pub fn eval_tx(
    tx_bytes: &[u8],
    utxos: &[Utxo],
    params: &NetworkParams,
) -> Result<Vec<TxEvalResult>, TxBuilderError> {
    let protocol = &params.protocol;

    if protocol.cost_model_v3.is_empty() {
        return Err(TxBuilderError::MissingCostModel);
    }

    let cost_models = CostModels {
        plutus_v1: None,
        plutus_v2: None,
        plutus_v3: Some(protocol.cost_model_v3.clone()),
    }
    .encode_fragment()
    .map_err(|_| TxBuilderError::UnencodableTransaction)?;

    let slot = &params.slot_config;
    let slot_length = u32::try_from(slot.slot_length).map_err(failed)?;

    let evaluated = uplc::tx::eval_phase_two_raw(
        tx_bytes,
        &resolved_inputs(utxos)?,
        Some(&cost_models),
        (protocol.max_tx_ex_units.steps, protocol.max_tx_ex_units.mem),
        (slot.zero_time, slot.zero_slot, slot_length),
        false,
        |_| (),
    )
    .map_err(failed)?;

    evaluated
        .into_iter()
        .map(|(bytes, _)| {
            let redeemer = Redeemer::decode_fragment(&bytes).map_err(failed)?;

            let tag = RedeemerTag::from_pallas(redeemer.tag)
                .ok_or_else(|| failed(format!("unexpected {:?} redeemer", redeemer.tag)))?;

            let units = ExUnits {
                mem: redeemer.ex_units.mem,
                steps: redeemer.ex_units.steps,
            };

            debug!(
                ?tag,
                index = redeemer.index,
                mem = units.mem,
                steps = units.steps,
                "evaluated redeemer"
            );

            Ok(TxEvalResult {
                tag,
                index: redeemer.index,
                units,
            })
        })
        .collect()
}
