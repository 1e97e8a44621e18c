use crate::{
    prelude::{ExUnits, Output},
    ProtocolParams, Ratio, TxBuilderError,
};

/// Serialized size of one vkey witness: a two element array holding a
/// 32 byte key and a 64 byte signature
pub const VKEY_WITNESS_SIZE: u64 = 1 + (2 + 32) + (2 + 64);

/// Extra bytes for `n` vkey witnesses added to a witness set that has none:
/// the map key, the set tag and the array header
pub fn vkey_witnesses_size(n: usize) -> u64 {
    match n {
        0 => 0,
        n => 1 + 3 + array_header_size(n) + VKEY_WITNESS_SIZE * n as u64,
    }
}

fn array_header_size(n: usize) -> u64 {
    match n {
        0..=23 => 1,
        24..=255 => 2,
        _ => 3,
    }
}

pub struct Fee;

impl Fee {
    pub fn linear(params: &ProtocolParams) -> LinearFee<'_> {
        LinearFee { params }
    }
}

pub struct LinearFee<'a> {
    params: &'a ProtocolParams,
}

impl LinearFee<'_> {
    /// Size fee plus the price of the declared execution units, rounded up
    pub fn min_fee(&self, tx_size: u64, ex_units: ExUnits) -> u64 {
        let size_fee = self.params.min_fee_a * tx_size + self.params.min_fee_b;

        size_fee + script_fee(self.params.price_mem, self.params.price_steps, ex_units)
    }
}

fn script_fee(price_mem: Ratio, price_steps: Ratio, ex_units: ExUnits) -> u64 {
    let (mn, md) = (price_mem.numerator as u128, price_mem.denominator.max(1) as u128);
    let (sn, sd) = (
        price_steps.numerator as u128,
        price_steps.denominator.max(1) as u128,
    );

    let numerator = ex_units.mem as u128 * mn * sd + ex_units.steps as u128 * sn * md;
    let denominator = md * sd;

    numerator.div_ceil(denominator) as u64
}

/// Lovelace an output must hold for the ledger to accept it
pub fn min_utxo_lovelace(params: &ProtocolParams, output: &Output) -> Result<u64, TxBuilderError> {
    let at = |lovelace: u64| -> Result<u64, TxBuilderError> {
        let mut probe = output.clone();
        probe.value.lovelace = lovelace;
        let size = probe.encoded_size()?;
        Ok(params.coins_per_utxo_byte * (160 + size))
    };

    // the coin field grows with the amount it holds
    let first = at(output.value.lovelace)?;
    let second = at(first)?;

    Ok(first.max(second))
}
