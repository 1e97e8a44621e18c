use pallas_addresses::Address;
use pallas_crypto::hash::Hash;
use staking_tricks_txbuilder::prelude::{Datum, Utxo};
use tracing::debug;

use crate::datum::TimeLockDatum;

/// Locked outputs the caller may spend right now.
///
/// When the sender is the caller's own address only datum-less outputs
/// qualify, those being plain deposits. Otherwise an output qualifies when
/// its inline time-lock datum names `caller` and has expired before `now`.
pub fn select_unlockable(
    candidates: &[Utxo],
    sender_address: &Address,
    own_address: &Address,
    now: u64,
    caller: &Hash<28>,
) -> Vec<Utxo> {
    let own = sender_address == own_address;

    let selected: Vec<_> = candidates
        .iter()
        .filter(|utxo| match (&utxo.output.datum, own) {
            (None, own) => own,
            (Some(_), true) => false,
            (Some(Datum::Hash(_)), false) => false,
            (Some(Datum::Inline(bytes)), false) => match TimeLockDatum::from_cbor(bytes) {
                Some(datum) => datum.is_unlockable(now, caller),
                None => {
                    debug!(input = %utxo.input, "skipping output with foreign datum");
                    false
                }
            },
        })
        .cloned()
        .collect();

    debug!(
        candidates = candidates.len(),
        selected = selected.len(),
        own,
        now,
        "eligible outputs"
    );

    selected
}
