use pallas_crypto::hash::Hash;
use pallas_primitives::{conway::PlutusData, Fragment};
use staking_tricks_txbuilder::plutus;

use crate::Error;

/// Datum of a Withdraw0 lock: who may claim it and from when
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeLockDatum {
    /// POSIX milliseconds after which the output may be claimed
    pub spendable_after: u64,
    pub spendable_by: Hash<28>,
}

impl TimeLockDatum {
    pub fn new(spendable_after: u64, spendable_by: Hash<28>) -> Self {
        Self {
            spendable_after,
            spendable_by,
        }
    }

    /// Claimable strictly after `spendable_after`, and only by the named
    /// beneficiary
    pub fn is_unlockable(&self, now: u64, caller: &Hash<28>) -> bool {
        now > self.spendable_after && self.spendable_by == *caller
    }

    pub fn to_plutus_data(&self) -> PlutusData {
        plutus::constr(0)
            .field(plutus::uint(self.spendable_after))
            .field(plutus::bytes(self.spendable_by.to_vec()))
            .into()
    }

    pub fn from_plutus_data(data: &PlutusData) -> Option<Self> {
        let (0, [after, by]) = plutus::as_constr(data)? else {
            return None;
        };

        let spendable_after = u64::try_from(plutus::as_int(after)?).ok()?;
        let spendable_by: [u8; 28] = plutus::as_bytes(by)?.try_into().ok()?;

        Some(Self::new(spendable_after, Hash::from(spendable_by)))
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, Error> {
        self.to_plutus_data()
            .encode_fragment()
            .map_err(|_| Error::UnencodableDatum)
    }

    pub fn from_cbor(bytes: &[u8]) -> Option<Self> {
        PlutusData::decode_fragment(bytes)
            .ok()
            .as_ref()
            .and_then(Self::from_plutus_data)
    }
}

/// Spend redeemer of the Withdraw0 validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendRedeemer {
    /// The output is continued by a topped-up copy
    In,
    /// The output leaves the script
    Out,
}

impl From<SpendRedeemer> for PlutusData {
    fn from(value: SpendRedeemer) -> Self {
        match value {
            SpendRedeemer::In => plutus::constr(0).into(),
            SpendRedeemer::Out => plutus::constr(1).into(),
        }
    }
}

pub fn void() -> PlutusData {
    plutus::void()
}
