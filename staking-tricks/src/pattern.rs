use pallas_crypto::hash::Hash;
use pallas_primitives::conway::PlutusData;
use serde::{Deserialize, Serialize};
use staking_tricks_txbuilder::{plutus, prelude::IndexCorrelation};

use crate::{
    script::{ScriptInstance, ScriptTemplate},
    Error,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    Owner,
    Dry,
    Withdraw0,
}

impl Pattern {
    /// Redeemer for stake actions that spend nothing: certificates and
    /// reward withdrawals
    pub fn stake_redeemer(&self) -> PlutusData {
        match self {
            Pattern::Owner | Pattern::Dry => plutus::void(),
            Pattern::Withdraw0 => IndexCorrelation::empty().into(),
        }
    }
}

/// Unapplied validators for every pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternTemplates {
    pub spend_owner: ScriptTemplate,
    pub stake_owner: ScriptTemplate,
    pub spend_dry: ScriptTemplate,
    pub stake_dry: ScriptTemplate,
    pub withdraw0: ScriptTemplate,
}

impl PatternTemplates {
    /// Spending and stake scripts of `pattern` for `owner`.
    ///
    /// Owner and DRY share an unparameterized spending validator among all
    /// owners and tell them apart by the stake part of the address. Withdraw0
    /// is a single owner-parameterized script used in both roles.
    pub fn instantiate(
        &self,
        pattern: Pattern,
        owner: &Hash<28>,
    ) -> Result<(ScriptInstance, ScriptInstance), Error> {
        let param = [plutus::bytes(owner.to_vec())];

        match pattern {
            Pattern::Owner => Ok((
                self.spend_owner.instance(),
                self.stake_owner.apply(&param)?,
            )),
            Pattern::Dry => Ok((self.spend_dry.instance(), self.stake_dry.apply(&param)?)),
            Pattern::Withdraw0 => {
                let script = self.withdraw0.apply(&param)?;
                Ok((script.clone(), script))
            }
        }
    }
}
