use std::sync::Arc;

use pallas_codec::utils::MaybeIndefArray;
use pallas_crypto::hash::Hash;
use pallas_primitives::{conway::PlutusData, Fragment};
use staking_tricks_txbuilder::prelude::{Credential, Script, ScriptKind};
use tracing::trace;

use crate::Error;

/// Compiled validator that still expects its parameters, as found in a
/// blueprint: CBOR-wrapped flat-encoded UPLC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTemplate {
    bytes: Arc<[u8]>,
}

impl ScriptTemplate {
    pub fn new(compiled_code: Vec<u8>) -> Self {
        Self {
            bytes: compiled_code.into(),
        }
    }

    pub fn from_hex(compiled_code: &str) -> Result<Self, Error> {
        hex::decode(compiled_code)
            .map(Self::new)
            .map_err(|e| Error::ScriptApplication(e.to_string()))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The template used as-is, for validators without parameters
    pub fn instance(&self) -> ScriptInstance {
        ScriptInstance::new(self.bytes.to_vec())
    }

    /// Applies `params` in order, producing a new script
    pub fn apply(&self, params: &[PlutusData]) -> Result<ScriptInstance, Error> {
        if params.is_empty() {
            return Ok(self.instance());
        }

        let params = PlutusData::Array(MaybeIndefArray::Def(params.to_vec()));

        let params = params
            .encode_fragment()
            .map_err(|e| Error::ScriptApplication(e.to_string()))?;

        let bytes = uplc::tx::apply_params_to_script(&params, &self.bytes)
            .map_err(|e| Error::ScriptApplication(e.to_string()))?;

        let instance = ScriptInstance::new(bytes);

        trace!(hash = %instance.hash(), "applied script parameters");

        Ok(instance)
    }
}

/// A PlutusV3 script ready to be attached to a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInstance {
    bytes: Arc<[u8]>,
    hash: Hash<28>,
}

impl ScriptInstance {
    pub fn new(bytes: Vec<u8>) -> Self {
        let hash = Script::new(ScriptKind::PlutusV3, bytes.clone()).hash();

        Self {
            bytes: bytes.into(),
            hash,
        }
    }

    pub fn hash(&self) -> Hash<28> {
        self.hash
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn language(&self) -> ScriptKind {
        ScriptKind::PlutusV3
    }

    pub fn credential(&self) -> Credential {
        Credential::Script(self.hash)
    }
}

/// A script in its spending role, the payment part of the locking address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendingValidator(ScriptInstance);

/// A script in its stake role, running on certificates and withdrawals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalValidator(ScriptInstance);

macro_rules! script_role {
    ($role:ident) => {
        impl $role {
            pub fn new(script: ScriptInstance) -> Self {
                Self(script)
            }

            pub fn script(&self) -> &ScriptInstance {
                &self.0
            }

            pub fn hash(&self) -> Hash<28> {
                self.0.hash()
            }

            pub fn credential(&self) -> Credential {
                self.0.credential()
            }
        }

        impl From<ScriptInstance> for $role {
            fn from(value: ScriptInstance) -> Self {
                Self(value)
            }
        }
    };
}

script_role!(SpendingValidator);
script_role!(WithdrawalValidator);
