use pallas_codec::minicbor::{self, Encode};
use pallas_crypto::hash::{Hash, Hasher};
use pallas_primitives::conway::{CostModel, PlutusData, Redeemers};
use serde::{Deserialize, Serialize};

use crate::TxBuilderError;

/// Ledger language id, PlutusV3 is 2
pub type PlutusVersion = u8;

pub const PLUTUS_V3: PlutusVersion = 2;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LanguageView(pub PlutusVersion, pub CostModel);

impl<C> Encode<C> for LanguageView {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        // PlutusV1 views are double-encoded and never produced here
        e.map(1)?;
        e.encode(self.0)?;
        e.encode(&self.1)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ScriptData {
    pub redeemers: Redeemers,
    pub datums: Option<Vec<PlutusData>>,
    pub language_view: LanguageView,
}

impl ScriptData {
    pub fn hash(&self) -> Result<Hash<32>, TxBuilderError> {
        let mut buf = vec![];

        minicbor::encode(&self.redeemers, &mut buf)
            .map_err(|_| TxBuilderError::UnencodableTransaction)?;

        if let Some(datums) = &self.datums {
            minicbor::encode(datums, &mut buf)
                .map_err(|_| TxBuilderError::UnencodableTransaction)?;
        }

        minicbor::encode(&self.language_view, &mut buf)
            .map_err(|_| TxBuilderError::UnencodableTransaction)?;

        Ok(Hasher::<256>::hash(&buf))
    }
}
