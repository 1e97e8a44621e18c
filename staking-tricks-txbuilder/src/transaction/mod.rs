use pallas_crypto::hash::Hash;
use serde::{Deserialize, Serialize};

pub mod model;

pub type TxHash = Hash<32>;
pub type PubKeyHash = Hash<28>;
pub type ScriptHash = Hash<28>;
pub type PolicyId = Hash<28>;
pub type PoolKeyHash = Hash<28>;
pub type AssetName = Vec<u8>;

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Default, Clone, Copy)]
pub enum TransactionStatus {
    #[default]
    Staging,
    Built,
}
