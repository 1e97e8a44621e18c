use pallas_addresses::{Address, ShelleyPaymentPart};
use pallas_crypto::hash::{Hash, Hasher};
use pallas_primitives::conway::PlutusData;

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use serde::{Deserialize, Serialize};

use crate::{
    correlate::{CorrelationToken, Correlator},
    TxBuilderError,
};

use super::{AssetName, PolicyId, PoolKeyHash, PubKeyHash, ScriptHash, TransactionStatus, TxHash};

#[derive(Default, Debug, Clone)]
pub struct StagingTransaction {
    pub status: TransactionStatus,
    pub inputs: Vec<Utxo>,
    pub outputs: Vec<Output>,
    pub fee: Option<u64>,
    pub valid_from_slot: Option<u64>,
    pub network_id: Option<u8>,
    pub collateral_inputs: Vec<Utxo>,
    pub collateral_output: Option<Output>,
    pub total_collateral: Option<u64>,
    pub disclosed_signers: BTreeSet<PubKeyHash>,
    pub scripts: BTreeMap<ScriptHash, Script>,
    pub certificates: Vec<Certificate>,
    pub withdrawals: BTreeMap<RewardAccount, u64>,
    pub redeemers: BTreeMap<RedeemerPurpose, (RedeemerData, Option<ExUnits>)>,
    pub correlator: Correlator,
    pub change_address: Option<Address>,
}

impl StagingTransaction {
    pub fn new() -> Self {
        Self {
            status: TransactionStatus::Staging,
            ..Default::default()
        }
    }

    /// Spends a resolved output. Inputs keep the order they were added in
    /// until the transaction is built.
    pub fn input(mut self, utxo: Utxo) -> Self {
        self.inputs.push(utxo);
        self
    }

    pub fn remove_input(mut self, input: Input) -> Self {
        self.inputs.retain(|x| x.input != input);
        self
    }

    pub fn output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn fee(mut self, fee: u64) -> Self {
        self.fee = Some(fee);
        self
    }

    pub fn valid_from_slot(mut self, slot: u64) -> Self {
        self.valid_from_slot = Some(slot);
        self
    }

    pub fn network_id(mut self, id: u8) -> Self {
        self.network_id = Some(id);
        self
    }

    pub fn collateral_input(mut self, utxo: Utxo) -> Self {
        self.collateral_inputs.push(utxo);
        self
    }

    pub fn collateral_output(mut self, output: Output) -> Self {
        self.collateral_output = Some(output);
        self
    }

    pub fn total_collateral(mut self, lovelace: u64) -> Self {
        self.total_collateral = Some(lovelace);
        self
    }

    pub fn disclosed_signer(mut self, pub_key_hash: Hash<28>) -> Self {
        self.disclosed_signers.insert(pub_key_hash);
        self
    }

    /// Attaches a script witness, keyed by its hash so that attaching the
    /// same script twice is a no-op
    pub fn script(mut self, language: ScriptKind, bytes: Vec<u8>) -> Self {
        let script = Script::new(language, bytes);
        self.scripts.insert(script.hash(), script);
        self
    }

    pub fn certificate(mut self, certificate: Certificate) -> Self {
        self.certificates.push(certificate);
        self
    }

    pub fn withdrawal(mut self, account: RewardAccount, lovelace: u64) -> Self {
        self.withdrawals.insert(account, lovelace);
        self
    }

    pub fn add_spend_redeemer(
        mut self,
        input: Input,
        plutus_data: PlutusData,
        ex_units: Option<ExUnits>,
    ) -> Self {
        self.redeemers.insert(
            RedeemerPurpose::Spend(input),
            (RedeemerData::Ready(plutus_data), ex_units),
        );

        self
    }

    pub fn add_reward_redeemer(
        mut self,
        account: RewardAccount,
        plutus_data: PlutusData,
        ex_units: Option<ExUnits>,
    ) -> Self {
        self.redeemers.insert(
            RedeemerPurpose::Reward(account),
            (RedeemerData::Ready(plutus_data), ex_units),
        );

        self
    }

    /// Redeemer for the certificate at `index` in certificate order
    pub fn add_cert_redeemer(
        mut self,
        index: usize,
        plutus_data: PlutusData,
        ex_units: Option<ExUnits>,
    ) -> Self {
        self.redeemers.insert(
            RedeemerPurpose::Cert(index),
            (RedeemerData::Ready(plutus_data), ex_units),
        );

        self
    }

    /// Registers a redeemer whose payload pairs each of `inputs` with the
    /// output at the same position of `outputs`. The payload is only computed
    /// at build time, once the canonical input order is known.
    pub fn add_correlated_redeemer(
        mut self,
        purpose: RedeemerPurpose,
        inputs: Vec<Input>,
        outputs: Vec<usize>,
        ex_units: Option<ExUnits>,
    ) -> Result<Self, TxBuilderError> {
        let token = self.correlator.register(inputs, outputs)?;

        self.redeemers
            .insert(purpose, (RedeemerData::Deferred(token), ex_units));

        Ok(self)
    }

    pub fn remove_redeemer(mut self, purpose: &RedeemerPurpose) -> Self {
        self.redeemers.remove(purpose);
        self
    }

    pub fn change_address(mut self, address: Address) -> Self {
        self.change_address = Some(address);
        self
    }

    pub(crate) fn spends(&self, input: &Input) -> bool {
        self.inputs.iter().any(|x| x.input == *input)
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Clone, Copy)]
pub struct Input {
    pub tx_hash: TxHash,
    pub txo_index: u64,
}

impl Input {
    pub fn new(tx_hash: Hash<32>, txo_index: u64) -> Self {
        Self { tx_hash, txo_index }
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_hash, self.txo_index)
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct Value {
    pub lovelace: u64,
    pub assets: BTreeMap<PolicyId, BTreeMap<AssetName, u64>>,
}

impl Value {
    pub fn lovelace(lovelace: u64) -> Self {
        Self {
            lovelace,
            ..Default::default()
        }
    }

    pub fn has_assets(&self) -> bool {
        !self.assets.is_empty()
    }

    pub fn checked_add(&self, other: &Value) -> Option<Value> {
        let mut out = self.clone();
        out.lovelace = out.lovelace.checked_add(other.lovelace)?;

        for (policy, names) in &other.assets {
            for (name, amount) in names {
                let held = out
                    .assets
                    .entry(*policy)
                    .or_default()
                    .entry(name.clone())
                    .or_default();

                *held = held.checked_add(*amount)?;
            }
        }

        Some(out)
    }

    /// `None` when `other` holds more of any component than `self`
    pub fn checked_sub(&self, other: &Value) -> Option<Value> {
        let mut out = self.clone();
        out.lovelace = out.lovelace.checked_sub(other.lovelace)?;

        for (policy, names) in &other.assets {
            let held_names = out.assets.get_mut(policy)?;

            for (name, amount) in names {
                let held = held_names.get_mut(name)?;
                *held = held.checked_sub(*amount)?;

                if *held == 0 {
                    held_names.remove(name);
                }
            }

            if held_names.is_empty() {
                out.assets.remove(policy);
            }
        }

        Some(out)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct Output {
    pub address: Address,
    pub value: Value,
    pub datum: Option<Datum>,
    pub script: Option<Script>,
}

impl Output {
    pub fn new(address: Address, lovelace: u64) -> Self {
        Self::with_value(address, Value::lovelace(lovelace))
    }

    pub fn with_value(address: Address, value: Value) -> Self {
        Self {
            address,
            value,
            datum: None,
            script: None,
        }
    }

    pub fn lovelace(&self) -> u64 {
        self.value.lovelace
    }

    /// Sets a CBOR-encoded plutus data as the inline datum
    pub fn set_inline_datum(mut self, plutus_data: Vec<u8>) -> Self {
        self.datum = Some(Datum::Inline(plutus_data));
        self
    }

    pub fn set_datum_hash(mut self, datum_hash: Hash<32>) -> Self {
        self.datum = Some(Datum::Hash(datum_hash));
        self
    }

    pub fn set_inline_script(mut self, language: ScriptKind, bytes: Vec<u8>) -> Self {
        self.script = Some(Script::new(language, bytes));
        self
    }

    /// Key hash guarding the output, `None` for script-locked and Byron
    /// addresses
    pub fn payment_key_hash(&self) -> Option<PubKeyHash> {
        match &self.address {
            Address::Shelley(x) => match x.payment() {
                ShelleyPaymentPart::Key(hash) => Some(*hash),
                ShelleyPaymentPart::Script(_) => None,
            },
            _ => None,
        }
    }
}

/// An unspent output together with the reference that spends it
#[derive(PartialEq, Debug, Clone)]
pub struct Utxo {
    pub input: Input,
    pub output: Output,
}

impl Utxo {
    pub fn new(input: Input, output: Output) -> Self {
        Self { input, output }
    }
}

/// Script languages the builder can witness. Only PlutusV3 has a language
/// view in the script data hash.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    PlutusV3,
}

impl ScriptKind {
    /// Language tag prepended to the script bytes when hashing
    pub fn tag(&self) -> u8 {
        match self {
            ScriptKind::PlutusV3 => 3,
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Script {
    pub kind: ScriptKind,
    pub bytes: Vec<u8>,
}

impl Script {
    pub fn new(kind: ScriptKind, bytes: Vec<u8>) -> Self {
        Self { kind, bytes }
    }

    pub fn hash(&self) -> ScriptHash {
        Hasher::<224>::hash_tagged(&self.bytes, self.kind.tag())
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Datum {
    Hash(Hash<32>),
    /// CBOR-encoded plutus data
    Inline(Vec<u8>),
}

#[derive(Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Clone, Copy)]
pub enum Credential {
    Key(Hash<28>),
    Script(Hash<28>),
}

impl Credential {
    pub fn hash(&self) -> &Hash<28> {
        match self {
            Credential::Key(x) | Credential::Script(x) => x,
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self, Credential::Script(_))
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum DRep {
    Abstain,
    NoConfidence,
    Credential(Credential),
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Certificate {
    /// Registers the stake credential, delegates it to a pool and its voting
    /// power to a DRep in a single certificate
    RegisterAndDelegate {
        credential: Credential,
        pool: PoolKeyHash,
        drep: DRep,
        deposit: u64,
    },
    Deregister {
        credential: Credential,
        refund: u64,
    },
}

impl Certificate {
    pub fn credential(&self) -> &Credential {
        match self {
            Certificate::RegisterAndDelegate { credential, .. } => credential,
            Certificate::Deregister { credential, .. } => credential,
        }
    }

    pub fn deposit(&self) -> u64 {
        match self {
            Certificate::RegisterAndDelegate { deposit, .. } => *deposit,
            Certificate::Deregister { .. } => 0,
        }
    }

    pub fn refund(&self) -> u64 {
        match self {
            Certificate::RegisterAndDelegate { .. } => 0,
            Certificate::Deregister { refund, .. } => *refund,
        }
    }
}

/// Stake credential plus network, the key of the withdrawals map
#[derive(PartialEq, Eq, Debug, Hash, Clone)]
pub struct RewardAccount {
    network: u8,
    credential: Credential,
}

impl RewardAccount {
    pub fn new(network: u8, credential: Credential) -> Self {
        Self {
            network: network & 0x0f,
            credential,
        }
    }

    pub fn from_address(address: &Address) -> Option<Self> {
        let bytes = match address {
            Address::Stake(_) => address.to_vec(),
            _ => return None,
        };

        let header = *bytes.first()?;
        let raw: [u8; 28] = bytes.get(1..29)?.try_into().ok()?;
        let hash = Hash::<28>::from(raw);

        let credential = if header & 0x10 != 0 {
            Credential::Script(hash)
        } else {
            Credential::Key(hash)
        };

        Some(Self::new(header, credential))
    }

    pub fn network(&self) -> u8 {
        self.network
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let header = match self.credential {
            Credential::Key(_) => 0xe0,
            Credential::Script(_) => 0xf0,
        } | self.network;

        let mut bytes = Vec::with_capacity(29);
        bytes.push(header);
        bytes.extend_from_slice(self.credential.hash().as_ref());
        bytes
    }

    pub fn to_address(&self) -> Result<Address, pallas_addresses::Error> {
        Address::from_bytes(&self.to_vec())
    }
}

impl Ord for RewardAccount {
    // ledger map order: network first, script credentials before key ones
    fn cmp(&self, other: &Self) -> Ordering {
        let key = |x: &Self| (x.network, !x.credential.is_script(), *x.credential.hash());
        key(self).cmp(&key(other))
    }
}

impl PartialOrd for RewardAccount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone)]
pub enum RedeemerPurpose {
    Spend(Input),
    Reward(RewardAccount),
    Cert(usize),
}

#[derive(PartialEq, Debug, Clone)]
pub enum RedeemerData {
    Ready(PlutusData),
    /// Payload computed from a registered correlation once inputs are sorted
    Deferred(CorrelationToken),
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct ExUnits {
    pub mem: u64,
    pub steps: u64,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum RedeemerTag {
    Spend,
    Cert,
    Reward,
}

/// A redeemer as it was written into the witness set
#[derive(PartialEq, Debug, Clone)]
pub struct BuiltRedeemer {
    pub tag: RedeemerTag,
    pub index: u32,
    pub data: PlutusData,
    pub ex_units: ExUnits,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum BuilderEra {
    Conway,
}

#[derive(PartialEq, Debug, Clone)]
pub struct BuiltTransaction {
    pub era: BuilderEra,
    pub status: TransactionStatus,
    pub tx_hash: TxHash,
    pub tx_bytes: Vec<u8>,
    pub fee: u64,
    /// Spent inputs in canonical order
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub redeemers: Vec<BuiltRedeemer>,
}

impl BuiltTransaction {
    pub fn hex_encoded(&self) -> String {
        hex::encode(&self.tx_bytes)
    }

    pub fn redeemer(&self, tag: RedeemerTag, index: u32) -> Option<&BuiltRedeemer> {
        self.redeemers
            .iter()
            .find(|x| x.tag == tag && x.index == index)
    }

    pub fn input_position(&self, input: &Input) -> Option<usize> {
        self.inputs.iter().position(|x| x == input)
    }
}
