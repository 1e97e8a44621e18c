#![allow(dead_code)]

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use pallas_addresses::Address;
use pallas_crypto::hash::Hash;
use staking_tricks::{
    txbuilder::{prelude::*, NetworkParams},
    Assembler, Blueprint, ChainOracle, OracleError, PatternTemplates, TemplateTitles,
};

pub const TESTNET: u8 = 0;

/// Compiles textual UPLC into a blueprint's CBOR-wrapped flat bytes
pub fn compile(source: &str) -> String {
    let program = uplc::parser::program(source).unwrap().to_debruijn().unwrap();
    hex::encode(program.to_cbor().unwrap())
}

/// Validators that accept anything. Each returns unit after discarding a
/// distinct integer so that every template hashes differently, and the
/// parameterized ones take the owner before the script context.
pub fn blueprint() -> String {
    let unparameterized = |n: u8| {
        compile(&format!(
            "(program 1.1.0 (lam ctx [(lam n (con unit ())) (con integer {n})]))"
        ))
    };

    let parameterized = |n: u8| {
        compile(&format!(
            "(program 1.1.0 (lam owner (lam ctx [(lam n (con unit ())) (con integer {n})])))"
        ))
    };

    serde_json::json!({
        "preamble": { "title": "staking/tricks", "plutusVersion": "v3" },
        "validators": [
            { "title": "owner.spend.spend", "compiledCode": unparameterized(0) },
            { "title": "owner.stake.withdraw", "compiledCode": parameterized(1) },
            { "title": "dry.spend.spend", "compiledCode": unparameterized(2) },
            { "title": "dry.stake.withdraw", "compiledCode": parameterized(3) },
            { "title": "withdraw0.withdraw0.spend", "compiledCode": parameterized(4) }
        ]
    })
    .to_string()
}

/// Every machine step and builtin priced at one unit
pub fn params() -> NetworkParams {
    NetworkParams::preview().with_cost_model_v3(vec![1; 350])
}

pub fn templates() -> PatternTemplates {
    Blueprint::from_json(&blueprint())
        .unwrap()
        .templates(&TemplateTitles::default())
        .unwrap()
}

/// Debug logs for whichever test runs first; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish(),
    );
}

pub fn assembler() -> Assembler {
    init_tracing();
    Assembler::new(params(), templates()).unwrap()
}

pub fn key_hash(seed: u8) -> Hash<28> {
    Hash::new([seed; 28])
}

/// Enterprise address guarded by a key
pub fn key_address(seed: u8) -> Address {
    let mut bytes = vec![0x60 | TESTNET];
    bytes.extend_from_slice(key_hash(seed).as_ref());
    Address::from_bytes(&bytes).unwrap()
}

pub fn input(seed: u8, index: u64) -> Input {
    Input::new(Hash::new([seed; 32]), index)
}

pub fn wallet_utxo(seed: u8, owner: u8, lovelace: u64) -> Utxo {
    Utxo::new(input(seed, 0), Output::new(key_address(owner), lovelace))
}

pub fn locked_utxo(seed: u8, address: &Address, lovelace: u64, datum: Option<Vec<u8>>) -> Utxo {
    let mut output = Output::new(address.clone(), lovelace);
    output.datum = datum.map(Datum::Inline);

    Utxo::new(input(seed, 1), output)
}

/// Chain state served from memory, optionally answering late
#[derive(Default)]
pub struct MockOracle {
    pub now: u64,
    pub rewards: Option<u64>,
    pub utxos: HashMap<Vec<u8>, Vec<Utxo>>,
    pub delay: Option<Duration>,
}

impl MockOracle {
    pub fn with_utxos(mut self, address: &Address, utxos: Vec<Utxo>) -> Self {
        self.utxos.entry(address.to_vec()).or_default().extend(utxos);
        self
    }

    async fn wait(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ChainOracle for MockOracle {
    async fn current_reward_balance(&self, _: &Address) -> Result<Option<u64>, OracleError> {
        self.wait().await;
        Ok(self.rewards)
    }

    async fn current_chain_time(&self) -> Result<u64, OracleError> {
        self.wait().await;
        Ok(self.now)
    }

    async fn list_utxos_at(&self, address: &Address) -> Result<Vec<Utxo>, OracleError> {
        self.wait().await;
        Ok(self.utxos.get(&address.to_vec()).cloned().unwrap_or_default())
    }
}
