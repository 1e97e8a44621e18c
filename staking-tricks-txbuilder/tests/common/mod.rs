#![allow(dead_code)]

use pallas_addresses::Address;
use pallas_crypto::hash::Hash;
use staking_tricks_txbuilder::prelude::*;

pub const TESTNET: u8 = 0;

/// Every machine step and builtin priced at one unit
pub fn params() -> NetworkParams {
    NetworkParams::preview().with_cost_model_v3(vec![1; 350])
}

/// Compiles textual UPLC into the CBOR-wrapped flat bytes scripts are
/// witnessed with
pub fn compile(source: &str) -> Vec<u8> {
    uplc::parser::program(source)
        .unwrap()
        .to_debruijn()
        .unwrap()
        .to_cbor()
        .unwrap()
}

pub fn always_succeeds() -> Script {
    Script::new(
        ScriptKind::PlutusV3,
        compile("(program 1.1.0 (lam ctx (con unit ())))"),
    )
}

pub fn always_fails() -> Script {
    Script::new(ScriptKind::PlutusV3, compile("(program 1.1.0 (lam ctx (error)))"))
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

/// Base address with script payment and script stake parts
pub fn script_address(payment: Hash<28>, stake: Hash<28>) -> Address {
    let mut bytes = vec![0x30 | TESTNET];
    bytes.extend_from_slice(payment.as_ref());
    bytes.extend_from_slice(stake.as_ref());
    Address::from_bytes(&bytes).unwrap()
}

pub fn input(seed: u8, index: u64) -> Input {
    Input::new(Hash::new([seed; 32]), index)
}

pub fn wallet_utxo(seed: u8, index: u64, owner: u8, lovelace: u64) -> Utxo {
    Utxo::new(input(seed, index), Output::new(key_address(owner), lovelace))
}

pub fn script_utxo(seed: u8, index: u64, script: Hash<28>, lovelace: u64) -> Utxo {
    Utxo::new(
        input(seed, index),
        Output::new(script_address(script, script), lovelace),
    )
}
