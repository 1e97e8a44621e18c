mod common;

use std::collections::{BTreeMap, HashMap};

use common::*;
use pallas_crypto::hash::Hash;
use proptest::prelude::*;
use staking_tricks_txbuilder::prelude::*;

fn resolved_value(utxos: &[Utxo], built: &BuiltTransaction) -> u64 {
    let by_input: HashMap<_, _> = utxos.iter().map(|x| (x.input, x.output.lovelace())).collect();

    built.inputs.iter().map(|x| by_input[x]).sum()
}

#[test]
fn simple_payment_is_balanced() {
    let wallet = vec![
        wallet_utxo(1, 0, 1, 3_000_000),
        wallet_utxo(2, 0, 1, 40_000_000),
    ];

    let built = StagingTransaction::new()
        .change_address(key_address(1))
        .output(Output::new(key_address(2), 10_000_000))
        .complete(&wallet, &params())
        .unwrap();

    // the largest utxo covers everything on its own
    assert_eq!(built.inputs, vec![input(2, 0)]);

    let out: u64 = built.outputs.iter().map(|x| x.lovelace()).sum();
    assert_eq!(resolved_value(&wallet, &built), out + built.fee);

    let tx_size = built.tx_bytes.len() as u64;
    let min_fee = Fee::linear(&params().protocol).min_fee(tx_size, ExUnits::default());
    assert!(built.fee >= min_fee);
}

#[test]
fn deposits_and_refunds_are_accounted() {
    let credential = Credential::Key(key_hash(1));
    let wallet = vec![wallet_utxo(1, 0, 1, 10_000_000)];

    let built = StagingTransaction::new()
        .change_address(key_address(1))
        .certificate(Certificate::RegisterAndDelegate {
            credential,
            pool: key_hash(0xaa),
            drep: DRep::Abstain,
            deposit: 2_000_000,
        })
        .complete(&wallet, &params())
        .unwrap();

    let out: u64 = built.outputs.iter().map(|x| x.lovelace()).sum();
    assert_eq!(10_000_000, out + built.fee + 2_000_000);

    let built = StagingTransaction::new()
        .change_address(key_address(1))
        .certificate(Certificate::Deregister {
            credential,
            refund: 2_000_000,
        })
        .complete(&wallet, &params())
        .unwrap();

    let out: u64 = built.outputs.iter().map(|x| x.lovelace()).sum();
    assert_eq!(10_000_000 + 2_000_000, out + built.fee);
}

fn token_policy() -> Hash<28> {
    Hash::new([0x70; 28])
}

fn with_tokens(lovelace: u64, amount: u64) -> Value {
    Value {
        lovelace,
        assets: BTreeMap::from([(token_policy(), BTreeMap::from([(b"tok".to_vec(), amount)]))]),
    }
}

fn token_utxo(seed: u8, owner: u8, lovelace: u64, amount: u64) -> Utxo {
    Utxo::new(
        input(seed, 0),
        Output::with_value(key_address(owner), with_tokens(lovelace, amount)),
    )
}

#[test]
fn script_spends_get_collateral() {
    let script = always_succeeds();
    let locked = script_utxo(5, 0, script.hash(), 5_000_000);
    let wallet = vec![
        wallet_utxo(1, 0, 1, 20_000_000),
        wallet_utxo(2, 0, 1, 6_000_000),
    ];

    let params = params();

    let built = StagingTransaction::new()
        .change_address(key_address(1))
        .input(locked.clone())
        .add_spend_redeemer(locked.input, plutus::void(), None)
        .script(script.kind, script.bytes.clone())
        .complete(&wallet, &params)
        .unwrap();

    let tx = pallas_primitives::conway::Tx::decode_fragment(&built.tx_bytes).unwrap();
    let body = tx.transaction_body;

    let collateral = body.collateral.expect("collateral inputs");
    assert_eq!(collateral.len(), 1);

    let total = body.total_collateral.expect("total collateral");
    assert!(total * 100 >= built.fee * params.protocol.collateral_percentage);

    assert!(body.collateral_return.is_some());
}

fn spend_locked(params: &NetworkParams, ex_units: Option<ExUnits>) -> BuiltTransaction {
    let script = always_succeeds();
    let locked = script_utxo(5, 0, script.hash(), 5_000_000);

    StagingTransaction::new()
        .change_address(key_address(1))
        .input(locked.clone())
        .add_spend_redeemer(locked.input, plutus::void(), ex_units)
        .script(script.kind, script.bytes)
        .complete(&[wallet_utxo(1, 0, 1, 20_000_000)], params)
        .unwrap()
}

#[test]
fn script_fees_follow_measured_units() {
    let params = params();

    let mut roomier = params.clone();
    roomier.protocol.max_tx_ex_units = ExUnits {
        mem: params.protocol.max_tx_ex_units.mem * 2,
        steps: params.protocol.max_tx_ex_units.steps * 2,
    };

    let built = spend_locked(&params, None);
    let again = spend_locked(&roomier, None);

    assert_eq!(built.fee, again.fee);

    let units = built.redeemers[0].ex_units;
    assert!(units.mem > 0 && units.steps > 0);
    assert!(units.mem < params.protocol.max_tx_ex_units.mem / 1_000);
    assert!(units.steps < params.protocol.max_tx_ex_units.steps / 1_000);

    // a plain payment of this size costs about 0.17 ada
    assert!(built.fee < 300_000);
}

#[test]
fn measured_units_carry_a_margin() {
    let params = params();
    let built = spend_locked(&params, None);

    let resolved = [
        script_utxo(5, 0, always_succeeds().hash(), 5_000_000),
        wallet_utxo(1, 0, 1, 20_000_000),
    ];

    let measured = eval_tx(&built.tx_bytes, &resolved, &params).unwrap();

    assert_eq!(measured.len(), 1);
    assert_eq!(measured[0].tag, RedeemerTag::Spend);
    assert_eq!(built.redeemers[0].ex_units, measured[0].units.with_margin());
}

#[test]
fn declared_units_are_kept() {
    let declared = ExUnits {
        mem: 50_000,
        steps: 20_000_000,
    };

    let built = spend_locked(&params(), Some(declared));

    assert_eq!(built.redeemers[0].ex_units, declared);
}

#[test]
fn failing_scripts_stop_balancing() {
    let script = always_fails();
    let locked = script_utxo(5, 0, script.hash(), 5_000_000);

    let err = StagingTransaction::new()
        .change_address(key_address(1))
        .input(locked.clone())
        .add_spend_redeemer(locked.input, plutus::void(), None)
        .script(script.kind, script.bytes)
        .complete(&[wallet_utxo(1, 0, 1, 20_000_000)], &params())
        .unwrap_err();

    assert!(matches!(err, TxBuilderError::ScriptEvaluation(_)));
}

#[test]
fn change_returns_wallet_tokens() {
    let wallet = vec![wallet_utxo(1, 0, 1, 3_000_000), token_utxo(2, 1, 10_000_000, 42)];

    let built = StagingTransaction::new()
        .change_address(key_address(1))
        .output(Output::new(key_address(2), 5_000_000))
        .complete(&wallet, &params())
        .unwrap();

    // the pure-ada utxo goes first and can't pay on its own
    assert_eq!(built.inputs.len(), 2);

    let change: Vec<_> = built
        .outputs
        .iter()
        .filter(|x| x.address == key_address(1))
        .collect();

    assert_eq!(change.len(), 1);
    assert_eq!(change[0].value.assets, with_tokens(0, 42).assets);

    let out: u64 = built.outputs.iter().map(|x| x.lovelace()).sum();
    assert_eq!(13_000_000, out + built.fee);
}

#[test]
fn unpayable_tokens_are_reported() {
    let err = StagingTransaction::new()
        .change_address(key_address(1))
        .output(Output::with_value(key_address(2), with_tokens(5_000_000, 10)))
        .complete(&[wallet_utxo(1, 0, 1, 100_000_000)], &params())
        .unwrap_err();

    assert_eq!(err, TxBuilderError::InsufficientAssets);

    let err = StagingTransaction::new()
        .change_address(key_address(1))
        .output(Output::with_value(key_address(2), with_tokens(5_000_000, 50)))
        .complete(&[token_utxo(2, 1, 100_000_000, 42)], &params())
        .unwrap_err();

    assert_eq!(err, TxBuilderError::InsufficientAssets);
}

#[test]
fn token_change_below_minimum_is_not_burned() {
    // ada left after the payment is too little to carry the tokens back
    let err = StagingTransaction::new()
        .change_address(key_address(1))
        .output(Output::new(key_address(2), 5_000_000))
        .complete(&[token_utxo(2, 1, 5_500_000, 42)], &params())
        .unwrap_err();

    assert!(matches!(err, TxBuilderError::InsufficientFunds(_)));
}

#[test]
fn fee_covers_signers() {
    let wallet = vec![wallet_utxo(1, 0, 1, 20_000_000)];
    let params = params();

    let plain = StagingTransaction::new()
        .change_address(key_address(1))
        .output(Output::new(key_address(2), 2_000_000))
        .complete(&wallet, &params)
        .unwrap();

    let signed = StagingTransaction::new()
        .change_address(key_address(1))
        .output(Output::new(key_address(2), 2_000_000))
        .disclosed_signer(key_hash(7))
        .complete(&wallet, &params)
        .unwrap();

    assert!(signed.fee > plain.fee);
}

fn hash_seeds() -> impl Strategy<Value = (Vec<u8>, Vec<u8>)> {
    proptest::collection::btree_set(any::<u8>(), 2..12).prop_flat_map(|seeds| {
        let seeds: Vec<u8> = seeds.into_iter().collect();
        let len = seeds.len();

        (Just(seeds), 1..len).prop_map(|(seeds, split)| {
            let (locked, wallet) = seeds.split_at(split);
            (locked.to_vec(), wallet.to_vec())
        })
    })
}

proptest! {
    #[test]
    fn correlations_point_at_final_positions((locked_seeds, wallet_seeds) in hash_seeds()) {
        let script = always_succeeds();
        let account = RewardAccount::new(TESTNET, Credential::Script(script.hash()));

        let locked: Vec<_> = locked_seeds
            .iter()
            .map(|s| script_utxo(*s, 0, script.hash(), 3_000_000))
            .collect();

        let wallet: Vec<_> = wallet_seeds
            .iter()
            .map(|s| wallet_utxo(*s, 1, 1, 100_000_000))
            .collect();

        let mut staging = StagingTransaction::new()
            .change_address(key_address(1))
            .withdrawal(account.clone(), 0)
            .script(script.kind, script.bytes.clone());

        let mut outputs = vec![];

        for utxo in locked.iter() {
            outputs.push(staging.outputs.len());

            staging = staging
                .input(utxo.clone())
                .output(Output::new(utxo.output.address.clone(), 4_000_000))
                .add_spend_redeemer(utxo.input, plutus::constr(0).into(), None);
        }

        let inputs = locked.iter().map(|x| x.input).collect();

        let built = staging
            .add_correlated_redeemer(RedeemerPurpose::Reward(account), inputs, outputs.clone(), None)
            .unwrap()
            .complete(&wallet, &params())
            .unwrap();

        let redeemer = built.redeemer(RedeemerTag::Reward, 0).unwrap();
        let correlation = IndexCorrelation::from_plutus_data(&redeemer.data).unwrap();

        prop_assert_eq!(correlation.len(), locked.len());
        prop_assert_eq!(&correlation.output_idxs, &outputs.iter().map(|x| *x as u64).collect::<Vec<_>>());

        for (i, utxo) in locked.iter().enumerate() {
            let position = correlation.input_idxs[i] as usize;
            prop_assert_eq!(built.inputs[position], utxo.input);

            let output = &built.outputs[correlation.output_idxs[i] as usize];
            prop_assert_eq!(&output.address, &utxo.output.address);
        }

        let mut sorted = built.inputs.clone();
        sorted.sort();
        prop_assert_eq!(sorted, built.inputs.clone());
    }
}
