mod common;

use std::time::Duration;

use async_trait::async_trait;
use common::*;
use pallas_crypto::hash::Hash;
use staking_tricks::{
    txbuilder::prelude::*, ClientConfig, Error, OracleError, Pattern, StakingClient, SubmitError,
    Submitter, TimeLockDatum,
};

const T: u64 = 1_700_000_000_000;
const ADA: u64 = 1_000_000;

fn staking_client(oracle: MockOracle) -> StakingClient<MockOracle> {
    StakingClient::new(oracle, assembler(), ClientConfig::default())
}

fn funded(owner: u8) -> MockOracle {
    let utxo = wallet_utxo(owner, owner, 100 * ADA);
    MockOracle::default().with_utxos(&key_address(owner), vec![utxo])
}

struct Wallet(Result<Hash<32>, SubmitError>);

#[async_trait]
impl Submitter for Wallet {
    async fn sign_and_submit(&self, _: &BuiltTransaction) -> Result<Hash<32>, SubmitError> {
        self.0.clone()
    }
}

#[tokio::test]
async fn actions_need_a_connected_wallet() {
    let client = staking_client(funded(1));

    assert!(matches!(
        client.deposit(Pattern::Owner, 5 * ADA).await,
        Err(Error::Uninitialized)
    ));

    assert!(matches!(
        client.withdraw_stake(Pattern::Dry).await,
        Err(Error::Uninitialized)
    ));
}

#[tokio::test]
async fn connect_rejects_script_addresses() {
    let mut client = staking_client(funded(1));
    let derived = client.assembler().derive(Pattern::Owner, &key_hash(1)).unwrap();

    assert!(matches!(
        client.connect(derived.address.clone()),
        Err(Error::NotAKeyAddress)
    ));
}

#[tokio::test]
async fn withdraw_stake_without_rewards_fails_before_building() {
    let mut oracle = funded(1);
    oracle.rewards = Some(0);

    let mut client = staking_client(oracle);
    client.connect(key_address(1)).unwrap();

    assert!(matches!(
        client.withdraw_stake(Pattern::Withdraw0).await,
        Err(Error::NoRewardsYet)
    ));
}

#[tokio::test]
async fn mismatched_batches_fail_before_any_query() {
    // a stalled oracle would time out if it were asked anything
    let mut oracle = funded(1);
    oracle.delay = Some(Duration::from_secs(3600));

    let mut client = StakingClient::new(
        oracle,
        assembler(),
        ClientConfig {
            oracle_timeout_ms: 50,
        },
    );
    client.connect(key_address(1)).unwrap();

    let locked = locked_utxo(1, &key_address(9), 5 * ADA, None);

    assert!(matches!(
        client.top_up(&[locked], &[ADA, ADA]).await,
        Err(Error::MismatchedBatch { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn slow_oracles_are_unavailable() {
    let mut oracle = funded(1);
    oracle.delay = Some(Duration::from_secs(60));

    let mut client = staking_client(oracle);
    client.connect(key_address(1)).unwrap();

    let err = client.deposit(Pattern::Owner, 5 * ADA).await.unwrap_err();

    assert!(matches!(err, Error::Oracle(OracleError::Unavailable(_))));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn claim_picks_expired_locks_for_the_caller() {
    let alice = key_address(1);
    let bob = key_address(2);

    let assembler = assembler();
    let from = assembler.derive(Pattern::Withdraw0, &key_hash(1)).unwrap();

    let datum = TimeLockDatum::new(T, key_hash(2)).to_cbor().unwrap();
    let lock = locked_utxo(7, &from.address, 5 * ADA, Some(datum));

    let mut oracle = funded(2).with_utxos(&from.address, vec![lock.clone()]);
    oracle.now = T - 1;

    let mut client = staking_client(oracle);
    client.connect(bob.clone()).unwrap();

    assert!(matches!(
        client.claim(&alice).await,
        Err(Error::NothingToClaim)
    ));

    let mut oracle = funded(2).with_utxos(&from.address, vec![lock.clone()]);
    oracle.now = T + 1;

    let mut client = staking_client(oracle);
    client.connect(bob).unwrap();

    let built = client.claim(&alice).await.unwrap();
    assert!(built.input_position(&lock.input).is_some());
}

#[tokio::test]
async fn top_up_withdraws_the_live_balance() {
    let assembler = assembler();
    let derived = assembler.derive(Pattern::Withdraw0, &key_hash(1)).unwrap();

    let selected = vec![
        locked_utxo(3, &derived.address, 5 * ADA, None),
        locked_utxo(4, &derived.address, 5 * ADA, None),
    ];

    let mut oracle = funded(1);
    oracle.rewards = Some(1_234_567);

    let mut client = staking_client(oracle);
    client.connect(key_address(1)).unwrap();

    let built = client.top_up(&selected, &[ADA, 2 * ADA]).await.unwrap();

    let redeemer = built.redeemer(RedeemerTag::Reward, 0).unwrap();
    let correlation = IndexCorrelation::from_plutus_data(&redeemer.data).unwrap();
    assert_eq!(correlation.len(), 2);

    let change: u64 = built.outputs[2..].iter().map(|x| x.lovelace()).sum();
    assert_eq!(100 * ADA + 1_234_567, change + 3 * ADA + built.fee);
}

#[tokio::test]
async fn delegation_accepts_hex_pool_ids() {
    let mut client = staking_client(funded(1));
    client.connect(key_address(1)).unwrap();

    let pool = hex::encode([0xaa; 28]);
    let built = client
        .delegate_stake(Pattern::Owner, &pool, DRep::NoConfidence)
        .await
        .unwrap();

    assert!(built.redeemer(RedeemerTag::Cert, 0).is_some());

    assert!(matches!(
        client
            .delegate_stake(Pattern::Owner, "pool1nope", DRep::Abstain)
            .await,
        Err(Error::InvalidPoolId(_))
    ));
}

#[tokio::test]
async fn submission_errors_are_classified() {
    let mut client = staking_client(funded(1));
    client.connect(key_address(1)).unwrap();

    let built = client.deposit(Pattern::Dry, 5 * ADA).await.unwrap();

    let id = client
        .submit(&Wallet(Ok(built.tx_hash)), &built)
        .await
        .unwrap();
    assert_eq!(id, built.tx_hash);

    let rejected = client
        .submit(&Wallet(Err(SubmitError::WalletRejected("user".into()))), &built)
        .await
        .unwrap_err();
    assert!(!rejected.is_retryable());

    let dropped = client
        .submit(
            &Wallet(Err(SubmitError::NetworkSubmitError("mempool full".into()))),
            &built,
        )
        .await
        .unwrap_err();
    assert!(dropped.is_retryable());
}

#[test]
fn config_defaults_to_ten_seconds() {
    let config: ClientConfig = serde_json::from_str("{}").unwrap();

    assert_eq!(config, ClientConfig::default());
    assert_eq!(config.oracle_timeout(), Duration::from_secs(10));
}
