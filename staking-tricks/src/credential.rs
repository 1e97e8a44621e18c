use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use bech32::FromBase32;
use pallas_addresses::{Address, ShelleyPaymentPart};
use pallas_crypto::hash::Hash;
use staking_tricks_txbuilder::prelude::{Credential, RewardAccount};
use tracing::{debug, trace};

use crate::{
    pattern::{Pattern, PatternTemplates},
    script::{ScriptInstance, ScriptTemplate, SpendingValidator, WithdrawalValidator},
    Error,
};

fn check_network(network: u8) -> Result<u8, Error> {
    match network {
        0 | 1 => Ok(network),
        other => Err(Error::InvalidNetwork(other)),
    }
}

/// Applies the owner's key hash to `template` and wraps the result as a
/// script stake credential
pub fn derive_stake_credential(
    owner: &Hash<28>,
    template: &ScriptTemplate,
) -> Result<(ScriptInstance, Credential), Error> {
    let script = template.apply(&[staking_tricks_txbuilder::plutus::bytes(owner.to_vec())])?;
    let credential = script.credential();

    Ok((script, credential))
}

/// Base address paying to `spending` and delegating through `stake`
pub fn derive_spending_address(
    network: u8,
    spending: &SpendingValidator,
    stake: &Credential,
) -> Result<Address, Error> {
    let network = check_network(network)?;

    // script payment part, header type 3 for a script stake part, 1 for a key
    let kind: u8 = if stake.is_script() { 0b0011 } else { 0b0001 };

    let mut bytes = Vec::with_capacity(57);
    bytes.push(kind << 4 | network);
    bytes.extend_from_slice(spending.hash().as_ref());
    bytes.extend_from_slice(stake.hash().as_ref());

    Address::from_bytes(&bytes).map_err(|e| Error::InvalidAddress(e.to_string()))
}

pub fn derive_reward_address(network: u8, stake: &Credential) -> Result<Address, Error> {
    let network = check_network(network)?;

    RewardAccount::new(network, *stake)
        .to_address()
        .map_err(|e| Error::InvalidAddress(e.to_string()))
}

/// Key hash guarding a wallet or beneficiary address
pub fn payment_key_hash(address: &Address) -> Result<Hash<28>, Error> {
    match address {
        Address::Shelley(x) => match x.payment() {
            ShelleyPaymentPart::Key(hash) => Ok(*hash),
            ShelleyPaymentPart::Script(_) => Err(Error::NotAKeyAddress),
        },
        _ => Err(Error::NotAKeyAddress),
    }
}

/// Pool key hash from a `pool1…` bech32 id or 56 hex characters
pub fn parse_pool_id(pool: &str) -> Result<Hash<28>, Error> {
    let invalid = || Error::InvalidPoolId(pool.to_string());

    let bytes = if pool.starts_with("pool1") {
        let (hrp, data, _) = bech32::decode(pool).map_err(|_| invalid())?;

        if hrp != "pool" {
            return Err(invalid());
        }

        Vec::<u8>::from_base32(&data).map_err(|_| invalid())?
    } else {
        hex::decode(pool).map_err(|_| invalid())?
    };

    let bytes: [u8; 28] = bytes.try_into().map_err(|_| invalid())?;

    Ok(Hash::from(bytes))
}

/// Everything derived for one owner under one pattern
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedScripts {
    pub pattern: Pattern,
    pub owner: Hash<28>,
    pub spending: SpendingValidator,
    pub stake: WithdrawalValidator,
    /// Where the owner's funds are locked
    pub address: Address,
    pub reward_address: Address,
    pub reward_account: RewardAccount,
}

impl DerivedScripts {
    pub fn stake_credential(&self) -> Credential {
        self.stake.credential()
    }
}

type CacheKey = (Pattern, Hash<28>);

/// Derives and memoizes per-owner scripts and addresses
#[derive(Debug)]
pub struct Deriver {
    network: u8,
    templates: PatternTemplates,
    cache: RwLock<HashMap<CacheKey, Arc<DerivedScripts>>>,
}

impl Deriver {
    pub fn new(network: u8, templates: PatternTemplates) -> Result<Self, Error> {
        Ok(Self {
            network: check_network(network)?,
            templates,
            cache: Default::default(),
        })
    }

    pub fn network(&self) -> u8 {
        self.network
    }

    pub fn derive(&self, pattern: Pattern, owner: &Hash<28>) -> Result<Arc<DerivedScripts>, Error> {
        let key = (pattern, *owner);

        if let Some(hit) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            trace!(?pattern, %owner, "derivation cache hit");
            return Ok(hit.clone());
        }

        let (spending, stake) = self.templates.instantiate(pattern, owner)?;

        let spending = SpendingValidator::new(spending);
        let stake = WithdrawalValidator::new(stake);
        let credential = stake.credential();

        let derived = Arc::new(DerivedScripts {
            pattern,
            owner: *owner,
            address: derive_spending_address(self.network, &spending, &credential)?,
            reward_address: derive_reward_address(self.network, &credential)?,
            reward_account: RewardAccount::new(self.network, credential),
            spending,
            stake,
        });

        debug!(
            ?pattern,
            %owner,
            spending = %derived.spending.hash(),
            stake = %derived.stake.hash(),
            "derived scripts"
        );

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);

        Ok(cache.entry(key).or_insert(derived).clone())
    }
}
