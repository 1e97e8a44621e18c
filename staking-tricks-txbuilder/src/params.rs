use serde::{Deserialize, Serialize};

use crate::{prelude::ExUnits, TxBuilderError};

/// Exact rational used for execution unit prices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratio {
    pub numerator: u64,
    pub denominator: u64,
}

impl Ratio {
    pub const fn new(numerator: u64, denominator: u64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }
}

/// Maps POSIX milliseconds onto Shelley-era slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotConfig {
    pub zero_time: u64,
    pub zero_slot: u64,
    pub slot_length: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParams {
    pub min_fee_a: u64,
    pub min_fee_b: u64,
    pub key_deposit: u64,
    pub coins_per_utxo_byte: u64,
    pub price_mem: Ratio,
    pub price_steps: Ratio,
    pub max_tx_ex_units: ExUnits,
    pub collateral_percentage: u64,
    #[serde(default)]
    pub cost_model_v3: Vec<i64>,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            min_fee_a: 44,
            min_fee_b: 155_381,
            key_deposit: 2_000_000,
            coins_per_utxo_byte: 4_310,
            price_mem: Ratio::new(577, 10_000),
            price_steps: Ratio::new(721, 10_000_000),
            max_tx_ex_units: ExUnits {
                mem: 14_000_000,
                steps: 10_000_000_000,
            },
            collateral_percentage: 150,
            cost_model_v3: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub network_id: u8,
    pub slot_config: SlotConfig,
    #[serde(default)]
    pub protocol: ProtocolParams,
}

impl NetworkParams {
    pub fn mainnet() -> Self {
        Self {
            network_id: 1,
            slot_config: SlotConfig {
                zero_time: 1_596_059_091_000,
                zero_slot: 4_492_800,
                slot_length: 1_000,
            },
            protocol: ProtocolParams::default(),
        }
    }

    pub fn preprod() -> Self {
        Self {
            network_id: 0,
            slot_config: SlotConfig {
                zero_time: 1_655_769_600_000,
                zero_slot: 86_400,
                slot_length: 1_000,
            },
            protocol: ProtocolParams::default(),
        }
    }

    pub fn preview() -> Self {
        Self {
            network_id: 0,
            slot_config: SlotConfig {
                zero_time: 1_666_656_000_000,
                zero_slot: 0,
                slot_length: 1_000,
            },
            protocol: ProtocolParams::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_cost_model_v3(mut self, cost_model: Vec<i64>) -> Self {
        self.protocol.cost_model_v3 = cost_model;
        self
    }

    /// Slot containing the given POSIX time in milliseconds, rounding down
    pub fn timestamp_to_slot(&self, timestamp: u64) -> Result<u64, TxBuilderError> {
        let SlotConfig {
            zero_time,
            zero_slot,
            slot_length,
        } = self.slot_config;

        let elapsed = timestamp
            .checked_sub(zero_time)
            .ok_or(TxBuilderError::InvalidTimestamp(timestamp))?;

        Ok(zero_slot + elapsed / slot_length.max(1))
    }
}
