//! Deferred index correlation
//!
//! A validator that checks many inputs in one execution needs to know, for
//! each input it cares about, where that input sits in the transaction and
//! which output continues it. Input positions are only known after the
//! ledger sorts inputs, which happens after fee balancing may have added
//! wallet inputs. The pairing is therefore registered by output reference and
//! resolved to positions at build time.

use pallas_primitives::conway::PlutusData;

use crate::{plutus, prelude::Input, TxBuilderError};

/// Handle to a registered pairing, carried by a deferred redeemer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CorrelationToken(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pairing {
    inputs: Vec<Input>,
    outputs: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct Correlator {
    pairings: Vec<Pairing>,
}

impl Correlator {
    pub fn register(
        &mut self,
        inputs: Vec<Input>,
        outputs: Vec<usize>,
    ) -> Result<CorrelationToken, TxBuilderError> {
        if inputs.len() != outputs.len() {
            return Err(TxBuilderError::MismatchedCorrelation {
                inputs: inputs.len(),
                outputs: outputs.len(),
            });
        }

        self.pairings.push(Pairing { inputs, outputs });

        Ok(CorrelationToken(self.pairings.len() - 1))
    }

    /// Positions of the registered inputs within `order`, paired with their
    /// output positions, in registration order
    pub fn resolve(
        &self,
        token: CorrelationToken,
        order: &CanonicalOrder,
    ) -> Result<IndexCorrelation, TxBuilderError> {
        let pairing = self
            .pairings
            .get(token.0)
            .ok_or(TxBuilderError::UnknownCorrelation)?;

        let input_idxs = pairing
            .inputs
            .iter()
            .map(|x| {
                order
                    .position(x)
                    .map(|p| p as u64)
                    .ok_or(TxBuilderError::RedeemerTargetMissing)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output_idxs = pairing.outputs.iter().map(|x| *x as u64).collect();

        Ok(IndexCorrelation {
            input_idxs,
            output_idxs,
        })
    }
}

/// Inputs sorted the way the ledger sorts them: by transaction id, then by
/// output index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalOrder(Vec<Input>);

impl CanonicalOrder {
    pub fn new(inputs: impl IntoIterator<Item = Input>) -> Result<Self, TxBuilderError> {
        let mut inputs: Vec<_> = inputs.into_iter().collect();
        inputs.sort_unstable();

        if let Some(dup) = inputs.windows(2).find(|w| w[0] == w[1]) {
            return Err(TxBuilderError::DuplicateInput(dup[0].tx_hash, dup[0].txo_index));
        }

        Ok(Self(inputs))
    }

    pub fn position(&self, input: &Input) -> Option<usize> {
        self.0.binary_search(input).ok()
    }

    pub fn inputs(&self) -> &[Input] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<Input> {
        self.0
    }
}

/// Resolved pairing as seen by the validator: `input_idxs[i]` is continued
/// by `output_idxs[i]`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexCorrelation {
    pub input_idxs: Vec<u64>,
    pub output_idxs: Vec<u64>,
}

impl IndexCorrelation {
    /// Payload for executions that correlate nothing, such as certificate
    /// and stake-only withdrawal redeemers
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.input_idxs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_idxs.is_empty()
    }

    pub fn from_plutus_data(data: &PlutusData) -> Option<Self> {
        let (0, fields) = plutus::as_constr(data)? else {
            return None;
        };

        let [inputs, outputs] = fields else {
            return None;
        };

        let indexes = |x: &PlutusData| -> Option<Vec<u64>> {
            plutus::as_list(x)?
                .iter()
                .map(|i| u64::try_from(plutus::as_int(i)?).ok())
                .collect()
        };

        Some(Self {
            input_idxs: indexes(inputs)?,
            output_idxs: indexes(outputs)?,
        })
    }
}

impl From<IndexCorrelation> for PlutusData {
    fn from(value: IndexCorrelation) -> Self {
        let list = |xs: Vec<u64>| {
            xs.into_iter()
                .fold(plutus::array(), |acc, x| acc.item(plutus::uint(x)))
        };

        plutus::constr(0)
            .field(list(value.input_idxs))
            .field(list(value.output_idxs))
            .into()
    }
}

#[cfg(test)]
mod tests {
    use pallas_crypto::hash::Hash;

    use super::*;

    fn input(seed: u8, index: u64) -> Input {
        Input::new(Hash::new([seed; 32]), index)
    }

    #[test]
    fn rejects_unequal_lengths() {
        let mut correlator = Correlator::default();

        let err = correlator
            .register(vec![input(1, 0), input(2, 0)], vec![0])
            .unwrap_err();

        assert_eq!(
            err,
            TxBuilderError::MismatchedCorrelation {
                inputs: 2,
                outputs: 1
            }
        );
    }

    #[test]
    fn resolves_against_sorted_inputs() {
        let mut correlator = Correlator::default();

        let token = correlator
            .register(vec![input(9, 0), input(1, 3), input(1, 1)], vec![0, 1, 2])
            .unwrap();

        let order = CanonicalOrder::new([input(1, 1), input(5, 0), input(9, 0), input(1, 3)])
            .unwrap();

        let resolved = correlator.resolve(token, &order).unwrap();

        assert_eq!(resolved.input_idxs, vec![3, 1, 0]);
        assert_eq!(resolved.output_idxs, vec![0, 1, 2]);
    }

    #[test]
    fn fails_when_a_registered_input_was_dropped() {
        let mut correlator = Correlator::default();
        let token = correlator.register(vec![input(1, 0)], vec![0]).unwrap();

        let order = CanonicalOrder::new([input(2, 0)]).unwrap();

        assert_eq!(
            correlator.resolve(token, &order),
            Err(TxBuilderError::RedeemerTargetMissing)
        );
    }

    #[test]
    fn canonical_order_rejects_duplicates() {
        assert_eq!(
            CanonicalOrder::new([input(1, 0), input(1, 0)]),
            Err(TxBuilderError::DuplicateInput(Hash::new([1; 32]), 0))
        );
    }

    #[test]
    fn empty_correlation_is_two_empty_lists() {
        let data = PlutusData::from(IndexCorrelation::empty());

        assert_eq!(
            IndexCorrelation::from_plutus_data(&data),
            Some(IndexCorrelation::empty())
        );
    }
}
