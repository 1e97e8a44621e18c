use pallas_codec::utils::{CborWrap, MaybeIndefArray};
use pallas_crypto::hash::{Hash, Hasher};
use pallas_primitives::{
    conway::{
        Certificate as PallasCertificate, DRep as PallasDRep, DatumOption,
        ExUnits as PallasExUnits, NetworkId, PlutusData, PlutusScript,
        PostAlonzoTransactionOutput, PseudoScript as PallasScript, PseudoTransactionOutput,
        Redeemer, RedeemerTag as PallasRedeemerTag, Redeemers, StakeCredential, TransactionBody,
        TransactionInput, Tx, Value as PallasValue, WitnessSet,
    },
    Fragment, NonEmptyKeyValuePairs, NonEmptySet, PositiveCoin,
};
use tracing::trace;

use crate::{
    correlate::CanonicalOrder,
    prelude::{
        BuilderEra, BuiltRedeemer, BuiltTransaction, Certificate, Credential, DRep, Datum,
        ExUnits, Input, Output, RedeemerData, RedeemerPurpose, RedeemerTag, ScriptKind,
        StagingTransaction, TransactionStatus, Value,
    },
    scriptdata::{self, LanguageView, PLUTUS_V3},
    NetworkParams, TxBuilderError,
};

pub trait BuildConway {
    /// Builds the transaction exactly as staged, without selecting inputs or
    /// adjusting the fee
    fn build_conway_raw(self, params: &NetworkParams) -> Result<BuiltTransaction, TxBuilderError>;
}

impl BuildConway for StagingTransaction {
    fn build_conway_raw(self, params: &NetworkParams) -> Result<BuiltTransaction, TxBuilderError> {
        let fee = self.fee.unwrap_or_default();
        let assembled = self.assemble(params)?;

        Ok(assembled.into_built(fee, self.outputs))
    }
}

/// Encoded transaction plus what the balancer needs to price it
pub(crate) struct Assembled {
    pub tx_hash: Hash<32>,
    pub tx_bytes: Vec<u8>,
    pub inputs: Vec<Input>,
    pub redeemers: Vec<BuiltRedeemer>,
    /// What each entry of `redeemers` was staged for
    pub purposes: Vec<RedeemerPurpose>,
    pub ex_units: ExUnits,
}

impl Assembled {
    pub fn into_built(self, fee: u64, outputs: Vec<Output>) -> BuiltTransaction {
        BuiltTransaction {
            era: BuilderEra::Conway,
            status: TransactionStatus::Built,
            tx_hash: self.tx_hash,
            tx_bytes: self.tx_bytes,
            fee,
            inputs: self.inputs,
            outputs,
            redeemers: self.redeemers,
        }
    }
}

pub(crate) fn transaction_input(input: &Input) -> TransactionInput {
    TransactionInput {
        transaction_id: input.tx_hash,
        index: input.txo_index,
    }
}

fn stake_credential(credential: &Credential) -> StakeCredential {
    match credential {
        Credential::Key(x) => StakeCredential::AddrKeyhash(*x),
        Credential::Script(x) => StakeCredential::ScriptHash(*x),
    }
}

fn drep(drep: &DRep) -> PallasDRep {
    match drep {
        DRep::Abstain => PallasDRep::Abstain,
        DRep::NoConfidence => PallasDRep::NoConfidence,
        DRep::Credential(Credential::Key(x)) => PallasDRep::Key(*x),
        DRep::Credential(Credential::Script(x)) => PallasDRep::Script(*x),
    }
}

impl Certificate {
    pub fn build_conway_raw(&self) -> PallasCertificate {
        match self {
            Certificate::RegisterAndDelegate {
                credential,
                pool,
                drep: d,
                deposit,
            } => PallasCertificate::StakeVoteRegDeleg(
                stake_credential(credential),
                *pool,
                drep(d),
                *deposit,
            ),
            Certificate::Deregister { credential, refund } => {
                PallasCertificate::UnReg(stake_credential(credential), *refund)
            }
        }
    }
}

impl RedeemerTag {
    fn to_pallas(self) -> PallasRedeemerTag {
        match self {
            RedeemerTag::Spend => PallasRedeemerTag::Spend,
            RedeemerTag::Cert => PallasRedeemerTag::Cert,
            RedeemerTag::Reward => PallasRedeemerTag::Reward,
        }
    }

    pub(crate) fn from_pallas(tag: PallasRedeemerTag) -> Option<Self> {
        match tag {
            PallasRedeemerTag::Spend => Some(RedeemerTag::Spend),
            PallasRedeemerTag::Cert => Some(RedeemerTag::Cert),
            PallasRedeemerTag::Reward => Some(RedeemerTag::Reward),
            _ => None,
        }
    }
}

impl StagingTransaction {
    /// Placeholder units for each redeemer that didn't declare its own: the
    /// budget left by the declared ones, split evenly. Balancing replaces
    /// them with evaluated units.
    fn default_ex_units(&self, params: &NetworkParams) -> ExUnits {
        let declared = self.redeemers.values().filter_map(|(_, x)| *x);

        let (mem, steps) = declared.fold((0u64, 0u64), |(m, s), x| {
            (m.saturating_add(x.mem), s.saturating_add(x.steps))
        });

        let open = self
            .redeemers
            .values()
            .filter(|(_, x)| x.is_none())
            .count()
            .max(1) as u64;

        let budget = params.protocol.max_tx_ex_units;

        ExUnits {
            mem: budget.mem.saturating_sub(mem) / open,
            steps: budget.steps.saturating_sub(steps) / open,
        }
    }

    fn build_redeemers(
        &self,
        order: &CanonicalOrder,
        params: &NetworkParams,
    ) -> Result<Vec<(RedeemerPurpose, BuiltRedeemer)>, TxBuilderError> {
        let fallback = self.default_ex_units(params);
        let mut built = Vec::with_capacity(self.redeemers.len());

        for (purpose, (data, ex_units)) in self.redeemers.iter() {
            let (tag, index) = match purpose {
                RedeemerPurpose::Spend(input) => (
                    RedeemerTag::Spend,
                    order
                        .position(input)
                        .ok_or(TxBuilderError::RedeemerTargetMissing)?,
                ),
                RedeemerPurpose::Reward(account) => (
                    RedeemerTag::Reward,
                    self.withdrawals
                        .keys()
                        .position(|x| x == account)
                        .ok_or(TxBuilderError::RedeemerTargetMissing)?,
                ),
                RedeemerPurpose::Cert(index) if *index < self.certificates.len() => {
                    (RedeemerTag::Cert, *index)
                }
                RedeemerPurpose::Cert(_) => return Err(TxBuilderError::RedeemerTargetMissing),
            };

            let data = match data {
                RedeemerData::Ready(x) => x.clone(),
                RedeemerData::Deferred(token) => {
                    let correlation = self.correlator.resolve(*token, order)?;

                    if let Some(missing) = correlation
                        .output_idxs
                        .iter()
                        .find(|x| **x as usize >= self.outputs.len())
                    {
                        return Err(TxBuilderError::CorrelatedOutputMissing(*missing as usize));
                    }

                    trace!(?purpose, ?correlation, "resolved deferred redeemer");

                    PlutusData::from(correlation)
                }
            };

            let redeemer = BuiltRedeemer {
                tag,
                index: index as u32,
                data,
                ex_units: ex_units.unwrap_or(fallback),
            };

            built.push((purpose.clone(), redeemer));
        }

        built.sort_by_key(|(_, x)| (x.tag, x.index));

        Ok(built)
    }

    pub(crate) fn assemble(&self, params: &NetworkParams) -> Result<Assembled, TxBuilderError> {
        if self.inputs.is_empty() {
            return Err(TxBuilderError::NoInputs);
        }

        let order = CanonicalOrder::new(self.inputs.iter().map(|x| x.input))?;

        let inputs = order
            .inputs()
            .iter()
            .map(transaction_input)
            .collect::<Vec<_>>();

        let outputs = self
            .outputs
            .iter()
            .map(Output::build_babbage_raw)
            .collect::<Result<Vec<_>, _>>()?;

        let certificates = NonEmptySet::from_vec(
            self.certificates
                .iter()
                .map(Certificate::build_conway_raw)
                .collect(),
        );

        let withdrawals = NonEmptyKeyValuePairs::from_vec(
            self.withdrawals
                .iter()
                .map(|(account, amount)| (account.to_vec().into(), *amount))
                .collect(),
        );

        let collateral = NonEmptySet::from_vec(
            self.collateral_inputs
                .iter()
                .map(|x| transaction_input(&x.input))
                .collect(),
        );

        let collateral_return = self
            .collateral_output
            .as_ref()
            .map(Output::build_babbage_raw)
            .transpose()?;

        let required_signers =
            NonEmptySet::from_vec(self.disclosed_signers.iter().copied().collect());

        let network_id = self
            .network_id
            .map(|nid| NetworkId::try_from(nid).map_err(|_| TxBuilderError::InvalidNetworkId(nid)))
            .transpose()?;

        let plutus_v3_script: Vec<_> = self
            .scripts
            .values()
            .map(|script| match script.kind {
                ScriptKind::PlutusV3 => PlutusScript::<3>(script.bytes.clone().into()),
            })
            .collect();

        let (purposes, redeemers): (Vec<_>, Vec<_>) =
            self.build_redeemers(&order, params)?.into_iter().unzip();

        let ex_units = redeemers.iter().fold(ExUnits::default(), |acc, x| ExUnits {
            mem: acc.mem.saturating_add(x.ex_units.mem),
            steps: acc.steps.saturating_add(x.ex_units.steps),
        });

        let witness_set_redeemers = Redeemers::List(MaybeIndefArray::Def(
            redeemers
                .iter()
                .map(|x| Redeemer {
                    tag: x.tag.to_pallas(),
                    index: x.index,
                    data: x.data.clone(),
                    ex_units: PallasExUnits {
                        mem: x.ex_units.mem,
                        steps: x.ex_units.steps,
                    },
                })
                .collect(),
        ));

        let script_data_hash = if redeemers.is_empty() {
            None
        } else {
            if params.protocol.cost_model_v3.is_empty() {
                return Err(TxBuilderError::MissingCostModel);
            }

            let data = scriptdata::ScriptData {
                redeemers: witness_set_redeemers.clone(),
                datums: None,
                language_view: LanguageView(PLUTUS_V3, params.protocol.cost_model_v3.clone()),
            };

            Some(data.hash()?)
        };

        let transaction_body = TransactionBody {
            inputs: pallas_primitives::Set::from(inputs),
            outputs,
            ttl: None,
            validity_interval_start: self.valid_from_slot,
            fee: self.fee.unwrap_or_default(),
            certificates,
            withdrawals,
            auxiliary_data_hash: None,
            mint: None,
            script_data_hash,
            collateral,
            required_signers,
            network_id,
            collateral_return,
            reference_inputs: None,
            total_collateral: self.total_collateral,
            voting_procedures: None,
            proposal_procedures: None,
            treasury_value: None,
            donation: None,
        };

        let tx_hash = transaction_body
            .encode_fragment()
            .map(|x| Hasher::<256>::hash(&x))
            .map_err(|_| TxBuilderError::UnencodableTransaction)?;

        let pallas_tx = Tx {
            transaction_body,
            transaction_witness_set: WitnessSet {
                vkeywitness: None,
                native_script: None,
                bootstrap_witness: None,
                plutus_v1_script: None,
                plutus_v2_script: None,
                plutus_v3_script: NonEmptySet::from_vec(plutus_v3_script),
                plutus_data: None,
                redeemer: if redeemers.is_empty() {
                    None
                } else {
                    Some(witness_set_redeemers)
                },
            },
            success: true,
            auxiliary_data: None.into(),
        };

        let tx_bytes = pallas_tx
            .encode_fragment()
            .map_err(|_| TxBuilderError::UnencodableTransaction)?;

        Ok(Assembled {
            tx_hash,
            tx_bytes,
            inputs: order.into_inner(),
            redeemers,
            purposes,
            ex_units,
        })
    }
}

impl Value {
    pub fn build_conway_raw(&self) -> Result<PallasValue, TxBuilderError> {
        let mut policies = vec![];

        for (policy, names) in self.assets.iter() {
            let assets = names
                .iter()
                .map(|(name, amount)| {
                    PositiveCoin::try_from(*amount)
                        .map(|x| (name.clone().into(), x))
                        .map_err(|_| TxBuilderError::ValueOverflow)
                })
                .collect::<Result<Vec<_>, _>>()?;

            if let Some(assets) = NonEmptyKeyValuePairs::from_vec(assets) {
                policies.push((*policy, assets));
            }
        }

        Ok(match NonEmptyKeyValuePairs::from_vec(policies) {
            Some(assets) => PallasValue::Multiasset(self.lovelace, assets),
            None => PallasValue::Coin(self.lovelace),
        })
    }
}

impl Output {
    pub fn build_babbage_raw(
        &self,
    ) -> Result<PseudoTransactionOutput<PostAlonzoTransactionOutput>, TxBuilderError> {
        let value = self.value.build_conway_raw()?;

        let datum_option = match &self.datum {
            Some(Datum::Hash(hash)) => Some(DatumOption::Hash(*hash)),
            Some(Datum::Inline(bytes)) => {
                let pd = PlutusData::decode_fragment(bytes)
                    .map_err(|_| TxBuilderError::MalformedDatum)?;
                Some(DatumOption::Data(CborWrap(pd)))
            }
            None => None,
        };

        let script_ref = self.script.as_ref().map(|s| {
            CborWrap(match s.kind {
                ScriptKind::PlutusV3 => {
                    PallasScript::PlutusV3Script(PlutusScript::<3>(s.bytes.clone().into()))
                }
            })
        });

        Ok(PseudoTransactionOutput::PostAlonzo(
            PostAlonzoTransactionOutput {
                address: self.address.to_vec().into(),
                value,
                datum_option,
                script_ref,
            },
        ))
    }

    pub(crate) fn encoded_size(&self) -> Result<u64, TxBuilderError> {
        self.build_babbage_raw()?
            .encode_fragment()
            .map(|x| x.len() as u64)
            .map_err(|_| TxBuilderError::UnencodableTransaction)
    }
}
