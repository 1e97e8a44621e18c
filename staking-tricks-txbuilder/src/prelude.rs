pub use crate::balance::MAX_FEE_ROUNDS;
pub use crate::conway::BuildConway;
pub use crate::correlate::{CanonicalOrder, CorrelationToken, Correlator, IndexCorrelation};
pub use crate::evaluate::{eval_tx, TxEvalResult, EX_UNITS_MARGIN};
pub use crate::fee::{min_utxo_lovelace, Fee, LinearFee};
pub use crate::plutus;
pub use crate::scriptdata::{LanguageView, ScriptData};
pub use crate::transaction::model::*;
pub use crate::transaction::*;
pub use crate::{NetworkParams, ProtocolParams, Ratio, SlotConfig, TxBuilderError};
pub use pallas_primitives::Fragment;
