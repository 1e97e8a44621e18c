use pallas_codec::utils::MaybeIndefArray;
use pallas_primitives::conway::PlutusData;

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PlutusDataArray {
    inner: Vec<PlutusData>,
}

impl From<PlutusDataArray> for PlutusData {
    fn from(value: PlutusDataArray) -> Self {
        Self::Array(indef_unless_empty(value.inner))
    }
}

impl PlutusDataArray {
    pub fn item(mut self, item: impl Into<PlutusData>) -> Self {
        self.inner.push(item.into());
        self
    }
}

pub fn array() -> PlutusDataArray {
    PlutusDataArray::default()
}

/// Non-empty lists are written with indefinite length, empty ones as `[]`,
/// matching what the usual off-chain serializers emit
pub(crate) fn indef_unless_empty(items: Vec<PlutusData>) -> MaybeIndefArray<PlutusData> {
    if items.is_empty() {
        MaybeIndefArray::Def(items)
    } else {
        MaybeIndefArray::Indef(items)
    }
}
