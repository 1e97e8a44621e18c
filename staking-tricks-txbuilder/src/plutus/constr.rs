use pallas_primitives::conway::{Constr, PlutusData};

use super::array::indef_unless_empty;

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PlutusDataConstr {
    tag: u64,
    constr_index: Option<u64>,
    fields: Vec<PlutusData>,
}

impl From<PlutusDataConstr> for PlutusData {
    fn from(value: PlutusDataConstr) -> Self {
        Self::Constr(Constr {
            tag: value.tag,
            any_constructor: value.constr_index,
            fields: indef_unless_empty(value.fields),
        })
    }
}

impl PlutusDataConstr {
    pub fn field(mut self, item: impl Into<PlutusData>) -> Self {
        self.fields.push(item.into());
        self
    }
}

/// Constructor by alternative index, using the compact CBOR tags where the
/// index allows
pub fn constr(index: u64) -> PlutusDataConstr {
    let (tag, constr_index) = match index {
        0..=6 => (121 + index, None),
        7..=127 => (1280 + index - 7, None),
        _ => (102, Some(index)),
    };

    PlutusDataConstr {
        tag,
        constr_index,
        fields: vec![],
    }
}

/// Alternative index and fields of a constructor
pub fn as_constr(data: &PlutusData) -> Option<(u64, &[PlutusData])> {
    let PlutusData::Constr(c) = data else {
        return None;
    };

    let index = match c.tag {
        121..=127 => c.tag - 121,
        1280..=1400 => c.tag - 1280 + 7,
        102 => c.any_constructor?,
        _ => return None,
    };

    Some((index, c.fields.as_slice()))
}
