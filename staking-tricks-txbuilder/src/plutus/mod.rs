use pallas_codec::utils::Int;
use pallas_primitives::conway::{BigInt, PlutusData};

mod array;
mod constr;

pub use array::*;
pub use constr::*;

pub fn int(v: impl Into<Int>) -> PlutusData {
    let as_int = BigInt::Int(v.into());
    PlutusData::BigInt(as_int)
}

/// Unsigned integer, falling back to a bignum once it leaves the signed
/// 64-bit range
pub fn uint(v: u64) -> PlutusData {
    match i64::try_from(v) {
        Ok(small) => int(small),
        Err(_) => {
            let bytes_owned: Vec<u8> = v.to_be_bytes().to_vec();
            PlutusData::BigInt(BigInt::BigUInt(bytes_owned.into()))
        }
    }
}

pub fn bytes(v: impl Into<Vec<u8>>) -> PlutusData {
    PlutusData::BoundedBytes(v.into().into())
}

/// The unit value, constructor 0 without fields
pub fn void() -> PlutusData {
    constr(0).into()
}

pub fn as_int(data: &PlutusData) -> Option<i128> {
    let PlutusData::BigInt(x) = data else {
        return None;
    };

    let magnitude = |bytes: &[u8]| -> Option<i128> {
        if bytes.len() > 16 {
            return None;
        }

        let u = bytes.iter().fold(0u128, |acc, b| (acc << 8) | u128::from(*b));
        i128::try_from(u).ok()
    };

    match x {
        BigInt::Int(i) => Some(i128::from(*i)),
        BigInt::BigUInt(b) => magnitude(b.as_slice()),
        BigInt::BigNInt(b) => magnitude(b.as_slice()).map(|n| -1 - n),
    }
}

pub fn as_bytes(data: &PlutusData) -> Option<&[u8]> {
    match data {
        PlutusData::BoundedBytes(b) => Some(b.as_slice()),
        _ => None,
    }
}

pub fn as_list(data: &PlutusData) -> Option<&[PlutusData]> {
    match data {
        PlutusData::Array(xs) => Some(xs.as_slice()),
        _ => None,
    }
}
