//! Typed model of the contract value format (`ScVal`).
//!
//! Only the discriminants the perp exchange and the oracle actually emit are
//! modelled; anything else decodes to a descriptive error instead of being
//! guessed at.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::ChainError;
use crate::strkey;
use crate::xdr::{XdrReader, XdrWriter};

// ScVal XDR discriminants.
const SCV_BOOL: u32 = 0;
const SCV_VOID: u32 = 1;
const SCV_U32: u32 = 3;
const SCV_I32: u32 = 4;
const SCV_U64: u32 = 5;
const SCV_I64: u32 = 6;
const SCV_TIMEPOINT: u32 = 7;
const SCV_DURATION: u32 = 8;
const SCV_I128: u32 = 10;
const SCV_BYTES: u32 = 13;
const SCV_STRING: u32 = 14;
const SCV_SYMBOL: u32 = 15;
const SCV_VEC: u32 = 16;
const SCV_MAP: u32 = 17;
const SCV_ADDRESS: u32 = 18;

/// Contract value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScVal {
    Void,
    Bool(bool),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    Timepoint(u64),
    Duration(u64),
    I128(i128),
    Bytes(Vec<u8>),
    String(String),
    Symbol(String),
    Vec(Vec<ScVal>),
    Map(Vec<(ScVal, ScVal)>),
    Address(ScAddress),
}

/// Contract address: an account key or a contract hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScAddress {
    Account([u8; 32]),
    Contract([u8; 32]),
}

impl ScAddress {
    /// Parse from a `G...` or `C...` strkey.
    pub fn from_strkey(s: &str) -> Result<Self, ChainError> {
        match s.as_bytes().first() {
            Some(b'G') => Ok(Self::Account(strkey::decode_account(s)?)),
            Some(b'C') => Ok(Self::Contract(strkey::decode_contract(s)?)),
            _ => Err(ChainError::Key(format!("unsupported address: {s}"))),
        }
    }

    pub fn to_strkey(&self) -> String {
        match self {
            Self::Account(key) => strkey::encode_account(key),
            Self::Contract(id) => strkey::encode_contract(id),
        }
    }

    pub(crate) fn write(&self, w: &mut XdrWriter) {
        match self {
            Self::Account(key) => {
                w.u32(0); // SC_ADDRESS_TYPE_ACCOUNT
                w.u32(0); // PUBLIC_KEY_TYPE_ED25519
                w.bytes_fixed(key);
            }
            Self::Contract(id) => {
                w.u32(1); // SC_ADDRESS_TYPE_CONTRACT
                w.bytes_fixed(id);
            }
        }
    }

    pub(crate) fn read(r: &mut XdrReader) -> Result<Self, ChainError> {
        match r.u32()? {
            0 => {
                let key_type = r.u32()?;
                if key_type != 0 {
                    return Err(ChainError::Decode(format!(
                        "unsupported public key type {key_type}"
                    )));
                }
                let mut key = [0u8; 32];
                key.copy_from_slice(r.bytes_fixed(32)?);
                Ok(Self::Account(key))
            }
            1 => {
                let mut id = [0u8; 32];
                id.copy_from_slice(r.bytes_fixed(32)?);
                Ok(Self::Contract(id))
            }
            other => Err(ChainError::Decode(format!(
                "unsupported address type {other}"
            ))),
        }
    }
}

impl ScVal {
    /// Symbol value from a string.
    pub fn sym(s: &str) -> Self {
        Self::Symbol(s.to_string())
    }

    /// Address value from a strkey.
    pub fn address(s: &str) -> Result<Self, ChainError> {
        Ok(Self::Address(ScAddress::from_strkey(s)?))
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer accessor tolerant of the widths the contract uses for amounts.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Self::I128(v) => Some(*v),
            Self::I64(v) => Some(*v as i128),
            Self::U64(v) => Some(*v as i128),
            Self::U32(v) => Some(*v as i128),
            Self::I32(v) => Some(*v as i128),
            _ => None,
        }
    }

    /// Timestamp accessor: the oracle publishes `u64`/timepoint seconds.
    pub fn as_timestamp(&self) -> Option<u64> {
        match self {
            Self::U64(v) | Self::Timepoint(v) | Self::Duration(v) => Some(*v),
            Self::I64(v) if *v >= 0 => Some(*v as u64),
            Self::U32(v) => Some(*v as u64),
            Self::I128(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<&ScAddress> {
        match self {
            Self::Address(a) => Some(a),
            _ => None,
        }
    }

    /// Look up a symbol-keyed map entry.
    pub fn map_get(&self, key: &str) -> Option<&ScVal> {
        match self {
            Self::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_symbol() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Short shape description for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Bool(_) => "bool",
            Self::U32(_) => "u32",
            Self::I32(_) => "i32",
            Self::U64(_) => "u64",
            Self::I64(_) => "i64",
            Self::Timepoint(_) => "timepoint",
            Self::Duration(_) => "duration",
            Self::I128(_) => "i128",
            Self::Bytes(_) => "bytes",
            Self::String(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Vec(_) => "vec",
            Self::Map(_) => "map",
            Self::Address(_) => "address",
        }
    }

    pub(crate) fn write(&self, w: &mut XdrWriter) {
        match self {
            Self::Bool(b) => {
                w.u32(SCV_BOOL);
                w.u32(*b as u32);
            }
            Self::Void => w.u32(SCV_VOID),
            Self::U32(v) => {
                w.u32(SCV_U32);
                w.u32(*v);
            }
            Self::I32(v) => {
                w.u32(SCV_I32);
                w.i32(*v);
            }
            Self::U64(v) => {
                w.u32(SCV_U64);
                w.u64(*v);
            }
            Self::I64(v) => {
                w.u32(SCV_I64);
                w.i64(*v);
            }
            Self::Timepoint(v) => {
                w.u32(SCV_TIMEPOINT);
                w.u64(*v);
            }
            Self::Duration(v) => {
                w.u32(SCV_DURATION);
                w.u64(*v);
            }
            Self::I128(v) => {
                w.u32(SCV_I128);
                w.i64((*v >> 64) as i64);
                w.u64(*v as u64);
            }
            Self::Bytes(b) => {
                w.u32(SCV_BYTES);
                w.bytes_var(b);
            }
            Self::String(s) => {
                w.u32(SCV_STRING);
                w.string(s);
            }
            Self::Symbol(s) => {
                w.u32(SCV_SYMBOL);
                w.string(s);
            }
            Self::Vec(items) => {
                w.u32(SCV_VEC);
                w.u32(1); // optional vec present
                w.u32(items.len() as u32);
                for item in items {
                    item.write(w);
                }
            }
            Self::Map(pairs) => {
                w.u32(SCV_MAP);
                w.u32(1); // optional map present
                w.u32(pairs.len() as u32);
                for (k, v) in pairs {
                    k.write(w);
                    v.write(w);
                }
            }
            Self::Address(a) => {
                w.u32(SCV_ADDRESS);
                a.write(w);
            }
        }
    }

    pub(crate) fn read(r: &mut XdrReader) -> Result<Self, ChainError> {
        match r.u32()? {
            SCV_BOOL => Ok(Self::Bool(r.u32()? != 0)),
            SCV_VOID => Ok(Self::Void),
            SCV_U32 => Ok(Self::U32(r.u32()?)),
            SCV_I32 => Ok(Self::I32(r.i32()?)),
            SCV_U64 => Ok(Self::U64(r.u64()?)),
            SCV_I64 => Ok(Self::I64(r.i64()?)),
            SCV_TIMEPOINT => Ok(Self::Timepoint(r.u64()?)),
            SCV_DURATION => Ok(Self::Duration(r.u64()?)),
            SCV_I128 => {
                let hi = r.i64()?;
                let lo = r.u64()?;
                Ok(Self::I128(((hi as i128) << 64) | lo as i128))
            }
            SCV_BYTES => Ok(Self::Bytes(r.bytes_var()?)),
            SCV_STRING => Ok(Self::String(r.string()?)),
            SCV_SYMBOL => Ok(Self::Symbol(r.string()?)),
            SCV_VEC => {
                if r.u32()? == 0 {
                    return Ok(Self::Vec(Vec::new()));
                }
                let len = r.u32()? as usize;
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(Self::read(r)?);
                }
                Ok(Self::Vec(items))
            }
            SCV_MAP => {
                if r.u32()? == 0 {
                    return Ok(Self::Map(Vec::new()));
                }
                let len = r.u32()? as usize;
                let mut pairs = Vec::with_capacity(len);
                for _ in 0..len {
                    let k = Self::read(r)?;
                    let v = Self::read(r)?;
                    pairs.push((k, v));
                }
                Ok(Self::Map(pairs))
            }
            SCV_ADDRESS => Ok(Self::Address(ScAddress::read(r)?)),
            other => Err(ChainError::Decode(format!(
                "unsupported ScVal discriminant {other}"
            ))),
        }
    }

    pub fn to_base64(&self) -> String {
        let mut w = XdrWriter::new();
        self.write(&mut w);
        BASE64.encode(w.finish())
    }

    pub fn from_base64(s: &str) -> Result<Self, ChainError> {
        let raw = BASE64
            .decode(s)
            .map_err(|e| ChainError::Decode(format!("invalid base64 ScVal: {e}")))?;
        let mut r = XdrReader::new(&raw);
        let val = Self::read(&mut r)?;
        if r.remaining() != 0 {
            return Err(ChainError::Decode(format!(
                "{} trailing bytes after ScVal",
                r.remaining()
            )));
        }
        Ok(val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i128_roundtrip() {
        for v in [0i128, 1, -1, i128::from(i64::MAX) * 7, -(1i128 << 100)] {
            let encoded = ScVal::I128(v).to_base64();
            assert_eq!(ScVal::from_base64(&encoded).unwrap(), ScVal::I128(v));
        }
    }

    #[test]
    fn test_nested_vec_roundtrip() {
        let val = ScVal::Vec(vec![
            ScVal::sym("Other"),
            ScVal::sym("XLM"),
            ScVal::Vec(vec![ScVal::U32(5)]),
        ]);
        let encoded = val.to_base64();
        assert_eq!(ScVal::from_base64(&encoded).unwrap(), val);
    }

    #[test]
    fn test_map_get_by_symbol_key() {
        let val = ScVal::Map(vec![
            (ScVal::sym("price"), ScVal::I128(42)),
            (ScVal::sym("timestamp"), ScVal::U64(1_700_000_000)),
        ]);
        assert_eq!(val.map_get("price").and_then(ScVal::as_i128), Some(42));
        assert_eq!(
            val.map_get("timestamp").and_then(ScVal::as_timestamp),
            Some(1_700_000_000)
        );
        assert!(val.map_get("missing").is_none());
    }

    #[test]
    fn test_address_strkey_roundtrip() {
        let account = ScAddress::Account([5u8; 32]);
        let parsed = ScAddress::from_strkey(&account.to_strkey()).unwrap();
        assert_eq!(parsed, account);

        let contract = ScAddress::Contract([6u8; 32]);
        let parsed = ScAddress::from_strkey(&contract.to_strkey()).unwrap();
        assert_eq!(parsed, contract);
    }

    #[test]
    fn test_unknown_discriminant_rejected() {
        let mut w = XdrWriter::new();
        w.u32(99);
        let encoded = BASE64.encode(w.finish());
        assert!(matches!(
            ScVal::from_base64(&encoded),
            Err(ChainError::Decode(_))
        ));
    }
}
