//! Contract ABI encoding and decoding.
//!
//! Covers the elementary types the patient registration contract uses:
//! `address`, `bool`, `string`, `bytes`, `bytesN`, `uintN` and `intN`.
//! Integers are limited to 128 bits of magnitude.

use crate::ledger::address::Address;
use serde::Deserialize;
use sha3::{Digest, Keccak256};

const WORD: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AbiError {
    #[error("unsupported ABI type: {0}")]
    UnsupportedType(String),
    #[error("invalid {kind} value: {value:?}")]
    InvalidValue { kind: String, value: String },
    #[error("{function} expects {expected} arguments, got {actual}")]
    ArgumentCount {
        function: String,
        expected: usize,
        actual: usize,
    },
    #[error("return data truncated at offset {0}")]
    Truncated(usize),
    #[error("integer does not fit in 128 bits")]
    Overflow,
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Elementary ABI parameter types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Address,
    Bool,
    String,
    Bytes,
    FixedBytes(usize),
    Uint(usize),
    Int(usize),
}

impl ParamType {
    pub fn parse(s: &str) -> Result<Self, AbiError> {
        let unsupported = || AbiError::UnsupportedType(s.to_string());
        let bits = |digits: &str| -> Result<usize, AbiError> {
            if digits.is_empty() {
                return Ok(256);
            }
            let n: usize = digits.parse().map_err(|_| unsupported())?;
            if n == 0 || n > 256 || n % 8 != 0 {
                return Err(unsupported());
            }
            Ok(n)
        };

        match s {
            "address" => Ok(ParamType::Address),
            "bool" => Ok(ParamType::Bool),
            "string" => Ok(ParamType::String),
            "bytes" => Ok(ParamType::Bytes),
            _ => {
                if let Some(rest) = s.strip_prefix("uint") {
                    Ok(ParamType::Uint(bits(rest)?))
                } else if let Some(rest) = s.strip_prefix("int") {
                    Ok(ParamType::Int(bits(rest)?))
                } else if let Some(rest) = s.strip_prefix("bytes") {
                    let n: usize = rest.parse().map_err(|_| unsupported())?;
                    if n == 0 || n > 32 {
                        return Err(unsupported());
                    }
                    Ok(ParamType::FixedBytes(n))
                } else {
                    Err(unsupported())
                }
            }
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, ParamType::String | ParamType::Bytes)
    }

    fn name(&self) -> String {
        match self {
            ParamType::Address => "address".to_string(),
            ParamType::Bool => "bool".to_string(),
            ParamType::String => "string".to_string(),
            ParamType::Bytes => "bytes".to_string(),
            ParamType::FixedBytes(n) => format!("bytes{}", n),
            ParamType::Uint(n) => format!("uint{}", n),
            ParamType::Int(n) => format!("int{}", n),
        }
    }
}

/// A decoded or to-be-encoded ABI value
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Address(Address),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    FixedBytes(Vec<u8>),
    Uint(u128),
    Int(i128),
}

impl Token {
    /// Build a token of the given type from user-supplied text
    pub fn from_text(kind: ParamType, text: &str) -> Result<Self, AbiError> {
        let invalid = || AbiError::InvalidValue {
            kind: kind.name(),
            value: text.to_string(),
        };

        match kind {
            ParamType::Address => text.parse().map(Token::Address).map_err(|_| invalid()),
            ParamType::Bool => match text.trim() {
                "true" => Ok(Token::Bool(true)),
                "false" => Ok(Token::Bool(false)),
                _ => Err(invalid()),
            },
            ParamType::String => Ok(Token::String(text.to_string())),
            ParamType::Bytes => decode_hex(text).map(Token::Bytes).ok_or_else(invalid),
            ParamType::FixedBytes(n) => match decode_hex(text) {
                Some(bytes) if bytes.len() <= n => Ok(Token::FixedBytes(bytes)),
                _ => Err(invalid()),
            },
            ParamType::Uint(_) => text.trim().parse().map(Token::Uint).map_err(|_| invalid()),
            ParamType::Int(_) => text.trim().parse().map(Token::Int).map_err(|_| invalid()),
        }
    }

    fn is_dynamic(&self) -> bool {
        matches!(self, Token::String(_) | Token::Bytes(_))
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            Token::Address(addr) => Some(*addr),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Token::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Token::String(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Address(addr) => write!(f, "{}", addr),
            Token::Bool(b) => write!(f, "{}", b),
            Token::String(s) => write!(f, "{}", s),
            Token::Bytes(b) | Token::FixedBytes(b) => write!(f, "0x{}", hex::encode(b)),
            Token::Uint(n) => write!(f, "{}", n),
            Token::Int(n) => write!(f, "{}", n),
        }
    }
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    let digits = text.trim().strip_prefix("0x")?;
    hex::decode(digits).ok()
}

/// Function parameter as it appears in a compiled contract's ABI
#[derive(Debug, Clone, Deserialize)]
pub struct Param {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// One entry of a compiled contract's ABI
#[derive(Debug, Clone, Deserialize)]
pub struct AbiEntry {
    #[serde(rename = "type", default = "default_entry_type")]
    pub entry_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<Param>,
    #[serde(default)]
    pub outputs: Vec<Param>,
    #[serde(rename = "stateMutability", default)]
    pub state_mutability: String,
}

fn default_entry_type() -> String {
    "function".to_string()
}

/// A callable contract function with resolved parameter types
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub inputs: Vec<ParamType>,
    pub outputs: Vec<ParamType>,
    pub read_only: bool,
}

impl Function {
    /// Resolve an ABI entry; `None` for non-function entries
    pub fn from_entry(entry: &AbiEntry) -> Option<Result<Self, AbiError>> {
        if entry.entry_type != "function" {
            return None;
        }

        Some(Self::resolve(entry))
    }

    fn resolve(entry: &AbiEntry) -> Result<Self, AbiError> {
        let types = |params: &[Param]| -> Result<Vec<ParamType>, AbiError> {
            params.iter().map(|p| ParamType::parse(&p.kind)).collect()
        };

        Ok(Self {
            name: entry.name.clone(),
            inputs: types(&entry.inputs)?,
            outputs: types(&entry.outputs)?,
            read_only: matches!(entry.state_mutability.as_str(), "view" | "pure"),
        })
    }

    pub fn signature(&self) -> String {
        let params: Vec<String> = self.inputs.iter().map(ParamType::name).collect();
        format!("{}({})", self.name, params.join(","))
    }

    pub fn selector(&self) -> [u8; 4] {
        selector(&self.signature())
    }

    /// Selector followed by the encoded arguments, each given as text
    pub fn encode_call(&self, args: &[&str]) -> Result<Vec<u8>, AbiError> {
        if args.len() != self.inputs.len() {
            return Err(AbiError::ArgumentCount {
                function: self.name.clone(),
                expected: self.inputs.len(),
                actual: args.len(),
            });
        }

        let tokens = self
            .inputs
            .iter()
            .zip(args)
            .map(|(kind, arg)| Token::from_text(*kind, arg))
            .collect::<Result<Vec<_>, _>>()?;

        let mut data = self.selector().to_vec();
        data.extend(encode(&tokens));
        Ok(data)
    }

    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<Token>, AbiError> {
        decode(&self.outputs, data)
    }
}

/// First four bytes of the keccak-256 hash of a function signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encode a list of tokens as a tuple
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = WORD * tokens.len();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
            encode_dynamic(token, &mut tail);
        } else {
            head.extend_from_slice(&encode_static(token));
        }
    }

    head.extend(tail);
    head
}

fn uint_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn encode_static(token: &Token) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    match token {
        Token::Address(addr) => word[12..].copy_from_slice(addr.as_bytes()),
        Token::Bool(b) => word[31] = u8::from(*b),
        Token::Uint(n) => word = uint_word(*n),
        Token::Int(n) => {
            if *n < 0 {
                word[..16].fill(0xff);
            }
            word[16..].copy_from_slice(&n.to_be_bytes());
        }
        Token::FixedBytes(bytes) => word[..bytes.len()].copy_from_slice(bytes),
        Token::String(_) | Token::Bytes(_) => {}
    }
    word
}

fn encode_dynamic(token: &Token, out: &mut Vec<u8>) {
    let bytes: &[u8] = match token {
        Token::String(s) => s.as_bytes(),
        Token::Bytes(b) => b,
        _ => return,
    };

    out.extend_from_slice(&uint_word(bytes.len() as u128));
    out.extend_from_slice(bytes);
    let padding = (WORD - bytes.len() % WORD) % WORD;
    out.extend(std::iter::repeat(0u8).take(padding));
}

/// Decode a tuple of the given types
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, AbiError> {
    types
        .iter()
        .enumerate()
        .map(|(i, kind)| {
            let word = read_word(data, i * WORD)?;
            if kind.is_dynamic() {
                let offset = word_to_usize(word)?;
                let len = word_to_usize(read_word(data, offset)?)?;
                let start = offset.checked_add(WORD).ok_or(AbiError::Truncated(offset))?;
                let bytes = data
                    .get(start..start.checked_add(len).ok_or(AbiError::Truncated(start))?)
                    .ok_or(AbiError::Truncated(start))?;
                Ok(match kind {
                    ParamType::String => Token::String(String::from_utf8_lossy(bytes).into_owned()),
                    _ => Token::Bytes(bytes.to_vec()),
                })
            } else {
                decode_static(*kind, word)
            }
        })
        .collect()
}

fn read_word(data: &[u8], offset: usize) -> Result<&[u8], AbiError> {
    let end = offset.checked_add(WORD).ok_or(AbiError::Truncated(offset))?;
    data.get(offset..end).ok_or(AbiError::Truncated(offset))
}

fn word_to_u128(word: &[u8]) -> Result<u128, AbiError> {
    if word[..16].iter().any(|&b| b != 0) {
        return Err(AbiError::Overflow);
    }
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(bytes))
}

fn word_to_usize(word: &[u8]) -> Result<usize, AbiError> {
    usize::try_from(word_to_u128(word)?).map_err(|_| AbiError::Overflow)
}

fn decode_static(kind: ParamType, word: &[u8]) -> Result<Token, AbiError> {
    match kind {
        ParamType::Address => {
            let mut bytes = [0u8; 20];
            bytes.copy_from_slice(&word[12..]);
            Ok(Token::Address(Address::from_bytes(bytes)))
        }
        ParamType::Bool => Ok(Token::Bool(word[31] != 0)),
        ParamType::Uint(_) => word_to_u128(word).map(Token::Uint),
        ParamType::Int(_) => {
            let fill = if word[0] & 0x80 != 0 { 0xff } else { 0x00 };
            if word[..16].iter().any(|&b| b != fill) {
                return Err(AbiError::Overflow);
            }
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(&word[16..]);
            Ok(Token::Int(i128::from_be_bytes(bytes)))
        }
        ParamType::FixedBytes(n) => Ok(Token::FixedBytes(word[..n].to_vec())),
        ParamType::String | ParamType::Bytes => Err(AbiError::UnsupportedType(kind.name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(json: &str) -> Function {
        let entry: AbiEntry = serde_json::from_str(json).unwrap();
        Function::from_entry(&entry).unwrap().unwrap()
    }

    #[test]
    fn test_known_selectors() {
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
    }

    #[test]
    fn test_param_type_parsing() {
        assert_eq!(ParamType::parse("uint").unwrap(), ParamType::Uint(256));
        assert_eq!(ParamType::parse("uint8").unwrap(), ParamType::Uint(8));
        assert_eq!(ParamType::parse("int64").unwrap(), ParamType::Int(64));
        assert_eq!(ParamType::parse("bytes32").unwrap(), ParamType::FixedBytes(32));
        assert!(ParamType::parse("uint7").is_err());
        assert!(ParamType::parse("bytes33").is_err());
        assert!(ParamType::parse("string[]").is_err());
        assert!(ParamType::parse("tuple").is_err());
    }

    #[test]
    fn test_signature_uses_canonical_types() {
        let f = function(
            r#"{"type":"function","name":"store","inputs":[{"name":"id","type":"uint"},{"name":"who","type":"address"}],"outputs":[]}"#,
        );
        assert_eq!(f.signature(), "store(uint256,address)");
        assert!(!f.read_only);
    }

    #[test]
    fn test_encode_string_layout() {
        let encoded = encode(&[Token::String("hello".to_string())]);

        assert_eq!(encoded.len(), 3 * WORD);
        assert_eq!(encoded[31], 0x20); // offset
        assert_eq!(encoded[63], 5); // length
        assert_eq!(&encoded[64..69], b"hello");
        assert!(encoded[69..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_mixed_tuple_decodes_back() {
        let addr: Address = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap();
        let tokens = vec![
            Token::Address(addr),
            Token::String("Jane Doe".to_string()),
            Token::Bool(true),
            Token::String("x".repeat(40)),
            Token::Int(-7),
        ];
        let types = [
            ParamType::Address,
            ParamType::String,
            ParamType::Bool,
            ParamType::String,
            ParamType::Int(256),
        ];

        assert_eq!(decode(&types, &encode(&tokens)).unwrap(), tokens);
    }

    #[test]
    fn test_encode_call_converts_text_arguments() {
        let f = function(
            r#"{"type":"function","name":"updateAIPrediction","inputs":[{"name":"hhNumber","type":"string"},{"name":"p","type":"string"},{"name":"r","type":"string"}],"outputs":[]}"#,
        );

        let data = f.encode_call(&["123456", "85.0", "HIGH"]).unwrap();
        assert_eq!(&data[..4], &f.selector());
        assert_eq!(
            decode(&[ParamType::String; 3], &data[4..]).unwrap(),
            vec![
                Token::String("123456".to_string()),
                Token::String("85.0".to_string()),
                Token::String("HIGH".to_string()),
            ]
        );

        let err = f.encode_call(&["123456"]).unwrap_err();
        assert!(matches!(err, AbiError::ArgumentCount { expected: 3, actual: 1, .. }));
    }

    #[test]
    fn test_uint_argument_must_be_numeric() {
        let f = function(
            r#"{"type":"function","name":"isRegisteredPatient","inputs":[{"name":"hh","type":"uint256"}],"outputs":[{"name":"","type":"bool"}],"stateMutability":"view"}"#,
        );
        assert!(f.read_only);
        assert!(f.encode_call(&["42"]).is_ok());
        assert!(matches!(
            f.encode_call(&["forty-two"]),
            Err(AbiError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_truncated_output() {
        let err = decode(&[ParamType::String], &uint_word(0x20)).unwrap_err();
        assert_eq!(err, AbiError::Truncated(0x20));
    }

    #[test]
    fn test_huge_offsets_are_rejected() {
        let near_max = uint_word(u64::MAX as u128);
        let err = decode(&[ParamType::String], &near_max).unwrap_err();
        assert!(matches!(err, AbiError::Truncated(_) | AbiError::Overflow));

        // valid offset, length word near the limit
        let mut data = uint_word(0x20).to_vec();
        data.extend_from_slice(&uint_word(u64::MAX as u128));
        let err = decode(&[ParamType::Bytes], &data).unwrap_err();
        assert!(matches!(err, AbiError::Truncated(_) | AbiError::Overflow));
    }

    #[test]
    fn test_non_function_entries_are_skipped() {
        let entry: AbiEntry =
            serde_json::from_str(r#"{"type":"event","name":"Registered","inputs":[]}"#).unwrap();
        assert!(Function::from_entry(&entry).is_none());
    }
}
