//! Storage proofs: mapping-slot key derivation, proof-op decoding, and key-path
//! reconstruction for the hub's proof payload.
//!
//! The side chain's eth_getProof returns, per storage key, a protobuf text-format
//! Merkle proof (`ops:<type:"..." key:"..." data:"..." > ...`). The hub needs the
//! store key path of that proof alongside the raw event payload to check it against
//! its own copy of the header.

use crate::error::{RelayError, Result};
use ciborium::value::Value as Cbor;
use serde::Deserialize;
use sha3::{Digest, Keccak256};

/// Slot of the per-transfer hash mapping in the cross-chain data contract.
pub const TRANSFER_MAPPING_SLOT: [u8; 1] = [0x01];

/// Storage key of `mapping[tx_index]` at [TRANSFER_MAPPING_SLOT]:
/// `keccak256(leftpad32(tx_index) ‖ leftpad32(slot))`.
pub fn mapping_key(tx_index_hex: &str) -> Result<[u8; 32]> {
    let index = hex::decode(tx_index_hex)
        .map_err(|e| RelayError::Decode(format!("tx index {tx_index_hex:?}: {e}")))?;
    let mut hasher = Keccak256::new();
    hasher.update(left_pad_32(&index)?);
    hasher.update(left_pad_32(&TRANSFER_MAPPING_SLOT)?);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    Ok(out)
}

fn left_pad_32(bytes: &[u8]) -> Result<[u8; 32]> {
    if bytes.len() > 32 {
        return Err(RelayError::Decode(format!(
            "mapping key component is {} bytes",
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}

/// One Merkle proof operation, outermost last.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProofOp {
    pub kind: String,
    pub key: Vec<u8>,
    pub data: Vec<u8>,
}

/// Store key path: op keys from the last op to the first, each preceded by `/`.
///
/// Keys are raw bytes and are not required to be UTF-8. No ops yields an empty path.
pub fn key_path(ops: &[ProofOp]) -> Vec<u8> {
    let mut path = vec![b'/'];
    for op in ops.iter().rev() {
        path.extend_from_slice(&op.key);
        path.push(b'/');
    }
    path.pop();
    path
}

/// eth_getProof response; only the storage proofs are read.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthProof {
    #[serde(default)]
    pub storage_proof: Vec<StorageProof>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageProof {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub proof: Vec<String>,
}

impl EthProof {
    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(|e| RelayError::Decode(format!("eth proof: {e}")))
    }

    /// Text-format Merkle proof of the first requested storage key.
    pub fn storage_proof_text(&self) -> Result<&str> {
        self.storage_proof
            .first()
            .and_then(|sp| sp.proof.first())
            .map(String::as_str)
            .ok_or_else(|| RelayError::Decode("eth proof has no storage proof".into()))
    }
}

/// Payload the hub verifies: key path plus the raw event value it must prove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofValue {
    pub kp: Vec<u8>,
    pub value: Vec<u8>,
}

impl ProofValue {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let value = Cbor::Map(vec![
            (Cbor::Text("kp".into()), Cbor::Bytes(self.kp.clone())),
            (Cbor::Text("value".into()), Cbor::Bytes(self.value.clone())),
        ]);
        let mut out = Vec::new();
        ciborium::ser::into_writer(&value, &mut out)
            .map_err(|e| RelayError::Decode(format!("encode proof value: {e}")))?;
        Ok(out)
    }
}

/// Decode the op list of a protobuf text-format `merkle.Proof`.
///
/// Accepts both `ops:<...>` and `ops {...}` message syntax. Unknown scalar fields are
/// ignored; only string values are understood.
pub fn parse_text_proof(text: &str) -> Result<Vec<ProofOp>> {
    let tokens = tokenize(text)?;
    let mut it = tokens.into_iter().peekable();
    let mut ops = Vec::new();
    while let Some(tok) = it.next() {
        let name = match tok {
            Token::Ident(name) => name,
            other => return Err(proof_err(format!("expected field name, got {other:?}"))),
        };
        if it.peek() == Some(&Token::Colon) {
            it.next();
        }
        match it.next() {
            Some(Token::Open(close)) if name == "ops" => {
                let mut op = ProofOp::default();
                loop {
                    match it.next() {
                        Some(Token::Close(c)) if c == close => break,
                        Some(Token::Ident(field)) => {
                            if it.peek() == Some(&Token::Colon) {
                                it.next();
                            }
                            let value = match it.next() {
                                Some(Token::Str(v)) => v,
                                other => {
                                    return Err(proof_err(format!(
                                        "field {field}: expected string, got {other:?}"
                                    )))
                                }
                            };
                            match field.as_str() {
                                "type" => {
                                    op.kind = String::from_utf8(value)
                                        .map_err(|_| proof_err("op type is not utf-8".into()))?
                                }
                                "key" => op.key = value,
                                "data" => op.data = value,
                                _ => {}
                            }
                        }
                        other => return Err(proof_err(format!("inside op: unexpected {other:?}"))),
                    }
                }
                ops.push(op);
            }
            Some(Token::Str(_)) => {}
            other => return Err(proof_err(format!("field {name}: unexpected {other:?}"))),
        }
    }
    Ok(ops)
}

fn proof_err(msg: String) -> RelayError {
    RelayError::Decode(format!("text proof: {msg}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Colon,
    /// Carries the matching close delimiter.
    Open(char),
    Close(char),
    Str(Vec<u8>),
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => i += 1,
            b':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            b'<' => {
                tokens.push(Token::Open('>'));
                i += 1;
            }
            b'{' => {
                tokens.push(Token::Open('}'));
                i += 1;
            }
            b'>' | b'}' => {
                tokens.push(Token::Close(c as char));
                i += 1;
            }
            b'"' | b'\'' => {
                let (s, next) = read_quoted(bytes, i)?;
                tokens.push(Token::Str(s));
                i = next;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push(Token::Ident(text[start..i].to_string()));
            }
            other => return Err(proof_err(format!("unexpected byte {other:#04x} at {i}"))),
        }
    }
    Ok(tokens)
}

/// Read a C-escaped quoted string starting at the opening quote; returns bytes and the
/// index after the closing quote.
fn read_quoted(bytes: &[u8], start: usize) -> Result<(Vec<u8>, usize)> {
    let quote = bytes[start];
    let mut out = Vec::new();
    let mut i = start + 1;
    loop {
        let c = *bytes
            .get(i)
            .ok_or_else(|| proof_err("unterminated string".into()))?;
        i += 1;
        if c == quote {
            return Ok((out, i));
        }
        if c != b'\\' {
            out.push(c);
            continue;
        }
        let esc = *bytes
            .get(i)
            .ok_or_else(|| proof_err("dangling escape".into()))?;
        i += 1;
        match esc {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'v' => out.push(0x0b),
            b'\\' | b'\'' | b'"' | b'?' => out.push(esc),
            b'0'..=b'7' => {
                let mut v = u32::from(esc - b'0');
                for _ in 0..2 {
                    match bytes.get(i) {
                        Some(d @ b'0'..=b'7') => {
                            v = v * 8 + u32::from(d - b'0');
                            i += 1;
                        }
                        _ => break,
                    }
                }
                let byte = u8::try_from(v).map_err(|_| proof_err(format!("octal escape {v} > 255")))?;
                out.push(byte);
            }
            b'x' | b'X' => {
                let mut v = 0u8;
                let mut digits = 0;
                while digits < 2 {
                    match bytes.get(i).and_then(|d| (*d as char).to_digit(16)) {
                        Some(d) => {
                            v = v * 16 + d as u8;
                            i += 1;
                            digits += 1;
                        }
                        None => break,
                    }
                }
                if digits == 0 {
                    return Err(proof_err("\\x without hex digits".into()));
                }
                out.push(v);
            }
            other => return Err(proof_err(format!("unknown escape \\{}", other as char))),
        }
    }
}
