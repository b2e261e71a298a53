//! Tendermint header, commit, and validator set as returned by the side chain's RPC,
//! and the [HeaderBundle] submitted to the hub.

use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tendermint RPC renders 64-bit integers as JSON strings.
mod string_num {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T: Display, S: Serializer>(v: &T, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(v)
    }

    pub fn deserialize<'de, T, D>(d: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(d)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TmHeader {
    pub chain_id: String,
    #[serde(with = "string_num")]
    pub height: u64,
    pub validators_hash: String,
    pub next_validators_hash: String,
    /// Remaining header fields, carried through to the hub untouched.
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl TmHeader {
    /// True when this block rotates the validator set.
    pub fn validators_changed(&self) -> bool {
        !self
            .validators_hash
            .eq_ignore_ascii_case(&self.next_validators_hash)
    }
}

/// `signed_header` from the RPC `commit` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedHeader {
    pub header: TmHeader,
    pub commit: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validator {
    pub address: String,
    pub pub_key: Value,
    #[serde(with = "string_num")]
    pub voting_power: u64,
    #[serde(with = "string_num")]
    pub proposer_priority: i64,
}

/// Header + commit + full validator set at one height, the unit the hub verifies against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderBundle {
    pub header: TmHeader,
    pub commit: Value,
    pub validators: Vec<Validator>,
}

impl HeaderBundle {
    pub fn new(signed: SignedHeader, validators: Vec<Validator>) -> Self {
        Self {
            header: signed.header,
            commit: signed.commit,
            validators,
        }
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    /// CBOR encoding submitted to the hub.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(self, &mut out)
            .map_err(|e| RelayError::Decode(format!("encode header bundle: {e}")))?;
        Ok(out)
    }
}
