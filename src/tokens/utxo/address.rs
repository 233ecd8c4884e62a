//! UTXO address conversion
//!
//! Decodes an address of one UTXO chain (a serialized public key or a
//! base58check string with the chain's own version bytes) and re-targets it
//! onto another network's version bytes. Ambiguous or malformed input is
//! always rejected.

use bitcoin::hashes::{hash160, Hash};
use bitcoin::secp256k1::PublicKey;
use std::fmt;
use thiserror::Error;

use super::ChainParams;

/// Address decoding failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("decoded address is of unknown format")]
    UnknownFormat,

    #[error("address collision: version byte {0} is both pubkey-hash and script-hash")]
    AddressCollision(u8),

    #[error("unknown address type: version byte {0}")]
    UnknownAddressType(u8),

    #[error("decoded address is of unknown size {0}")]
    UnknownSize(usize),

    #[error("invalid public key: {0}")]
    InvalidPubKey(String),

    #[error("unknown network '{0}'")]
    UnknownNetwork(String),
}

/// A decoded UTXO address bound to the network it encodes for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtxoAddress {
    /// Serialized public key (33 or 65 bytes)
    PubKey {
        serialized: Vec<u8>,
        params: ChainParams,
    },
    PubKeyHash {
        hash: [u8; 20],
        params: ChainParams,
    },
    ScriptHash {
        hash: [u8; 20],
        params: ChainParams,
    },
}

impl UtxoAddress {
    pub fn params(&self) -> &ChainParams {
        match self {
            UtxoAddress::PubKey { params, .. }
            | UtxoAddress::PubKeyHash { params, .. }
            | UtxoAddress::ScriptHash { params, .. } => params,
        }
    }

    /// The 20-byte hash the address pays to
    pub fn hash160(&self) -> [u8; 20] {
        match self {
            UtxoAddress::PubKey { serialized, .. } => {
                hash160::Hash::hash(serialized).to_byte_array()
            }
            UtxoAddress::PubKeyHash { hash, .. } | UtxoAddress::ScriptHash { hash, .. } => *hash,
        }
    }

    /// Base58check encoding; a public key encodes as its pay-to-pubkey-hash form
    pub fn encode(&self) -> String {
        let params = self.params();
        let version = match self {
            UtxoAddress::ScriptHash { .. } => params.script_hash_addr_id,
            _ => params.pub_key_hash_addr_id,
        };
        check_encode(&self.hash160(), version)
    }
}

impl fmt::Display for UtxoAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Encode `version || payload || checksum` as base58
pub fn check_encode(payload: &[u8], version: u8) -> String {
    bs58::encode(payload)
        .with_check_version(version)
        .into_string()
}

/// Decode a base58check string into `(payload, version)`
pub fn check_decode(s: &str) -> Result<(Vec<u8>, u8), AddressError> {
    let data = bs58::decode(s)
        .with_check(None)
        .into_vec()
        .map_err(|e| match e {
            bs58::decode::Error::InvalidChecksum { .. } => AddressError::ChecksumMismatch,
            _ => AddressError::UnknownFormat,
        })?;
    match data.split_first() {
        Some((version, payload)) => Ok((payload.to_vec(), *version)),
        None => Err(AddressError::UnknownFormat),
    }
}

/// Convert `addr`, encoded with `chain` version bytes, onto `target`
///
/// Serialized public keys (66 or 130 hex chars) always decode onto Bitcoin
/// mainnet parameters, whatever the target.
pub fn convert_address(
    addr: &str,
    chain: &ChainParams,
    target: &ChainParams,
) -> Result<UtxoAddress, AddressError> {
    if addr.len() == 130 || addr.len() == 66 {
        let serialized =
            hex::decode(addr).map_err(|e| AddressError::InvalidPubKey(e.to_string()))?;
        PublicKey::from_slice(&serialized)
            .map_err(|e| AddressError::InvalidPubKey(e.to_string()))?;
        return Ok(UtxoAddress::PubKey {
            serialized,
            params: ChainParams::BTC_MAINNET,
        });
    }

    let (decoded, net_id) = check_decode(addr)?;
    match decoded.len() {
        20 => {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(&decoded);
            let is_p2pkh = net_id == chain.pub_key_hash_addr_id;
            let is_p2sh = net_id == chain.script_hash_addr_id;
            match (is_p2pkh, is_p2sh) {
                (true, true) => Err(AddressError::AddressCollision(net_id)),
                (true, false) => Ok(UtxoAddress::PubKeyHash {
                    hash,
                    params: *target,
                }),
                (false, true) => Ok(UtxoAddress::ScriptHash {
                    hash,
                    params: *target,
                }),
                (false, false) => Err(AddressError::UnknownAddressType(net_id)),
            }
        }
        n => Err(AddressError::UnknownSize(n)),
    }
}
