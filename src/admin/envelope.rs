//! Signed admin call envelope
//!
//! An admin call is an Ethereum transaction (legacy or EIP-2718 typed)
//! whose input data is the JSON call `{"method": ..., "params": [...]}`.
//! The transaction is never broadcast: it only carries the signature that
//! identifies the sender.

use alloy::consensus::{SignableTransaction, Transaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::{Decodable2718, Encodable2718};
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, TxKind};
use alloy::signers::local::PrivateKeySigner;
use serde::{Deserialize, Serialize};

use super::AdminError;

/// Decoded admin call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallArgs {
    pub method: String,
    #[serde(default)]
    pub params: Vec<String>,
}

impl CallArgs {
    pub fn new(method: &str, params: &[&str]) -> Self {
        Self {
            method: method.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Decode a hex encoded (optionally `0x` prefixed) raw transaction
pub fn decode_transaction(raw: &str) -> Result<TxEnvelope, AdminError> {
    let raw = raw.trim();
    let hex_str = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(hex_str).map_err(|e| AdminError::MalformedEnvelope(e.to_string()))?;
    TxEnvelope::decode_2718(&mut bytes.as_slice())
        .map_err(|e| AdminError::MalformedEnvelope(e.to_string()))
}

/// Recover the sender and decode the call carried by the input data
pub fn verify_transaction(tx: &TxEnvelope) -> Result<(Address, CallArgs), AdminError> {
    let sender = tx
        .recover_signer()
        .map_err(|e| AdminError::BadSignature(e.to_string()))?;

    let args: CallArgs = serde_json::from_slice(tx.input())
        .map_err(|e| AdminError::MalformedCall(e.to_string()))?;
    if args.method.trim().is_empty() {
        return Err(AdminError::MalformedCall("empty method".to_string()));
    }
    Ok((sender, args))
}

/// Sign an admin call into a hex encoded envelope
pub fn encode_admin_call(
    signer: &PrivateKeySigner,
    chain_id: u64,
    args: &CallArgs,
) -> Result<String, AdminError> {
    let input = serde_json::to_vec(args).map_err(|e| AdminError::MalformedCall(e.to_string()))?;
    let mut tx = TxLegacy {
        chain_id: Some(chain_id),
        to: TxKind::Call(signer.address()),
        input: input.into(),
        ..Default::default()
    };
    let signature = signer
        .sign_transaction_sync(&mut tx)
        .map_err(|e| AdminError::BadSignature(e.to_string()))?;
    let envelope = TxEnvelope::from(tx.into_signed(signature));
    Ok(format!("0x{}", hex::encode(envelope.encoded_2718())))
}
