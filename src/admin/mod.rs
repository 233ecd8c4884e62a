//! Authenticated admin command channel
//!
//! `AdminService::admin_call` is the single entry point:
//!
//! 1. refuse everything when no authority set is configured
//! 2. decode the signed envelope and recover its sender
//! 3. check the sender against the authority set
//! 4. parse the call into a typed `AdminCommand`
//! 5. run it with the `AdminProcessor`
//!
//! Any failing stage returns its error before later stages run, so a
//! rejected call has no side effect.

use alloy::consensus::TxEnvelope;
use alloy::primitives::Address;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::config::Config;
use crate::metrics;

pub mod command;
pub mod envelope;
pub mod error;
pub mod processor;

pub use command::{AdminCommand, SwapTarget};
pub use envelope::{decode_transaction, encode_admin_call, verify_transaction, CallArgs};
pub use error::{AdminError, ErrorKind};
pub use processor::{AdminProcessor, SUCCESS};

// ============================================================================
// Authorization Gate
// ============================================================================

/// Addresses allowed to submit admin calls, compared case-insensitively
#[derive(Debug, Clone, Default)]
pub struct AuthoritySet {
    members: HashSet<String>,
}

impl AuthoritySet {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            members: members
                .into_iter()
                .map(|m| m.as_ref().trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.admins)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.members.contains(&address.trim().to_lowercase())
    }
}

/// Verifies signed admin envelopes against the authority set
pub struct AdminGate {
    authorities: AuthoritySet,
}

impl AdminGate {
    pub fn new(authorities: AuthoritySet) -> Self {
        Self { authorities }
    }

    pub fn has_admin(&self) -> bool {
        !self.authorities.is_empty()
    }

    pub fn decode(&self, raw: &str) -> Result<TxEnvelope, AdminError> {
        decode_transaction(raw)
    }

    pub fn verify(&self, tx: &TxEnvelope) -> Result<(Address, CallArgs), AdminError> {
        verify_transaction(tx)
    }

    /// True iff an authority set is configured and `sender` is a member
    pub fn authorize(&self, sender: &Address) -> bool {
        self.has_admin() && self.authorities.contains(&sender.to_string())
    }

    /// Decode, verify and authorize a raw envelope
    pub fn check(&self, raw: &str) -> Result<(Address, CallArgs), AdminError> {
        if !self.has_admin() {
            return Err(AdminError::NoAdminConfigured);
        }
        let tx = self.decode(raw)?;
        let (sender, args) = self.verify(&tx)?;
        if !self.authorize(&sender) {
            return Err(AdminError::NotAdmin(sender.to_string()));
        }
        Ok((sender, args))
    }
}

// ============================================================================
// Service
// ============================================================================

/// Admin call entry point
pub struct AdminService {
    gate: AdminGate,
    processor: AdminProcessor,
}

impl AdminService {
    pub fn new(gate: AdminGate, processor: AdminProcessor) -> Self {
        Self { gate, processor }
    }

    pub fn gate(&self) -> &AdminGate {
        &self.gate
    }

    /// Handle one signed admin call, returning its result text
    pub async fn admin_call(&self, raw: &str) -> Result<String, AdminError> {
        let (sender, args) = match self.gate.check(raw) {
            Ok(checked) => checked,
            Err(e) => {
                warn!(error = %e, "Admin call rejected");
                metrics::record_admin_rejection(e.kind().as_str());
                return Err(e);
            }
        };

        let result = match AdminCommand::try_from(&args) {
            Ok(cmd) => self.processor.execute(&cmd).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => {
                info!(sender = %sender, method = %args.method, params = ?args.params, "Admin call accepted");
                metrics::record_admin_call(&args.method, true);
            }
            Err(e) => {
                warn!(
                    sender = %sender,
                    method = %args.method,
                    params = ?args.params,
                    kind = e.kind().as_str(),
                    error = %e,
                    "Admin call failed"
                );
                metrics::record_admin_call(&args.method, false);
                metrics::record_admin_rejection(e.kind().as_str());
            }
        }
        result
    }
}
