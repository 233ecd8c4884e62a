use std::sync::Arc;
use tracing::{info, warn};

use super::command::{AdminCommand, BlacklistOp, MaintainScope, PairSelection};
use super::AdminError;
use crate::store::SwapStore;
use crate::tokens::{BridgeRegistry, TokenError};
use crate::types::SwapDirection;
use crate::worker::SwapWorker;

pub const SUCCESS: &str = "Success";

/// Runs authorized admin commands against the store, bridges and worker
pub struct AdminProcessor {
    store: Arc<dyn SwapStore>,
    bridges: Arc<BridgeRegistry>,
    worker: Arc<dyn SwapWorker>,
}

impl AdminProcessor {
    pub fn new(
        store: Arc<dyn SwapStore>,
        bridges: Arc<BridgeRegistry>,
        worker: Arc<dyn SwapWorker>,
    ) -> Self {
        Self {
            store,
            bridges,
            worker,
        }
    }

    pub async fn execute(&self, cmd: &AdminCommand) -> Result<String, AdminError> {
        match cmd {
            AdminCommand::Blacklist {
                op,
                address,
                pair_id,
            } => self.blacklist(*op, address, pair_id).await,

            AdminCommand::BigValue { target } => {
                self.store.pass_big_value(target.direction, &target.key).await?;
                info!(target = %target, "Big value swap passed");
                Ok(SUCCESS.to_string())
            }

            AdminCommand::Maintain {
                disable,
                scope,
                pairs,
            } => Ok(self.maintain(*disable, *scope, pairs)),

            AdminCommand::Reverify { target } => {
                self.store.reverify(target.direction, &target.key).await?;
                info!(target = %target, "Swap reverify requested");
                Ok(SUCCESS.to_string())
            }

            AdminCommand::Reswap { target, force } => {
                self.store
                    .reswap(target.direction, &target.key, *force)
                    .await?;
                info!(target = %target, force, "Swap reswap requested");
                Ok(SUCCESS.to_string())
            }

            AdminCommand::ReplaceSwap { target, gas_price } => {
                self.worker
                    .replace_swap(target.direction, &target.key, gas_price)
                    .await?;
                Ok(SUCCESS.to_string())
            }

            AdminCommand::Manual { target, pass, memo } => {
                self.store
                    .manual_manage_swap(target.direction, &target.key, memo, *pass)
                    .await?;
                info!(target = %target, pass, memo = %memo, "Swap manually managed");
                Ok(SUCCESS.to_string())
            }

            AdminCommand::SetNonce {
                direction,
                nonce,
                pair_id,
            } => {
                self.set_nonce(*direction, *nonce, pair_id)?;
                Ok(SUCCESS.to_string())
            }

            AdminCommand::AddPair { config_file } => {
                let pairs = self.bridges.pairs();
                let pair = pairs.add_pair_config_file(config_file)?;
                if let Err(e) = self.worker.add_swap_job(&pair).await {
                    pairs.remove_pair(&pair.pair_id);
                    warn!(pair_id = %pair.pair_id, error = %e, "Swap job not added, pair unregistered");
                    return Err(e.into());
                }
                info!(pair_id = %pair.pair_id, config_file = %config_file, "Token pair added");
                Ok(SUCCESS.to_string())
            }
        }
    }

    async fn blacklist(
        &self,
        op: BlacklistOp,
        address: &str,
        pair_id: &str,
    ) -> Result<String, AdminError> {
        match op {
            BlacklistOp::Add => {
                self.store.add_to_blacklist(address, pair_id).await?;
                info!(address = %address, pair_id = %pair_id, "Added to blacklist");
                Ok(SUCCESS.to_string())
            }
            BlacklistOp::Remove => {
                self.store.remove_from_blacklist(address, pair_id).await?;
                info!(address = %address, pair_id = %pair_id, "Removed from blacklist");
                Ok(SUCCESS.to_string())
            }
            BlacklistOp::Query => {
                let listed = self.store.query_blacklist(address, pair_id).await?;
                Ok(if listed {
                    "is in blacklist".to_string()
                } else {
                    "is not in blacklist".to_string()
                })
            }
        }
    }

    /// Toggle swap switches pair by pair; unknown ids are reported, not fatal
    fn maintain(&self, disable: bool, scope: MaintainScope, selection: &PairSelection) -> String {
        let pairs = self.bridges.pairs();
        let ids = match selection {
            PairSelection::All => pairs.pair_ids(),
            PairSelection::Ids(ids) => ids.clone(),
        };

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for pair_id in ids {
            match pairs.get(&pair_id) {
                Some(entry) => {
                    if scope.deposit() {
                        entry.set_src_disabled(disable);
                    }
                    if scope.withdraw() {
                        entry.set_dest_disabled(disable);
                    }
                    succeeded.push(pair_id);
                }
                None => {
                    warn!(pair_id = %pair_id, "Maintain skipped unknown pair");
                    failed.push(pair_id);
                }
            }
        }

        info!(
            disable,
            scope = ?scope,
            succeeded = succeeded.len(),
            failed = failed.len(),
            "Swap switches updated"
        );

        let mut summary = format!("success: {}", succeeded.join(" "));
        if !failed.is_empty() {
            summary.push_str(&format!(", failed: {}", failed.join(" ")));
        }
        summary
    }

    fn set_nonce(&self, direction: SwapDirection, nonce: u64, pair_id: &str) -> Result<(), AdminError> {
        let bridge = self.bridges.sender_for(direction);
        let setter = bridge
            .nonce_setter()
            .ok_or(AdminError::NonceSetterUnsupported)?;
        if bridge.token_config(pair_id).is_none() {
            return Err(TokenError::UnknownPairId(pair_id.to_string()).into());
        }
        setter.set_nonce(pair_id, nonce);
        Ok(())
    }
}
