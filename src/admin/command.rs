//! Typed admin commands
//!
//! Every command is parsed and validated into an `AdminCommand` before the
//! processor runs it, so unknown names, unknown operations and wrong
//! parameter counts never reach a side effect.

use std::fmt;

use super::{AdminError, CallArgs};
use crate::store::SwapKey;
use crate::tokens::pairs::parse_amount;
use crate::types::SwapDirection;

pub const FORCE_FLAG: &str = "--force";

/// Blacklist operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlacklistOp {
    Add,
    Remove,
    Query,
}

/// Which per-direction flags `maintain` toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintainScope {
    Deposit,
    Withdraw,
    Both,
}

impl MaintainScope {
    pub fn deposit(&self) -> bool {
        matches!(self, MaintainScope::Deposit | MaintainScope::Both)
    }

    pub fn withdraw(&self) -> bool {
        matches!(self, MaintainScope::Withdraw | MaintainScope::Both)
    }
}

/// Pairs selected by `maintain`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairSelection {
    All,
    Ids(Vec<String>),
}

/// A swap record addressed by an admin command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapTarget {
    pub direction: SwapDirection,
    pub key: SwapKey,
}

impl fmt::Display for SwapTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.direction, self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Blacklist {
        op: BlacklistOp,
        address: String,
        pair_id: String,
    },
    BigValue {
        target: SwapTarget,
    },
    Maintain {
        disable: bool,
        scope: MaintainScope,
        pairs: PairSelection,
    },
    Reverify {
        target: SwapTarget,
    },
    Reswap {
        target: SwapTarget,
        force: bool,
    },
    ReplaceSwap {
        target: SwapTarget,
        gas_price: String,
    },
    Manual {
        target: SwapTarget,
        pass: bool,
        memo: String,
    },
    SetNonce {
        direction: SwapDirection,
        nonce: u64,
        pair_id: String,
    },
    AddPair {
        config_file: String,
    },
}

impl AdminCommand {
    /// Wire name of the command
    pub fn method(&self) -> &'static str {
        match self {
            AdminCommand::Blacklist { .. } => "blacklist",
            AdminCommand::BigValue { .. } => "bigvalue",
            AdminCommand::Maintain { .. } => "maintain",
            AdminCommand::Reverify { .. } => "reverify",
            AdminCommand::Reswap { .. } => "reswap",
            AdminCommand::ReplaceSwap { .. } => "replaceswap",
            AdminCommand::Manual { .. } => "manual",
            AdminCommand::SetNonce { .. } => "setnonce",
            AdminCommand::AddPair { .. } => "addpair",
        }
    }

    /// Whether the command changes state
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            AdminCommand::Blacklist {
                op: BlacklistOp::Query,
                ..
            }
        )
    }
}

impl TryFrom<&CallArgs> for AdminCommand {
    type Error = AdminError;

    fn try_from(args: &CallArgs) -> Result<Self, Self::Error> {
        let params = &args.params;
        match args.method.as_str() {
            "blacklist" => {
                arity(params, 3, 3, "3")?;
                let op = match params[0].as_str() {
                    "add" => BlacklistOp::Add,
                    "remove" => BlacklistOp::Remove,
                    "query" => BlacklistOp::Query,
                    other => return Err(AdminError::UnknownOperation(other.to_string())),
                };
                Ok(AdminCommand::Blacklist {
                    op,
                    address: params[1].clone(),
                    pair_id: params[2].clone(),
                })
            }
            "bigvalue" => {
                arity(params, 4, 4, "4")?;
                let direction = match override_op(&params[0])? {
                    (true, direction) => direction,
                    (false, _) => return Err(AdminError::UnknownOperation(params[0].clone())),
                };
                Ok(AdminCommand::BigValue {
                    target: swap_target(direction, &params[1..]),
                })
            }
            "maintain" => {
                arity(params, 3, 3, "3")?;
                let disable = match params[0].as_str() {
                    "open" => false,
                    "close" => true,
                    other => return Err(AdminError::UnknownOperation(other.to_string())),
                };
                let scope = match params[1].as_str() {
                    "deposit" => MaintainScope::Deposit,
                    "withdraw" => MaintainScope::Withdraw,
                    "both" => MaintainScope::Both,
                    other => return Err(AdminError::UnknownDirection(other.to_string())),
                };
                Ok(AdminCommand::Maintain {
                    disable,
                    scope,
                    pairs: pair_selection(&params[2]),
                })
            }
            "reverify" => {
                arity(params, 4, 4, "4")?;
                Ok(AdminCommand::Reverify {
                    target: swap_target(direction_op(&params[0])?, &params[1..]),
                })
            }
            "reswap" => {
                arity(params, 4, 5, "4 or 5")?;
                let direction = direction_op(&params[0])?;
                let force = match params.get(4) {
                    None => false,
                    Some(flag) if flag == FORCE_FLAG => true,
                    Some(flag) => return Err(AdminError::WrongForceFlag(flag.clone())),
                };
                Ok(AdminCommand::Reswap {
                    target: swap_target(direction, &params[1..4]),
                    force,
                })
            }
            "replaceswap" => {
                arity(params, 5, 5, "5")?;
                Ok(AdminCommand::ReplaceSwap {
                    target: swap_target(direction_op(&params[0])?, &params[1..4]),
                    gas_price: params[4].clone(),
                })
            }
            "manual" => {
                arity(params, 4, 5, "4 or 5")?;
                let (pass, direction) = override_op(&params[0])?;
                Ok(AdminCommand::Manual {
                    target: swap_target(direction, &params[1..4]),
                    pass,
                    memo: params.get(4).cloned().unwrap_or_default(),
                })
            }
            "setnonce" => {
                arity(params, 3, 3, "3")?;
                let direction = direction_op(&params[0])?;
                let nonce = parse_nonce(&params[1])?;
                Ok(AdminCommand::SetNonce {
                    direction,
                    nonce,
                    pair_id: params[2].clone(),
                })
            }
            "addpair" => {
                arity(params, 1, 1, "1")?;
                Ok(AdminCommand::AddPair {
                    config_file: params[0].clone(),
                })
            }
            other => Err(AdminError::UnknownCommand(other.to_string())),
        }
    }
}

fn arity(params: &[String], min: usize, max: usize, want: &'static str) -> Result<(), AdminError> {
    if params.len() < min || params.len() > max {
        return Err(AdminError::WrongArity {
            have: params.len(),
            want,
        });
    }
    Ok(())
}

fn direction_op(op: &str) -> Result<SwapDirection, AdminError> {
    SwapDirection::parse(op).ok_or_else(|| AdminError::UnknownOperation(op.to_string()))
}

/// `pass-swapin`, `failswapout`, ...: the hyphen is optional
fn override_op(op: &str) -> Result<(bool, SwapDirection), AdminError> {
    let unknown = || AdminError::UnknownOperation(op.to_string());
    let (pass, rest) = if let Some(rest) = op.strip_prefix("pass") {
        (true, rest)
    } else if let Some(rest) = op.strip_prefix("fail") {
        (false, rest)
    } else {
        return Err(unknown());
    };
    let rest = rest.strip_prefix('-').unwrap_or(rest);
    let direction = SwapDirection::parse(rest).ok_or_else(unknown)?;
    Ok((pass, direction))
}

/// `[txid, pair_id, bind]`
fn swap_target(direction: SwapDirection, params: &[String]) -> SwapTarget {
    SwapTarget {
        direction,
        key: SwapKey::new(&params[0], &params[1], &params[2]),
    }
}

fn pair_selection(list: &str) -> PairSelection {
    if list.trim().eq_ignore_ascii_case("all") {
        return PairSelection::All;
    }
    PairSelection::Ids(
        list.split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect(),
    )
}

fn parse_nonce(value: &str) -> Result<u64, AdminError> {
    let parsed = parse_amount(value)
        .ok_or_else(|| AdminError::InvalidNonce(format!("'{}' is not a number", value)))?;
    u64::try_from(parsed).map_err(|_| AdminError::InvalidNonce(format!("'{}' overflows u64", value)))
}
