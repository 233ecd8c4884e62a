//! Common swap types
//!
//! Status, swap type and direction enums shared by the store, the status
//! projection and the admin command processor. Every enum has a canonical
//! string form used for display and for the `statusMsg` field.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Swap Status
// ============================================================================

/// Processing status of a swap record
///
/// Discriminants are the persisted encoding and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum SwapStatus {
    TxNotStable = 0,
    TxVerifyFailed = 1,
    TxWithWrongSender = 2,
    TxWithWrongValue = 3,
    TxIncompatible = 4,
    TxNotSwapped = 5,
    TxSwapFailed = 6,
    TxProcessed = 7,
    MatchTxEmpty = 8,
    MatchTxNotStable = 9,
    MatchTxStable = 10,
    TxWithWrongMemo = 11,
    TxWithBigValue = 12,
    TxSenderNotRegistered = 13,
    MatchTxFailed = 14,
    SwapInBlacklist = 15,
    ManualMakeFail = 16,
    BindAddrIsContract = 17,
    RpcQueryError = 18,
}

impl SwapStatus {
    /// Canonical string form
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStatus::TxNotStable => "TxNotStable",
            SwapStatus::TxVerifyFailed => "TxVerifyFailed",
            SwapStatus::TxWithWrongSender => "TxWithWrongSender",
            SwapStatus::TxWithWrongValue => "TxWithWrongValue",
            SwapStatus::TxIncompatible => "TxIncompatible",
            SwapStatus::TxNotSwapped => "TxNotSwapped",
            SwapStatus::TxSwapFailed => "TxSwapFailed",
            SwapStatus::TxProcessed => "TxProcessed",
            SwapStatus::MatchTxEmpty => "MatchTxEmpty",
            SwapStatus::MatchTxNotStable => "MatchTxNotStable",
            SwapStatus::MatchTxStable => "MatchTxStable",
            SwapStatus::TxWithWrongMemo => "TxWithWrongMemo",
            SwapStatus::TxWithBigValue => "TxWithBigValue",
            SwapStatus::TxSenderNotRegistered => "TxSenderNotRegistered",
            SwapStatus::MatchTxFailed => "MatchTxFailed",
            SwapStatus::SwapInBlacklist => "SwapInBlacklist",
            SwapStatus::ManualMakeFail => "ManualMakeFail",
            SwapStatus::BindAddrIsContract => "BindAddrIsContract",
            SwapStatus::RpcQueryError => "RPCQueryError",
        }
    }

    /// Every status, in discriminant order
    pub const ALL: [SwapStatus; 19] = [
        SwapStatus::TxNotStable,
        SwapStatus::TxVerifyFailed,
        SwapStatus::TxWithWrongSender,
        SwapStatus::TxWithWrongValue,
        SwapStatus::TxIncompatible,
        SwapStatus::TxNotSwapped,
        SwapStatus::TxSwapFailed,
        SwapStatus::TxProcessed,
        SwapStatus::MatchTxEmpty,
        SwapStatus::MatchTxNotStable,
        SwapStatus::MatchTxStable,
        SwapStatus::TxWithWrongMemo,
        SwapStatus::TxWithBigValue,
        SwapStatus::TxSenderNotRegistered,
        SwapStatus::MatchTxFailed,
        SwapStatus::SwapInBlacklist,
        SwapStatus::ManualMakeFail,
        SwapStatus::BindAddrIsContract,
        SwapStatus::RpcQueryError,
    ];

    /// Status left behind by a failed verification step
    pub fn can_reverify(&self) -> bool {
        matches!(
            self,
            SwapStatus::TxVerifyFailed
                | SwapStatus::TxWithWrongSender
                | SwapStatus::TxWithWrongValue
                | SwapStatus::TxIncompatible
                | SwapStatus::TxWithWrongMemo
                | SwapStatus::TxSenderNotRegistered
                | SwapStatus::BindAddrIsContract
                | SwapStatus::RpcQueryError
        )
    }

    /// Swap-record status from which a re-execution may start
    pub fn can_reswap(&self) -> bool {
        matches!(self, SwapStatus::TxSwapFailed | SwapStatus::TxProcessed)
    }

    /// Result-record status from which a re-execution may start
    pub fn result_can_reswap(&self) -> bool {
        matches!(
            self,
            SwapStatus::MatchTxFailed | SwapStatus::MatchTxEmpty | SwapStatus::MatchTxNotStable
        )
    }

    /// Status from which a manual pass may queue the swap for execution
    ///
    /// Only swaps held back by verification or an approval gate qualify;
    /// anything that reached execution goes through reswap instead.
    pub fn can_manual_pass(&self) -> bool {
        self.can_reverify()
            || matches!(
                self,
                SwapStatus::TxWithBigValue
                    | SwapStatus::SwapInBlacklist
                    | SwapStatus::ManualMakeFail
                    | SwapStatus::TxNotSwapped
            )
    }

    /// Status from which a manual fail may close the swap
    pub fn can_manual_fail(&self) -> bool {
        self.can_manual_pass() || *self == SwapStatus::TxNotStable
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<SwapStatus> for i32 {
    fn from(status: SwapStatus) -> Self {
        status as i32
    }
}

impl TryFrom<i32> for SwapStatus {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        SwapStatus::ALL
            .iter()
            .copied()
            .find(|s| *s as i32 == value)
            .ok_or(value)
    }
}

// ============================================================================
// Swap Type
// ============================================================================

/// Kind of swap a result record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum SwapType {
    Swapin = 1,
    Swapout = 2,
    RouterSwap = 3,
}

impl SwapType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapType::Swapin => "swapin",
            SwapType::Swapout => "swapout",
            SwapType::RouterSwap => "routerswap",
        }
    }
}

impl fmt::Display for SwapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<u32> for SwapType {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SwapType::Swapin),
            2 => Ok(SwapType::Swapout),
            3 => Ok(SwapType::RouterSwap),
            other => Err(other),
        }
    }
}

// ============================================================================
// Swap Direction
// ============================================================================

/// Direction of a two-chain swap
///
/// Swap-in moves value from the source chain to the destination chain,
/// swap-out moves it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapDirection {
    Swapin,
    Swapout,
}

impl SwapDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapDirection::Swapin => "swapin",
            SwapDirection::Swapout => "swapout",
        }
    }

    pub fn is_swapin(&self) -> bool {
        matches!(self, SwapDirection::Swapin)
    }

    /// Parse the `swapin` / `swapout` path and op token
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "swapin" => Some(SwapDirection::Swapin),
            "swapout" => Some(SwapDirection::Swapout),
            _ => None,
        }
    }
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<SwapDirection> for SwapType {
    fn from(direction: SwapDirection) -> Self {
        match direction {
            SwapDirection::Swapin => SwapType::Swapin,
            SwapDirection::Swapout => SwapType::Swapout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_as_str() {
        assert_eq!(SwapStatus::TxNotStable.as_str(), "TxNotStable");
        assert_eq!(SwapStatus::TxWithBigValue.as_str(), "TxWithBigValue");
        assert_eq!(SwapStatus::ManualMakeFail.as_str(), "ManualMakeFail");
        assert_eq!(SwapStatus::RpcQueryError.as_str(), "RPCQueryError");
    }

    #[test]
    fn test_status_display_matches_as_str() {
        for status in SwapStatus::ALL {
            assert_eq!(status.to_string(), status.as_str());
        }
    }

    #[test]
    fn test_status_i32_encoding() {
        for (idx, status) in SwapStatus::ALL.iter().enumerate() {
            assert_eq!(i32::from(*status), idx as i32);
            assert_eq!(SwapStatus::try_from(idx as i32), Ok(*status));
        }
        assert_eq!(SwapStatus::try_from(99), Err(99));
    }

    #[test]
    fn test_manual_override_sets() {
        assert!(SwapStatus::TxWithWrongValue.can_manual_pass());
        assert!(SwapStatus::SwapInBlacklist.can_manual_pass());
        assert!(SwapStatus::ManualMakeFail.can_manual_pass());
        assert!(!SwapStatus::TxNotStable.can_manual_pass());
        assert!(SwapStatus::TxNotStable.can_manual_fail());

        for executed in [SwapStatus::TxProcessed, SwapStatus::TxSwapFailed] {
            assert!(!executed.can_manual_pass());
            assert!(!executed.can_manual_fail());
        }
    }

    #[test]
    fn test_reverify_set() {
        assert!(SwapStatus::TxVerifyFailed.can_reverify());
        assert!(SwapStatus::TxSenderNotRegistered.can_reverify());
        assert!(!SwapStatus::TxProcessed.can_reverify());
        assert!(!SwapStatus::TxWithBigValue.can_reverify());
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(SwapDirection::parse("swapin"), Some(SwapDirection::Swapin));
        assert_eq!(SwapDirection::parse("swapout"), Some(SwapDirection::Swapout));
        assert_eq!(SwapDirection::parse("SWAPIN"), None);
        assert_eq!(SwapType::from(SwapDirection::Swapout), SwapType::Swapout);
    }

    #[test]
    fn test_swap_type_from_u32() {
        assert_eq!(SwapType::try_from(3), Ok(SwapType::RouterSwap));
        assert_eq!(SwapType::try_from(0), Err(0));
    }
}
