//! ABI bindings used by the account-based bridge
//!
//! Uses alloy's sol! macro to generate type-safe bindings.

use alloy::sol;

sol! {
    /// Bridge token entry point minting (or releasing) a settled swap-in
    ///
    /// * `txhash` - Source chain transaction being settled
    /// * `account` - Recipient on this chain
    /// * `amount` - Amount in destination token decimals
    function Swapin(bytes32 txhash, address account, uint256 amount) external returns (bool);

    /// Minimal ERC20 surface: balance pre-check and swap-out transfers
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}
