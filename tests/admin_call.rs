//! End-to-end admin call tests
//!
//! Signed envelopes go through `AdminService::admin_call` against the
//! in-memory store and in-process chain readers; no external
//! infrastructure is needed.

use std::io::Write;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use tokio_test::{assert_err, assert_ok};

use swap_bridge::admin::{
    encode_admin_call, AdminError, AdminGate, AdminProcessor, AdminService, AuthoritySet,
    CallArgs, ErrorKind,
};
use swap_bridge::config::{ChainConfig, ChainFamily};
use swap_bridge::store::{MemorySwapStore, SwapKey, SwapRecord, SwapResultRecord, SwapStore};
use swap_bridge::tokens::{
    Bridge, BridgeCommon, BridgeRegistry, BuildTxArgs, ChainReader, EthBridge, TokenError,
    TokenPairRegistry, UtxoBridge,
};
use swap_bridge::types::{SwapDirection, SwapStatus, SwapType};
use swap_bridge::worker::LocalWorker;

const TOKEN: &str = "0x00000000000000000000000000000000000000c1";
const TXID: &str = "0x2222222222222222222222222222222222222222222222222222222222222222";
const BIND: &str = "0x1111111111111111111111111111111111111111";

// ============================================================================
// Harness
// ============================================================================

struct FixedReader(u64);

#[async_trait]
impl ChainReader for FixedReader {
    async fn block_number(&self) -> Result<u64, TokenError> {
        Ok(self.0)
    }

    async fn erc20_balance(&self, _token: Address, _holder: Address) -> Result<U256, TokenError> {
        Ok(U256::MAX)
    }
}

fn chain(family: ChainFamily, chain_id: &str) -> ChainConfig {
    let utxo = family == ChainFamily::Utxo;
    ChainConfig {
        block_chain: chain_id.to_uppercase(),
        chain_id: chain_id.to_string(),
        family,
        rpc_url: String::new(),
        signer_key: None,
        pub_key_hash_addr_id: utxo.then_some(30),
        script_hash_addr_id: utxo.then_some(13),
    }
}

fn bridge(family: ChainFamily, chain_id: &str, is_src: bool, pairs: Arc<TokenPairRegistry>) -> Bridge {
    let common = BridgeCommon::new(chain(family, chain_id), is_src, pairs);
    match family {
        ChainFamily::Evm => Bridge::Eth(EthBridge::new(common, Arc::new(FixedReader(100))).unwrap()),
        ChainFamily::Utxo => Bridge::Utxo(UtxoBridge::new(common).unwrap()),
    }
}

fn pair_file(pair_id: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
pair_id = "{pair_id}"

[src_token]
symbol = "{pair_id}"
decimals = 8

[dest_token]
symbol = "any{pair_id}"
decimals = 8
contract_address = "{TOKEN}"
"#
    )
    .unwrap();
    file
}

struct Harness {
    service: AdminService,
    store: Arc<MemorySwapStore>,
    bridges: Arc<BridgeRegistry>,
    worker: Arc<LocalWorker>,
    admin: PrivateKeySigner,
}

impl Harness {
    fn new(admins: &[String], src: ChainFamily, dst: ChainFamily) -> Self {
        let pairs = Arc::new(TokenPairRegistry::new());
        for id in ["usdt", "btc"] {
            pairs.add_pair_config_file(pair_file(id).path()).unwrap();
        }
        let src_id = if src == ChainFamily::Utxo { "colx" } else { "56" };
        let dst_id = if dst == ChainFamily::Utxo { "ltc" } else { "1" };
        let bridges = Arc::new(BridgeRegistry::new(
            bridge(src, src_id, true, pairs.clone()),
            bridge(dst, dst_id, false, pairs),
        ));
        let store = Arc::new(MemorySwapStore::new());
        let worker = Arc::new(LocalWorker::new(store.clone(), bridges.clone()));
        let service = AdminService::new(
            AdminGate::new(AuthoritySet::new(admins)),
            AdminProcessor::new(store.clone(), bridges.clone(), worker.clone()),
        );
        Self {
            service,
            store,
            bridges,
            worker,
            admin: PrivateKeySigner::random(),
        }
    }

    /// Utxo source, EVM destination, with `self.admin` in the authority set
    fn standard() -> Self {
        let admin = PrivateKeySigner::random();
        let mut harness = Self::new(&[admin.address().to_string()], ChainFamily::Utxo, ChainFamily::Evm);
        harness.admin = admin;
        harness
    }

    async fn call_as(&self, signer: &PrivateKeySigner, method: &str, params: &[&str]) -> Result<String, AdminError> {
        let raw = encode_admin_call(signer, 1, &CallArgs::new(method, params)).unwrap();
        self.service.admin_call(&raw).await
    }

    async fn call(&self, method: &str, params: &[&str]) -> Result<String, AdminError> {
        self.call_as(&self.admin, method, params).await
    }

    fn seed(&self, direction: SwapDirection, status: SwapStatus) -> SwapKey {
        let key = SwapKey::new(TXID, "usdt", BIND);
        let mut swap = SwapRecord::new(key.clone(), SwapType::from(direction), 1);
        swap.status = status;
        self.store.insert_swap(direction, swap);
        key
    }
}

// ============================================================================
// Authorization
// ============================================================================

mod authorization {
    use super::*;

    #[tokio::test]
    async fn test_no_admin_configured_rejects_everything() {
        let harness = Harness::new(&[], ChainFamily::Utxo, ChainFamily::Evm);
        let signer = PrivateKeySigner::random();

        let err = assert_err!(harness.call_as(&signer, "blacklist", &["add", "0xaa", "usdt"]).await);
        assert!(matches!(err, AdminError::NoAdminConfigured));
        assert_eq!(err.kind(), ErrorKind::Authorization);

        let err = assert_err!(harness.service.admin_call("0xnot-a-tx").await);
        assert!(matches!(err, AdminError::NoAdminConfigured));

        // nothing was written
        assert!(!harness.store.query_blacklist("0xaa", "usdt").await.unwrap());
    }

    #[tokio::test]
    async fn test_non_admin_rejected_without_side_effect() {
        let harness = Harness::standard();
        let stranger = PrivateKeySigner::random();

        let err = assert_err!(harness.call_as(&stranger, "blacklist", &["add", "0xaa", "usdt"]).await);
        assert!(matches!(err, AdminError::NotAdmin(_)));
        assert!(!harness.store.query_blacklist("0xaa", "usdt").await.unwrap());

        let result = assert_ok!(harness.call("blacklist", &["add", "0xaa", "usdt"]).await);
        assert_eq!(result, "Success");
    }

    #[tokio::test]
    async fn test_admin_match_ignores_case() {
        let admin = PrivateKeySigner::random();
        let upper = admin.address().to_string().to_uppercase().replacen("0X", "0x", 1);
        let mut harness = Harness::new(&[upper], ChainFamily::Utxo, ChainFamily::Evm);
        harness.admin = admin;

        assert_ok!(harness.call("blacklist", &["query", "0xaa", "usdt"]).await);
    }

    #[tokio::test]
    async fn test_malformed_envelope() {
        let harness = Harness::standard();
        let err = assert_err!(harness.service.admin_call("0x1234").await);
        assert!(matches!(err, AdminError::MalformedEnvelope(_)));
    }
}

// ============================================================================
// Commands
// ============================================================================

mod commands {
    use super::*;

    #[tokio::test]
    async fn test_blacklist_round_trip() {
        let harness = Harness::standard();
        let query = ["query", "0xAbC", "USDT"];

        assert_eq!(harness.call("blacklist", &query).await.unwrap(), "is not in blacklist");
        assert_ok!(harness.call("blacklist", &["add", "0xabc", "usdt"]).await);
        assert_eq!(harness.call("blacklist", &query).await.unwrap(), "is in blacklist");
        assert_ok!(harness.call("blacklist", &["remove", "0xABC", "usdt"]).await);
        assert_eq!(harness.call("blacklist", &query).await.unwrap(), "is not in blacklist");
    }

    #[tokio::test]
    async fn test_maintain_open_close_with_invalid_id() {
        let harness = Harness::standard();

        let opened = harness.call("maintain", &["open", "both", "usdt,nope,btc"]).await.unwrap();
        assert_eq!(opened, "success: usdt btc, failed: nope");

        let closed = harness.call("maintain", &["close", "both", "all"]).await.unwrap();
        assert_eq!(closed, "success: btc usdt");

        for id in ["usdt", "btc"] {
            let entry = harness.bridges.pairs().get(id).unwrap();
            assert!(entry.src_disabled());
            assert!(entry.dest_disabled());
        }

        // rerun converges to the same state
        let closed = harness.call("maintain", &["close", "both", "all"]).await.unwrap();
        assert_eq!(closed, "success: btc usdt");
    }

    #[tokio::test]
    async fn test_arity_errors_have_no_side_effect() {
        let harness = Harness::standard();

        let err = assert_err!(harness.call("blacklist", &["add", "0xaa"]).await);
        assert_eq!(err.to_string(), "wrong number of params, have 2 want 3");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!harness.store.query_blacklist("0xaa", "").await.unwrap());

        let err = assert_err!(harness.call("maintain", &["close", "both"]).await);
        assert!(matches!(err, AdminError::WrongArity { .. }));
        assert!(!harness.bridges.pairs().get("usdt").unwrap().src_disabled());

        let err = assert_err!(harness.call("frobnicate", &[]).await);
        assert_eq!(err.to_string(), "unknown admin method 'frobnicate'");
    }

    #[tokio::test]
    async fn test_reswap_force_flag_validated() {
        let harness = Harness::standard();
        harness.seed(SwapDirection::Swapin, SwapStatus::TxSwapFailed);

        let err = assert_err!(harness.call("reswap", &["swapin", TXID, "usdt", BIND, "-f"]).await);
        assert!(matches!(err, AdminError::WrongForceFlag(ref flag) if flag == "-f"));
        assert_eq!(
            harness.store.find_swap(SwapDirection::Swapin, &SwapKey::new(TXID, "usdt", BIND)).await.unwrap().status,
            SwapStatus::TxSwapFailed
        );
    }

    #[tokio::test]
    async fn test_manual_fail_records_memo() {
        let harness = Harness::standard();
        let key = harness.seed(SwapDirection::Swapout, SwapStatus::TxWithWrongValue);

        assert_ok!(harness.call("manual", &["fail-swapout", TXID, "usdt", BIND, "paid out by hand"]).await);

        let swap = harness.store.find_swap(SwapDirection::Swapout, &key).await.unwrap();
        assert_eq!(swap.status, SwapStatus::ManualMakeFail);
        assert_eq!(swap.memo, "paid out by hand");

        // processed swaps are final
        let key = harness.seed(SwapDirection::Swapin, SwapStatus::TxProcessed);
        let err = assert_err!(harness.call("manual", &["pass-swapin", TXID, "usdt", BIND]).await);
        assert_eq!(err.kind(), ErrorKind::Store);
        let swap = harness.store.find_swap(SwapDirection::Swapin, &key).await.unwrap();
        assert_eq!(swap.status, SwapStatus::TxProcessed);
    }

    #[tokio::test]
    async fn test_manual_pass_cannot_bypass_reswap_force() {
        let harness = Harness::standard();
        let key = harness.seed(SwapDirection::Swapin, SwapStatus::TxSwapFailed);
        let swap = harness.store.find_swap(SwapDirection::Swapin, &key).await.unwrap();
        let mut result = SwapResultRecord::from_swap(&swap, "1000");
        result.status = SwapStatus::MatchTxFailed;
        result.swap_tx = "0xfeed".to_string();
        result.swap_height = 9;
        harness.store.insert_swap_result(SwapDirection::Swapin, result);

        let err = assert_err!(harness.call("reswap", &["swapin", TXID, "usdt", BIND]).await);
        assert_eq!(err.kind(), ErrorKind::Store);

        let err = assert_err!(harness.call("manual", &["pass-swapin", TXID, "usdt", BIND, "retry"]).await);
        assert_eq!(err.kind(), ErrorKind::Store);

        let swap = harness.store.find_swap(SwapDirection::Swapin, &key).await.unwrap();
        assert_eq!(swap.status, SwapStatus::TxSwapFailed);
        let result = harness.store.find_swap_result(SwapDirection::Swapin, &key).await.unwrap();
        assert_eq!(result.status, SwapStatus::MatchTxFailed);
        assert_eq!(result.swap_height, 9);
    }

    #[tokio::test]
    async fn test_replaceswap_without_signer_is_an_error() {
        let harness = Harness::standard();
        let key = harness.seed(SwapDirection::Swapin, SwapStatus::TxProcessed);
        let swap = harness.store.find_swap(SwapDirection::Swapin, &key).await.unwrap();
        let mut result = SwapResultRecord::from_swap(&swap, "100000000");
        result.status = SwapStatus::MatchTxNotStable;
        result.swap_tx = "0xstuck".to_string();
        result.swap_nonce = 3;
        harness.store.insert_swap_result(SwapDirection::Swapin, result);

        let err = assert_err!(harness.call("replaceswap", &["swapin", TXID, "usdt", BIND, "2000000000"]).await);
        assert_eq!(err.kind(), ErrorKind::Chain);
        assert!(err.to_string().contains("no signer configured"));

        let result = harness.store.find_swap_result(SwapDirection::Swapin, &key).await.unwrap();
        assert_eq!(result.swap_tx, "0xstuck");
    }

    #[tokio::test]
    async fn test_bigvalue_then_reverify() {
        let harness = Harness::standard();
        let key = harness.seed(SwapDirection::Swapin, SwapStatus::TxWithBigValue);

        assert_ok!(harness.call("bigvalue", &["pass-swapin", TXID, "usdt", BIND]).await);
        let swap = harness.store.find_swap(SwapDirection::Swapin, &key).await.unwrap();
        assert_eq!(swap.status, SwapStatus::TxNotSwapped);

        harness.seed(SwapDirection::Swapin, SwapStatus::TxVerifyFailed);
        assert_ok!(harness.call("reverify", &["swapin", TXID, "usdt", BIND]).await);
        let swap = harness.store.find_swap(SwapDirection::Swapin, &key).await.unwrap();
        assert_eq!(swap.status, SwapStatus::TxNotStable);
    }

    #[tokio::test]
    async fn test_addpair_registers_pair_and_job() {
        let harness = Harness::standard();
        let file = pair_file("DOGE");
        let path = file.path().to_string_lossy().to_string();

        assert_ok!(harness.call("addpair", &[path.as_str()]).await);
        assert!(harness.bridges.pairs().get("doge").is_some());
        assert!(harness.worker.jobs().contains(&"doge".to_string()));

        let err = assert_err!(harness.call("addpair", &[path.as_str()]).await);
        assert_eq!(err.to_string(), "pair id 'doge' already exist");
    }
}

// ============================================================================
// Nonce Override
// ============================================================================

mod nonce {
    use super::*;

    #[tokio::test]
    async fn test_setnonce_unsupported_destination() {
        let admin = PrivateKeySigner::random();
        let mut harness = Harness::new(&[admin.address().to_string()], ChainFamily::Evm, ChainFamily::Utxo);
        harness.admin = admin;

        let err = assert_err!(harness.call("setnonce", &["swapin", "42", "usdt"]).await);
        assert!(matches!(err, AdminError::NonceSetterUnsupported));
        assert_eq!(err.kind(), ErrorKind::Capability);

        // the evm source side still has no override
        let setter = harness.bridges.src.nonce_setter().unwrap();
        assert_eq!(setter.pending_nonce("usdt"), None);
    }

    #[tokio::test]
    async fn test_setnonce_consumed_by_next_build() {
        let harness = Harness::standard();

        // swapout is sent by the utxo source bridge
        let err = assert_err!(harness.call("setnonce", &["swapout", "7", "usdt"]).await);
        assert!(matches!(err, AdminError::NonceSetterUnsupported));

        assert_ok!(harness.call("setnonce", &["swapin", "0x2a", "usdt"]).await);

        let args = BuildTxArgs {
            swap_id: TXID.to_string(),
            pair_id: "usdt".to_string(),
            bind: BIND.to_string(),
            swap_type: SwapType::Swapin,
            origin_value: U256::from(1000u32),
            nonce: None,
            gas_price: None,
        };
        let tx = harness.bridges.dst.build_raw_transaction(&args).await.unwrap();
        assert_eq!(tx.nonce, Some(42));
        assert_eq!(tx.swap_value, U256::from(1000u32));

        let tx = harness.bridges.dst.build_raw_transaction(&args).await.unwrap();
        assert_eq!(tx.nonce, None);
    }

    #[tokio::test]
    async fn test_setnonce_bad_value() {
        let harness = Harness::standard();
        let err = assert_err!(harness.call("setnonce", &["swapin", "forty-two", "usdt"]).await);
        assert!(err.to_string().starts_with("wrong nonce value"));
    }
}
