use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::session::store::MemoryTokenStore;

fn encode_token(iat: i64, exp: i64) -> String {
    let payload =
        URL_SAFE_NO_PAD.encode(serde_json::json!({ "iat": iat, "exp": exp }).to_string());
    format!("e30.{payload}.sig")
}

fn fresh_raw() -> String {
    let now = now_secs();
    encode_token(now, now + 3600)
}

fn stale_raw() -> String {
    let now = now_secs();
    encode_token(now - 3600, now - 1800)
}

/// Transport that counts calls and hands out long-lived tokens.
struct CountingTransport {
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingTransport {
    fn new(delay: Duration) -> Self {
        Self { calls: AtomicUsize::new(0), delay }
    }
}

#[async_trait::async_trait]
impl RefreshTransport for CountingTransport {
    async fn refresh(&self, _current: &str) -> Result<String, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(fresh_raw())
    }
}

struct FailingTransport;

#[async_trait::async_trait]
impl RefreshTransport for FailingTransport {
    async fn refresh(&self, _current: &str) -> Result<String, ClientError> {
        Err(ClientError::Api { status: 403, message: "refresh token revoked".to_owned() })
    }
}

fn manager_with(
    raw: Option<String>,
    transport: Arc<dyn RefreshTransport>,
) -> Arc<TokenManager> {
    let store = Arc::new(MemoryTokenStore::new(raw));
    Arc::new(TokenManager::new(store, transport, crate::config::REFRESH_THRESHOLD))
}

// =============================================================
// Decoding
// =============================================================

#[test]
fn decode_reads_timing_claims() {
    let token = SessionToken::decode(&encode_token(1000, 1400)).expect("decode");
    assert_eq!(token.issued_at, 1000);
    assert_eq!(token.expires_at, 1400);
    assert_eq!(token.lifetime(), 400);
}

#[test]
fn decode_rejects_token_without_payload_segment() {
    let err = SessionToken::decode("just-one-segment").expect_err("should fail");
    assert!(matches!(err, ClientError::MalformedToken(_)));
}

#[test]
fn decode_rejects_non_base64_payload() {
    let err = SessionToken::decode("e30.!!!.sig").expect_err("should fail");
    assert!(matches!(err, ClientError::MalformedToken(_)));
}

#[test]
fn decode_rejects_payload_without_claims() {
    let payload = URL_SAFE_NO_PAD.encode("{\"sub\":\"u1\"}");
    let err = SessionToken::decode(&format!("e30.{payload}.sig")).expect_err("should fail");
    assert!(matches!(err, ClientError::MalformedToken(_)));
}

// =============================================================
// Staleness threshold
// =============================================================

#[test]
fn near_expiry_boundary_is_inclusive_at_three_quarters_of_lifetime() {
    // iat=1000, exp=1400: lifetime 400, threshold instant 1300.
    let token = SessionToken::decode(&encode_token(1000, 1400)).expect("decode");
    assert_eq!(token.refresh_at(0.75), 1300);
    assert!(!token.is_expired_or_near_expiry(1299, 0.75));
    assert!(token.is_expired_or_near_expiry(1300, 0.75));
    assert!(token.is_expired_or_near_expiry(1301, 0.75));
}

#[test]
fn fully_expired_token_is_stale() {
    let token = SessionToken::decode(&encode_token(0, 100)).expect("decode");
    assert!(token.is_expired_or_near_expiry(5000, 0.75));
}

// =============================================================
// Refresh coalescing
// =============================================================

#[tokio::test]
async fn concurrent_refreshes_share_one_network_call() {
    let transport = Arc::new(CountingTransport::new(Duration::from_millis(20)));
    let manager = manager_with(Some(stale_raw()), transport.clone());

    let (a, b, c) = tokio::join!(manager.refresh(), manager.refresh(), manager.refresh());
    let a = a.expect("refresh a");
    let b = b.expect("refresh b");
    let c = c.expect("refresh c");

    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.raw, b.raw);
    assert_eq!(b.raw, c.raw);
}

#[tokio::test]
async fn sequential_refreshes_each_hit_the_network() {
    let transport = Arc::new(CountingTransport::new(Duration::ZERO));
    let manager = manager_with(Some(stale_raw()), transport.clone());

    manager.refresh().await.expect("first refresh");
    manager.refresh().await.expect("second refresh");

    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_refresh_propagates_shared_cause_to_all_callers() {
    let manager = manager_with(Some(stale_raw()), Arc::new(FailingTransport));

    let (a, b) = tokio::join!(manager.refresh(), manager.refresh());
    assert!(matches!(a.expect_err("should fail"), ClientError::RefreshFailed(_)));
    assert!(matches!(b.expect_err("should fail"), ClientError::RefreshFailed(_)));
}

// =============================================================
// ensure_fresh
// =============================================================

#[tokio::test]
async fn ensure_fresh_returns_current_token_without_network_call() {
    let transport = Arc::new(CountingTransport::new(Duration::ZERO));
    let raw = fresh_raw();
    let manager = manager_with(Some(raw.clone()), transport.clone());

    let token = manager.ensure_fresh().await.expect("ensure fresh");
    assert_eq!(token.raw, raw);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ensure_fresh_refreshes_stale_token() {
    let transport = Arc::new(CountingTransport::new(Duration::ZERO));
    let stale = stale_raw();
    let manager = manager_with(Some(stale.clone()), transport.clone());

    let token = manager.ensure_fresh().await.expect("ensure fresh");
    assert_ne!(token.raw, stale);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn ensure_fresh_treats_malformed_token_as_stale() {
    let transport = Arc::new(CountingTransport::new(Duration::ZERO));
    let manager = manager_with(Some("not-a-token".to_owned()), transport.clone());

    manager.ensure_fresh().await.expect("ensure fresh");
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn ensure_fresh_without_token_is_an_error() {
    let manager = manager_with(None, Arc::new(CountingTransport::new(Duration::ZERO)));
    let err = manager.ensure_fresh().await.expect_err("should fail");
    assert!(matches!(err, ClientError::NoToken));
}

// =============================================================
// Replacement broadcast and lifecycle
// =============================================================

#[tokio::test]
async fn refresh_broadcasts_replacement_to_subscribers() {
    let manager = manager_with(
        Some(stale_raw()),
        Arc::new(CountingTransport::new(Duration::ZERO)),
    );
    let mut replacements = manager.subscribe();

    let token = manager.refresh().await.expect("refresh");
    let announced = replacements.recv().await.expect("broadcast");
    assert_eq!(announced, token);
}

#[tokio::test]
async fn set_token_then_clear_round_trips_storage() {
    let manager = manager_with(None, Arc::new(CountingTransport::new(Duration::ZERO)));
    let raw = fresh_raw();

    manager.set_token(&raw).expect("set token");
    assert_eq!(manager.current().expect("current").raw, raw);

    manager.clear();
    assert!(manager.current().is_none());
}

#[tokio::test]
async fn schedule_refreshes_already_stale_token_immediately() {
    let transport = Arc::new(CountingTransport::new(Duration::ZERO));
    let manager = manager_with(Some(stale_raw()), transport.clone());
    let mut replacements = manager.subscribe();

    manager.spawn_refresh_schedule();
    replacements.recv().await.expect("scheduled refresh");
    manager.cancel_refresh_schedule();

    assert!(transport.calls.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn notify_visible_refreshes_only_when_stale() {
    let transport = Arc::new(CountingTransport::new(Duration::ZERO));
    let manager = manager_with(Some(fresh_raw()), transport.clone());
    manager.notify_visible().await;
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);

    let transport = Arc::new(CountingTransport::new(Duration::ZERO));
    let manager = manager_with(Some(stale_raw()), transport.clone());
    manager.notify_visible().await;
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
}
