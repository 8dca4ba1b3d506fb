use super::*;

#[test]
fn defaults_match_documented_constants() {
    let config = ClientConfig::default();
    assert_eq!(config.reconnect_delay, RECONNECT_DELAY);
    assert_eq!(config.max_reconnect_attempts, 5);
    assert!((config.refresh_threshold - 0.75).abs() < f64::EPSILON);
}

#[test]
fn ws_url_derives_plain_scheme() {
    let config = ClientConfig::new("http://localhost:3000");
    assert_eq!(config.ws_url().expect("ws url"), "ws://localhost:3000/ws");
}

#[test]
fn ws_url_derives_tls_scheme() {
    let config = ClientConfig::new("https://api.guestcode.io/");
    assert_eq!(config.ws_url().expect("ws url"), "wss://api.guestcode.io/ws");
}

#[test]
fn ws_url_rejects_unknown_scheme() {
    let config = ClientConfig::new("ftp://example.com");
    let err = config.ws_url().expect_err("scheme should be rejected");
    assert!(matches!(err, ClientError::InvalidBaseUrl(_)));
}

#[test]
fn builder_setters_override_defaults() {
    let config = ClientConfig::new("http://x")
        .with_reconnect_delay(Duration::from_millis(5))
        .with_max_reconnect_attempts(2)
        .with_refresh_threshold(0.5);
    assert_eq!(config.reconnect_delay, Duration::from_millis(5));
    assert_eq!(config.max_reconnect_attempts, 2);
    assert!((config.refresh_threshold - 0.5).abs() < f64::EPSILON);
}
