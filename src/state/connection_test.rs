use super::*;

fn peer(user_id: &str) -> OnlinePeer {
    OnlinePeer {
        user_id: user_id.to_owned(),
        user_data: serde_json::json!({ "status": "online" }),
    }
}

#[test]
fn defaults_are_disconnected_and_empty() {
    let state = ConnectionState::default();
    assert_eq!(state.status, ConnectionStatus::Disconnected);
    assert!(!state.reconnecting);
    assert_eq!(state.attempts, 0);
    assert!(state.last_error.is_none());
    assert!(state.online_users.is_empty());
}

#[test]
fn snapshot_replaces_presence_wholesale() {
    let mut state = ConnectionState::default();
    state.apply_join(peer("stale"));

    state.apply_snapshot(vec![peer("u1"), peer("u2")]);
    assert_eq!(state.online_users.len(), 2);
    assert!(state.is_online("u1"));
    assert!(state.is_online("u2"));
    assert!(!state.is_online("stale"));
}

#[test]
fn rejoining_user_does_not_duplicate_presence() {
    let mut state = ConnectionState::default();
    state.apply_snapshot(vec![peer("u1"), peer("u2")]);

    state.apply_join(peer("u1"));
    assert_eq!(state.online_users.len(), 2);
    assert!(state.is_online("u1"));
    assert!(state.is_online("u2"));
}

#[test]
fn join_refreshes_presence_metadata() {
    let mut state = ConnectionState::default();
    state.apply_join(peer("u1"));

    state.apply_join(OnlinePeer {
        user_id: "u1".to_owned(),
        user_data: serde_json::json!({ "status": "away" }),
    });
    assert_eq!(
        state.online_users.get("u1"),
        Some(&serde_json::json!({ "status": "away" }))
    );
}

#[test]
fn leave_removes_entry_and_ignores_unknown_ids() {
    let mut state = ConnectionState::default();
    state.apply_snapshot(vec![peer("u1")]);

    state.apply_leave("u1");
    assert!(!state.is_online("u1"));

    state.apply_leave("never-seen");
    assert!(state.online_users.is_empty());
}
