//! Integration tests for the identity registry.

use identity_ledger::{
    AccountId, AccountPatch, AccountStatus, ActivityInput, ActivityKind, ApiKeyId, AuditKind,
    AuditSubject, IdentityId, IdentityPatch, IdentityState, KycFieldKind, KycToggle, NewAccount,
    NewIdentity, NewRole, Registry, RegistryConfig, RegistryEvent, RetiredState, RoleId,
    SecuritySettings, Sequence, Severity, SubscriptionConfig, SubscriptionFilter,
    TransitionPolicy, SUPERSEDED_REASON,
};
use std::sync::Arc;
use std::thread;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn demo() -> Registry {
    init_tracing();
    Registry::with_demo_data(RegistryConfig::default()).unwrap()
}

fn notifications(events: Vec<RegistryEvent>) -> Vec<(String, String, Severity)> {
    events
        .into_iter()
        .filter_map(|e| match e {
            RegistryEvent::Notification { notification } => Some((
                notification.title,
                notification.description,
                notification.severity,
            )),
            _ => None,
        })
        .collect()
}

// --- Identity Workflows ---

#[test]
fn test_review_pending_application() {
    let registry = demo();
    let sub = registry
        .subscribe_filtered(SubscriptionFilter::notifications())
        .unwrap();
    sub.drain();

    let before = registry.identity_partition();
    assert_eq!(before.pending.len(), 1);
    assert_eq!(before.current.len(), 3);

    let id = IdentityId::from("identity2");
    let approved = registry
        .update_identity_state(&id, IdentityState::Approved)
        .unwrap();
    assert_eq!(approved.state, IdentityState::Approved);
    assert_eq!(approved.first_name, "Emily");

    let after = registry.identity_partition();
    assert!(after.pending.is_empty());
    assert_eq!(after.current.len(), 4);

    // The account list reads the new state straight away
    let summary = registry.account_summary(&AccountId::from("2")).unwrap();
    assert_eq!(summary.identity_status, Some(IdentityState::Approved));

    let toasts = notifications(sub.drain());
    assert_eq!(
        toasts,
        vec![(
            "Identity state updated".to_string(),
            "Emily Johnson's identity is now approved".to_string(),
            Severity::Default
        )]
    );
}

#[test]
fn test_state_change_is_audited() {
    let registry = demo();
    let id = IdentityId::from("identity1");

    registry
        .update_identity_state(&id, IdentityState::Compromised)
        .unwrap();

    let events = registry.audit_events_for(&AuditSubject::Identity(id));
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].kind,
        AuditKind::IdentityStateChanged {
            account_id: AccountId::from("1"),
            from: IdentityState::Approved,
            to: IdentityState::Compromised,
        }
    );
    registry.verify_audit().unwrap();

    let history = registry.identity_history(&AccountId::from("1"));
    assert_eq!(history.len(), 1);
    assert!(registry.identity_history(&AccountId::from("2")).is_empty());
}

#[test]
fn test_resubmission_supersedes_current_identity() {
    let registry = demo();
    let account = AccountId::from("4");
    assert_eq!(registry.superseded_identities(&account).len(), 0);

    let created = registry
        .create_identity(
            NewIdentity::new("4", "Lisa", "Wang", "ID456789999")
                .with_email("lisa.wang@example.com"),
        )
        .unwrap();
    assert_eq!(created.state, IdentityState::Pending);
    assert_ne!(created.id, IdentityId::from("identity4"));

    let current = registry.identity_for_account(&account).unwrap();
    assert_eq!(current.id, created.id);
    assert!(registry.identity(&IdentityId::from("identity4")).is_err());

    let superseded = registry.superseded_identities(&account);
    assert_eq!(superseded.len(), 1);
    assert_eq!(superseded[0].id, IdentityId::from("identity4"));
    // Rejected identities keep their verdict when archived
    assert_eq!(superseded[0].state, RetiredState::Rejected);
    assert_eq!(superseded[0].reason, SUPERSEDED_REASON);

    let history = registry.identity_history(&account);
    assert_eq!(history.len(), 2);
    assert!(matches!(
        history[0].kind,
        AuditKind::IdentitySuperseded {
            retired_as: IdentityState::Rejected,
            ..
        }
    ));
    assert!(matches!(history[1].kind, AuditKind::IdentityCreated { .. }));
}

#[test]
fn test_first_identity_for_account() {
    let registry = demo();
    let account = AccountId::from("3");
    assert!(!registry.account_summary(&account).unwrap().has_identity);

    let created = registry
        .create_identity(
            NewIdentity::new("3", "Michael", "Davis", "ID321321321")
                .with_email("m.davis@example.com")
                .with_field("dateOfBirth", "1988-02-14"),
        )
        .unwrap();
    assert_eq!(created.additional_fields["dateOfBirth"], "1988-02-14");

    let summary = registry.account_summary(&account).unwrap();
    assert!(summary.has_identity);
    assert_eq!(summary.identity_status, Some(IdentityState::Pending));
    assert!(registry.superseded_identities(&account).is_empty());
    assert_eq!(registry.stats().pending_applications, 2);
}

#[test]
fn test_update_identity_keeps_state() {
    let registry = demo();
    let id = IdentityId::from("identity5");

    let updated = registry
        .update_identity(
            &id,
            IdentityPatch {
                address: Some("12 Elm Street".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.address.as_deref(), Some("12 Elm Street"));
    assert_eq!(updated.state, IdentityState::Compromised);
    assert_eq!(registry.identity(&id).unwrap(), updated);
}

#[test]
fn test_search_identities() {
    let registry = demo();

    let hits = registry.search_identities("smith");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].full_name(), "John Smith");

    let by_number = registry.search_identities("ID4567");
    assert_eq!(by_number[0].id, IdentityId::from("identity4"));

    assert_eq!(registry.search_identities("").len(), 4);
    assert!(registry.search_identities("nobody").is_empty());
}

#[test]
fn test_lifecycle_policy_walk() {
    init_tracing();
    let registry = Registry::with_demo_data(RegistryConfig {
        policy: TransitionPolicy::Lifecycle,
        ..Default::default()
    })
    .unwrap();
    let id = IdentityId::from("identity4");

    // rejected -> pending -> approved -> obsoleted
    registry
        .update_identity_state(&id, IdentityState::Pending)
        .unwrap();
    registry
        .update_identity_state(&id, IdentityState::Approved)
        .unwrap();
    registry
        .update_identity_state(&id, IdentityState::Obsoleted)
        .unwrap();

    assert!(registry.transition_targets(&id).unwrap().is_empty());
    assert!(registry
        .update_identity_state(&id, IdentityState::Approved)
        .is_err());
    assert_eq!(registry.identity(&id).unwrap().state, IdentityState::Obsoleted);
}

// --- Account Workflows ---

#[test]
fn test_account_detail_view() {
    let registry = demo();
    let detail = registry.account_detail(&AccountId::from("5")).unwrap();

    assert_eq!(detail.summary.account.name, "Robert Chen");
    assert_eq!(
        detail.identity.as_ref().map(|i| i.state),
        Some(IdentityState::Compromised)
    );
    assert_eq!(detail.superseded.len(), 2);
    assert_eq!(detail.activities.all.len(), 3);
    assert_eq!(detail.activities.login.len(), 1);
    assert_eq!(detail.activities.contract.len(), 1);
    assert_eq!(detail.activities.identity.len(), 1);

    // Newest first
    let all = &detail.activities.all;
    assert!(all.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
}

#[test]
fn test_account_lifecycle() {
    let registry = demo();

    let account = registry
        .create_account(
            NewAccount::new("Ana Lopez", "ana@example.com").with_phone("+1 (555) 000-0000"),
        )
        .unwrap();
    assert_eq!(account.status, AccountStatus::Active);
    assert!(account.last_login.is_none());

    let login = registry
        .record_login(
            &account.id,
            ActivityInput::login("Logged in from Denver, CO").from_device("10.0.0.1", "Edge"),
        )
        .unwrap();
    assert_eq!(login.kind, ActivityKind::Login);
    let reloaded = registry.account(&account.id).unwrap();
    assert_eq!(reloaded.last_login, Some(login.timestamp));

    registry
        .record_activity(
            &account.id,
            ActivityInput::new(ActivityKind::Contract, "Signed lease #42").with_document("doc-42"),
        )
        .unwrap();

    let updated = registry
        .update_account(
            &account.id,
            AccountPatch {
                status: Some(AccountStatus::Inactive),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.status, AccountStatus::Inactive);

    let events = registry.audit_events_for(&AuditSubject::Account(account.id.clone()));
    let kinds: Vec<_> = events.iter().map(|e| &e.kind).collect();
    assert!(matches!(kinds[0], AuditKind::AccountCreated));
    assert!(matches!(kinds[1], AuditKind::LoginRecorded { .. }));
    assert!(matches!(kinds[2], AuditKind::ActivityRecorded { .. }));
    assert!(matches!(kinds[3], AuditKind::AccountUpdated));
    assert!(matches!(
        kinds[4],
        AuditKind::AccountStatusChanged {
            from: AccountStatus::Active,
            to: AccountStatus::Inactive
        }
    ));

    let activity = registry.account_activity(&account.id).unwrap();
    assert_eq!(activity.all.len(), 2);
    assert_eq!(activity.contract[0].document_id.as_deref(), Some("doc-42"));
}

#[test]
fn test_set_same_status_is_noop() {
    let registry = demo();
    let id = AccountId::from("1");

    registry.set_account_status(&id, AccountStatus::Active).unwrap();
    assert!(registry.audit_log().is_empty());

    registry.set_account_status(&id, AccountStatus::Inactive).unwrap();
    assert_eq!(registry.audit_log().len(), 1);
}

#[test]
fn test_delete_account_cascades() {
    let registry = demo();
    let id = AccountId::from("5");

    let removed = registry.delete_account(&id).unwrap();
    assert_eq!(removed.name, "Robert Chen");

    assert!(registry.account(&id).is_err());
    assert!(registry.identity_for_account(&id).is_none());
    assert!(registry.superseded_identities(&id).is_empty());
    assert!(registry.account_activity(&id).is_err());

    let stats = registry.stats();
    assert_eq!(stats.account_count, 6);
    assert_eq!(stats.identity_count, 3);
    assert_eq!(stats.superseded_count, 1);
    assert_eq!(stats.compromised_identities, 0);
    // API keys are not account-scoped
    assert_eq!(stats.api_key_count, 3);

    assert_eq!(
        registry
            .audit_events_for(&AuditSubject::Account(id))
            .len(),
        1
    );
}

#[test]
fn test_search_accounts_reports_identity_status() {
    let registry = demo();

    let hits = registry.search_accounts("example.com");
    assert_eq!(hits.len(), 7);

    let lisa = registry.search_accounts("lisa");
    assert_eq!(lisa.len(), 1);
    assert_eq!(lisa[0].identity_status, Some(IdentityState::Rejected));

    let no_identity = registry.search_accounts("davis");
    assert!(!no_identity[0].has_identity);
}

// --- Access ---

#[test]
fn test_api_key_lifecycle() {
    let registry = demo();

    let key = registry
        .create_api_key("  Billing export ", &RoleId::from("role_3"))
        .unwrap();
    assert_eq!(key.name, "Billing export");
    assert!(key.key.starts_with("sk_live_"));
    assert_eq!(key.key.len(), "sk_live_".len() + 26);
    assert!(key.last_used.is_none());

    let touched = registry.touch_api_key(&key.id).unwrap();
    assert!(touched.last_used.is_some());

    let rotated = registry.regenerate_api_key(&key.id).unwrap();
    assert_ne!(rotated.key, key.key);
    assert_ne!(rotated.fingerprint(), key.fingerprint());

    assert_eq!(registry.search_api_keys("billing").len(), 1);

    registry.delete_api_key(&key.id).unwrap();
    assert!(registry.api_key(&key.id).is_err());

    let kinds: Vec<_> = registry
        .audit_events_for(&AuditSubject::ApiKey(key.id))
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            AuditKind::ApiKeyCreated {
                role: RoleId::from("role_3")
            },
            AuditKind::ApiKeyUsed,
            AuditKind::ApiKeyRegenerated,
            AuditKind::ApiKeyRevoked,
        ]
    );
}

#[test]
fn test_custom_key_prefix() {
    init_tracing();
    let config = RegistryConfig::from_json(r#"{"api_key_prefix": "sk_test_"}"#).unwrap();
    let registry = Registry::with_demo_data(config).unwrap();

    let key = registry
        .create_api_key("Staging", &RoleId::from("role_2"))
        .unwrap();
    assert!(key.key.starts_with("sk_test_"));
    assert!(key.masked().starts_with("sk_tes..."));
}

#[test]
fn test_role_management() {
    let registry = demo();

    let role = registry
        .create_role(
            NewRole::new("Auditor")
                .with_description("Reads the audit trail")
                .with_permissions(["perm_1", "perm_1", "perm_2"]),
        )
        .unwrap();
    assert_eq!(role.id, RoleId::from("role_4"));
    assert_eq!(role.permissions.len(), 2);
    assert!(!role.is_system);

    assert_eq!(registry.role_options().len(), 4);
    assert_eq!(registry.default_role().unwrap().id, RoleId::from("role_3"));
    assert_eq!(registry.search_roles("audit").len(), 1);

    let deleted = registry.delete_role(&role.id).unwrap();
    assert_eq!(deleted.name, "Auditor");
    assert_eq!(registry.roles().len(), 3);
}

#[test]
fn test_delete_role_after_keys_revoked() {
    let registry = demo();
    let manager = RoleId::from("role_2");

    assert!(registry.delete_role(&manager).is_err());
    registry.delete_api_key(&ApiKeyId::from("key_3")).unwrap();
    registry.delete_role(&manager).unwrap();
    assert!(registry.role(&manager).is_err());
}

// --- Settings ---

#[test]
fn test_kyc_requirements_gate_new_identities() {
    let registry = demo();
    let input = NewIdentity::new("3", "Michael", "Davis", "ID321321321");

    // Email is required by default
    assert!(registry.create_identity(input.clone()).is_err());

    let email = registry
        .kyc_settings()
        .fields()
        .iter()
        .find(|f| f.name == "email")
        .map(|f| f.id.clone())
        .unwrap();
    registry
        .toggle_kyc_field(&email, KycToggle::Required)
        .unwrap();
    registry.create_identity(input).unwrap();

    // A custom required field is looked up in additional fields
    let field = registry
        .add_kyc_field("taxNumber", KycFieldKind::Text)
        .unwrap();
    assert_eq!(field.label, "Tax Number");
    assert!(field.required && field.enabled);

    let without = NewIdentity::new("6", "Sarah", "Miller", "ID111");
    assert!(registry.create_identity(without.clone()).is_err());
    registry
        .create_identity(without.with_field("taxNumber", "TX-9"))
        .unwrap();
}

#[test]
fn test_kyc_reorder_and_save() {
    let registry = demo();

    registry.move_kyc_field(6, 0).unwrap();
    let kyc = registry.kyc_settings();
    assert_eq!(kyc.fields()[0].name, "profilePicture");

    registry.save_kyc_settings(kyc.clone()).unwrap();
    assert_eq!(registry.kyc_settings(), kyc);

    let settings_events = registry.audit_events_for(&AuditSubject::Settings);
    assert_eq!(settings_events.len(), 2);
}

#[test]
fn test_console_settings() {
    let registry = demo();
    let sub = registry
        .subscribe_filtered(SubscriptionFilter::notifications())
        .unwrap();
    sub.drain();

    let apple = registry.toggle_auth_method("apple", true).unwrap();
    assert!(apple.enabled);
    assert_eq!(registry.stats().enabled_auth_methods, 4);

    let security = registry
        .update_security_settings(SecuritySettings {
            maximum_attempts: 3,
            ..registry.security_settings()
        })
        .unwrap();
    assert_eq!(registry.security_settings(), security);

    let toasts = notifications(sub.drain());
    assert_eq!(toasts[0].0, "Enabled apple authentication");
    assert_eq!(
        toasts[0].1,
        "The apple authentication method has been enabled."
    );
    assert_eq!(toasts[1].0, "Settings saved");
}

// --- Subscriptions ---

#[test]
fn test_subscriber_sees_changes_in_order() {
    let registry = demo();
    let sub = registry
        .subscribe_filtered(SubscriptionFilter::changes())
        .unwrap();
    assert!(matches!(sub.recv().unwrap(), RegistryEvent::CaughtUp));

    registry
        .update_identity_state(&IdentityId::from("identity2"), IdentityState::Rejected)
        .unwrap();
    registry
        .set_account_status(&AccountId::from("7"), AccountStatus::Active)
        .unwrap();

    let sequences: Vec<_> = sub
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            RegistryEvent::Changed { change } => Some(change.sequence),
            _ => None,
        })
        .collect();
    assert_eq!(sequences, vec![Sequence(1), Sequence(2)]);
}

#[test]
fn test_subscribe_replays_history() {
    let registry = demo();
    for state in [IdentityState::Approved, IdentityState::Obsoleted] {
        registry
            .update_identity_state(&IdentityId::from("identity2"), state)
            .unwrap();
    }

    let sub = registry
        .subscribe(SubscriptionConfig {
            from_sequence: Some(Sequence(1)),
            filter: SubscriptionFilter::changes(),
            ..Default::default()
        })
        .unwrap();

    let events = sub.drain();
    assert_eq!(events.len(), 2);
    match &events[0] {
        RegistryEvent::Changed { change } => assert_eq!(change.sequence, Sequence(2)),
        other => panic!("expected replayed change, got {other:?}"),
    }
    assert!(matches!(events[1], RegistryEvent::CaughtUp));
}

#[test]
fn test_subject_filter() {
    let registry = demo();
    let sub = registry
        .subscribe_filtered(SubscriptionFilter::subjects(vec!["api_key".into()]))
        .unwrap();
    sub.drain();

    registry
        .set_account_status(&AccountId::from("1"), AccountStatus::Inactive)
        .unwrap();
    registry.touch_api_key(&ApiKeyId::from("key_1")).unwrap();
    registry
        .regenerate_api_key(&ApiKeyId::from("key_1"))
        .unwrap();

    let changes: Vec<_> = sub
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            RegistryEvent::Changed { change } => Some(change.kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        changes,
        vec![AuditKind::ApiKeyUsed, AuditKind::ApiKeyRegenerated]
    );
}

// --- Concurrency ---

#[test]
fn test_concurrent_writers_keep_chain_intact() {
    let registry = Arc::new(demo());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..25 {
                    let account = registry
                        .create_account(NewAccount::new(
                            format!("Worker {t}-{i}"),
                            format!("w{t}-{i}@example.com"),
                        ))
                        .unwrap();
                    registry
                        .record_login(&account.id, ActivityInput::login("Logged in"))
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(registry.accounts().len(), 7 + 100);
    assert_eq!(registry.audit_log().len(), 200);
    registry.verify_audit().unwrap();
}
