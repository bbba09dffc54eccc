//! The registry: one store for accounts, identities and the console
//! configuration around them.

use crate::access::{
    generate_secret, ApiKey, ApiKeyRow, NewRole, Permission, Role, RoleOption, RolePatch,
};
use crate::audit::{AuditEvent, AuditKind, AuditLog, AuditSubject};
use crate::error::{LedgerError, Result};
use crate::records::{
    AccountPatch, AccountRecord, AccountStatus, ActivityInput, ActivityItem, ActivityKind,
    Collection, IdentityPatch, IdentityRecord, IdentityState, NewAccount, NewIdentity,
    SupersededIdentity,
};
use crate::seed::SeedData;
use crate::settings::{
    AuthMethod, ConsoleSettings, KycField, KycFieldKind, KycSettings, KycToggle, SecuritySettings,
};
use crate::state::{apply_transition, TransitionPolicy};
use crate::subscriptions::{
    Notification, NotificationBus, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId,
};
use crate::types::{
    AccountId, ActivityId, ApiKeyId, IdentityId, KycFieldId, PermissionId, RoleId, Timestamp,
};
use crate::views::{
    self, count_by_state, AccountDetail, AccountSummary, ActivityGroups, IdentityPartition,
    RegistryStats,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Reason recorded when a new identity replaces an account's current one.
pub const SUPERSEDED_REASON: &str = "Superseded by new identity";

/// Registry configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Which identity transitions are accepted.
    pub policy: TransitionPolicy,

    /// Prefix of generated API key secrets.
    pub api_key_prefix: String,

    /// Buffer size for subscriptions created through `subscribe_filtered`.
    pub notification_buffer: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            policy: TransitionPolicy::Permissive,
            api_key_prefix: "sk_live_".to_string(),
            notification_buffer: 256,
        }
    }
}

impl RegistryConfig {
    /// Parse a JSON config. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Default)]
struct Records {
    accounts: Collection<AccountRecord>,
    identities: Collection<IdentityRecord>,
    superseded: Collection<SupersededIdentity>,
    activities: Collection<ActivityItem>,
}

impl Records {
    fn account(&self, id: &AccountId) -> Result<&AccountRecord> {
        self.accounts
            .get(id)
            .ok_or_else(|| LedgerError::AccountNotFound(id.clone()))
    }

    fn identity(&self, id: &IdentityId) -> Result<&IdentityRecord> {
        self.identities
            .get(id)
            .ok_or_else(|| LedgerError::IdentityNotFound(id.clone()))
    }

    fn identity_for(&self, account: &AccountId) -> Option<&IdentityRecord> {
        self.identities.iter().find(|i| &i.account_id == account)
    }

    fn summary(&self, account: &AccountRecord) -> AccountSummary {
        AccountSummary::derive(account, self.identity_for(&account.id))
    }
}

#[derive(Default)]
struct Access {
    permissions: Collection<Permission>,
    roles: Collection<Role>,
    api_keys: Collection<ApiKey>,
}

impl Access {
    fn role(&self, id: &RoleId) -> Result<&Role> {
        self.roles
            .get(id)
            .ok_or_else(|| LedgerError::RoleNotFound(id.clone()))
    }

    fn api_key(&self, id: &ApiKeyId) -> Result<&ApiKey> {
        self.api_keys
            .get(id)
            .ok_or_else(|| LedgerError::ApiKeyNotFound(id.clone()))
    }

    /// Roles other than `keep` currently flagged default.
    fn other_defaults(&self, keep: &RoleId) -> Vec<RoleId> {
        self.roles
            .iter()
            .filter(|r| r.is_default && &r.id != keep)
            .map(|r| r.id.clone())
            .collect()
    }

    fn demote(&mut self, ids: &[RoleId]) {
        for id in ids {
            self.roles.update(id, |r| r.is_default = false);
        }
    }

    fn check_permissions(&self, permissions: &[PermissionId]) -> Result<()> {
        match permissions.iter().find(|p| !self.permissions.contains(p)) {
            Some(missing) => Err(LedgerError::PermissionNotFound(missing.clone())),
            None => Ok(()),
        }
    }
}

struct Settings {
    kyc: KycSettings,
    console: ConsoleSettings,
}

/// The identity registry.
///
/// Every view reads from the same collections, and every mutation goes
/// through a method here so it is audited and announced exactly once.
pub struct Registry {
    config: RegistryConfig,

    records: RwLock<Records>,
    access: RwLock<Access>,
    settings: RwLock<Settings>,

    audit: AuditLog,
    bus: NotificationBus,

    /// Per-prefix counters for generated ids.
    counters: Mutex<HashMap<&'static str, u64>>,

    /// Serialises mutations so audit order matches commit order.
    write_lock: Mutex<()>,
}

impl Registry {
    /// Empty registry with the stock permissions, roles and settings.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        Self::from_seed(config, SeedData::baseline())
    }

    /// Registry preloaded with the demo data set.
    pub fn with_demo_data(config: RegistryConfig) -> Result<Self> {
        Self::from_seed(config, SeedData::demo())
    }

    /// Build a registry from explicit data. Ids must be unique and every
    /// cross reference must resolve.
    pub fn from_seed(config: RegistryConfig, seed: SeedData) -> Result<Self> {
        let mut records = Records::default();
        for account in seed.accounts {
            records.accounts.insert(account)?;
        }
        for identity in seed.identities {
            records.account(&identity.account_id)?;
            if let Some(existing) = records.identity_for(&identity.account_id) {
                return Err(LedgerError::DuplicateId(format!(
                    "account {} already has identity {}",
                    identity.account_id, existing.id
                )));
            }
            records.identities.insert(identity)?;
        }
        for snapshot in seed.superseded {
            records.account(&snapshot.account_id)?;
            records.superseded.insert(snapshot)?;
        }
        for activity in seed.activities {
            records.account(&activity.account_id)?;
            records.activities.insert(activity)?;
        }

        let mut access = Access::default();
        for permission in seed.permissions {
            access.permissions.insert(permission)?;
        }
        for role in seed.roles {
            access.check_permissions(&role.permissions)?;
            access.roles.insert(role)?;
        }
        for key in seed.api_keys {
            access.role(&key.role)?;
            access.api_keys.insert(key)?;
        }

        info!(
            accounts = records.accounts.len(),
            identities = records.identities.len(),
            api_keys = access.api_keys.len(),
            "registry seeded"
        );

        Ok(Self::assemble(
            config,
            records,
            access,
            Settings {
                kyc: seed.kyc,
                console: ConsoleSettings::new(seed.auth_methods, seed.security)?,
            },
        ))
    }

    fn assemble(
        config: RegistryConfig,
        records: Records,
        access: Access,
        settings: Settings,
    ) -> Self {
        Self {
            config,
            records: RwLock::new(records),
            access: RwLock::new(access),
            settings: RwLock::new(settings),
            audit: AuditLog::new(),
            bus: NotificationBus::new(),
            counters: Mutex::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // --- Internal helpers ---

    /// Next `{prefix}{n}` id not rejected by `taken`.
    fn next_id(&self, prefix: &'static str, taken: impl Fn(&str) -> bool) -> String {
        let mut counters = self.counters.lock();
        let n = counters.entry(prefix).or_insert(0);
        loop {
            *n += 1;
            let id = format!("{prefix}{n}");
            if !taken(&id) {
                return id;
            }
        }
    }

    /// Fan committed events and an optional toast out to subscribers.
    fn publish(&self, events: &[AuditEvent], notification: Option<Notification>) {
        for event in events {
            self.bus.broadcast_change(event);
        }
        if let Some(notification) = notification {
            self.bus.notify(notification);
        }
    }

    /// Refuse with a destructive toast, the way the console reports a
    /// missing required input.
    fn refuse<T>(&self, title: &str, description: &str, field: &str) -> Result<T> {
        warn!(field, "{}", title);
        self.bus.notify(Notification::destructive(title, description));
        Err(LedgerError::MissingField(field.to_string()))
    }

    /// One `RoleUpdated` per role losing its default flag.
    fn audit_demotions(&self, demoted: &[RoleId]) -> Result<Vec<AuditEvent>> {
        demoted
            .iter()
            .map(|id| {
                debug!(role = %id, "default flag moved off role");
                self.audit
                    .append(AuditSubject::Role(id.clone()), AuditKind::RoleUpdated)
            })
            .collect()
    }

    // --- Identity Operations ---

    /// Move an identity to `target`, subject to the configured policy.
    pub fn update_identity_state(
        &self,
        id: &IdentityId,
        target: IdentityState,
    ) -> Result<IdentityRecord> {
        debug!(identity = %id, to = %target, "update_identity_state starting");
        let _lock = self.write_lock.lock();
        let mut records = self.records.write();

        let current = records.identity(id)?;
        let from = current.state;
        let updated = apply_transition(self.config.policy, current, target).inspect_err(|e| {
            warn!(identity = %id, error = %e, "transition refused");
        })?;

        let event = self.audit.append(
            AuditSubject::Identity(id.clone()),
            AuditKind::IdentityStateChanged {
                account_id: updated.account_id.clone(),
                from,
                to: target,
            },
        )?;
        records.identities.replace(updated.clone());
        drop(records);

        self.publish(
            &[event],
            Some(Notification::new(
                "Identity state updated",
                format!(
                    "{} {}'s identity is now {}",
                    updated.first_name, updated.last_name, target
                ),
            )),
        );
        info!(identity = %id, %from, to = %target, "identity state updated");
        Ok(updated)
    }

    /// States the identity can move to from where it is now.
    pub fn transition_targets(&self, id: &IdentityId) -> Result<Vec<IdentityState>> {
        let records = self.records.read();
        let state = records.identity(id)?.state;
        Ok(match self.config.policy {
            TransitionPolicy::Permissive => state.actions().collect(),
            policy => policy.targets(state),
        })
    }

    /// Submit a new identity for an account. It starts pending; any
    /// identity the account already had is retired.
    pub fn create_identity(&self, input: NewIdentity) -> Result<IdentityRecord> {
        debug!(account = %input.account_id, "create_identity starting");

        let required = [
            ("accountId", input.account_id.as_str()),
            ("firstName", input.first_name.as_str()),
            ("lastName", input.last_name.as_str()),
            ("identityNumber", input.identity_number.as_str()),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(LedgerError::MissingField(field.to_string()));
        }

        let _lock = self.write_lock.lock();
        self.settings.read().kyc.validate(&input)?;
        let mut records = self.records.write();
        let account_name = records.account(&input.account_id)?.name.clone();

        let id = IdentityId::new(self.next_id("identity", |candidate| {
            let candidate = IdentityId::from(candidate);
            records.identities.contains(&candidate) || records.superseded.contains(&candidate)
        }));
        let now = Timestamp::now();
        let record = input.into_record(id.clone(), now);

        let previous = records.identity_for(&record.account_id).cloned();
        if let Some(ref old) = previous {
            if records.superseded.contains(&old.id) {
                return Err(LedgerError::DuplicateId(old.id.to_string()));
            }
        }

        let mut events = Vec::with_capacity(2);
        let retired = match previous {
            Some(old) => {
                let snapshot = SupersededIdentity::retire(old, SUPERSEDED_REASON, now);
                events.push(self.audit.append(
                    AuditSubject::Identity(snapshot.id.clone()),
                    AuditKind::IdentitySuperseded {
                        account_id: snapshot.account_id.clone(),
                        replaced_by: id.clone(),
                        retired_as: snapshot.state.into(),
                    },
                )?);
                Some(snapshot)
            }
            None => None,
        };
        events.push(self.audit.append(
            AuditSubject::Identity(id.clone()),
            AuditKind::IdentityCreated {
                account_id: record.account_id.clone(),
            },
        )?);

        if let Some(snapshot) = retired {
            records.identities.remove(&snapshot.id);
            info!(identity = %snapshot.id, state = %snapshot.state, "identity superseded");
            records.superseded.insert(snapshot)?;
        }
        records.identities.insert(record.clone())?;
        drop(records);

        self.publish(
            &events,
            Some(Notification::new(
                "Identity Created",
                format!("A new identity has been created for {account_name}"),
            )),
        );
        info!(identity = %id, account = %record.account_id, "identity created");
        Ok(record)
    }

    /// Edit an identity's descriptive fields. State is untouched.
    pub fn update_identity(&self, id: &IdentityId, patch: IdentityPatch) -> Result<IdentityRecord> {
        debug!(identity = %id, "update_identity starting");
        let required = [
            ("firstName", &patch.first_name),
            ("lastName", &patch.last_name),
            ("identityNumber", &patch.identity_number),
        ];
        if let Some((field, _)) = required
            .iter()
            .find(|(_, v)| matches!(v, Some(v) if v.trim().is_empty()))
        {
            return Err(LedgerError::MissingField(field.to_string()));
        }

        let _lock = self.write_lock.lock();
        let mut records = self.records.write();

        let mut updated = records.identity(id)?.clone();
        patch.apply(&mut updated);
        let owner = records
            .accounts
            .get(&updated.account_id)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| updated.full_name());

        let event = self.audit.append(
            AuditSubject::Identity(id.clone()),
            AuditKind::IdentityUpdated {
                account_id: updated.account_id.clone(),
            },
        )?;
        records.identities.replace(updated.clone());
        drop(records);

        self.publish(
            &[event],
            Some(Notification::new(
                "Identity Updated",
                format!("{owner}'s identity has been updated"),
            )),
        );
        info!(identity = %id, "identity updated");
        Ok(updated)
    }

    pub fn identity(&self, id: &IdentityId) -> Result<IdentityRecord> {
        self.records.read().identity(id).cloned()
    }

    /// All current identities in insertion order.
    pub fn identities(&self) -> Vec<IdentityRecord> {
        self.records.read().identities.to_vec()
    }

    pub fn identity_for_account(&self, account: &AccountId) -> Option<IdentityRecord> {
        self.records.read().identity_for(account).cloned()
    }

    /// Retired identities of an account, oldest first.
    pub fn superseded_identities(&self, account: &AccountId) -> Vec<SupersededIdentity> {
        let mut snapshots: Vec<_> = self
            .records
            .read()
            .superseded
            .iter()
            .filter(|s| &s.account_id == account)
            .cloned()
            .collect();
        snapshots.sort_by_key(|s| s.created_at);
        snapshots
    }

    pub fn search_identities(&self, query: &str) -> Vec<IdentityRecord> {
        views::filter(self.records.read().identities.as_slice(), query)
    }

    /// Current vs. pending split of the live identities.
    pub fn identity_partition(&self) -> IdentityPartition {
        views::partition(self.records.read().identities.as_slice())
    }

    /// Audit events about any identity of `account`, oldest first.
    pub fn identity_history(&self, account: &AccountId) -> Vec<AuditEvent> {
        self.audit
            .events_where(|e| e.kind.identity_account() == Some(account))
    }

    // --- Account Operations ---

    pub fn create_account(&self, input: NewAccount) -> Result<AccountRecord> {
        debug!(name = %input.name, "create_account starting");
        let _lock = self.write_lock.lock();
        let mut records = self.records.write();

        let id = AccountId::new(self.next_id("", |candidate| {
            records.accounts.contains(&AccountId::from(candidate))
        }));
        let account = input.into_record(id.clone(), Timestamp::now())?;

        let event = self
            .audit
            .append(AuditSubject::Account(id.clone()), AuditKind::AccountCreated)?;
        records.accounts.insert(account.clone())?;
        drop(records);

        self.publish(
            &[event],
            Some(Notification::new(
                "Account created",
                format!("{}'s account has been created", account.name),
            )),
        );
        info!(account = %id, "account created");
        Ok(account)
    }

    pub fn update_account(&self, id: &AccountId, patch: AccountPatch) -> Result<AccountRecord> {
        debug!(account = %id, "update_account starting");
        patch.validate()?;

        let _lock = self.write_lock.lock();
        let mut records = self.records.write();

        let mut updated = records.account(id)?.clone();
        let from = updated.status;
        patch.apply(&mut updated);

        let subject = AuditSubject::Account(id.clone());
        let mut events = vec![self.audit.append(subject.clone(), AuditKind::AccountUpdated)?];
        if updated.status != from {
            events.push(self.audit.append(
                subject,
                AuditKind::AccountStatusChanged {
                    from,
                    to: updated.status,
                },
            )?);
        }
        records.accounts.replace(updated.clone());
        drop(records);

        self.publish(
            &events,
            Some(Notification::new(
                "Account Updated",
                format!("{}'s information has been updated", updated.name),
            )),
        );
        info!(account = %id, "account updated");
        Ok(updated)
    }

    /// Change an account's status. Setting the current status is a no-op.
    pub fn set_account_status(
        &self,
        id: &AccountId,
        status: AccountStatus,
    ) -> Result<AccountRecord> {
        debug!(account = %id, %status, "set_account_status starting");
        let _lock = self.write_lock.lock();
        let mut records = self.records.write();

        let mut updated = records.account(id)?.clone();
        let from = updated.status;
        if from == status {
            return Ok(updated);
        }
        updated.status = status;

        let event = self.audit.append(
            AuditSubject::Account(id.clone()),
            AuditKind::AccountStatusChanged { from, to: status },
        )?;
        records.accounts.replace(updated.clone());
        drop(records);

        self.publish(
            &[event],
            Some(Notification::new(
                "Account status updated",
                format!("{} is now {}", updated.name, status),
            )),
        );
        info!(account = %id, %from, to = %status, "account status changed");
        Ok(updated)
    }

    /// Record a login: the activity is stored and `last_login` advances.
    pub fn record_login(&self, id: &AccountId, input: ActivityInput) -> Result<ActivityItem> {
        self.record_activity(
            id,
            ActivityInput {
                kind: ActivityKind::Login,
                ..input
            },
        )
    }

    /// Append an entry to an account's history.
    pub fn record_activity(&self, id: &AccountId, input: ActivityInput) -> Result<ActivityItem> {
        debug!(account = %id, kind = %input.kind, "record_activity starting");
        let _lock = self.write_lock.lock();
        let mut records = self.records.write();
        records.account(id)?;

        let activity_id = ActivityId::new(self.next_id("act-", |candidate| {
            records.activities.contains(&ActivityId::from(candidate))
        }));
        let item = input.into_item(activity_id.clone(), id.clone());

        let kind = match item.kind {
            ActivityKind::Login => AuditKind::LoginRecorded {
                activity: activity_id.clone(),
            },
            _ => AuditKind::ActivityRecorded {
                activity: activity_id.clone(),
            },
        };
        let event = self.audit.append(AuditSubject::Account(id.clone()), kind)?;

        if item.kind == ActivityKind::Login {
            let at = item.timestamp;
            records.accounts.update(id, |account| {
                if account.last_login.map_or(true, |prev| prev < at) {
                    account.last_login = Some(at);
                }
            });
        }
        records.activities.insert(item.clone())?;
        drop(records);

        self.publish(&[event], None);
        info!(account = %id, activity = %activity_id, "activity recorded");
        Ok(item)
    }

    /// Remove an account with its identity, superseded snapshots and
    /// activities. API keys are not account-scoped and stay; audit events
    /// are retained.
    pub fn delete_account(&self, id: &AccountId) -> Result<AccountRecord> {
        debug!(account = %id, "delete_account starting");
        let _lock = self.write_lock.lock();
        let mut records = self.records.write();
        records.account(id)?;

        let event = self
            .audit
            .append(AuditSubject::Account(id.clone()), AuditKind::AccountDeleted)?;

        let identities = records.identities.remove_where(|i| &i.account_id == id);
        let superseded = records.superseded.remove_where(|s| &s.account_id == id);
        let activities = records.activities.remove_where(|a| &a.account_id == id);
        let account = records
            .accounts
            .remove(id)
            .ok_or_else(|| LedgerError::AccountNotFound(id.clone()))?;
        drop(records);

        self.publish(
            &[event],
            Some(Notification::new(
                "Account deleted",
                format!("{}'s account has been deleted", account.name),
            )),
        );
        info!(
            account = %id,
            identities = identities.len(),
            superseded = superseded.len(),
            activities = activities.len(),
            "account deleted"
        );
        Ok(account)
    }

    pub fn account(&self, id: &AccountId) -> Result<AccountRecord> {
        self.records.read().account(id).cloned()
    }

    pub fn accounts(&self) -> Vec<AccountRecord> {
        self.records.read().accounts.to_vec()
    }

    pub fn account_summary(&self, id: &AccountId) -> Result<AccountSummary> {
        let records = self.records.read();
        let account = records.account(id)?;
        Ok(records.summary(account))
    }

    /// Every account with its identity status, in insertion order.
    pub fn account_summaries(&self) -> Vec<AccountSummary> {
        let records = self.records.read();
        records.accounts.iter().map(|a| records.summary(a)).collect()
    }

    pub fn search_accounts(&self, query: &str) -> Vec<AccountSummary> {
        views::filter(&self.account_summaries(), query)
    }

    /// Account history grouped for display, newest first.
    pub fn account_activity(&self, id: &AccountId) -> Result<ActivityGroups> {
        let records = self.records.read();
        records.account(id)?;
        let items = records
            .activities
            .iter()
            .filter(|a| &a.account_id == id)
            .cloned()
            .collect();
        Ok(ActivityGroups::from_items(items))
    }

    pub fn account_detail(&self, id: &AccountId) -> Result<AccountDetail> {
        let activities = self.account_activity(id)?;
        let superseded = self.superseded_identities(id);

        let records = self.records.read();
        let account = records.account(id)?;
        Ok(AccountDetail {
            summary: records.summary(account),
            identity: records.identity_for(id).cloned(),
            superseded,
            activities,
        })
    }

    // --- Roles & Permissions ---

    pub fn permissions(&self) -> Vec<Permission> {
        self.access.read().permissions.to_vec()
    }

    /// Display name of a permission, or the id itself if unknown.
    pub fn permission_name(&self, id: &PermissionId) -> String {
        self.access
            .read()
            .permissions
            .get(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn roles(&self) -> Vec<Role> {
        self.access.read().roles.to_vec()
    }

    pub fn role(&self, id: &RoleId) -> Result<Role> {
        self.access.read().role(id).cloned()
    }

    pub fn role_options(&self) -> Vec<RoleOption> {
        self.access.read().roles.iter().map(RoleOption::from).collect()
    }

    /// Role preselected for new keys: the one flagged default, else the first.
    pub fn default_role(&self) -> Option<RoleOption> {
        let access = self.access.read();
        let option = access
            .roles
            .iter()
            .find(|r| r.is_default)
            .or_else(|| access.roles.iter().next())
            .map(RoleOption::from);
        option
    }

    pub fn search_roles(&self, query: &str) -> Vec<Role> {
        views::filter(self.access.read().roles.as_slice(), query)
    }

    pub fn create_role(&self, input: NewRole) -> Result<Role> {
        debug!(name = %input.name, "create_role starting");
        if input.name.trim().is_empty() {
            return self.refuse("Role name required", "Please enter a name for the role", "name");
        }

        let _lock = self.write_lock.lock();
        let mut access = self.access.write();
        access.check_permissions(&input.permissions)?;

        let id = RoleId::new(self.next_id("role_", |candidate| {
            access.roles.contains(&RoleId::from(candidate))
        }));
        let role = input.into_role(id.clone())?;

        let demoted = if role.is_default {
            access.other_defaults(&id)
        } else {
            Vec::new()
        };
        let mut events = vec![self
            .audit
            .append(AuditSubject::Role(id.clone()), AuditKind::RoleCreated)?];
        events.extend(self.audit_demotions(&demoted)?);
        access.roles.insert(role.clone())?;
        access.demote(&demoted);
        drop(access);

        self.publish(
            &events,
            Some(Notification::new(
                "Role created",
                format!("The role \"{}\" has been created", role.name),
            )),
        );
        info!(role = %id, "role created");
        Ok(role)
    }

    pub fn update_role(&self, id: &RoleId, patch: RolePatch) -> Result<Role> {
        debug!(role = %id, "update_role starting");
        if patch.validate().is_err() {
            return self.refuse("Role name required", "Please enter a name for the role", "name");
        }

        let _lock = self.write_lock.lock();
        let mut access = self.access.write();

        let current = access.role(id)?;
        if current.is_system {
            warn!(role = %id, "refusing to edit system role");
            return Err(LedgerError::SystemRole(id.clone()));
        }
        if let Some(ref permissions) = patch.permissions {
            access.check_permissions(permissions)?;
        }

        let mut updated = access.role(id)?.clone();
        patch.apply(&mut updated);

        let demoted = if updated.is_default {
            access.other_defaults(id)
        } else {
            Vec::new()
        };
        let mut events = vec![self
            .audit
            .append(AuditSubject::Role(id.clone()), AuditKind::RoleUpdated)?];
        events.extend(self.audit_demotions(&demoted)?);
        access.roles.replace(updated.clone());
        access.demote(&demoted);
        drop(access);

        self.publish(
            &events,
            Some(Notification::new(
                "Role updated",
                format!("The role \"{}\" has been updated", updated.name),
            )),
        );
        info!(role = %id, "role updated");
        Ok(updated)
    }

    /// Delete a role. System roles and roles still assigned to API keys
    /// are refused.
    pub fn delete_role(&self, id: &RoleId) -> Result<Role> {
        debug!(role = %id, "delete_role starting");
        let _lock = self.write_lock.lock();
        let mut access = self.access.write();

        if access.role(id)?.is_system {
            warn!(role = %id, "refusing to delete system role");
            return Err(LedgerError::SystemRole(id.clone()));
        }
        let keys = access.api_keys.iter().filter(|k| &k.role == id).count();
        if keys > 0 {
            warn!(role = %id, keys, "refusing to delete role in use");
            return Err(LedgerError::RoleInUse {
                role: id.clone(),
                keys,
            });
        }

        let event = self
            .audit
            .append(AuditSubject::Role(id.clone()), AuditKind::RoleDeleted)?;
        let role = access
            .roles
            .remove(id)
            .ok_or_else(|| LedgerError::RoleNotFound(id.clone()))?;
        drop(access);

        self.publish(
            &[event],
            Some(Notification::new(
                "Role deleted",
                format!("The role \"{}\" has been deleted", role.name),
            )),
        );
        info!(role = %id, "role deleted");
        Ok(role)
    }

    // --- API Keys ---

    pub fn api_keys(&self) -> Vec<ApiKey> {
        self.access.read().api_keys.to_vec()
    }

    pub fn api_key(&self, id: &ApiKeyId) -> Result<ApiKey> {
        self.access.read().api_key(id).cloned()
    }

    /// Keys whose name or role name contains `query`.
    pub fn search_api_keys(&self, query: &str) -> Vec<ApiKey> {
        let access = self.access.read();
        access
            .api_keys
            .iter()
            .filter(|key| {
                let role_name = access.roles.get(&key.role).map_or("", |r| r.name.as_str());
                views::matches(&ApiKeyRow { key, role_name }, query)
            })
            .cloned()
            .collect()
    }

    /// Issue a new key bound to `role`.
    pub fn create_api_key(&self, name: &str, role: &RoleId) -> Result<ApiKey> {
        debug!(name, role = %role, "create_api_key starting");
        let name = name.trim();
        if name.is_empty() {
            return self.refuse(
                "Key name required",
                "Please enter a name for the new API key",
                "name",
            );
        }

        let _lock = self.write_lock.lock();
        let mut access = self.access.write();
        access.role(role)?;

        let id = ApiKeyId::new(self.next_id("key_", |candidate| {
            access.api_keys.contains(&ApiKeyId::from(candidate))
        }));
        let key = ApiKey {
            id: id.clone(),
            name: name.to_string(),
            key: generate_secret(&self.config.api_key_prefix),
            role: role.clone(),
            created_at: Timestamp::now(),
            last_used: None,
        };

        let event = self.audit.append(
            AuditSubject::ApiKey(id.clone()),
            AuditKind::ApiKeyCreated { role: role.clone() },
        )?;
        access.api_keys.insert(key.clone())?;
        drop(access);

        self.publish(
            &[event],
            Some(Notification::new(
                "API key created",
                format!("The API key \"{name}\" has been created"),
            )),
        );
        info!(key = %id, fingerprint = %key.fingerprint(), "api key created");
        Ok(key)
    }

    /// Revoke a key.
    pub fn delete_api_key(&self, id: &ApiKeyId) -> Result<ApiKey> {
        debug!(key = %id, "delete_api_key starting");
        let _lock = self.write_lock.lock();
        let mut access = self.access.write();
        access.api_key(id)?;

        let event = self
            .audit
            .append(AuditSubject::ApiKey(id.clone()), AuditKind::ApiKeyRevoked)?;
        let key = access
            .api_keys
            .remove(id)
            .ok_or_else(|| LedgerError::ApiKeyNotFound(id.clone()))?;
        drop(access);

        self.publish(&[event], None);
        info!(key = %id, "api key revoked");
        Ok(key)
    }

    /// Replace a key's secret. The old secret stops being valid and
    /// `created_at` restarts.
    pub fn regenerate_api_key(&self, id: &ApiKeyId) -> Result<ApiKey> {
        debug!(key = %id, "regenerate_api_key starting");
        let _lock = self.write_lock.lock();
        let mut access = self.access.write();

        let mut updated = access.api_key(id)?.clone();
        updated.key = generate_secret(&self.config.api_key_prefix);
        updated.created_at = Timestamp::now();

        let event = self
            .audit
            .append(AuditSubject::ApiKey(id.clone()), AuditKind::ApiKeyRegenerated)?;
        access.api_keys.replace(updated.clone());
        drop(access);

        self.publish(
            &[event],
            Some(Notification::new(
                "API key regenerated",
                "The new API key has been created and the old one is now invalid",
            )),
        );
        info!(key = %id, fingerprint = %updated.fingerprint(), "api key regenerated");
        Ok(updated)
    }

    /// Mark a key as used now.
    pub fn touch_api_key(&self, id: &ApiKeyId) -> Result<ApiKey> {
        debug!(key = %id, "touch_api_key starting");
        let _lock = self.write_lock.lock();
        let mut access = self.access.write();

        let mut updated = access.api_key(id)?.clone();
        updated.last_used = Some(Timestamp::now());

        let event = self
            .audit
            .append(AuditSubject::ApiKey(id.clone()), AuditKind::ApiKeyUsed)?;
        access.api_keys.replace(updated.clone());
        drop(access);

        self.publish(&[event], None);
        debug!(key = %id, "api key used");
        Ok(updated)
    }

    // --- KYC Settings ---

    pub fn kyc_settings(&self) -> KycSettings {
        self.settings.read().kyc.clone()
    }

    /// Replace the KYC field list.
    pub fn save_kyc_settings(&self, kyc: KycSettings) -> Result<()> {
        debug!(fields = kyc.len(), "save_kyc_settings starting");
        let _lock = self.write_lock.lock();
        self.commit_kyc(kyc)
    }

    fn commit_kyc(&self, kyc: KycSettings) -> Result<()> {
        let fields = kyc.len();
        let event = self
            .audit
            .append(AuditSubject::Settings, AuditKind::KycSettingsUpdated { fields })?;
        self.settings.write().kyc = kyc;

        self.publish(
            &[event],
            Some(Notification::new(
                "KYC settings saved",
                "The identity verification requirements have been updated",
            )),
        );
        info!(fields, "kyc settings saved");
        Ok(())
    }

    /// Append a field to the live KYC settings.
    pub fn add_kyc_field(&self, name: &str, kind: KycFieldKind) -> Result<KycField> {
        if name.trim().is_empty() {
            return self.refuse(
                "Field name required",
                "Please enter a name for the new field",
                "name",
            );
        }

        let _lock = self.write_lock.lock();
        let mut kyc = self.settings.read().kyc.clone();
        let field = kyc.add_field(name, kind)?.clone();
        self.commit_kyc(kyc)?;
        Ok(field)
    }

    /// Flip a field's enabled or required flag.
    pub fn toggle_kyc_field(&self, id: &KycFieldId, which: KycToggle) -> Result<KycField> {
        let _lock = self.write_lock.lock();
        let mut kyc = self.settings.read().kyc.clone();
        let field = kyc.toggle(id, which)?.clone();
        self.commit_kyc(kyc)?;
        Ok(field)
    }

    /// Reorder the KYC fields.
    pub fn move_kyc_field(&self, from: usize, to: usize) -> Result<()> {
        let _lock = self.write_lock.lock();
        let mut kyc = self.settings.read().kyc.clone();
        kyc.move_field(from, to)?;
        self.commit_kyc(kyc)
    }

    // --- Console Settings ---

    pub fn auth_methods(&self) -> Vec<AuthMethod> {
        self.settings.read().console.auth_methods.to_vec()
    }

    pub fn toggle_auth_method(&self, id: &str, enabled: bool) -> Result<AuthMethod> {
        debug!(method = id, enabled, "toggle_auth_method starting");
        let _lock = self.write_lock.lock();
        let mut settings = self.settings.write();

        if !settings.console.auth_methods.contains(&id.to_string()) {
            return Err(LedgerError::AuthMethodNotFound(id.to_string()));
        }
        let event = self.audit.append(
            AuditSubject::Settings,
            AuditKind::AuthMethodToggled {
                method: id.to_string(),
                enabled,
            },
        )?;
        let method = settings.console.set_auth_method(id, enabled)?.clone();
        drop(settings);

        let (verb, past) = if enabled {
            ("Enabled", "enabled")
        } else {
            ("Disabled", "disabled")
        };
        self.publish(
            &[event],
            Some(Notification::new(
                format!("{verb} {id} authentication"),
                format!("The {id} authentication method has been {past}."),
            )),
        );
        info!(method = id, enabled, "auth method toggled");
        Ok(method)
    }

    pub fn security_settings(&self) -> SecuritySettings {
        self.settings.read().console.security.clone()
    }

    pub fn update_security_settings(&self, security: SecuritySettings) -> Result<SecuritySettings> {
        debug!("update_security_settings starting");
        security.validate()?;

        let _lock = self.write_lock.lock();
        let event = self
            .audit
            .append(AuditSubject::Settings, AuditKind::SecuritySettingsUpdated)?;
        self.settings.write().console.security = security.clone();

        self.publish(
            &[event],
            Some(Notification::new(
                "Settings saved",
                "Your security settings have been updated.",
            )),
        );
        info!("security settings updated");
        Ok(security)
    }

    // --- Dashboard ---

    pub fn stats(&self) -> RegistryStats {
        let records = self.records.read();
        let access = self.access.read();
        let settings = self.settings.read();

        let identities_by_state = count_by_state(records.identities.as_slice());
        RegistryStats {
            account_count: records.accounts.len(),
            identity_count: records.identities.len(),
            pending_applications: identities_by_state[&IdentityState::Pending],
            compromised_identities: identities_by_state[&IdentityState::Compromised],
            identities_by_state,
            superseded_count: records.superseded.len(),
            api_key_count: access.api_keys.len(),
            role_count: access.roles.len(),
            enabled_auth_methods: settings.console.enabled_count(),
            audit_events: self.audit.len() as u64,
        }
    }

    // --- Audit ---

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    pub fn audit_events_for(&self, subject: &AuditSubject) -> Vec<AuditEvent> {
        self.audit.events_for(subject)
    }

    /// Recompute the audit hash chain.
    pub fn verify_audit(&self) -> Result<()> {
        self.audit.verify()
    }

    // --- Subscriptions ---

    /// Subscribe to registry events. With `from_sequence` set, audit events
    /// after that sequence are replayed before the subscription goes live.
    pub fn subscribe(&self, config: SubscriptionConfig) -> Result<SubscriptionHandle> {
        let _lock = self.write_lock.lock();
        let from = config.from_sequence;
        let handle = self.bus.subscribe(config);

        if let Some(from) = from {
            for event in self.audit.events_where(|e| e.sequence > from) {
                if !self.bus.replay_to(handle.id, &event) {
                    self.bus.unsubscribe(handle.id);
                    return Err(LedgerError::SubscriptionDropped);
                }
            }
        }

        self.bus.mark_caught_up(handle.id)?;
        debug!(subscription = handle.id.0, "subscriber attached");
        Ok(handle)
    }

    /// Live-only subscription using the configured buffer size.
    pub fn subscribe_filtered(&self, filter: SubscriptionFilter) -> Result<SubscriptionHandle> {
        self.subscribe(SubscriptionConfig {
            buffer_size: self.config.notification_buffer,
            from_sequence: None,
            filter,
        })
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.bus.unsubscribe(id);
    }

    pub fn subscription_count(&self) -> usize {
        self.bus.subscription_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo() -> Registry {
        Registry::with_demo_data(RegistryConfig::default()).unwrap()
    }

    #[test]
    fn test_demo_loads() {
        let registry = demo();
        let stats = registry.stats();
        assert_eq!(stats.account_count, 7);
        assert_eq!(stats.identity_count, 4);
        assert_eq!(stats.pending_applications, 1);
        assert_eq!(stats.compromised_identities, 1);
        assert_eq!(stats.api_key_count, 3);
        assert_eq!(stats.audit_events, 0);
    }

    #[test]
    fn test_new_registry_is_empty_but_configured() {
        let registry = Registry::new(RegistryConfig::default()).unwrap();
        assert!(registry.accounts().is_empty());
        assert_eq!(registry.roles().len(), 3);
        assert_eq!(registry.kyc_settings().len(), 7);
    }

    #[test]
    fn test_config_from_json() {
        let config = RegistryConfig::from_json(r#"{"policy": "lifecycle"}"#).unwrap();
        assert_eq!(config.policy, TransitionPolicy::Lifecycle);
        assert_eq!(config.api_key_prefix, "sk_live_");

        assert!(matches!(
            RegistryConfig::from_json("{"),
            Err(LedgerError::Serialization(_))
        ));
    }

    #[test]
    fn test_from_seed_rejects_dangling_identity() {
        let mut seed = SeedData::demo();
        seed.identities[0].account_id = AccountId::from("missing");
        let result = Registry::from_seed(RegistryConfig::default(), seed);
        assert!(matches!(result, Err(LedgerError::AccountNotFound(_))));
    }

    #[test]
    fn test_from_seed_rejects_second_identity_for_account() {
        let mut seed = SeedData::demo();
        let mut twin = seed.identities[0].clone();
        twin.id = IdentityId::from("twin");
        seed.identities.push(twin);
        let result = Registry::from_seed(RegistryConfig::default(), seed);
        assert!(matches!(result, Err(LedgerError::DuplicateId(_))));
    }

    #[test]
    fn test_from_seed_rejects_duplicate_roles_and_auth_methods() {
        let mut seed = SeedData::baseline();
        let twin = seed.roles[0].clone();
        seed.roles.push(twin);
        let result = Registry::from_seed(RegistryConfig::default(), seed);
        assert!(matches!(result, Err(LedgerError::DuplicateId(_))));

        let mut seed = SeedData::baseline();
        let twin = seed.auth_methods[0].clone();
        seed.auth_methods.push(twin);
        let result = Registry::from_seed(RegistryConfig::default(), seed);
        assert!(matches!(result, Err(LedgerError::DuplicateId(_))));
    }

    #[test]
    fn test_new_default_role_replaces_old_one() {
        let registry = demo();
        let mut input = NewRole::new("Auditor").with_description("Reads the audit trail");
        input.is_default = true;
        let role = registry.create_role(input).unwrap();

        assert_eq!(registry.default_role().unwrap().id, role.id);
        let defaults: Vec<_> = registry
            .roles()
            .into_iter()
            .filter(|r| r.is_default)
            .map(|r| r.id)
            .collect();
        assert_eq!(defaults, vec![role.id.clone()]);
        assert_eq!(
            registry
                .audit_events_for(&AuditSubject::Role(RoleId::from("role_3")))
                .len(),
            1
        );
    }

    #[test]
    fn test_patching_default_flag_moves_it() {
        let registry = demo();
        let manager = RoleId::from("role_2");
        let patch = RolePatch {
            is_default: Some(true),
            ..Default::default()
        };
        registry.update_role(&manager, patch).unwrap();

        assert_eq!(registry.default_role().unwrap().id, manager);
        assert!(!registry.role(&RoleId::from("role_3")).unwrap().is_default);
        assert_eq!(registry.roles().iter().filter(|r| r.is_default).count(), 1);
    }

    #[test]
    fn test_search_api_keys_by_role_name() {
        let registry = demo();
        let admin: Vec<_> = registry
            .search_api_keys("admin")
            .into_iter()
            .map(|k| k.id)
            .collect();
        assert_eq!(admin, vec![ApiKeyId::from("key_1")]);

        assert_eq!(registry.search_api_keys("READER").len(), 1);
        assert!(registry.search_api_keys("role_").is_empty());
    }

    #[test]
    fn test_touch_api_key_is_audited() {
        let registry = demo();
        let id = ApiKeyId::from("key_3");
        let before = registry.audit_log().len();

        let key = registry.touch_api_key(&id).unwrap();
        assert!(key.last_used.is_some());
        assert_eq!(registry.audit_log().len(), before + 1);

        let events = registry.audit_events_for(&AuditSubject::ApiKey(id));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AuditKind::ApiKeyUsed);
        assert!(registry.verify_audit().is_ok());
    }

    #[test]
    fn test_kyc_check_sees_committed_settings() {
        let registry = std::sync::Arc::new(demo());
        let email = registry
            .kyc_settings()
            .fields()
            .iter()
            .find(|f| f.name == "email")
            .map(|f| f.id.clone())
            .unwrap();
        registry.toggle_kyc_field(&email, KycToggle::Required).unwrap();

        // Email becomes required again while identities without one are submitted
        let writer = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(5));
                registry.toggle_kyc_field(&email, KycToggle::Required).unwrap();
            })
        };
        let mut created = 0;
        let mut attempt = 0;
        loop {
            let done = writer.is_finished();
            attempt += 1;
            let input = NewIdentity::new("3", "Michael", "Davis", format!("ID{attempt}"));
            if registry.create_identity(input).is_ok() {
                created += 1;
            }
            if done {
                break;
            }
        }
        writer.join().unwrap();

        let events = registry.audit_log().events();
        let required_again = events
            .iter()
            .rposition(|e| matches!(e.kind, AuditKind::KycSettingsUpdated { .. }))
            .unwrap();
        let created_events: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e.kind, AuditKind::IdentityCreated { .. }))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(created_events.len(), created);
        assert!(created_events.iter().all(|&i| i < required_again));
    }

    #[test]
    fn test_generated_ids_skip_seeded_ones() {
        let registry = demo();
        let account = registry
            .create_account(NewAccount::new("New Person", "new@example.com"))
            .unwrap();
        assert_eq!(account.id.as_str(), "8");

        let key = registry
            .create_api_key("CI", &RoleId::from("role_3"))
            .unwrap();
        assert_eq!(key.id.as_str(), "key_4");
    }

    #[test]
    fn test_transition_targets_follow_policy() {
        let permissive = demo();
        let id = IdentityId::from("identity2");
        assert_eq!(
            permissive.transition_targets(&id).unwrap(),
            vec![
                IdentityState::Approved,
                IdentityState::Rejected,
                IdentityState::Obsoleted,
                IdentityState::Compromised
            ]
        );

        let strict = Registry::with_demo_data(RegistryConfig {
            policy: TransitionPolicy::Lifecycle,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            strict.transition_targets(&id).unwrap(),
            vec![IdentityState::Approved, IdentityState::Rejected]
        );
    }
}
