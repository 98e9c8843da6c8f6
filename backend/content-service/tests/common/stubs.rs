//! Hand-written collaborators for integration tests.
//!
//! Each stub keeps its state behind a std mutex so tests can change it while
//! services hold an `Arc` to the same instance.

use async_trait::async_trait;
use content_service::clients::{
    AttachmentChecker, ClientError, IdentityProvider, Notification, NotificationSink,
};
use content_service::models::{Realm, RealmMember};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// Identity provider backed by in-memory friend, block and realm tables.
#[derive(Default)]
pub struct StubIdentity {
    friends: Mutex<HashMap<Uuid, Vec<Uuid>>>,
    blocked: Mutex<HashMap<Uuid, Vec<Uuid>>>,
    realms: Mutex<HashMap<String, Realm>>,
    members: Mutex<HashMap<(Uuid, Uuid), i32>>,
    unavailable: AtomicBool,
}

impl StubIdentity {
    /// Makes `a` and `b` friends of each other.
    pub fn befriend(&self, a: Uuid, b: Uuid) {
        let mut friends = self.friends.lock().unwrap();
        friends.entry(a).or_default().push(b);
        friends.entry(b).or_default().push(a);
    }

    /// `account` blocks `target`.
    pub fn block(&self, account: Uuid, target: Uuid) {
        self.blocked
            .lock()
            .unwrap()
            .entry(account)
            .or_default()
            .push(target);
    }

    pub fn add_realm(&self, realm: Realm) {
        self.realms
            .lock()
            .unwrap()
            .insert(realm.alias.clone(), realm);
    }

    pub fn add_member(&self, realm_id: Uuid, account_id: Uuid, power_level: i32) {
        self.members
            .lock()
            .unwrap()
            .insert((realm_id, account_id), power_level);
    }

    /// Every call fails while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), ClientError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ClientError::Http("identity provider unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for StubIdentity {
    async fn list_friends(&self, account_id: Uuid) -> Result<Vec<Uuid>, ClientError> {
        self.check()?;
        Ok(self
            .friends
            .lock()
            .unwrap()
            .get(&account_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_blocked(&self, account_id: Uuid) -> Result<Vec<Uuid>, ClientError> {
        self.check()?;
        Ok(self
            .blocked
            .lock()
            .unwrap()
            .get(&account_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_realm(&self, alias: &str) -> Result<Option<Realm>, ClientError> {
        self.check()?;
        Ok(self.realms.lock().unwrap().get(alias).cloned())
    }

    async fn get_realm_membership(
        &self,
        realm_id: Uuid,
        account_id: Uuid,
    ) -> Result<Option<RealmMember>, ClientError> {
        self.check()?;
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(&(realm_id, account_id))
            .map(|power_level| RealmMember {
                realm_id,
                account_id,
                power_level: *power_level,
            }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub account_id: Uuid,
    pub notification: Notification,
}

/// Records every delivery; can be switched to fail.
#[derive(Default)]
pub struct RecordingSink {
    deliveries: Mutex<Vec<Delivery>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    fn record(&self, account_ids: &[Uuid], notification: &Notification) -> Result<(), ClientError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ClientError::Http("notifier unreachable".to_string()));
        }
        let mut deliveries = self.deliveries.lock().unwrap();
        for account_id in account_ids {
            deliveries.push(Delivery {
                account_id: *account_id,
                notification: notification.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(
        &self,
        account_id: Uuid,
        notification: &Notification,
    ) -> Result<(), ClientError> {
        self.record(&[account_id], notification)
    }

    async fn notify_batch(
        &self,
        account_ids: &[Uuid],
        notification: &Notification,
    ) -> Result<(), ClientError> {
        self.record(account_ids, notification)
    }
}

/// Knows a fixed set of attachment ids.
#[derive(Default)]
pub struct StubAttachments {
    known: Mutex<HashSet<String>>,
}

impl StubAttachments {
    pub fn add(&self, id: &str) {
        self.known.lock().unwrap().insert(id.to_string());
    }
}

#[async_trait]
impl AttachmentChecker for StubAttachments {
    async fn exists(&self, attachment_id: &str, _usage: &str) -> Result<bool, ClientError> {
        Ok(self.known.lock().unwrap().contains(attachment_id))
    }
}
