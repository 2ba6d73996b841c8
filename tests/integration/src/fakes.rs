//! In-memory relay and directory fakes
//!
//! The fakes hold their state behind a mutex and reuse the relay's real
//! validation functions, so the gateway pipeline under test exercises the
//! same policy code the production relay runs. The clock is a settable
//! integer so window tests do not sleep.

use async_trait::async_trait;
use chrono::Utc;
use ripple_client::{DirectoryApi, RelayApi};
use ripple_common::{AppError, AppResult};
use ripple_proto::rpc::{
    AccessDecision, EventsResponse, MemberInfo, QueryEventsParams, Role, StoreEventResponse,
    StoredEventData, ValidationOutcome,
};
use ripple_proto::Event;
use ripple_relay::{check_edit, check_revoke, StoredEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct RelayInner {
    counters: HashMap<String, i64>,
    events: Vec<StoredEvent>,
    receipts: HashMap<(String, String), i64>,
}

/// In-memory stand-in for the relay service
pub struct InMemoryRelay {
    inner: Mutex<RelayInner>,
    clock: AtomicI64,
    fail_store: AtomicBool,
}

impl Default for InMemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRelay {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RelayInner::default()),
            clock: AtomicI64::new(0),
            fail_store: AtomicBool::new(false),
        }
    }

    /// Move the fake wall clock (seconds)
    pub fn set_now(&self, now: i64) {
        self.clock.store(now, Ordering::SeqCst);
    }

    /// Make every subsequent store fail, simulating a persistence outage
    pub fn fail_next_stores(&self, fail: bool) {
        self.fail_store.store(fail, Ordering::SeqCst);
    }

    /// Number of persisted events
    pub fn event_count(&self) -> usize {
        self.inner.lock().unwrap().events.len()
    }

    /// Stored receipt for `(cid, uid)`
    pub fn receipt(&self, cid: &str, uid: &str) -> Option<i64> {
        self.inner
            .lock()
            .unwrap()
            .receipts
            .get(&(cid.to_string(), uid.to_string()))
            .copied()
    }

    fn now(&self) -> i64 {
        self.clock.load(Ordering::SeqCst)
    }

    fn store(&self, event: &Event) -> AppResult<StoreEventResponse> {
        if self.fail_store.load(Ordering::SeqCst) {
            return Err(AppError::Database("store unavailable".to_string()));
        }

        let timestamp = self.now();
        let mut inner = self.inner.lock().unwrap();

        let counter = inner.counters.entry(event.cid.to_string()).or_insert(0);
        *counter += 1;
        let mid = *counter;

        let tags = serde_json::to_string(&event.tags).expect("tags serialize");
        let data = serde_json::to_string(&event.body.to_data()).expect("data serialize");

        inner.events.push(StoredEvent {
            mid,
            cid: event.cid.to_string(),
            kind: event.kind_code(),
            sender: event.sender.clone(),
            tags,
            data,
            flags: event.flags as i32,
            sig: event.sig.clone(),
            timestamp,
            created_at: Utc::now(),
        });

        Ok(StoreEventResponse { mid, timestamp })
    }

    fn find(&self, mid: i64) -> Option<StoredEvent> {
        self.inner
            .lock()
            .unwrap()
            .events
            .iter()
            .find(|e| e.mid == mid)
            .cloned()
    }
}

#[async_trait]
impl RelayApi for InMemoryRelay {
    async fn store_event(&self, event: &Event) -> AppResult<StoreEventResponse> {
        self.store(event)
    }

    async fn get_event(&self, mid: i64) -> AppResult<StoredEventData> {
        self.find(mid)
            .map(Into::into)
            .ok_or(AppError::MessageNotFound(mid))
    }

    async fn query_events(&self, params: &QueryEventsParams) -> AppResult<EventsResponse> {
        let inner = self.inner.lock().unwrap();
        let limit = if params.limit == 0 { 50 } else { params.limit } as usize;

        let mut events: Vec<StoredEvent> = inner
            .events
            .iter()
            .filter(|e| e.cid == params.cid)
            .filter(|e| params.last_mid == 0 || e.mid > params.last_mid)
            .filter(|e| params.before == 0 || e.timestamp < params.before)
            .filter(|e| params.after == 0 || e.timestamp > params.after)
            .filter(|e| params.kinds.is_empty() || params.kinds.contains(&e.kind))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.mid);
        events.truncate(limit);

        Ok(EventsResponse {
            events: events.into_iter().map(Into::into).collect(),
        })
    }

    async fn sync_events(&self, cid: &str, limit: u32) -> AppResult<EventsResponse> {
        let inner = self.inner.lock().unwrap();
        let limit = if limit == 0 { 50 } else { limit } as usize;

        let mut events: Vec<StoredEvent> = inner
            .events
            .iter()
            .filter(|e| e.cid == cid)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.mid);
        if events.len() > limit {
            events.drain(..events.len() - limit);
        }

        Ok(EventsResponse {
            events: events.into_iter().map(Into::into).collect(),
        })
    }

    async fn update_read_receipt(
        &self,
        cid: &str,
        uid: &str,
        last_read_mid: i64,
    ) -> AppResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .receipts
            .entry((cid.to_string(), uid.to_string()))
            .or_insert(0);
        *entry = (*entry).max(last_read_mid);
        Ok(())
    }

    async fn validate_revoke(
        &self,
        cid: &str,
        uid: &str,
        target_mid: i64,
        is_admin: bool,
    ) -> AppResult<ValidationOutcome> {
        let target = self.find(target_mid);
        Ok(check_revoke(target.as_ref(), cid, uid, is_admin, self.now()))
    }

    async fn validate_edit(
        &self,
        cid: &str,
        uid: &str,
        target_mid: i64,
    ) -> AppResult<ValidationOutcome> {
        let target = self.find(target_mid);
        Ok(check_edit(target.as_ref(), cid, uid, self.now()))
    }
}

#[derive(Clone)]
struct Membership {
    role: Role,
    muted: bool,
}

/// In-memory stand-in for the directory service
#[derive(Default)]
pub struct InMemoryDirectory {
    members: Mutex<HashMap<(String, String), Membership>>,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member with the default role
    pub fn add_member(&self, cid: &str, uid: &str) {
        self.add_member_with_role(cid, uid, Role::Member);
    }

    pub fn add_member_with_role(&self, cid: &str, uid: &str, role: Role) {
        self.members.lock().unwrap().insert(
            (cid.to_string(), uid.to_string()),
            Membership { role, muted: false },
        );
    }

    /// Mute or unmute a member
    pub fn set_muted(&self, cid: &str, uid: &str, muted: bool) {
        if let Some(member) = self
            .members
            .lock()
            .unwrap()
            .get_mut(&(cid.to_string(), uid.to_string()))
        {
            member.muted = muted;
        }
    }
}

#[async_trait]
impl DirectoryApi for InMemoryDirectory {
    async fn check_access(&self, uid: &str, cid: &str) -> AppResult<AccessDecision> {
        let members = self.members.lock().unwrap();
        Ok(
            match members.get(&(cid.to_string(), uid.to_string())) {
                Some(member) => AccessDecision::granted(member.role, member.muted),
                None => AccessDecision::denied("not a member"),
            },
        )
    }

    async fn conversation_members(&self, cid: &str) -> AppResult<Vec<MemberInfo>> {
        let members = self.members.lock().unwrap();
        Ok(members
            .iter()
            .filter(|((c, _), _)| c == cid)
            .map(|((_, uid), member)| MemberInfo {
                uid: uid.clone(),
                role: member.role,
                muted: member.muted,
            })
            .collect())
    }
}
