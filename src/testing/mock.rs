//! Fake collaborators for exercising the auth pipelines in isolation
//!
//! Time, message delivery and storage faults are all injectable so tests can
//! drive expiry, dispatch and outage paths deterministically.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration as StdDuration;

use crate::magic_link::{DeliveryMessage, DispatchError, MessageDispatcher};
use crate::models::{
    AuthToken, Candidate, CandidateId, ConsumeOutcome, NewAuthToken, NewCandidate, TokenId,
    TokenPurpose,
};
use crate::store::{CandidateStore, StoreError, TokenStore};
use crate::utils::clock::Clock;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *lock(&self.now) = at;
    }
}

impl Default for ManualClock {
    /// Starts at the current time, truncated to the millisecond precision the
    /// stores persist
    fn default() -> Self {
        Self::new(Utc::now().trunc_subsecs(3))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

/// Dispatcher that keeps every message it is handed
#[derive(Default)]
pub struct RecordingDispatcher {
    messages: Mutex<Vec<DeliveryMessage>>,
}

impl RecordingDispatcher {
    #[must_use]
    pub fn messages(&self) -> Vec<DeliveryMessage> {
        lock(&self.messages).clone()
    }

    /// Wait until at least `count` messages arrived. Dispatch runs on a
    /// spawned task, so tests poll instead of reading immediately. Gives up
    /// after two seconds and returns whatever was recorded.
    pub async fn wait_for(&self, count: usize) -> Vec<DeliveryMessage> {
        for _ in 0..200 {
            let messages = self.messages();
            if messages.len() >= count {
                return messages;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        self.messages()
    }
}

#[async_trait]
impl MessageDispatcher for RecordingDispatcher {
    fn channel(&self) -> &'static str {
        "recording"
    }

    async fn dispatch(&self, message: &DeliveryMessage) -> Result<(), DispatchError> {
        lock(&self.messages).push(message.clone());
        Ok(())
    }
}

/// Dispatcher whose gateway always refuses
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingDispatcher;

#[async_trait]
impl MessageDispatcher for FailingDispatcher {
    fn channel(&self) -> &'static str {
        "failing"
    }

    async fn dispatch(&self, _message: &DeliveryMessage) -> Result<(), DispatchError> {
        Err(DispatchError::Rejected(502))
    }
}

/// Dispatcher whose gateway accepts the request and never answers.
/// Tracks how many deliveries started and how many are still parked.
#[derive(Debug, Default)]
pub struct HangingDispatcher {
    started: AtomicUsize,
    in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl HangingDispatcher {
    #[must_use]
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Poll until `started` deliveries began and all of them were abandoned.
    /// Gives up after two seconds and returns the last in-flight count.
    pub async fn wait_until_abandoned(&self, started: usize) -> usize {
        for _ in 0..200 {
            if self.started() >= started && self.in_flight() == 0 {
                return 0;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        self.in_flight()
    }
}

#[async_trait]
impl MessageDispatcher for HangingDispatcher {
    fn channel(&self) -> &'static str {
        "hanging"
    }

    async fn dispatch(&self, _message: &DeliveryMessage) -> Result<(), DispatchError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Candidate store with no rows that refuses inserts
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyCandidateStore;

#[async_trait]
impl CandidateStore for EmptyCandidateStore {
    async fn find_candidate_by_id(&self, _id: CandidateId) -> Result<Option<Candidate>, StoreError> {
        Ok(None)
    }

    async fn find_candidate_by_phone(&self, _phone: &str) -> Result<Option<Candidate>, StoreError> {
        Ok(None)
    }

    async fn find_candidate_by_email(&self, _email: &str) -> Result<Option<Candidate>, StoreError> {
        Ok(None)
    }

    async fn insert_candidate(&self, _candidate: NewCandidate) -> Result<Candidate, StoreError> {
        Err(StoreError::Backend("read-only store".to_string()))
    }

    async fn set_candidate_active(
        &self,
        _id: CandidateId,
        _active: bool,
    ) -> Result<bool, StoreError> {
        Ok(false)
    }
}

/// Store that answers every call with a backend fault
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

fn unavailable<T>() -> Result<T, StoreError> {
    Err(StoreError::Backend("connection refused".to_string()))
}

#[async_trait]
impl CandidateStore for UnavailableStore {
    async fn find_candidate_by_id(&self, _id: CandidateId) -> Result<Option<Candidate>, StoreError> {
        unavailable()
    }

    async fn find_candidate_by_phone(&self, _phone: &str) -> Result<Option<Candidate>, StoreError> {
        unavailable()
    }

    async fn find_candidate_by_email(&self, _email: &str) -> Result<Option<Candidate>, StoreError> {
        unavailable()
    }

    async fn insert_candidate(&self, _candidate: NewCandidate) -> Result<Candidate, StoreError> {
        unavailable()
    }

    async fn set_candidate_active(
        &self,
        _id: CandidateId,
        _active: bool,
    ) -> Result<bool, StoreError> {
        unavailable()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        unavailable()
    }
}

#[async_trait]
impl TokenStore for UnavailableStore {
    async fn invalidate_unconsumed(
        &self,
        _candidate_id: CandidateId,
        _purpose: TokenPurpose,
    ) -> Result<u64, StoreError> {
        unavailable()
    }

    async fn insert_token(&self, _token: NewAuthToken) -> Result<TokenId, StoreError> {
        unavailable()
    }

    async fn find_token_by_value(&self, _value: &str) -> Result<Option<AuthToken>, StoreError> {
        unavailable()
    }

    async fn mark_consumed(
        &self,
        _id: TokenId,
        _consumed_at: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError> {
        unavailable()
    }
}

/// Store whose every call hangs for `delay` before reporting empty results,
/// for exercising request deadlines
#[derive(Debug, Clone, Copy)]
pub struct StalledStore {
    pub delay: StdDuration,
}

impl StalledStore {
    #[must_use]
    pub const fn new(delay: StdDuration) -> Self {
        Self { delay }
    }

    async fn stall(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

#[async_trait]
impl CandidateStore for StalledStore {
    async fn find_candidate_by_id(&self, _id: CandidateId) -> Result<Option<Candidate>, StoreError> {
        self.stall().await;
        Ok(None)
    }

    async fn find_candidate_by_phone(&self, _phone: &str) -> Result<Option<Candidate>, StoreError> {
        self.stall().await;
        Ok(None)
    }

    async fn find_candidate_by_email(&self, _email: &str) -> Result<Option<Candidate>, StoreError> {
        self.stall().await;
        Ok(None)
    }

    async fn insert_candidate(&self, _candidate: NewCandidate) -> Result<Candidate, StoreError> {
        self.stall().await;
        unavailable()
    }

    async fn set_candidate_active(
        &self,
        _id: CandidateId,
        _active: bool,
    ) -> Result<bool, StoreError> {
        self.stall().await;
        Ok(false)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.stall().await;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for StalledStore {
    async fn invalidate_unconsumed(
        &self,
        _candidate_id: CandidateId,
        _purpose: TokenPurpose,
    ) -> Result<u64, StoreError> {
        self.stall().await;
        Ok(0)
    }

    async fn insert_token(&self, _token: NewAuthToken) -> Result<TokenId, StoreError> {
        self.stall().await;
        unavailable()
    }

    async fn find_token_by_value(&self, _value: &str) -> Result<Option<AuthToken>, StoreError> {
        self.stall().await;
        Ok(None)
    }

    async fn mark_consumed(
        &self,
        _id: TokenId,
        _consumed_at: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError> {
        self.stall().await;
        Ok(ConsumeOutcome::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ContactIdentifier;

    #[test]
    fn test_manual_clock_moves_only_when_told() {
        let clock = ManualClock::default();
        let start = clock.now();
        assert_eq!(clock.now(), start);

        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), start + Duration::minutes(5));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[tokio::test]
    async fn test_recording_dispatcher_keeps_messages() {
        let dispatcher = RecordingDispatcher::default();
        let message = DeliveryMessage {
            destination: ContactIdentifier::phone("+15551234567").unwrap(),
            link: "http://localhost:5000/auth/verify/abc".to_string(),
            expires_at: Utc::now(),
        };
        dispatcher.dispatch(&message).await.unwrap();

        let recorded = dispatcher.wait_for(1).await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].link, message.link);
    }
}
