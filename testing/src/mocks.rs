use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use accrual_calculator_client::{AccrualResult, CalculateRequest, CalculatorApi, CalculatorError};
use accrual_domain::{Clock, Event, EventName, EventState, Meta};
use accrual_orders_client::{DenormalizedOrder, OrdersApi, OrdersClientError};
use accrual_store::{EventRepository, StoreError};
use chrono::{DateTime, Utc};

/// A clock that always returns the same instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// A fixed clock reading `time`.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// A fixed clock reading 2025-01-01T00:00:00Z, for tests that don't care
/// about the exact instant but want determinism.
///
/// # Panics
///
/// Never, in practice — the hardcoded timestamp is a valid RFC 3339 string.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc),
    )
}

/// `EventRepository` backed by an in-process `Vec`, preserving insertion
/// order so "oldest eligible row" queries behave like the real
/// `ORDER BY created_at ASC` does against a freshly-seeded table.
pub struct InMemoryEventRepository {
    events: Mutex<Vec<Event>>,
    next_uuid: AtomicU64,
}

impl InMemoryEventRepository {
    /// An empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            next_uuid: AtomicU64::new(1),
        }
    }

    /// Snapshot of every row currently stored, in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned (a prior panic while holding
    /// the lock), which should not happen in test code.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn fresh_uuid(&self) -> String {
        format!("test-uuid-{}", self.next_uuid.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for InMemoryEventRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EventRepository for InMemoryEventRepository {
    #[allow(clippy::unwrap_used)]
    async fn save_order_created(&self, event: &Event) -> Result<(), StoreError> {
        let mut events = self.events.lock().unwrap();
        if events.iter().any(|e| e.uuid == event.uuid) {
            return Ok(());
        }
        events.push(event.clone());
        Ok(())
    }

    #[allow(clippy::unwrap_used)]
    async fn reserve_order_created(&self) -> Result<Option<Event>, StoreError> {
        let mut events = self.events.lock().unwrap();
        let found = events
            .iter_mut()
            .find(|e| e.name == EventName::OrderCreated && e.state == EventState::New);
        match found {
            Some(event) => {
                event.state = EventState::Processing;
                Ok(Some(event.clone()))
            }
            None => Ok(None),
        }
    }

    #[allow(clippy::unwrap_used)]
    async fn set_failed(&self, event: &Event) -> Result<(), StoreError> {
        let mut events = self.events.lock().unwrap();
        if let Some(row) = events.iter_mut().find(|e| e.uuid == event.uuid) {
            row.state = EventState::Failed;
        }
        let uuid = self.fresh_uuid();
        events.push(Event::new(uuid, EventName::AccrualFailed, event.meta.clone(), Utc::now()));
        Ok(())
    }

    #[allow(clippy::unwrap_used)]
    async fn set_finished(&self, event: &Event) -> Result<(), StoreError> {
        let mut events = self.events.lock().unwrap();
        if let Some(row) = events.iter_mut().find(|e| e.uuid == event.uuid) {
            row.state = EventState::Finished;
        }
        let uuid = self.fresh_uuid();
        events.push(Event::new(uuid, EventName::AccrualStarted, event.meta.clone(), Utc::now()));
        Ok(())
    }

    #[allow(clippy::unwrap_used)]
    async fn create_accrual_event(&self, uuid: &str, name: EventName, meta: &Meta) -> Result<(), StoreError> {
        let mut events = self.events.lock().unwrap();
        if events.iter().any(|e| e.uuid == uuid) {
            return Ok(());
        }
        events.push(Event::new(uuid.to_string(), name, meta.clone(), Utc::now()));
        Ok(())
    }

    #[allow(clippy::unwrap_used)]
    async fn first_outbox_event(&self) -> Result<Option<Event>, StoreError> {
        let mut events = self.events.lock().unwrap();
        let found = events
            .iter_mut()
            .find(|e| EventName::OUTBOX_KINDS.contains(&e.name) && e.state == EventState::New);
        match found {
            Some(event) => {
                event.state = EventState::Processing;
                Ok(Some(event.clone()))
            }
            None => Ok(None),
        }
    }

    #[allow(clippy::unwrap_used)]
    async fn set_state(&self, uuid: &str, state: EventState) -> Result<(), StoreError> {
        let mut events = self.events.lock().unwrap();
        if let Some(row) = events.iter_mut().find(|e| e.uuid == uuid) {
            row.state = state;
        }
        Ok(())
    }
}

/// Scripted calculator: `calculate` always succeeds, `result` replays one
/// queued response per call (or errors with `CalculatorError::Malformed` if
/// the queue runs dry, which signals a test wired up too few responses).
pub struct FakeCalculatorClient {
    responses: Mutex<Vec<Result<AccrualResult, CalculatorError>>>,
    calculated: Mutex<Vec<CalculateRequest>>,
}

impl FakeCalculatorClient {
    /// A fake with no scripted `result()` responses queued yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            calculated: Mutex::new(Vec::new()),
        }
    }

    /// Queue the next response `result()` will return, FIFO.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::unwrap_used)]
    pub fn push_result(&self, response: Result<AccrualResult, CalculatorError>) {
        self.responses.lock().unwrap().push(response);
    }

    /// Every request `calculate()` was called with, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn calculated_requests(&self) -> Vec<CalculateRequest> {
        self.calculated.lock().unwrap().clone()
    }
}

impl Default for FakeCalculatorClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CalculatorApi for FakeCalculatorClient {
    #[allow(clippy::unwrap_used)]
    async fn calculate(&self, request: &CalculateRequest) -> Result<(), CalculatorError> {
        self.calculated.lock().unwrap().push(request.clone());
        Ok(())
    }

    #[allow(clippy::unwrap_used)]
    async fn result(&self, order_number: &str) -> Result<AccrualResult, CalculatorError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(CalculatorError::Malformed(format!(
                "no scripted response queued for order {order_number}"
            )));
        }
        responses.remove(0)
    }
}

/// Scripted orders client returning one fixed lookup result per order number.
pub struct FakeOrdersClient {
    orders: Mutex<Vec<(String, DenormalizedOrder)>>,
}

impl FakeOrdersClient {
    /// A fake with no orders registered yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            orders: Mutex::new(Vec::new()),
        }
    }

    /// Register the order `find()` should return for `order_number`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::unwrap_used)]
    pub fn register(&self, order_number: impl Into<String>, order: DenormalizedOrder) {
        self.orders.lock().unwrap().push((order_number.into(), order));
    }
}

impl Default for FakeOrdersClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl OrdersApi for FakeOrdersClient {
    #[allow(clippy::unwrap_used)]
    async fn find(&self, order_number: &str) -> Result<DenormalizedOrder, OrdersClientError> {
        let orders = self.orders.lock().unwrap();
        orders
            .iter()
            .find(|(number, _)| number == order_number)
            .map(|(_, order)| order.clone())
            .ok_or_else(|| OrdersClientError::NotFound(order_number.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fixed_clock_always_reads_the_same_instant() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[tokio::test]
    async fn reserve_order_created_skips_rows_already_processing() {
        let repo = InMemoryEventRepository::new();
        let meta = Meta::for_order("O1", "42");
        repo.save_order_created(&Event::new("E1", EventName::OrderCreated, meta, Utc::now()))
            .await
            .unwrap();

        let reserved = repo.reserve_order_created().await.unwrap();
        assert!(reserved.is_some());
        assert!(repo.reserve_order_created().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_finished_births_an_accrual_started_row() {
        let repo = InMemoryEventRepository::new();
        let meta = Meta::for_order("O1", "42");
        let event = Event::new("E1", EventName::OrderCreated, meta, Utc::now());
        repo.save_order_created(&event).await.unwrap();
        let reserved = repo.reserve_order_created().await.unwrap().unwrap();

        repo.set_finished(&reserved).await.unwrap();

        let snapshot = repo.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].state, EventState::Finished);
        assert_eq!(snapshot[1].name, EventName::AccrualStarted);
    }

    #[tokio::test]
    async fn fake_calculator_replays_queued_responses_in_order() {
        let calculator = FakeCalculatorClient::new();
        calculator.push_result(Ok(AccrualResult {
            order: "42".into(),
            accrual: 1.23,
            status: accrual_calculator_client::AccrualStatus::Processed,
        }));

        let result = calculator.result("42").await.unwrap();
        assert_eq!(result.order, "42");
        assert!(calculator.result("42").await.is_err());
    }

    proptest! {
        #[test]
        fn save_order_created_is_idempotent_on_repeated_uuid(
            uuid in "[a-zA-Z0-9-]{1,16}",
            order_number in "[0-9]{1,8}",
            repeats in 2usize..6,
        ) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let repo = InMemoryEventRepository::new();
                let meta = Meta::for_order("O1", order_number.clone());
                let event = Event::new(uuid.clone(), EventName::OrderCreated, meta, Utc::now());

                for _ in 0..repeats {
                    repo.save_order_created(&event).await.unwrap();
                }

                let snapshot = repo.snapshot();
                prop_assert_eq!(snapshot.len(), 1);
                prop_assert_eq!(&snapshot[0].uuid, &uuid);
                Ok(())
            })?;
        }
    }
}
