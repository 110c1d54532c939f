use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::client::ReviewService;
use crate::error::{LastError, Operation, Result, ReviewError};
use crate::models::{Review, ReviewId};

/// Proof that the user confirmed deleting a review
///
/// Only the mutation flow hands these out, after an explicit confirm step.
#[derive(Debug, PartialEq, Eq)]
pub struct ConfirmedDelete {
    id: ReviewId,
}

impl ConfirmedDelete {
    pub(crate) fn new(id: ReviewId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &ReviewId {
        &self.id
    }
}

/// Result of a refresh whose list() call succeeded or was overtaken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The response replaced the collection
    Applied { count: usize },
    /// A newer refresh was issued while this one was in flight; its response was dropped
    Superseded,
}

/// Point-in-time copy of the store for rendering
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub reviews: Vec<Review>,
    pub loading: bool,
    pub submitting: bool,
    pub deleting: HashSet<ReviewId>,
    pub last_error: Option<LastError>,
    /// Latest analyzed submission, shown apart from the collection
    pub recent: Option<Review>,
}

#[derive(Debug, Default)]
struct StoreState {
    reviews: Vec<Review>,
    loading: bool,
    submitting: bool,
    deleting: HashSet<ReviewId>,
    last_error: Option<LastError>,
    recent: Option<Review>,
    /// Sequence number of the latest issued refresh
    refresh_seq: u64,
    /// Committed deletes, stamped with `refresh_seq` at commit time
    tombstones: HashMap<ReviewId, u64>,
}

/// Authoritative local copy of the review collection and its operation state
///
/// All mutation goes through these methods. Remote failures are classified and
/// recorded as the last error; the collection only changes on success.
pub struct ReviewStore<S: ReviewService> {
    service: S,
    state: Mutex<StoreState>,
}

impl<S: ReviewService> ReviewStore<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Get the service for direct access
    pub fn service(&self) -> &S {
        &self.service
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state();
        StoreSnapshot {
            reviews: state.reviews.clone(),
            loading: state.loading,
            submitting: state.submitting,
            deleting: state.deleting.clone(),
            last_error: state.last_error.clone(),
            recent: state.recent.clone(),
        }
    }

    pub fn reviews(&self) -> Vec<Review> {
        self.state().reviews.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    pub fn is_submitting(&self) -> bool {
        self.state().submitting
    }

    pub fn is_deleting(&self, id: &ReviewId) -> bool {
        self.state().deleting.contains(id)
    }

    pub fn last_error(&self) -> Option<LastError> {
        self.state().last_error.clone()
    }

    pub fn recent(&self) -> Option<Review> {
        self.state().recent.clone()
    }

    /// Re-fetch the whole collection
    ///
    /// Only the latest issued refresh may apply its response. A failed refresh
    /// keeps the previous collection.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let seq = {
            let mut state = self.state();
            state.refresh_seq += 1;
            state.loading = true;
            state.last_error = None;
            state.refresh_seq
        };

        debug!(seq, "Refreshing reviews");
        let result = self.service.list().await;

        let mut state = self.state();
        if seq != state.refresh_seq {
            debug!(seq, latest = state.refresh_seq, "Discarding superseded refresh");
            return Ok(RefreshOutcome::Superseded);
        }
        state.loading = false;

        match result {
            Ok(incoming) => {
                state.tombstones.retain(|_, stamp| *stamp >= seq);
                let reviews = reconcile(incoming, &state.tombstones);
                let count = reviews.len();
                state.reviews = reviews;

                info!(seq, count, "Reviews refreshed");
                Ok(RefreshOutcome::Applied { count })
            }
            Err(err) => {
                warn!(seq, error = %err, "Refresh failed, keeping previous reviews");
                state.last_error = Some(LastError::new(Operation::Refresh, err.clone()));
                Err(err)
            }
        }
    }

    /// Submit review text for analysis, then reconcile the list with a refresh
    ///
    /// The analyzed review lands in the recent slot; it is never spliced into
    /// the collection locally.
    pub async fn submit_review(&self, text: &str) -> Result<Review> {
        if text.trim().is_empty() {
            return Err(ReviewError::EmptyInput);
        }

        {
            let mut state = self.state();
            if state.submitting {
                debug!("Submission already in flight");
                return Err(ReviewError::Busy);
            }
            state.submitting = true;
            state.last_error = None;
            state.recent = None;
        }

        let result = self.service.create(text).await;

        {
            let mut state = self.state();
            state.submitting = false;
            match &result {
                Ok(review) => state.recent = Some(review.clone()),
                Err(err) => {
                    warn!(error = %err, "Submission failed");
                    state.last_error = Some(LastError::new(Operation::Submit, err.clone()));
                }
            }
        }

        let review = result?;
        info!(id = %review.id, sentiment = ?review.sentiment, "Review submitted");

        // A failed follow-up refresh is recorded as the last error; the submission itself stood
        if let Err(err) = self.refresh().await {
            debug!(error = %err, "Refresh after submit failed");
        }

        Ok(review)
    }

    /// Delete a confirmed review
    ///
    /// The review leaves the collection only once the service confirms.
    pub async fn delete_review(&self, confirmed: ConfirmedDelete) -> Result<()> {
        let id = confirmed.id;

        {
            let mut state = self.state();
            if !state.deleting.insert(id.clone()) {
                debug!(id = %id, "Delete already in flight");
                return Err(ReviewError::Busy);
            }
            state.last_error = None;
        }

        let result = self.service.delete(&id).await;

        let mut state = self.state();
        state.deleting.remove(&id);

        match result {
            Ok(()) => {
                state.reviews.retain(|r| r.id != id);
                if state.recent.as_ref().is_some_and(|r| r.id == id) {
                    state.recent = None;
                }
                let stamp = state.refresh_seq;
                state.tombstones.insert(id.clone(), stamp);

                info!(id = %id, "Review removed");
                Ok(())
            }
            Err(err) => {
                warn!(id = %id, error = %err, "Delete failed");
                state.last_error = Some(LastError::new(Operation::Delete, err.clone()));
                Err(err)
            }
        }
    }
}

/// Drop ids deleted since the refresh was issued, and duplicate ids
fn reconcile(incoming: Vec<Review>, tombstones: &HashMap<ReviewId, u64>) -> Vec<Review> {
    let mut seen = HashSet::new();

    incoming
        .into_iter()
        .filter(|review| {
            if tombstones.contains_key(&review.id) {
                debug!(id = %review.id, "Skipping review deleted after refresh was issued");
                return false;
            }
            if !seen.insert(review.id.clone()) {
                warn!(id = %review.id, "Dropping duplicate review id");
                return false;
            }
            true
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{review, FakeService};

    fn confirmed(id: i64) -> ConfirmedDelete {
        ConfirmedDelete::new(ReviewId::Int(id))
    }

    fn ids(reviews: &[Review]) -> Vec<ReviewId> {
        reviews.iter().map(|r| r.id.clone()).collect()
    }

    fn int_ids(raw: &[i64]) -> Vec<ReviewId> {
        raw.iter().copied().map(ReviewId::Int).collect()
    }

    #[tokio::test]
    async fn test_refresh_empty() {
        let store = ReviewStore::new(FakeService::default());

        let outcome = store.refresh().await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Applied { count: 0 });
        let snapshot = store.snapshot();
        assert!(snapshot.reviews.is_empty());
        assert!(snapshot.last_error.is_none());
        assert!(!snapshot.loading);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_previous() {
        let service = FakeService::with_reviews(vec![review(2, "b"), review(1, "a")]);
        service.fail_next_list(ReviewError::Unreachable);
        let store = ReviewStore::new(service);

        // Failure on an empty store leaves it empty
        assert_eq!(store.refresh().await.unwrap_err(), ReviewError::Unreachable);
        assert!(store.reviews().is_empty());

        store.refresh().await.unwrap();
        store.service().fail_next_list(ReviewError::Unreachable);
        assert!(store.refresh().await.is_err());

        let snapshot = store.snapshot();
        assert_eq!(ids(&snapshot.reviews), int_ids(&[2, 1]));
        assert!(!snapshot.loading);
        assert_eq!(
            snapshot.last_error,
            Some(LastError::new(Operation::Refresh, ReviewError::Unreachable))
        );
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let store = ReviewStore::new(FakeService::with_reviews(vec![review(2, "b"), review(1, "a")]));

        store.refresh().await.unwrap();
        let first = store.reviews();
        store.refresh().await.unwrap();

        assert_eq!(store.reviews(), first);
    }

    #[tokio::test]
    async fn test_refresh_drops_duplicate_ids() {
        let store = ReviewStore::new(FakeService::with_reviews(vec![
            review(3, "c"),
            review(2, "b"),
            review(3, "c again"),
        ]));

        store.refresh().await.unwrap();

        let reviews = store.reviews();
        assert_eq!(ids(&reviews), int_ids(&[3, 2]));
        assert_eq!(reviews[0].text, "c");
    }

    #[tokio::test]
    async fn test_submit_empty_is_rejected_locally() {
        let store = ReviewStore::new(FakeService::default());

        assert_eq!(store.submit_review("").await.unwrap_err(), ReviewError::EmptyInput);
        assert_eq!(store.submit_review("  \n\t").await.unwrap_err(), ReviewError::EmptyInput);

        assert_eq!(store.service().calls(&store.service().create_calls), 0);
        assert!(!store.is_submitting());
    }

    #[tokio::test]
    async fn test_submit_sets_recent_and_refreshes() {
        let service = FakeService::with_reviews(vec![review(1, "old")]);
        service.set_next_id(42);
        let store = ReviewStore::new(service);
        store.refresh().await.unwrap();

        let created = store.submit_review("Great phone").await.unwrap();

        assert_eq!(created.id, ReviewId::Int(42));
        assert_eq!(store.recent(), Some(created));
        let reviews = store.reviews();
        assert_eq!(reviews.iter().filter(|r| r.id == ReviewId::Int(42)).count(), 1);
        assert_eq!(ids(&reviews), int_ids(&[42, 1]));
        assert!(!store.is_submitting());
        assert_eq!(store.service().calls(&store.service().list_calls), 2);
    }

    #[tokio::test]
    async fn test_submit_failure_records_error() {
        let service = FakeService::default();
        service.fail_next_create(ReviewError::Remote {
            message: "model unavailable".to_string(),
        });
        let store = ReviewStore::new(service);

        let err = store.submit_review("fine").await.unwrap_err();

        assert!(matches!(err, ReviewError::Remote { .. }));
        let snapshot = store.snapshot();
        assert!(snapshot.recent.is_none());
        assert!(!snapshot.submitting);
        assert_eq!(snapshot.last_error.unwrap().operation, Operation::Submit);
        assert_eq!(store.service().calls(&store.service().list_calls), 0);
    }

    #[tokio::test]
    async fn test_concurrent_submit_is_busy() {
        let service = FakeService::default();
        let release = service.hold_next_create();
        let store = ReviewStore::new(service);

        let (first, second) = tokio::join!(store.submit_review("first"), async {
            assert!(store.is_submitting());
            let second = store.submit_review("second").await;
            release.send(()).unwrap();
            second
        });

        assert!(first.is_ok());
        assert_eq!(second.unwrap_err(), ReviewError::Busy);
        assert_eq!(store.service().calls(&store.service().create_calls), 1);
    }

    #[tokio::test]
    async fn test_delete_success_removes_review_and_recent() {
        let service = FakeService::with_reviews(vec![review(1, "a")]);
        service.set_next_id(7);
        let store = ReviewStore::new(service);
        store.submit_review("to be removed").await.unwrap();
        assert_eq!(ids(&store.reviews()), int_ids(&[7, 1]));

        store.delete_review(confirmed(7)).await.unwrap();

        let snapshot = store.snapshot();
        assert_eq!(ids(&snapshot.reviews), int_ids(&[1]));
        assert!(snapshot.recent.is_none());
        assert!(snapshot.deleting.is_empty());
        assert!(snapshot.last_error.is_none());
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_review() {
        let store = ReviewStore::new(FakeService::with_reviews(vec![review(2, "b"), review(1, "a")]));
        store.refresh().await.unwrap();
        let before = store.reviews();
        store.service().fail_next_delete(ReviewError::Unreachable);

        let err = store.delete_review(confirmed(2)).await.unwrap_err();

        assert_eq!(err, ReviewError::Unreachable);
        assert_eq!(store.reviews(), before);
        assert!(!store.is_deleting(&ReviewId::Int(2)));
        assert_eq!(
            store.last_error(),
            Some(LastError::new(Operation::Delete, ReviewError::Unreachable))
        );
    }

    #[tokio::test]
    async fn test_pending_delete_keeps_review_until_confirmed() {
        let service = FakeService::with_reviews(vec![review(5, "e")]);
        let release = service.hold_next_delete();
        let store = ReviewStore::new(service);
        store.refresh().await.unwrap();

        let (result, ()) = tokio::join!(store.delete_review(confirmed(5)), async {
            assert!(store.is_deleting(&ReviewId::Int(5)));
            assert_eq!(ids(&store.reviews()), int_ids(&[5]));
            release.send(()).unwrap();
        });

        result.unwrap();
        assert!(store.reviews().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_delete_same_id_is_busy() {
        let service = FakeService::with_reviews(vec![review(7, "g")]);
        let release = service.hold_next_delete();
        let store = ReviewStore::new(service);
        store.refresh().await.unwrap();

        let (first, second) = tokio::join!(store.delete_review(confirmed(7)), async {
            let second = store.delete_review(confirmed(7)).await;
            release.send(()).unwrap();
            second
        });

        assert!(first.is_ok());
        assert_eq!(second.unwrap_err(), ReviewError::Busy);
        assert_eq!(store.service().calls(&store.service().delete_calls), 1);
    }

    #[tokio::test]
    async fn test_superseded_refresh_is_discarded() {
        let service = FakeService::with_reviews(vec![review(1, "stale")]);
        let release = service.hold_next_list();
        let store = ReviewStore::new(service);

        let (older, newer) = tokio::join!(store.refresh(), async {
            store
                .service()
                .set_reviews(vec![review(2, "fresh"), review(1, "stale")]);
            let newer = store.refresh().await;
            release.send(()).unwrap();
            newer
        });

        assert_eq!(older.unwrap(), RefreshOutcome::Superseded);
        assert_eq!(newer.unwrap(), RefreshOutcome::Applied { count: 2 });
        assert_eq!(ids(&store.reviews()), int_ids(&[2, 1]));
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_refresh_in_flight_does_not_resurrect_deleted() {
        let store = ReviewStore::new(FakeService::with_reviews(vec![review(8, "h"), review(7, "g")]));
        store.refresh().await.unwrap();
        let release = store.service().hold_next_list();

        let (refreshed, deleted) = tokio::join!(store.refresh(), async {
            let deleted = store.delete_review(confirmed(7)).await;
            release.send(()).unwrap();
            deleted
        });

        deleted.unwrap();
        assert_eq!(refreshed.unwrap(), RefreshOutcome::Applied { count: 1 });
        assert_eq!(ids(&store.reviews()), int_ids(&[8]));

        // A refresh issued after the delete is authoritative again
        store.refresh().await.unwrap();
        assert_eq!(ids(&store.reviews()), int_ids(&[8]));
    }

    #[tokio::test]
    async fn test_superseded_failure_is_not_recorded() {
        let service = FakeService::with_reviews(vec![review(1, "a")]);
        service.fail_next_list(ReviewError::Unreachable);
        let release = service.hold_next_list();
        let store = ReviewStore::new(service);

        let (older, newer) = tokio::join!(store.refresh(), async {
            let newer = store.refresh().await;
            release.send(()).unwrap();
            newer
        });

        assert_eq!(older.unwrap(), RefreshOutcome::Superseded);
        assert!(newer.is_ok());
        assert!(store.last_error().is_none());
    }
}
