//! Scripted in-memory service for store and flow tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::oneshot;

use super::ReviewService;
use crate::error::{Result, ReviewError};
use crate::models::{Review, ReviewId, Sentiment};

pub(crate) fn review(id: i64, text: &str) -> Review {
    Review {
        id: ReviewId::Int(id),
        text: text.to_string(),
        sentiment: Sentiment::Positive,
        sentiment_score: Some(0.9),
        key_points: None,
        created_at: None,
    }
}

/// Holds server-side reviews newest first and counts calls
#[derive(Default)]
pub(crate) struct FakeService {
    reviews: Mutex<Vec<Review>>,
    next_id: AtomicI64,
    list_failures: Mutex<VecDeque<ReviewError>>,
    create_failures: Mutex<VecDeque<ReviewError>>,
    delete_failures: Mutex<VecDeque<ReviewError>>,
    list_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    create_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    delete_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    pub list_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl FakeService {
    pub fn with_reviews(reviews: Vec<Review>) -> Self {
        let service = Self::default();
        service.next_id.store(1000, Ordering::SeqCst);
        *service.reviews.lock().unwrap() = reviews;
        service
    }

    pub fn set_reviews(&self, reviews: Vec<Review>) {
        *self.reviews.lock().unwrap() = reviews;
    }

    /// Next create() returns this id
    pub fn set_next_id(&self, id: i64) {
        self.next_id.store(id, Ordering::SeqCst);
    }

    pub fn fail_next_list(&self, err: ReviewError) {
        self.list_failures.lock().unwrap().push_back(err);
    }

    pub fn fail_next_create(&self, err: ReviewError) {
        self.create_failures.lock().unwrap().push_back(err);
    }

    pub fn fail_next_delete(&self, err: ReviewError) {
        self.delete_failures.lock().unwrap().push_back(err);
    }

    /// Next list() snapshots the reviews immediately but only returns once the sender fires
    pub fn hold_next_list(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.list_gates.lock().unwrap().push_back(rx);
        tx
    }

    /// Next create() waits for the sender before answering
    pub fn hold_next_create(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.create_gates.lock().unwrap().push_back(rx);
        tx
    }

    /// Next delete() waits for the sender before applying
    pub fn hold_next_delete(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.delete_gates.lock().unwrap().push_back(rx);
        tx
    }

    pub fn calls(&self, counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl ReviewService for FakeService {
    async fn list(&self) -> Result<Vec<Review>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.list_failures.lock().unwrap().pop_front();
        let snapshot = self.reviews.lock().unwrap().clone();
        let gate = self.list_gates.lock().unwrap().pop_front();

        if let Some(gate) = gate {
            let _ = gate.await;
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(snapshot),
        }
    }

    async fn create(&self, text: &str) -> Result<Review> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.create_gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let failure = self.create_failures.lock().unwrap().pop_front();
        if let Some(err) = failure {
            return Err(err);
        }

        let created = review(self.next_id.fetch_add(1, Ordering::SeqCst), text.trim());
        self.reviews.lock().unwrap().insert(0, created.clone());
        Ok(created)
    }

    async fn delete(&self, id: &ReviewId) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.delete_gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let failure = self.delete_failures.lock().unwrap().pop_front();
        if let Some(err) = failure {
            return Err(err);
        }

        let mut reviews = self.reviews.lock().unwrap();
        let before = reviews.len();
        reviews.retain(|r| &r.id != id);
        if reviews.len() == before {
            return Err(ReviewError::NotFound {
                message: "Review not found".to_string(),
            });
        }
        Ok(())
    }

    async fn health(&self) -> Result<()> {
        Ok(())
    }
}
