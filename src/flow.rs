use tracing::{debug, info};

use crate::client::ReviewService;
use crate::error::{LastError, Operation, Result, ReviewError};
use crate::models::{Review, ReviewId};
use crate::rotation::RotationController;
use crate::store::{ConfirmedDelete, RefreshOutcome, ReviewStore};

/// Turns user intents into store operations and keeps the rotation in step
/// with the committed collection
pub struct MutationFlow<S: ReviewService> {
    store: ReviewStore<S>,
    rotation: RotationController,
    draft: String,
    pending_delete: Option<ReviewId>,
    /// Local validation failure, shown in place of the store's error
    notice: Option<LastError>,
    started: bool,
}

impl<S: ReviewService> MutationFlow<S> {
    pub fn new(store: ReviewStore<S>, rotation: RotationController) -> Self {
        Self {
            store,
            rotation,
            draft: String::new(),
            pending_delete: None,
            notice: None,
            started: false,
        }
    }

    pub fn store(&self) -> &ReviewStore<S> {
        &self.store
    }

    pub fn rotation(&self) -> &RotationController {
        &self.rotation
    }

    pub fn rotation_mut(&mut self) -> &mut RotationController {
        &mut self.rotation
    }

    /// Initial load; only the first call refreshes
    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            debug!("Flow already started");
            return Ok(());
        }
        self.started = true;

        info!("Loading reviews");
        self.refresh().await.map(|_| ())
    }

    pub async fn refresh(&mut self) -> Result<RefreshOutcome> {
        self.notice = None;
        let result = self.store.refresh().await;
        self.sync_rotation();
        result
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Whether the submit trigger is enabled
    pub fn can_submit(&self) -> bool {
        !self.store.is_submitting()
    }

    /// Submit the draft; the draft is cleared only when analysis succeeds
    pub async fn submit(&mut self) -> Result<Review> {
        self.notice = None;

        if self.draft.trim().is_empty() {
            self.notice = Some(LastError::new(Operation::Submit, ReviewError::EmptyInput));
            return Err(ReviewError::EmptyInput);
        }
        if !self.can_submit() {
            return Err(ReviewError::Busy);
        }

        let result = self.store.submit_review(&self.draft).await;
        if result.is_ok() {
            self.draft.clear();
        }
        self.sync_rotation();
        result
    }

    /// Mark a review for deletion; nothing is sent until confirmed
    pub fn request_delete(&mut self, id: ReviewId) {
        debug!(id = %id, "Delete awaiting confirmation");
        self.pending_delete = Some(id);
    }

    pub fn pending_delete(&self) -> Option<&ReviewId> {
        self.pending_delete.as_ref()
    }

    pub fn cancel_delete(&mut self) {
        if let Some(id) = self.pending_delete.take() {
            debug!(id = %id, "Delete cancelled");
        }
    }

    /// Delete the review awaiting confirmation, returning its id
    ///
    /// Returns `Ok(None)` when nothing was awaiting confirmation.
    pub async fn confirm_delete(&mut self) -> Result<Option<ReviewId>> {
        let Some(id) = self.pending_delete.take() else {
            return Ok(None);
        };
        self.notice = None;

        let result = self
            .store
            .delete_review(ConfirmedDelete::new(id.clone()))
            .await;
        self.sync_rotation();
        result.map(|()| Some(id))
    }

    /// The error to show the user, if any
    pub fn error_message(&self, service_url: &str) -> Option<String> {
        self.notice
            .clone()
            .or_else(|| self.store.last_error())
            .and_then(|err| err.user_message(service_url))
    }

    fn sync_rotation(&mut self) {
        let reviews = self.store.reviews();
        self.rotation.sync(&reviews);
    }
}
