pub mod client;
pub mod config;
pub mod error;
pub mod flow;
pub mod models;
pub mod render;
pub mod rotation;
pub mod store;

pub use client::{HttpReviewClient, ReviewService};
pub use config::Config;
pub use error::{LastError, Operation, Result, ReviewError};
pub use flow::MutationFlow;
pub use models::*;
pub use render::{render_highlight, render_result, render_review, render_reviews};
pub use rotation::{RotationController, RotationState};
pub use store::{ConfirmedDelete, RefreshOutcome, ReviewStore, StoreSnapshot};
