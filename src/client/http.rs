use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::ReviewService;
use crate::error::{Result, ReviewError};
use crate::models::{Review, ReviewId};

/// HTTP/JSON client for the review service
#[derive(Clone)]
pub struct HttpReviewClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    review_text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

impl HttpReviewClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        match request.send().await {
            Ok(response) => Ok(response),
            Err(e) => Err(classify_transport(e)),
        }
    }
}

impl ReviewService for HttpReviewClient {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn list(&self) -> Result<Vec<Review>> {
        debug!("Fetching reviews");

        let response = self.send(self.client.get(self.url("reviews"))).await?;
        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }

        let reviews: Vec<Review> = decode(response).await?;
        info!(count = reviews.len(), "Fetched reviews");

        Ok(reviews)
    }

    #[instrument(skip(self, text), fields(len = text.len()))]
    async fn create(&self, text: &str) -> Result<Review> {
        debug!("Submitting review for analysis");

        let request = self
            .client
            .post(self.url("analyze-review"))
            .json(&AnalyzeRequest { review_text: text });

        let response = self.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let err = remote_error(response).await;
            return Err(match (status, err) {
                (
                    StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY,
                    ReviewError::Remote { message },
                ) => ReviewError::Validation { message },
                (_, err) => err,
            });
        }

        let review: Review = decode(response).await?;
        info!(id = %review.id, sentiment = ?review.sentiment, "Review analyzed");

        Ok(review)
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn delete(&self, id: &ReviewId) -> Result<()> {
        let response = self
            .send(self.client.delete(self.url(&format!("reviews/{}", id))))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let err = remote_error(response).await;
            return Err(match (status, err) {
                (StatusCode::NOT_FOUND, ReviewError::Remote { message }) => {
                    ReviewError::NotFound { message }
                }
                (_, err) => err,
            });
        }

        info!("Review deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn health(&self) -> Result<()> {
        let response = self.send(self.client.get(self.url("health"))).await?;
        if !response.status().is_success() {
            return Err(remote_error(response).await);
        }

        let health: HealthResponse = decode(response).await?;
        if health.status != "healthy" {
            return Err(ReviewError::Remote {
                message: format!("service reported status '{}'", health.status),
            });
        }

        Ok(())
    }
}

/// A request that produced no response at all
fn classify_transport(err: reqwest::Error) -> ReviewError {
    warn!(error = %err, "Review service unreachable");
    ReviewError::Unreachable
}

/// Build a `Remote` error from a non-success response, preferring the body's `error` field
async fn remote_error(response: Response) -> ReviewError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| transport_message(status));

    warn!(status = %status, message = %message, "Review service returned an error");

    ReviewError::Remote { message }
}

fn transport_message(status: StatusCode) -> String {
    format!("Request failed with status code {}", status.as_u16())
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    response.json::<T>().await.map_err(|e| ReviewError::Remote {
        message: format!("invalid response from review service: {}", e),
    })
}
