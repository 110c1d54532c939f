use crate::models::Review;
use crate::rotation::RotationState;
use crate::store::StoreSnapshot;

/// Format one review as a text card
pub fn render_review(review: &Review) -> String {
    let mut out = String::new();

    let score = review
        .score_percent()
        .map(|s| format!(" ({})", s))
        .unwrap_or_default();
    out.push_str(&format!(
        "[{}{}] #{}  {}\n",
        review.sentiment.label(),
        score,
        review.id,
        review.created_date()
    ));
    out.push_str(&format!("{}\n", review.text));

    if let Some(points) = review.key_points.as_deref().filter(|p| !p.trim().is_empty()) {
        out.push_str("Key points:\n");
        out.push_str(points);
        if !points.ends_with('\n') {
            out.push('\n');
        }
    }

    out
}

/// Render the latest analysis result
pub fn render_result(review: &Review) -> String {
    let mut out = String::from("## Analysis Result\n\n");
    out.push_str(&render_review(review));
    out
}

/// Render the whole collection, or its loading/empty state
pub fn render_reviews(snapshot: &StoreSnapshot) -> String {
    if snapshot.loading {
        return "Loading reviews...\n".to_string();
    }
    if snapshot.reviews.is_empty() {
        return "No reviews yet. Analyze your first review!\n".to_string();
    }

    let mut out = format!("## Reviews ({})\n\n", snapshot.reviews.len());
    for review in &snapshot.reviews {
        out.push_str(&render_review(review));
        if snapshot.deleting.contains(&review.id) {
            out.push_str("(deleting...)\n");
        }
        out.push('\n');
    }
    out
}

/// Render the highlighted review of the rotation window
pub fn render_highlight(state: &RotationState, reviews: &[Review]) -> String {
    let current = state
        .current()
        .and_then(|id| reviews.iter().find(|r| &r.id == id));

    match current {
        Some(review) => format!(
            "-- Highlight {}/{} --\n{}",
            state.index + 1,
            state.window.len(),
            render_review(review)
        ),
        None => "No reviews yet. Analyze your first review!\n".to_string(),
    }
}
