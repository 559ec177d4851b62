use crate::category::Category;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Stored timestamps keep microseconds; truncate up front so values survive a round trip.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Spot {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub photo_url: Option<String>,
    pub category: Category,
    pub upvotes: u64,
    pub created_at: DateTime<Utc>,
}

impl Spot {
    /// A freshly submitted spot: new id, zero upvotes, stamped now.
    pub fn new(
        title: String,
        description: String,
        latitude: f64,
        longitude: f64,
        photo_url: Option<String>,
        category: Category,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            latitude,
            longitude,
            photo_url,
            category,
            upvotes: 0,
            created_at: now(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: Uuid,
    pub spot_id: Uuid,
    pub user_id: String,
    pub username: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(spot_id: Uuid, user_id: String, username: String, comment: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            spot_id,
            user_id,
            username,
            comment,
            created_at: now(),
        }
    }

    /// Range key of the comments table. Timestamp first so the key sorts by creation time.
    pub fn sort_key(&self) -> String {
        format!(
            "{}#{}",
            self.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            self.id
        )
    }
}

/// Spot fields as submitted by a client, before categorization and upload.
#[derive(Debug, Clone, Default)]
pub struct NewSpotForm {
    pub title: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub photo_url: Option<String>,
    pub photo_file: Option<PhotoUpload>,
}

#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CategoryQuery {
    pub category: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct UpvoteByCategoryForm {
    pub category: String,
    pub user_id: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct UpvoteForm {
    pub user_id: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CommentByCategoryForm {
    pub category: String,
    pub user_id: String,
    pub username: String,
    pub text: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CommentForm {
    pub user_id: String,
    pub username: String,
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreatedSpotResponse {
    pub message: String,
    pub spot: Spot,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SpotsResponse {
    pub spots: Vec<Spot>,
}

// --- Celestial events ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VisiblePass {
    pub time_ist: String,
    pub date_ist: String,
    pub direction: String,
    pub duration: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MeteorShower {
    pub name: String,
    pub date_range: String,
    pub peak_location: String,
    pub hemisphere: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EclipseEvent {
    pub date: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Observer location for pass predictions. Missing query fields fall back to configured defaults.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct PassQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn new_spot_starts_with_zero_upvotes() {
        let spot = Spot::new(
            "Ridge".into(),
            "peak".into(),
            30.0,
            78.0,
            None,
            Category::Mountain,
        );
        assert_eq!(spot.upvotes, 0);
        assert_eq!(spot.category, Category::Mountain);
    }

    #[test]
    fn comment_sort_keys_order_by_time() {
        let spot_id = Uuid::new_v4();
        let mut early = Comment::new(spot_id, "u1".into(), "A".into(), "first".into());
        let mut late = Comment::new(spot_id, "u2".into(), "B".into(), "second".into());
        early.created_at = Utc.with_ymd_and_hms(2025, 8, 12, 9, 59, 59).unwrap();
        late.created_at = Utc.with_ymd_and_hms(2025, 8, 12, 10, 0, 0).unwrap();
        assert!(early.sort_key() < late.sort_key());
        assert!(early.sort_key().ends_with(&early.id.to_string()));
    }

    #[test]
    fn eclipse_kind_serializes_as_type() {
        let event = EclipseEvent {
            date: "21 Sep 2025".into(),
            kind: "Partial Solar Eclipse".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Partial Solar Eclipse");
    }
}
