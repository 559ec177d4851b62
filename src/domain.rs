use crate::category::Category;
use crate::errors::{EventsError, RepoError, StorageError};
use crate::models::{Comment, Spot};
use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

/// Text column a search term is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Title,
    Description,
}

/// Trait defining operations on spots, their upvotes and comments.
#[async_trait]
pub trait SpotRepository: Send + Sync + 'static { // Send+Sync+'static required for Arc<dyn>
    async fn insert_spot(&self, spot: &Spot) -> Result<(), RepoError>;

    async fn get_spot(&self, id: Uuid) -> Result<Option<Spot>, RepoError>;

    /// Every stored spot, no particular order.
    async fn list_spots(&self) -> Result<Vec<Spot>, RepoError>;

    /// Spots whose `field` contains `term`, ignoring case.
    async fn search_spots(&self, field: SearchField, term: &str) -> Result<Vec<Spot>, RepoError>;

    /// The earliest created spot carrying `category`, if any.
    async fn first_in_category(&self, category: Category) -> Result<Option<Spot>, RepoError>;

    /// Records a (spot, user) upvote and bumps the spot's counter as one atomic step.
    ///
    /// Fails with [`RepoError::DuplicateUpvote`] if the pair already exists and
    /// [`RepoError::SpotNotFound`] if the spot does not.
    async fn record_upvote(&self, spot_id: Uuid, user_id: &str) -> Result<(), RepoError>;

    async fn insert_comment(&self, comment: &Comment) -> Result<(), RepoError>;

    /// Comments for a spot, oldest first.
    async fn list_comments(&self, spot_id: Uuid) -> Result<Vec<Comment>, RepoError>;
}

/// Trait defining operations for storing and retrieving photo files.
#[async_trait]
pub trait FileStorage: Send + Sync + 'static {
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: Option<String>) -> Result<(), StorageError>;

    /// Returns the stored bytes and, when known, their content type.
    async fn download(&self, key: &str) -> Result<(Vec<u8>, Option<String>), StorageError>;

    /// Removes a stored file. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// One predicted pass as reported by the tracking API.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RawPass {
    #[serde(rename = "startUTC")]
    pub start_utc: i64,
    /// Seconds.
    pub duration: u32,
    pub mag: f64,
    #[serde(rename = "maxEl")]
    pub max_el: f64,
    #[serde(rename = "startAzCompass")]
    pub start_az_compass: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observer {
    pub lat: f64,
    pub lon: f64,
    pub alt: i32,
}

/// Source of satellite visibility predictions.
#[async_trait]
pub trait PassPredictor: Send + Sync + 'static {
    async fn visual_passes(&self, observer: Observer) -> Result<Vec<RawPass>, EventsError>;
}
