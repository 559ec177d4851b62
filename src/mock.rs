//! In-process stand-ins for the data store, photo storage and tracking API.

use crate::{
    category::Category,
    domain::{FileStorage, Observer, PassPredictor, RawPass, SearchField, SpotRepository},
    errors::{EventsError, RepoError, StorageError},
    models::{Comment, Spot},
    repositories::earliest,
    storage::validate_key,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    spots: HashMap<Uuid, Spot>,
    upvotes: HashSet<(Uuid, String)>,
    comments: Vec<Comment>,
}

#[derive(Default)]
pub struct InMemorySpotRepository {
    tables: RwLock<Tables>,
}

impl InMemorySpotRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upvote_count(&self) -> usize {
        self.tables.read().await.upvotes.len()
    }
}

#[async_trait]
impl SpotRepository for InMemorySpotRepository {
    async fn insert_spot(&self, spot: &Spot) -> Result<(), RepoError> {
        self.tables.write().await.spots.insert(spot.id, spot.clone());
        Ok(())
    }

    async fn get_spot(&self, id: Uuid) -> Result<Option<Spot>, RepoError> {
        Ok(self.tables.read().await.spots.get(&id).cloned())
    }

    async fn list_spots(&self) -> Result<Vec<Spot>, RepoError> {
        Ok(self.tables.read().await.spots.values().cloned().collect())
    }

    async fn search_spots(&self, field: SearchField, term: &str) -> Result<Vec<Spot>, RepoError> {
        let term = term.to_lowercase();
        Ok(self
            .tables
            .read()
            .await
            .spots
            .values()
            .filter(|spot| {
                let text = match field {
                    SearchField::Title => &spot.title,
                    SearchField::Description => &spot.description,
                };
                text.to_lowercase().contains(&term)
            })
            .cloned()
            .collect())
    }

    async fn first_in_category(&self, category: Category) -> Result<Option<Spot>, RepoError> {
        let matching = self
            .tables
            .read()
            .await
            .spots
            .values()
            .filter(|spot| spot.category == category)
            .cloned()
            .collect();
        Ok(earliest(matching))
    }

    async fn record_upvote(&self, spot_id: Uuid, user_id: &str) -> Result<(), RepoError> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;
        let key = (spot_id, user_id.to_string());
        if tables.upvotes.contains(&key) {
            return Err(RepoError::DuplicateUpvote {
                spot_id,
                user_id: user_id.to_string(),
            });
        }
        let spot = tables
            .spots
            .get_mut(&spot_id)
            .ok_or(RepoError::SpotNotFound(spot_id))?;
        spot.upvotes += 1;
        tables.upvotes.insert(key);
        Ok(())
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<(), RepoError> {
        self.tables.write().await.comments.push(comment.clone());
        Ok(())
    }

    async fn list_comments(&self, spot_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let mut comments: Vec<Comment> = self
            .tables
            .read()
            .await
            .comments
            .iter()
            .filter(|c| c.spot_id == spot_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| c.sort_key());
        Ok(comments)
    }
}

/// Store whose every operation fails with a backend error.
#[derive(Debug, Default)]
pub struct FailingSpotRepository;

impl FailingSpotRepository {
    fn unavailable<T>() -> Result<T, RepoError> {
        Err(RepoError::BackendError(anyhow::anyhow!("store unavailable: connection refused")))
    }
}

#[async_trait]
impl SpotRepository for FailingSpotRepository {
    async fn insert_spot(&self, _spot: &Spot) -> Result<(), RepoError> {
        Self::unavailable()
    }

    async fn get_spot(&self, _id: Uuid) -> Result<Option<Spot>, RepoError> {
        Self::unavailable()
    }

    async fn list_spots(&self) -> Result<Vec<Spot>, RepoError> {
        Self::unavailable()
    }

    async fn search_spots(&self, _field: SearchField, _term: &str) -> Result<Vec<Spot>, RepoError> {
        Self::unavailable()
    }

    async fn first_in_category(&self, _category: Category) -> Result<Option<Spot>, RepoError> {
        Self::unavailable()
    }

    async fn record_upvote(&self, _spot_id: Uuid, _user_id: &str) -> Result<(), RepoError> {
        Self::unavailable()
    }

    async fn insert_comment(&self, _comment: &Comment) -> Result<(), RepoError> {
        Self::unavailable()
    }

    async fn list_comments(&self, _spot_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        Self::unavailable()
    }
}

#[derive(Default)]
pub struct InMemoryFileStorage {
    files: RwLock<HashMap<String, (Vec<u8>, Option<String>)>>,
}

impl InMemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.files.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl FileStorage for InMemoryFileStorage {
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: Option<String>) -> Result<(), StorageError> {
        validate_key(key)?;
        self.files
            .write()
            .await
            .insert(key.to_string(), (data, content_type));
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<(Vec<u8>, Option<String>), StorageError> {
        validate_key(key)?;
        self.files
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.files.write().await.remove(key);
        Ok(())
    }
}

/// Answers every request with the same pass list, recording the last observer seen.
#[derive(Default)]
pub struct StaticPassPredictor {
    passes: Vec<RawPass>,
    last_observer: RwLock<Option<Observer>>,
}

impl StaticPassPredictor {
    pub fn new(passes: Vec<RawPass>) -> Self {
        Self {
            passes,
            last_observer: RwLock::new(None),
        }
    }

    pub async fn last_observer(&self) -> Option<Observer> {
        *self.last_observer.read().await
    }
}

#[async_trait]
impl PassPredictor for StaticPassPredictor {
    async fn visual_passes(&self, observer: Observer) -> Result<Vec<RawPass>, EventsError> {
        *self.last_observer.write().await = Some(observer);
        Ok(self.passes.clone())
    }
}
