use crate::{
    category::{categorize, Category},
    domain::{FileStorage, SearchField, SpotRepository},
    errors::AppError,
    models::{Comment, NewSpotForm, Spot},
    storage::{public_url, upload_key},
};
use std::sync::Arc;
use uuid::Uuid;

/// Spot submission, search, upvotes and comments over the injected store and photo storage.
#[derive(Clone)]
pub struct SpotService {
    repo: Arc<dyn SpotRepository>,
    storage: Arc<dyn FileStorage>,
}

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{} must not be blank", field)));
    }
    Ok(())
}

impl SpotService {
    pub fn new(repo: Arc<dyn SpotRepository>, storage: Arc<dyn FileStorage>) -> Self {
        Self { repo, storage }
    }

    /// Categorizes and stores a new spot. An uploaded file takes precedence over `photo_url`.
    pub async fn create_spot(&self, form: NewSpotForm) -> Result<Spot, AppError> {
        require("title", &form.title)?;
        if !(-90.0..=90.0).contains(&form.latitude) {
            return Err(AppError::InvalidInput(format!("latitude {} is out of range", form.latitude)));
        }
        if !(-180.0..=180.0).contains(&form.longitude) {
            return Err(AppError::InvalidInput(format!("longitude {} is out of range", form.longitude)));
        }

        let category = categorize(&form.title, &form.description);

        let mut uploaded_key = None;
        let photo_url = match form.photo_file {
            Some(file) => {
                let key = upload_key(file.filename.as_deref());
                let content_type = file
                    .content_type
                    .or_else(|| mime_guess::from_path(&key).first_raw().map(|s| s.to_string()));
                self.storage.upload(&key, file.data, content_type).await?;
                tracing::debug!(%key, "Stored spot photo");
                let url = public_url(&key);
                uploaded_key = Some(key);
                Some(url)
            }
            None => form.photo_url.filter(|url| !url.trim().is_empty()),
        };

        let spot = Spot::new(
            form.title,
            form.description,
            form.latitude,
            form.longitude,
            photo_url,
            category,
        );
        if let Err(err) = self.repo.insert_spot(&spot).await {
            if let Some(key) = uploaded_key {
                // The spot was never stored, so nothing references the photo.
                if let Err(cleanup) = self.storage.delete(&key).await {
                    tracing::warn!(%key, error = %cleanup, "Failed to remove photo of unsaved spot");
                }
            }
            return Err(err.into());
        }

        tracing::info!(spot_id = %spot.id, %category, "Spot created");
        Ok(spot)
    }

    /// All spots, or those whose title contains `term`; description matches only when no title does.
    pub async fn search_spots(&self, term: Option<&str>) -> Result<Vec<Spot>, AppError> {
        let term = term.map(str::trim).filter(|t| !t.is_empty());
        let Some(term) = term else {
            return Ok(self.repo.list_spots().await?);
        };

        let by_title = self.repo.search_spots(SearchField::Title, term).await?;
        if !by_title.is_empty() {
            return Ok(by_title);
        }
        tracing::debug!(%term, "No title matches, falling back to description");
        Ok(self.repo.search_spots(SearchField::Description, term).await?)
    }

    pub async fn get_spot(&self, id: Uuid) -> Result<Spot, AppError> {
        self.repo
            .get_spot(id)
            .await?
            .ok_or(AppError::SpotNotFound(id))
    }

    /// Resolves a category label to its addressable spot (the earliest created one).
    pub async fn spot_for_category(&self, category: &str) -> Result<Spot, AppError> {
        let not_found = || AppError::NoSpotForCategory(category.to_string());
        let parsed: Category = category.parse().map_err(|_| not_found())?;
        self.repo
            .first_in_category(parsed)
            .await?
            .ok_or_else(not_found)
    }

    pub async fn upvote_spot(&self, spot_id: Uuid, user_id: &str) -> Result<Spot, AppError> {
        require("user_id", user_id)?;
        let spot = self.get_spot(spot_id).await?;
        self.repo.record_upvote(spot.id, user_id).await?;
        tracing::info!(spot_id = %spot.id, %user_id, "Spot upvoted");
        Ok(spot)
    }

    pub async fn upvote_by_category(&self, category: &str, user_id: &str) -> Result<Spot, AppError> {
        require("user_id", user_id)?;
        let spot = self.spot_for_category(category).await?;
        self.repo.record_upvote(spot.id, user_id).await?;
        tracing::info!(spot_id = %spot.id, %category, %user_id, "Spot upvoted by category");
        Ok(spot)
    }

    pub async fn add_comment(
        &self,
        spot_id: Uuid,
        user_id: &str,
        username: &str,
        text: &str,
    ) -> Result<Comment, AppError> {
        require("user_id", user_id)?;
        require("username", username)?;
        require("text", text)?;
        let spot = self.get_spot(spot_id).await?;
        self.insert_comment(&spot, user_id, username, text).await
    }

    pub async fn add_comment_by_category(
        &self,
        category: &str,
        user_id: &str,
        username: &str,
        text: &str,
    ) -> Result<Comment, AppError> {
        require("user_id", user_id)?;
        require("username", username)?;
        require("text", text)?;
        let spot = self.spot_for_category(category).await?;
        self.insert_comment(&spot, user_id, username, text).await
    }

    async fn insert_comment(
        &self,
        spot: &Spot,
        user_id: &str,
        username: &str,
        text: &str,
    ) -> Result<Comment, AppError> {
        let comment = Comment::new(spot.id, user_id.to_string(), username.to_string(), text.to_string());
        self.repo.insert_comment(&comment).await?;
        tracing::info!(spot_id = %spot.id, comment_id = %comment.id, "Comment added");
        Ok(comment)
    }

    pub async fn comments_for_spot(&self, spot_id: Uuid) -> Result<Vec<Comment>, AppError> {
        let spot = self.get_spot(spot_id).await?;
        Ok(self.repo.list_comments(spot.id).await?)
    }

    pub async fn comments_by_category(&self, category: &str) -> Result<Vec<Comment>, AppError> {
        let spot = self.spot_for_category(category).await?;
        Ok(self.repo.list_comments(spot.id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FailingSpotRepository, InMemoryFileStorage, InMemorySpotRepository};
    use crate::models::PhotoUpload;

    struct Fixture {
        service: SpotService,
        repo: Arc<InMemorySpotRepository>,
        storage: Arc<InMemoryFileStorage>,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemorySpotRepository::new());
        let storage = Arc::new(InMemoryFileStorage::new());
        Fixture {
            service: SpotService::new(repo.clone(), storage.clone()),
            repo,
            storage,
        }
    }

    fn form(title: &str, description: &str) -> NewSpotForm {
        NewSpotForm {
            title: title.into(),
            description: description.into(),
            latitude: 26.9,
            longitude: 70.9,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_assigns_category_and_zero_upvotes() {
        let fx = fixture();
        let spot = fx
            .service
            .create_spot(form("Milky Way over the dunes", "desert camp"))
            .await
            .unwrap();
        assert_eq!(spot.category, Category::Desert);
        assert_eq!(spot.upvotes, 0);
        assert_eq!(fx.repo.get_spot(spot.id).await.unwrap(), Some(spot));
    }

    #[tokio::test]
    async fn uploaded_file_overrides_url() {
        let fx = fixture();
        let mut f = form("Lakeside", "pond");
        f.photo_url = Some("https://example.com/x.jpg".into());
        f.photo_file = Some(PhotoUpload {
            filename: Some("night.jpg".into()),
            content_type: None,
            data: vec![1, 2, 3],
        });
        let spot = fx.service.create_spot(f).await.unwrap();

        let url = spot.photo_url.unwrap();
        assert!(url.starts_with("/static/uploads/"));
        assert!(url.ends_with("_night.jpg"));
        let key = url.trim_start_matches("/static/");
        let (data, content_type) = fx.storage.download(key).await.unwrap();
        assert_eq!(data, vec![1, 2, 3]);
        assert_eq!(content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn rejects_out_of_range_coordinates() {
        let fx = fixture();
        let mut f = form("Pole", "");
        f.latitude = 91.0;
        assert!(matches!(fx.service.create_spot(f).await, Err(AppError::InvalidInput(_))));
        assert!(fx.repo.list_spots().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_prefers_title_then_description() {
        let fx = fixture();
        fx.service.create_spot(form("Orion Point", "cold ridge")).await.unwrap();
        fx.service.create_spot(form("Beach night", "watching orion rise")).await.unwrap();
        fx.service.create_spot(form("Pond", "fireflies")).await.unwrap();

        assert_eq!(fx.service.search_spots(None).await.unwrap().len(), 3);
        assert_eq!(fx.service.search_spots(Some("  ")).await.unwrap().len(), 3);

        // Title match wins; the description match is not unioned in.
        let hits = fx.service.search_spots(Some("ORION")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Orion Point");

        let hits = fx.service.search_spots(Some("fireflies")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Pond");

        assert!(fx.service.search_spots(Some("aurora")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_upvote_by_same_user_conflicts() {
        let fx = fixture();
        let spot = fx.service.create_spot(form("Sand sea", "dune")).await.unwrap();

        fx.service.upvote_by_category("desert", "u1").await.unwrap();
        let err = fx.service.upvote_by_category("Desert", "u1").await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyUpvoted { .. }));

        fx.service.upvote_spot(spot.id, "u2").await.unwrap();
        assert_eq!(fx.service.get_spot(spot.id).await.unwrap().upvotes, 2);
        assert_eq!(fx.repo.upvote_count().await, 2);
    }

    #[tokio::test]
    async fn unknown_or_empty_category_is_not_found() {
        let fx = fixture();
        fx.service.create_spot(form("Sand sea", "dune")).await.unwrap();
        for category in ["volcano", "lake"] {
            let err = fx.service.upvote_by_category(category, "u1").await.unwrap_err();
            assert!(matches!(err, AppError::NoSpotForCategory(_)), "{category}");
        }
        let err = fx.service.upvote_spot(Uuid::new_v4(), "u1").await.unwrap_err();
        assert!(matches!(err, AppError::SpotNotFound(_)));
    }

    #[tokio::test]
    async fn comments_come_back_oldest_first() {
        let fx = fixture();
        let spot = fx.service.create_spot(form("Pine woods", "clearing")).await.unwrap();
        for text in ["first", "second", "third"] {
            fx.service
                .add_comment_by_category("forest", "u1", "SkyFan", text)
                .await
                .unwrap();
        }
        let via_category = fx.service.comments_by_category("forest").await.unwrap();
        let via_id = fx.service.comments_for_spot(spot.id).await.unwrap();
        assert_eq!(via_category, via_id);
        assert_eq!(via_category.len(), 3);
        assert!(via_category.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        assert!(via_category.iter().all(|c| c.spot_id == spot.id));
    }

    #[tokio::test]
    async fn blank_comment_fields_are_rejected() {
        let fx = fixture();
        let spot = fx.service.create_spot(form("Pine woods", "")).await.unwrap();
        let err = fx.service.add_comment(spot.id, "u1", "SkyFan", " ").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn store_failure_is_server_error_and_drops_uploaded_photo() {
        let storage = Arc::new(InMemoryFileStorage::new());
        let service = SpotService::new(Arc::new(FailingSpotRepository), storage.clone());

        let mut f = form("Lakeside", "pond");
        f.photo_file = Some(PhotoUpload {
            filename: Some("night.jpg".into()),
            content_type: None,
            data: vec![1, 2, 3],
        });
        let err = service.create_spot(f).await.unwrap_err();
        assert!(matches!(err, AppError::RepositoryError(_)));
        assert!(storage.keys().await.is_empty());

        for result in [
            service.search_spots(Some("orion")).await.map(|_| ()),
            service.upvote_by_category("lake", "u1").await.map(|_| ()),
            service.add_comment(Uuid::new_v4(), "u1", "SkyFan", "hi").await.map(|_| ()),
        ] {
            assert!(matches!(result, Err(AppError::RepositoryError(_))));
        }
    }
}
