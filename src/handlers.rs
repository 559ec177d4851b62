use crate::{
    errors::AppError,
    events,
    models::{
        CategoryQuery, CommentByCategoryForm, CommentForm, CreatedSpotResponse, MessageResponse,
        NewSpotForm, PassQuery, PhotoUpload, SearchQuery, SpotsResponse, UpvoteByCategoryForm,
        UpvoteForm,
    },
    AppState,
};
use axum::{
    body::Body,
    extract::{
        rejection::{FormRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use std::sync::Arc;
use tracing;
use uuid::Uuid;

impl From<FormRejection> for AppError {
    fn from(err: FormRejection) -> Self {
        AppError::InvalidInput(err.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(err: QueryRejection) -> Self {
        AppError::InvalidInput(err.body_text())
    }
}

fn parse_coordinate(name: &str, raw: &str) -> Result<f64, AppError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AppError::InvalidInput(format!("{} must be a number, got '{}'", name, raw)))
}

/// POST /spots/spots (multipart) title, description, latitude, longitude, photo_url?, photo_file?
pub async fn create_spot(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut title = None;
    let mut description = None;
    let mut latitude = None;
    let mut longitude = None;
    let mut photo_url = None;
    let mut photo_file: Option<PhotoUpload> = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = match field.name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        match field_name.as_str() {
            "title" => title = Some(field.text().await?),
            "description" => description = Some(field.text().await?),
            "latitude" => latitude = Some(parse_coordinate("latitude", &field.text().await?)?),
            "longitude" => longitude = Some(parse_coordinate("longitude", &field.text().await?)?),
            "photo_url" => photo_url = Some(field.text().await?),
            "photo_file" => {
                let filename = field.file_name().map(|s| s.to_string());
                let content_type = field.content_type().map(|m| m.to_string());
                let data = field.bytes().await?.to_vec();
                // An unselected file input still arrives as an empty part.
                if !data.is_empty() {
                    photo_file = Some(PhotoUpload { filename, content_type, data });
                }
            }
            _ => tracing::debug!("Ignoring unknown multipart field: {}", field_name),
        }
    }

    let form = NewSpotForm {
        title: title.ok_or_else(|| AppError::MissingFormField("title".to_string()))?,
        description: description.ok_or_else(|| AppError::MissingFormField("description".to_string()))?,
        latitude: latitude.ok_or_else(|| AppError::MissingFormField("latitude".to_string()))?,
        longitude: longitude.ok_or_else(|| AppError::MissingFormField("longitude".to_string()))?,
        photo_url,
        photo_file,
    };

    let spot = state.spots.create_spot(form).await?;
    let message = format!("Spot added successfully under category '{}'", spot.category);
    Ok((StatusCode::CREATED, Json(CreatedSpotResponse { message, spot })))
}

/// GET /spots/spots?search=
pub async fn list_spots(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let spots = state.spots.search_spots(query.search.as_deref()).await?;
    tracing::debug!(search = ?query.search, count = spots.len(), "Listed spots");
    Ok(Json(SpotsResponse { spots }))
}

pub async fn get_spot(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let spot_id = Uuid::parse_str(&id_str)?;
    Ok(Json(state.spots.get_spot(spot_id).await?))
}

/// POST /spots/upvote_by_category (form) category, user_id
pub async fn upvote_by_category(
    State(state): State<Arc<AppState>>,
    form: Result<Form<UpvoteByCategoryForm>, FormRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Form(form) = form?;
    let spot = state.spots.upvote_by_category(&form.category, &form.user_id).await?;
    Ok(Json(MessageResponse {
        message: format!(
            "Upvoted spot '{}' in category '{}' successfully",
            spot.title, form.category
        ),
    }))
}

/// POST /spots/spots/{id}/upvote (form) user_id
pub async fn upvote_spot(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
    form: Result<Form<UpvoteForm>, FormRejection>,
) -> Result<impl IntoResponse, AppError> {
    let spot_id = Uuid::parse_str(&id_str)?;
    let Form(form) = form?;
    let spot = state.spots.upvote_spot(spot_id, &form.user_id).await?;
    Ok(Json(MessageResponse {
        message: format!(
            "Upvoted spot '{}' in category '{}' successfully",
            spot.title, spot.category
        ),
    }))
}

/// POST /spots/comments/by_category (form) category, user_id, username, text
pub async fn add_comment_by_category(
    State(state): State<Arc<AppState>>,
    form: Result<Form<CommentByCategoryForm>, FormRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Form(form) = form?;
    let comment = state
        .spots
        .add_comment_by_category(&form.category, &form.user_id, &form.username, &form.text)
        .await?;
    Ok(Json(comment))
}

/// GET /spots/comments/by_category?category=
pub async fn list_comments_by_category(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CategoryQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    Ok(Json(state.spots.comments_by_category(&query.category).await?))
}

pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
    form: Result<Form<CommentForm>, FormRejection>,
) -> Result<impl IntoResponse, AppError> {
    let spot_id = Uuid::parse_str(&id_str)?;
    let Form(form) = form?;
    let comment = state
        .spots
        .add_comment(spot_id, &form.user_id, &form.username, &form.text)
        .await?;
    Ok(Json(comment))
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let spot_id = Uuid::parse_str(&id_str)?;
    Ok(Json(state.spots.comments_for_spot(spot_id).await?))
}

/// GET /events/visible-passes?lat=&lon=&alt=
pub async fn visible_passes(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PassQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let observer = events::observer_for(&query, &state.satellite);
    let passes = events::visible_passes(state.passes.as_ref(), observer).await?;
    Ok(Json(passes))
}

pub async fn meteor_showers() -> impl IntoResponse {
    Json(events::meteor_showers())
}

pub async fn solar_eclipses() -> impl IntoResponse {
    Json(events::solar_eclipses())
}

pub async fn lunar_eclipses() -> impl IntoResponse {
    Json(events::lunar_eclipses())
}

/// Handler for GET /static/{*key}
pub async fn get_static_asset(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    tracing::debug!(asset_key = %key, "Fetching static asset");

    let (bytes, content_type) = state.storage.download(&key).await?;
    let content_type_header = content_type
        .or_else(|| mime_guess::from_path(&key).first_raw().map(|s| s.to_string()))
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_header)
        .body(Body::from(bytes))
        .map_err(|e| AppError::InternalServerError(format!("Failed to build asset response: {}", e)))?;

    Ok(response)
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
