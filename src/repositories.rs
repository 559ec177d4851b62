use crate::{
    category::Category,
    config::TableNames,
    domain::{SearchField, SpotRepository},
    errors::RepoError,
    models::{Comment, Spot},
};
use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_dynamodb::{
    operation::transact_write_items::TransactWriteItemsError,
    types::{AttributeValue, CancellationReason, Put, TransactWriteItem, Update},
    Client as DynamoDbClient,
};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use tracing::{self, info};
use uuid::Uuid;

type Item = HashMap<String, AttributeValue>;

/// Single-attribute scan filter: `expression` refers to the attribute as `#f` and the value as `:v`.
struct ScanFilter<'a> {
    expression: &'a str,
    attribute: &'a str,
    value: String,
}

#[derive(Debug, Clone)]
pub struct DynamoDbSpotRepository {
    client: DynamoDbClient,
    tables: TableNames,
}

impl DynamoDbSpotRepository {
    pub fn new(client: DynamoDbClient, tables: TableNames) -> Self {
        info!(spots = %tables.spots, upvotes = %tables.upvotes, comments = %tables.comments, "Initializing DynamoDbSpotRepository");
        Self { client, tables }
    }

    /// Scans the spots table, following `LastEvaluatedKey` until exhausted.
    async fn scan_spots(&self, filter: Option<ScanFilter<'_>>) -> Result<Vec<Spot>, RepoError> {
        let table = &self.tables.spots;
        let mut spots = Vec::new();
        let mut last_evaluated_key: Option<Item> = None;

        loop {
            let mut request_builder = self.client.scan().table_name(table);
            if let Some(filter) = &filter {
                request_builder = request_builder
                    .filter_expression(filter.expression)
                    .expression_attribute_names("#f", filter.attribute)
                    .expression_attribute_values(":v", AttributeValue::S(filter.value.clone()));
            }
            if let Some(lek) = last_evaluated_key {
                request_builder = request_builder.set_exclusive_start_key(Some(lek));
            }

            let resp = request_builder
                .send()
                .await
                .context(format!("DynamoDB: Failed to scan table '{}'", table))?;

            for item in resp.items.unwrap_or_default() {
                spots.push(item_to_spot(&item)?);
            }

            last_evaluated_key = resp.last_evaluated_key;
            if last_evaluated_key.is_none() {
                break;
            }
            tracing::debug!(%table, "DynamoDB Scan: continuing with LastEvaluatedKey");
        }

        tracing::debug!(%table, count = spots.len(), "DynamoDB Scan complete");
        Ok(spots)
    }
}

#[async_trait]
impl SpotRepository for DynamoDbSpotRepository {
    async fn insert_spot(&self, spot: &Spot) -> Result<(), RepoError> {
        let mut request = self
            .client
            .put_item()
            .table_name(&self.tables.spots)
            .item("id", AttributeValue::S(spot.id.to_string()))
            .item("title", AttributeValue::S(spot.title.clone()))
            .item("title_lc", AttributeValue::S(spot.title.to_lowercase()))
            .item("description", AttributeValue::S(spot.description.clone()))
            .item("description_lc", AttributeValue::S(spot.description.to_lowercase()))
            .item("latitude", AttributeValue::N(spot.latitude.to_string()))
            .item("longitude", AttributeValue::N(spot.longitude.to_string()))
            .item("category", AttributeValue::S(spot.category.to_string()))
            .item("upvotes", AttributeValue::N(spot.upvotes.to_string()))
            .item("created_at", AttributeValue::S(timestamp(&spot.created_at)));
        if let Some(url) = &spot.photo_url {
            request = request.item("photo_url", AttributeValue::S(url.clone()));
        }

        request
            .send()
            .await
            .context(format!("DynamoDB (table: {}): Failed to put spot (id: {})", self.tables.spots, spot.id))?;
        Ok(())
    }

    async fn get_spot(&self, id: Uuid) -> Result<Option<Spot>, RepoError> {
        let resp = self
            .client
            .get_item()
            .table_name(&self.tables.spots)
            .key("id", AttributeValue::S(id.to_string()))
            .send()
            .await
            .context(format!("DynamoDB (table: {}): Failed to get spot (id: {})", self.tables.spots, id))?;

        resp.item.as_ref().map(item_to_spot).transpose()
    }

    async fn list_spots(&self) -> Result<Vec<Spot>, RepoError> {
        self.scan_spots(None).await
    }

    async fn search_spots(&self, field: SearchField, term: &str) -> Result<Vec<Spot>, RepoError> {
        let attribute = match field {
            SearchField::Title => "title_lc",
            SearchField::Description => "description_lc",
        };
        self.scan_spots(Some(ScanFilter {
            expression: "contains(#f, :v)",
            attribute,
            value: term.to_lowercase(),
        }))
        .await
    }

    async fn first_in_category(&self, category: Category) -> Result<Option<Spot>, RepoError> {
        let spots = self
            .scan_spots(Some(ScanFilter {
                expression: "#f = :v",
                attribute: "category",
                value: category.to_string(),
            }))
            .await?;
        Ok(earliest(spots))
    }

    async fn record_upvote(&self, spot_id: Uuid, user_id: &str) -> Result<(), RepoError> {
        let id = spot_id.to_string();

        let put = Put::builder()
            .table_name(&self.tables.upvotes)
            .item("spot_id", AttributeValue::S(id.clone()))
            .item("user_id", AttributeValue::S(user_id.to_string()))
            .condition_expression("attribute_not_exists(user_id)")
            .build()
            .context("Failed to build upvote Put")?;

        let update = Update::builder()
            .table_name(&self.tables.spots)
            .key("id", AttributeValue::S(id.clone()))
            .update_expression("ADD upvotes :one")
            .condition_expression("attribute_exists(id)")
            .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
            .build()
            .context("Failed to build upvote counter Update")?;

        let result = self
            .client
            .transact_write_items()
            .transact_items(TransactWriteItem::builder().put(put).build())
            .transact_items(TransactWriteItem::builder().update(update).build())
            .send()
            .await;

        match result {
            Ok(_) => {
                tracing::debug!(%spot_id, %user_id, "DynamoDB: Upvote recorded");
                Ok(())
            }
            Err(sdk_err) => {
                if let Some(TransactWriteItemsError::TransactionCanceledException(cancel)) =
                    sdk_err.as_service_error()
                {
                    let reasons = cancel.cancellation_reasons.as_deref().unwrap_or_default();
                    if let Some(err) = upvote_rejection(reasons, spot_id, user_id) {
                        return Err(err);
                    }
                }
                Err(anyhow::Error::new(sdk_err)
                    .context(format!("DynamoDB: Failed to record upvote on spot {}", spot_id))
                    .into())
            }
        }
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<(), RepoError> {
        self.client
            .put_item()
            .table_name(&self.tables.comments)
            .item("spot_id", AttributeValue::S(comment.spot_id.to_string()))
            .item("sort_key", AttributeValue::S(comment.sort_key()))
            .item("id", AttributeValue::S(comment.id.to_string()))
            .item("user_id", AttributeValue::S(comment.user_id.clone()))
            .item("username", AttributeValue::S(comment.username.clone()))
            .item("comment", AttributeValue::S(comment.comment.clone()))
            .item("created_at", AttributeValue::S(timestamp(&comment.created_at)))
            .send()
            .await
            .context(format!(
                "DynamoDB (table: {}): Failed to put comment (id: {})",
                self.tables.comments, comment.id
            ))?;
        Ok(())
    }

    async fn list_comments(&self, spot_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let table = &self.tables.comments;
        let mut comments = Vec::new();
        let mut last_evaluated_key: Option<Item> = None;

        loop {
            let resp = self
                .client
                .query()
                .table_name(table)
                .key_condition_expression("spot_id = :sid")
                .expression_attribute_values(":sid", AttributeValue::S(spot_id.to_string()))
                .scan_index_forward(true)
                .set_exclusive_start_key(last_evaluated_key)
                .send()
                .await
                .context(format!("DynamoDB (table: {}): Failed to query comments for spot {}", table, spot_id))?;

            for item in resp.items.unwrap_or_default() {
                comments.push(item_to_comment(&item)?);
            }

            last_evaluated_key = resp.last_evaluated_key;
            if last_evaluated_key.is_none() {
                break;
            }
        }

        Ok(comments)
    }
}

/// Maps the cancellation reasons of the upvote transaction to a domain error.
/// Reasons line up with the transact items: [upvote put, counter update].
fn upvote_rejection(reasons: &[CancellationReason], spot_id: Uuid, user_id: &str) -> Option<RepoError> {
    let failed = |idx: usize| reasons.get(idx).and_then(|r| r.code()) == Some("ConditionalCheckFailed");
    if failed(0) {
        Some(RepoError::DuplicateUpvote {
            spot_id,
            user_id: user_id.to_string(),
        })
    } else if failed(1) {
        Some(RepoError::SpotNotFound(spot_id))
    } else {
        None
    }
}

/// Earliest `created_at`, ties broken by id so repeated lookups agree.
pub(crate) fn earliest(spots: Vec<Spot>) -> Option<Spot> {
    spots.into_iter().min_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    })
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn get_s<'a>(item: &'a Item, key: &str) -> Result<&'a String, RepoError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .ok_or_else(|| RepoError::DataCorruption(format!("missing string attribute '{}'", key)))
}

fn get_n<'a>(item: &'a Item, key: &str) -> Result<&'a String, RepoError> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .ok_or_else(|| RepoError::DataCorruption(format!("missing number attribute '{}'", key)))
}

fn parse_uuid(item: &Item, key: &str) -> Result<Uuid, RepoError> {
    let raw = get_s(item, key)?;
    Uuid::parse_str(raw).map_err(|e| RepoError::DataCorruption(format!("'{}' is not a UUID ({}): {}", key, raw, e)))
}

fn parse_timestamp(item: &Item, key: &str) -> Result<DateTime<Utc>, RepoError> {
    let raw = get_s(item, key)?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepoError::DataCorruption(format!("'{}' is not RFC 3339 ({}): {}", key, raw, e)))
}

fn parse_number<T: std::str::FromStr>(item: &Item, key: &str) -> Result<T, RepoError> {
    let raw = get_n(item, key)?;
    raw.parse()
        .map_err(|_| RepoError::DataCorruption(format!("'{}' is not a valid number: {}", key, raw)))
}

fn item_to_spot(item: &Item) -> Result<Spot, RepoError> {
    let category_raw = get_s(item, "category")?;
    let category = category_raw
        .parse::<Category>()
        .map_err(|e| RepoError::DataCorruption(e.to_string()))?;

    Ok(Spot {
        id: parse_uuid(item, "id")?,
        title: get_s(item, "title")?.clone(),
        description: get_s(item, "description")?.clone(),
        latitude: parse_number(item, "latitude")?,
        longitude: parse_number(item, "longitude")?,
        photo_url: item.get("photo_url").and_then(|v| v.as_s().ok()).cloned(),
        category,
        upvotes: parse_number(item, "upvotes")?,
        created_at: parse_timestamp(item, "created_at")?,
    })
}

fn item_to_comment(item: &Item) -> Result<Comment, RepoError> {
    Ok(Comment {
        id: parse_uuid(item, "id")?,
        spot_id: parse_uuid(item, "spot_id")?,
        user_id: get_s(item, "user_id")?.clone(),
        username: get_s(item, "username")?.clone(),
        comment: get_s(item, "comment")?.clone(),
        created_at: parse_timestamp(item, "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn spot_item(id: Uuid) -> Item {
        HashMap::from([
            ("id".to_string(), AttributeValue::S(id.to_string())),
            ("title".to_string(), AttributeValue::S("Dune camp".into())),
            ("description".to_string(), AttributeValue::S("Thar".into())),
            ("latitude".to_string(), AttributeValue::N("26.9".into())),
            ("longitude".to_string(), AttributeValue::N("70.9".into())),
            ("category".to_string(), AttributeValue::S("desert".into())),
            ("upvotes".to_string(), AttributeValue::N("3".into())),
            (
                "created_at".to_string(),
                AttributeValue::S("2025-08-12T10:00:00.000000Z".into()),
            ),
        ])
    }

    #[test]
    fn parses_spot_item() {
        let id = Uuid::new_v4();
        let spot = item_to_spot(&spot_item(id)).unwrap();
        assert_eq!(spot.id, id);
        assert_eq!(spot.category, Category::Desert);
        assert_eq!(spot.upvotes, 3);
        assert_eq!(spot.photo_url, None);
        assert_eq!(spot.created_at, Utc.with_ymd_and_hms(2025, 8, 12, 10, 0, 0).unwrap());
    }

    #[test]
    fn corrupt_items_are_reported() {
        let mut item = spot_item(Uuid::new_v4());
        item.insert("category".into(), AttributeValue::S("volcano".into()));
        assert!(matches!(item_to_spot(&item), Err(RepoError::DataCorruption(_))));

        let mut item = spot_item(Uuid::new_v4());
        item.remove("title");
        assert!(matches!(item_to_spot(&item), Err(RepoError::DataCorruption(_))));
    }

    fn reason(code: &str) -> CancellationReason {
        CancellationReason::builder().code(code).build()
    }

    #[test]
    fn cancelled_upvote_maps_to_duplicate_or_missing_spot() {
        let spot_id = Uuid::new_v4();

        let duplicate = [reason("ConditionalCheckFailed"), reason("None")];
        assert!(matches!(
            upvote_rejection(&duplicate, spot_id, "u1"),
            Some(RepoError::DuplicateUpvote { spot_id: id, ref user_id }) if id == spot_id && user_id == "u1"
        ));

        let missing = [reason("None"), reason("ConditionalCheckFailed")];
        assert!(matches!(
            upvote_rejection(&missing, spot_id, "u1"),
            Some(RepoError::SpotNotFound(id)) if id == spot_id
        ));

        let conflict = [reason("TransactionConflict"), reason("None")];
        assert!(upvote_rejection(&conflict, spot_id, "u1").is_none());
        assert!(upvote_rejection(&[], spot_id, "u1").is_none());
    }

    #[test]
    fn earliest_prefers_oldest_then_lowest_id() {
        let mut a = Spot::new("a".into(), "".into(), 0.0, 0.0, None, Category::Sky);
        let mut b = a.clone();
        b.id = Uuid::new_v4();
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        a.created_at = t;
        b.created_at = t;
        let expected = if a.id < b.id { a.id } else { b.id };
        assert_eq!(earliest(vec![a.clone(), b.clone()]).unwrap().id, expected);

        b.created_at = t - chrono::Duration::seconds(1);
        assert_eq!(earliest(vec![a, b.clone()]).unwrap().id, b.id);
        assert!(earliest(Vec::new()).is_none());
    }
}
