use crate::{config::{PhotoStorageConfig, TableNames}, errors::AppError, storage::UPLOAD_PREFIX};
use aws_sdk_dynamodb::{
    types::{AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType},
    Client as DynamoDbClient, error::SdkError as DynamoSdkError,
};
use aws_sdk_s3::{
    types::{BucketLocationConstraint, CreateBucketConfiguration},
    Client as S3Client, error::SdkError as S3SdkError,
};
use backoff::{future::retry, ExponentialBackoff};
use std::time::Duration;
use tracing;

/// Key layout of one table: hash key plus optional range key, all strings.
struct TableSpec<'a> {
    name: &'a str,
    hash_key: &'a str,
    range_key: Option<&'a str>,
}

fn table_specs(tables: &TableNames) -> [TableSpec<'_>; 3] {
    [
        TableSpec { name: &tables.spots, hash_key: "id", range_key: None },
        // (spot_id, user_id) is the one-upvote-per-user constraint.
        TableSpec { name: &tables.upvotes, hash_key: "spot_id", range_key: Some("user_id") },
        TableSpec { name: &tables.comments, hash_key: "spot_id", range_key: Some("sort_key") },
    ]
}

fn string_attribute(name: &str) -> Result<AttributeDefinition, AppError> {
    AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(ScalarAttributeType::S)
        .build()
        .map_err(|e| AppError::InitError(format!("Failed to build attribute definition: {}", e)))
}

fn key_element(name: &str, key_type: KeyType) -> Result<KeySchemaElement, AppError> {
    KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()
        .map_err(|e| AppError::InitError(format!("Failed to build key schema: {}", e)))
}

/// Outcome of one attempt; only transport-level failures are worth retrying.
enum Attempt {
    Done,
    Transient(String),
    Fatal(String),
}

async fn try_create_table(client: &DynamoDbClient, spec: &TableSpec<'_>) -> Result<Attempt, AppError> {
    let mut request = client
        .create_table()
        .table_name(spec.name)
        .attribute_definitions(string_attribute(spec.hash_key)?)
        .key_schema(key_element(spec.hash_key, KeyType::Hash)?)
        .billing_mode(BillingMode::PayPerRequest);
    if let Some(range_key) = spec.range_key {
        request = request
            .attribute_definitions(string_attribute(range_key)?)
            .key_schema(key_element(range_key, KeyType::Range)?);
    }

    Ok(match request.send().await {
        Ok(_) => {
            tracing::info!("Startup: Table '{}' created.", spec.name);
            Attempt::Done
        }
        Err(DynamoSdkError::ServiceError(service_err)) => {
            if service_err.err().is_resource_in_use_exception() {
                tracing::info!("Startup: Table '{}' already exists, no action needed.", spec.name);
                Attempt::Done
            } else {
                Attempt::Fatal(format!("Service error creating DynamoDB table '{}': {:?}", spec.name, service_err.err()))
            }
        }
        Err(e) => Attempt::Transient(format!("SDK error creating DynamoDB table '{}': {}", spec.name, e)),
    })
}

/// Creates the DynamoDB table if it doesn't exist, retrying while the endpoint is unreachable.
async fn create_table_if_not_exists(client: &DynamoDbClient, spec: &TableSpec<'_>) -> Result<(), AppError> {
    retry(startup_backoff(), move || async move {
        let attempt = match try_create_table(client, spec).await {
            Ok(attempt) => attempt,
            Err(e) => return Err(backoff::Error::permanent(e)),
        };
        match attempt {
            Attempt::Done => Ok(()),
            Attempt::Transient(msg) => {
                tracing::warn!("Startup: {}; retrying", msg);
                Err(backoff::Error::transient(AppError::InitError(msg)))
            }
            Attempt::Fatal(msg) => {
                tracing::error!("Startup: {}", msg);
                Err(backoff::Error::permanent(AppError::InitError(msg)))
            }
        }
    })
    .await
}

fn startup_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        max_elapsed_time: Some(Duration::from_secs(60)),
        ..ExponentialBackoff::default()
    }
}

/// Ensures the S3 bucket exists, creating it with the correct location constraint if needed.
async fn ensure_s3_bucket_exists(client: &S3Client, bucket_name: &str, region_str: &str) -> Result<(), AppError> {
    let mut create_bucket_req_builder = client.create_bucket().bucket(bucket_name);
    if region_str != "us-east-1" {
        create_bucket_req_builder = create_bucket_req_builder.create_bucket_configuration(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(region_str))
                .build(),
        );
    }

    match create_bucket_req_builder.send().await {
        Ok(_) => {
            tracing::info!("Startup: S3 bucket '{}' created.", bucket_name);
            Ok(())
        }
        Err(sdk_err) => {
            if let S3SdkError::ServiceError(service_err) = &sdk_err {
                let code = service_err.err().meta().code();
                if code == Some("BucketAlreadyOwnedByYou") || code == Some("BucketAlreadyExists") {
                    tracing::info!("Startup: S3 bucket '{}' already exists.", bucket_name);
                    return Ok(());
                }
            }
            let context = format!("Startup: Error creating S3 bucket '{}'", bucket_name);
            tracing::error!("{}: {}", context, sdk_err);
            Err(AppError::InitError(format!("{}: {}", context, sdk_err)))
        }
    }
}

/// Creates the spot tables and prepares photo storage.
pub async fn init_resources(
    db_client: &DynamoDbClient,
    s3_client: &S3Client,
    tables: &TableNames,
    photo_storage: &PhotoStorageConfig,
    region_str: &str,
) -> Result<(), AppError> {
    tracing::info!("Startup: Initializing resources...");
    for spec in table_specs(tables).iter() {
        create_table_if_not_exists(db_client, spec).await?;
    }

    match photo_storage {
        PhotoStorageConfig::S3 { bucket_name } => {
            ensure_s3_bucket_exists(s3_client, bucket_name, region_str).await?
        }
        PhotoStorageConfig::Local { static_dir } => {
            let uploads = static_dir.join(UPLOAD_PREFIX);
            tokio::fs::create_dir_all(&uploads).await.map_err(|e| {
                AppError::InitError(format!("Failed to create upload directory '{}': {}", uploads.display(), e))
            })?;
            tracing::info!(path = %uploads.display(), "Startup: Local upload directory ready.");
        }
    }

    tracing::info!("Startup: Resource initialization complete.");
    Ok(())
}
