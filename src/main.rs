use stargaze_backend::{
    aws_clients::AwsClients,
    config::{Config, PhotoStorageConfig},
    domain::FileStorage,
    errors::AppError,
    repositories::DynamoDbSpotRepository,
    routes::create_router,
    satellite::N2yoClient,
    spots::SpotService,
    startup::init_resources,
    storage::{LocalFileStorage, S3FileStorage},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "stargaze_backend=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(bind_address = %config.bind_address, "Configuration loaded");

    let aws = AwsClients::connect(&config).await;
    init_resources(
        &aws.dynamodb,
        &aws.s3,
        &config.tables,
        &config.photo_storage,
        &config.aws_region,
    )
    .await?;

    let storage: Arc<dyn FileStorage> = match &config.photo_storage {
        PhotoStorageConfig::Local { static_dir } => Arc::new(LocalFileStorage::new(static_dir.clone())),
        PhotoStorageConfig::S3 { bucket_name } => {
            Arc::new(S3FileStorage::new(aws.s3.clone(), bucket_name.clone()))
        }
    };
    let repo = Arc::new(DynamoDbSpotRepository::new(aws.dynamodb.clone(), config.tables.clone()));

    if config.satellite.api_key.is_none() {
        tracing::warn!("N2YO_API_KEY is not set; /events/visible-passes will answer 503");
    }

    let state = Arc::new(AppState {
        spots: SpotService::new(repo, storage.clone()),
        storage,
        passes: Arc::new(N2yoClient::new(&config.satellite)),
        satellite: config.satellite.clone(),
    });

    let app = create_router(state, config.max_upload_bytes);

    tracing::info!("Server listening on http://{}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
