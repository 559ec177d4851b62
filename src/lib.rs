pub mod aws_clients;
pub mod category;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod mock;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod satellite;
pub mod spots;
pub mod startup;
pub mod storage;

use crate::config::SatelliteConfig;
use crate::domain::{FileStorage, PassPredictor};
use crate::spots::SpotService;
use std::sync::Arc;

/// AppState holds shared resources for the web server.
pub struct AppState {
    pub spots: SpotService,
    pub storage: Arc<dyn FileStorage>,
    pub passes: Arc<dyn PassPredictor>,
    pub satellite: SatelliteConfig,
}
