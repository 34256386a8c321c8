use std::sync::Arc;

use crate::{
    core::{aliases::DbPool, config::Config},
    passes::PassCodec,
};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub http_client: reqwest::Client,
    pub passes: PassCodec,
    pub config: Arc<Config>,
}
