use std::sync::Arc;

use crate::gateway::Gateway;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub nats: Option<async_nats::Client>,
    pub gateway: Option<Arc<Gateway>>,
}
