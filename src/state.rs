use std::sync::Arc;

use crate::config::Config;
use crate::email::Mailer;
use crate::rate_limit::RouteRateLimiter;
use crate::store::Store;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Config,
    pub mailer: Option<Arc<dyn Mailer>>,
    pub limiter: Arc<RouteRateLimiter>,
}
