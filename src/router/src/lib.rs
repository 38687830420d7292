use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use catalog::ObjectCatalog;
use common::config::Configuration;
use oracle::ReferenceOracle;
use std::sync::Arc;
use sweeper::Sweeper;
use tower_http::trace::TraceLayer;

pub mod endpoints;

pub trait RouterState: std::fmt::Debug + Clone + Send + Sync + 'static {
    fn catalog(&self) -> &ObjectCatalog;
    fn oracle(&self) -> &Arc<dyn ReferenceOracle>;
    fn sweeper(&self) -> &Sweeper;
    fn config(&self) -> &Configuration;
}

/// AppState holds the shared collaborators accessed by route handlers
#[derive(Clone)]
pub struct AppState {
    catalog: Arc<ObjectCatalog>,
    oracle: Arc<dyn ReferenceOracle>,
    sweeper: Arc<Sweeper>,
    config: Configuration,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("catalog", &"ObjectCatalog")
            .field("oracle", &"ReferenceOracle")
            .field("sweeper", &"Sweeper")
            .field("config", &"Configuration")
            .finish()
    }
}

impl AppState {
    /// Build the shared state from configuration and a connected oracle.
    ///
    /// The catalog and the sweeper share one object store handle so a bulk
    /// delete is always visible to the next listing.
    pub fn new(config: Configuration, oracle: Arc<dyn ReferenceOracle>) -> anyhow::Result<Self> {
        let store = common::storage::create_object_store(&config.storage)?;
        Ok(Self::with_store(config, oracle, store))
    }

    /// Build the shared state around an existing object store handle.
    pub fn with_store(
        config: Configuration,
        oracle: Arc<dyn ReferenceOracle>,
        store: Arc<dyn object_store::ObjectStore>,
    ) -> Self {
        let catalog = Arc::new(ObjectCatalog::new(
            Arc::clone(&store),
            config.storage.public_url.clone(),
            config.admin.request_timeout,
        ));
        let sweeper = Arc::new(Sweeper::new(
            store,
            config.admin.delete_concurrency,
            config.admin.request_timeout,
        ));

        Self {
            catalog,
            oracle,
            sweeper,
            config,
        }
    }
}

impl RouterState for AppState {
    fn catalog(&self) -> &ObjectCatalog {
        &self.catalog
    }

    fn oracle(&self) -> &Arc<dyn ReferenceOracle> {
        &self.oracle
    }

    fn sweeper(&self) -> &Sweeper {
        &self.sweeper
    }

    fn config(&self) -> &Configuration {
        &self.config
    }
}

/// Create a new router instance with all routes configured
pub fn create_router<S: RouterState>(state: S) -> Router {
    Router::new()
        // Public health check endpoint
        .route("/health", get(health_check))
        .nest("/upload-admin", endpoints::files::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
