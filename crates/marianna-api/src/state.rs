//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! The store is picked once at startup (SQLite when a database URL is
//! configured, in-memory otherwise) and handed to everything else behind
//! [`BoxConversationStore`], so no handler knows which backend is live.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use marianna_core::chat::box_store::BoxConversationStore;
use marianna_core::chat::memory::InMemoryConversationStore;
use marianna_core::chat::service::ChatService;
use marianna_core::delivery::orchestrator::{DeliveryOrchestrator, DeliveryWorker};
use marianna_core::llm::box_provider::BoxLlmProvider;
use marianna_core::persona::generator::PersonaResponder;
use marianna_infra::config::{apply_env_overrides, gemini_api_key, load_app_config, process_env};
use marianna_infra::filesystem::{resolve_data_dir, resolve_uploads_dir};
use marianna_infra::llm::create_provider;
use marianna_infra::media::UploadDir;
use marianna_infra::sqlite::conversation::SqliteConversationStore;
use marianna_infra::sqlite::pool::DatabasePool;
use marianna_types::config::AppConfig;

/// Chat service pinned to the type-erased store.
pub type ConcreteChatService = ChatService<BoxConversationStore>;

/// Which conversation store the process is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Sqlite => write!(f, "sqlite"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

/// Shared application state.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ConcreteChatService>,
    pub uploads: UploadDir,
    pub config: Arc<AppConfig>,
    pub data_dir: PathBuf,
    pub backend: StoreBackend,
}

/// Long-lived resources that need an orderly stop after the server exits.
pub struct Background {
    worker: DeliveryWorker,
    db_pool: Option<DatabasePool>,
}

impl Background {
    /// Drain pending persona turns, then close the database.
    pub async fn shutdown(self) {
        self.worker.shutdown().await;
        if let Some(pool) = self.db_pool {
            pool.close().await;
        }
    }
}

impl AppState {
    /// Initialize the application state: load config, open the store, start delivery.
    pub async fn init() -> anyhow::Result<(Self, Background)> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;

        let mut config = load_app_config(&data_dir).await;
        apply_env_overrides(&mut config, process_env);

        let (store, backend, db_pool) = match config.storage.database_url.as_deref() {
            Some(url) => {
                let pool = DatabasePool::new(url)
                    .await
                    .with_context(|| format!("failed to open database at {url}"))?;
                let store = BoxConversationStore::new(SqliteConversationStore::new(pool.clone()));
                (store, StoreBackend::Sqlite, Some(pool))
            }
            None => {
                info!("no database configured, conversations live in memory only");
                let store = BoxConversationStore::new(InMemoryConversationStore::new());
                (store, StoreBackend::Memory, None)
            }
        };

        let provider = create_provider(&config.generator, gemini_api_key(process_env))?;

        let uploads = UploadDir::new(
            resolve_uploads_dir(&data_dir, &config.storage),
            config.storage.max_upload_bytes,
        );
        uploads
            .ensure_exists()
            .await
            .with_context(|| format!("failed to create uploads dir {}", uploads.root().display()))?;

        let (state, worker) = Self::from_parts(config, data_dir, store, backend, provider, uploads);
        info!(backend = %state.backend, "application state ready");
        Ok((state, Background { worker, db_pool }))
    }

    /// Wire the chat service and delivery worker around an already-built
    /// store and provider.
    pub fn from_parts(
        config: AppConfig,
        data_dir: PathBuf,
        store: BoxConversationStore,
        backend: StoreBackend,
        provider: BoxLlmProvider,
        uploads: UploadDir,
    ) -> (Self, DeliveryWorker) {
        let store = Arc::new(store);

        let responder = PersonaResponder::new(
            provider,
            uploads.clone(),
            config.persona.clone(),
            config.generator.model.clone(),
            Duration::from_secs(config.generator.timeout_secs),
        );
        let orchestrator = DeliveryOrchestrator::new(
            Arc::clone(&store),
            responder,
            Duration::from_millis(config.delivery.delay_ms),
        );
        let (turns, worker) = orchestrator.start(config.delivery.queue_capacity);

        let state = Self {
            chat_service: Arc::new(ChatService::new(store, turns)),
            uploads,
            config: Arc::new(config),
            data_dir,
            backend,
        };
        (state, worker)
    }
}
