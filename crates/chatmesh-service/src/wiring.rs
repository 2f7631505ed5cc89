//! Collaborator wiring shared by every binary: constructs the concrete
//! adapters behind each `chatmesh-core` trait and hands back a bundle any
//! binary can destructure what it needs from.
//!
//! This reference topology runs one `InMemoryBus`/`InMemoryHotCache` per
//! process (see `chatmesh_infra::bus`/`chatmesh_infra::cache` module docs);
//! the seven binaries cooperate through SQLite/LanceDB and the Anthropic
//! API, not through these two adapters, so each binary calls `build` on its
//! own and the in-memory bus/cache fields are only useful within that one
//! process (the Generator's own tool-calling loop, its own idempotency
//! checks). See `DESIGN.md` for the accepted limitation this implies for
//! genuine multi-process cooperation.

use std::path::Path;
use std::sync::Arc;

use chatmesh_core::bus::SessionGuard;
use chatmesh_core::llm::box_provider::BoxLlmProvider;
use chatmesh_core::memory::BoxEmbedder;
use chatmesh_types::config::SharedConfig;
use chatmesh_types::config::subscriptions::{HISTORY_WRITER, MEMORY_WRITER};
use chatmesh_infra::bus::InMemoryBus;
use chatmesh_infra::cache::InMemoryHotCache;
use chatmesh_infra::llm::anthropic::AnthropicProvider;
use chatmesh_infra::sqlite::{DatabasePool, SqliteConversationStore, SqliteUserProfileStore};
use chatmesh_infra::users::InMemoryUserDirectory;
use chatmesh_infra::vector::{FastEmbedEmbedder, LanceSummaryStore};
use secrecy::SecretString;

/// Every collaborator a binary might need, already wired behind its trait.
/// Individual binaries borrow the fields they use and drop the rest.
#[derive(Clone)]
pub struct Collaborators {
    pub config: SharedConfig,
    pub bus: Arc<InMemoryBus>,
    pub cache: Arc<InMemoryHotCache>,
    pub conversations: Arc<SqliteConversationStore>,
    pub profiles: Arc<SqliteUserProfileStore>,
    pub summaries: Arc<LanceSummaryStore>,
    pub embedder: Arc<BoxEmbedder>,
    pub provider: Arc<BoxLlmProvider>,
    pub users: Arc<InMemoryUserDirectory>,
    pub session_guard: Arc<SessionGuard>,
}

impl Collaborators {
    /// Open the SQLite/LanceDB stores under `data_dir` (creating it if
    /// missing), construct the Anthropic provider from `ANTHROPIC_API_KEY`,
    /// and build the reference in-memory bus/cache/user-directory adapters.
    pub async fn build(config: SharedConfig, data_dir: &Path) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|e| anyhow::anyhow!("creating data dir {}: {e}", data_dir.display()))?;

        let database_url = match &config.document_store_path {
            Some(path) => format!("sqlite://{path}"),
            None => format!("sqlite://{}/chatmesh.db", data_dir.display()),
        };
        let pool = DatabasePool::new(&database_url)
            .await
            .map_err(|e| anyhow::anyhow!("opening database pool: {e}"))?;
        let conversations = Arc::new(SqliteConversationStore::new(pool.clone()));
        let profiles = Arc::new(SqliteUserProfileStore::new(pool));

        let lance_uri = data_dir.join("memories.lance");
        let summaries = Arc::new(LanceSummaryStore::new(lance_uri.to_string_lossy().into_owned()));

        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY must be set"))?;
        let provider = Arc::new(BoxLlmProvider::new(AnthropicProvider::new(
            SecretString::from(api_key),
            config.model.clone(),
        )));

        let embedder = Arc::new(BoxEmbedder::new(
            FastEmbedEmbedder::try_new().map_err(|e| anyhow::anyhow!("loading embedding model: {e}"))?,
        ));

        let bus = Arc::new(InMemoryBus::new(&[HISTORY_WRITER, MEMORY_WRITER]));
        let cache = Arc::new(InMemoryHotCache::new());

        let known_users = std::env::var("CHATMESH_KNOWN_USERS")
            .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect::<Vec<_>>())
            .unwrap_or_default();
        let users = Arc::new(InMemoryUserDirectory::new(known_users));

        let session_guard = Arc::new(SessionGuard::new());

        Ok(Self {
            config,
            bus,
            cache,
            conversations,
            profiles,
            summaries,
            embedder,
            provider,
            users,
            session_guard,
        })
    }
}
