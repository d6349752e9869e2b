use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::{
    auth::bootstrap_admin,
    config::Config,
    db::Database,
    lifecycle::RequestManager,
    notify::{LogMailer, Mailer, Notifier},
    questions::QuestionManager,
    session::SessionIssuer,
};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub db: Arc<Database>,
    pub sessions: SessionIssuer,
    pub notifier: Notifier,
    pub requests: RequestManager,
    pub questions: QuestionManager,
}

impl AppState {
    /// Opens the configured database, seeds the bootstrap admin if one is
    /// configured and wires up the managers with the logging mailer.
    pub fn new(config: Config) -> Result<SharedState> {
        let db = Database::open(&config.database_path).with_context(|| {
            format!("Failed to open database {}", config.database_path.display())
        })?;

        if let Some(seed) = &config.bootstrap_admin {
            bootstrap_admin(&db, seed, config.bcrypt_cost)?;
        }

        info!(path = %config.database_path.display(), "Database ready");
        Ok(Self::with_parts(config, Arc::new(db), Arc::new(LogMailer)))
    }

    /// Builds the state around an existing database and mailer.
    pub fn with_parts(config: Config, db: Arc<Database>, mailer: Arc<dyn Mailer>) -> SharedState {
        let sessions = SessionIssuer::new(&config.jwt_secret, config.session_ttl);
        let notifier = Notifier::new(mailer, config.email_from.clone());

        Arc::new(Self {
            requests: RequestManager::new(Arc::clone(&db), notifier.clone()),
            questions: QuestionManager::new(Arc::clone(&db)),
            config,
            db,
            sessions,
            notifier,
        })
    }
}
