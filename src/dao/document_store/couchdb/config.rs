use std::time::Duration;

use super::error::{CouchDaoError, CouchResult};

/// How long a `_changes` long-poll may stay open before CouchDB answers empty.
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime configuration describing how to reach the CouchDB database holding the documents.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Server URL, e.g. `http://localhost:5984`.
    pub base_url: String,
    /// Database holding every collection.
    pub database: String,
    /// Basic-auth user.
    pub username: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
    /// Maximum duration of one `_changes` long-poll.
    pub poll_timeout: Duration,
}

impl CouchConfig {
    /// Construct a configuration from explicit base URL and database name.
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            username: None,
            password: None,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Attach basic-auth credentials to the configuration.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Override the `_changes` long-poll window.
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Whether the environment asks for a CouchDB backend at all.
    pub fn requested() -> bool {
        std::env::var_os("COUCH_BASE_URL").is_some_and(|value| !value.is_empty())
    }

    /// Build a configuration by reading the expected environment variables.
    ///
    /// `COUCH_BASE_URL` and `COUCH_DB` are required; `COUCH_USERNAME`/`COUCH_PASSWORD`
    /// are only used together and `COUCH_POLL_TIMEOUT_MS` overrides the long-poll window.
    pub fn from_env() -> CouchResult<Self> {
        let base_url =
            std::env::var("COUCH_BASE_URL").map_err(|_| CouchDaoError::MissingEnvVar {
                var: "COUCH_BASE_URL",
            })?;
        let database = std::env::var("COUCH_DB")
            .map_err(|_| CouchDaoError::MissingEnvVar { var: "COUCH_DB" })?;

        let mut config = Self::new(base_url, database);

        if let (Some(username), Some(password)) = (
            std::env::var("COUCH_USERNAME").ok(),
            std::env::var("COUCH_PASSWORD").ok(),
        ) {
            config = config.with_credentials(username, password);
        }

        if let Ok(raw) = std::env::var("COUCH_POLL_TIMEOUT_MS") {
            let millis = raw
                .parse::<u64>()
                .map_err(|_| CouchDaoError::InvalidEnvVar {
                    var: "COUCH_POLL_TIMEOUT_MS",
                })?;
            config = config.with_poll_timeout(Duration::from_millis(millis));
        }

        Ok(config)
    }
}
