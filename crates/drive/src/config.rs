//! OAuth client credentials for Google Drive
//!
//! Which credentials to use is decided during settings resolution as a
//! [`ClientSource`]; they are only read from disk or the environment when
//! the Drive client is built.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Client secrets file looked for in the working directory
pub const LOCAL_CREDENTIALS_FILE: &str = "credentials.json";

/// Client secrets file looked for in the Courier config directory
const CONFIG_CREDENTIALS_FILE: &str = "google-credentials.json";

const CLIENT_ID_VAR: &str = "GOOGLE_CLIENT_ID";
const CLIENT_SECRET_VAR: &str = "GOOGLE_CLIENT_SECRET";

/// OAuth client for Drive API access
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Where the OAuth client comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientSource {
    /// Given directly in the settings file
    Inline(GoogleCredentials),
    /// A client secrets file downloaded from Google Cloud Console
    File(PathBuf),
    /// Environment, then `./credentials.json`, then the config directory
    Discover,
}

/// Google Cloud Console credential file format
#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

#[derive(Deserialize)]
struct ClientSecrets {
    client_id: String,
    client_secret: String,
}

impl GoogleCredentials {
    /// Build from a pair of values, treating blank ones as absent
    pub fn from_pair(client_id: Option<&str>, client_secret: Option<&str>) -> Option<Self> {
        let client_id = client_id.map(str::trim).filter(|v| !v.is_empty())?;
        let client_secret = client_secret.map(str::trim).filter(|v| !v.is_empty())?;
        Some(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    /// Read a client secrets file (`installed` or `web` section)
    pub fn from_file(path: &Path) -> Result<Self> {
        let file: ClientSecretsFile = config::load_json_file(path)?;
        let secrets = file
            .installed
            .or(file.web)
            .with_context(|| format!("{} has no 'installed' or 'web' section", path.display()))?;
        Ok(Self {
            client_id: secrets.client_id,
            client_secret: secrets.client_secret,
        })
    }

    fn from_env() -> Option<Self> {
        let client_id = std::env::var(CLIENT_ID_VAR).ok();
        let client_secret = std::env::var(CLIENT_SECRET_VAR).ok();
        Self::from_pair(client_id.as_deref(), client_secret.as_deref())
    }
}

impl ClientSource {
    /// Resolve to concrete credentials
    pub fn load(&self) -> Result<GoogleCredentials> {
        match self {
            ClientSource::Inline(creds) => Ok(creds.clone()),
            ClientSource::File(path) => GoogleCredentials::from_file(path),
            ClientSource::Discover => {
                if let Some(creds) = GoogleCredentials::from_env() {
                    return Ok(creds);
                }
                for path in Self::discovery_paths() {
                    if path.exists() {
                        return GoogleCredentials::from_file(&path);
                    }
                }
                bail!(
                    "no OAuth client configured; set {} and {}, or place a client secrets file at {}",
                    CLIENT_ID_VAR,
                    CLIENT_SECRET_VAR,
                    Self::discovery_paths()
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(" or ")
                )
            }
        }
    }

    /// Client secrets files tried by [`ClientSource::Discover`], in order
    pub fn discovery_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CREDENTIALS_FILE)];
        paths.extend(config::config_path(CONFIG_CREDENTIALS_FILE));
        paths
    }
}
