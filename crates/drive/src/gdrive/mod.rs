//! Google Drive integration
//!
//! This module provides:
//! - OAuth2 sign-in with browser and console modes, plus token cache
//! - Drive v3 client implementing [`ObjectStore`](crate::store::ObjectStore)

mod auth;
mod client;

pub use auth::{DEFAULT_TOKEN_FILE, DriveAuth, SignInMode};
pub use client::DriveClient;

/// Drive v3 API response types
pub mod api {
    use serde::Deserialize;

    /// Response from `files.list`
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct FileList {
        pub files: Option<Vec<DriveFile>>,
        pub next_page_token: Option<String>,
    }

    /// File resource (only the fields we request)
    #[derive(Debug, Deserialize)]
    pub struct DriveFile {
        pub id: String,
        pub name: String,
    }
}
