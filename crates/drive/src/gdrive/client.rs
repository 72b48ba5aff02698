//! Google Drive API HTTP client
//!
//! Provides folder-scoped existence checks, listing and multipart uploads.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use log::debug;
use std::path::Path;
use url::Url;

use super::DriveAuth;
use super::api::{DriveFile, FileList};
use crate::error::StoreError;
use crate::models::{FileHandle, FolderId};
use crate::store::ObjectStore;

/// Google Drive client scoped to the authenticated user
pub struct DriveClient {
    auth: DriveAuth,
}

impl DriveClient {
    const FILES_URL: &'static str = "https://www.googleapis.com/drive/v3/files";
    const UPLOAD_URL: &'static str = "https://www.googleapis.com/upload/drive/v3/files";

    /// Maximum page size accepted by `files.list`
    const PAGE_SIZE: usize = 1000;

    pub fn new(auth: DriveAuth) -> Self {
        Self { auth }
    }

    /// Obtain a token up front so auth problems surface at startup
    pub fn authenticate(&self) -> Result<(), StoreError> {
        self.access_token().map(|_| ())
    }

    fn access_token(&self) -> Result<String, StoreError> {
        self.auth
            .get_access_token()
            .map_err(|e| StoreError::Auth(format!("{:#}", e)))
    }

    /// Run a `files.list` query, returning one page
    fn list_page(
        &self,
        query: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<FileList, StoreError> {
        let access_token = self.access_token()?;

        let page_size = page_size.min(Self::PAGE_SIZE).to_string();
        let mut params = vec![
            ("q", query),
            ("fields", "nextPageToken, files(id, name)"),
            ("pageSize", page_size.as_str()),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        let url = Url::parse_with_params(Self::FILES_URL, &params)
            .map_err(|e| StoreError::Permanent(format!("invalid list url: {}", e)))?;

        let mut response = ureq::get(url.as_str())
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .map_err(|e| classify(e, "list files"))?;

        response
            .body_mut()
            .read_json()
            .map_err(|e| StoreError::Transient(format!("failed to parse file list: {}", e)))
    }
}

impl ObjectStore for DriveClient {
    fn exists(&self, folder: &FolderId, name: &str) -> Result<bool, StoreError> {
        let query = format!(
            "'{}' in parents and name = '{}' and trashed = false",
            escape_query(folder.as_str()),
            escape_query(name)
        );
        let page = self.list_page(&query, 1, None)?;
        Ok(page.files.is_some_and(|files| !files.is_empty()))
    }

    fn create(
        &self,
        folder: &FolderId,
        name: &str,
        content: &Path,
    ) -> Result<FileHandle, StoreError> {
        let data = std::fs::read(content).map_err(|e| {
            StoreError::Permanent(format!("cannot read {}: {}", content.display(), e))
        })?;
        let access_token = self.access_token()?;

        let boundary = format!(
            "courier_{}",
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );
        let body = multipart_body(&boundary, folder, name, &data)?;
        let url = format!(
            "{}?uploadType=multipart&supportsAllDrives=true&fields=id,name",
            Self::UPLOAD_URL
        );

        debug!("Uploading {} ({} bytes) to folder {}", name, data.len(), folder);
        let mut response = ureq::post(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .header(
                "Content-Type",
                &format!("multipart/related; boundary={}", boundary),
            )
            .send(&body[..])
            .map_err(|e| classify(e, "upload"))?;

        let file: DriveFile = response
            .body_mut()
            .read_json()
            .map_err(|e| StoreError::Transient(format!("failed to parse upload response: {}", e)))?;

        Ok(FileHandle::new(file.id, file.name, folder.clone()))
    }

    fn list(&self, folder: &FolderId) -> Result<Vec<FileHandle>, StoreError> {
        let query = format!(
            "'{}' in parents and trashed = false",
            escape_query(folder.as_str())
        );

        let mut handles = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.list_page(&query, Self::PAGE_SIZE, page_token.as_deref())?;

            if let Some(files) = page.files {
                handles.extend(
                    files
                        .into_iter()
                        .map(|f| FileHandle::new(f.id, f.name, folder.clone())),
                );
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(handles)
    }
}

/// Map a ureq failure onto the store error taxonomy
fn classify(err: ureq::Error, what: &str) -> StoreError {
    match err {
        ureq::Error::StatusCode(code) => classify_status(code, what),
        ureq::Error::Io(_)
        | ureq::Error::Timeout(_)
        | ureq::Error::HostNotFound
        | ureq::Error::ConnectionFailed => StoreError::Transient(format!("{}: {}", what, err)),
        other => StoreError::Permanent(format!("{}: {}", what, other)),
    }
}

fn classify_status(code: u16, what: &str) -> StoreError {
    let message = format!("{} failed with HTTP {}", what, code);
    match code {
        401 | 403 => StoreError::Auth(message),
        404 => StoreError::NotFound(message),
        408 | 429 => StoreError::Transient(message),
        c if c >= 500 => StoreError::Transient(message),
        _ => StoreError::Permanent(message),
    }
}

/// Escape a literal for use inside a single-quoted Drive query string
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Guess a MIME type from a file name's extension
fn content_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

/// Build a `multipart/related` upload body: JSON metadata then raw content
fn multipart_body(
    boundary: &str,
    folder: &FolderId,
    name: &str,
    data: &[u8],
) -> Result<Vec<u8>, StoreError> {
    let metadata = serde_json::json!({
        "name": name,
        "parents": [folder.as_str()],
    });
    let metadata = serde_json::to_string(&metadata)
        .map_err(|e| StoreError::Permanent(format!("cannot encode metadata: {}", e)))?;

    let mut body = Vec::with_capacity(data.len() + metadata.len() + 256);
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n--{b}\r\nContent-Type: {t}\r\n\r\n",
            b = boundary,
            m = metadata,
            t = content_type_for(name),
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    Ok(body)
}
