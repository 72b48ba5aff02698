//! Google Drive OAuth2 sign-in and token cache
//!
//! Courier usually runs on a headless pod, so sign-in has two modes. The
//! browser mode opens the consent page locally and catches the redirect on
//! a loopback port. The console mode prints the consent URL and reads the
//! redirected address (or the bare code) from stdin. `Auto` tries the
//! browser first and drops to the console when no browser opens or the
//! redirect never arrives.

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::GoogleCredentials;

/// Token cache in the working directory when `token_file` is not set
pub const DEFAULT_TOKEN_FILE: &str = "token.json";

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Full Drive scope; needed to see files in folders we did not create
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Loopback ports tried for the browser redirect
const CALLBACK_PORTS: std::ops::RangeInclusive<u16> = 8080..=8090;

/// Redirect target shown in console mode; nothing needs to listen there
const CONSOLE_REDIRECT: &str = "http://localhost:8080";

/// How long the browser mode waits for the redirect before giving up
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

/// Seconds before expiry at which a cached token is treated as stale
const EXPIRY_MARGIN_SECS: i64 = 300;

/// How the user completes the consent step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignInMode {
    /// Browser with loopback redirect, falling back to console
    #[default]
    Auto,
    /// Print the URL and read the code from stdin
    Console,
}

/// Token as cached on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedToken {
    access_token: String,
    refresh_token: Option<String>,
    /// Unix seconds
    expires_at: Option<i64>,
}

impl CachedToken {
    /// Build from a token endpoint response; `previous_refresh` is kept
    /// when Google omits the refresh token, as it does on refresh
    fn issued(response: TokenResponse, previous_refresh: Option<&str>, now: i64) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at: response.expires_in.map(|secs| now + secs as i64),
        }
    }

    /// Usable without a refresh; tokens with no known expiry are not trusted
    fn is_fresh(&self, now: i64) -> bool {
        self.expires_at
            .is_some_and(|at| at > now + EXPIRY_MARGIN_SECS)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

/// OAuth2 client plus the token cache it maintains
pub struct DriveAuth {
    credentials: GoogleCredentials,
    token_path: PathBuf,
    mode: SignInMode,
}

impl DriveAuth {
    pub fn new(credentials: GoogleCredentials, token_path: PathBuf, mode: SignInMode) -> Self {
        Self {
            credentials,
            token_path,
            mode,
        }
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Whether a token cache exists that may avoid interactive sign-in
    pub fn has_cached_token(&self) -> bool {
        self.load_token().is_some()
    }

    /// A valid access token, signing in interactively if the cache cannot
    /// provide one
    pub fn get_access_token(&self) -> Result<String> {
        if let Some(token) = self.cached_access_token()? {
            return Ok(token);
        }

        let token = self.sign_in()?;
        self.store_token(&token)?;
        Ok(token.access_token)
    }

    /// A valid access token from the cache, refreshing it when stale
    ///
    /// `None` means interactive sign-in is required.
    fn cached_access_token(&self) -> Result<Option<String>> {
        let Some(token) = self.load_token() else {
            return Ok(None);
        };
        let now = chrono::Utc::now().timestamp();
        if token.is_fresh(now) {
            return Ok(Some(token.access_token));
        }
        let Some(refresh_token) = token.refresh_token else {
            return Ok(None);
        };

        match self.refresh(&refresh_token) {
            Ok(token) => {
                self.store_token(&token)?;
                Ok(Some(token.access_token))
            }
            Err(e) => {
                warn!("Token refresh failed, signing in again: {:#}", e);
                Ok(None)
            }
        }
    }

    fn sign_in(&self) -> Result<CachedToken> {
        match self.mode {
            SignInMode::Console => self.console_sign_in(),
            SignInMode::Auto => self.browser_sign_in().or_else(|e| {
                warn!("Browser sign-in unavailable: {:#}", e);
                self.console_sign_in()
            }),
        }
    }

    fn browser_sign_in(&self) -> Result<CachedToken> {
        let (listener, port) = bind_callback()?;
        let redirect_uri = format!("http://localhost:{}", port);
        let consent_url = self.consent_url(&redirect_uri);

        open::that(&consent_url).context("Failed to open a browser")?;
        println!("\nOpened a browser for Google Drive sign-in.");
        println!("If it did not appear, visit:\n\n{}\n", consent_url);

        let code = wait_for_redirect(&listener, CALLBACK_TIMEOUT)?;
        self.exchange(&code, &redirect_uri)
    }

    fn console_sign_in(&self) -> Result<CachedToken> {
        let consent_url = self.consent_url(CONSOLE_REDIRECT);
        println!("\nTo authorize Google Drive access, visit:\n\n{}\n", consent_url);
        println!("After approving, the browser is sent to a localhost address that may fail to load.");
        print!("Paste that address (or just the code) here: ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin()
            .lock()
            .read_line(&mut input)
            .context("Failed to read authorization code")?;
        let code = extract_code(&input)?;
        self.exchange(&code, CONSOLE_REDIRECT)
    }

    fn consent_url(&self, redirect_uri: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            AUTH_URL,
            urlencoding::encode(&self.credentials.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(DRIVE_SCOPE),
        )
    }

    fn exchange(&self, code: &str, redirect_uri: &str) -> Result<CachedToken> {
        let mut response = ureq::post(TOKEN_URL)
            .send_form([
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
            ])
            .context("Failed to exchange authorization code")?;
        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;

        println!("Google Drive sign-in complete.\n");
        Ok(CachedToken::issued(token, None, chrono::Utc::now().timestamp()))
    }

    fn refresh(&self, refresh_token: &str) -> Result<CachedToken> {
        let mut response = ureq::post(TOKEN_URL)
            .send_form([
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .context("Failed to refresh access token")?;
        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse refresh response")?;

        Ok(CachedToken::issued(
            token,
            Some(refresh_token),
            chrono::Utc::now().timestamp(),
        ))
    }

    fn load_token(&self) -> Option<CachedToken> {
        if !self.token_path.exists() {
            return None;
        }
        match config::load_json_file(&self.token_path) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Ignoring unreadable token cache: {:#}", e);
                None
            }
        }
    }

    fn store_token(&self, token: &CachedToken) -> Result<()> {
        config::save_json_file(&self.token_path, token)?;
        debug!("Saved Drive token to {}", self.token_path.display());
        Ok(())
    }
}

fn bind_callback() -> Result<(TcpListener, u16)> {
    for port in CALLBACK_PORTS {
        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
            return Ok((listener, port));
        }
    }
    bail!(
        "no free loopback port in {}-{}",
        CALLBACK_PORTS.start(),
        CALLBACK_PORTS.end()
    )
}

/// Accept the browser redirect, answer it, and return the code
fn wait_for_redirect(listener: &TcpListener, timeout: Duration) -> Result<String> {
    listener.set_nonblocking(true)?;
    let deadline = Instant::now() + timeout;
    let mut stream = loop {
        match listener.accept() {
            Ok((stream, _)) => break stream,
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    bail!("no redirect received within {:?}", timeout);
                }
                std::thread::sleep(Duration::from_millis(200));
            }
            Err(e) => return Err(e).context("Failed to accept redirect"),
        }
    };
    stream.set_nonblocking(false)?;

    let mut request_line = String::new();
    BufReader::new(&stream)
        .read_line(&mut request_line)
        .context("Failed to read redirect")?;
    let target = request_line.split_whitespace().nth(1).unwrap_or_default();
    let code = code_from_redirect(target);
    answer_redirect(&mut stream, code.is_ok());
    code
}

fn answer_redirect(stream: &mut TcpStream, ok: bool) {
    let (status, body) = if ok {
        ("200 OK", "Courier is signed in to Google Drive. You can close this window.")
    } else {
        ("400 Bad Request", "Sign-in failed. Check the Courier console.")
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
        status, body
    );
    stream.write_all(response.as_bytes()).ok();
}

/// Pull the authorization code out of a redirect URL or path
fn code_from_redirect(target: &str) -> Result<String> {
    let query = target.split_once('?').map(|(_, q)| q).unwrap_or(target);
    let query = query.split('#').next().unwrap_or_default();
    let param = |key: &str| {
        query.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            (k == key).then(|| {
                urlencoding::decode(v).map_or_else(|_| v.to_string(), |d| d.into_owned())
            })
        })
    };

    if let Some(err) = param("error") {
        bail!("authorization denied: {}", err);
    }
    param("code")
        .filter(|c| !c.is_empty())
        .context("no authorization code in redirect")
}

/// Accept either the pasted redirect address or the bare code
fn extract_code(input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        bail!("no authorization code entered");
    }
    if input.contains('?') || input.contains("code=") || input.contains("error=") {
        return code_from_redirect(input);
    }
    if input.contains(char::is_whitespace) {
        bail!("authorization code must not contain spaces");
    }
    Ok(input.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(token_path: PathBuf) -> DriveAuth {
        let credentials = GoogleCredentials {
            client_id: "id".into(),
            client_secret: "secret".into(),
        };
        DriveAuth::new(credentials, token_path, SignInMode::Console)
    }

    #[test]
    fn test_code_from_redirect_path() {
        let code = code_from_redirect("/?code=4%2F0Abc&scope=https://www.googleapis.com/auth/drive");
        assert_eq!(code.unwrap(), "4/0Abc");
    }

    #[test]
    fn test_code_from_redirect_error() {
        let err = code_from_redirect("/?error=access_denied").unwrap_err();
        assert!(err.to_string().contains("access_denied"));
        assert!(code_from_redirect("/favicon.ico").is_err());
    }

    #[test]
    fn test_extract_code_from_pasted_address() {
        let pasted = "http://localhost:8080/?code=4%2F0Xyz&scope=drive\n";
        assert_eq!(extract_code(pasted).unwrap(), "4/0Xyz");
    }

    #[test]
    fn test_extract_bare_code() {
        assert_eq!(extract_code("  4/0Xyz-123 \r\n").unwrap(), "4/0Xyz-123");
        assert!(extract_code("\n").is_err());
        assert!(extract_code("two words").is_err());
    }

    #[test]
    fn test_token_freshness() {
        let now = 1_700_000_000;
        let token = |expires_at| CachedToken {
            access_token: "a".into(),
            refresh_token: None,
            expires_at,
        };
        assert!(token(Some(now + 3600)).is_fresh(now));
        assert!(!token(Some(now + 60)).is_fresh(now));
        assert!(!token(None).is_fresh(now));
    }

    #[test]
    fn test_refresh_keeps_previous_refresh_token() {
        let response = TokenResponse {
            access_token: "new".into(),
            refresh_token: None,
            expires_in: Some(3600),
        };
        let token = CachedToken::issued(response, Some("keep-me"), 100);
        assert_eq!(token.refresh_token.as_deref(), Some("keep-me"));
        assert_eq!(token.expires_at, Some(3700));
    }

    #[test]
    fn test_fresh_cached_token_used_without_sign_in() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token.json");
        let auth = auth(path.clone());
        assert!(!auth.has_cached_token());

        let token = CachedToken {
            access_token: "cached".into(),
            refresh_token: None,
            expires_at: Some(chrono::Utc::now().timestamp() + 3600),
        };
        auth.store_token(&token).unwrap();

        assert!(auth.has_cached_token());
        assert_eq!(auth.get_access_token().unwrap(), "cached");
    }

    #[test]
    fn test_stale_token_without_refresh_needs_sign_in() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, r#"{"access_token":"old","refresh_token":null,"expires_at":1}"#)
            .unwrap();

        let auth = auth(path);
        assert!(auth.has_cached_token());
        assert!(auth.cached_access_token().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_cache_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(!auth(path).has_cached_token());
    }

    #[test]
    fn test_sign_in_mode_names() {
        let mode: SignInMode = serde_json::from_str(r#""console""#).unwrap();
        assert_eq!(mode, SignInMode::Console);
        assert_eq!(SignInMode::default(), SignInMode::Auto);
    }
}
