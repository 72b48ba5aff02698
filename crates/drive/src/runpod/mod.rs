//! RunPod command execution proxy
//!
//! Runs shell commands on a pod so a [`RemoteFileSource`] can enumerate
//! and read its output directory.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.
//!
//! [`RemoteFileSource`]: crate::source::RemoteFileSource

use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Result of a remote command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// "success" when the command ran and exited cleanly
    pub status: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl CommandOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            output: String::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Error text, falling back to whatever the command printed
    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or(&self.output)
    }
}

/// Anything that can run a shell command on the host holding the files
pub trait CommandExecutor: Send + Sync {
    /// Transport failures are reported as [`SourceError::Unreachable`]
    fn execute(&self, command: &str) -> Result<CommandOutput, SourceError>;
}

/// RunPod API client
pub struct RunPodClient {
    api_key: String,
    pod_id: String,
}

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    command: &'a str,
}

impl RunPodClient {
    const BASE_URL: &'static str = "https://api.runpod.io/v2";

    pub fn new(api_key: impl Into<String>, pod_id: impl Into<String>) -> anyhow::Result<Self> {
        let api_key = api_key.into();
        let pod_id = pod_id.into();
        if api_key.trim().is_empty() {
            anyhow::bail!("RunPod API key not provided");
        }
        if pod_id.trim().is_empty() {
            anyhow::bail!("RunPod pod id not provided");
        }
        Ok(Self { api_key, pod_id })
    }

    pub fn pod_id(&self) -> &str {
        &self.pod_id
    }
}

impl CommandExecutor for RunPodClient {
    fn execute(&self, command: &str) -> Result<CommandOutput, SourceError> {
        let url = format!("{}/pod/{}/execute", Self::BASE_URL, self.pod_id);

        let mut response = ureq::post(&url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(ExecuteRequest { command })
            .map_err(|e| classify(e, &self.pod_id))?;

        response
            .body_mut()
            .read_json()
            .map_err(|e| SourceError::Unreachable(format!("bad execute response: {}", e)))
    }
}

/// Map a ureq failure onto the source error taxonomy
///
/// Only transport problems and server-side overload are worth retrying;
/// a rejected API key will be rejected again.
fn classify(err: ureq::Error, pod_id: &str) -> SourceError {
    match err {
        ureq::Error::StatusCode(code) => {
            let message = format!("pod {}: HTTP {}", pod_id, code);
            match code {
                401 | 403 => SourceError::Auth(message),
                408 | 429 => SourceError::Unreachable(message),
                c if c >= 500 => SourceError::Unreachable(message),
                _ => SourceError::Rejected(message),
            }
        }
        other => SourceError::Unreachable(format!("pod {}: {}", pod_id, other)),
    }
}

/// Quote a value for safe interpolation into a POSIX shell command
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/workspace/out"), "'/workspace/out'");
        assert_eq!(shell_quote("it's.png"), r"'it'\''s.png'");
    }

    #[test]
    fn test_parse_execute_response() {
        let json = r#"{"status":"success","output":"hello\n"}"#;
        let out: CommandOutput = serde_json::from_str(json).unwrap();
        assert!(out.is_success());
        assert_eq!(out.output, "hello\n");

        let json = r#"{"status":"error","error":"pod not running"}"#;
        let out: CommandOutput = serde_json::from_str(json).unwrap();
        assert!(!out.is_success());
        assert_eq!(out.error_text(), "pod not running");
    }

    #[test]
    fn test_status_classification() {
        use crate::error::Retryable;

        let auth = classify(ureq::Error::StatusCode(401), "pod-1");
        assert!(matches!(auth, SourceError::Auth(_)));
        assert!(!auth.is_transient());
        assert!(matches!(
            classify(ureq::Error::StatusCode(403), "pod-1"),
            SourceError::Auth(_)
        ));
        assert!(matches!(
            classify(ureq::Error::StatusCode(404), "pod-1"),
            SourceError::Rejected(_)
        ));
        assert!(classify(ureq::Error::StatusCode(429), "pod-1").is_transient());
        assert!(classify(ureq::Error::StatusCode(502), "pod-1").is_transient());
        assert!(classify(ureq::Error::ConnectionFailed, "pod-1").is_transient());
    }

    #[test]
    fn test_client_requires_credentials() {
        assert!(RunPodClient::new("", "pod").is_err());
        assert!(RunPodClient::new("key", " ").is_err());
        assert_eq!(RunPodClient::new("key", "pod-1").unwrap().pod_id(), "pod-1");
    }
}
