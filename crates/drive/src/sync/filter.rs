//! Candidate filters
//!
//! Pure functions that can be tested without any collaborators.

use chrono::{DateTime, Utc};

/// Check whether a file passes the "only files since" cutoff.
///
/// # Arguments
/// * `timestamp` - When the source observed the file (None if unknown)
/// * `cutoff` - Only files strictly newer than this pass (None = no cutoff)
///
/// # Returns
/// `true` if there is no cutoff or the file is strictly newer. Files with
/// no timestamp cannot be shown to be new and fail an active cutoff.
pub fn passes_cutoff(timestamp: Option<DateTime<Utc>>, cutoff: Option<DateTime<Utc>>) -> bool {
    match (cutoff, timestamp) {
        (None, _) => true,
        (Some(cutoff), Some(ts)) => ts > cutoff,
        (Some(_), None) => false,
    }
}

/// Check whether an extension is in the accepted set.
///
/// `accepted` must already be normalized (lower-case, leading dot).
pub fn accepts_extension(extension: &str, accepted: &[String]) -> bool {
    let extension = extension.to_lowercase();
    accepted.iter().any(|e| *e == extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_no_cutoff_accepts_everything() {
        assert!(passes_cutoff(None, None));
        assert!(passes_cutoff(Some(Utc::now() - Duration::days(365)), None));
    }

    #[test]
    fn test_cutoff_excludes_older_files() {
        let start = Utc::now();
        assert!(!passes_cutoff(Some(start - Duration::seconds(10)), Some(start)));
    }

    #[test]
    fn test_cutoff_includes_newer_files() {
        let start = Utc::now();
        assert!(passes_cutoff(Some(start + Duration::seconds(10)), Some(start)));
    }

    #[test]
    fn test_cutoff_is_strict() {
        let start = Utc::now();
        assert!(!passes_cutoff(Some(start), Some(start)));
    }

    #[test]
    fn test_cutoff_rejects_unknown_timestamp() {
        assert!(!passes_cutoff(None, Some(Utc::now())));
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let accepted = vec![".png".to_string(), ".jpg".to_string(), ".jpeg".to_string()];
        assert!(accepts_extension(".png", &accepted));
        assert!(accepts_extension(".JPG", &accepted));
        assert!(!accepts_extension(".txt", &accepted));
        assert!(!accepts_extension("", &accepted));
    }
}
