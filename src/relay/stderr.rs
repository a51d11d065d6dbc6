use std::fmt;

/// A failure reported by the extraction tool on stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolFailure {
    /// The platform wants a logged-in session (bot check).
    SignInRequired,
    /// HTTP 403 from the media CDN.
    Forbidden,
    Unavailable,
    Error(String),
    /// Non-zero exit without a recognisable stderr line.
    Exit(Option<i32>),
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolFailure::SignInRequired => f.write_str("sign-in required (cookies rejected or missing)"),
            ToolFailure::Forbidden => f.write_str("media request forbidden (HTTP 403)"),
            ToolFailure::Unavailable => f.write_str("video unavailable"),
            ToolFailure::Error(msg) => f.write_str(msg),
            ToolFailure::Exit(Some(code)) => write!(f, "exited with code {}", code),
            ToolFailure::Exit(None) => f.write_str("terminated by signal"),
        }
    }
}

/// Classify one stderr line. Returns `None` for progress and warning noise.
pub fn classify_stderr(line: &str) -> Option<ToolFailure> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line.contains("Sign in") {
        return Some(ToolFailure::SignInRequired);
    }
    if line.contains("403") {
        return Some(ToolFailure::Forbidden);
    }
    if line.contains("Video unavailable") {
        return Some(ToolFailure::Unavailable);
    }
    if line.contains("ERROR") {
        let msg = line.strip_prefix("ERROR:").unwrap_or(line).trim();
        return Some(ToolFailure::Error(msg.to_string()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_patterns() {
        assert_eq!(
            classify_stderr("ERROR: [youtube] abc: Sign in to confirm you're not a bot"),
            Some(ToolFailure::SignInRequired)
        );
        assert_eq!(
            classify_stderr("ERROR: unable to download video data: HTTP Error 403: Forbidden"),
            Some(ToolFailure::Forbidden)
        );
        assert_eq!(
            classify_stderr("ERROR: [youtube] abc: Video unavailable"),
            Some(ToolFailure::Unavailable)
        );
        assert_eq!(
            classify_stderr("ERROR: Requested format is not available"),
            Some(ToolFailure::Error("Requested format is not available".into()))
        );
    }

    #[test]
    fn test_classify_ignores_noise() {
        assert_eq!(classify_stderr(""), None);
        assert_eq!(classify_stderr("WARNING: falling back to generic extractor"), None);
        assert_eq!(classify_stderr("[download]  12.3% of 3.41MiB"), None);
    }
}
