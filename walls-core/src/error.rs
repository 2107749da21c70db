use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum WallsError {
    #[error("Unauthorized. Check WALLHAVEN_API_KEY.")]
    Auth,

    #[error("Rate limit reached. Try again later.")]
    RateLimit,

    #[error("API error: {status} {reason}")]
    Http { status: u16, reason: String },

    #[error("Request failed: {0}")]
    Network(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Wallpaper setting is not supported on {0}.")]
    UnsupportedPlatform(String),

    #[error("Wallpaper set failed: {0}")]
    Apply(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Cached file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

impl WallsError {
    /// Map a non-2xx search response status onto the error taxonomy.
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            401 => Self::Auth,
            429 => Self::RateLimit,
            code => Self::Http {
                status: code,
                reason: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, WallsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            WallsError::from_status(StatusCode::UNAUTHORIZED),
            WallsError::Auth
        ));
        assert!(matches!(
            WallsError::from_status(StatusCode::TOO_MANY_REQUESTS),
            WallsError::RateLimit
        ));
        match WallsError::from_status(StatusCode::INTERNAL_SERVER_ERROR) {
            WallsError::Http { status, reason } => {
                assert_eq!(status, 500);
                assert_eq!(reason, "Internal Server Error");
            }
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn test_messages_are_user_facing() {
        let err = WallsError::FileNotFound(PathBuf::from("/tmp/walls/full/abc.jpg"));
        assert_eq!(err.to_string(), "Cached file not found: /tmp/walls/full/abc.jpg");
        let err = WallsError::Http {
            status: 503,
            reason: "Service Unavailable".into(),
        };
        assert_eq!(err.to_string(), "API error: 503 Service Unavailable");
    }
}
