//! Error types for the Fluxer core

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A non-2xx response; `message` is the server's own message when it sent one
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Unexpected {0} response shape")]
    UnexpectedShape(&'static str),

    #[error("CAPTCHA_REQUIRED: Captcha is required.")]
    CaptchaRequired,

    #[error("All endpoints failed:\n{}", .0.join("\n"))]
    AllEndpointsFailed(Vec<String>),

    #[error("Chat view is closed")]
    ViewClosed,
}

impl Error {
    /// Whether the server asked for a captcha to be solved before retrying.
    pub fn is_captcha(&self) -> bool {
        match self {
            Error::CaptchaRequired => true,
            Error::Api { message, .. } => mentions_captcha(message),
            _ => false,
        }
    }
}

pub(crate) fn mentions_captcha(message: &str) -> bool {
    message.contains("CAPTCHA") || message.contains("Captcha")
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_endpoints_failed_lists_each_attempt() {
        let err = Error::AllEndpointsFailed(vec![
            "/auth/login: HTTP 500: Internal Server Error".to_string(),
            "/v1/auth/login: HTTP 502: Bad Gateway".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "All endpoints failed:\n/auth/login: HTTP 500: Internal Server Error\n/v1/auth/login: HTTP 502: Bad Gateway"
        );
    }

    #[test]
    fn test_captcha_detection() {
        assert!(Error::CaptchaRequired.is_captcha());
        let api = Error::Api { status: 400, code: None, message: "Captcha token missing".to_string() };
        assert!(api.is_captcha());
        let other = Error::Api { status: 401, code: None, message: "Invalid password".to_string() };
        assert!(!other.is_captcha());
    }
}
