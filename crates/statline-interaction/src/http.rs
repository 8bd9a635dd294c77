//! Error mapping shared by the HTTP model clients.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::HeaderValue;
use statline_core::llm::LlmError;

pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> LlmError {
    LlmError::ProcessError {
        status_code: None,
        message: format!("{provider} API request failed: {err}"),
        is_retryable: err.is_connect() || err.is_timeout(),
        retry_after: None,
    }
}

/// 429 and gateway-class 5xx are retryable.
pub(crate) fn map_http_error(
    status: StatusCode,
    message: String,
    retry_after: Option<Duration>,
) -> LlmError {
    let is_retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );
    LlmError::ProcessError {
        status_code: Some(status.as_u16()),
        message,
        is_retryable,
        retry_after,
    }
}

/// Seconds form only; HTTP-date values are ignored.
pub(crate) fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_retryable() {
        let err = map_http_error(
            StatusCode::TOO_MANY_REQUESTS,
            "slow down".into(),
            Some(Duration::from_secs(3)),
        );
        assert!(err.is_retryable());
        assert!(!map_http_error(StatusCode::UNAUTHORIZED, "bad key".into(), None).is_retryable());
    }

    #[test]
    fn test_parse_retry_after_seconds_only() {
        assert_eq!(
            parse_retry_after(Some(&HeaderValue::from_static("7"))),
            Some(Duration::from_secs(7))
        );
        assert_eq!(
            parse_retry_after(Some(&HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"))),
            None
        );
        assert_eq!(parse_retry_after(None), None);
    }
}
