// src/services/calendar/classify.rs

use serde::Deserialize;
use serde_json::Value;

use super::{CalendarError, CalendarErrorKind, ProviderFailure};

// Formato de erro da API do Google:
// {"error": {"code": 403, "message": "...", "status": "...", "errors": [{"reason": "rateLimitExceeded"}]}}
// e do endpoint OAuth: {"error": "invalid_grant", "error_description": "..."}
#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    error: Option<Value>,
    error_description: Option<String>,
}

#[derive(Debug, Default)]
struct ErrorDetails {
    message: String,
    reasons: Vec<String>,
    oauth_error: Option<String>,
}

fn parse_details(body: &str) -> ErrorDetails {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return ErrorDetails {
            message: body.trim().to_string(),
            ..ErrorDetails::default()
        };
    };

    match envelope.error {
        Some(Value::Object(obj)) => {
            let message = obj
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let reasons = obj
                .get("errors")
                .and_then(Value::as_array)
                .map(|errors| {
                    errors
                        .iter()
                        .filter_map(|e| e.get("reason").and_then(Value::as_str))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            ErrorDetails { message, reasons, oauth_error: None }
        }
        Some(Value::String(code)) => ErrorDetails {
            message: envelope.error_description.unwrap_or_else(|| code.clone()),
            reasons: Vec::new(),
            oauth_error: Some(code),
        },
        _ => ErrorDetails {
            message: body.trim().to_string(),
            ..ErrorDetails::default()
        },
    }
}

fn kind_for(status: Option<u16>, details: &ErrorDetails) -> CalendarErrorKind {
    let message = details.message.to_lowercase();
    let has_reason = |wanted: &[&str]| details.reasons.iter().any(|r| wanted.contains(&r.as_str()));
    let mentions_expiry = message.contains("expired");

    let Some(status) = status else {
        return CalendarErrorKind::NetworkError;
    };

    match status {
        429 => CalendarErrorKind::RateLimited,
        401 if mentions_expiry => CalendarErrorKind::TokenExpired,
        401 => CalendarErrorKind::InvalidToken,
        400 if details.oauth_error.as_deref() == Some("invalid_grant") => {
            if mentions_expiry {
                CalendarErrorKind::TokenExpired
            } else {
                CalendarErrorKind::InvalidToken
            }
        }
        400 => CalendarErrorKind::InvalidRequest,
        403 if has_reason(&["rateLimitExceeded", "userRateLimitExceeded"]) => CalendarErrorKind::RateLimited,
        403 if has_reason(&["quotaExceeded", "dailyLimitExceeded"]) => CalendarErrorKind::QuotaExceeded,
        403 => CalendarErrorKind::Forbidden,
        404 if message.contains("calendar") => CalendarErrorKind::CalendarNotFound,
        404 | 410 => CalendarErrorKind::NotFound,
        409 | 412 => CalendarErrorKind::EventConflict,
        408 | 502 | 503 | 504 => CalendarErrorKind::NetworkError,
        _ => CalendarErrorKind::Unknown,
    }
}

/// Fronteira de classificação: a única função que olha status e payload crus.
pub fn classify(failure: &ProviderFailure) -> CalendarError {
    let details = parse_details(&failure.body);
    let kind = kind_for(failure.status, &details);

    let message = if details.message.is_empty() {
        match failure.status {
            Some(status) => format!("HTTP {status}"),
            None => "sem resposta do provedor".to_string(),
        }
    } else {
        details.message
    };

    CalendarError {
        kind,
        code: failure.status,
        message,
        retry_after: failure.retry_after,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    fn google_error(code: u16, message: &str, reason: &str) -> String {
        serde_json::json!({
            "error": {
                "code": code,
                "message": message,
                "errors": [{ "domain": "global", "reason": reason, "message": message }]
            }
        })
        .to_string()
    }

    #[rstest]
    #[case(429, google_error(429, "Too many requests", "rateLimitExceeded"), CalendarErrorKind::RateLimited)]
    #[case(403, google_error(403, "Rate Limit Exceeded", "userRateLimitExceeded"), CalendarErrorKind::RateLimited)]
    #[case(403, google_error(403, "Daily Limit Exceeded", "dailyLimitExceeded"), CalendarErrorKind::QuotaExceeded)]
    #[case(403, google_error(403, "Quota exceeded", "quotaExceeded"), CalendarErrorKind::QuotaExceeded)]
    #[case(403, google_error(403, "The user does not have permission", "forbidden"), CalendarErrorKind::Forbidden)]
    #[case(401, google_error(401, "Access token expired", "authError"), CalendarErrorKind::TokenExpired)]
    #[case(401, google_error(401, "Invalid Credentials", "authError"), CalendarErrorKind::InvalidToken)]
    #[case(404, google_error(404, "Calendar not found", "notFound"), CalendarErrorKind::CalendarNotFound)]
    #[case(404, google_error(404, "Not Found", "notFound"), CalendarErrorKind::NotFound)]
    #[case(410, google_error(410, "Resource has been deleted", "deleted"), CalendarErrorKind::NotFound)]
    #[case(409, google_error(409, "The requested identifier already exists.", "duplicate"), CalendarErrorKind::EventConflict)]
    #[case(400, google_error(400, "Invalid start time.", "invalid"), CalendarErrorKind::InvalidRequest)]
    #[case(503, google_error(503, "Backend Error", "backendError"), CalendarErrorKind::NetworkError)]
    #[case(500, google_error(500, "Backend Error", "backendError"), CalendarErrorKind::Unknown)]
    #[case(418, "not json at all".to_string(), CalendarErrorKind::Unknown)]
    fn classifies_http_failures(#[case] status: u16, #[case] body: String, #[case] expected: CalendarErrorKind) {
        let error = classify(&ProviderFailure::http(status, body));
        assert_eq!(error.kind, expected);
        assert_eq!(error.code, Some(status));
    }

    #[test]
    fn transport_failures_are_network_errors() {
        let error = classify(&ProviderFailure::transport("connection reset by peer"));
        assert_eq!(error.kind, CalendarErrorKind::NetworkError);
        assert_eq!(error.code, None);
        assert!(error.kind.is_retryable());
    }

    #[test]
    fn oauth_invalid_grant_is_a_token_problem() {
        let expired = r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#;
        let revoked = r#"{"error":"invalid_grant","error_description":"Bad Request"}"#;

        let expired = classify(&ProviderFailure::http(400, expired));
        let revoked = classify(&ProviderFailure::http(400, revoked));

        assert_eq!(expired.kind, CalendarErrorKind::TokenExpired);
        assert_eq!(revoked.kind, CalendarErrorKind::InvalidToken);
        assert!(expired.should_refresh_token());
        assert!(revoked.should_refresh_token());
    }

    #[test]
    fn retry_after_hint_is_carried_over() {
        let failure = ProviderFailure::http(429, google_error(429, "slow down", "rateLimitExceeded"))
            .with_retry_after(Duration::from_secs(5));
        assert_eq!(classify(&failure).retry_after, Some(Duration::from_secs(5)));
    }

    #[test]
    fn only_transient_kinds_are_retryable() {
        let retryable: Vec<_> = [
            CalendarErrorKind::RateLimited,
            CalendarErrorKind::TokenExpired,
            CalendarErrorKind::InvalidToken,
            CalendarErrorKind::NotFound,
            CalendarErrorKind::Forbidden,
            CalendarErrorKind::NetworkError,
            CalendarErrorKind::InvalidRequest,
            CalendarErrorKind::QuotaExceeded,
            CalendarErrorKind::CalendarNotFound,
            CalendarErrorKind::EventConflict,
            CalendarErrorKind::Unknown,
        ]
        .into_iter()
        .filter(|k| k.is_retryable())
        .collect();

        assert_eq!(
            retryable,
            vec![CalendarErrorKind::RateLimited, CalendarErrorKind::NetworkError, CalendarErrorKind::Unknown]
        );
    }

    #[test]
    fn any_401_asks_for_token_refresh() {
        let mut error = CalendarError::new(CalendarErrorKind::Unknown, "weird 401");
        error.code = Some(401);
        assert!(error.should_refresh_token());
        assert!(!CalendarError::new(CalendarErrorKind::Forbidden, "nope").should_refresh_token());
    }
}
