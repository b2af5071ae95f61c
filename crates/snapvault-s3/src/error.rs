//! Mapping of SDK failures onto `FailureKind`.

use std::error::Error;

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use snapvault_core::{FailureKind, StageError};

const DENIED_CODES: [&str; 5] = [
    "AccessDenied",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "InvalidToken",
];

/// Classify an SDK error raised by `operation`.
pub(crate) fn classify<E>(operation: &'static str, err: SdkError<E, HttpResponse>) -> StageError
where
    E: ProvideErrorMetadata + Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|response| response.status().as_u16());
    let code = err
        .as_service_error()
        .and_then(ProvideErrorMetadata::code)
        .map(str::to_owned);
    let kind = match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => FailureKind::Unreachable,
        _ => kind_for(status, code.as_deref()),
    };

    let mut detail = Vec::new();
    if let Some(status) = status {
        detail.push(format!("status {status}"));
    }
    if let Some(code) = code {
        detail.push(code);
    }
    let error = StageError::new(kind, operation).with_source(err);
    if detail.is_empty() {
        error
    } else {
        error.with_detail(detail.join(", "))
    }
}

fn kind_for(status: Option<u16>, code: Option<&str>) -> FailureKind {
    let denied_code = code.is_some_and(|code| DENIED_CODES.contains(&code));
    if denied_code || matches!(status, Some(401 | 403)) {
        FailureKind::Unauthorized
    } else {
        FailureKind::Rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_problems_are_unauthorized() {
        assert_eq!(kind_for(Some(403), None), FailureKind::Unauthorized);
        assert_eq!(kind_for(Some(401), None), FailureKind::Unauthorized);
        assert_eq!(
            kind_for(Some(400), Some("InvalidAccessKeyId")),
            FailureKind::Unauthorized
        );
    }

    #[test]
    fn other_refusals_are_rejected() {
        assert_eq!(kind_for(Some(404), Some("NoSuchBucket")), FailureKind::Rejected);
        assert_eq!(kind_for(Some(500), Some("InternalError")), FailureKind::Rejected);
        assert_eq!(kind_for(None, None), FailureKind::Rejected);
    }
}
