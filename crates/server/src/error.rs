//! HTTP error responses.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use impetus_proto::{ContractVersion, RequestError, VersionParseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ProviderKind;
use crate::provider::{ProviderError, RegistryError};
use crate::rate_limit::RateLimitError;
use crate::service::ServiceError;

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// Stable machine-readable code.
	pub code: String,
	/// Human-readable description.
	pub message: String,
	/// Whether the same request may succeed later.
	pub retryable: bool,
}

/// A request that could not be answered with a command.
#[derive(Debug, Error)]
pub enum ApiError {
	/// `Idempotency-Key` is absent.
	#[error("missing Idempotency-Key header")]
	MissingIdempotencyKey,
	/// `Idempotency-Key` is empty, too long or not visible ASCII.
	#[error("Idempotency-Key must be 1 to 255 visible ASCII characters")]
	InvalidIdempotencyKey,
	/// `Contract-Version` does not parse.
	#[error(transparent)]
	InvalidContractVersion(#[from] VersionParseError),
	/// The client speaks a contract older than the server accepts.
	#[error("contract version {requested} is older than the minimum {minimum}")]
	UnsupportedContractVersion {
		/// Version declared by the client.
		requested: ContractVersion,
		/// Oldest version accepted.
		minimum: ContractVersion,
	},
	/// The body does not match the request schema.
	#[error("invalid request body: {0}")]
	InvalidBody(String),
	/// The body parsed but is semantically invalid.
	#[error(transparent)]
	InvalidRequest(RequestError),
	/// The client is over its request budget.
	#[error(transparent)]
	RateLimited(#[from] RateLimitError),
	/// `X-LLM-Provider` names no known provider.
	#[error("unsupported provider `{0}`")]
	UnsupportedProvider(String),
	/// The selected provider has no key on the server and none was sent.
	#[error("no API key configured for {0}; send X-LLM-Api-Key")]
	ProviderNotConfigured(ProviderKind),
	/// The provider failed or timed out.
	#[error(transparent)]
	Provider(#[from] ProviderError),
	/// Unexpected server fault.
	#[error("internal error: {0}")]
	Internal(String),
}

impl ApiError {
	/// HTTP status for this error.
	pub fn status_code(&self) -> StatusCode {
		match self {
			Self::MissingIdempotencyKey
			| Self::InvalidIdempotencyKey
			| Self::InvalidContractVersion(_)
			| Self::InvalidBody(_)
			| Self::UnsupportedProvider(_) => StatusCode::UNPROCESSABLE_ENTITY,
			Self::UnsupportedContractVersion { .. } => StatusCode::UPGRADE_REQUIRED,
			Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
			Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
			Self::ProviderNotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
			Self::Provider(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Stable code reported in the body.
	pub fn code(&self) -> &'static str {
		match self {
			Self::MissingIdempotencyKey => "MISSING_IDEMPOTENCY_KEY",
			Self::InvalidIdempotencyKey => "INVALID_IDEMPOTENCY_KEY",
			Self::InvalidContractVersion(_) => "INVALID_CONTRACT_VERSION",
			Self::UnsupportedContractVersion { .. } => "CONTRACT_VERSION_UNSUPPORTED",
			Self::InvalidBody(_) => "VALIDATION_ERROR",
			Self::InvalidRequest(_) => "INVALID_REQUEST",
			Self::RateLimited(_) => "RATE_LIMITED",
			Self::UnsupportedProvider(_) => "UNSUPPORTED_PROVIDER",
			Self::ProviderNotConfigured(_) => "LLM_NOT_CONFIGURED",
			Self::Provider(_) => "PROVIDER_ERROR",
			Self::Internal(_) => "INTERNAL_ERROR",
		}
	}

	/// Whether the same request may succeed later.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::RateLimited(_) | Self::Provider(_) | Self::Internal(_))
	}

	/// Response body. Internal faults are not described to the client.
	pub fn body(&self) -> ErrorBody {
		let message = match self {
			Self::Internal(_) => "internal server error".to_owned(),
			other => other.to_string(),
		};
		ErrorBody {
			code: self.code().to_owned(),
			message,
			retryable: self.is_retryable(),
		}
	}
}

impl From<ServiceError> for ApiError {
	fn from(error: ServiceError) -> Self {
		match error {
			ServiceError::Request(e) if e.is_schema() => Self::InvalidBody(e.to_string()),
			ServiceError::Request(e) => Self::InvalidRequest(e),
			ServiceError::Provider(e) => Self::Provider(e),
		}
	}
}

impl From<RegistryError> for ApiError {
	fn from(error: RegistryError) -> Self {
		match error {
			RegistryError::Unsupported(name) => Self::UnsupportedProvider(name),
			RegistryError::NotConfigured(kind) => Self::ProviderNotConfigured(kind),
			RegistryError::Setup(e) => Self::Provider(e),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = self.status_code();
		let retry_after = match &self {
			Self::RateLimited(e) => Some(e.retry_after_secs()),
			_ => None,
		};
		let mut response = (status, Json(self.body())).into_response();
		if let Some(secs) = retry_after {
			response
				.headers_mut()
				.insert(header::RETRY_AFTER, HeaderValue::from(secs));
		}
		response
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	#[test]
	fn status_codes() {
		assert_eq!(
			ApiError::MissingIdempotencyKey.status_code(),
			StatusCode::UNPROCESSABLE_ENTITY
		);
		assert_eq!(
			ApiError::UnsupportedContractVersion {
				requested: ContractVersion::new(1, 0, 0),
				minimum: ContractVersion::new(2, 0, 0),
			}
			.status_code(),
			StatusCode::UPGRADE_REQUIRED
		);
		assert_eq!(
			ApiError::InvalidRequest(RequestError::InvertedSelection { from: 2, to: 1 })
				.status_code(),
			StatusCode::BAD_REQUEST
		);
		assert_eq!(
			ApiError::Provider(ProviderError::Timeout(Duration::from_secs(20))).status_code(),
			StatusCode::INTERNAL_SERVER_ERROR
		);
	}

	#[test]
	fn schema_request_errors_are_validation_errors() {
		let err = ApiError::from(ServiceError::Request(RequestError::EmptyContext));
		assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
		let err = ApiError::from(ServiceError::Request(RequestError::InvertedSelection {
			from: 3,
			to: 1,
		}));
		assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
	}

	#[test]
	fn rate_limited_carries_retry_after() {
		let err = ApiError::RateLimited(RateLimitError::Exceeded {
			retry_after: Duration::from_millis(4_500),
		});
		let response = err.into_response();
		assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(response.headers()[header::RETRY_AFTER], "5");
	}

	#[test]
	fn internal_details_are_not_leaked() {
		let body = ApiError::Internal("task panicked at secret.rs".into()).body();
		assert_eq!(body.message, "internal server error");
		assert!(body.retryable);
	}

	#[test]
	fn provider_selection_errors() {
		let unsupported = ApiError::from(RegistryError::Unsupported("mistral".into()));
		assert_eq!(unsupported.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
		assert_eq!(unsupported.code(), "UNSUPPORTED_PROVIDER");
		assert!(!unsupported.is_retryable());

		let missing = ApiError::from(RegistryError::NotConfigured(ProviderKind::Gemini));
		assert_eq!(missing.status_code(), StatusCode::SERVICE_UNAVAILABLE);
		assert_eq!(missing.body().code, "LLM_NOT_CONFIGURED");
		assert!(!missing.body().retryable);
	}

	#[test]
	fn provider_errors_are_retryable() {
		let body = ApiError::Provider(ProviderError::Malformed("x".into())).body();
		assert_eq!(body.code, "PROVIDER_ERROR");
		assert!(body.retryable);
		assert!(!ApiError::InvalidBody("x".into()).body().retryable);
	}
}
