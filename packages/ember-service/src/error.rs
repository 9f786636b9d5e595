pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Rate limited: {message}")]
	RateLimited { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Generation API key missing.")]
	CredentialsMissing,
	#[error("All API keys exhausted.")]
	CredentialsExhausted,
}
impl Error {
	pub fn is_rate_limited(&self) -> bool {
		matches!(self, Self::RateLimited { .. })
	}
}
impl From<ember_providers::Error> for Error {
	fn from(err: ember_providers::Error) -> Self {
		if err.is_rate_limited() {
			Self::RateLimited { message: err.to_string() }
		} else {
			Self::Provider { message: err.to_string() }
		}
	}
}
impl From<ember_storage::Error> for Error {
	fn from(err: ember_storage::Error) -> Self {
		match err {
			ember_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			ember_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
		}
	}
}
impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Storage { message: format!("Cache payload encoding failed: {err}") }
	}
}

/// Failure of a context source that must be shown to the caller instead of falling through.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
	#[error("{message}")]
	Video { message: String },
}
