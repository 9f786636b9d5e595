use reqwest::StatusCode;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("Provider responded with HTTP {status}: {message}")]
	Status { status: u16, message: String },
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
}
impl Error {
	/// True when the provider asked us to back off, which callers treat as "try another key".
	pub fn is_rate_limited(&self) -> bool {
		match self {
			Self::Status { status, .. } => *status == StatusCode::TOO_MANY_REQUESTS.as_u16(),
			Self::Reqwest(err) => err.status() == Some(StatusCode::TOO_MANY_REQUESTS),
			_ => false,
		}
	}
}
