pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Busy: {message}")]
	Busy { message: String, retry_after_secs: Option<u64> },
	#[error("Not found: {message}")]
	NotFound { message: String },
	/// The service answered with a transient server-side failure.
	#[error("Unavailable ({error_code}): {message}")]
	Unavailable { error_code: String, message: String },
	#[error("Rejected ({error_code}): {message}")]
	Rejected { error_code: String, message: String },
	#[error(transparent)]
	Transport(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
}
impl Error {
	/// Whether a later identical call may succeed.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Busy { .. } | Self::Unavailable { .. } | Self::Transport(_))
	}
}
