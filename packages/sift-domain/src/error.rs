use crate::session::ScanStatus;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid filters: {message}")]
	InvalidFilters { message: String },
	#[error("Invalid batch plan: {message}")]
	InvalidPlan { message: String },
	#[error("Scan cannot move from {from} to {to}.")]
	InvalidTransition { from: ScanStatus, to: ScanStatus },
	#[error("Scan session is inconsistent: {message}")]
	Inconsistent { message: String },
}
