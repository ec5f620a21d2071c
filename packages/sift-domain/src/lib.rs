pub mod filters;
pub mod plan;
pub mod progress;
pub mod session;
pub mod time_serde;

mod error;

pub use error::{Error, Result};
pub use filters::ScanFilters;
pub use plan::BatchPlan;
pub use progress::Progress;
pub use session::{
	BatchOutcome, BatchSummary, MAX_TTL_SECONDS, ResultRecord, ScanSession, ScanStatus,
};
