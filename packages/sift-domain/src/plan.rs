use std::ops::Range;

use crate::{Error, Result};

/// Fixed partition of a candidate list into batches, decided once at scan creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchPlan {
	pub total_items: usize,
	pub batch_size: usize,
	pub total_batches: usize,
}
impl BatchPlan {
	pub fn new(total_items: usize, batch_size: usize) -> Result<Self> {
		if batch_size == 0 {
			return Err(Error::InvalidPlan {
				message: "batch_size must be greater than zero.".to_string(),
			});
		}

		Ok(Self { total_items, batch_size, total_batches: total_items.div_ceil(batch_size) })
	}

	/// Items the batch starting at `cursor` covers, clipped at the end of the list.
	pub fn slice(&self, cursor: usize) -> Range<usize> {
		let start = cursor.min(self.total_items);
		let end = start.saturating_add(self.batch_size).min(self.total_items);

		start..end
	}
}
