//! Options of a partitioning run.

use crate::{Error, Result};

/// Options of [`partition`](crate::controller::partition).
///
/// # Examples
///
/// ```
/// use ndarray_pivot::Config;
///
/// let config = Config::default().with_max_rounds(3).with_validation(false);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.round_limit(16), 3);
/// assert_eq!(Config::default().round_limit(16), 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
	/// Balancing rounds per level before giving up, defaulting to the group size.
	pub max_rounds: Option<usize>,
	/// Whether to check the global order once all levels completed.
	pub validate: bool,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			max_rounds: None,
			validate: true,
		}
	}
}

impl Config {
	/// Caps the balancing rounds per level.
	#[must_use]
	pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
		self.max_rounds = Some(max_rounds);
		self
	}

	/// Enables or disables the order check.
	#[must_use]
	pub fn with_validation(mut self, validate: bool) -> Self {
		self.validate = validate;
		self
	}

	/// Checks the options for consistency.
	///
	/// # Errors
	///
	/// Returns [`Error::Config`] if the round cap is zero.
	pub fn validate(&self) -> Result<()> {
		if self.max_rounds == Some(0) {
			return Err(Error::Config("round cap must be positive".into()));
		}
		Ok(())
	}

	/// Balancing rounds allowed for a group of `size` members.
	#[inline]
	pub fn round_limit(&self, size: usize) -> usize {
		self.max_rounds.unwrap_or(size)
	}
}

#[cfg(test)]
mod test {
	use super::Config;
	use crate::Error;

	#[test]
	fn zero_rounds() {
		let config = Config::default().with_max_rounds(0);
		assert!(matches!(config.validate(), Err(Error::Config(_))));
	}
}
