//! Error type shared by every stage of the pipeline.

use thiserror::Error;

/// Errors raised while selecting, partitioning, balancing, or communicating.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
	/// The number of processes is not a power of two.
	#[error("process count {0} is not a power of two")]
	ProcessCount(usize),
	/// A configuration value is out of range.
	#[error("invalid configuration: {0}")]
	Config(String),
	/// Ranks disagree about the shape of their point sets.
	#[error(
		"rank {rank} holds {points}x{dims} points but rank 0 holds {expected_points}x{expected_dims}"
	)]
	UnevenLayout {
		/// Offending rank.
		rank: usize,
		/// Points held by the offending rank.
		points: usize,
		/// Dimensionality of the offending rank.
		dims: usize,
		/// Points held by rank 0.
		expected_points: usize,
		/// Dimensionality of rank 0.
		expected_dims: usize,
	},
	/// Pivot and points do not share their dimensionality.
	#[error("pivot has {pivot} dimensions but points have {points}")]
	DimensionMismatch {
		/// Dimensionality of the pivot.
		pivot: usize,
		/// Dimensionality of the points.
		points: usize,
	},
	/// A process was handed no points or points without coordinates.
	#[error("point set is empty")]
	EmptyPointSet,
	/// A coordinate is infinite or NaN.
	#[error("point {row} has a non-finite coordinate")]
	NonFinite {
		/// Row of the offending point.
		row: usize,
	},
	/// Selection was asked for an element of an empty array.
	#[error("cannot select from an empty array")]
	EmptySelection,
	/// Selection input holds NaN and has no total order.
	#[error("cannot select from an array containing NaN")]
	NotANumber,
	/// Balancing exceeded its round limit.
	#[error("balancing did not converge after {rounds} rounds, unwanted counts {unwanted:?}")]
	NotConverged {
		/// Completed rounds.
		rounds: usize,
		/// Last unwanted count of every group member.
		unwanted: Vec<usize>,
	},
	/// Surplus on both sides of a group cannot be matched, even surrendering ties.
	#[error("lower side surplus {lower} cannot be matched with upper side surplus {upper}")]
	Unbalanced {
		/// Surplus of the lower half including surrendered ties.
		lower: usize,
		/// Surplus of the upper half including surrendered ties.
		upper: usize,
	},
	/// A peer went away while a message was expected from it.
	#[error("rank {rank} disconnected")]
	Disconnected {
		/// Rank that disconnected.
		rank: usize,
	},
	/// A rank panicked.
	#[error("rank {rank} panicked")]
	Panicked {
		/// Rank that panicked.
		rank: usize,
	},
	/// A payload could not be decoded.
	#[error("malformed message: {0}")]
	Malformed(String),
	/// Members of a group diverged in their view of the protocol.
	#[error("protocol violation: {0}")]
	Protocol(String),
	/// An error escalated from one recursion level.
	#[error("level {depth} (group of {size}): {source}")]
	Level {
		/// Recursion depth, 0 for the world group.
		depth: usize,
		/// Size of the active group.
		size: usize,
		/// Underlying error.
		#[source]
		source: Box<Error>,
	},
	/// Array shape error.
	#[error(transparent)]
	Shape(#[from] ndarray::ShapeError),
	/// I/O error while reading points.
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl Error {
	/// Returns the innermost error, looking through escalation levels.
	pub fn root_cause(&self) -> &Error {
		match self {
			Error::Level { source, .. } => source.root_cause(),
			error => error,
		}
	}
}

/// Result alias with [`Error`] as the default error.
pub type Result<T, E = Error> = core::result::Result<T, E>;

#[cfg(test)]
mod test {
	use super::Error;

	#[test]
	fn root_cause() {
		let error = Error::Level {
			depth: 0,
			size: 4,
			source: Box::new(Error::Level {
				depth: 1,
				size: 2,
				source: Box::new(Error::Disconnected { rank: 3 }),
			}),
		};
		assert!(matches!(error.root_cause(), Error::Disconnected { rank: 3 }));
		assert_eq!(
			error.to_string(),
			"level 0 (group of 4): level 1 (group of 2): rank 3 disconnected"
		);
		let error = Error::EmptySelection;
		assert!(matches!(error.root_cause(), Error::EmptySelection));
	}
}
