//! Peer-matched point exchange driving a group to the side invariant.
//!
//! After [`split_by_median`](crate::partition::split_by_median) every member knows how many of
//! its points lie strictly on the unwanted side of the median. The lower half of the group trades
//! those points against the ones held by the upper half, pairing the `k`-th member of one half
//! having surplus with the `k`-th member of the other half having surplus, until nobody holds an
//! unwanted point.
//!
//! # Ties
//!
//! Points exactly at the median may stay on either side. They are kept unless the strict
//! surplus of one half exceeds the strict surplus of the other; then the short half surrenders
//! just enough ties to match, its members in rank order each giving up to all of their ties.
//! Since ties are placed adjacent to the strictly unwanted points, the points a member must give
//! away always form the suffix of its arrays.
//!
//! # Termination
//!
//! With equal surplus on both halves, a round pairs as many members as the shorter half has with
//! surplus, and each pair leaves at least one of its two members without surplus. Hence balancing
//! takes at most as many rounds as the group has members.

use crate::{
	Error, Result, Scalar,
	comm::{Communicator, decode, encode},
	group::ProcessGroup,
	partition::{Side, Split},
	pivot::Pivot,
	points::LocalPoints,
};

/// Outcome of balancing one group, as seen by one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Balance {
	/// Rounds until convergence, identical on every member.
	pub rounds: usize,
	/// Points this member traded away, identical to the points it received.
	pub traded: usize,
	/// Ties this member had to surrender.
	pub surrendered: usize,
}

/// Returns the number of points every member must give away, given every member's [`Split`].
///
/// Starts from the strictly unwanted points and adds ties on the half with less surplus until
/// both halves have equal surplus.
///
/// # Errors
///
/// Returns [`Error::Unbalanced`] if the ties of the short half do not suffice, which means the
/// splits were not taken at the median of the group.
pub fn allot_ties(splits: &[Split]) -> Result<Vec<usize>> {
	let half = splits.len() / 2;
	let mut unwanted = splits.iter().map(|split| split.discard).collect::<Vec<_>>();
	let lower = unwanted[..half].iter().sum::<usize>();
	let upper = unwanted[half..].iter().sum::<usize>();

	let (short, mut deficit) = if lower < upper {
		(0..half, upper - lower)
	} else {
		(half..splits.len(), lower - upper)
	};
	for rank in short {
		let surrendered = deficit.min(splits[rank].ties);
		unwanted[rank] += surrendered;
		deficit -= surrendered;
	}

	if deficit > 0 {
		return Err(Error::Unbalanced {
			lower: unwanted[..half].iter().sum(),
			upper: unwanted[half..].iter().sum(),
		});
	}
	Ok(unwanted)
}

/// Returns the member `rank` trades with this round, given every member's unwanted count.
///
/// A member with surplus at position `k` among the members with surplus of its half pairs with
/// the member at position `k` among the members with surplus of the other half. Returns `None` if
/// `rank` has no surplus or no such partner exists.
pub fn find_peer(rank: usize, unwanted: &[usize]) -> Option<usize> {
	if unwanted[rank] == 0 {
		return None;
	}
	let size = unwanted.len();
	let half = size / 2;
	let (own, other) = match Side::of(rank, size) {
		Side::Lower => (0..half, half..size),
		Side::Upper => (half..size, 0..half),
	};
	// Counts the caller itself, hence at least one.
	let position = (own.start..=rank).filter(|&r| unwanted[r] > 0).count();
	other.filter(|&r| unwanted[r] > 0).nth(position - 1)
}

/// Applies one round of trades to the unwanted counts.
pub fn settle(unwanted: &[usize]) -> Vec<usize> {
	(0..unwanted.len())
		.map(|rank| match find_peer(rank, unwanted) {
			Some(peer) => unwanted[rank] - unwanted[rank].min(unwanted[peer]),
			None => unwanted[rank],
		})
		.collect()
}

/// Trades points with the other half of `group` until every member holds only points on its side
/// of the median `split` was taken at.
///
/// `local` must be laid out as left by [`split_by_median`](crate::partition::split_by_median)
/// with `split` as its result. Every member of `group` must call this.
///
/// # Errors
///
/// Returns [`Error::NotConverged`] after `max_rounds` rounds without convergence and
/// [`Error::Protocol`] if the gathered counts diverge from the expected ones.
pub fn balance<C, T>(
	group: &ProcessGroup<'_, C>,
	local: &mut LocalPoints<T>,
	pivot: &Pivot<T>,
	split: Split,
	max_rounds: usize,
) -> Result<Balance>
where
	C: Communicator,
	T: Scalar,
{
	let rank = group.rank();
	let splits = group
		.all_gather_count_tuples(&[split.kept, split.ties, split.discard])?
		.into_iter()
		.map(|counts| match counts[..] {
			[kept, ties, discard] => Ok(Split {
				kept,
				ties,
				discard,
			}),
			_ => Err(Error::Malformed(format!("split of {} counts", counts.len()))),
		})
		.collect::<Result<Vec<_>>>()?;
	let mut unwanted = allot_ties(&splits)?;
	let mut balance = Balance {
		surrendered: unwanted[rank] - split.discard,
		..Balance::default()
	};

	let len = local.len();
	while unwanted.iter().any(|&count| count > 0) {
		if balance.rounds == max_rounds {
			return Err(Error::NotConverged {
				rounds: balance.rounds,
				unwanted,
			});
		}

		let mut own = unwanted[rank];
		if let Some(peer) = find_peer(rank, &unwanted) {
			let count = own.min(unwanted[peer]);
			// Trade the first rows of the unwanted suffix so the rest stays a suffix.
			let start = len - own;
			let outgoing = encode(&local.rows(start..start + count));
			let incoming = decode::<T>(&group.exchange(peer, outgoing)?)?;
			if incoming.len() != count * local.dims() {
				return Err(Error::Protocol(format!(
					"member {} sent {} coordinates instead of {} points",
					peer,
					incoming.len(),
					count
				)));
			}
			local.replace_rows(start, &incoming, pivot)?;
			own -= count;
			balance.traded += count;
			tracing::trace!(round = balance.rounds, rank, peer, count, "traded");
		}

		let expected = settle(&unwanted);
		unwanted = group.all_gather_counts(own)?;
		if unwanted != expected {
			return Err(Error::Protocol(format!(
				"unwanted counts {unwanted:?} diverge from expected {expected:?}"
			)));
		}
		balance.rounds += 1;
	}

	Ok(balance)
}
