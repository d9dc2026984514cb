//! Process groups and the collectives among their members.

use crate::{
	Error, Result, Scalar,
	comm::{Communicator, Tag, decode, decode_counts, decode_one, encode, encode_count},
	partition::Side,
};

/// Contiguous range of ranks cooperating in one recursion level.
///
/// A group never changes; [`split`](Self::split) derives the half holding the caller. Ranks
/// returned and accepted by its methods are relative to the group, with the group root at 0.
#[derive(Debug)]
pub struct ProcessGroup<'c, C> {
	comm: &'c C,
	first: usize,
	size: usize,
	depth: usize,
}

impl<C> Clone for ProcessGroup<'_, C> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<C> Copy for ProcessGroup<'_, C> {}

impl<'c, C: Communicator> ProcessGroup<'c, C> {
	/// Group of all ranks of `comm`.
	///
	/// # Errors
	///
	/// Returns [`Error::ProcessCount`] unless the number of ranks is a power of two.
	pub fn world(comm: &'c C) -> Result<Self> {
		let size = comm.size();
		if !size.is_power_of_two() {
			return Err(Error::ProcessCount(size));
		}
		Ok(Self {
			comm,
			first: 0,
			size,
			depth: 0,
		})
	}

	/// Rank of the caller within the group.
	#[inline]
	pub fn rank(&self) -> usize {
		self.comm.rank() - self.first
	}

	/// Number of members.
	#[inline]
	pub fn size(&self) -> usize {
		self.size
	}

	/// Number of splits since the world group.
	#[inline]
	pub fn depth(&self) -> usize {
		self.depth
	}

	/// Whether the group has a single member and cannot be split.
	#[inline]
	pub fn is_terminal(&self) -> bool {
		self.size == 1
	}

	/// Half of the group holding the caller.
	#[inline]
	pub fn side(&self) -> Side {
		Side::of(self.rank(), self.size)
	}

	/// Half of the group holding the caller, as a group of its own.
	///
	/// # Panics
	///
	/// Panics if the group [`is_terminal`](Self::is_terminal).
	pub fn split(&self) -> Self {
		assert!(!self.is_terminal(), "terminal group cannot be split");
		let half = self.size / 2;
		let first = match self.side() {
			Side::Lower => self.first,
			Side::Upper => self.first + half,
		};
		Self {
			comm: self.comm,
			first,
			size: half,
			depth: self.depth + 1,
		}
	}

	fn world_rank(&self, rank: usize) -> usize {
		self.first + rank
	}

	/// Collects one payload per member at the root, ordered by rank.
	///
	/// Returns `None` on every other member.
	pub fn gather(&self, payload: Vec<u8>) -> Result<Option<Vec<Vec<u8>>>> {
		if self.rank() != 0 {
			self.comm.send(self.world_rank(0), Tag::Gather, payload)?;
			return Ok(None);
		}
		let mut payloads = Vec::with_capacity(self.size);
		payloads.push(payload);
		for rank in 1..self.size {
			payloads.push(self.comm.receive(self.world_rank(rank), Tag::Gather)?);
		}
		Ok(Some(payloads))
	}

	/// Sends the root's payload to every member and returns it on all of them.
	///
	/// Members other than the root pass `None`; their argument is ignored otherwise.
	///
	/// # Errors
	///
	/// Returns [`Error::Protocol`] if the root passes `None`.
	pub fn broadcast(&self, payload: Option<Vec<u8>>) -> Result<Vec<u8>> {
		if self.rank() != 0 {
			return self.comm.receive(self.world_rank(0), Tag::Broadcast);
		}
		let payload =
			payload.ok_or_else(|| Error::Protocol("group root broadcast nothing".into()))?;
		for rank in 1..self.size {
			self.comm
				.send(self.world_rank(rank), Tag::Broadcast, payload.clone())?;
		}
		Ok(payload)
	}

	/// Collects one payload per member on every member, ordered by rank.
	pub fn all_gather(&self, payload: Vec<u8>) -> Result<Vec<Vec<u8>>> {
		match self.gather(payload)? {
			Some(payloads) => {
				for rank in 1..self.size {
					for payload in &payloads {
						self.comm
							.send(self.world_rank(rank), Tag::Broadcast, payload.clone())?;
					}
				}
				Ok(payloads)
			}
			None => (0..self.size)
				.map(|_| self.comm.receive(self.world_rank(0), Tag::Broadcast))
				.collect(),
		}
	}

	/// Sends the `rank`-th of the root's blocks to member `rank` and returns each member's block.
	///
	/// # Errors
	///
	/// Returns [`Error::Protocol`] unless the root passes exactly one block per member.
	pub fn scatter(&self, blocks: Option<Vec<Vec<u8>>>) -> Result<Vec<u8>> {
		if self.rank() != 0 {
			return self.comm.receive(self.world_rank(0), Tag::Scatter);
		}
		let blocks = blocks
			.filter(|blocks| blocks.len() == self.size)
			.ok_or_else(|| Error::Protocol("group root must scatter one block per member".into()))?;
		let mut blocks = blocks.into_iter();
		let own = blocks.next().unwrap_or_default();
		for (rank, block) in blocks.enumerate() {
			self.comm.send(self.world_rank(rank + 1), Tag::Scatter, block)?;
		}
		Ok(own)
	}

	/// Blocks until every member has reached the barrier.
	pub fn barrier(&self) -> Result<()> {
		self.all_gather(Vec::new()).map(drop)
	}

	/// Sends `payload` to member `peer` and returns the payload `peer` sent back.
	///
	/// Both peers must call this with each other's rank.
	pub fn exchange(&self, peer: usize, payload: Vec<u8>) -> Result<Vec<u8>> {
		if peer >= self.size || peer == self.rank() {
			return Err(Error::Protocol(format!(
				"member {} cannot exchange with member {} of {}",
				self.rank(),
				peer,
				self.size
			)));
		}
		self.comm.exchange(self.world_rank(peer), Tag::Exchange, payload)
	}

	/// Collects one count per member on every member.
	pub fn all_gather_counts(&self, count: usize) -> Result<Vec<usize>> {
		self.all_gather(encode_count(count))?
			.iter()
			.map(|payload| match decode_counts(payload)?[..] {
				[count] => Ok(count),
				ref counts => Err(Error::Malformed(format!(
					"expected one count, got {}",
					counts.len()
				))),
			})
			.collect()
	}

	/// Collects several counts per member on every member.
	pub fn all_gather_count_tuples(&self, counts: &[usize]) -> Result<Vec<Vec<usize>>> {
		let counts = counts.iter().map(|&count| count as u64).collect::<Vec<_>>();
		self.all_gather(encode(&counts))?
			.iter()
			.map(|payload| decode_counts(payload))
			.collect()
	}

	/// Sends the root's value to every member.
	pub fn broadcast_scalar<T: Scalar>(&self, value: Option<T>) -> Result<T> {
		decode_one(&self.broadcast(value.map(|value| encode(&[value])))?)
	}

	/// Collects the concatenation of the members' values at the root.
	pub fn gather_scalars<T: Scalar>(&self, values: &[T]) -> Result<Option<Vec<T>>> {
		self.gather(encode(values))?
			.map(|payloads| {
				payloads.iter().try_fold(Vec::new(), |mut all, payload| {
					all.extend(decode::<T>(payload)?);
					Ok::<_, Error>(all)
				})
			})
			.transpose()
	}
}

#[cfg(test)]
mod test {
	use super::ProcessGroup;
	use crate::{
		Error,
		comm::Communicator,
		local::{self, LocalComm},
		partition::Side,
	};

	#[test]
	fn not_power_of_two() {
		for comm in LocalComm::cluster(3) {
			assert!(matches!(ProcessGroup::world(&comm), Err(Error::ProcessCount(3))));
		}
	}

	#[test]
	fn splits_down_to_terminal() {
		let results = local::run(8, |comm| {
			let mut group = ProcessGroup::world(&comm)?;
			let mut sides = Vec::new();
			while !group.is_terminal() {
				sides.push(group.side());
				group = group.split();
			}
			assert_eq!(group.rank(), 0);
			assert_eq!(group.depth(), 3);
			Ok::<_, Error>(sides)
		})
		.unwrap();
		use Side::{Lower, Upper};
		assert_eq!(results[0].as_ref().unwrap(), &vec![Lower, Lower, Lower]);
		assert_eq!(results[5].as_ref().unwrap(), &vec![Upper, Lower, Upper]);
		assert_eq!(results[7].as_ref().unwrap(), &vec![Upper, Upper, Upper]);
	}

	#[test]
	fn collectives_within_halves() {
		let results = local::run(4, |comm| {
			let world = ProcessGroup::world(&comm)?;
			let half = world.split();
			let ranks = half.all_gather_counts(comm.rank())?;
			let root = half.broadcast_scalar((half.rank() == 0).then_some(comm.rank() as f64))?;
			let gathered = half.gather_scalars(&[comm.rank() as f32, -1.0])?;
			let scattered = world.scatter(
				(world.rank() == 0).then(|| (0..4u8).map(|rank| vec![rank; 2]).collect()),
			)?;
			let peer = half.exchange(1 - half.rank(), vec![comm.rank() as u8])?;
			world.barrier()?;
			Ok::<_, Error>((ranks, root, gathered, scattered, peer))
		})
		.unwrap()
		.into_iter()
		.collect::<Result<Vec<_>, _>>()
		.unwrap();
		assert_eq!(results[0].0, vec![0, 1]);
		assert_eq!(results[3].0, vec![2, 3]);
		assert_eq!(results[1].1, 0.0);
		assert_eq!(results[3].1, 2.0);
		assert_eq!(results[2].2, Some(vec![2.0, -1.0, 3.0, -1.0]));
		assert_eq!(results[3].2, None);
		assert_eq!(results[2].3, vec![2, 2]);
		assert_eq!(results[0].4, vec![1]);
		assert_eq!(results[3].4, vec![2]);
	}

	#[test]
	fn counts_beyond_u32() {
		let results = local::run(2, |comm| {
			let world = ProcessGroup::world(&comm)?;
			world.all_gather_counts(usize::MAX - comm.rank())
		})
		.unwrap();
		for counts in results {
			assert_eq!(counts.unwrap(), vec![usize::MAX, usize::MAX - 1]);
		}
	}

	#[test]
	fn exchange_with_self() {
		let results = local::run(2, |comm| {
			let world = ProcessGroup::world(&comm)?;
			world.exchange(world.rank(), Vec::new())
		})
		.unwrap();
		assert!(results.iter().all(|result| matches!(result, Err(Error::Protocol(_)))));
	}
}
