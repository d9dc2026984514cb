//! In-process substrate running every rank on its own thread.
//!
//! Each ordered pair of ranks is connected by an unbounded channel, so sends never block and
//! messages between two ranks arrive in order. When a rank returns or panics its endpoint is
//! dropped, and every rank blocked on a message from it fails with [`Error::Disconnected`]
//! instead of waiting forever.

use crate::{
	Error, Result,
	comm::{Communicator, Tag},
};
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{Mutex, RwLock};
use std::{collections::VecDeque, sync::Arc, thread};

#[derive(Debug)]
struct Envelope {
	tag: Tag,
	payload: Vec<u8>,
}

/// Endpoint of one rank of an in-process run.
#[derive(Debug)]
pub struct LocalComm {
	rank: usize,
	senders: Vec<Sender<Envelope>>,
	receivers: Vec<Receiver<Envelope>>,
	// Messages received while waiting for another tag, per source.
	pending: Mutex<Vec<VecDeque<Envelope>>>,
	windows: Arc<Vec<RwLock<Vec<u8>>>>,
}

impl LocalComm {
	/// Creates the connected endpoints of `size` ranks, indexed by rank.
	pub fn cluster(size: usize) -> Vec<LocalComm> {
		let windows = Arc::new((0..size).map(|_| RwLock::new(Vec::new())).collect::<Vec<_>>());
		// `channels[source][dest]`
		let mut channels = (0..size)
			.map(|_| (0..size).map(|_| unbounded()).collect::<Vec<_>>())
			.collect::<Vec<_>>();
		let senders = channels
			.iter()
			.map(|row| row.iter().map(|(sender, _)| sender.clone()).collect::<Vec<_>>())
			.collect::<Vec<_>>();
		let mut receivers = (0..size).map(|_| Vec::with_capacity(size)).collect::<Vec<_>>();
		for row in channels.iter_mut() {
			for (dest, (_, receiver)) in row.drain(..).enumerate() {
				receivers[dest].push(receiver);
			}
		}
		senders
			.into_iter()
			.zip(receivers)
			.enumerate()
			.map(|(rank, (senders, receivers))| LocalComm {
				rank,
				senders,
				receivers,
				pending: Mutex::new((0..size).map(|_| VecDeque::new()).collect()),
				windows: Arc::clone(&windows),
			})
			.collect()
	}

	fn check(&self, peer: usize) -> Result<()> {
		if peer < self.size() {
			Ok(())
		} else {
			Err(Error::Protocol(format!(
				"rank {} addressed rank {} of {}",
				self.rank,
				peer,
				self.size()
			)))
		}
	}
}

impl Communicator for LocalComm {
	#[inline]
	fn rank(&self) -> usize {
		self.rank
	}
	#[inline]
	fn size(&self) -> usize {
		self.senders.len()
	}

	fn send(&self, dest: usize, tag: Tag, payload: Vec<u8>) -> Result<()> {
		self.check(dest)?;
		self.senders[dest]
			.send(Envelope { tag, payload })
			.map_err(|_| Error::Disconnected { rank: dest })
	}

	fn receive(&self, source: usize, tag: Tag) -> Result<Vec<u8>> {
		self.check(source)?;
		let mut pending = self.pending.lock();
		let queue = &mut pending[source];
		if let Some(position) = queue.iter().position(|envelope| envelope.tag == tag) {
			if let Some(envelope) = queue.remove(position) {
				return Ok(envelope.payload);
			}
		}
		loop {
			let envelope = self.receivers[source]
				.recv()
				.map_err(|_| Error::Disconnected { rank: source })?;
			if envelope.tag == tag {
				return Ok(envelope.payload);
			}
			queue.push_back(envelope);
		}
	}

	fn expose(&self, payload: Vec<u8>) -> Result<()> {
		*self.windows[self.rank].write() = payload;
		Ok(())
	}

	fn fence(&self) -> Result<()> {
		for dest in (0..self.size()).filter(|&dest| dest != self.rank) {
			self.send(dest, Tag::Fence, Vec::new())?;
		}
		for source in (0..self.size()).filter(|&source| source != self.rank) {
			self.receive(source, Tag::Fence)?;
		}
		Ok(())
	}

	fn get(&self, target: usize) -> Result<Vec<u8>> {
		self.check(target)?;
		Ok(self.windows[target].read().clone())
	}
}

/// Runs `f` once per rank of a `size`-rank in-process run and returns the results by rank.
///
/// # Errors
///
/// Returns [`Error::ProcessCount`] without running `f` unless `size` is a power of two, and
/// [`Error::Panicked`] with the lowest rank that panicked.
///
/// # Examples
///
/// ```
/// use ndarray_pivot::{comm::Communicator, group::ProcessGroup, local};
///
/// let sums = local::run(4, |comm| {
/// 	let world = ProcessGroup::world(&comm)?;
/// 	world.all_gather_counts(comm.rank()).map(|ranks| ranks.iter().sum::<usize>())
/// })
/// .unwrap();
/// assert!(sums.into_iter().all(|sum| sum.unwrap() == 6));
/// ```
pub fn run<F, R>(size: usize, f: F) -> Result<Vec<R>>
where
	F: Fn(LocalComm) -> R + Sync,
	R: Send,
{
	if !size.is_power_of_two() {
		return Err(Error::ProcessCount(size));
	}
	let f = &f;
	thread::scope(|scope| {
		let handles = LocalComm::cluster(size)
			.into_iter()
			.map(|comm| {
				let rank = comm.rank;
				thread::Builder::new()
					.name(format!("rank-{rank}"))
					.spawn_scoped(scope, move || f(comm))
					.map_err(Error::Io)
			})
			.collect::<Result<Vec<_>>>()?;
		tracing::trace!(size, "spawned ranks");
		let mut results = Vec::with_capacity(size);
		let mut panicked = None;
		for (rank, handle) in handles.into_iter().enumerate() {
			match handle.join() {
				Ok(result) => results.push(result),
				Err(_) => {
					panicked.get_or_insert(rank);
				}
			}
		}
		match panicked {
			Some(rank) => Err(Error::Panicked { rank }),
			None => Ok(results),
		}
	})
}

#[cfg(test)]
mod test {
	use super::{LocalComm, run};
	use crate::{
		Error,
		comm::{Communicator, Tag},
	};

	#[test]
	fn out_of_order_tags() {
		let results = run(2, |comm| -> crate::Result<Vec<u8>> {
			if comm.rank() == 0 {
				comm.send(1, Tag::Gather, vec![1])?;
				comm.send(1, Tag::Exchange, vec![2])?;
				Ok(Vec::new())
			} else {
				let mut exchanged = comm.receive(0, Tag::Exchange)?;
				exchanged.extend(comm.receive(0, Tag::Gather)?);
				Ok(exchanged)
			}
		})
		.unwrap();
		assert_eq!(results[1].as_ref().unwrap(), &vec![2, 1]);
	}

	#[test]
	fn windows_across_fences() {
		let results = run(4, |comm| -> crate::Result<Vec<u8>> {
			comm.expose(vec![comm.rank() as u8 * 10])?;
			comm.fence()?;
			let read = comm.get((comm.rank() + 1) % comm.size())?;
			comm.fence()?;
			Ok(read)
		})
		.unwrap();
		let reads = results.into_iter().map(|read| read.unwrap()[0]).collect::<Vec<_>>();
		assert_eq!(reads, vec![10, 20, 30, 0]);
	}

	#[test]
	fn departed_peer_disconnects() {
		let results = run(2, |comm| {
			if comm.rank() == 0 {
				Err(Error::EmptyPointSet)
			} else {
				comm.receive(0, Tag::Broadcast)
			}
		})
		.unwrap();
		assert!(matches!(results[1], Err(Error::Disconnected { rank: 0 })));
	}

	#[test]
	fn panicking_rank() {
		let result = run(2, |comm| {
			if comm.rank() == 1 {
				panic!("rank 1 fails");
			}
			comm.receive(1, Tag::Gather).map(|_| ())
		});
		assert!(matches!(result, Err(Error::Panicked { rank: 1 })));
	}

	#[test]
	fn process_count() {
		for size in [0, 3, 6] {
			let result = run(size, |_| -> usize { unreachable!("no rank runs") });
			assert!(matches!(result, Err(Error::ProcessCount(count)) if count == size));
		}
		assert_eq!(run(1, |comm| comm.size()).unwrap(), vec![1]);
	}

	#[test]
	fn addressing_outside() {
		let comms = LocalComm::cluster(1);
		assert!(matches!(
			comms[0].send(1, Tag::Gather, Vec::new()),
			Err(Error::Protocol(_))
		));
	}
}
