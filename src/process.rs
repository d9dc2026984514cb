//! MPI substrate running one rank per process.
//!
//! Point-to-point messages map onto tagged MPI messages, which MPI already matches by source and
//! tag in send order. The window of a rank is emulated: a fence all-gathers the exposed content of
//! every rank, and reads between two fences are served from that snapshot.

use crate::{
	Error, Result,
	comm::{Communicator, Tag},
};
use mpi::{
	Count, Rank,
	datatype::PartitionMut,
	request,
	topology::SimpleCommunicator,
	traits::{Communicator as _, CommunicatorCollectives, Destination, Source},
};
use parking_lot::Mutex;

/// Endpoint of one rank of an MPI run.
pub struct MpiComm {
	world: SimpleCommunicator,
	window: Mutex<Vec<u8>>,
	// Windows of all ranks as of the last fence.
	snapshot: Mutex<Vec<Vec<u8>>>,
}

impl MpiComm {
	/// Wraps `world`, typically `universe.world()` of [`mpi::initialize`].
	pub fn new(world: SimpleCommunicator) -> Self {
		Self {
			world,
			window: Mutex::new(Vec::new()),
			snapshot: Mutex::new(Vec::new()),
		}
	}

	fn peer(&self, peer: usize) -> Result<Rank> {
		Rank::try_from(peer)
			.ok()
			.filter(|_| peer < self.size())
			.ok_or_else(|| {
				Error::Protocol(format!(
					"rank {} addressed rank {} of {}",
					self.rank(),
					peer,
					self.size()
				))
			})
	}
}

fn mpi_tag(tag: Tag) -> mpi::Tag {
	mpi::Tag::from(tag as u8)
}

fn count(len: usize) -> Result<Count> {
	Count::try_from(len).map_err(|_| Error::Malformed(format!("window of {len} bytes")))
}

impl Communicator for MpiComm {
	#[inline]
	fn rank(&self) -> usize {
		self.world.rank() as usize
	}
	#[inline]
	fn size(&self) -> usize {
		self.world.size() as usize
	}

	fn send(&self, dest: usize, tag: Tag, payload: Vec<u8>) -> Result<()> {
		let dest = self.peer(dest)?;
		self.world
			.process_at_rank(dest)
			.send_with_tag(&payload[..], mpi_tag(tag));
		Ok(())
	}

	fn receive(&self, source: usize, tag: Tag) -> Result<Vec<u8>> {
		let source = self.peer(source)?;
		let (payload, _) = self
			.world
			.process_at_rank(source)
			.receive_vec_with_tag::<u8>(mpi_tag(tag));
		Ok(payload)
	}

	fn exchange(&self, peer: usize, tag: Tag, payload: Vec<u8>) -> Result<Vec<u8>> {
		let peer = self.world.process_at_rank(self.peer(peer)?);
		// A blocking send of both peers may wait forever on each other's receive.
		let received = request::scope(|scope| {
			let sent = peer.immediate_send_with_tag(scope, &payload[..], mpi_tag(tag));
			let (received, _) = peer.receive_vec_with_tag::<u8>(mpi_tag(tag));
			sent.wait();
			received
		});
		Ok(received)
	}

	fn expose(&self, payload: Vec<u8>) -> Result<()> {
		*self.window.lock() = payload;
		Ok(())
	}

	fn fence(&self) -> Result<()> {
		let window = self.window.lock();
		let mut lens = vec![0 as Count; self.size()];
		self.world.all_gather_into(&count(window.len())?, &mut lens[..]);

		let total = lens.iter().map(|&len| len as usize).sum();
		// Displacements are counts too.
		count(total)?;
		let displs = lens
			.iter()
			.scan(0, |offset, &len| {
				let displ = *offset;
				*offset += len;
				Some(displ)
			})
			.collect::<Vec<Count>>();
		let mut all = vec![0u8; total];
		let mut partition = PartitionMut::new(&mut all[..], &lens[..], &displs[..]);
		self.world.all_gather_varcount_into(&window[..], &mut partition);

		let mut offset = 0;
		*self.snapshot.lock() = lens
			.iter()
			.map(|&len| {
				let window = all[offset..offset + len as usize].to_vec();
				offset += len as usize;
				window
			})
			.collect();
		Ok(())
	}

	fn get(&self, target: usize) -> Result<Vec<u8>> {
		self.peer(target)?;
		self.snapshot
			.lock()
			.get(target)
			.cloned()
			.ok_or_else(|| Error::Protocol(format!("window of rank {target} read before a fence")))
	}
}

#[cfg(test)]
mod test {
	use super::MpiComm;
	use crate::{
		Config, Error, LocalPoints, Pivot,
		comm::{Communicator, Tag},
		group::ProcessGroup,
	};
	use ndarray::{arr1, arr2};

	// MPI is initialized once per process, so everything runs in one test as a singleton run.
	#[test]
	fn singleton() {
		let universe = mpi::initialize().unwrap();
		let comm = MpiComm::new(universe.world());
		if comm.size() != 1 {
			return;
		}

		assert_eq!(comm.rank(), 0);
		assert!(matches!(comm.send(1, Tag::Gather, Vec::new()), Err(Error::Protocol(_))));
		assert!(matches!(comm.get(0), Err(Error::Protocol(_))));
		assert_eq!(comm.exchange(0, Tag::Exchange, vec![1, 2, 3]).unwrap(), vec![1, 2, 3]);

		comm.expose(vec![7; 5]).unwrap();
		comm.fence().unwrap();
		comm.expose(Vec::new()).unwrap();
		assert_eq!(comm.get(0).unwrap(), vec![7; 5]);
		comm.fence().unwrap();
		assert_eq!(comm.get(0).unwrap(), Vec::<u8>::new());

		let world = ProcessGroup::world(&comm).unwrap();
		assert_eq!(world.all_gather_counts(42).unwrap(), vec![42]);

		let pivot = Pivot::new(arr1(&[0.0, 0.0])).unwrap();
		let mut local = LocalPoints::new(arr2(&[[3.0, 4.0], [1.0, 0.0]]), &pivot).unwrap();
		let report = crate::partition(&comm, &mut local, &pivot, &Config::default()).unwrap();
		assert!(report.levels.is_empty());
		assert!(report.verdict.is_some_and(|verdict| verdict.is_ordered()));
	}
}
