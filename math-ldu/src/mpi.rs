//! Message-passing communicator (feature `mpi`)
//!
//! One partition per MPI process, reductions through `MPI_Allreduce` via
//! [`msgpass`]. The MPI engine must be initialised by the application before
//! [`MpiCommunicator::world`] is called, with at least serialised thread
//! support:
//!
//! ```ignore
//! use msgpass::{mpi_finalize, mpi_init_thread, MpiThread};
//!
//! mpi_init_thread(MpiThread::Serialized)?;
//! let comm = math_ldu::MpiCommunicator::world()?;
//! // ... SolverContext::new(..).with_communicator(&comm)
//! drop(comm);
//! mpi_finalize()?;
//! ```

use crate::error::{LduError, Result};
use crate::parallel::{Communicator, ReduceOp};
use msgpass::MpiOp;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

fn transport(e: impl fmt::Display) -> LduError {
    LduError::Communication {
        reason: e.to_string(),
    }
}

/// All processes of `MPI_COMM_WORLD`.
pub struct MpiCommunicator {
    rank: usize,
    n_procs: usize,
    comm: Mutex<msgpass::Communicator>,
}

// SAFETY: MPI runs with serialised thread support and every call on the
// handle goes through the mutex.
unsafe impl Send for MpiCommunicator {}
unsafe impl Sync for MpiCommunicator {}

impl MpiCommunicator {
    /// Communicator over every process of the job
    pub fn world() -> Result<Self> {
        let mut comm = msgpass::Communicator::new().map_err(transport)?;
        let rank = comm.rank().map_err(transport)?;
        let n_procs = comm.size().map_err(transport)?;
        log::debug!("MPI rank {rank} of {n_procs}");
        Ok(Self {
            rank,
            n_procs,
            comm: Mutex::new(comm),
        })
    }

    fn lock(&self) -> MutexGuard<'_, msgpass::Communicator> {
        self.comm
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for MpiCommunicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpiCommunicator")
            .field("rank", &self.rank)
            .field("n_procs", &self.n_procs)
            .finish()
    }
}

impl Communicator for MpiCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn n_procs(&self) -> usize {
        self.n_procs
    }

    fn all_reduce(&self, values: &mut [f64], op: ReduceOp) -> Result<()> {
        let op = match op {
            ReduceOp::Sum => MpiOp::Sum,
            ReduceOp::Max => MpiOp::Max,
            ReduceOp::Min => MpiOp::Min,
        };
        let local = values.to_vec();
        self.lock()
            .allreduce_f64(values, &local, op)
            .map_err(transport)
    }

    /// Terminates this process. The MPI launcher then tears down the other
    /// ranks, which cannot be released from a pending collective otherwise.
    fn abort(&self) {
        if self.n_procs > 1 {
            log::error!("rank {} aborting the MPI job", self.rank);
            std::process::abort();
        }
    }
}
