//! Collective reductions across partitions
//!
//! Every partition of a decomposed system runs the same solver loop on its
//! local cells. The loops stay in lock-step because every convergence
//! decision is taken on globally reduced values: the helpers here
//! ([`g_sum`], [`g_sum_mag`], [`g_sum_prod`], [`g_average`], ...) all go
//! through a [`Communicator`] all-reduce.
//!
//! Two communicators are provided:
//! - [`SerialCommunicator`]: a single partition, reductions are identities
//! - [`ThreadCommunicator`]: `N` partitions as threads of one process
//! - `MpiCommunicator` (feature `mpi`): one partition per MPI process
//!
//! A rank that fails between collectives must call
//! [`Communicator::abort`], otherwise its peers wait forever for it.
//! [`solve`](crate::solve) does this on every error path.

use crate::error::{LduError, Result};
use crate::performance::SolverPerformance;
use crate::traits::{Scalar, VectorSpace};
use ndarray::Array1;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

/// Reduction operator of an all-reduce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    /// Element-wise sum
    Sum,
    /// Element-wise maximum
    Max,
    /// Element-wise minimum
    Min,
}

impl ReduceOp {
    #[inline]
    fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            ReduceOp::Sum => a + b,
            ReduceOp::Max => a.max(b),
            ReduceOp::Min => a.min(b),
        }
    }
}

/// Collective communication between the partitions of a solve.
///
/// `all_reduce` is a synchronisation point: every rank must call it with a
/// buffer of the same length before any rank returns.
pub trait Communicator: Send + Sync {
    /// Index of this partition
    fn rank(&self) -> usize;

    /// Number of partitions
    fn n_procs(&self) -> usize;

    /// Combine `values` element-wise across all ranks; every rank receives the result
    fn all_reduce(&self, values: &mut [f64], op: ReduceOp) -> Result<()>;

    /// Give up on the group after a local failure.
    ///
    /// Peers blocked in, or later entering, a collective get
    /// [`LduError::Aborted`]. A serial communicator has no peers to release.
    fn abort(&self) {}

    /// True if there is more than one partition
    fn is_parallel(&self) -> bool {
        self.n_procs() > 1
    }

    /// True on rank 0
    fn is_master(&self) -> bool {
        self.rank() == 0
    }
}

/// A single partition.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn n_procs(&self) -> usize {
        1
    }

    fn all_reduce(&self, _values: &mut [f64], _op: ReduceOp) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct GroupState {
    slots: Vec<Vec<f64>>,
    arrived: usize,
    generation: u64,
    aborted_by: Option<usize>,
}

/// Shared state of a thread group: contribution slots and an abortable barrier
#[derive(Debug)]
struct ThreadGroup {
    n_procs: usize,
    state: Mutex<GroupState>,
    released: Condvar,
}

impl ThreadGroup {
    fn lock(&self) -> MutexGuard<'_, GroupState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Block until every rank has arrived or one has aborted
    fn wait<'g>(&'g self, mut state: MutexGuard<'g, GroupState>) -> Result<MutexGuard<'g, GroupState>> {
        if let Some(rank) = state.aborted_by {
            return Err(LduError::Aborted { rank });
        }
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.n_procs {
            state.arrived = 0;
            state.generation += 1;
            self.released.notify_all();
            return Ok(state);
        }
        while state.generation == generation {
            if let Some(rank) = state.aborted_by {
                return Err(LduError::Aborted { rank });
            }
            state = self
                .released
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        Ok(state)
    }
}

/// One rank of a group of partitions living on threads of the same process.
///
/// Contributions are combined in rank order, so every rank obtains
/// bit-identical results. A rank whose thread panics aborts the group when
/// its communicator is dropped.
#[derive(Debug, Clone)]
pub struct ThreadCommunicator {
    rank: usize,
    group: Arc<ThreadGroup>,
}

impl ThreadCommunicator {
    /// Create the `n_procs` communicators of a group, indexed by rank
    pub fn group(n_procs: usize) -> Vec<Self> {
        let n_procs = n_procs.max(1);
        let group = Arc::new(ThreadGroup {
            n_procs,
            state: Mutex::new(GroupState {
                slots: vec![Vec::new(); n_procs],
                arrived: 0,
                generation: 0,
                aborted_by: None,
            }),
            released: Condvar::new(),
        });
        (0..n_procs)
            .map(|rank| Self {
                rank,
                group: Arc::clone(&group),
            })
            .collect()
    }
}

impl Communicator for ThreadCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn n_procs(&self) -> usize {
        self.group.n_procs
    }

    fn all_reduce(&self, values: &mut [f64], op: ReduceOp) -> Result<()> {
        let mut state = self.group.lock();
        state.slots[self.rank].clear();
        state.slots[self.rank].extend_from_slice(values);
        let state = self.group.wait(state)?;

        let outcome = {
            let slots = &state.slots;
            match slots.iter().find(|s| s.len() != values.len()) {
                Some(bad) => Err(LduError::size_mismatch(
                    "all-reduce buffer",
                    values.len(),
                    bad.len(),
                )),
                None => {
                    for (i, v) in values.iter_mut().enumerate() {
                        *v = slots[1..]
                            .iter()
                            .fold(slots[0][i], |acc, s| op.combine(acc, s[i]));
                    }
                    Ok(())
                }
            }
        };

        // slots must not be overwritten by the next reduction before all ranks read them
        drop(self.group.wait(state)?);
        outcome
    }

    fn abort(&self) {
        let mut state = self.group.lock();
        if state.aborted_by.is_none() {
            log::warn!("rank {} aborted the communicator group", self.rank);
            state.aborted_by = Some(self.rank);
        }
        self.group.released.notify_all();
    }
}

impl Drop for ThreadCommunicator {
    fn drop(&mut self) {
        if thread::panicking() {
            self.abort();
        }
    }
}

/// Global sum of a local value
pub fn g_sum<T: Scalar>(comm: &dyn Communicator, local: T) -> Result<T> {
    reduce_scalar(comm, local, ReduceOp::Sum)
}

/// Global maximum of a local value
pub fn g_max<T: Scalar>(comm: &dyn Communicator, local: T) -> Result<T> {
    reduce_scalar(comm, local, ReduceOp::Max)
}

/// Global sum of magnitudes of a field
pub fn g_sum_mag<T: Scalar>(comm: &dyn Communicator, field: &Array1<T>) -> Result<T> {
    g_sum(comm, field.iter().map(|v| v.abs()).sum())
}

/// Global inner product of two fields
pub fn g_sum_prod<T: Scalar>(comm: &dyn Communicator, a: &Array1<T>, b: &Array1<T>) -> Result<T> {
    LduError::check_len("inner product operand", a.len(), b.len())?;
    g_sum(comm, a.dot(b))
}

/// Global sum of squares of a field
pub fn g_sum_sqr<T: Scalar>(comm: &dyn Communicator, field: &Array1<T>) -> Result<T> {
    g_sum(comm, field.dot(field))
}

/// Global average of a field over all cells of all partitions (zero if there are none)
pub fn g_average<T: Scalar>(comm: &dyn Communicator, field: &Array1<T>) -> Result<T> {
    let mut buffer = [
        field.iter().copied().sum::<T>().to_f64_lossy(),
        field.len() as f64,
    ];
    comm.all_reduce(&mut buffer, ReduceOp::Sum)?;
    if buffer[1] > 0.0 {
        Ok(T::from_f64_lossy(buffer[0] / buffer[1]))
    } else {
        Ok(T::zero())
    }
}

fn reduce_scalar<T: Scalar>(comm: &dyn Communicator, local: T, op: ReduceOp) -> Result<T> {
    if !comm.is_parallel() {
        return Ok(local);
    }
    let mut buffer = [local.to_f64_lossy()];
    comm.all_reduce(&mut buffer, op)?;
    Ok(T::from_f64_lossy(buffer[0]))
}

/// Merge a solve record across partitions with the semantics of
/// [`performance::max`](crate::performance::max).
///
/// A serial communicator leaves the record untouched.
pub fn reduce_performance<T: VectorSpace>(
    comm: &dyn Communicator,
    sp: &mut SolverPerformance<T>,
) -> Result<()> {
    if !comm.is_parallel() {
        return Ok(());
    }

    let n = T::N_COMPONENTS;
    let mut buffer = Vec::with_capacity(2 * n + 3);
    buffer.extend((0..n).map(|c| sp.initial_residual.component(c).to_f64_lossy()));
    buffer.extend((0..n).map(|c| sp.final_residual.component(c).to_f64_lossy()));
    buffer.push(sp.n_iterations as f64);
    buffer.push(if sp.converged { 0.0 } else { 1.0 });
    buffer.push(if sp.singular() { 1.0 } else { 0.0 });

    comm.all_reduce(&mut buffer, ReduceOp::Max)?;

    let cmpt = |v: f64| <T::Cmpt as Scalar>::from_f64_lossy(v);
    sp.initial_residual = T::from_fn(|c| cmpt(buffer[c]));
    sp.final_residual = T::from_fn(|c| cmpt(buffer[n + c]));
    sp.n_iterations = buffer[2 * n] as usize;
    sp.converged = buffer[2 * n + 1] == 0.0;
    let singular = buffer[2 * n + 2] > 0.0;
    sp.singular.iter_mut().for_each(|s| *s = singular);
    Ok(())
}
