//! A 1-D Laplacian split over two thread-backed partitions
//!
//! Each partition holds five cells. The face between cell 4 of rank 0 and
//! cell 0 of rank 1 becomes a coupled interface whose neighbour values are
//! exchanged through shared memory.

use approx::assert_relative_eq;
use math_ldu::{
    Communicator, Dictionary, InterfaceField, LduAddressing, LduError, LduInterfaceFields, LduMatrix,
    SelectionTables, SolverContext, SolverPerformance, ThreadCommunicator, solve,
};
use ndarray::Array1;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

const CELLS_PER_RANK: usize = 5;

/// Halo exchange between two ranks
struct Exchange {
    barrier: Barrier,
    slots: [Mutex<Vec<f64>>; 2],
}

/// Coupling of a boundary cell to the adjacent cell of the other rank
struct ProcessorInterface {
    rank: usize,
    face_cells: Vec<usize>,
    exchange: Arc<Exchange>,
}

impl InterfaceField<f64> for ProcessorInterface {
    fn type_name(&self) -> &'static str {
        "processor"
    }

    fn face_cells(&self) -> &[usize] {
        &self.face_cells
    }

    fn init_matrix_update(&self, psi: &Array1<f64>) {
        let mut slot = self.exchange.slots[self.rank].lock().unwrap();
        slot.clear();
        slot.extend(self.face_cells.iter().map(|&c| psi[c]));
    }

    fn update_matrix(&self, result: &mut Array1<f64>, add: bool, _psi: &Array1<f64>, coeffs: &Array1<f64>) {
        self.exchange.barrier.wait();
        {
            let neighbour = self.exchange.slots[1 - self.rank].lock().unwrap();
            for (k, &cell) in self.face_cells.iter().enumerate() {
                let contribution = coeffs[k] * neighbour[k];
                if add {
                    result[cell] += contribution;
                } else {
                    result[cell] -= contribution;
                }
            }
        }
        self.exchange.barrier.wait();
    }
}

fn local_matrix() -> LduMatrix<f64> {
    let n = CELLS_PER_RANK;
    let addr = LduAddressing::new(n, (0..n - 1).collect(), (1..n).collect()).unwrap();
    let mut m = LduMatrix::new(Arc::new(addr));
    m.set_diag(Array1::from_elem(n, 2.0)).unwrap();
    m.set_upper(Array1::from_elem(n - 1, -1.0)).unwrap();
    m
}

fn controls() -> Dictionary {
    Dictionary::new("p")
        .with("solver", "PCG")
        .with("preconditioner", "DIC")
        .with("tolerance", 1e-12)
        .with("relTol", 0.0)
        .with("log", 0)
}

fn solve_on_rank(comm: ThreadCommunicator, exchange: Arc<Exchange>) -> (SolverPerformance<f64>, Array1<f64>) {
    let rank = comm.rank();
    let m = local_matrix();
    let boundary_cell = if rank == 0 { CELLS_PER_RANK - 1 } else { 0 };

    let mut interfaces = LduInterfaceFields::new();
    interfaces
        .push(
            Box::new(ProcessorInterface {
                rank,
                face_cells: vec![boundary_cell],
                exchange,
            }),
            Array1::from_elem(1, 1.0),
            Array1::from_elem(1, 1.0),
        )
        .unwrap();

    let tables = SelectionTables::standard();
    let dict = controls();
    let source = Array1::from_elem(CELLS_PER_RANK, 1.0);
    let mut psi = Array1::zeros(CELLS_PER_RANK);

    let ctx = SolverContext::new("p", &m, &interfaces, &dict, &tables).with_communicator(&comm);
    let sp = solve(ctx, &mut psi, &source).unwrap();
    (sp, psi)
}

#[test]
fn ranks_agree_and_match_serial_solution() {
    let exchange = Arc::new(Exchange {
        barrier: Barrier::new(2),
        slots: [Mutex::new(Vec::new()), Mutex::new(Vec::new())],
    });

    let handles: Vec<_> = ThreadCommunicator::group(2)
        .into_iter()
        .map(|comm| {
            let exchange = Arc::clone(&exchange);
            thread::spawn(move || solve_on_rank(comm, exchange))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let (sp0, psi0) = &results[0];
    let (sp1, psi1) = &results[1];
    assert!(sp0.converged && sp1.converged);
    assert_eq!(sp0.n_iterations, sp1.n_iterations);
    assert_eq!(sp0.initial_residual, sp1.initial_residual);
    assert_eq!(sp0.final_residual, sp1.final_residual);

    // the joined field solves the 10-cell Dirichlet chain: x_i = (i + 1)(10 - i) / 2
    let joined: Vec<f64> = psi0.iter().chain(psi1.iter()).copied().collect();
    for (i, &x) in joined.iter().enumerate() {
        let exact = (i as f64 + 1.0) * (10.0 - i as f64) / 2.0;
        assert_relative_eq!(x, exact, max_relative = 1e-8);
    }
}

#[test]
fn failing_rank_releases_its_peer() {
    let handles: Vec<_> = ThreadCommunicator::group(2)
        .into_iter()
        .map(|comm| {
            thread::spawn(move || {
                let m = local_matrix();
                let interfaces = LduInterfaceFields::new();
                let tables = SelectionTables::standard();
                let dict = controls();
                let source = Array1::from_elem(CELLS_PER_RANK, 1.0);
                // rank 1 passes a field of the wrong size and fails before any reduction
                let cells = if comm.rank() == 1 { 3 } else { CELLS_PER_RANK };
                let mut psi = Array1::zeros(cells);

                let ctx = SolverContext::new("p", &m, &interfaces, &dict, &tables).with_communicator(&comm);
                solve(ctx, &mut psi, &source)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results[0].as_ref().unwrap_err(), &LduError::Aborted { rank: 1 });
    assert!(results[1].as_ref().unwrap_err().is_dimension_error());
}

#[test]
fn serial_communicator_is_not_parallel() {
    let comm = math_ldu::SerialCommunicator;
    assert_eq!(comm.rank(), 0);
    assert_eq!(comm.n_procs(), 1);
    assert!(!comm.is_parallel());
    assert!(comm.is_master());
}
