//! MPI communicator on the processes of the current job
//!
//! Runs as a single rank under plain `cargo test --features mpi`, or on every
//! rank when launched through `mpirun`.

#![cfg(feature = "mpi")]

use math_ldu::{
    Communicator, Dictionary, LduAddressing, LduInterfaceFields, LduMatrix, MpiCommunicator,
    ReduceOp, SelectionTables, SolverContext, solve,
};
use msgpass::{MpiThread, mpi_finalize, mpi_init_thread};
use ndarray::Array1;
use std::sync::Arc;

#[test]
fn world_reductions_and_solve() {
    mpi_init_thread(MpiThread::Serialized).unwrap();
    {
        let comm = MpiCommunicator::world().unwrap();
        let n_procs = comm.n_procs();
        assert!(comm.rank() < n_procs);

        let mut values = [1.0, comm.rank() as f64];
        comm.all_reduce(&mut values, ReduceOp::Sum).unwrap();
        assert_eq!(values[0], n_procs as f64);

        let mut max = [comm.rank() as f64];
        comm.all_reduce(&mut max, ReduceOp::Max).unwrap();
        assert_eq!(max[0], (n_procs - 1) as f64);

        // uncoupled per-rank blocks: every rank still takes the same decisions
        let n = 6;
        let addr = LduAddressing::new(n, (0..n - 1).collect(), (1..n).collect()).unwrap();
        let mut m = LduMatrix::new(Arc::new(addr));
        m.set_diag(Array1::from_elem(n, 3.0)).unwrap();
        m.set_upper(Array1::from_elem(n - 1, -1.0)).unwrap();
        let interfaces = LduInterfaceFields::new();
        let tables = SelectionTables::standard();
        let dict = Dictionary::new("p")
            .with("solver", "PCG")
            .with("preconditioner", "DIC")
            .with("tolerance", 1e-12)
            .with("log", 0);

        let mut psi = Array1::zeros(n);
        let ctx = SolverContext::new("p", &m, &interfaces, &dict, &tables).with_communicator(&comm);
        let sp = solve(ctx, &mut psi, &Array1::from_elem(n, 1.0)).unwrap();
        assert!(sp.converged);
    }
    mpi_finalize().unwrap();
}
