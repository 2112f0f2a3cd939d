mod common;

use anyhow::Result;
use graphvm::{create_interpreter, profiler};

use common::*;

// The profiler is process-global, so the whole lifecycle lives in one test.
#[test]
fn profiler_lifecycle() -> Result<()> {
    let prof = profiler();
    prof.clear_stats();
    assert!(!prof.is_on(), "profiler starts out off");

    let (graph, outputs) = add_graph();
    let n_instrs = graph.n_instrs();
    let mut interp = create_interpreter(graph, outputs, 1)?;
    let args = || {
        [
            tensor_f32(&[3], vec![1.0, 2.0, 3.0]),
            tensor_f32(&[3], vec![4.0, 5.0, 6.0]),
        ]
    };

    // Off: runs leave no trace.
    interp.run(&args())?;
    assert!(prof.instr_stats().is_empty());
    assert_eq!(prof.t_total(), 0.0);

    prof.start();
    assert!(prof.is_on());
    for _ in 0..3 {
        interp.run(&args())?;
    }
    prof.stop();

    // One record per instruction identity, each fired three times.
    let stats = prof.instr_stats();
    assert_eq!(stats.len(), n_instrs);
    for entry in &stats {
        assert_eq!(entry.count, 3, "instr {}", entry.instr_repr);
        assert!(entry.time_total >= 0.0);
    }

    // Aggregate equals the sum of the per-instruction totals.
    let sum: f64 = stats.iter().map(|entry| entry.time_total).sum();
    assert!((prof.t_total() - sum).abs() < 1e-9);

    // Snapshot ordering: sorted by total time descending.
    for pair in stats.windows(2) {
        assert!(pair[0].time_total >= pair[1].time_total);
    }

    // Records serialize for external tooling.
    let json = serde_json::to_string(&stats)?;
    assert!(json.contains("add x y"));

    prof.print_stats();

    // Stopped: further runs add nothing.
    interp.run(&args())?;
    assert_eq!(prof.instr_stats().len(), n_instrs);
    assert_eq!(
        prof.instr_stats().iter().map(|e| e.count).sum::<u64>(),
        3 * n_instrs as u64
    );

    prof.clear_stats();
    assert!(prof.instr_stats().is_empty());
    assert_eq!(prof.t_total(), 0.0);
    Ok(())
}
