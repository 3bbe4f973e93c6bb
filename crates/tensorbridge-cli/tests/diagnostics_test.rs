use tensorbridge_cli::diagnostics::{bench, leak_check};
use tensorbridge_runtime::BridgeConfig;

fn quiet() -> BridgeConfig {
    BridgeConfig::default().with_warn_on_leaks(false)
}

#[test]
fn test_leak_check_is_clean() {
    let report = leak_check(250, quiet()).unwrap();
    assert_eq!(report.tensors, 250);
    assert_eq!(report.allocations, 250);
    assert_eq!(report.releases, 250);
    assert!(report.is_clean(), "{report:?}");
}

#[test]
fn test_leak_check_zero() {
    let report = leak_check(0, quiet()).unwrap();
    assert_eq!(report.allocations, 0);
    assert!(report.is_clean());
}

#[test]
fn test_bench_runs_every_iteration() {
    let report = bench(50, quiet()).unwrap();
    assert_eq!(report.iterations, 50);
    assert!(report.ops_per_ms() > 0.0);
}
