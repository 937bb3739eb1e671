//! # Group Admin Benchmarks
//!
//! | Path | Expectation |
//! |------|-------------|
//! | Server / table lookup | Flat in fleet size |
//! | Startup replay | Linear in log length |
//! | Single move | Bounded by the log commit |

use criterion::{criterion_group, criterion_main};
use fg_tests::benchmarks::group_admin::{bench_registry_lookups, bench_replay, bench_service_moves};

criterion_group!(
    benches,
    bench_registry_lookups,
    bench_replay,
    bench_service_moves
);
criterion_main!(benches);
