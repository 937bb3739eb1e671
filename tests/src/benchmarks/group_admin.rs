//! # Group Admin Benchmarks
//!
//! Lookups are served from in-memory indexes and should stay flat as the
//! fleet grows. Mutations are dominated by the log commit.
//!
//! Conditions:
//! - 10k servers and 50k tables spread over 100 groups
//! - Lookups of assigned and unassigned servers
//! - Replay of a long log on startup

use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use fg_group_admin::{
    GroupAdminApi, GroupAdminConfig, GroupAdminService, GroupName, GroupRegistry,
    InMemoryMutationLog, Mutation, MutationRecord, NodeId, NoOpNotifier, SequenceNumber, ShardId,
};
use rand::Rng;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Records that build `groups` groups holding `servers` servers and
/// `tables` tables between them, moved in batches of 100.
pub fn fleet_records(groups: usize, servers: usize, tables: usize) -> Vec<MutationRecord> {
    let mut mutations = Vec::new();
    let names: Vec<GroupName> = (0..groups)
        .map(|g| GroupName::new(format!("group-{g}")).expect("valid name"))
        .collect();

    for name in &names {
        mutations.push(Mutation::AddGroup { name: name.clone() });
    }

    let server_ids: Vec<NodeId> = (0..servers).map(server_id).collect();
    for (i, chunk) in server_ids.chunks(100).enumerate() {
        mutations.push(Mutation::MoveServers {
            servers: chunk.iter().cloned().collect::<BTreeSet<_>>(),
            target: names[i % groups].clone(),
        });
    }

    let table_ids: Vec<ShardId> = (0..tables).map(table_id).collect();
    for (i, chunk) in table_ids.chunks(100).enumerate() {
        mutations.push(Mutation::MoveTables {
            tables: chunk.iter().cloned().collect::<BTreeSet<_>>(),
            target: names[i % groups].clone(),
        });
    }

    mutations
        .into_iter()
        .enumerate()
        .map(|(i, mutation)| MutationRecord {
            sequence: SequenceNumber(i as u64 + 1),
            mutation,
            committed_at_ms: 0,
        })
        .collect()
}

fn server_id(i: usize) -> NodeId {
    NodeId::parse(&format!("rs{i}.fleet.internal:16020")).expect("valid server")
}

fn table_id(i: usize) -> ShardId {
    ShardId::parse(&format!("ns{}:table{}", i % 10, i)).expect("valid table")
}

/// Registry lookups by server and table.
pub fn bench_registry_lookups(c: &mut Criterion) {
    let mut group = c.benchmark_group("fg-group-admin-lookups");

    for servers in [1_000usize, 10_000] {
        let records = fleet_records(100, servers, servers * 5);
        let registry = GroupRegistry::replay(&records).expect("replay fixture");
        let probes: Vec<NodeId> = (0..256)
            .map(|_| server_id(rand::thread_rng().gen_range(0..servers * 2)))
            .collect();
        let tables: Vec<ShardId> = (0..256)
            .map(|_| table_id(rand::thread_rng().gen_range(0..servers * 5)))
            .collect();

        group.throughput(Throughput::Elements(probes.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("group_of_node", servers),
            &probes,
            |b, probes| {
                b.iter(|| {
                    for node in probes {
                        black_box(registry.group_of_node(node));
                    }
                })
            },
        );
        group.bench_with_input(
            BenchmarkId::new("group_of_shard", servers),
            &tables,
            |b, tables| {
                b.iter(|| {
                    for shard in tables {
                        black_box(registry.group_of_shard(shard));
                    }
                })
            },
        );
    }

    group.finish();
}

/// Startup replay of a long log.
pub fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("fg-group-admin-replay");
    group.measurement_time(Duration::from_secs(10));

    for servers in [1_000usize, 10_000] {
        let records = fleet_records(100, servers, servers * 5);
        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(servers), &records, |b, records| {
            b.iter(|| black_box(GroupRegistry::replay(records).expect("replay")))
        });
    }

    group.finish();
}

/// Round trip of a server move through the service on an in-memory log.
pub fn bench_service_moves(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let service = runtime.block_on(async {
        let service = GroupAdminService::recover(
            Arc::new(InMemoryMutationLog::new()),
            Arc::new(NoOpNotifier),
            GroupAdminConfig::default(),
        )
        .await
        .expect("recover");
        service.add_group("bench").await.expect("add group");
        service
    });

    let mut group = c.benchmark_group("fg-group-admin-service");
    let mut flip = false;
    group.bench_function("move_servers_single", |b| {
        b.iter(|| {
            flip = !flip;
            let target = if flip { "bench" } else { "default" };
            runtime
                .block_on(service.move_servers(&["rs1:16020"], target))
                .expect("move")
        })
    });
    group.bench_function("get_group_of_server", |b| {
        b.iter(|| {
            runtime
                .block_on(service.get_group_of_server("rs1:16020"))
                .expect("lookup")
        })
    });
    group.finish();
}
