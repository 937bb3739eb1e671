//! # Concurrency
//!
//! Several administrators mutating at once, and callers that give up.

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;

    use fg_group_admin::{
        check_all, FileMutationLog, GroupAdminApi, GroupAdminConfig, GroupAdminService,
        GroupError, InMemoryMutationLog, NoOpNotifier, RecordingNotifier,
    };

    use crate::integration::init_test_telemetry;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_admins_on_file_log() {
        init_test_telemetry();
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(FileMutationLog::open(dir.path()).await.unwrap());
        let service = GroupAdminService::recover(
            Arc::clone(&log),
            Arc::new(NoOpNotifier),
            GroupAdminConfig::for_testing(),
        )
        .await
        .unwrap();

        for group in ["g0", "g1", "g2", "g3"] {
            service.add_group(group).await.unwrap();
        }

        // 40 moves over 10 servers into 4 groups, all at once.
        let moves = (0..40).map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                let server = format!("rs{}:16020", i % 10);
                let target = format!("g{}", i % 4);
                service.move_servers(&[server.as_str()], &target).await
            })
        });
        let results = join_all(moves).await;

        let mut sequences = BTreeSet::new();
        for result in results {
            let seq = result.unwrap().unwrap();
            assert!(sequences.insert(seq), "sequence {} handed out twice", seq);
        }
        assert_eq!(sequences.len(), 40);

        let registry = service.registry_snapshot();
        check_all(&registry).unwrap();
        let placed: usize = registry.list_groups().iter().map(|g| g.servers.len()).sum();
        assert_eq!(placed, 10);

        // What readers saw is exactly what the log replays to.
        service.shutdown().await;
        drop(service);
        drop(log);
        let reopened = Arc::new(FileMutationLog::open(dir.path()).await.unwrap());
        let recovered = GroupAdminService::recover(
            reopened,
            Arc::new(NoOpNotifier),
            GroupAdminConfig::for_testing(),
        )
        .await
        .unwrap();
        assert_eq!(recovered.registry_snapshot(), registry);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_readers_never_see_partial_batches() {
        init_test_telemetry();
        let service = GroupAdminService::recover(
            Arc::new(InMemoryMutationLog::new()),
            Arc::new(NoOpNotifier),
            GroupAdminConfig::for_testing(),
        )
        .await
        .unwrap();
        service.add_group("blue").await.unwrap();
        service.add_group("green").await.unwrap();

        let batch = ["rs1:1", "rs2:1", "rs3:1", "rs4:1"];
        let writer = {
            let service = service.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    let target = if i % 2 == 0 { "blue" } else { "green" };
                    service.move_servers(&batch, target).await.unwrap();
                }
            })
        };

        while !writer.is_finished() {
            let groups: BTreeSet<String> = service
                .registry_snapshot()
                .list_groups()
                .into_iter()
                .filter(|g| !g.servers.is_empty())
                .map(|g| g.name.to_string())
                .collect();
            assert!(groups.len() <= 1, "batch split across {:?}", groups);
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_timed_out_caller_can_requery() {
        init_test_telemetry();
        let log = Arc::new(InMemoryMutationLog::new());
        let config = GroupAdminConfig {
            operation_timeout_ms: 20,
            ..GroupAdminConfig::for_testing()
        };
        let service =
            GroupAdminService::recover(Arc::clone(&log), Arc::new(RecordingNotifier::new()), config)
                .await
                .unwrap();

        log.set_commit_delay(Some(Duration::from_millis(200)));
        let err = service.add_group("eventually").await.unwrap_err();
        assert!(matches!(err, GroupError::Timeout { millis: 20 }));
        assert!(err.is_retryable());

        // Re-query instead of blindly retrying.
        log.set_commit_delay(None);
        let mut found = false;
        for _ in 0..50 {
            if service.get_group_info("eventually").await.is_ok() {
                found = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(found, "timed-out mutation never applied");

        // A blind retry would now be a duplicate.
        let err = service.add_group("eventually").await.unwrap_err();
        assert!(matches!(err, GroupError::Validation(_)));
    }
}
