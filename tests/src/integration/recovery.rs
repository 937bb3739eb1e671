//! # Recovery
//!
//! The service on top of the file-backed mutation log, across restarts.

#[cfg(test)]
mod tests {
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::sync::Arc;

    use fg_group_admin::adapters::storage::LOG_FILE_NAME;
    use fg_group_admin::{
        FileMutationLog, GroupAdminApi, GroupAdminConfig, GroupAdminService, GroupError,
        MutationLog, NoOpNotifier, PersistenceError, RecordingNotifier,
    };

    use crate::integration::init_test_telemetry;

    async fn open(dir: &std::path::Path) -> GroupAdminService<FileMutationLog> {
        init_test_telemetry();
        let log = FileMutationLog::open(dir).await.expect("open log");
        GroupAdminService::recover(
            Arc::new(log),
            Arc::new(NoOpNotifier),
            GroupAdminConfig::for_testing(),
        )
        .await
        .expect("recover")
    }

    #[tokio::test]
    async fn test_restart_restores_every_group() {
        let dir = tempfile::tempdir().unwrap();

        let expected = {
            let service = open(dir.path()).await;
            service.add_group("analytics").await.unwrap();
            service.add_group("batch").await.unwrap();
            service
                .move_servers(&["rs1:16020", "rs2:16020"], "analytics")
                .await
                .unwrap();
            service.move_tables(&["ns1:events"], "batch").await.unwrap();
            service.move_servers(&["rs2:16020"], "batch").await.unwrap();
            service.shutdown().await;
            service.registry_snapshot()
        };

        let service = open(dir.path()).await;
        assert_eq!(service.registry_snapshot(), expected);
        assert_eq!(service.last_applied().value(), 5);
        assert_eq!(
            service.get_group_of_server("rs2:16020").await.unwrap().name.as_str(),
            "batch"
        );

        // Sequence numbers continue after the restart.
        assert_eq!(service.add_group("online").await.unwrap().value(), 6);
    }

    #[tokio::test]
    async fn test_torn_tail_is_dropped_on_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let service = open(dir.path()).await;
            service.add_group("kept").await.unwrap();
            service.shutdown().await;
        }

        // A crash mid-append leaves a partial frame behind.
        let mut file = OpenOptions::new()
            .append(true)
            .open(dir.path().join(LOG_FILE_NAME))
            .unwrap();
        file.write_all(&[0x40, 0, 0, 0, 0xde, 0xad]).unwrap();
        drop(file);

        let service = open(dir.path()).await;
        assert!(service.get_group_info("kept").await.is_ok());
        assert_eq!(service.add_group("next").await.unwrap().value(), 2);
    }

    #[tokio::test]
    async fn test_corrupted_log_refuses_to_open() {
        let dir = tempfile::tempdir().unwrap();
        {
            let service = open(dir.path()).await;
            service.add_group("a").await.unwrap();
            service.add_group("b").await.unwrap();
            service.shutdown().await;
        }

        // Flip a byte inside the first record's payload.
        let path = dir.path().join(LOG_FILE_NAME);
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[10] ^= 0xff;
        std::fs::write(&path, bytes).unwrap();

        let result = FileMutationLog::open(dir.path()).await;
        assert!(matches!(result, Err(PersistenceError::Corrupted { .. })));
    }

    #[tokio::test]
    async fn test_second_instance_is_locked_out() {
        let dir = tempfile::tempdir().unwrap();
        let _first = open(dir.path()).await;

        let second = FileMutationLog::open(dir.path()).await;
        assert!(matches!(second, Err(PersistenceError::Locked { .. })));
    }

    #[tokio::test]
    async fn test_replayed_records_are_not_renotified() {
        let dir = tempfile::tempdir().unwrap();
        {
            let service = open(dir.path()).await;
            service.add_group("a").await.unwrap();
            service.move_servers(&["rs1:1"], "a").await.unwrap();
            service.shutdown().await;
        }

        let notifier = Arc::new(RecordingNotifier::new());
        let log = Arc::new(FileMutationLog::open(dir.path()).await.unwrap());
        assert_eq!(log.load_all().await.unwrap().len(), 2);

        let service = GroupAdminService::recover(
            Arc::clone(&log),
            Arc::clone(&notifier),
            GroupAdminConfig::for_testing(),
        )
        .await
        .unwrap();
        service.move_servers(&["rs1:1"], "default").await.unwrap();
        service.shutdown().await;

        let sequences: Vec<u64> = notifier
            .delivered()
            .iter()
            .map(|c| c.sequence.value())
            .collect();
        assert_eq!(sequences, vec![3]);
    }

    #[tokio::test]
    async fn test_rejected_mutation_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        {
            let service = open(dir.path()).await;
            let err = service.remove_group("default").await.unwrap_err();
            assert!(matches!(err, GroupError::Validation(_)));
            service.shutdown().await;
        }

        let log = FileMutationLog::open(dir.path()).await.unwrap();
        assert!(log.load_all().await.unwrap().is_empty());
    }
}
