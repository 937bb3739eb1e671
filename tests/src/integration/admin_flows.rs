//! # Admin Flows
//!
//! The group admin service publishing membership changes onto the shared
//! bus, where a balancer subscribes to them.
//!
//! ## Flow Tested:
//!
//! 1. **Admin → Service**: add group, move servers, move tables, remove group
//! 2. **Service → Bus**: one event per committed mutation, in sequence order
//! 3. **Bus → Balancer**: topic and group filters select what a subscriber sees

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    use fg_group_admin::{
        BusMembershipNotifier, GroupAdminApi, GroupAdminConfig, GroupAdminService, GroupError,
        InMemoryMutationLog, RetryPolicy,
    };
    use shared_bus::{EventFilter, EventTopic, FleetEvent, InMemoryEventBus};

    use crate::integration::init_test_telemetry;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    async fn bus_service(
        config: GroupAdminConfig,
    ) -> (
        GroupAdminService<InMemoryMutationLog>,
        Arc<InMemoryEventBus>,
    ) {
        init_test_telemetry();
        let bus = Arc::new(InMemoryEventBus::new());
        let notifier = Arc::new(BusMembershipNotifier::new(Arc::clone(&bus)));
        let service = GroupAdminService::recover(
            Arc::new(InMemoryMutationLog::new()),
            notifier,
            config,
        )
        .await
        .expect("recover empty log");
        (service, bus)
    }

    async fn next_event(sub: &mut shared_bus::Subscription) -> FleetEvent {
        timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("timeout waiting for event")
            .expect("bus closed")
    }

    // =============================================================================
    // INTEGRATION TESTS: SERVICE → EVENT BUS
    // =============================================================================

    /// The four-step admin session from an empty registry.
    #[tokio::test]
    async fn test_admin_session_publishes_each_step() {
        let (service, bus) = bus_service(GroupAdminConfig::for_testing()).await;
        let mut balancer = bus.subscribe(EventFilter::all());

        assert_eq!(service.add_group("analytics").await.unwrap().value(), 1);
        assert_eq!(
            service
                .move_servers(&["rs1:16020", "rs2:16020"], "analytics")
                .await
                .unwrap()
                .value(),
            2
        );
        assert_eq!(
            service
                .move_tables(&["ns1:clicks"], "analytics")
                .await
                .unwrap()
                .value(),
            3
        );
        let err = service.remove_group("analytics").await.unwrap_err();
        assert!(matches!(err, GroupError::Validation(_)));

        match next_event(&mut balancer).await {
            FleetEvent::GroupAdded { sequence, group } => {
                assert_eq!(sequence, 1);
                assert_eq!(group, "analytics");
            }
            other => panic!("Expected GroupAdded, got {:?}", other),
        }

        match next_event(&mut balancer).await {
            FleetEvent::ServersMoved {
                sequence,
                target_group,
                deltas,
            } => {
                assert_eq!(sequence, 2);
                assert_eq!(target_group, "analytics");
                let added = deltas
                    .iter()
                    .find(|d| d.group == "analytics")
                    .expect("target delta");
                assert_eq!(added.added_servers, vec!["rs1:16020", "rs2:16020"]);
                let removed = deltas
                    .iter()
                    .find(|d| d.group == "default")
                    .expect("source delta");
                assert_eq!(removed.removed_servers.len(), 2);
            }
            other => panic!("Expected ServersMoved, got {:?}", other),
        }

        match next_event(&mut balancer).await {
            FleetEvent::TablesMoved { sequence, .. } => assert_eq!(sequence, 3),
            other => panic!("Expected TablesMoved, got {:?}", other),
        }

        // The rejected removal published nothing.
        service.shutdown().await;
        assert!(matches!(balancer.try_recv(), Ok(None)));
    }

    /// A balancer that only cares about server moves into one group.
    #[tokio::test]
    async fn test_filtered_subscriber_sees_only_its_group() {
        let (service, bus) = bus_service(GroupAdminConfig::for_testing()).await;
        let mut batch_only = bus.subscribe(EventFilter {
            topics: vec![EventTopic::ServerMembership],
            groups: vec!["batch".to_string()],
        });
        let _everything = bus.subscribe(EventFilter::all());

        service.add_group("batch").await.unwrap();
        service.add_group("online").await.unwrap();
        service.move_servers(&["rs1:1"], "online").await.unwrap();
        service.move_servers(&["rs2:1"], "batch").await.unwrap();
        service.shutdown().await;

        let event = next_event(&mut batch_only).await;
        assert_eq!(event.sequence(), 4);
        assert!(event.touches_group("batch"));
        assert!(matches!(batch_only.try_recv(), Ok(None)));
    }

    /// Deliveries with no subscriber are retried until one appears.
    #[tokio::test]
    async fn test_notification_waits_for_a_subscriber() {
        let config = GroupAdminConfig {
            notify_retry: RetryPolicy {
                max_attempts: 200,
                initial_backoff_ms: 5,
                max_backoff_ms: 5,
                multiplier: 1,
            },
            ..GroupAdminConfig::for_testing()
        };
        let (service, bus) = bus_service(config).await;

        service.add_group("online").await.unwrap();
        service.move_servers(&["rs1:1"], "online").await.unwrap();
        assert_eq!(service.list_servers_in_transition().await.unwrap().len(), 1);

        // A balancer that only follows tables does not settle a server move.
        let _tables_only = bus.subscribe(EventFilter::topics(vec![EventTopic::TableMembership]));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(service.list_servers_in_transition().await.unwrap().len(), 1);

        let mut late = bus.subscribe(EventFilter::all());
        assert_eq!(next_event(&mut late).await.sequence(), 1);
        assert_eq!(next_event(&mut late).await.sequence(), 2);

        service
            .wait_for_transitions(&["rs1:1"], Duration::from_secs(1))
            .await
            .unwrap();
    }

    /// `move_servers_and_wait` returns once the bus has taken the change.
    #[tokio::test]
    async fn test_move_and_wait_through_bus() {
        let (service, bus) = bus_service(GroupAdminConfig::for_testing()).await;
        let mut balancer = bus.subscribe(EventFilter::topics(vec![EventTopic::ServerMembership]));
        let _lifecycle = bus.subscribe(EventFilter::topics(vec![EventTopic::GroupLifecycle]));
        service.add_group("isolated").await.unwrap();

        let seq = service
            .move_servers_and_wait(&["rs9:16020"], "isolated")
            .await
            .unwrap();

        assert!(service.servers_in_transition().is_empty());
        assert_eq!(next_event(&mut balancer).await.sequence(), seq.value());
        let info = service.get_group_of_server("rs9:16020").await.unwrap();
        assert_eq!(info.name.as_str(), "isolated");
    }

    // =============================================================================
    // INTEGRATION TESTS: TELEMETRY
    // =============================================================================

    #[tokio::test]
    async fn test_metrics_reflect_mutations() {
        let (service, _bus) = bus_service(GroupAdminConfig::for_testing()).await;
        service.add_group("metered").await.unwrap();
        let _ = service.add_group("metered").await;

        let text = fleet_telemetry::encode_metrics().unwrap();
        assert!(text.contains("fg_groups_mutations_committed_total"));
        assert!(text.contains("fg_groups_mutations_rejected_total"));
    }
}
