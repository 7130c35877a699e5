//! Health aggregation tests.

use tailgrok_core::pipeline::HealthStatus;
use tailgrok_daemon::health::{ComponentHealth, aggregate_status};

#[test]
fn test_aggregate_status_all_healthy() {
    let components = vec![
        ComponentHealth::new("log-pipeline", HealthStatus::Healthy),
        ComponentHealth::new("memory-channel", HealthStatus::Healthy),
        ComponentHealth::new("sink-runner", HealthStatus::Healthy),
    ];

    assert!(aggregate_status(&components).is_healthy());
}

#[test]
fn test_aggregate_status_empty_is_healthy() {
    assert!(aggregate_status(&[]).is_healthy());
}

#[test]
fn test_aggregate_status_one_degraded() {
    let components = vec![
        ComponentHealth::new("log-pipeline", HealthStatus::Degraded("queue utilization high".to_owned())),
        ComponentHealth::new("sink-runner", HealthStatus::Healthy),
    ];

    match aggregate_status(&components) {
        HealthStatus::Degraded(reason) => {
            assert!(reason.contains("log-pipeline"));
            assert!(reason.contains("queue utilization high"));
        }
        other => panic!("expected Degraded status, got: {:?}", other),
    }
}

#[test]
fn test_aggregate_status_unhealthy_wins_over_degraded() {
    let components = vec![
        ComponentHealth::new("log-pipeline", HealthStatus::Degraded("slow".to_owned())),
        ComponentHealth::new("sink-runner", HealthStatus::Unhealthy("not running".to_owned())),
        ComponentHealth::new("memory-channel", HealthStatus::Unhealthy("not running".to_owned())),
    ];

    match aggregate_status(&components) {
        HealthStatus::Unhealthy(reason) => {
            assert!(reason.contains("sink-runner: not running"));
            assert!(reason.contains("memory-channel: not running"));
            assert!(!reason.contains("slow"));
        }
        other => panic!("expected Unhealthy status, got: {:?}", other),
    }
}

#[test]
fn test_component_health_serializes() {
    let health = ComponentHealth::new("sink-runner", HealthStatus::Healthy);
    let json = serde_json::to_value(&health).unwrap();
    assert_eq!(json["name"], "sink-runner");
    assert_eq!(json["status"], "Healthy");
}
