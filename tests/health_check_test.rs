use async_trait::async_trait;
use autopay_core::adapters::MemoryTransactionStore;
use autopay_core::health::*;
use std::sync::Arc;
use std::time::Instant;

struct DownChecker;

#[async_trait]
impl DependencyChecker for DownChecker {
    async fn check(&self) -> DependencyStatus {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: "unreachable".to_string(),
        }
    }
}

#[test]
fn test_dependency_status_serialization() {
    let healthy = DependencyStatus::Healthy {
        status: "healthy".to_string(),
        latency_ms: 42,
    };

    let json = serde_json::to_value(&healthy).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["latency_ms"], 42);
    assert!(json.get("error").is_none());

    let unhealthy = DependencyStatus::Unhealthy {
        status: "unhealthy".to_string(),
        error: "timeout".to_string(),
    };

    let json = serde_json::to_value(&unhealthy).unwrap();
    assert_eq!(json["status"], "unhealthy");
    assert_eq!(json["error"], "timeout");
    assert!(json.get("latency_ms").is_none());
}

#[tokio::test]
async fn test_health_response_structure() {
    let checker = StoreChecker::new(Arc::new(MemoryTransactionStore::new()));
    let response = check_health(&checker, Instant::now()).await;

    assert_eq!(response.status, "healthy");
    assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(response.dependencies.len(), 1);

    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"uptime_seconds\""));
    assert!(json.contains("\"store\""));
}

#[tokio::test]
async fn test_store_outage_is_unhealthy() {
    let response = check_health(&DownChecker, Instant::now()).await;
    assert!(response.is_unhealthy());
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["dependencies"]["store"]["error"], "unreachable");
}
