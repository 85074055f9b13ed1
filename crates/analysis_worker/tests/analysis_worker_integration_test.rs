use analysis_worker::{
    AnalysisWorker, AnalysisWorkerConfig, CheckinParameter, PlatformDependencies, Predicate,
};
use chrono::{Duration, Utc};
use common::domain::{
    AnalysisInvocation, Delivery, DeviceInfo, DomainError, EventRecord, InMemoryPlatform,
    KeyValueEntry, Tag, UserInfo, GEOFENCE_VARIABLE, ORGANIZATION_TAG,
};
use serde_json::json;
use std::sync::Arc;

async fn seeded_platform() -> Arc<InMemoryPlatform> {
    let platform = Arc::new(InMemoryPlatform::new());
    platform
        .insert_device(DeviceInfo {
            id: "org-1".to_string(),
            name: "Acme".to_string(),
            tags: vec![],
            last_input: None,
        })
        .await;
    platform
        .insert_device(DeviceInfo {
            id: "tracker-1".to_string(),
            name: "Truck 7".to_string(),
            tags: vec![Tag::new(ORGANIZATION_TAG, "org-1")],
            last_input: Some(Utc::now() - Duration::hours(30)),
        })
        .await;
    platform
        .insert_params(
            "org-1",
            vec![
                KeyValueEntry::new("plan_notification_limit", "10").with_id("org-p1"),
                KeyValueEntry::new("plan_email_limit", "0").with_id("org-p2"),
            ],
        )
        .await;
    platform
        .insert_user(UserInfo {
            id: "user-1".to_string(),
            name: "Dispatcher".to_string(),
            email: Some("dispatch@example.com".to_string()),
            phone: None,
            tags: vec![Tag::new(ORGANIZATION_TAG, "org-1")],
        })
        .await;
    platform
        .insert_data(
            "org-1",
            vec![EventRecord::new(GEOFENCE_VARIABLE, "Depot", "org-1")
                .with_id("zone-depot")
                .with_metadata(
                    "geolocation",
                    json!({
                        "type": "Polygon",
                        "coordinates": [[[13.0, 52.0], [13.0, 53.0], [14.0, 53.0], [14.0, 52.0], [13.0, 52.0]]]
                    }),
                )
                .with_metadata("event", "red")],
        )
        .await;
    platform
}

fn worker(platform: &Arc<InMemoryPlatform>) -> AnalysisWorker {
    AnalysisWorker::new(
        PlatformDependencies::in_memory(platform.clone()),
        AnalysisWorkerConfig::default(),
    )
}

fn location_invocation(lat: f64, lng: f64) -> AnalysisInvocation {
    serde_json::from_value(json!({
        "environment": [],
        "data": [{
            "variable": "location",
            "value": "gps",
            "device": "tracker-1",
            "location": {"lat": lat, "lng": lng}
        }]
    }))
    .unwrap()
}

fn notifications(deliveries: &[Delivery]) -> usize {
    deliveries
        .iter()
        .filter(|d| matches!(d, Delivery::Notification { .. }))
        .count()
}

#[tokio::test]
async fn test_geofence_entry_notifies_once_and_charges_plan() {
    let platform = seeded_platform().await;
    let worker = worker(&platform);

    let outcome = worker.run(&location_invocation(52.5, 13.4)).await.unwrap();
    assert_eq!(outcome.handlers_run, vec!["geofence"]);
    assert!(outcome.is_success());
    assert_eq!(notifications(&platform.deliveries().await), 1);
    assert_eq!(
        platform.param("org-1", "notification_usage").await.unwrap().value,
        "1"
    );
    assert!(platform.param("tracker-1", "geofence_zone-depot").await.unwrap().sent);
    assert_eq!(platform.data("tracker-1").await.len(), 1);

    worker.run(&location_invocation(52.6, 13.5)).await.unwrap();
    assert_eq!(notifications(&platform.deliveries().await), 1);

    worker.run(&location_invocation(51.0, 13.5)).await.unwrap();
    worker.run(&location_invocation(52.6, 13.5)).await.unwrap();
    assert_eq!(notifications(&platform.deliveries().await), 2);
}

#[tokio::test]
async fn test_checkin_tick_alerts_stale_device() {
    let platform = seeded_platform().await;
    let parameter = CheckinParameter::new(24.0, Utc::now() - Duration::days(7));
    platform
        .insert_params(
            "tracker-1",
            vec![KeyValueEntry::new("checkin_daily", parameter.to_string())],
        )
        .await;
    let worker = worker(&platform);

    let invocation = AnalysisInvocation {
        environment: Default::default(),
        data: vec![EventRecord::new("checkin_tick", "tracker-1", "scheduler")],
    };
    let outcome = worker.run(&invocation).await.unwrap();

    assert_eq!(outcome.handlers_run, vec!["checkin"]);
    assert!(outcome.is_success());
    assert_eq!(notifications(&platform.deliveries().await), 1);
    assert!(platform.param("tracker-1", "checkin_daily").await.unwrap().sent);

    worker.run(&invocation).await.unwrap();
    assert_eq!(notifications(&platform.deliveries().await), 1);
}

#[tokio::test]
async fn test_device_param_widget_edit() {
    let platform = seeded_platform().await;
    platform
        .insert_params(
            "tracker-1",
            vec![KeyValueEntry::new("speed_limit", "80").with_id("p-speed")],
        )
        .await;
    let worker = worker(&platform);

    let invocation: AnalysisInvocation = serde_json::from_value(json!({
        "environment": [
            {"key": "_input_id", "value": "device_params"},
            {"key": "_widget_exec", "value": "edit"}
        ],
        "data": [
            {"variable": "speed_limit", "value": "90", "device": "tracker-1"},
            {"variable": "driver", "value": "Sam", "device": "tracker-1"}
        ]
    }))
    .unwrap();

    let outcome = worker.run(&invocation).await.unwrap();
    assert_eq!(outcome.handlers_run, vec!["device_params_edit"]);

    let speed = platform.param("tracker-1", "speed_limit").await.unwrap();
    assert_eq!(speed.value, "90");
    assert_eq!(speed.id.as_deref(), Some("p-speed"));
    assert_eq!(platform.param("tracker-1", "driver").await.unwrap().value, "Sam");
}

#[tokio::test]
async fn test_delete_action_does_not_trigger_edit_route() {
    let platform = seeded_platform().await;
    let worker = worker(&platform);

    let invocation: AnalysisInvocation = serde_json::from_value(json!({
        "environment": {"_input_id": "device_params", "_widget_exec": "delete"},
        "data": [{"variable": "speed_limit", "value": "90", "device": "tracker-1"}]
    }))
    .unwrap();

    let outcome = worker.run(&invocation).await.unwrap();
    assert!(outcome.handlers_run.is_empty());
    assert_eq!(platform.param_writes("tracker-1").await, 0);
}

#[tokio::test]
async fn test_failing_route_is_isolated_from_geofence() {
    let platform = seeded_platform().await;
    let mut worker = worker(&platform);
    worker.router_mut().register_fn(
        "audit",
        |_, _| async { Err(DomainError::RemoteCallError("audit log unavailable".to_string())) },
        vec![Predicate::VariablePrefix("loc".to_string())],
    );

    let outcome = worker.run(&location_invocation(52.5, 13.4)).await.unwrap();

    assert_eq!(outcome.handlers_run, vec!["geofence", "audit"]);
    assert!(outcome.errors.contains_key("audit"));
    assert!(!outcome.errors.contains_key("geofence"));
    assert_eq!(notifications(&platform.deliveries().await), 1);
}

#[tokio::test]
async fn test_empty_invocation_runs_nothing() {
    let platform = seeded_platform().await;
    let outcome = worker(&platform)
        .run(&AnalysisInvocation::default())
        .await
        .unwrap();

    assert!(outcome.handlers_run.is_empty());
    assert!(platform.deliveries().await.is_empty());
}
