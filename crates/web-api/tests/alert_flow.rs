mod support;

use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tokio::time::sleep;
use uuid::Uuid;

use domain::{Identity, IdentityId, Role};
use support::{build_test_app, connect_ws, recv_event_of, send_event, serve};

/// 危急紧急警报：类别订阅者收到 emergency_alert，
/// 全站受众收到 critical_emergency_alert
#[tokio::test]
async fn critical_emergency_reaches_category_and_global_audience() {
    let app = build_test_app();

    let admin = IdentityId::new(Uuid::new_v4());
    let watcher = IdentityId::new(Uuid::new_v4());
    let bystander = IdentityId::new(Uuid::new_v4());
    app.seed_identity(Identity::new(admin, "Admin").with_role(Role::Admin))
        .await;
    app.seed_identity(Identity::new(watcher, "Watcher")).await;
    app.seed_identity(Identity::new(bystander, "Bystander")).await;

    let watcher_token = app.token_for(watcher);
    let bystander_token = app.token_for(bystander);
    let admin_token = app.token_for(admin);
    let (addr, _shutdown) = serve(app.router).await;

    let mut ws_watcher = connect_ws(addr, &watcher_token).await;
    let mut ws_bystander = connect_ws(addr, &bystander_token).await;

    send_event(
        &mut ws_watcher,
        &json!({"type": "subscribe_resource_alerts", "categories": ["medical"]}),
    )
    .await;
    // 订阅没有回执，给接收任务留出处理时间
    sleep(Duration::from_millis(150)).await;

    let client = Client::new();
    let response = client
        .post(format!("http://{addr}/api/v1/alerts"))
        .header("authorization", format!("Bearer {admin_token}"))
        .json(&json!({
            "kind": "emergency",
            "location": null,
            "category": "medical",
            "title": "Flood in sector 4",
            "message": "Evacuate low ground",
            "urgency": "critical"
        }))
        .send()
        .await
        .expect("post alert");
    assert!(response.status().is_success());

    let body = response.json::<serde_json::Value>().await.expect("json");
    let topics: Vec<String> = body["topics"]
        .as_array()
        .expect("topics array")
        .iter()
        .map(|topic| topic.as_str().unwrap().to_string())
        .collect();
    assert!(topics.contains(&"category:medical".to_string()));
    assert!(topics.contains(&"broadcast:global".to_string()));

    let alert = recv_event_of(&mut ws_watcher, "emergency_alert").await;
    assert_eq!(alert["alert"]["title"], "Flood in sector 4");
    assert_eq!(alert["alert"]["urgency"], "critical");

    let global = recv_event_of(&mut ws_bystander, "critical_emergency_alert").await;
    assert_eq!(global["alert"]["kind"], "emergency");
}

/// 普通成员不能发布紧急警报
#[tokio::test]
async fn member_is_forbidden_to_emit_emergency() {
    let app = build_test_app();

    let member = IdentityId::new(Uuid::new_v4());
    app.seed_identity(Identity::new(member, "Member")).await;

    let token = app.token_for(member);
    let (addr, _shutdown) = serve(app.router).await;

    let client = Client::new();
    let response = client
        .post(format!("http://{addr}/api/v1/alerts"))
        .header("authorization", format!("Bearer {token}"))
        .json(&json!({
            "kind": "emergency",
            "location": null,
            "category": null,
            "title": "Fake",
            "message": "Fake",
            "urgency": "critical"
        }))
        .send()
        .await
        .expect("post alert");
    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
}

/// 缺失凭证的投递被拒
#[tokio::test]
async fn alert_requires_bearer_token() {
    let app = build_test_app();
    let (addr, _shutdown) = serve(app.router).await;

    let client = Client::new();
    let response = client
        .post(format!("http://{addr}/api/v1/alerts"))
        .json(&json!({
            "kind": "donation-drive",
            "category": "food",
            "title": "Drive",
            "message": "Give",
            "urgency": "low"
        }))
        .send()
        .await
        .expect("post alert");
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}
