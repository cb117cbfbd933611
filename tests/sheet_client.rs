mod common;

use chrono::{FixedOffset, NaiveDate, Utc};
use common::spawn_fake_sheet;
use gatepass::gate_pass::PassFilter;
use gatepass::model::{NewUser, Role};
use gatepass::sheet::{SheetClient, SheetError, SheetPayload, filter_sheet_rows};
use gatepass::store::Store;
use serde_json::json;

fn client(url: &str) -> SheetClient {
    SheetClient::connect(reqwest::Client::new(), Some(url)).unwrap()
}

#[test]
fn blank_url_is_not_configured() {
    let err = SheetClient::connect(reqwest::Client::new(), Some("  ")).unwrap_err();
    assert!(matches!(err, SheetError::NotConfigured));
    assert!(SheetClient::connect(reqwest::Client::new(), None).is_err());
}

#[tokio::test]
async fn login_maps_remote_user() {
    let (url, recorded) = spawn_fake_sheet().await;
    let user = client(&url)
        .login("officer@jabedagro.com", "secret")
        .await
        .unwrap();
    assert_eq!(user.id, "7");
    assert_eq!(user.role, Role::StoreOfficer);
    assert_eq!(user.name, "Store Officer One");

    let actions = recorded.actions();
    assert_eq!(
        actions[0],
        json!({ "action": "login", "email": "officer@jabedagro.com", "password": "secret" })
    );
}

#[tokio::test]
async fn login_error_envelope_carries_message() {
    let (url, _) = spawn_fake_sheet().await;
    let err = client(&url)
        .login("officer@jabedagro.com", "wrong")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid email or password.");
}

#[tokio::test]
async fn non_2xx_is_network_error() {
    let (url, _) = spawn_fake_sheet().await;
    let broken = client(&url.replace("/exec", "/broken"));

    let err = broken.login("a@b.c", "secret").await.unwrap_err();
    assert_eq!(err.to_string(), "Network response was not ok.");

    let err = broken
        .signup(&NewUser {
            name: "Jane".into(),
            email: "jane@x.com".into(),
            password: "secret".into(),
            role: Role::Security,
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Network response was not ok during signup.");
}

#[tokio::test]
async fn signup_posts_role_label() {
    let (url, recorded) = spawn_fake_sheet().await;
    client(&url)
        .signup(&NewUser {
            name: "Jane".into(),
            email: "jane@x.com".into(),
            password: "secret".into(),
            role: Role::DepartmentHead,
        })
        .await
        .unwrap();
    let action = &recorded.actions()[0];
    assert_eq!(action["action"], "signup");
    assert_eq!(action["role"], "Department Head");
}

#[tokio::test]
async fn rows_are_fetched_and_filtered() {
    let (url, _) = spawn_fake_sheet().await;
    let rows = client(&url).get_gate_passes().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].quantity, "2");
    assert_eq!(rows[0].row_index, 2);

    let by_name = filter_sheet_rows(
        &rows,
        &PassFilter {
            search: Some("karim".into()),
            ..Default::default()
        },
    );
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].gate_pass_no, "GP-02");

    let january = filter_sheet_rows(
        &rows,
        &PassFilter {
            from: NaiveDate::from_ymd_opt(2024, 1, 1),
            to: NaiveDate::from_ymd_opt(2024, 1, 31),
            ..Default::default()
        },
    );
    assert_eq!(january.len(), 1);
    assert_eq!(january[0].gate_pass_no, "GP-01");
}

#[tokio::test]
async fn row_update_and_delete_send_actions() {
    let (url, recorded) = spawn_fake_sheet().await;
    let sheet = client(&url);
    let mut rows = sheet.get_gate_passes().await.unwrap();
    rows[0].status = "Returned".into();
    sheet.update_gate_pass(&rows[0]).await.unwrap();
    sheet.delete_gate_pass(3).await.unwrap();

    let actions = recorded.actions();
    assert_eq!(actions[1]["action"], "updateGatePass");
    assert_eq!(actions[1]["data"]["Status"], "Returned");
    assert_eq!(actions[1]["data"]["rowIndex"], 2);
    assert_eq!(actions[2], json!({ "action": "deleteGatePass", "rowIndex": 3 }));
}

#[tokio::test]
async fn push_accepts_html_reply() {
    let (url, recorded) = spawn_fake_sheet().await;
    let store = Store::seeded(Utc::now());
    let pass = &store.gate_passes()[0];
    let offset = FixedOffset::east_opt(0).unwrap();
    let payload = SheetPayload::from_pass(pass, store.pass_item_name(pass), &offset);

    client(&url).push_gate_pass(&payload).await.unwrap();

    let bodies = recorded.multipart_bodies();
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains("name=\"data\""));
    assert!(bodies[0].contains(&pass.gate_pass_no));
    assert!(recorded.actions().is_empty());
}
