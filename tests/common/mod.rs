//! In-process stand-in for the Apps Script endpoint.

#![allow(dead_code)]

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// What the fake sheet received
#[derive(Clone, Default)]
pub struct Recorded {
    pub actions: Arc<Mutex<Vec<Value>>>,
    pub multipart_bodies: Arc<Mutex<Vec<String>>>,
}

impl Recorded {
    pub fn actions(&self) -> Vec<Value> {
        self.actions.lock().unwrap().clone()
    }

    pub fn multipart_bodies(&self) -> Vec<String> {
        self.multipart_bodies.lock().unwrap().clone()
    }
}

fn sheet_rows() -> Value {
    json!([
        {
            "rowIndex": 2, "SL No.": 1, "Gate Pass No": "GP-01",
            "Date & Time": "05/01/2024, 10:00:00", "Requester": "Rina",
            "Department": "HR", "Item": "Drill", "Quantity": 1, "Unit": "Pcs",
            "Type": "Returnable", "Status": "Delivered", "Purpose": "Repair",
            "Vehicle Info": "N/A / N/A"
        },
        {
            "rowIndex": 3, "SL No.": 2, "Gate Pass No": "GP-02",
            "Date & Time": "12/02/2024, 09:30:00", "Requester": "Karim",
            "Department": "IT", "Item": "Laptop", "Quantity": "2", "Unit": "Pcs",
            "Type": "Non-Returnable", "Status": "Approved", "Purpose": "Audit",
            "Vehicle Info": "Rafiq / DHA-1234"
        }
    ])
}

fn reply(action: &Value) -> Response {
    let body = match action["action"].as_str().unwrap_or_default() {
        "login" => match (action["email"].as_str(), action["password"].as_str()) {
            (Some("officer@jabedagro.com"), Some("secret")) => json!({
                "status": "success",
                "user": { "id": 7, "name": "Store Officer One", "role": "Store Officer", "email": "officer@jabedagro.com" }
            }),
            (Some("guard@jabedagro.com"), Some("secret")) => json!({
                "status": "success",
                "user": { "id": "u-9", "name": "Gate Guard", "role": "Security", "email": "guard@jabedagro.com" }
            }),
            _ => json!({ "status": "error", "message": "Invalid email or password." }),
        },
        "signup" => json!({ "status": "success" }),
        "getGatePasses" => json!({ "status": "success", "data": sheet_rows() }),
        "updateGatePass" | "deleteGatePass" => json!({ "status": "success" }),
        "explode" => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => json!({ "status": "error", "message": "Unknown action." }),
    };
    Json(body).into_response()
}

async fn exec(State(recorded): State<Recorded>, headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let text = String::from_utf8_lossy(&body).into_owned();

    if content_type.starts_with("multipart/form-data") {
        recorded.multipart_bodies.lock().unwrap().push(text);
        // Apps Script answers form posts with an HTML redirect page
        return (
            [(header::CONTENT_TYPE, "text/html")],
            "<html><body>Moved</body></html>",
        )
            .into_response();
    }

    let action: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
    recorded.actions.lock().unwrap().push(action.clone());
    reply(&action)
}

async fn slow(state: State<Recorded>, headers: HeaderMap, body: Bytes) -> Response {
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    exec(state, headers, body).await
}

async fn broken() -> StatusCode {
    StatusCode::BAD_GATEWAY
}

/// Start the fake on an ephemeral port and return its `/exec` URL.
pub async fn spawn_fake_sheet() -> (String, Recorded) {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/exec", post(exec))
        .route("/slow", post(slow))
        .route("/broken", post(broken))
        .with_state(recorded.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/exec", address), recorded)
}
