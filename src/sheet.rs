//! Client for the Apps Script endpoint that fronts the Google Sheet.
//!
//! Every action is a POST to the one configured URL. Most carry a JSON body sent
//! as `text/plain` (Apps Script only exposes raw bodies that way); new passes are
//! posted as multipart form data with a single `data` field. Replies share the
//! envelope `{status, message, user, data}`.

use crate::error::AppError;
use crate::gate_pass::PassFilter;
use crate::model::{GatePass, NewUser, User};
use chrono::{FixedOffset, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

pub const NOT_CONFIGURED: &str = "Google Sheet URL is not configured. Please use the default admin credentials or set the URL in Settings.";

/// Column headers of the sheet, in sheet order
pub const SHEET_HEADERS: [&str; 12] = [
    "SL No.",
    "Gate Pass No",
    "Date & Time",
    "Requester",
    "Department",
    "Item",
    "Quantity",
    "Unit",
    "Type",
    "Status",
    "Purpose",
    "Vehicle Info",
];

lazy_static! {
    static ref SHEET_DATE: Regex = Regex::new(
        r"^(\d{1,2})/(\d{1,2})/(\d{4}),\s*(\d{1,2}):(\d{1,2})(?::(\d{1,2}))?$"
    )
    .unwrap();
}

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("{}", NOT_CONFIGURED)]
    NotConfigured,

    #[error("Network response was not ok{context}.")]
    BadStatus {
        status: StatusCode,
        context: &'static str,
    },

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Remote(String),

    #[error("Unexpected response from the sheet: {0}")]
    Decode(String),
}

impl From<SheetError> for AppError {
    fn from(err: SheetError) -> Self {
        match err {
            SheetError::NotConfigured => AppError::Config(err.to_string()),
            other => AppError::Remote(other.to_string()),
        }
    }
}

/// Read a cell that may arrive as a string, a number or null.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

fn lenient_index<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// One raw row of the sheet, keyed by the literal column headers
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetRow {
    #[serde(rename = "rowIndex", default, deserialize_with = "lenient_index")]
    pub row_index: i64,
    #[serde(rename = "SL No.", default, deserialize_with = "lenient_string")]
    pub sl_no: String,
    #[serde(rename = "Gate Pass No", default, deserialize_with = "lenient_string")]
    pub gate_pass_no: String,
    #[serde(rename = "Date & Time", default, deserialize_with = "lenient_string")]
    pub date_time: String,
    #[serde(rename = "Requester", default, deserialize_with = "lenient_string")]
    pub requester: String,
    #[serde(rename = "Department", default, deserialize_with = "lenient_string")]
    pub department: String,
    #[serde(rename = "Item", default, deserialize_with = "lenient_string")]
    pub item: String,
    #[serde(rename = "Quantity", default, deserialize_with = "lenient_string")]
    pub quantity: String,
    #[serde(rename = "Unit", default, deserialize_with = "lenient_string")]
    pub unit: String,
    #[serde(rename = "Type", default, deserialize_with = "lenient_string")]
    pub pass_type: String,
    #[serde(rename = "Status", default, deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(rename = "Purpose", default, deserialize_with = "lenient_string")]
    pub purpose: String,
    #[serde(rename = "Vehicle Info", default, deserialize_with = "lenient_string")]
    pub vehicle_info: String,
}

impl SheetRow {
    /// Cell values in [`SHEET_HEADERS`] order.
    pub fn cells(&self) -> [&str; 12] {
        [
            &self.sl_no,
            &self.gate_pass_no,
            &self.date_time,
            &self.requester,
            &self.department,
            &self.item,
            &self.quantity,
            &self.unit,
            &self.pass_type,
            &self.status,
            &self.purpose,
            &self.vehicle_info,
        ]
    }

    fn matches(&self, term: &str) -> bool {
        let index = self.row_index.to_string();
        self.cells()
            .iter()
            .chain(std::iter::once(&index.as_str()))
            .any(|v| v.to_lowercase().contains(term))
    }
}

/// Parse the sheet's `dd/mm/yyyy, hh:mm[:ss]` timestamps.
pub fn parse_sheet_datetime(raw: &str) -> Option<NaiveDateTime> {
    let caps = SHEET_DATE.captures(raw.trim())?;
    let num = |i: usize| caps.get(i).map_or(Some(0), |m| m.as_str().parse::<u32>().ok());
    let year = caps.get(3)?.as_str().parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, num(2)?, num(1)?)?.and_hms_opt(num(4)?, num(5)?, num(6)?)
}

/// Rows matching the search term (over every value) and the date range
///
/// While a date bound is set, rows whose `Date & Time` does not parse are left out.
pub fn filter_sheet_rows(rows: &[SheetRow], filter: &PassFilter) -> Vec<SheetRow> {
    let term = filter
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());
    let start = filter.from.and_then(|d| d.and_hms_opt(0, 0, 0));
    let end = filter
        .to
        .and_then(|d| d.succ_opt())
        .and_then(|d| d.and_hms_opt(0, 0, 0));
    let dated = filter.from.is_some() || filter.to.is_some();

    rows.iter()
        .filter(|row| term.as_deref().is_none_or(|t| row.matches(t)))
        .filter(|row| {
            if !dated {
                return true;
            }
            match parse_sheet_datetime(&row.date_time) {
                Some(at) => start.is_none_or(|s| at >= s) && end.is_none_or(|e| at < e),
                None => false,
            }
        })
        .cloned()
        .collect()
}

/// Flattened pass as the sheet stores it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetPayload {
    pub gate_pass_no: String,
    pub created_at: String,
    pub requester_name: String,
    pub department: String,
    pub item_name: String,
    pub quantity: i64,
    pub unit: String,
    #[serde(rename = "type")]
    pub pass_type: String,
    pub status: String,
    pub purpose: String,
    pub vehicle_info: String,
}

impl SheetPayload {
    pub fn from_pass(pass: &GatePass, item_name: String, offset: &FixedOffset) -> Self {
        let line = pass.primary_item();
        SheetPayload {
            gate_pass_no: pass.gate_pass_no.clone(),
            created_at: pass
                .created_at
                .with_timezone(offset)
                .format("%d/%m/%Y, %H:%M:%S")
                .to_string(),
            requester_name: pass.requester_name.clone(),
            department: pass.department.clone(),
            item_name,
            quantity: line.map_or(0, |l| l.quantity),
            unit: line.map(|l| l.unit.clone()).unwrap_or_default(),
            pass_type: pass.pass_type.to_string(),
            status: pass.status.to_string(),
            purpose: pass.purpose.clone(),
            vehicle_info: pass.vehicle_info.summary(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    user: Option<RemoteUser>,
    #[serde(default)]
    data: Option<Value>,
}

impl Envelope {
    fn into_success(self, fallback: &str) -> Result<Self, SheetError> {
        if self.status == "success" {
            Ok(self)
        } else {
            Err(SheetError::Remote(
                self.message.unwrap_or_else(|| fallback.to_string()),
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
struct RemoteUser {
    #[serde(default, deserialize_with = "lenient_string")]
    id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    role: String,
    #[serde(default, deserialize_with = "lenient_string")]
    email: String,
}

impl TryFrom<RemoteUser> for User {
    type Error = SheetError;

    fn try_from(remote: RemoteUser) -> Result<Self, Self::Error> {
        let role = remote.role.parse().map_err(SheetError::Remote)?;
        Ok(User {
            id: remote.id,
            name: remote.name,
            role,
            email: remote.email,
        })
    }
}

const SHEET_FALLBACK: &str = "An error occurred with the Google Sheet operation.";

/// Typed access to the sheet endpoint
#[derive(Clone, Debug)]
pub struct SheetClient {
    http: reqwest::Client,
    url: String,
}

impl SheetClient {
    /// Bind a client to the configured URL; a missing or blank URL is a configuration error.
    pub fn connect(http: reqwest::Client, url: Option<&str>) -> Result<Self, SheetError> {
        match url.map(str::trim) {
            Some(url) if !url.is_empty() => Ok(SheetClient {
                http,
                url: url.to_string(),
            }),
            _ => Err(SheetError::NotConfigured),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post_action(&self, body: Value, context: &'static str) -> Result<Envelope, SheetError> {
        let response = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain;charset=utf-8")
            .body(body.to_string())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SheetError::BadStatus { status, context });
        }
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| SheetError::Decode(e.to_string()))
    }

    /// Check credentials against the user rows.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, SheetError> {
        let envelope = self
            .post_action(
                json!({ "action": "login", "email": email, "password": password }),
                "",
            )
            .await?
            .into_success("Login failed.")?;
        envelope
            .user
            .ok_or_else(|| SheetError::Decode("login reply carried no user".to_string()))?
            .try_into()
    }

    /// Register a new user row.
    pub async fn signup(&self, user: &NewUser) -> Result<(), SheetError> {
        self.post_action(
            json!({
                "action": "signup",
                "name": user.name,
                "email": user.email,
                "password": user.password,
                "role": user.role,
            }),
            " during signup",
        )
        .await?
        .into_success("Signup failed.")?;
        Ok(())
    }

    pub async fn get_gate_passes(&self) -> Result<Vec<SheetRow>, SheetError> {
        let envelope = self
            .post_action(json!({ "action": "getGatePasses" }), "")
            .await?
            .into_success(SHEET_FALLBACK)?;
        match envelope.data {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(data) => serde_json::from_value(data).map_err(|e| SheetError::Decode(e.to_string())),
        }
    }

    pub async fn update_gate_pass(&self, row: &SheetRow) -> Result<(), SheetError> {
        self.post_action(json!({ "action": "updateGatePass", "data": row }), "")
            .await?
            .into_success(SHEET_FALLBACK)?;
        Ok(())
    }

    pub async fn delete_gate_pass(&self, row_index: i64) -> Result<(), SheetError> {
        self.post_action(json!({ "action": "deleteGatePass", "rowIndex": row_index }), "")
            .await?
            .into_success(SHEET_FALLBACK)?;
        Ok(())
    }

    /// Append a new pass as a multipart `data` field
    ///
    /// Apps Script may answer with a redirect page rather than JSON; any 2xx
    /// reply that is not an explicit error envelope counts as delivered.
    pub async fn push_gate_pass(&self, payload: &SheetPayload) -> Result<(), SheetError> {
        let data = serde_json::to_string(payload).map_err(|e| SheetError::Decode(e.to_string()))?;
        let form = reqwest::multipart::Form::new().text("data", data);
        let response = self.http.post(&self.url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SheetError::BadStatus { status, context: "" });
        }
        let text = response.text().await?;
        if let Ok(envelope) = serde_json::from_str::<Envelope>(&text) {
            if envelope.status == "error" {
                return Err(SheetError::Remote(
                    envelope.message.unwrap_or_else(|| SHEET_FALLBACK.to_string()),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn row(date: &str, requester: &str) -> SheetRow {
        SheetRow {
            row_index: 2,
            date_time: date.to_string(),
            requester: requester.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn rows_accept_numbers_and_strings() {
        let json = r#"[{"rowIndex":"3","SL No.":1,"Gate Pass No":"GP-01","Quantity":2.5,"Unit":null}]"#;
        let rows: Vec<SheetRow> = serde_json::from_str(json).unwrap();
        assert_eq!(rows[0].row_index, 3);
        assert_eq!(rows[0].sl_no, "1");
        assert_eq!(rows[0].quantity, "2.5");
        assert_eq!(rows[0].unit, "");
        assert_eq!(rows[0].status, "");
    }

    #[test]
    fn sheet_dates() {
        let at = parse_sheet_datetime("05/01/2024, 10:07:09").unwrap();
        assert_eq!(at.to_string(), "2024-01-05 10:07:09");
        assert!(parse_sheet_datetime("5/1/2024, 9:05").is_some());
        assert!(parse_sheet_datetime("2024-01-05").is_none());
        assert!(parse_sheet_datetime("31/02/2024, 10:00").is_none());
    }

    #[test]
    fn filter_by_term_and_date() {
        let rows = vec![
            row("05/01/2024, 10:00:00", "Rina"),
            row("12/01/2024, 10:00:00", "Karim"),
            row("not a date", "Rina"),
        ];
        let by_name = PassFilter {
            search: Some("rina".into()),
            ..Default::default()
        };
        assert_eq!(filter_sheet_rows(&rows, &by_name).len(), 2);

        let by_date = PassFilter {
            search: Some("rina".into()),
            from: NaiveDate::from_ymd_opt(2024, 1, 1),
            to: NaiveDate::from_ymd_opt(2024, 1, 5),
        };
        let found = filter_sheet_rows(&rows, &by_date);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].date_time, "05/01/2024, 10:00:00");
    }

    #[test]
    fn payload_flattens_pass() {
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 4, 0, 0).unwrap();
        let pass = &crate::seed::gate_passes(now)[3];
        let dhaka = FixedOffset::east_opt(6 * 3600).unwrap();
        let payload = SheetPayload::from_pass(pass, "Fertilizer Pack".into(), &dhaka);
        assert_eq!(payload.created_at, "05/01/2024, 10:00:00");
        assert_eq!(payload.vehicle_info, "N/A / N/A");
        assert_eq!(payload.pass_type, "Non-Returnable");

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "Non-Returnable");
        assert_eq!(json["itemName"], "Fertilizer Pack");
    }

    #[test]
    fn missing_url_is_config_error() {
        let err = SheetClient::connect(reqwest::Client::new(), Some("  ")).unwrap_err();
        let app: AppError = err.into();
        assert!(matches!(app, AppError::Config(_)));
        assert_eq!(app.to_string(), NOT_CONFIGURED);
    }

    #[test]
    fn remote_user_role_is_parsed() {
        let remote: RemoteUser = serde_json::from_str(
            r#"{"id":7,"name":"Jane","role":"Store Officer","email":"jane@x.com"}"#,
        )
        .unwrap();
        let user = User::try_from(remote).unwrap();
        assert_eq!(user.id, "7");
        assert_eq!(user.role, crate::model::Role::StoreOfficer);
    }

    #[test]
    fn last_representable_day_is_an_open_end() {
        let rows = vec![row("05/01/2024, 10:00:00", "Rina"), row("garbled", "Karim")];
        let found = filter_sheet_rows(
            &rows,
            &PassFilter {
                to: Some(NaiveDate::MAX),
                ..Default::default()
            },
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].requester, "Rina");
    }
}
