use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of an authenticated user
///
/// The role decides which views the user may open (see [`Role::permitted_views`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Security,
    #[serde(rename = "Department Head")]
    DepartmentHead,
    #[serde(rename = "Store Officer")]
    StoreOfficer,
}

/// One screen of the application
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    Dashboard,
    GatePasses,
    GatePassDetails,
    Items,
    RequesterManagement,
    Settings,
}

const ADMIN_VIEWS: &[View] = &[
    View::Dashboard,
    View::GatePasses,
    View::GatePassDetails,
    View::Items,
    View::RequesterManagement,
    View::Settings,
];
const GATE_VIEWS: &[View] = &[View::Dashboard, View::GatePasses];
const STORE_VIEWS: &[View] = &[View::Dashboard, View::GatePasses, View::Items];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Security => "Security",
            Role::DepartmentHead => "Department Head",
            Role::StoreOfficer => "Store Officer",
        }
    }

    /// Static role to view permission table
    pub fn permitted_views(&self) -> &'static [View] {
        match self {
            Role::Admin => ADMIN_VIEWS,
            Role::Security | Role::DepartmentHead => GATE_VIEWS,
            Role::StoreOfficer => STORE_VIEWS,
        }
    }

    pub fn can_view(&self, view: View) -> bool {
        self.permitted_views().contains(&view)
    }

    /// Only admins and security staff may issue new gate passes.
    pub fn can_create_pass(&self) -> bool {
        matches!(self, Role::Admin | Role::Security)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "admin" => Ok(Role::Admin),
            "security" => Ok(Role::Security),
            "departmenthead" => Ok(Role::DepartmentHead),
            "storeofficer" => Ok(Role::StoreOfficer),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatePassStatus {
    Pending,
    Approved,
    Delivered,
    Returned,
    Overdue,
    Cancelled,
}

impl GatePassStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatePassStatus::Pending => "Pending",
            GatePassStatus::Approved => "Approved",
            GatePassStatus::Delivered => "Delivered",
            GatePassStatus::Returned => "Returned",
            GatePassStatus::Overdue => "Overdue",
            GatePassStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for GatePassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatePassType {
    Returnable,
    #[serde(rename = "Non-Returnable")]
    NonReturnable,
}

impl GatePassType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatePassType::Returnable => "Returnable",
            GatePassType::NonReturnable => "Non-Returnable",
        }
    }
}

impl fmt::Display for GatePassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog entry
///
/// `code` is unique case-insensitively. `stock` is signed: it is decremented when
/// a pass is issued and incremented when a return is confirmed, with no floor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub code: String,
    pub category: String,
    pub unit: String,
    pub department: String,
    pub stock: i64,
}

/// Item fields supplied by the add/edit form or a CSV row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub code: String,
    pub category: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub stock: i64,
}

fn default_unit() -> String {
    "Pcs".to_string()
}

impl NewItem {
    pub fn into_item(self, id: String) -> Item {
        Item {
            id,
            name: self.name,
            code: self.code,
            category: self.category,
            unit: self.unit,
            department: self.department,
            stock: self.stock,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Requester {
    pub id: String,
    pub name: String,
    pub category: String,
    pub department: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewRequester {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleInfo {
    pub driver_name: String,
    pub number_plate: String,
}

impl VehicleInfo {
    /// `"<driver> / <plate>"` with `N/A` for blanks, as stored in the sheet.
    pub fn summary(&self) -> String {
        let or_na = |s: &str| {
            if s.trim().is_empty() {
                "N/A".to_string()
            } else {
                s.to_string()
            }
        };
        format!("{} / {}", or_na(&self.driver_name), or_na(&self.number_plate))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatePassItem {
    pub item_id: String,
    pub quantity: i64,
    pub unit: String,
    pub remarks: String,
}

/// A gate pass authorizing material to leave (and possibly come back through) the gate
///
/// The schema allows several item lines but every flow writes exactly one; use
/// [`GatePass::primary_item`] to read it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatePass {
    pub id: String,
    pub gate_pass_no: String,
    pub department: String,
    pub requester_name: String,
    pub requester_category: String,
    pub purpose: String,
    pub vehicle_info: VehicleInfo,
    pub items: Vec<GatePassItem>,
    #[serde(rename = "type")]
    pub pass_type: GatePassType,
    pub status: GatePassStatus,
    pub created_at: DateTime<Utc>,
    pub expected_return_date: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub delivered_by: Option<String>,
    pub returned_by: Option<String>,
    pub photo_url: Option<String>,
}

impl GatePass {
    pub fn primary_item(&self) -> Option<&GatePassItem> {
        self.items.first()
    }

    pub fn references_item(&self, item_id: &str) -> bool {
        self.items.iter().any(|line| line.item_id == item_id)
    }

    pub fn is_returnable(&self) -> bool {
        self.pass_type == GatePassType::Returnable
    }
}

/// An authenticated user. The password never leaves the sheet endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub email: String,
}

/// Signup form
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}
