//! Gate-pass lifecycle: numbering, the create/edit form, status transitions,
//! return confirmation and the filtered views over the pass list.

use crate::error::{AppError, AppResult};
use crate::model::{GatePass, GatePassItem, GatePassStatus, GatePassType, User, VehicleInfo};
use crate::store::Store;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const REQUIRED_FIELDS: &str = "Please fill all required fields.";
const RETURN_FIELDS: &str =
    "Please provide the return date, time, and the name of the person returning the item.";

/// Next pass number: the largest numeric suffix (after the last hyphen) plus one,
/// zero-padded to two digits.
///
/// # Examples
/// ```
/// use gatepass::gate_pass::next_gate_pass_no;
///
/// assert_eq!(next_gate_pass_no(&[]), "GP-01");
/// ```
pub fn next_gate_pass_no(passes: &[GatePass]) -> String {
    let max = passes
        .iter()
        .filter_map(|p| p.gate_pass_no.rsplit('-').next()?.trim().parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("GP-{:02}", max.saturating_add(1))
}

/// Build a UTC instant from separate local date (`YYYY-MM-DD`) and time
/// (`HH:MM` or `HH:MM:SS`) inputs.
pub fn local_datetime(date: &str, time: &str, offset: &FixedOffset) -> AppResult<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("Invalid date: {}", date)))?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(time.trim(), "%H:%M"))
        .map_err(|_| AppError::Validation(format!("Invalid time: {}", time)))?;
    local_to_utc(date.and_time(time), offset)
}

/// Calendar years accepted from forms and filters.
const YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

fn local_to_utc(naive: NaiveDateTime, offset: &FixedOffset) -> AppResult<DateTime<Utc>> {
    if !YEARS.contains(&naive.year()) {
        return Err(AppError::Validation(format!("Date out of range: {}", naive.date())));
    }
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| AppError::Validation(format!("Invalid local time: {}", naive)))
}

/// Start of `date` in the given offset, as UTC.
pub fn start_of_day(date: NaiveDate, offset: &FixedOffset) -> AppResult<DateTime<Utc>> {
    local_to_utc(date.and_time(NaiveTime::MIN), offset)
}

/// Expected return date from the form: a bare `YYYY-MM-DD` (start of that local
/// day) or a full RFC 3339 timestamp.
fn parse_return_date(raw: &str, offset: &FixedOffset) -> AppResult<Option<DateTime<Utc>>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("Invalid expected return date: {}", raw)))?;
    start_of_day(date, offset).map(Some)
}

fn default_quantity() -> i64 {
    1
}

fn default_unit() -> String {
    "Pcs".to_string()
}

fn default_type() -> GatePassType {
    GatePassType::NonReturnable
}

/// View-model of the create/edit form
///
/// Dates stay as the strings the form produced; [`PassForm::validate`] and the
/// lifecycle functions turn them into timestamps in the configured offset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassForm {
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub requester_name: String,
    #[serde(default)]
    pub requester_category: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub vehicle_info: VehicleInfo,
    #[serde(default)]
    pub item_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub remarks: String,
    #[serde(rename = "type", default = "default_type")]
    pub pass_type: GatePassType,
    #[serde(default)]
    pub pass_date: String,
    #[serde(default)]
    pub pass_time: String,
    #[serde(default)]
    pub expected_return_date: String,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl PassForm {
    /// Empty form dated at `now` in the local offset.
    pub fn blank(now: DateTime<Utc>, offset: &FixedOffset) -> Self {
        let local = now.with_timezone(offset);
        PassForm {
            department: String::new(),
            requester_name: String::new(),
            requester_category: String::new(),
            purpose: String::new(),
            vehicle_info: VehicleInfo::default(),
            item_id: String::new(),
            quantity: default_quantity(),
            unit: default_unit(),
            remarks: String::new(),
            pass_type: default_type(),
            pass_date: local.format("%Y-%m-%d").to_string(),
            pass_time: local.format("%H:%M").to_string(),
            expected_return_date: String::new(),
            photo_url: None,
        }
    }

    /// Form pre-filled from an existing pass, for editing.
    pub fn from_pass(pass: &GatePass, offset: &FixedOffset) -> Self {
        let created = pass.created_at.with_timezone(offset);
        let line = pass.primary_item();
        PassForm {
            department: pass.department.clone(),
            requester_name: pass.requester_name.clone(),
            requester_category: pass.requester_category.clone(),
            purpose: pass.purpose.clone(),
            vehicle_info: pass.vehicle_info.clone(),
            item_id: line.map(|l| l.item_id.clone()).unwrap_or_default(),
            quantity: line.map(|l| l.quantity).unwrap_or_else(default_quantity),
            unit: line.map(|l| l.unit.clone()).unwrap_or_else(default_unit),
            remarks: line.map(|l| l.remarks.clone()).unwrap_or_default(),
            pass_type: pass.pass_type,
            pass_date: created.format("%Y-%m-%d").to_string(),
            pass_time: created.format("%H:%M").to_string(),
            expected_return_date: pass
                .expected_return_date
                .map(|d| d.with_timezone(offset).format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            photo_url: pass.photo_url.clone(),
        }
    }

    /// Requester name, department, category, item and a positive quantity are required.
    pub fn validate(&self) -> AppResult<()> {
        if self.requester_name.trim().is_empty()
            || self.department.trim().is_empty()
            || self.requester_category.trim().is_empty()
            || self.item_id.trim().is_empty()
            || self.quantity <= 0
        {
            return Err(AppError::Validation(REQUIRED_FIELDS.to_string()));
        }
        Ok(())
    }

    fn created_at(&self, offset: &FixedOffset) -> AppResult<DateTime<Utc>> {
        local_datetime(&self.pass_date, &self.pass_time, offset)
    }

    fn expected_return(&self, offset: &FixedOffset) -> AppResult<Option<DateTime<Utc>>> {
        match self.pass_type {
            GatePassType::Returnable => parse_return_date(&self.expected_return_date, offset),
            GatePassType::NonReturnable => Ok(None),
        }
    }

    fn item_line(&self) -> GatePassItem {
        GatePassItem {
            item_id: self.item_id.clone(),
            quantity: self.quantity,
            unit: self.unit.clone(),
            remarks: self.remarks.clone(),
        }
    }
}

/// Issue a new pass
///
/// Validates the form, numbers the pass, puts it at the front of the list and
/// takes the quantity out of stock. Nothing is mutated when any check fails.
///
/// # Arguments
/// * `store` - Application store
/// * `form` - Submitted form
/// * `actor` - Logged-in user; must be Admin or Security
/// * `offset` - Offset the form's date and time are interpreted in
///
/// # Returns
/// * `AppResult<GatePass>` - The stored pass
pub fn create_gate_pass(
    store: &mut Store,
    form: &PassForm,
    actor: &User,
    offset: &FixedOffset,
) -> AppResult<GatePass> {
    if !actor.role.can_create_pass() {
        return Err(AppError::PermissionDenied(
            "Only Admin and Security users can create gate passes.".to_string(),
        ));
    }
    form.validate()?;
    if store.item(&form.item_id).is_none() {
        return Err(AppError::NotFound(format!("Item {} not found", form.item_id)));
    }
    let created_at = form.created_at(offset)?;
    let expected_return_date = form.expected_return(offset)?;

    let pass = GatePass {
        id: format!("gp-{}", Uuid::new_v4()),
        gate_pass_no: next_gate_pass_no(store.gate_passes()),
        department: form.department.trim().to_string(),
        requester_name: form.requester_name.trim().to_string(),
        requester_category: form.requester_category.trim().to_string(),
        purpose: form.purpose.clone(),
        vehicle_info: form.vehicle_info.clone(),
        items: vec![form.item_line()],
        pass_type: form.pass_type,
        status: GatePassStatus::Approved,
        created_at,
        expected_return_date,
        returned_at: None,
        approved_by: None,
        delivered_by: None,
        returned_by: None,
        photo_url: form.photo_url.clone().filter(|u| !u.trim().is_empty()),
    };

    store.adjust_stock(&form.item_id, -form.quantity)?;
    store.insert_gate_pass(pass.clone());
    Ok(pass)
}

/// Re-submit an existing pass from the form
///
/// Id, number, status and the approval/delivery/return stamps are kept. Stock
/// is left alone even when the quantity or item changes.
pub fn update_gate_pass(
    store: &mut Store,
    id: &str,
    form: &PassForm,
    offset: &FixedOffset,
) -> AppResult<GatePass> {
    form.validate()?;
    let existing = store
        .gate_pass(id)
        .ok_or_else(|| AppError::NotFound(format!("Gate pass {} not found", id)))?;
    if store.item(&form.item_id).is_none() {
        return Err(AppError::NotFound(format!("Item {} not found", form.item_id)));
    }

    let updated = GatePass {
        department: form.department.trim().to_string(),
        requester_name: form.requester_name.trim().to_string(),
        requester_category: form.requester_category.trim().to_string(),
        purpose: form.purpose.clone(),
        vehicle_info: form.vehicle_info.clone(),
        items: vec![form.item_line()],
        pass_type: form.pass_type,
        created_at: form.created_at(offset)?,
        expected_return_date: form.expected_return(offset)?,
        photo_url: form.photo_url.clone().filter(|u| !u.trim().is_empty()),
        ..existing.clone()
    };
    store.replace_gate_pass(updated.clone())?;
    Ok(updated)
}

/// Return confirmation form
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnForm {
    #[serde(default)]
    pub return_date: String,
    #[serde(default)]
    pub return_time: String,
    #[serde(default)]
    pub returned_by: String,
}

/// Mark a returnable pass as returned and put its quantity back in stock.
pub fn confirm_return(
    store: &mut Store,
    id: &str,
    form: &ReturnForm,
    offset: &FixedOffset,
) -> AppResult<GatePass> {
    if form.return_date.trim().is_empty()
        || form.return_time.trim().is_empty()
        || form.returned_by.trim().is_empty()
    {
        return Err(AppError::Validation(RETURN_FIELDS.to_string()));
    }
    let pass = store
        .gate_pass(id)
        .ok_or_else(|| AppError::NotFound(format!("Gate pass {} not found", id)))?;
    if !pass.is_returnable() {
        return Err(AppError::Conflict(format!(
            "Gate pass {} is not returnable.",
            pass.gate_pass_no
        )));
    }
    if !matches!(
        pass.status,
        GatePassStatus::Delivered | GatePassStatus::Overdue
    ) {
        return Err(AppError::Conflict(format!(
            "Gate pass {} cannot be returned while {}.",
            pass.gate_pass_no, pass.status
        )));
    }
    let returned_at = local_datetime(&form.return_date, &form.return_time, offset)?;

    let mut updated = pass.clone();
    updated.status = GatePassStatus::Returned;
    updated.returned_at = Some(returned_at);
    updated.returned_by = Some(form.returned_by.trim().to_string());

    if let Some(line) = updated.primary_item() {
        store.adjust_stock(&line.item_id, line.quantity)?;
    }
    store.replace_gate_pass(updated.clone())?;
    Ok(updated)
}

/// Whether a manual status change from `from` to `to` is allowed for a pass of `pass_type`.
///
/// `Returned` is reachable only through [`confirm_return`].
pub fn can_transition(from: GatePassStatus, to: GatePassStatus, pass_type: GatePassType) -> bool {
    use GatePassStatus::*;
    match (from, to) {
        (Pending, Approved) | (Pending, Cancelled) => true,
        (Approved, Delivered) | (Approved, Cancelled) => true,
        (Delivered, Overdue) => pass_type == GatePassType::Returnable,
        _ => false,
    }
}

/// Apply a manual status change, stamping the acting user's name where the
/// target state records one. Cancelling keeps the stock decrement.
pub fn transition(
    store: &mut Store,
    id: &str,
    target: GatePassStatus,
    actor: &User,
) -> AppResult<GatePass> {
    let pass = store
        .gate_pass(id)
        .ok_or_else(|| AppError::NotFound(format!("Gate pass {} not found", id)))?;
    if !can_transition(pass.status, target, pass.pass_type) {
        return Err(AppError::Conflict(format!(
            "Cannot move gate pass {} from {} to {}.",
            pass.gate_pass_no, pass.status, target
        )));
    }
    let mut updated = pass.clone();
    updated.status = target;
    match target {
        GatePassStatus::Approved => updated.approved_by = Some(actor.name.clone()),
        GatePassStatus::Delivered => updated.delivered_by = Some(actor.name.clone()),
        _ => {}
    }
    store.replace_gate_pass(updated.clone())?;
    log::info!(
        "{} moved {} to {}",
        actor.name,
        updated.gate_pass_no,
        updated.status
    );
    Ok(updated)
}

/// Search and date-range filter for the pass list
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PassFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

/// Passes matching `filter`, newest first.
///
/// `from` starts at local midnight; `to` covers its whole local day. The search
/// term matches number, requester, department, item name, type and status.
pub fn filter_gate_passes<'a>(
    store: &'a Store,
    filter: &PassFilter,
    offset: &FixedOffset,
) -> AppResult<Vec<&'a GatePass>> {
    let from = filter.from.map(|d| start_of_day(d, offset)).transpose()?;
    let to = filter
        .to
        .map(|d| {
            let next = d
                .succ_opt()
                .ok_or_else(|| AppError::Validation("Invalid date range".to_string()))?;
            start_of_day(next, offset)
        })
        .transpose()?;
    let term = filter
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let mut found: Vec<&GatePass> = store
        .gate_passes()
        .iter()
        .filter(|p| from.is_none_or(|start| p.created_at >= start))
        .filter(|p| to.is_none_or(|end| p.created_at < end))
        .filter(|p| match &term {
            None => true,
            Some(term) => [
                p.gate_pass_no.clone(),
                p.requester_name.clone(),
                p.department.clone(),
                store.pass_item_name(p),
                p.pass_type.to_string(),
                p.status.to_string(),
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(term.as_str())),
        })
        .collect();
    found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(found)
}

/// Passes still out: everything `Overdue` plus returnable passes that are
/// `Delivered`. Earliest due date first, passes without one last.
pub fn overdue_and_pending(store: &Store) -> Vec<&GatePass> {
    let mut found: Vec<&GatePass> = store
        .gate_passes()
        .iter()
        .filter(|p| {
            p.status == GatePassStatus::Overdue
                || (p.is_returnable() && p.status == GatePassStatus::Delivered)
        })
        .collect();
    found.sort_by_key(|p| (p.expected_return_date.is_none(), p.expected_return_date));
    found
}

/// Display-only flag: returnable, still open and past its expected return date.
pub fn is_past_due(pass: &GatePass, now: DateTime<Utc>) -> bool {
    pass.is_returnable()
        && !matches!(
            pass.status,
            GatePassStatus::Returned | GatePassStatus::Cancelled
        )
        && pass.expected_return_date.is_some_and(|due| due < now)
}

/// Render a span as `"<d>d <h>h <m>m"`, omitting zero parts. Non-positive spans are `"0m"`.
pub fn format_duration(span: Duration) -> String {
    let total_minutes = span.num_minutes();
    if total_minutes <= 0 {
        return "0m".to_string();
    }
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes % (24 * 60)) / 60;
    let minutes = total_minutes % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if parts.is_empty() {
        return "0m".to_string();
    }
    parts.join(" ")
}

/// Duration between two RFC 3339 timestamps; `"0m"` when either is malformed.
pub fn calculate_duration(start: &str, end: &str) -> String {
    match (
        DateTime::parse_from_rfc3339(start.trim()),
        DateTime::parse_from_rfc3339(end.trim()),
    ) {
        (Ok(start), Ok(end)) => format_duration(end.signed_duration_since(start)),
        _ => "0m".to_string(),
    }
}

/// List row: the pass plus its resolved item name and the past-due flag.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassView<'a> {
    #[serde(flatten)]
    pub pass: &'a GatePass,
    pub item_name: String,
    pub past_due: bool,
}

impl<'a> PassView<'a> {
    pub fn new(store: &Store, pass: &'a GatePass, now: DateTime<Utc>) -> Self {
        PassView {
            pass,
            item_name: store.pass_item_name(pass),
            past_due: is_past_due(pass, now),
        }
    }
}

/// Detail page: the list row plus the out-and-back duration once returned.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassDetail<'a> {
    #[serde(flatten)]
    pub view: PassView<'a>,
    pub duration: Option<String>,
}

impl<'a> PassDetail<'a> {
    pub fn new(store: &Store, pass: &'a GatePass, now: DateTime<Utc>) -> Self {
        PassDetail {
            view: PassView::new(store, pass, now),
            duration: pass
                .returned_at
                .map(|returned| format_duration(returned.signed_duration_since(pass.created_at))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewItem, Role};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn user(role: Role) -> User {
        User {
            id: "u1".into(),
            name: "Gate Keeper".into(),
            role,
            email: "gk@example.com".into(),
        }
    }

    fn store_with_item(stock: i64) -> (Store, String) {
        let mut store = Store::empty();
        let item = store
            .add_item(NewItem {
                name: "Drill".into(),
                code: "D-1".into(),
                category: "Tools".into(),
                unit: "Pcs".into(),
                department: "Workshop".into(),
                stock,
            })
            .unwrap();
        (store, item.id)
    }

    fn form(item_id: &str, quantity: i64, pass_type: GatePassType) -> PassForm {
        PassForm {
            department: "Workshop".into(),
            requester_name: "B. Islam".into(),
            requester_category: "Factory Employee".into(),
            item_id: item_id.into(),
            quantity,
            pass_type,
            pass_date: "2024-01-05".into(),
            pass_time: "10:00".into(),
            expected_return_date: "2024-01-08".into(),
            ..PassForm::blank(Utc::now(), &utc())
        }
    }

    fn pass_numbered(no: &str) -> GatePass {
        let mut pass = crate::seed::gate_passes(Utc::now()).remove(0);
        pass.gate_pass_no = no.to_string();
        pass
    }

    #[test]
    fn numbering_takes_max_suffix() {
        assert_eq!(next_gate_pass_no(&[]), "GP-01");
        let passes = vec![
            pass_numbered("GP-2024-0005"),
            pass_numbered("GP-09"),
            pass_numbered("GP-X"),
        ];
        assert_eq!(next_gate_pass_no(&passes), "GP-10");
        assert_eq!(next_gate_pass_no(&[pass_numbered("GP-123")]), "GP-124");
    }

    #[test]
    fn create_then_return_restores_stock() {
        let (mut store, item_id) = store_with_item(10);
        let pass = create_gate_pass(
            &mut store,
            &form(&item_id, 3, GatePassType::Returnable),
            &user(Role::Security),
            &utc(),
        )
        .unwrap();
        assert_eq!(pass.gate_pass_no, "GP-01");
        assert_eq!(pass.status, GatePassStatus::Approved);
        assert_eq!(pass.created_at.to_rfc3339(), "2024-01-05T10:00:00+00:00");
        assert!(pass.expected_return_date.is_some());
        assert_eq!(store.item(&item_id).unwrap().stock, 7);

        let admin = user(Role::Admin);
        transition(&mut store, &pass.id, GatePassStatus::Delivered, &admin).unwrap();
        let returned = confirm_return(
            &mut store,
            &pass.id,
            &ReturnForm {
                return_date: "2024-01-07".into(),
                return_time: "09:30".into(),
                returned_by: "Rahim".into(),
            },
            &utc(),
        )
        .unwrap();
        assert_eq!(returned.status, GatePassStatus::Returned);
        assert_eq!(returned.returned_by.as_deref(), Some("Rahim"));
        assert_eq!(store.item(&item_id).unwrap().stock, 10);
    }

    #[test]
    fn non_returnable_never_gets_a_due_date() {
        let (mut store, item_id) = store_with_item(1);
        let pass = create_gate_pass(
            &mut store,
            &form(&item_id, 1, GatePassType::NonReturnable),
            &user(Role::Admin),
            &utc(),
        )
        .unwrap();
        assert!(pass.expected_return_date.is_none());
    }

    #[test]
    fn invalid_form_mutates_nothing() {
        let (mut store, item_id) = store_with_item(5);
        let mut bad = form(&item_id, 0, GatePassType::Returnable);
        let err = create_gate_pass(&mut store, &bad, &user(Role::Admin), &utc()).unwrap_err();
        assert_eq!(err.to_string(), "Please fill all required fields.");

        bad.quantity = 1;
        bad.requester_name.clear();
        assert!(create_gate_pass(&mut store, &bad, &user(Role::Admin), &utc()).is_err());
        assert!(store.gate_passes().is_empty());
        assert_eq!(store.item(&item_id).unwrap().stock, 5);
    }

    #[test]
    fn department_head_cannot_create() {
        let (mut store, item_id) = store_with_item(5);
        let err = create_gate_pass(
            &mut store,
            &form(&item_id, 1, GatePassType::Returnable),
            &user(Role::DepartmentHead),
            &utc(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
    }

    #[test]
    fn edit_keeps_identity_and_stock() {
        let (mut store, item_id) = store_with_item(5);
        let pass = create_gate_pass(
            &mut store,
            &form(&item_id, 2, GatePassType::Returnable),
            &user(Role::Admin),
            &utc(),
        )
        .unwrap();
        let mut edit = PassForm::from_pass(&pass, &utc());
        assert_eq!(edit.pass_time, "10:00");
        edit.purpose = "Calibration".into();
        edit.quantity = 4;
        let updated = update_gate_pass(&mut store, &pass.id, &edit, &utc()).unwrap();
        assert_eq!(updated.id, pass.id);
        assert_eq!(updated.gate_pass_no, pass.gate_pass_no);
        assert_eq!(updated.purpose, "Calibration");
        assert_eq!(store.item(&item_id).unwrap().stock, 3);
    }

    #[test]
    fn return_requires_all_fields_and_open_returnable_pass() {
        let mut store = Store::seeded(Utc::now());
        let missing = ReturnForm {
            return_date: "2024-01-07".into(),
            return_time: "09:30".into(),
            returned_by: " ".into(),
        };
        let err = confirm_return(&mut store, "gp1", &missing, &utc()).unwrap_err();
        assert_eq!(err.to_string(), RETURN_FIELDS);

        let ok = ReturnForm {
            returned_by: "Karim".into(),
            ..missing
        };
        // gp3 is non-returnable, gp5 already returned
        assert!(confirm_return(&mut store, "gp3", &ok, &utc()).is_err());
        assert!(confirm_return(&mut store, "gp5", &ok, &utc()).is_err());
        // gp1 is overdue
        assert!(confirm_return(&mut store, "gp1", &ok, &utc()).is_ok());
    }

    #[test]
    fn transition_table() {
        use GatePassStatus::*;
        let r = GatePassType::Returnable;
        let n = GatePassType::NonReturnable;
        assert!(can_transition(Pending, Approved, r));
        assert!(can_transition(Approved, Cancelled, n));
        assert!(can_transition(Delivered, Overdue, r));
        assert!(!can_transition(Delivered, Overdue, n));
        assert!(!can_transition(Delivered, Returned, r));
        assert!(!can_transition(Returned, Approved, r));
        assert!(!can_transition(Cancelled, Approved, n));
    }

    #[test]
    fn transition_stamps_actor() {
        let mut store = Store::seeded(Utc::now());
        let guard = user(Role::Security);
        let delivered = transition(&mut store, "gp4", GatePassStatus::Delivered, &guard).unwrap();
        assert_eq!(delivered.delivered_by.as_deref(), Some("Gate Keeper"));
        let err = transition(&mut store, "gp4", GatePassStatus::Overdue, &guard).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn search_overdue_returns_only_overdue() {
        let store = Store::seeded(Utc::now());
        let filter = PassFilter {
            search: Some("Overdue".into()),
            ..Default::default()
        };
        let found = filter_gate_passes(&store, &filter, &utc()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.iter().all(|p| p.status == GatePassStatus::Overdue));
    }

    #[test]
    fn search_matches_item_name() {
        let store = Store::seeded(Utc::now());
        let filter = PassFilter {
            search: Some("motor".into()),
            ..Default::default()
        };
        let found = filter_gate_passes(&store, &filter, &utc()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "gp2");
    }

    #[test]
    fn date_range_is_inclusive_by_day() {
        let (mut store, item_id) = store_with_item(5);
        create_gate_pass(
            &mut store,
            &form(&item_id, 1, GatePassType::Returnable),
            &user(Role::Admin),
            &utc(),
        )
        .unwrap();
        let day = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();

        let inside = PassFilter {
            search: None,
            from: day("2024-01-01"),
            to: day("2024-01-10"),
        };
        assert_eq!(filter_gate_passes(&store, &inside, &utc()).unwrap().len(), 1);

        let before = PassFilter {
            search: None,
            from: day("2024-01-01"),
            to: day("2024-01-04"),
        };
        assert!(filter_gate_passes(&store, &before, &utc()).unwrap().is_empty());

        let same_day = PassFilter {
            search: None,
            from: day("2024-01-05"),
            to: day("2024-01-05"),
        };
        assert_eq!(filter_gate_passes(&store, &same_day, &utc()).unwrap().len(), 1);
    }

    #[test]
    fn list_is_newest_first() {
        let store = Store::seeded(Utc::now());
        let found = filter_gate_passes(&store, &PassFilter::default(), &utc()).unwrap();
        assert!(found.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn overdue_and_pending_sorted_by_due_date() {
        let store = Store::seeded(Utc::now());
        let found = overdue_and_pending(&store);
        let ids: Vec<&str> = found.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["gp1", "gp2"]);
    }

    #[test]
    fn past_due_is_display_only() {
        let now = Utc::now();
        let store = Store::seeded(now);
        let gp2 = store.gate_pass("gp2").unwrap();
        assert!(!is_past_due(gp2, now));
        assert!(is_past_due(gp2, now + Duration::days(2)));
        assert_eq!(gp2.status, GatePassStatus::Delivered);
        assert!(!is_past_due(store.gate_pass("gp5").unwrap(), now));
    }

    #[test]
    fn durations() {
        assert_eq!(
            calculate_duration("2024-01-01T00:00:00Z", "2024-01-03T02:30:00Z"),
            "2d 2h 30m"
        );
        assert_eq!(calculate_duration("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z"), "1d");
        assert_eq!(calculate_duration("2024-01-02T00:00:00Z", "2024-01-01T00:00:00Z"), "0m");
        assert_eq!(calculate_duration("yesterday", "2024-01-01T00:00:00Z"), "0m");
        assert_eq!(format_duration(Duration::seconds(30)), "0m");
    }

    #[test]
    fn local_offset_shifts_created_at() {
        let dhaka = FixedOffset::east_opt(6 * 3600).unwrap();
        let at = local_datetime("2024-01-05", "10:00:00", &dhaka).unwrap();
        assert_eq!(at.to_rfc3339(), "2024-01-05T04:00:00+00:00");
        assert!(local_datetime("05/01/2024", "10:00", &dhaka).is_err());
    }

    #[test]
    fn extreme_filter_dates_are_rejected() {
        let store = Store::seeded(Utc::now());
        let err = filter_gate_passes(
            &store,
            &PassFilter {
                to: Some(NaiveDate::MAX),
                ..Default::default()
            },
            &utc(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let east = FixedOffset::east_opt(6 * 3600).unwrap();
        let err = filter_gate_passes(
            &store,
            &PassFilter {
                from: Some(NaiveDate::MIN),
                ..Default::default()
            },
            &east,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let parsed: NaiveDate = "+262142-12-31".parse().unwrap();
        assert!(start_of_day(parsed, &utc()).is_err());
        assert!(local_datetime("+12345-01-01", "10:00", &utc()).is_err());
    }

    #[test]
    fn stock_overflow_leaves_store_untouched() {
        let (mut store, item_id) = store_with_item(0);
        let security = user(Role::Security);
        create_gate_pass(
            &mut store,
            &form(&item_id, i64::MAX, GatePassType::NonReturnable),
            &security,
            &utc(),
        )
        .unwrap();
        let err = create_gate_pass(
            &mut store,
            &form(&item_id, i64::MAX, GatePassType::NonReturnable),
            &security,
            &utc(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.gate_passes().len(), 1);
        assert_eq!(store.item(&item_id).unwrap().stock, -i64::MAX);
    }
}
