use crate::model::{GatePassStatus, GatePassType};
use crate::store::Store;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use serde::Serialize;

/// Months shown in the movement series
const MOVEMENT_MONTHS: u32 = 6;
const RECENT_PASSES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub id: String,
    pub gate_pass_no: String,
    pub requester_name: String,
    pub item_name: String,
    pub status: GatePassStatus,
    pub created_at: DateTime<Utc>,
}

/// Passes out (created) and back in (returned) during one calendar month
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyMovement {
    /// `YYYY-MM`
    pub month: String,
    /// Short month name, e.g. `Jan`
    pub label: String,
    pub outgoing: usize,
    pub incoming: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub passes_today: usize,
    pub pending_returns: usize,
    pub overdue: usize,
    pub total_stock: i64,
    pub recent: Vec<RecentActivity>,
    pub movement: Vec<MonthlyMovement>,
}

/// First day of the month `back` months before the month of `date`.
fn month_start(date: NaiveDate, back: u32) -> Option<NaiveDate> {
    let index = date.year() * 12 + date.month0() as i32 - back as i32;
    NaiveDate::from_ymd_opt(index.div_euclid(12), index.rem_euclid(12) as u32 + 1, 1)
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

/// Aggregate the dashboard cards, the recent list and the movement series
///
/// "Today" and month boundaries follow the local offset.
pub fn dashboard_stats(store: &Store, now: DateTime<Utc>, offset: &FixedOffset) -> DashboardStats {
    let local_date = |at: DateTime<Utc>| at.with_timezone(offset).date_naive();
    let today = local_date(now);
    let passes = store.gate_passes();

    let passes_today = passes
        .iter()
        .filter(|p| local_date(p.created_at) == today)
        .count();
    let pending_returns = passes
        .iter()
        .filter(|p| p.status == GatePassStatus::Delivered && p.pass_type == GatePassType::Returnable)
        .count();
    let overdue = passes
        .iter()
        .filter(|p| p.status == GatePassStatus::Overdue)
        .count();
    let total_stock = store
        .items()
        .iter()
        .fold(0i64, |total, i| total.saturating_add(i.stock));

    let recent = passes
        .iter()
        .take(RECENT_PASSES)
        .map(|p| RecentActivity {
            id: p.id.clone(),
            gate_pass_no: p.gate_pass_no.clone(),
            requester_name: p.requester_name.clone(),
            item_name: store.pass_item_name(p),
            status: p.status,
            created_at: p.created_at,
        })
        .collect();

    let movement = (0..MOVEMENT_MONTHS)
        .rev()
        .filter_map(|back| month_start(today, back))
        .map(|start| MonthlyMovement {
            month: start.format("%Y-%m").to_string(),
            label: start.format("%b").to_string(),
            outgoing: passes
                .iter()
                .filter(|p| same_month(local_date(p.created_at), start))
                .count(),
            incoming: passes
                .iter()
                .filter_map(|p| p.returned_at)
                .filter(|at| same_month(local_date(*at), start))
                .count(),
        })
        .collect();

    DashboardStats {
        passes_today,
        pending_returns,
        overdue,
        total_stock,
        recent,
        movement,
    }
}
