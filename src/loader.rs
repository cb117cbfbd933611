use crate::error::{AppError, AppResult};
use crate::model::{NewItem, NewRequester};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref LEADING_INT: Regex = Regex::new(r"^[+-]?\d+").unwrap();
}

const EMPTY_CSV: &str = "CSV file is empty or has no data rows.";

/// A CSV document split into a lowercase header and its data rows
///
/// Splitting is on plain commas: quoted fields containing commas are not
/// supported. Double quotes are stripped from every header and value.
struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    fn parse(text: &str) -> AppResult<Self> {
        let lines: Vec<&str> = text
            .split('\n')
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty())
            .collect();
        if lines.len() < 2 {
            return Err(AppError::Validation(EMPTY_CSV.to_string()));
        }

        let headers = split_row(&lines[0].to_lowercase());
        let rows = lines[1..].iter().map(|l| split_row(l)).collect();
        Ok(CsvTable { headers, rows })
    }

    fn has_all(&self, required: &[&str]) -> bool {
        required.iter().all(|h| self.headers.iter().any(|c| c == h))
    }

    /// Each row as a header -> value map; missing trailing cells read as empty.
    fn records(&self) -> impl Iterator<Item = HashMap<&str, &str>> + '_ {
        self.rows.iter().map(|row| {
            self.headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.as_str(), row.get(i).map(String::as_str).unwrap_or("")))
                .collect()
        })
    }
}

fn split_row(line: &str) -> Vec<String> {
    line.trim()
        .split(',')
        .map(|v| v.replace('"', "").trim().to_string())
        .collect()
}

/// Leading integer of `raw`, or 0 (`"12 pcs"` reads as 12).
fn parse_stock(raw: &str) -> i64 {
    LEADING_INT
        .find(raw.trim())
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Parse an item catalog CSV
///
/// The header must contain `name`, `code` and `category`; `department`,
/// `unit` and `stock` are optional and default to `Unassigned`, `Pcs` and 0.
/// Rows missing a name, code or category are dropped.
///
/// # Arguments
/// * `text` - Full CSV document
///
/// # Returns
/// * `AppResult<Vec<NewItem>>` - The valid rows, never empty
///
/// # Examples
/// ```
/// use gatepass::loader::items_from_csv;
///
/// let csv = "name,code,category\nDrill,T-1,Tools\n";
/// let items = items_from_csv(csv).unwrap();
/// assert_eq!(items[0].unit, "Pcs");
/// ```
pub fn items_from_csv(text: &str) -> AppResult<Vec<NewItem>> {
    let table = CsvTable::parse(text)?;
    let required = ["name", "code", "category"];
    if !table.has_all(&required) {
        return Err(AppError::Validation(format!(
            "CSV must contain the following headers: {}.",
            required.join(", ")
        )));
    }

    let items: Vec<NewItem> = table
        .records()
        .filter_map(|rec| {
            let get = |k: &str| rec.get(k).copied().unwrap_or("");
            let or = |v: &str, d: &str| if v.is_empty() { d.to_string() } else { v.to_string() };
            let item = NewItem {
                name: get("name").to_string(),
                code: get("code").to_string(),
                category: get("category").to_string(),
                department: or(get("department"), "Unassigned"),
                unit: or(get("unit"), "Pcs"),
                stock: parse_stock(get("stock")),
            };
            (!item.name.is_empty() && !item.code.is_empty() && !item.category.is_empty())
                .then_some(item)
        })
        .collect();

    if items.is_empty() {
        return Err(AppError::Validation(
            "No valid new items found in the CSV to import.".to_string(),
        ));
    }
    Ok(items)
}

/// Parse a requester directory CSV with `name`, `category` and an optional `department`.
pub fn requesters_from_csv(text: &str) -> AppResult<Vec<NewRequester>> {
    let table = CsvTable::parse(text)?;
    if !table.has_all(&["name", "category"]) {
        return Err(AppError::Validation(
            "CSV must contain \"name\" and \"category\" columns.".to_string(),
        ));
    }

    Ok(table
        .records()
        .filter_map(|rec| {
            let name = rec.get("name").copied().unwrap_or("");
            let category = rec.get("category").copied().unwrap_or("");
            if name.is_empty() || category.is_empty() {
                return None;
            }
            let department = rec
                .get("department")
                .copied()
                .filter(|d| !d.is_empty())
                .map(str::to_string);
            Some(NewRequester {
                name: name.to_string(),
                category: category.to_string(),
                department,
            })
        })
        .collect())
}
