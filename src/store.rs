use crate::error::{AppError, AppResult};
use crate::model::{GatePass, Item, NewItem, NewRequester, Requester};
use crate::seed;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

pub const UNKNOWN_ITEM: &str = "Unknown Item";

/// All application data, owned by one value
///
/// Handlers read through the accessors and change state only through the
/// mutators below, so every invariant on items, requesters and categories is
/// enforced in one place. The whole struct is what gets snapshotted to disk.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Store {
    items: Vec<Item>,
    requesters: Vec<Requester>,
    categories: BTreeSet<String>,
    units: BTreeSet<String>,
    gate_passes: Vec<GatePass>,
}

/// Outcome of a bulk import
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary<T> {
    pub imported: Vec<T>,
    pub skipped: usize,
}

fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

impl Store {
    /// An empty store that still knows the default units.
    pub fn empty() -> Self {
        Store {
            units: seed::UNITS.iter().map(|u| u.to_string()).collect(),
            ..Default::default()
        }
    }

    /// A store filled with the demo catalog, directory and passes, dated relative to `now`.
    pub fn seeded(now: DateTime<Utc>) -> Self {
        let requesters = seed::requesters();
        let categories = requesters.iter().map(|r| r.category.clone()).collect();
        Store {
            items: seed::items(),
            requesters,
            categories,
            units: seed::UNITS.iter().map(|u| u.to_string()).collect(),
            gate_passes: seed::gate_passes(now),
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn requesters(&self) -> &[Requester] {
        &self.requesters
    }

    pub fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    pub fn units(&self) -> &BTreeSet<String> {
        &self.units
    }

    /// Passes in store order (newest created first).
    pub fn gate_passes(&self) -> &[GatePass] {
        &self.gate_passes
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn requester(&self, id: &str) -> Option<&Requester> {
        self.requesters.iter().find(|r| r.id == id)
    }

    pub fn gate_pass(&self, id: &str) -> Option<&GatePass> {
        self.gate_passes.iter().find(|gp| gp.id == id)
    }

    /// Name of the item referenced by `item_id`, or `"Unknown Item"`.
    pub fn item_name(&self, item_id: &str) -> String {
        self.item(item_id)
            .map(|i| i.name.clone())
            .unwrap_or_else(|| UNKNOWN_ITEM.to_string())
    }

    /// Resolved item name of a pass's first line.
    pub fn pass_item_name(&self, pass: &GatePass) -> String {
        match pass.primary_item() {
            Some(line) => self.item_name(&line.item_id),
            None => UNKNOWN_ITEM.to_string(),
        }
    }

    fn code_taken(&self, code: &str, except_id: Option<&str>) -> bool {
        let code = code.to_lowercase();
        self.items
            .iter()
            .any(|i| i.code.to_lowercase() == code && Some(i.id.as_str()) != except_id)
    }

    fn validate_item(item: &NewItem) -> AppResult<()> {
        let required = [
            &item.name,
            &item.code,
            &item.category,
            &item.unit,
            &item.department,
        ];
        if required.iter().any(|f| f.trim().is_empty()) {
            return Err(AppError::Validation(
                "Please fill all required fields.".to_string(),
            ));
        }
        Ok(())
    }

    /// Add an item from the manual form. New items go to the front of the catalog.
    pub fn add_item(&mut self, item: NewItem) -> AppResult<Item> {
        Self::validate_item(&item)?;
        if self.code_taken(&item.code, None) {
            return Err(AppError::Conflict(format!(
                "An item with code \"{}\" already exists.",
                item.code
            )));
        }
        let item = item.into_item(new_id("i"));
        self.items.insert(0, item.clone());
        Ok(item)
    }

    pub fn update_item(&mut self, id: &str, update: NewItem) -> AppResult<Item> {
        Self::validate_item(&update)?;
        if self.code_taken(&update.code, Some(id)) {
            return Err(AppError::Conflict(format!(
                "An item with code \"{}\" already exists.",
                update.code
            )));
        }
        let slot = self
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", id)))?;
        *slot = update.into_item(id.to_string());
        Ok(slot.clone())
    }

    /// Remove an item that no gate pass references.
    pub fn delete_item(&mut self, id: &str) -> AppResult<Item> {
        if self.gate_passes.iter().any(|gp| gp.references_item(id)) {
            return Err(AppError::Conflict(
                "Cannot delete this item as it is used in one or more gate passes.".to_string(),
            ));
        }
        let pos = self
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", id)))?;
        Ok(self.items.remove(pos))
    }

    /// Add `delta` to an item's stock. There is no floor; stock may go negative.
    pub fn adjust_stock(&mut self, item_id: &str, delta: i64) -> AppResult<i64> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", item_id)))?;
        item.stock = item.stock.checked_add(delta).ok_or_else(|| {
            AppError::Validation(format!("Stock of {} is out of range.", item.code))
        })?;
        Ok(item.stock)
    }

    /// Append imported items, skipping codes already present (case-insensitive),
    /// including duplicates earlier in the same batch.
    pub fn import_items(&mut self, rows: Vec<NewItem>) -> AppResult<ImportSummary<Item>> {
        let mut seen: HashSet<String> = self.items.iter().map(|i| i.code.to_lowercase()).collect();
        let total = rows.len();
        let mut imported = Vec::new();
        for row in rows {
            if seen.insert(row.code.to_lowercase()) {
                imported.push(row.into_item(new_id("i")));
            }
        }
        if imported.is_empty() {
            return Err(AppError::Validation(
                "No new items to import. All items in the file already exist (based on item code)."
                    .to_string(),
            ));
        }
        self.items.extend(imported.iter().cloned());
        Ok(ImportSummary {
            skipped: total - imported.len(),
            imported,
        })
    }

    /// Items whose name, code, category or department contains `term`, sorted by name.
    pub fn search_items(&self, term: &str) -> Vec<&Item> {
        let term = term.trim().to_lowercase();
        let mut found: Vec<&Item> = self
            .items
            .iter()
            .filter(|i| {
                term.is_empty()
                    || contains_ci(&i.name, &term)
                    || contains_ci(&i.code, &term)
                    || contains_ci(&i.category, &term)
                    || contains_ci(&i.department, &term)
            })
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    fn validate_requester(&self, requester: &NewRequester) -> AppResult<()> {
        if requester.name.trim().is_empty() || requester.category.trim().is_empty() {
            return Err(AppError::Validation(
                "Please provide a name and category.".to_string(),
            ));
        }
        if !self.categories.contains(&requester.category) {
            return Err(AppError::Validation(format!(
                "Unknown requester category \"{}\".",
                requester.category
            )));
        }
        Ok(())
    }

    pub fn add_requester(&mut self, requester: NewRequester) -> AppResult<Requester> {
        self.validate_requester(&requester)?;
        let requester = Requester {
            id: new_id("r"),
            name: requester.name,
            category: requester.category,
            department: requester.department.filter(|d| !d.trim().is_empty()),
        };
        self.requesters.push(requester.clone());
        Ok(requester)
    }

    pub fn update_requester(&mut self, id: &str, update: NewRequester) -> AppResult<Requester> {
        self.validate_requester(&update)?;
        let slot = self
            .requesters
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Requester {} not found", id)))?;
        slot.name = update.name;
        slot.category = update.category;
        slot.department = update.department.filter(|d| !d.trim().is_empty());
        Ok(slot.clone())
    }

    /// Remove a requester that no gate pass names.
    pub fn delete_requester(&mut self, id: &str) -> AppResult<Requester> {
        let pos = self
            .requesters
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Requester {} not found", id)))?;
        let name = &self.requesters[pos].name;
        if self.gate_passes.iter().any(|gp| &gp.requester_name == name) {
            return Err(AppError::Conflict(
                "Cannot delete this requester as they are named on one or more gate passes."
                    .to_string(),
            ));
        }
        Ok(self.requesters.remove(pos))
    }

    /// Append imported requesters, skipping names already present
    /// (case-insensitive). Unknown categories are added to the category set.
    pub fn import_requesters(
        &mut self,
        rows: Vec<NewRequester>,
    ) -> AppResult<ImportSummary<Requester>> {
        let mut seen: HashSet<String> =
            self.requesters.iter().map(|r| r.name.to_lowercase()).collect();
        let total = rows.len();
        let mut imported = Vec::new();
        for row in rows {
            if row.name.is_empty() || row.category.is_empty() {
                continue;
            }
            if !seen.insert(row.name.to_lowercase()) {
                continue;
            }
            self.categories.insert(row.category.clone());
            imported.push(Requester {
                id: new_id("r"),
                name: row.name,
                category: row.category,
                department: row.department.filter(|d| !d.is_empty()),
            });
        }
        self.requesters.extend(imported.iter().cloned());
        Ok(ImportSummary {
            skipped: total - imported.len(),
            imported,
        })
    }

    /// Requesters whose name, category or department contains `term`, sorted by name.
    pub fn search_requesters(&self, term: &str) -> Vec<&Requester> {
        let term = term.trim().to_lowercase();
        let mut found: Vec<&Requester> = self
            .requesters
            .iter()
            .filter(|r| {
                term.is_empty()
                    || contains_ci(&r.name, &term)
                    || contains_ci(&r.category, &term)
                    || r.department.as_deref().is_some_and(|d| contains_ci(d, &term))
            })
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    pub fn requesters_in_category(&self, category: &str) -> Vec<&Requester> {
        self.requesters
            .iter()
            .filter(|r| r.category == category)
            .collect()
    }

    /// Add a trimmed category. Returns false when it was blank or already present.
    pub fn add_category(&mut self, category: &str) -> bool {
        let category = category.trim();
        if category.is_empty() {
            return false;
        }
        self.categories.insert(category.to_string())
    }

    pub fn delete_category(&mut self, category: &str) -> AppResult<()> {
        if self.requesters.iter().any(|r| r.category == category) {
            return Err(AppError::Conflict(format!(
                "Cannot delete category \"{}\" as it is being used by one or more requesters.",
                category
            )));
        }
        if !self.categories.remove(category) {
            return Err(AppError::NotFound(format!(
                "Category \"{}\" not found",
                category
            )));
        }
        Ok(())
    }

    pub fn add_unit(&mut self, unit: &str) -> bool {
        let unit = unit.trim();
        if unit.is_empty() {
            return false;
        }
        self.units.insert(unit.to_string())
    }

    /// Put a new pass at the front of the list.
    pub fn insert_gate_pass(&mut self, pass: GatePass) {
        self.gate_passes.insert(0, pass);
    }

    /// Replace the stored pass with the same id.
    pub fn replace_gate_pass(&mut self, pass: GatePass) -> AppResult<()> {
        let slot = self
            .gate_passes
            .iter_mut()
            .find(|gp| gp.id == pass.id)
            .ok_or_else(|| AppError::NotFound(format!("Gate pass {} not found", pass.id)))?;
        *slot = pass;
        Ok(())
    }
}
