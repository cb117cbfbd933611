use crate::error::{AppError, AppResult};
use crate::model::{Item, Requester};
use crate::sheet::{SHEET_HEADERS, SheetRow};
use chrono::NaiveDate;

/// Escape one CSV field: values holding a comma, quote or newline are quoted
/// with inner quotes doubled.
fn escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    let row: Vec<String> = fields.into_iter().map(escape).collect();
    out.push_str(&row.join(","));
    out.push('\n');
}

/// Export the item catalog as CSV
///
/// Columns are `name,code,category,department,unit,stock`.
///
/// # Arguments
/// * `items` - Items to export, in display order
///
/// # Returns
/// * `AppResult<String>` - CSV text, or a validation error when there is nothing to export
///
/// # Examples
/// ```
/// use gatepass::downloader::items_to_csv;
///
/// let err = items_to_csv(&[]).unwrap_err();
/// assert_eq!(err.to_string(), "No items to export.");
/// ```
pub fn items_to_csv(items: &[Item]) -> AppResult<String> {
    if items.is_empty() {
        return Err(AppError::Validation("No items to export.".to_string()));
    }
    let mut csv = String::new();
    push_row(
        &mut csv,
        ["name", "code", "category", "department", "unit", "stock"],
    );
    for item in items {
        let stock = item.stock.to_string();
        push_row(
            &mut csv,
            [
                item.name.as_str(),
                item.code.as_str(),
                item.category.as_str(),
                item.department.as_str(),
                item.unit.as_str(),
                stock.as_str(),
            ],
        );
    }
    Ok(csv)
}

/// Export the requester directory as CSV (`name,category,department`).
pub fn requesters_to_csv(requesters: &[Requester]) -> AppResult<String> {
    if requesters.is_empty() {
        return Err(AppError::Validation("No requesters to export.".to_string()));
    }
    let mut csv = String::new();
    push_row(&mut csv, ["name", "category", "department"]);
    for r in requesters {
        push_row(
            &mut csv,
            [
                r.name.as_str(),
                r.category.as_str(),
                r.department.as_deref().unwrap_or(""),
            ],
        );
    }
    Ok(csv)
}

/// Export sheet rows as CSV under the literal sheet headers.
pub fn sheet_rows_to_csv(rows: &[SheetRow]) -> AppResult<String> {
    if rows.is_empty() {
        return Err(AppError::Validation("No data to export.".to_string()));
    }
    let mut csv = String::new();
    push_row(&mut csv, SHEET_HEADERS.iter().copied());
    for row in rows {
        push_row(&mut csv, row.cells());
    }
    Ok(csv)
}

/// Export sheet rows as an XLSX workbook with a bold header row.
#[cfg(feature = "web")]
pub fn sheet_rows_to_xlsx(rows: &[SheetRow]) -> AppResult<Vec<u8>> {
    use rust_xlsxwriter::{Format, Workbook, Worksheet};

    if rows.is_empty() {
        return Err(AppError::Validation("No data to export.".to_string()));
    }
    let xlsx_err = |e: rust_xlsxwriter::XlsxError| AppError::Internal(e.to_string());

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name("Gate Pass Details").map_err(xlsx_err)?;
    let bold = Format::new().set_bold();

    for (c, header) in SHEET_HEADERS.iter().enumerate() {
        worksheet
            .write_string_with_format(0, c as u16, *header, &bold)
            .map_err(xlsx_err)?;
    }
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.cells().into_iter().enumerate() {
            worksheet
                .write_string((r + 1) as u32, c as u16, value)
                .map_err(xlsx_err)?;
        }
    }

    workbook.push_worksheet(worksheet);
    workbook.save_to_buffer().map_err(xlsx_err)
}

pub fn items_export_filename(date: NaiveDate) -> String {
    format!("items_export_{}.csv", date.format("%Y-%m-%d"))
}

pub fn requesters_export_filename(date: NaiveDate) -> String {
    format!("requesters_export_{}.csv", date.format("%Y-%m-%d"))
}

pub const SHEET_CSV_FILENAME: &str = "gate_pass_details.csv";
pub const SHEET_XLSX_FILENAME: &str = "gate_pass_details.xlsx";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;

    #[test]
    fn items_csv_has_header_and_rows() {
        let csv = items_to_csv(&seed::items()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "name,code,category,department,unit,stock");
        assert_eq!(lines[1], "Laptop HP Probook,ITM-001,IT Equipment,IT,Pcs,1");
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn fields_with_commas_are_quoted() {
        let mut items = seed::items();
        items.truncate(1);
        items[0].name = "Cable, \"long\"".into();
        let csv = items_to_csv(&items).unwrap();
        assert!(csv.contains("\"Cable, \"\"long\"\"\",ITM-001"));
    }

    #[test]
    fn empty_exports_fail() {
        assert_eq!(items_to_csv(&[]).unwrap_err().to_string(), "No items to export.");
        assert_eq!(
            requesters_to_csv(&[]).unwrap_err().to_string(),
            "No requesters to export."
        );
    }

    #[test]
    fn requester_department_may_be_blank() {
        let mut people = seed::requesters();
        people.truncate(1);
        people[0].department = None;
        let csv = requesters_to_csv(&people).unwrap();
        assert_eq!(csv, "name,category,department\nA. R. Khan,Management,\n");
    }

    #[test]
    fn filenames() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(items_export_filename(day), "items_export_2024-03-09.csv");
        assert_eq!(requesters_export_filename(day), "requesters_export_2024-03-09.csv");
    }
}
