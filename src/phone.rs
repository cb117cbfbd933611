use crate::error::{AppError, AppResult};
use crate::reminder::OverdueSummaryRow;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NON_DIGIT: Regex = Regex::new(r"\D").unwrap();
}

/// Normalize a Bangladesh mobile number to international form without `+`
///
/// * `01XXXXXXXXX` (11 digits) becomes `8801XXXXXXXXX`
/// * `1XXXXXXXXX` (10 digits) becomes `8801XXXXXXXXX`
/// * `880...` with 13 digits is kept
///
/// Anything else comes back with only its digits.
///
/// # Examples
/// ```
/// use gatepass::phone::normalize_phone_number;
///
/// assert_eq!(normalize_phone_number("017-1234 5678"), "8801712345678");
/// assert_eq!(normalize_phone_number("+44 20 7946 0958"), "442079460958");
/// ```
pub fn normalize_phone_number(phone: &str) -> String {
    let cleaned = NON_DIGIT.replace_all(phone, "").into_owned();
    if cleaned.starts_with("01") && cleaned.len() == 11 {
        return format!("880{}", &cleaned[1..]);
    }
    if cleaned.starts_with('1') && cleaned.len() == 10 {
        return format!("880{}", cleaned);
    }
    cleaned
}

/// `https://wa.me/<number>?text=<message>` for a share button.
pub fn whatsapp_url(phone: &str, message: &str) -> AppResult<String> {
    let number = normalize_phone_number(phone);
    if number.is_empty() {
        return Err(AppError::Validation(
            "Please enter a valid phone number.".to_string(),
        ));
    }
    Ok(format!(
        "https://wa.me/{}?text={}",
        number,
        urlencoding::encode(message)
    ))
}

/// The summary text followed by one block per outstanding pass.
pub fn summary_share_message(summary: &str, rows: &[OverdueSummaryRow]) -> String {
    let mut message = format!("{}\n\n--- Overdue Items List ---\n\n", summary);
    for row in rows {
        message.push_str(&format!("GP No: *{}*\n", row.gate_pass_no));
        message.push_str(&format!("Item: {}\n", row.item_name));
        message.push_str(&format!("Requester: {}\n", row.requester_name));
        message.push_str(&format!("Department: {}\n", row.department));
        message.push_str(&format!("Due Date: *{}*\n", row.due_date));
        message.push_str("--------------------\n\n");
    }
    message
}
