pub mod account_manager;
pub mod add_field;
pub mod composite;
pub mod dummy;
pub mod field_filter;
pub mod monthly_budget;
pub mod running_total;

/// Parses a numeric report cell. Accepts thousands separators and a trailing
/// percent sign (`"1,234.5"`, `"12.5%"`); anything else yields `None`.
pub fn parse_number(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .trim()
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Formats a number the way report cells carry it: integers without a
/// fraction, everything else with two decimals.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value:.2}")
    }
}
