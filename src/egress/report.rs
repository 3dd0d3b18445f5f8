//! Report line rendering

use super::ProbeError;

/// Printed before every result
pub const REPORT_PREFIX: &str = "Tor IP changed to: ";

/// Printed before the failure text when the check fails
pub const ERROR_PREFIX: &str = "Error fetching IP via Privoxy: ";

/// The value half of a report: the address, or the error message
pub fn report_value(result: &Result<String, ProbeError>) -> String {
    match result {
        Ok(ip) => ip.clone(),
        Err(e) => format!("{}{}", ERROR_PREFIX, e),
    }
}

/// Full output line for one iteration, without trailing newline
pub fn report_line(result: &Result<String, ProbeError>) -> String {
    format!("{}{}", REPORT_PREFIX, report_value(result))
}
