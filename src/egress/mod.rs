//! Egress IP checking
//!
//! Asks an external IP-check service, through the local proxy, which
//! address our traffic currently leaves the Tor network from.

pub mod check;
pub mod report;

pub use check::{IpChecker, ProbeError};
pub use report::{report_line, report_value};

/// Something that can tell us the current exit address
pub trait EgressProbe {
    async fn egress_ip(&self) -> Result<String, ProbeError>;
}

impl EgressProbe for IpChecker {
    async fn egress_ip(&self) -> Result<String, ProbeError> {
        self.check().await
    }
}
