//! Tor daemon interaction
//!
//! Handles Tor ControlPort communication. Circuit building itself is
//! treated as a black box: we ask for a new identity and wait.

pub mod control;

pub use control::{AuthMethod, ControlError, ProtocolInfo, Signal, TorController};

/// Something that can switch future traffic onto fresh circuits
pub trait CircuitControl {
    async fn new_identity(&mut self) -> Result<(), ControlError>;
}

impl CircuitControl for TorController {
    async fn new_identity(&mut self) -> Result<(), ControlError> {
        self.signal(Signal::Newnym).await
    }
}
