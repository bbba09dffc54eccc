//! Operator-editable configuration held by the registry.

mod console;
mod kyc;

pub use console::{AuthMethod, ConsoleSettings, SecuritySettings};
pub use kyc::{label_for, KycField, KycFieldKind, KycSettings, KycToggle};
