//! Crate entrypoint wiring together configuration, zone building, transport
//! and convergence.

pub mod config;
pub mod converge;
pub mod deploy;
pub mod error;
pub mod merge;
pub mod records;
pub mod remote;
pub mod transport;
pub mod validation;
pub mod zone;

pub use config::CorednsConfig;
pub use converge::{ConvergeReport, Converger, Outcome};
pub use error::ConvergeError;
pub use transport::{FilePerms, Transport};
pub use zone::{CanonicalState, Zone, ZoneAttributes};
