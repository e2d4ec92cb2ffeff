//! quickmc - Fetch, verify and supervise a PaperMC server
//!
//! The acquisition pipeline ([`artifact`]) resolves a build coordinate against
//! the PaperMC API ([`papermc`]), downloads and checksums the jar, and prepares
//! it for launch. [`supervisor`] runs the server process, [`status`] probes it
//! once it is up and [`health`] serves liveness and metrics over HTTP.
//! [`service`] ties them together for `quickmc run`.

pub mod artifact;
pub mod config;
pub mod error;
pub mod health;
pub mod papermc;
pub mod service;
pub mod status;
pub mod supervisor;
pub mod utils;

pub use artifact::{acquire, BuildCoordinate, CoordinateHints, LocalArtifact};
pub use config::Config;
pub use error::{QuickError, Result};
pub use health::ServiceMetrics;
pub use papermc::{BuildCatalog, PaperClient};
pub use status::StatusSnapshot;
pub use supervisor::{ProcessState, ProcessSupervisor};
