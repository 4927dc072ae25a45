//! Build native packages for applications deployed in the
//! `shared/releases/current` layout.
//!
//! A JSON manifest names the application, its owner, its build and runtime
//! dependencies, the shell instructions that produce its files, and which
//! files are operator-managed. The pipeline turns it into one versioned
//! `.deb`:
//!
//! - **Manifest** - required-field validation ([`manifest`])
//! - **Preflight** - runtime detection and build host provisioning ([`preflight`])
//! - **Executor** - build instructions inside a scratch working tree ([`executor`])
//! - **Layout** - symlinks from the tree into the shared directory ([`layout`])
//! - **Pipeline** - lifecycle script, dependency set and orchestration ([`pipeline`])
//! - **Artifact** - fpm invocation and checksum ([`artifact`])
//!
//! # Installed layout
//!
//! ```text
//! <install_directory>/<name>/
//!     ├── current -> releases/<release>/
//!     ├── releases/<release>/      (package contents)
//!     │     ├── log -> shared/log/
//!     │     ├── tmp/pids -> shared/pids/
//!     │     └── public/system -> shared/system/
//!     └── shared/                  (survives across releases)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use minecart::{read_manifest, run_pipeline, BuildOptions, HostRunner, ReleaseId, Settings};
//!
//! let manifest = read_manifest(Path::new("app.json"))?;
//! let release = ReleaseId::now()?;
//! let mut runner = HostRunner::create(Path::new(&release.log_file_name()))?;
//! let outcome = run_pipeline(
//!     &mut runner,
//!     &Settings::default(),
//!     &manifest,
//!     &release,
//!     &BuildOptions::default(),
//! )?;
//! ```

pub mod artifact;
pub mod error;
pub mod executor;
pub mod layout;
pub mod manifest;
pub mod pipeline;
pub mod preflight;
pub mod process;
pub mod release;
pub mod settings;

pub use error::{classify, Failure};
pub use manifest::{read_manifest, Manifest};
pub use pipeline::{run_pipeline, BuildOptions, BuildOutcome};
pub use process::{Cmd, HostRunner, Runner};
pub use release::ReleaseId;
pub use settings::Settings;
