//! Package artifacts.
//!
//! - [`package`] - fpm invocation and working tree summary
//! - [`checksum`] - `sha256sum`-style checksum files

pub mod checksum;
pub mod package;

pub use checksum::write_checksum;
pub use package::{build_package, PackageRequest, PACKAGE_FORMAT};
