//! Runtime dependency set for the produced package.

use std::collections::BTreeSet;

use crate::preflight::RuntimeVersion;

/// Union of the manifest's `install_deps`, the detected runtime package and
/// any fixed extras, deduplicated.
///
/// The set is sorted so logs and backend command lines are stable.
pub fn resolve_dependencies(
    install_deps: &[String],
    runtime: &RuntimeVersion,
    runtime_package_prefix: &str,
    extra: &[String],
) -> BTreeSet<String> {
    install_deps
        .iter()
        .cloned()
        .chain(std::iter::once(runtime.runtime_package(runtime_package_prefix)))
        .chain(extra.iter().cloned())
        .collect()
}
