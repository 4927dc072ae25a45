//! Package manifest loading and validation.
//!
//! A manifest is a JSON object with ten required fields. Loading only checks
//! that the file parses; [`validate`] turns the untyped object into a
//! [`Manifest`], naming the first field that is missing or mistyped.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::Failure;

/// Scalar fields, in the order they are checked.
const STRING_FIELDS: &[&str] = &[
    "name",
    "maintainer",
    "vendor",
    "url",
    "user",
    "install_directory",
];

/// Fields that must be JSON arrays.
const SEQUENCE_FIELDS: &[&str] = &[
    "install_deps",
    "build_deps",
    "configuration_files",
    "instructions",
];

/// Validated package manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub name: String,
    pub maintainer: String,
    pub vendor: String,
    pub url: String,
    /// Service account that owns the installed application.
    pub user: String,
    /// Base install root; the app lives at `<install_directory>/<name>`.
    pub install_directory: PathBuf,
    pub install_deps: Vec<String>,
    pub build_deps: Vec<String>,
    /// Tree-relative paths that are linked out to the shared layout.
    pub configuration_files: Vec<PathBuf>,
    pub instructions: Vec<String>,
}

impl Manifest {
    /// `<install_directory>/<name>`
    pub fn app_root(&self) -> PathBuf {
        self.install_directory.join(&self.name)
    }

    /// `<install_directory>/<name>/shared`
    pub fn shared_root(&self) -> PathBuf {
        self.app_root().join("shared")
    }

    /// `<install_directory>/<name>/releases/<release>`
    pub fn release_dir(&self, release: &str) -> PathBuf {
        self.app_root().join("releases").join(release)
    }
}

/// Read and parse a manifest file.
///
/// Unreadable or non-JSON content is a usage error.
pub fn load_manifest(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).map_err(|err| {
        Failure::Usage(format!(
            "failed to read manifest '{}': {err}",
            path.display()
        ))
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|err| {
        Failure::Usage(format!("invalid manifest '{}': {err}", path.display()))
    })?;
    Ok(value)
}

/// Check a loaded manifest against the required-field schema.
pub fn validate(data: &Value) -> Result<Manifest> {
    let object = data.as_object().ok_or_else(|| {
        Failure::Usage("manifest must be a JSON object".to_string())
    })?;

    // Presence of every field is checked before any type checks.
    for key in STRING_FIELDS.iter().chain(SEQUENCE_FIELDS) {
        if !object.contains_key(*key) {
            return Err(Failure::validation(*key, "missing parameter").into());
        }
    }
    for key in SEQUENCE_FIELDS {
        if !object[*key].is_array() {
            return Err(Failure::validation(*key, "expected a list").into());
        }
    }

    let name = string_field(object, "name")?;
    let user = string_field(object, "user")?;
    check_identifier("name", &name)?;
    check_identifier("user", &user)?;

    let install_directory = PathBuf::from(string_field(object, "install_directory")?);
    if !install_directory.is_absolute() {
        return Err(Failure::validation(
            "install_directory",
            format!("must be absolute, got '{}'", install_directory.display()),
        )
        .into());
    }

    let configuration_files = string_list(object, "configuration_files")?
        .into_iter()
        .map(|raw| relative_path(&raw))
        .collect::<Result<Vec<_>>>()?;

    Ok(Manifest {
        name,
        maintainer: string_field(object, "maintainer")?,
        vendor: string_field(object, "vendor")?,
        url: string_field(object, "url")?,
        user,
        install_directory,
        install_deps: package_list(object, "install_deps")?,
        build_deps: package_list(object, "build_deps")?,
        configuration_files,
        instructions: string_list(object, "instructions")?,
    })
}

/// Load and validate in one step.
pub fn read_manifest(path: &Path) -> Result<Manifest> {
    let data = load_manifest(path)?;
    validate(&data).with_context(|| format!("validating manifest '{}'", path.display()))
}

fn string_field(object: &Map<String, Value>, key: &str) -> Result<String> {
    match &object[key] {
        Value::String(value) => Ok(value.clone()),
        other => Err(Failure::validation(key, format!("expected a string, got {other}")).into()),
    }
}

fn string_list(object: &Map<String, Value>, key: &str) -> Result<Vec<String>> {
    let Value::Array(items) = &object[key] else {
        return Err(Failure::validation(key, "expected a list").into());
    };
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::String(value) => Ok(value.clone()),
            other => Err(Failure::validation(
                key,
                format!("entry {idx} must be a string, got {other}"),
            )
            .into()),
        })
        .collect()
}

/// Package names go to apt and fpm as single arguments.
fn package_list(object: &Map<String, Value>, key: &str) -> Result<Vec<String>> {
    let packages = string_list(object, key)?;
    for (idx, package) in packages.iter().enumerate() {
        if package.is_empty() || package.chars().any(char::is_whitespace) {
            return Err(Failure::validation(
                key,
                format!("entry {idx} '{package}' is not a package name"),
            )
            .into());
        }
    }
    Ok(packages)
}

fn check_identifier(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Failure::validation(field, "must not be empty").into());
    }
    if value.contains('/')
        || value.chars().any(char::is_whitespace)
        || value == "."
        || value == ".."
    {
        return Err(Failure::validation(
            field,
            format!("'{value}' must not contain '/' or whitespace"),
        )
        .into());
    }
    Ok(())
}

fn relative_path(raw: &str) -> Result<PathBuf> {
    let candidate = Path::new(raw);
    if raw.is_empty() || candidate.is_absolute() {
        return Err(Failure::validation(
            "configuration_files",
            format!("must be a relative path, got '{raw}'"),
        )
        .into());
    }
    // `Path::components` folds away `.` and empty segments, so check the raw text.
    if raw.split('/').any(|segment| segment.is_empty() || segment == ".") {
        return Err(Failure::validation(
            "configuration_files",
            format!("'{raw}' must name a file inside the tree"),
        )
        .into());
    }
    for component in candidate.components() {
        if matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        ) {
            return Err(Failure::validation(
                "configuration_files",
                format!("contains invalid traversal/root component in '{raw}'"),
            )
            .into());
        }
    }
    if !candidate
        .components()
        .any(|component| matches!(component, Component::Normal(_)))
    {
        return Err(Failure::validation(
            "configuration_files",
            format!("'{raw}' must name a file inside the tree"),
        )
        .into());
    }
    Ok(candidate.to_path_buf())
}
