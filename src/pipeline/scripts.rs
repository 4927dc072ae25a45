//! Post-install lifecycle script.
//!
//! The target's package manager runs the script with one signal argument:
//! `configure` activates the release; `abort-upgrade`, `abort-remove` and
//! `abort-deconfigure` are acknowledged and do nothing.
//!
//! Values come from the manifest and end up as shell text run as root on
//! the target, so every slot is shell-quoted and the template is expanded in
//! a single pass (a value can never introduce another slot).

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::executor::files::handle_writefilemode;
use crate::manifest::Manifest;
use crate::release::ReleaseId;

pub const POSTINST_FILENAME: &str = "postinst.sh";

/// Owner rwx, group/other read.
pub const POSTINST_MODE: u32 = 0o744;

const POSTINST_TEMPLATE: &str = r#"#!/bin/bash
set -e

service_user={{user}}
service_home={{service_home}}
app_root={{app_root}}
release_dir={{release_dir}}
restart_file={{restart_file}}

case "$1" in
configure)
  if ! id "${service_user}" > /dev/null 2>&1 ; then
    adduser --system --group --no-create-home \
      --home "${service_home}" --shell /bin/bash \
      --disabled-password \
      "${service_user}"
  fi

  ln -sfn "${release_dir}" "${app_root}/current.new"
  mv -Tf "${app_root}/current.new" "${app_root}/current"
  chown -R "${service_user}:${service_user}" "${service_home}"

  su -s /bin/sh -c 'touch -- "$0"' "${service_user}" "${restart_file}"
  ;;
abort-upgrade|abort-remove|abort-deconfigure)
  ;;
esac
"#;

/// Values substituted into the post-install template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleScript {
    pub user: String,
    /// Home of the service account; ownership is handed over recursively.
    pub service_home: PathBuf,
    /// `<install_directory>/<name>`, parent of `current` and `releases/`.
    pub app_root: PathBuf,
    pub release_dir: PathBuf,
}

impl LifecycleScript {
    pub fn new(manifest: &Manifest, release: &ReleaseId) -> Self {
        Self {
            user: manifest.user.clone(),
            service_home: manifest.install_directory.clone(),
            app_root: manifest.app_root(),
            release_dir: manifest.release_dir(release.as_str()),
        }
    }

    fn slot(&self, name: &str) -> Option<String> {
        let value = match name {
            "user" => self.user.clone(),
            "service_home" => path_text(&self.service_home),
            "app_root" => path_text(&self.app_root),
            "release_dir" => format!("{}/", path_text(&self.release_dir)),
            "restart_file" => path_text(&self.release_dir.join("tmp/restart.txt")),
            _ => return None,
        };
        Some(shell_quote(&value))
    }

    pub fn render(&self) -> Result<String> {
        render_template(POSTINST_TEMPLATE, |name| self.slot(name))
    }

    /// Render into `scripts_dir` and mark executable.
    pub fn write(&self, scripts_dir: &Path) -> Result<PathBuf> {
        let path = scripts_dir.join(POSTINST_FILENAME);
        let script = self.render()?;
        handle_writefilemode(&path, &script, POSTINST_MODE)
            .with_context(|| format!("writing lifecycle script '{}'", path.display()))?;
        info!(stage = "scripts", path = %path.display(), "wrote post-install script");
        Ok(path)
    }
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Expand `{{name}}` slots in one left-to-right pass.
fn render_template<F>(template: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| anyhow!("unterminated template slot"))?;
        let name = &after[..end];
        let value = lookup(name).ok_or_else(|| anyhow!("unknown template slot '{name}'"))?;
        out.push_str(&value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Quote `value` as a single shell word.
pub fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=+,".contains(c));
    if plain {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::process::Command;
    use tempfile::TempDir;

    fn script() -> LifecycleScript {
        LifecycleScript {
            user: "deploy".to_string(),
            service_home: PathBuf::from("/srv/apps"),
            app_root: PathBuf::from("/srv/apps/myapp"),
            release_dir: PathBuf::from("/srv/apps/myapp/releases/20240101000000"),
        }
    }

    #[test]
    fn test_new_from_manifest() {
        let manifest = crate::manifest::validate(&crate::manifest::tests::sample()).unwrap();
        let release = ReleaseId::parse("20240101000000").unwrap();

        assert_eq!(LifecycleScript::new(&manifest, &release), script());
    }

    #[test]
    fn test_render_configure_branch() {
        let rendered = script().render().unwrap();

        assert!(rendered.starts_with("#!/bin/bash\nset -e\n"));
        assert!(rendered.contains("\nconfigure)\n"));
        assert!(rendered.contains("service_user=deploy\n"));
        assert!(rendered.contains("if ! id \"${service_user}\" > /dev/null 2>&1 ; then"));
        assert!(rendered.contains("release_dir=/srv/apps/myapp/releases/20240101000000/\n"));
        assert!(rendered.contains("mv -Tf \"${app_root}/current.new\" \"${app_root}/current\""));
        assert!(rendered
            .contains("restart_file=/srv/apps/myapp/releases/20240101000000/tmp/restart.txt\n"));
        assert!(rendered.contains("abort-upgrade|abort-remove|abort-deconfigure)\n  ;;"));
        assert!(!rendered.contains("{{"));
    }

    #[test]
    fn test_write_sets_executable_mode() {
        let temp = TempDir::new().unwrap();
        let scripts_dir = temp.path().join("scripts");

        let path = script().write(&scripts_dir).unwrap();

        assert_eq!(path, scripts_dir.join(POSTINST_FILENAME));
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o744);
        assert_ne!(mode & 0o100, 0, "owner execute bit must be set");
    }

    #[test]
    fn test_rendered_script_is_valid_shell() {
        let temp = TempDir::new().unwrap();
        let path = script().write(temp.path()).unwrap();

        let status = Command::new("sh").arg("-n").arg(&path).status().unwrap();
        assert!(status.success());
    }

    #[test]
    fn test_abort_signals_are_noops() {
        let temp = TempDir::new().unwrap();
        let path = script().write(temp.path()).unwrap();

        for signal in ["abort-upgrade", "abort-remove", "abort-deconfigure"] {
            let output = Command::new("sh").arg(&path).arg(signal).output().unwrap();
            assert!(output.status.success(), "{signal} should exit 0");
            assert!(output.stdout.is_empty());
        }
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/srv/apps"), "/srv/apps");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$(reboot)"), "'$(reboot)'");
    }

    #[test]
    fn test_hostile_values_survive_as_literals() {
        let hostile = "/srv/x'; touch pwned; echo '$(id)`id`";
        let assignment = format!("value={}\nprintf %s \"$value\"", shell_quote(hostile));

        let output = Command::new("sh").arg("-c").arg(&assignment).output().unwrap();

        assert_eq!(String::from_utf8_lossy(&output.stdout), hostile);
    }

    #[test]
    fn test_values_cannot_introduce_slots() {
        let mut hostile = script();
        hostile.user = "{{app_root}}".to_string();

        let rendered = hostile.render().unwrap();

        assert!(rendered.contains("service_user='{{app_root}}'\n"));
    }

    #[test]
    fn test_render_template_unknown_slot() {
        assert!(render_template("x={{nope}}", |_| None).is_err());
        assert!(render_template("x={{open", |_| Some(String::new())).is_err());
    }
}
