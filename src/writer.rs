//! Persisting resolved `.env` content

use crate::error::{Error, Result};
use crate::security::write_secure_file;
use log::info;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use time::OffsetDateTime;

/// Directory names treated as shared build output
const SHARED_OUTPUT_DIRS: [&str; 3] = ["integration", "build", "dist"];

/// Which command the write happens for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteFlow {
    /// Explicit env generation; any target is allowed
    #[default]
    Generate,
    /// Running an app; shared output directories are refused
    Run,
}

/// Where resolved content goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteTarget {
    Path(PathBuf),
    /// A fresh file in the process temp directory
    Ephemeral,
}

impl From<Option<PathBuf>> for WriteTarget {
    fn from(path: Option<PathBuf>) -> Self {
        path.map_or(WriteTarget::Ephemeral, WriteTarget::Path)
    }
}

/// Writes `.env` files owner-only
#[derive(Debug, Clone)]
pub struct EnvWriter {
    app_name: String,
    flow: WriteFlow,
    temp_dir: PathBuf,
    project_root: Option<PathBuf>,
}

impl EnvWriter {
    pub fn new(app_name: impl Into<String>, flow: WriteFlow) -> Self {
        Self {
            app_name: app_name.into(),
            flow,
            temp_dir: std::env::temp_dir(),
            project_root: None,
        }
    }

    /// Directory used for [`WriteTarget::Ephemeral`]
    #[must_use]
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Directory that shared output names are matched under (default: the
    /// current directory)
    #[must_use]
    pub fn project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    /// Write `content` and return the final path
    ///
    /// # Errors
    ///
    /// Returns `Error::ForbiddenOutputPath` for a shared output directory in
    /// the run flow, or an I/O error if the write fails.
    pub fn write(&self, content: &str, target: &WriteTarget) -> Result<PathBuf> {
        let path = match target {
            WriteTarget::Path(path) => {
                if self.flow == WriteFlow::Run && self.is_forbidden(path) {
                    return Err(Error::ForbiddenOutputPath(path.clone()));
                }
                path.clone()
            }
            WriteTarget::Ephemeral => self.ephemeral_path(),
        };

        write_secure_file(&path, content)?;
        info!("Wrote env file for '{}' to {}", self.app_name, path.display());
        Ok(path)
    }

    fn is_forbidden(&self, path: &Path) -> bool {
        let cwd = std::env::current_dir().unwrap_or_default();
        let root = match &self.project_root {
            Some(root) => cwd.join(root),
            None => cwd.clone(),
        };
        is_shared_output(&cwd.join(path), &root)
    }

    fn ephemeral_path(&self) -> PathBuf {
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        self.temp_dir
            .join(format!("aifabrix-{}-{millis}.env", sanitize(&self.app_name)))
    }
}

fn sanitize(app_name: &str) -> String {
    app_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Whether a directory of `path` below `project_root` names shared build output
///
/// Ancestors of the project root are not considered, and paths outside the
/// project are never shared output.
#[must_use]
pub fn is_shared_output(path: &Path, project_root: &Path) -> bool {
    let Some(relative) = path.parent().and_then(|p| p.strip_prefix(project_root).ok()) else {
        return false;
    };
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name),
            _ => None,
        })
        .filter_map(OsStr::to_str)
        .any(|name| {
            SHARED_OUTPUT_DIRS
                .iter()
                .any(|shared| name.eq_ignore_ascii_case(shared))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_write_to_target_with_parents() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("apps/web/.env");

        let path = EnvWriter::new("web", WriteFlow::Generate)
            .write("PORT=3000\n", &WriteTarget::Path(target.clone()))
            .unwrap();

        assert_eq!(path, target);
        assert_eq!(fs::read_to_string(&path).unwrap(), "PORT=3000\n");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let file_mode = fs::metadata(&path).unwrap().permissions().mode();
            let dir_mode = fs::metadata(path.parent().unwrap())
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(file_mode & 0o777, 0o600);
            assert_eq!(dir_mode & 0o777, 0o700);
        }
    }

    #[test]
    fn test_ephemeral_path_named_after_app() {
        let dir = tempdir().unwrap();
        let path = EnvWriter::new("my app", WriteFlow::Run)
            .temp_dir(dir.path())
            .write("A=1\n", &WriteTarget::Ephemeral)
            .unwrap();

        assert_eq!(path.parent(), Some(dir.path()));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("aifabrix-my_app-"));
        assert!(name.ends_with(".env"));
    }

    #[test]
    fn test_run_flow_refuses_shared_output() {
        let dir = tempdir().unwrap();
        for sub in ["integration/app/.env", "build/.env", "x/Dist/.env"] {
            let target = WriteTarget::Path(dir.path().join(sub));
            let result = EnvWriter::new("app", WriteFlow::Run)
                .project_root(dir.path())
                .write("A=1", &target);
            assert!(matches!(result, Err(Error::ForbiddenOutputPath(_))), "{sub}");
            assert!(!dir.path().join(sub).exists());
        }
    }

    #[test]
    fn test_generate_flow_allows_any_target() {
        let dir = tempdir().unwrap();
        let target = WriteTarget::Path(dir.path().join("build/.env"));
        let writer = EnvWriter::new("app", WriteFlow::Generate).project_root(dir.path());
        assert!(writer.write("A=1", &target).is_ok());
    }

    #[test]
    fn test_run_flow_ephemeral_under_build_temp_dir() {
        let dir = tempdir().unwrap();
        let temp = dir.path().join("build/tmp");

        let path = EnvWriter::new("app", WriteFlow::Run)
            .temp_dir(&temp)
            .project_root(dir.path())
            .write("A=1\n", &WriteTarget::Ephemeral)
            .unwrap();

        assert!(path.starts_with(&temp));
        assert_eq!(fs::read_to_string(&path).unwrap(), "A=1\n");
    }

    #[test]
    fn test_run_flow_project_inside_build_ancestor() {
        let dir = tempdir().unwrap();
        let project = dir.path().join("build/myrepo");

        let allowed = EnvWriter::new("app", WriteFlow::Run)
            .project_root(&project)
            .write("A=1", &WriteTarget::Path(project.join("app/.env")));
        assert!(allowed.is_ok());

        let refused = EnvWriter::new("app", WriteFlow::Run)
            .project_root(&project)
            .write("A=1", &WriteTarget::Path(project.join("dist/.env")));
        assert!(matches!(refused, Err(Error::ForbiddenOutputPath(_))));
    }

    #[test]
    fn test_shared_output_matched_below_root_only() {
        let root = Path::new("/work");
        assert!(!is_shared_output(Path::new("/work/builder/app/.env"), root));
        assert!(is_shared_output(Path::new("/work/dist/.env"), root));
        // The file name itself is not a directory
        assert!(!is_shared_output(Path::new("/work/app/build"), root));
        assert!(!is_shared_output(
            Path::new("/build/project/app/.env"),
            Path::new("/build/project")
        ));
        assert!(!is_shared_output(Path::new("/elsewhere/dist/.env"), root));
    }
}
