// Fake clangd binaries for probe tests

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// A shell script standing in for clangd.
///
/// Every invocation appends its arguments to a log file so tests can count
/// how often the binary was spawned.
pub struct FakeClangd {
    _temp_dir: TempDir,
    pub path: PathBuf,
    log_path: PathBuf,
}

impl FakeClangd {
    /// clangd whose `--help` lists `--code-lens`
    pub fn supporting() -> anyhow::Result<Self> {
        Self::with_help("  --code-lens                  - Enable code lens\n  --background-index\n")
    }

    /// clangd from before `--code-lens` existed
    pub fn legacy() -> anyhow::Result<Self> {
        Self::with_help("  --background-index\n  --clang-tidy\n")
    }

    /// clangd that never finishes printing its help
    pub fn hanging() -> anyhow::Result<Self> {
        Self::with_body("exec sleep 30\n")
    }

    fn with_help(help: &str) -> anyhow::Result<Self> {
        Self::with_body(&format!(
            "cat <<'HELP'\nOVERVIEW: clangd LSP server\n\nOPTIONS:\n{}HELP\n",
            help
        ))
    }

    fn with_body(body: &str) -> anyhow::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("clangd");
        let log_path = temp_dir.path().join("invocations.log");

        let script = format!(
            "#!/bin/sh\necho \"$@\" >> '{}'\n{}",
            log_path.display(),
            body
        );
        fs::write(&path, script)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        }

        Ok(Self {
            _temp_dir: temp_dir,
            path,
            log_path,
        })
    }

    pub fn path_string(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Number of times the script ran
    pub fn invocations(&self) -> usize {
        fs::read_to_string(&self.log_path)
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }
}
