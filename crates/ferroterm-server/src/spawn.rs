//! Child process spawning on a new PTY.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::PathBuf;

use portable_pty::{Child, CommandBuilder, MasterPty, PtySize};

use crate::error::{ServerError, portable_pty_error};

/// Exit code reported to a client whose child could not be spawned.
pub const SPAWN_FAILED_EXIT_CODE: i32 = -27;

const FALLBACK_SHELL: &str = "/bin/sh";

/// What to run and how.
#[derive(Debug, Clone)]
pub struct ChildSpec {
    /// Command line; empty means the user's shell.
    pub argv: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// `TERM` for the child.
    pub term: String,
    pub terminfo_dir: Option<String>,
    pub cols: u16,
    pub rows: u16,
}

impl ChildSpec {
    #[must_use]
    pub fn new(argv: Vec<String>, term: impl Into<String>) -> Self {
        Self {
            argv,
            cwd: None,
            term: term.into(),
            terminfo_dir: None,
            cols: 80,
            rows: 24,
        }
    }

    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    #[must_use]
    pub fn with_terminfo_dir(mut self, dir: Option<String>) -> Self {
        self.terminfo_dir = dir;
        self
    }

    #[must_use]
    pub fn with_size(mut self, cols: u16, rows: u16) -> Self {
        self.cols = cols.max(1);
        self.rows = rows.max(1);
        self
    }
}

/// The command line to execute: `argv`, else `$SHELL`, else `/bin/sh`.
#[must_use]
pub fn resolve_command(argv: &[String], shell: Option<String>) -> Vec<String> {
    if !argv.is_empty() {
        return argv.to_vec();
    }
    let shell = shell
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_SHELL.to_owned());
    vec![shell]
}

/// The child's environment, derived from `base`.
///
/// Sets `TERM`, `COLORTERM` and `PWD` (and `TERMINFO` when configured) and
/// drops every `TERM_PROGRAM*` variable.
#[must_use]
pub fn child_env<I>(base: I, spec: &ChildSpec) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut env: BTreeMap<String, String> = base
        .into_iter()
        .filter(|(key, _)| !key.starts_with("TERM_PROGRAM"))
        .collect();
    env.insert("TERM".into(), spec.term.clone());
    env.insert("COLORTERM".into(), "truecolor".into());
    if let Some(cwd) = &spec.cwd {
        env.insert("PWD".into(), cwd.to_string_lossy().into_owned());
    }
    if let Some(dir) = &spec.terminfo_dir {
        env.insert("TERMINFO".into(), dir.clone());
    }
    env
}

/// A running child and the master side of its PTY.
pub struct PtyChild {
    pub master: Box<dyn MasterPty + Send>,
    pub child: Box<dyn Child + Send + Sync>,
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
}

impl std::fmt::Debug for PtyChild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyChild")
            .field("child_pid", &self.child.process_id())
            .finish_non_exhaustive()
    }
}

/// Spawn `spec` on a new PTY with the environment derived from `base_env`.
pub fn spawn_child<I>(spec: &ChildSpec, base_env: I) -> Result<PtyChild, ServerError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let env = child_env(base_env, spec);
    let argv = resolve_command(&spec.argv, env.get("SHELL").cloned());

    let mut cmd = CommandBuilder::from_argv(argv.iter().map(OsString::from).collect());
    cmd.env_clear();
    for (key, value) in &env {
        cmd.env(key, value);
    }
    if let Some(cwd) = &spec.cwd {
        cmd.cwd(cwd);
    }

    let pair = portable_pty::native_pty_system()
        .openpty(PtySize {
            rows: spec.rows,
            cols: spec.cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|err| ServerError::Spawn(err.to_string()))?;

    let child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|err| ServerError::Spawn(format!("{}: {err}", argv.join(" "))))?;
    // The child holds its own slave descriptor; ours would keep the master
    // from seeing EOF.
    drop(pair.slave);

    let reader = pair.master.try_clone_reader().map_err(portable_pty_error)?;
    let writer = pair.master.take_writer().map_err(portable_pty_error)?;
    tracing::info!(argv = ?argv, pid = ?child.process_id(), "spawned child");

    Ok(PtyChild {
        master: pair.master,
        child,
        reader,
        writer,
    })
}

/// Convert a child's exit status into the code sent to the client.
#[must_use]
pub fn exit_code(status: &portable_pty::ExitStatus) -> i32 {
    i32::try_from(status.exit_code()).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ChildSpec {
        ChildSpec::new(Vec::new(), "ferroterm").with_cwd("/srv/work")
    }

    fn base(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    // ── Command resolution ──────────────────────────────────────────

    #[test]
    fn argv_wins() {
        let argv = vec!["htop".to_owned()];
        assert_eq!(resolve_command(&argv, Some("/bin/zsh".into())), argv);
    }

    #[test]
    fn shell_then_bin_sh() {
        assert_eq!(resolve_command(&[], Some("/bin/zsh".into())), ["/bin/zsh"]);
        assert_eq!(resolve_command(&[], Some(String::new())), ["/bin/sh"]);
        assert_eq!(resolve_command(&[], None), ["/bin/sh"]);
    }

    // ── Environment ─────────────────────────────────────────────────

    #[test]
    fn env_sets_term_colorterm_pwd() {
        let env = child_env(base(&[("HOME", "/home/u"), ("TERM", "xterm")]), &spec());
        assert_eq!(env["TERM"], "ferroterm");
        assert_eq!(env["COLORTERM"], "truecolor");
        assert_eq!(env["PWD"], "/srv/work");
        assert_eq!(env["HOME"], "/home/u");
        assert!(!env.contains_key("TERMINFO"));
    }

    #[test]
    fn env_drops_term_program_vars() {
        let env = child_env(
            base(&[("TERM_PROGRAM", "vscode"), ("TERM_PROGRAM_VERSION", "1.0"), ("PATH", "/bin")]),
            &spec(),
        );
        assert!(!env.keys().any(|k| k.starts_with("TERM_PROGRAM")));
        assert_eq!(env["PATH"], "/bin");
    }

    #[test]
    fn env_sets_terminfo_when_configured() {
        let spec = spec().with_terminfo_dir(Some("/usr/share/ferroterm/terminfo".into()));
        let env = child_env(Vec::new(), &spec);
        assert_eq!(env["TERMINFO"], "/usr/share/ferroterm/terminfo");
    }

    // ── PTY ─────────────────────────────────────────────────────────

    #[cfg(unix)]
    #[test]
    fn spawned_child_sees_environment_and_exit_code() {
        let spec = ChildSpec::new(
            vec!["/bin/sh".into(), "-c".into(), "printf '%s|%s' \"$TERM\" \"$COLORTERM\"; exit 3".into()],
            "ferroterm",
        )
        .with_cwd("/");
        let mut pty = spawn_child(&spec, base(&[("PATH", "/usr/bin:/bin")])).expect("spawn");

        let mut output = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            match pty.reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => output.extend_from_slice(&buf[..n]),
            }
        }
        let status = pty.child.wait().expect("wait");
        assert_eq!(exit_code(&status), 3);
        assert!(String::from_utf8_lossy(&output).contains("ferroterm|truecolor"));
    }
}
