//! Collaborator interfaces: the policy rule store, target/invoker
//! identity, invocation-mode flags, and platform constants the rebuilder
//! consumes. These are narrow traits/structs the rebuilder takes by
//! reference, not owns.

use std::path::PathBuf;

/// Invocation-mode flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Mode {
    pub run: bool,
    pub shell: bool,
    pub login_shell: bool,
    pub reset_home: bool,
}

/// The configured policy rule lists and boolean flags. A real caller
/// backs this with its parsed sudoers settings;
/// `crate::defaults::StaticPolicy` is a plain-data implementation good
/// enough for tests and simple embedders.
pub trait PolicyStore {
    /// Ordered list of name (optionally `*`-suffixed) patterns to delete
    /// outright.
    fn env_delete(&self) -> &[String];
    /// Ordered list of patterns whose values must additionally pass a
    /// `%`/`/` (or TZ-specific) sanity check.
    fn env_check(&self) -> &[String];
    /// Ordered list of patterns to preserve unconditionally (once past
    /// the bash-function guard).
    fn env_keep(&self) -> &[String];

    fn env_reset(&self) -> bool;
    fn set_logname(&self) -> bool;
    fn always_set_home(&self) -> bool;
    fn set_home(&self) -> bool;
    /// `Some(path)` when `secure_path` is configured.
    fn secure_path(&self) -> Option<&str>;
}

/// The invoking user's identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvokerIdentity {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
}

/// The target ("runas") user's identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunasIdentity {
    pub name: String,
    pub home: String,
    pub shell: String,
}

/// Platform constants: standard PATH, mail spool directory, zoneinfo
/// root, and maximum path length. Supplied by the caller at the rebuild
/// call site rather than baked in at compile time, so the same binary
/// can run against different platform layouts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlatformPaths {
    pub standard_path: String,
    /// Mail spool directory, with or without a trailing slash.
    pub mail_dir: String,
    pub zoneinfo_root: String,
    pub path_max: usize,
    /// `/etc/environment`-style file to seed a clean-slate rebuild with,
    /// if any.
    pub seed_env_file: Option<PathBuf>,
}

impl PlatformPaths {
    pub fn mail_path(&self, user: &str) -> String {
        if self.mail_dir.ends_with('/') {
            format!("{}{}", self.mail_dir, user)
        } else {
            format!("{}/{}", self.mail_dir, user)
        }
    }
}

/// The command and arguments being run, used only to format
/// `SUDO_COMMAND`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandLine {
    pub command: String,
    pub arguments: Vec<String>,
}

impl CommandLine {
    /// Format `command` plus `arguments` for `SUDO_COMMAND`, truncating
    /// at 4096 bytes to avoid an execve failure for very long argument
    /// vectors.
    pub fn format(&self) -> String {
        let mut formatted = self.command.clone();
        for arg in &self.arguments {
            if formatted.len() + 1 + arg.len() >= 4096 {
                break;
            }
            formatted.push(' ');
            formatted.push_str(arg);
        }
        formatted
    }
}
