//! Built-in default `env_delete` / `env_check` / `env_keep` lists, ported
//! from the C original's `initial_badenv_table`, `initial_checkenv_table`,
//! and `initial_keepenv_table`.

use crate::collab::PolicyStore;

/// Shell loader/runtime knobs, dynamic linker controls, language runtime
/// hooks, resolver/i18n paths, terminfo/termcap overrides, and bash
/// function disguises.
///
/// `PERLIO_DEBUG` has no trailing space here. The C source's table entry
/// is literally `"PERLIO_DEBUG "` (with a trailing space) and, lacking a
/// `*` suffix, could never match a real variable name; this ships the
/// corrected form instead of carrying the typo forward.
pub static BUILTIN_ENV_DELETE: &[&str] = &[
    "IFS",
    "CDPATH",
    "LOCALDOMAIN",
    "RES_OPTIONS",
    "HOSTALIASES",
    "NLSPATH",
    "PATH_LOCALE",
    "LD_*",
    "_RLD*",
    "SHLIB_PATH",   // HP-UX
    "LDR_*",        // AIX
    "LIBPATH",      // AIX
    "AUTHSTATE",    // AIX
    "DYLD_*",       // macOS
    "KRB5_CONFIG*", // Kerberos
    "KRB5_KTNAME",  // Kerberos
    "VAR_ACE",      // SecurID
    "USR_ACE",      // SecurID
    "DLC_ACE",      // SecurID
    "TERMINFO",
    "TERMINFO_DIRS",
    "TERMPATH",
    "TERMCAP",
    "ENV",
    "BASH_ENV",
    "PS4",
    "GLOBIGNORE",
    "BASHOPTS",
    "SHELLOPTS",
    "JAVA_TOOL_OPTIONS",
    "PERLIO_DEBUG",
    "PERLLIB",
    "PERL5LIB",
    "PERL5OPT",
    "PERL5DB",
    "FPATH",
    "NULLCMD",
    "READNULLCMD",
    "ZDOTDIR",
    "TMPPREFIX",
    "PYTHONHOME",
    "PYTHONPATH",
    "PYTHONINSPECT",
    "PYTHONUSERBASE",
    "RUBYLIB",
    "RUBYOPT",
    "BASH_FUNC_*",
    "__BASH_FUNC<*",
];

/// Locale and terminal variables whose values must be free of `/` and
/// `%` (or, for `TZ`, pass [`crate::policy::tz_is_sane`]).
pub static BUILTIN_ENV_CHECK: &[&str] = &["COLORTERM", "LANG", "LANGUAGE", "LC_*", "LINGUAS", "TERM", "TZ"];

/// Display/session variables that are safe to preserve unconditionally.
pub static BUILTIN_ENV_KEEP: &[&str] = &[
    "COLORS",
    "DISPLAY",
    "HOSTNAME",
    "KRB5CCNAME",
    "LS_COLORS",
    "PATH",
    "PS1",
    "PS2",
    "XAUTHORITY",
    "XAUTHORIZATION",
];

fn owned(list: &[&'static str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// A plain-data [`PolicyStore`] good enough for tests and simple
/// embedders that don't need a full sudoers parser.
#[derive(Clone, Debug)]
pub struct StaticPolicy {
    pub delete: Vec<String>,
    pub check: Vec<String>,
    pub keep: Vec<String>,
    pub env_reset: bool,
    pub set_logname: bool,
    pub always_set_home: bool,
    pub set_home: bool,
    pub secure_path: Option<String>,
}

impl Default for StaticPolicy {
    fn default() -> Self {
        Self {
            delete: owned(BUILTIN_ENV_DELETE),
            check: owned(BUILTIN_ENV_CHECK),
            keep: owned(BUILTIN_ENV_KEEP),
            env_reset: true,
            set_logname: true,
            always_set_home: false,
            set_home: false,
            secure_path: None,
        }
    }
}

impl PolicyStore for StaticPolicy {
    fn env_delete(&self) -> &[String] {
        &self.delete
    }

    fn env_check(&self) -> &[String] {
        &self.check
    }

    fn env_keep(&self) -> &[String] {
        &self.keep
    }

    fn env_reset(&self) -> bool {
        self.env_reset
    }

    fn set_logname(&self) -> bool {
        self.set_logname
    }

    fn always_set_home(&self) -> bool {
        self.always_set_home
    }

    fn set_home(&self) -> bool {
        self.set_home
    }

    fn secure_path(&self) -> Option<&str> {
        self.secure_path.as_deref()
    }
}
