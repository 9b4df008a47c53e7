//! Whole-environment transformation driven by mode and policy, plus the
//! `validate_env_vars` surface used to check user-supplied overrides.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;

use crate::collab::{CommandLine, InvokerIdentity, Mode, PlatformPaths, PolicyStore, RunasIdentity};
use crate::didset::{Canonical, DidMask};
use crate::envfile;
use crate::error::EnvError;
use crate::policy::PolicyMatcher;
use crate::table::EnvTable;

const SUDO_PS1_PREFIX: &[u8] = b"SUDO_PS1=";

/// Everything the rebuilder needs beyond the previous [`EnvTable`] itself,
/// grouped so `rebuild_env` doesn't take eight positional parameters.
pub struct RebuildParams<'a> {
    pub mode: Mode,
    pub policy: &'a dyn PolicyStore,
    pub invoker: &'a InvokerIdentity,
    pub runas: &'a RunasIdentity,
    pub platform: &'a PlatformPaths,
    pub command: &'a CommandLine,
    /// Whether the invoking user is exempt from `secure_path` enforcement.
    pub user_is_exempt: bool,
}

/// If `entry` is `SUDO_PS1=<value>`, return the `PS1=<value>` entry to
/// defer-insert later. The C original's `*ep + 5` offset against a
/// `SUDO_PS1=` prefix check is preserved here with the correct 9-byte
/// prefix length.
fn parse_deferred_ps1(entry: &OsStr) -> Option<OsString> {
    let bytes = entry.as_bytes();
    if bytes.starts_with(SUDO_PS1_PREFIX) {
        Some(OsString::from(OsStr::from_bytes(&bytes[5..])))
    } else {
        None
    }
}

fn set_overwrite(table: &mut EnvTable, name: &str, value: &str) -> Result<(), EnvError> {
    table.set(OsStr::new(name), OsStr::new(value), true, true)
}

fn set_if_absent(table: &mut EnvTable, name: &str, value: &str) -> Result<(), EnvError> {
    table.set(OsStr::new(name), OsStr::new(value), true, false)
}

/// Build a fresh [`EnvTable`] from `old` plus `params`. `old` is left
/// untouched; the caller is responsible for moving it into
/// [`crate::table::EnvState`]'s `old` slot.
pub fn rebuild_env(old: &EnvTable, params: &RebuildParams<'_>) -> Result<EnvTable, EnvError> {
    let RebuildParams {
        mode,
        policy,
        invoker,
        runas,
        platform,
        command,
        user_is_exempt,
    } = *params;

    let matcher = PolicyMatcher::new(mode, platform);
    let mut fresh = EnvTable::new();
    let mut did = DidMask::new();
    let mut deferred_ps1: Option<OsString> = None;

    let mut reset_home =
        mode.run && (policy.always_set_home() || mode.reset_home || mode.login_shell || (mode.shell && policy.set_home()));

    if policy.env_reset() || mode.login_shell {
        // Branch A: clean slate.
        if !mode.login_shell {
            if let Some(seed_path) = platform.seed_env_file.as_deref() {
                envfile::read_env_file(seed_path, true, &mut fresh)?;
            }
            for entry in fresh.iter() {
                if let Some(var) = Canonical::of_entry(entry) {
                    did.mark_seen(var);
                }
            }
        }

        for entry in old.iter() {
            if deferred_ps1.is_none() {
                deferred_ps1 = parse_deferred_ps1(entry);
            }
            if matcher.should_keep(entry, policy) {
                fresh.put(entry.to_owned(), true, false)?;
                if let Some(var) = Canonical::of_entry(entry) {
                    did.mark_seen(var);
                }
            }
        }

        did.promote();

        if mode.login_shell {
            set_overwrite(&mut fresh, "SHELL", &runas.shell)?;
            set_overwrite(&mut fresh, "LOGNAME", &runas.name)?;
            set_overwrite(&mut fresh, "USER", &runas.name)?;
            set_overwrite(&mut fresh, "USERNAME", &runas.name)?;
        } else if !policy.set_logname() {
            if !did.kept(Canonical::Logname) {
                set_if_absent(&mut fresh, "LOGNAME", &invoker.name)?;
            }
            if !did.kept(Canonical::User) {
                set_if_absent(&mut fresh, "USER", &invoker.name)?;
            }
            if !did.kept(Canonical::Username) {
                set_if_absent(&mut fresh, "USERNAME", &invoker.name)?;
            }
        }

        if !did.kept(Canonical::Home) {
            reset_home = true;
        }

        if mode.login_shell || !did.kept(Canonical::Mail) {
            set_overwrite(&mut fresh, "MAIL", &platform.mail_path(&runas.name))?;
        }
    } else {
        // Branch B: filter only.
        for entry in old.iter() {
            if deferred_ps1.is_none() {
                deferred_ps1 = parse_deferred_ps1(entry);
            }
            if matcher.should_delete(entry, policy) {
                continue;
            }
            fresh.put(entry.to_owned(), true, false)?;
            match Canonical::of_entry(entry) {
                Some(var @ (Canonical::Shell | Canonical::Path | Canonical::Term)) => {
                    did.mark_kept_directly(var);
                }
                _ => {}
            }
        }
    }

    if policy.secure_path().is_some() && !user_is_exempt {
        if let Some(secure_path) = policy.secure_path() {
            set_overwrite(&mut fresh, "PATH", secure_path)?;
            did.mark_kept_directly(Canonical::Path);
        }
    }

    if policy.set_logname() && !mode.login_shell {
        let names = [Canonical::Logname, Canonical::User, Canonical::Username];
        if !did.any_kept(&names) {
            set_overwrite(&mut fresh, "LOGNAME", &runas.name)?;
            set_overwrite(&mut fresh, "USER", &runas.name)?;
            set_overwrite(&mut fresh, "USERNAME", &runas.name)?;
        } else if !did.all_kept(&names) {
            let canonical_value = [
                (Canonical::Logname, "LOGNAME"),
                (Canonical::User, "USER"),
                (Canonical::Username, "USERNAME"),
            ]
            .into_iter()
            .find_map(|(var, name)| {
                if did.kept(var) {
                    fresh.get(OsStr::new(name)).map(|v| v.to_owned())
                } else {
                    None
                }
            });
            if let Some(value) = canonical_value {
                let value = value.to_string_lossy().into_owned();
                if !did.kept(Canonical::Logname) {
                    set_overwrite(&mut fresh, "LOGNAME", &value)?;
                }
                if !did.kept(Canonical::User) {
                    set_overwrite(&mut fresh, "USER", &value)?;
                }
                if !did.kept(Canonical::Username) {
                    set_overwrite(&mut fresh, "USERNAME", &value)?;
                }
            }
        }
    }

    if reset_home {
        set_overwrite(&mut fresh, "HOME", &runas.home)?;
    }

    if !did.kept(Canonical::Shell) {
        set_if_absent(&mut fresh, "SHELL", &runas.shell)?;
    }
    if !did.kept(Canonical::Term) {
        set_if_absent(&mut fresh, "TERM", "unknown")?;
    }
    if !did.kept(Canonical::Path) {
        set_if_absent(&mut fresh, "PATH", &platform.standard_path)?;
    }

    if let Some(ps1) = deferred_ps1 {
        fresh.put(ps1, true, true)?;
    }

    set_overwrite(&mut fresh, "SUDO_COMMAND", &command.format())?;
    set_overwrite(&mut fresh, "SUDO_USER", &invoker.name)?;
    set_overwrite(&mut fresh, "SUDO_UID", &invoker.uid.to_string())?;
    set_overwrite(&mut fresh, "SUDO_GID", &invoker.gid.to_string())?;

    Ok(fresh)
}

/// Bound a rejected-names diagnostic at 4 KiB, the same way
/// `CommandLine::format` bounds `SUDO_COMMAND`.
const DIAGNOSTIC_LIMIT: usize = 4096;

fn truncate_diagnostic(mut s: String) -> String {
    if s.len() > DIAGNOSTIC_LIMIT {
        s.truncate(DIAGNOSTIC_LIMIT - 3);
        s.push_str("...");
    }
    s
}

/// Validate a user-supplied `NAME=VALUE` list (e.g. from `-E` / `env_keep`
/// style command-line overrides) against policy. Each entry is rejected
/// when:
/// - `secure_path` is configured, the user is not exempt, and the entry
///   is an explicit `PATH=`; or
/// - `env_reset` is set and `should_keep` is false; or
/// - `env_reset` is unset and `should_delete` is true.
///
/// Returns `Ok(())` if every entry is permitted, otherwise `Err` with a
/// diagnostic listing the rejected names (values elided), truncated at
/// 4 KiB.
pub fn validate_env_vars(
    entries: &[OsString],
    mode: Mode,
    policy: &dyn PolicyStore,
    platform: &PlatformPaths,
    user_is_exempt: bool,
) -> Result<(), String> {
    let matcher = PolicyMatcher::new(mode, platform);
    let mut rejected = Vec::new();

    for entry in entries {
        let bytes = entry.as_bytes();
        let sep = bytes.iter().position(|&b| b == b'=').unwrap_or(bytes.len());
        let name = OsStr::from_bytes(&bytes[..sep]);

        let forbidden_path = policy.secure_path().is_some() && !user_is_exempt && name == OsStr::new("PATH");

        let reject = forbidden_path
            || if policy.env_reset() {
                !matcher.should_keep(entry, policy)
            } else {
                matcher.should_delete(entry, policy)
            };

        if reject {
            rejected.push(name.to_string_lossy().into_owned());
        }
    }

    if rejected.is_empty() {
        Ok(())
    } else {
        let diagnostic = truncate_diagnostic(rejected.join(", "));
        log::warn!(target: "sudo::env", "not setting environment variable(s): {diagnostic}");
        Err(diagnostic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::StaticPolicy;
    use std::ffi::OsStr;

    fn platform() -> PlatformPaths {
        PlatformPaths {
            standard_path: "/usr/bin".into(),
            mail_dir: "/var/mail".into(),
            zoneinfo_root: "/usr/share/zoneinfo".into(),
            path_max: 4096,
            seed_env_file: None,
        }
    }

    fn os(s: &str) -> OsString {
        OsString::from(s)
    }

    #[test]
    fn scenario_1_clean_slate_rebuild() {
        let old = EnvTable::from_entries(vec![
            os("HOME=/home/alice"),
            os("PATH=/usr/bin"),
            os("TERM=xterm"),
            os("LD_PRELOAD=/tmp/evil.so"),
            os("DISPLAY=:0"),
            os("SUDO_PS1=PS1=# "),
            os("SHELL=/bin/bash"),
        ]);

        let platform = platform();
        let mut policy = StaticPolicy::default();
        policy.keep.push("PATH".to_string());
        policy.keep.push("DISPLAY".to_string());

        let invoker = InvokerIdentity {
            name: "alice".into(),
            uid: 1000,
            gid: 1000,
        };
        let runas = RunasIdentity {
            name: "bob".into(),
            home: "/home/bob".into(),
            shell: "/bin/zsh".into(),
        };
        let command = CommandLine {
            command: "/bin/ls".into(),
            arguments: vec![],
        };
        let params = RebuildParams {
            mode: Mode {
                run: true,
                ..Mode::default()
            },
            policy: &policy,
            invoker: &invoker,
            runas: &runas,
            platform: &platform,
            command: &command,
            user_is_exempt: false,
        };

        let new_env = rebuild_env(&old, &params).unwrap();

        assert_eq!(new_env.get(OsStr::new("DISPLAY")), Some(OsStr::new(":0")));
        assert_eq!(new_env.get(OsStr::new("TERM")), Some(OsStr::new("xterm")));
        assert_eq!(new_env.get(OsStr::new("PATH")), Some(OsStr::new("/usr/bin")));
        assert_eq!(new_env.get(OsStr::new("HOME")), Some(OsStr::new("/home/bob")));
        assert_eq!(new_env.get(OsStr::new("SHELL")), Some(OsStr::new("/bin/zsh")));
        assert_eq!(new_env.get(OsStr::new("LOGNAME")), Some(OsStr::new("bob")));
        assert_eq!(new_env.get(OsStr::new("USER")), Some(OsStr::new("bob")));
        assert_eq!(new_env.get(OsStr::new("USERNAME")), Some(OsStr::new("bob")));
        assert_eq!(new_env.get(OsStr::new("MAIL")), Some(OsStr::new("/var/mail/bob")));
        assert_eq!(new_env.get(OsStr::new("PS1")), Some(OsStr::new("# ")));
        assert_eq!(new_env.get(OsStr::new("SUDO_USER")), Some(OsStr::new("alice")));
        assert_eq!(new_env.get(OsStr::new("SUDO_UID")), Some(OsStr::new("1000")));
        assert_eq!(new_env.get(OsStr::new("SUDO_GID")), Some(OsStr::new("1000")));
        assert!(new_env.get(OsStr::new("LD_PRELOAD")).is_none());
    }

    #[test]
    fn scenario_2_filter_only_rebuild_with_secure_path() {
        let old = EnvTable::from_entries(vec![os("PATH=/tmp/bad:/bin"), os("IFS=x"), os("HOME=/home/alice")]);

        let platform = platform();
        let mut policy = StaticPolicy::default();
        policy.env_reset = false;
        policy.secure_path = Some("/sbin:/bin".to_string());

        let invoker = InvokerIdentity {
            name: "alice".into(),
            uid: 1000,
            gid: 1000,
        };
        let runas = RunasIdentity {
            name: "bob".into(),
            home: "/home/bob".into(),
            shell: "/bin/zsh".into(),
        };
        let command = CommandLine {
            command: "/bin/ls".into(),
            arguments: vec![],
        };
        let params = RebuildParams {
            mode: Mode::default(),
            policy: &policy,
            invoker: &invoker,
            runas: &runas,
            platform: &platform,
            command: &command,
            user_is_exempt: false,
        };

        let new_env = rebuild_env(&old, &params).unwrap();
        assert_eq!(new_env.get(OsStr::new("PATH")), Some(OsStr::new("/sbin:/bin")));
        assert!(new_env.get(OsStr::new("IFS")).is_none());
        assert_eq!(new_env.get(OsStr::new("HOME")), Some(OsStr::new("/home/alice")));
    }

    #[test]
    fn scenario_6_logname_consistency_triple() {
        let old = EnvTable::from_entries(vec![os("USER=carol")]);
        let platform = platform();
        let mut policy = StaticPolicy::default();
        policy.keep.insert(0, "USER".to_string());

        let invoker = InvokerIdentity {
            name: "alice".into(),
            uid: 1000,
            gid: 1000,
        };
        let runas = RunasIdentity {
            name: "bob".into(),
            home: "/home/bob".into(),
            shell: "/bin/zsh".into(),
        };
        let command = CommandLine::default();
        let params = RebuildParams {
            mode: Mode {
                run: true,
                ..Mode::default()
            },
            policy: &policy,
            invoker: &invoker,
            runas: &runas,
            platform: &platform,
            command: &command,
            user_is_exempt: false,
        };

        let new_env = rebuild_env(&old, &params).unwrap();
        assert_eq!(new_env.get(OsStr::new("LOGNAME")), Some(OsStr::new("carol")));
        assert_eq!(new_env.get(OsStr::new("USER")), Some(OsStr::new("carol")));
        assert_eq!(new_env.get(OsStr::new("USERNAME")), Some(OsStr::new("carol")));
    }

    #[test]
    fn scenario_3_validate_env_vars_rejects_tz_and_ld_library_path() {
        let platform = platform();
        let policy = StaticPolicy::default();
        let entries = vec![
            os("LD_LIBRARY_PATH=/tmp"),
            os("TERM=xterm"),
            os("TZ=/etc/shadow"),
        ];

        let result = validate_env_vars(
            &entries,
            Mode::default(),
            &policy,
            &platform,
            false,
        );

        let diagnostic = result.unwrap_err();
        assert!(diagnostic.contains("LD_LIBRARY_PATH"));
        assert!(diagnostic.contains("TZ"));
        assert!(!diagnostic.contains("TERM"));
    }
}
