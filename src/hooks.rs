//! Reentrancy-guarded getenv/setenv/putenv/unsetenv shims.
//!
//! These redirect library code's ambient environment calls to a private
//! [`EnvTable`] instead of the real process environment, so that code the
//! tool links against (PAM modules, locale routines, logging) cannot leak
//! the host process's environment back into the sanitized one. The guard
//! is a thread-local flag rather than the C original's single static
//! bool: the guarantee this needs is per-logical-call-stack, not global
//! mutual exclusion, and a thread-local gives that without assuming a
//! single-threaded host.

use std::cell::Cell;
use std::ffi::{OsStr, OsString};

use crate::table::EnvTable;

thread_local! {
    static IN_HOOK: Cell<bool> = const { Cell::new(false) };
}

/// What a hook call should tell its caller to do next, mirroring the
/// `SUDO_HOOK_RET_NEXT` / `SUDO_HOOK_RET_STOP` tokens of the C original.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookResult {
    /// Re-entrant call, or the table isn't initialized yet: fall through
    /// to the real libc implementation.
    PassToNext,
    /// Handled against the private table; do not call the real libc
    /// implementation.
    Stop,
}

/// The `sudoers` locale's special-cased names for the getenv hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocaleOverride {
    /// Force the default (`LANGUAGE`, `LANG`): act as if unset.
    ForceDefault,
    /// Substitute the configured sudoers locale (`LC_ALL`, `LC_MESSAGES`).
    SudoersLocale,
}

fn locale_override(name: &OsStr) -> Option<LocaleOverride> {
    if name == OsStr::new("LANGUAGE") || name == OsStr::new("LANG") {
        Some(LocaleOverride::ForceDefault)
    } else if name == OsStr::new("LC_ALL") || name == OsStr::new("LC_MESSAGES") {
        Some(LocaleOverride::SudoersLocale)
    } else {
        None
    }
}

/// Run `body` with the re-entrancy guard held, unless it's already held
/// (in which case `body` is skipped and `PassToNext` is returned).
fn guarded(body: impl FnOnce() -> HookResult) -> HookResult {
    IN_HOOK.with(|flag| {
        if flag.get() {
            return HookResult::PassToNext;
        }
        flag.set(true);
        let result = body();
        flag.set(false);
        result
    })
}

/// `getenv` hook. `table` is `None` when the private environment has not
/// been initialized yet. `active_sudoers_locale` is true when the
/// process's active locale is the dedicated "sudoers" locale used for
/// policy-message translation; `sudoers_locale_value`, when set, is the
/// configured override value substituted for `LC_ALL`/`LC_MESSAGES`.
pub fn getenv_hook(
    table: Option<&EnvTable>,
    name: &OsStr,
    active_sudoers_locale: bool,
    sudoers_locale_value: Option<&OsStr>,
) -> (HookResult, Option<OsString>) {
    let mut value = None;
    let result = guarded(|| {
        let Some(table) = table else {
            return HookResult::PassToNext;
        };

        if active_sudoers_locale {
            match locale_override(name) {
                Some(LocaleOverride::ForceDefault) => {
                    value = None;
                    return HookResult::Stop;
                }
                Some(LocaleOverride::SudoersLocale) => {
                    value = sudoers_locale_value.map(|v| v.to_owned());
                    return HookResult::Stop;
                }
                None => {}
            }
        }

        value = table.get(name).map(|v| v.to_owned());
        HookResult::Stop
    });
    (result, value)
}

pub fn setenv_hook(table: Option<&mut EnvTable>, name: &OsStr, value: &OsStr, overwrite: bool) -> HookResult {
    guarded(|| match table {
        Some(table) => match table.set(name, value, true, overwrite) {
            Ok(()) => HookResult::Stop,
            Err(_) => HookResult::Stop,
        },
        None => HookResult::PassToNext,
    })
}

/// `putenv` hook: `entry` is a whole `NAME=VALUE` string, as the libc
/// `putenv(3)` call receives it.
pub fn putenv_hook(table: Option<&mut EnvTable>, entry: OsString) -> HookResult {
    guarded(|| match table {
        Some(table) => match table.put(entry, true, true) {
            Ok(()) => HookResult::Stop,
            Err(_) => HookResult::Stop,
        },
        None => HookResult::PassToNext,
    })
}

pub fn unsetenv_hook(table: Option<&mut EnvTable>, name: &OsStr) -> HookResult {
    guarded(|| match table {
        Some(table) => match table.unset(name) {
            Ok(()) => HookResult::Stop,
            Err(_) => HookResult::Stop,
        },
        None => HookResult::PassToNext,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_table_passes_to_next() {
        let (result, value) = getenv_hook(None, OsStr::new("PATH"), false, None);
        assert_eq!(result, HookResult::PassToNext);
        assert_eq!(value, None);
    }

    #[test]
    fn getenv_hits_private_table() {
        let table = EnvTable::from_entries(vec![OsString::from("PATH=/bin")]);
        let (result, value) = getenv_hook(Some(&table), OsStr::new("PATH"), false, None);
        assert_eq!(result, HookResult::Stop);
        assert_eq!(value.as_deref(), Some(OsStr::new("/bin")));
    }

    #[test]
    fn sudoers_locale_forces_default_for_lang() {
        let table = EnvTable::from_entries(vec![OsString::from("LANG=en_US.UTF-8")]);
        let (result, value) = getenv_hook(Some(&table), OsStr::new("LANG"), true, None);
        assert_eq!(result, HookResult::Stop);
        assert_eq!(value, None);
    }

    #[test]
    fn sudoers_locale_substitutes_lc_all() {
        let table = EnvTable::from_entries(vec![OsString::from("LC_ALL=en_US.UTF-8")]);
        let override_value = OsString::from("C");
        let (result, value) = getenv_hook(Some(&table), OsStr::new("LC_ALL"), true, Some(&override_value));
        assert_eq!(result, HookResult::Stop);
        assert_eq!(value.as_deref(), Some(OsStr::new("C")));
    }

    #[test]
    fn reentrant_call_passes_to_next() {
        let table = EnvTable::from_entries(vec![OsString::from("PATH=/bin")]);
        let result = guarded(|| {
            let (inner_result, _) = getenv_hook(Some(&table), OsStr::new("PATH"), false, None);
            inner_result
        });
        assert_eq!(result, HookResult::PassToNext);
    }
}
