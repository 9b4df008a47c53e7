//! Glob-suffix name matching and value sanity checks.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;

use crate::collab::{Mode, PlatformPaths, PolicyStore};

/// Outcome of [`PolicyMatcher::matches_check`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    Allow,
    Deny,
    NoMatch,
}

/// Test `entry` (a `NAME=VALUE` string) against a single pattern, which
/// is a literal name optionally ending in `*` to make it a prefix match.
///
/// Returns `(matched, full_match)`. `full_match` is true when the
/// pattern's consumed length extended past the `NAME=` separator, i.e.
/// the pattern matched into the value too.
fn matches_one(entry: &[u8], pattern: &str) -> (bool, bool) {
    let pattern = pattern.as_bytes();
    if pattern.is_empty() {
        return (false, false);
    }
    let sep = entry.iter().position(|&b| b == b'=').unwrap_or(entry.len());

    let wild = pattern.last() == Some(&b'*');
    let len = if wild { pattern.len() - 1 } else { pattern.len() };

    if entry.len() < len || &entry[..len] != &pattern[..len] {
        return (false, false);
    }
    let matched = wild || len == sep || len == entry.len();
    if !matched {
        return (false, false);
    }
    let full_match = len > sep + 1;
    (true, full_match)
}

/// Test `entry` against every pattern in `list`, in order, returning as
/// soon as one matches: earlier patterns win ties.
pub fn matches_list(entry: &OsStr, list: &[String]) -> (bool, bool) {
    let bytes = entry.as_bytes();
    for pattern in list {
        let (matched, full_match) = matches_one(bytes, pattern);
        if matched {
            return (true, full_match);
        }
    }
    (false, false)
}

/// `value` begins with the three bytes `() ` immediately after `=`,
/// historically used to smuggle a shell function definition through the
/// environment. The constant `3` here (not 2, and not counting `=`) is
/// intentional: it is three bytes past the separator, matching the C
/// original's `strncmp(cp, "=() ", 3)` against `cp` pointing at the `=`
/// itself plus the following `() `.
fn looks_like_bash_function(value: &[u8]) -> bool {
    value.starts_with(b"() ")
}

/// Strip a single leading `:`, then check the fully-qualified-path,
/// `..`-element, printability, and length rules for a sane `TZ` value.
pub fn tz_is_sane(value: &[u8], platform: &PlatformPaths) -> bool {
    let value = value.strip_prefix(b":").unwrap_or(value);

    if value.starts_with(b"/") {
        let root = platform.zoneinfo_root.as_bytes();
        if root.is_empty() {
            return false;
        }
        if !value.starts_with(root) || value.get(root.len()) != Some(&b'/') {
            return false;
        }
    }

    if value.len() >= platform.path_max {
        return false;
    }

    if !value.iter().all(|&b| b.is_ascii_graphic()) {
        return false;
    }

    let mut last_was_slash = true; // path starts conceptually at a boundary
    let mut i = 0;
    while i < value.len() {
        if last_was_slash
            && value[i] == b'.'
            && value.get(i + 1) == Some(&b'.')
            && matches!(value.get(i + 2), None | Some(b'/'))
        {
            return false;
        }
        last_was_slash = value[i] == b'/';
        i += 1;
    }

    true
}

/// Bundles the invocation mode and platform constants the matcher needs
/// alongside the caller-supplied [`PolicyStore`].
pub struct PolicyMatcher<'a> {
    mode: Mode,
    platform: &'a PlatformPaths,
}

impl<'a> PolicyMatcher<'a> {
    pub fn new(mode: Mode, platform: &'a PlatformPaths) -> Self {
        Self { mode, platform }
    }

    pub fn matches_delete(&self, entry: &OsStr, policy: &dyn PolicyStore) -> bool {
        matches_list(entry, policy.env_delete()).0
    }

    pub fn matches_check(&self, entry: &OsStr, policy: &dyn PolicyStore) -> (CheckOutcome, bool) {
        let (matched, full_match) = matches_list(entry, policy.env_check());
        if !matched {
            return (CheckOutcome::NoMatch, full_match);
        }
        let bytes = entry.as_bytes();
        let sep = match bytes.iter().position(|&b| b == b'=') {
            Some(s) => s,
            None => return (CheckOutcome::NoMatch, full_match),
        };
        let name = &bytes[..sep];
        let value = &bytes[sep + 1..];
        let allow = if name == b"TZ" {
            tz_is_sane(value, self.platform)
        } else {
            !value.iter().any(|&b| b == b'/' || b == b'%')
        };
        (
            if allow {
                CheckOutcome::Allow
            } else {
                CheckOutcome::Deny
            },
            full_match,
        )
    }

    pub fn matches_keep(&self, entry: &OsStr, policy: &dyn PolicyStore) -> (bool, bool) {
        let bytes = entry.as_bytes();
        if self.mode.shell && bytes.starts_with(b"SHELL=") {
            return (true, false);
        }
        matches_list(entry, policy.env_keep())
    }

    /// Should `entry` be deleted outright?
    pub fn should_delete(&self, entry: &OsStr, policy: &dyn PolicyStore) -> bool {
        let bytes = entry.as_bytes();
        if let Some(sep) = bytes.iter().position(|&b| b == b'=') {
            if looks_like_bash_function(&bytes[sep + 1..]) {
                return true;
            }
        }
        if self.matches_delete(entry, policy) {
            return true;
        }
        matches!(self.matches_check(entry, policy).0, CheckOutcome::Deny)
    }

    /// Should `entry` be preserved?
    pub fn should_keep(&self, entry: &OsStr, policy: &dyn PolicyStore) -> bool {
        let (check, mut full_match) = self.matches_check(entry, policy);
        let keep = match check {
            CheckOutcome::Allow => true,
            CheckOutcome::Deny => false,
            CheckOutcome::NoMatch => {
                let (keep, fm) = self.matches_keep(entry, policy);
                full_match = fm;
                keep
            }
        };

        if keep && !full_match {
            let bytes = entry.as_bytes();
            if let Some(sep) = bytes.iter().position(|&b| b == b'=') {
                if looks_like_bash_function(&bytes[sep + 1..]) {
                    return false;
                }
            }
        }
        keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::StaticPolicy;

    fn matcher<'a>(platform: &'a PlatformPaths) -> PolicyMatcher<'a> {
        PolicyMatcher::new(Mode::default(), platform)
    }

    fn platform() -> PlatformPaths {
        PlatformPaths {
            standard_path: "/bin".into(),
            mail_dir: "/var/mail".into(),
            zoneinfo_root: "/usr/share/zoneinfo".into(),
            path_max: 4096,
            seed_env_file: None,
        }
    }

    #[test]
    fn matches_list_prefix_star() {
        let list = vec!["LD_*".to_string()];
        let (matched, full) = matches_list(OsStr::new("LD_PRELOAD=/tmp/evil.so"), &list);
        assert!(matched);
        assert!(full);
        let (matched, _) = matches_list(OsStr::new("OTHER=1"), &list);
        assert!(!matched);
    }

    #[test]
    fn matches_list_literal_name_full_match_requires_value_bytes() {
        let list = vec!["TERM".to_string()];
        let (matched, full) = matches_list(OsStr::new("TERM=xterm"), &list);
        assert!(matched);
        assert!(!full, "matching only up to '=' is not a full match");
    }

    #[test]
    fn should_delete_bash_function_regardless_of_lists() {
        let platform = platform();
        let policy = StaticPolicy::default();
        let m = matcher(&platform);
        assert!(m.should_delete(OsStr::new("AAP=() { :; }; echo pwned"), &policy));
    }

    #[test]
    fn should_keep_bash_function_requires_full_match() {
        let platform = platform();
        let mut policy = StaticPolicy::default();
        policy.keep = vec!["AAP".to_string()];
        let m = matcher(&platform);
        // name-only match in env_keep: full_match is false, bash-function guard fires
        assert!(!m.should_keep(OsStr::new("AAP=() { :; }; echo pwned"), &policy));
    }

    #[test]
    fn tz_law() {
        let platform = platform();
        assert!(tz_is_sane(b"America/Denver", &platform));
        assert!(tz_is_sane(b":America/Denver", &platform));
        assert!(tz_is_sane(b"UTC", &platform));
        assert!(!tz_is_sane(b"/etc/shadow", &platform));
        assert!(!tz_is_sane(
            b"/usr/share/zoneinfo/../../../etc/shadow",
            &platform
        ));
        assert!(!tz_is_sane(b"America/Den ver", &platform));
        assert!(!tz_is_sane(&vec![b'a'; 5000], &platform));
        assert!(!tz_is_sane(b"/usr/share/zoneinfo-extra/Foo", &platform));
    }
}
