//! The private, array-backed environment table.
//!
//! Every stored entry is an owned [`OsString`], copied in eagerly at
//! `init` time, rather than a mix of borrowed and owned entries. That
//! costs one extra copy of the invoker's environment up front in
//! exchange for never having to track per-entry provenance.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;

use crate::error::EnvError;

/// Number of extra slots reserved at init, and the growth increment,
/// mirroring the C original's `len + 1 + 128` / `env_size + 128`.
const CAPACITY_INCREMENT: usize = 128;

fn split_at_eq(entry: &OsStr) -> Option<usize> {
    entry.as_bytes().iter().position(|&b| b == b'=')
}

/// `entry` is `NAME=VALUE`; returns the `NAME` half.
fn name_of(entry: &OsStr) -> &OsStr {
    match split_at_eq(entry) {
        Some(sep) => OsStr::from_bytes(&entry.as_bytes()[..sep]),
        None => entry,
    }
}

/// True if `entry`'s `NAME=` prefix (as bytes, including the `=`) equals
/// `prefix` (which must itself include the trailing `=`).
fn has_prefix(entry: &OsStr, prefix: &[u8]) -> bool {
    entry.as_bytes().starts_with(prefix)
}

/// An ordered, deduplicating table of `NAME=VALUE` environment entries.
///
/// Entries preserve insertion order except where `put(dedup=true,
/// overwrite=true)` collapses duplicates. There is no explicit "null
/// terminator" slot in this representation (`Vec` already knows its own
/// length), but [`EnvTable::capacity_slots`] tracks the same capacity
/// bookkeeping a C-style environment vector would need, including the
/// "one slot reserved for the terminator" accounting, so the
/// growth-overflow path stays reachable and testable.
#[derive(Clone, Debug, Default)]
pub struct EnvTable {
    entries: Vec<OsString>,
    capacity: usize,
}

impl EnvTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from an invoker-supplied environment, reserving the
    /// same initial headroom the C original does (`len + 1 + 128`).
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = OsString>,
    {
        let entries: Vec<OsString> = entries.into_iter().collect();
        let capacity = entries.len() + 1 + CAPACITY_INCREMENT;
        Self { entries, capacity }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total capacity currently reserved, including the one slot always
    /// held back for the conceptual null terminator.
    pub fn capacity_slots(&self) -> usize {
        self.capacity
    }

    /// Raw `NAME=VALUE` entries, in table order.
    pub fn iter(&self) -> impl Iterator<Item = &OsStr> {
        self.entries.iter().map(OsString::as_os_str)
    }

    /// `(name, value)` pairs, in table order — the shape
    /// `std::process::Command::envs` wants at hand-off time.
    pub fn iter_pairs(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.entries.iter().map(|e| {
            let bytes = e.as_bytes();
            match split_at_eq(e) {
                Some(sep) => (
                    OsStr::from_bytes(&bytes[..sep]),
                    OsStr::from_bytes(&bytes[sep + 1..]),
                ),
                None => (e.as_os_str(), OsStr::new("")),
            }
        })
    }

    /// Look up `name`'s value. For BSD compatibility, characters at and
    /// after a literal `=` in `name` itself are ignored.
    pub fn get(&self, name: &OsStr) -> Option<&OsStr> {
        let query = match split_at_eq(name) {
            Some(sep) => &name.as_bytes()[..sep],
            None => name.as_bytes(),
        };
        self.entries.iter().find_map(|e| {
            let bytes = e.as_bytes();
            if bytes.len() > query.len()
                && bytes[query.len()] == b'='
                && &bytes[..query.len()] == query
            {
                Some(OsStr::from_bytes(&bytes[query.len() + 1..]))
            } else {
                None
            }
        })
    }

    pub fn contains(&self, name: &OsStr) -> bool {
        self.get(name).is_some()
    }

    fn ensure_room_for_one(&mut self) -> Result<(), EnvError> {
        // Mirrors the C check `env_size > 2 && env_len > env_size - 2`:
        // grow whenever fewer than two free slots remain (one for the
        // new entry, one always held back for the terminator).
        if self.capacity > 2 && self.entries.len() > self.capacity - 2 {
            let new_capacity = self
                .capacity
                .checked_add(CAPACITY_INCREMENT)
                .ok_or(EnvError::Overflow)?;
            new_capacity
                .checked_mul(std::mem::size_of::<usize>())
                .ok_or(EnvError::Overflow)?;
            self.capacity = new_capacity;
        } else if self.capacity <= 2 {
            self.capacity = CAPACITY_INCREMENT + self.entries.len() + 1;
        }
        Ok(())
    }

    /// Insert `entry` (which must contain `=`). If `dedup` and an entry
    /// sharing the same `NAME=` prefix exists: when `overwrite`, replace
    /// it in place and drop any later duplicates; otherwise leave the
    /// table unchanged. If no match is found, append.
    pub fn put(&mut self, entry: OsString, dedup: bool, overwrite: bool) -> Result<(), EnvError> {
        let sep = split_at_eq(&entry).ok_or(EnvError::InvalidName)?;
        let prefix = entry.as_bytes()[..=sep].to_vec();

        if dedup {
            if let Some(pos) = self.entries.iter().position(|e| has_prefix(e, &prefix)) {
                if overwrite {
                    self.entries[pos] = entry;
                    let mut idx = 0usize;
                    self.entries.retain(|e| {
                        let is_dup_elsewhere = idx != pos && has_prefix(e, &prefix);
                        idx += 1;
                        !is_dup_elsewhere
                    });
                }
                return Ok(());
            }
        }

        self.ensure_room_for_one()?;
        self.entries.push(entry);
        Ok(())
    }

    /// Join `name` and `value` into a `NAME=VALUE` entry and `put` it.
    pub fn set(
        &mut self,
        name: &OsStr,
        value: &OsStr,
        dedup: bool,
        overwrite: bool,
    ) -> Result<(), EnvError> {
        if name.is_empty() || split_at_eq(name).is_some() {
            return Err(EnvError::InvalidName);
        }
        let mut joined = OsString::with_capacity(name.len() + 1 + value.len());
        joined.push(name);
        joined.push("=");
        joined.push(value);
        self.put(joined, dedup, overwrite)
    }

    /// Remove every entry named `name`. Not finding one is success.
    pub fn unset(&mut self, name: &OsStr) -> Result<(), EnvError> {
        if name.is_empty() || split_at_eq(name).is_some() {
            return Err(EnvError::InvalidName);
        }
        self.entries.retain(|e| name_of(e) != name);
        Ok(())
    }
}

/// Holds the current private environment plus the previous one it was
/// rebuilt from.
#[derive(Clone, Debug, Default)]
pub struct EnvState {
    current: EnvTable,
    old: Option<EnvTable>,
}

impl EnvState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize `current` from an invoker environment, discarding
    /// whatever was previously held in `old`.
    pub fn init<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = OsString>,
    {
        self.old = None;
        self.current = EnvTable::from_entries(entries);
    }

    /// Move `current` into `old` and start `current` fresh, as
    /// `env_init(NULL)` does in the C original.
    pub fn init_empty(&mut self) {
        self.old = Some(std::mem::take(&mut self.current));
        self.current = EnvTable::new();
    }

    pub fn current(&self) -> &EnvTable {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut EnvTable {
        &mut self.current
    }

    pub fn old(&self) -> Option<&EnvTable> {
        self.old.as_ref()
    }

    /// Exchange `current` and `old`. Fails (returns `false`) if there is
    /// no `old` to swap in, matching `env_swap_old`'s `false` return when
    /// `old_envp == NULL`.
    pub fn swap_old(&mut self) -> bool {
        match self.old.take() {
            Some(old) => {
                let prev_current = std::mem::replace(&mut self.current, old);
                self.old = Some(prev_current);
                true
            }
            None => false,
        }
    }

    /// Replace `current` with a freshly built table, retaining the
    /// table it replaces as `old`.
    pub fn replace_current(&mut self, new_current: EnvTable) {
        let previous = std::mem::replace(&mut self.current, new_current);
        self.old = Some(previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(s: &str) -> OsString {
        OsString::from(s)
    }

    #[test]
    fn round_trip_get_matches_init() {
        let table = EnvTable::from_entries(vec![os("HOME=/home/a"), os("PATH=/bin")]);
        assert_eq!(table.get(OsStr::new("HOME")), Some(OsStr::new("/home/a")));
        assert_eq!(table.get(OsStr::new("PATH")), Some(OsStr::new("/bin")));
        assert_eq!(table.get(OsStr::new("MISSING")), None);
    }

    #[test]
    fn get_ignores_everything_from_eq_in_query_name() {
        let table = EnvTable::from_entries(vec![os("HOME=/home/a")]);
        assert_eq!(
            table.get(OsStr::new("HOME=whatever")),
            Some(OsStr::new("/home/a"))
        );
    }

    #[test]
    fn put_dedup_overwrite_keeps_single_entry_with_new_value() {
        let mut table = EnvTable::from_entries(vec![os("A=1"), os("B=2"), os("A=3")]);
        table.put(os("A=9"), true, true).unwrap();
        let values: Vec<_> = table.iter().map(|s| s.to_string_lossy().into_owned()).collect();
        assert_eq!(values, vec!["A=9".to_string(), "B=2".to_string()]);
    }

    #[test]
    fn put_dedup_no_overwrite_leaves_table_unchanged() {
        let mut table = EnvTable::from_entries(vec![os("A=1")]);
        table.put(os("A=2"), true, false).unwrap();
        assert_eq!(table.get(OsStr::new("A")), Some(OsStr::new("1")));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn set_then_set_is_idempotent() {
        let mut table = EnvTable::new();
        table.set(OsStr::new("A"), OsStr::new("1"), true, true).unwrap();
        let first: Vec<_> = table.iter().map(|s| s.to_owned()).collect();
        table.set(OsStr::new("A"), OsStr::new("1"), true, true).unwrap();
        let second: Vec<_> = table.iter().map(|s| s.to_owned()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn unset_removes_all_instances() {
        let mut table = EnvTable::from_entries(vec![os("A=1"), os("B=2")]);
        table.put(os("A=dup"), false, false).unwrap();
        table.unset(OsStr::new("A")).unwrap();
        assert_eq!(table.get(OsStr::new("A")), None);
        assert_eq!(table.get(OsStr::new("B")), Some(OsStr::new("2")));
    }

    #[test]
    fn set_rejects_empty_or_eq_bearing_names() {
        let mut table = EnvTable::new();
        assert!(matches!(
            table.set(OsStr::new(""), OsStr::new("x"), true, true),
            Err(EnvError::InvalidName)
        ));
        assert!(matches!(
            table.set(OsStr::new("A=B"), OsStr::new("x"), true, true),
            Err(EnvError::InvalidName)
        ));
    }

    #[test]
    fn swap_old_fails_without_a_previous_table() {
        let mut state = EnvState::new();
        assert!(!state.swap_old());
        state.init(vec![os("A=1")]);
        state.init_empty();
        assert!(state.swap_old());
    }
}
