//! `/etc/environment`-style file loader.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;

use crate::error::EnvError;
use crate::table::EnvTable;

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn strip_export_prefix(line: &str) -> &str {
    if let Some(rest) = line.strip_prefix("export") {
        if rest.starts_with(|c: char| c.is_whitespace()) {
            return rest.trim_start();
        }
    }
    line
}

/// A single surviving `NAME=VALUE` line, quote-stripped.
fn parse_line(raw: &str) -> Option<(String, String)> {
    let line = strip_comment(raw).trim();
    if line.is_empty() {
        return None;
    }
    let line = strip_export_prefix(line);

    let (name, rest) = line.split_once('=')?;
    if name.is_empty() {
        return None;
    }

    let value = rest;
    let bytes = value.as_bytes();
    let unquoted = if bytes.len() >= 2
        && (bytes[0] == b'\'' || bytes[0] == b'"')
        && bytes[0] == bytes[bytes.len() - 1]
    {
        &value[1..value.len() - 1]
    } else {
        value
    };

    Some((name.to_string(), unquoted.to_string()))
}

/// Parse `path` for `NAME=VALUE`, `NAME="VALUE"`, or `NAME='VALUE'`
/// lines (optionally `export`-prefixed) and insert each surviving entry
/// into `table` via `put(dedup=true, overwrite)`.
///
/// The file not existing is success. Any other I/O error is reported,
/// and entries already inserted before the error are not rolled back.
pub fn read_env_file(path: &Path, overwrite: bool, table: &mut EnvTable) -> Result<(), EnvError> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            log::warn!(target: "sudo::env", "unable to read {}: {e}", path.display());
            return Err(EnvError::Io(e));
        }
    };

    for raw_line in contents.lines() {
        let Some((name, value)) = parse_line(raw_line) else {
            continue;
        };
        let mut entry = OsString::with_capacity(name.len() + 1 + value.len());
        entry.push(&name);
        entry.push("=");
        entry.push(&value);
        table.put(entry, true, overwrite)?;
    }

    Ok(())
}
