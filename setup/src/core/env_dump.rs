//! Parsing of `env -0` dumps captured after sourcing a shell script.

use crate::core::env_state::EnvironmentState;

/// Variables the dumping shell sets for itself; they never describe the sourced
/// environment and are dropped.
pub const SHELL_INTERNAL_VARS: &[&str] = &["_", "SHLVL", "PWD", "OLDPWD"];

/// Parse NUL-separated `NAME=value` records.
///
/// Values may contain `=` and newlines. Records without `=` or with an empty
/// name are skipped, as are [`SHELL_INTERNAL_VARS`].
pub fn parse_env_dump(raw: &[u8]) -> EnvironmentState {
    raw.split(|byte| *byte == 0)
        .filter(|record| !record.is_empty())
        .filter_map(|record| {
            let record = String::from_utf8_lossy(record);
            let (name, value) = record.split_once('=')?;
            if name.is_empty() || SHELL_INTERNAL_VARS.contains(&name) {
                return None;
            }
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}
