//! Rendering of environment changes as a POSIX shell script.
//!
//! This is the one place where the explicit state becomes a global effect: the
//! calling shell evaluates the script (`eval "$(siliconai-setup env)"`).

use crate::core::env_state::EnvironmentState;

/// A single change between two environment states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvChange<'a> {
    Set { name: &'a str, value: &'a str },
    Unset { name: &'a str },
}

/// Changes that turn `before` into `after`, sorted by variable name.
pub fn diff<'a>(before: &'a EnvironmentState, after: &'a EnvironmentState) -> Vec<EnvChange<'a>> {
    let mut changes: Vec<EnvChange<'a>> = before
        .vars()
        .filter(|(name, _)| !after.contains(name))
        .map(|(name, _)| EnvChange::Unset { name })
        .collect();
    changes.extend(
        after
            .vars()
            .filter(|(name, value)| before.get(name) != Some(*value))
            .map(|(name, value)| EnvChange::Set { name, value }),
    );
    changes.sort_by_key(|change| match change {
        EnvChange::Set { name, .. } | EnvChange::Unset { name } => *name,
    });
    changes
}

/// Render `export`/`unset` lines for every change from `before` to `after`.
///
/// Names that are not valid shell identifiers are skipped.
pub fn render_export_script(before: &EnvironmentState, after: &EnvironmentState) -> String {
    let mut script = String::new();
    for change in diff(before, after) {
        match change {
            EnvChange::Set { name, value } if is_shell_identifier(name) => {
                script.push_str(&format!("export {name}={}\n", shell_quote(value)));
            }
            EnvChange::Unset { name } if is_shell_identifier(name) => {
                script.push_str(&format!("unset {name}\n"));
            }
            _ => {}
        }
    }
    script
}

/// Single-quote `value` for POSIX shells.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn is_shell_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(pairs: &[(&str, &str)]) -> EnvironmentState {
        pairs.iter().copied().collect()
    }

    #[test]
    fn script_mentions_only_changed_variables() {
        let before = state(&[("HOME", "/home/u"), ("PATH", "/usr/bin"), ("PYTHONPATH", "/lcg/py")]);
        let after = state(&[
            ("HOME", "/home/u"),
            ("PATH", "/p/.venv/bin:/usr/bin"),
            ("VIRTUAL_ENV", "/p/.venv"),
        ]);

        let script = render_export_script(&before, &after);
        assert_eq!(
            script,
            "export PATH='/p/.venv/bin:/usr/bin'\nunset PYTHONPATH\nexport VIRTUAL_ENV='/p/.venv'\n"
        );
    }

    #[test]
    fn identical_states_render_empty_script() {
        let env = state(&[("PATH", "/usr/bin")]);
        assert!(render_export_script(&env, &env).is_empty());
    }

    #[test]
    fn quotes_embedded_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn skips_names_the_shell_cannot_export() {
        let before = EnvironmentState::new();
        let after = state(&[("BASH_FUNC_x%%", "() { :; }"), ("OK_1", "v")]);
        assert_eq!(render_export_script(&before, &after), "export OK_1='v'\n");
    }
}
