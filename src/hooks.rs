//! Installs the agent-side hook commands that write the signal file.
//!
//! The agent's hooks file maps lifecycle events to shell commands. Muzak
//! contributes `echo start > <signal>` / `echo stop > <signal>` entries and
//! must leave everything else in the file untouched, including fields it
//! does not understand.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Agent lifecycle events that should start the music.
const START_EVENTS: &[&str] = &["beforeSubmitPrompt"];

/// Agent lifecycle events that should stop it.
const STOP_EVENTS: &[&str] = &["stop", "sessionEnd"];

#[derive(Debug, Serialize, Deserialize)]
struct HooksFile {
    version: u32,
    #[serde(default)]
    hooks: BTreeMap<String, Vec<HookEntry>>,
}

impl Default for HooksFile {
    fn default() -> Self {
        Self {
            version: 1,
            hooks: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct HookEntry {
    command: String,
    /// Fields other tools may have added to their entries
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Hooks file location for the agent in the current directory.
pub fn default_hooks_path() -> PathBuf {
    PathBuf::from(".cursor").join("hooks.json")
}

/// Entries are recognized as ours by the signal file name inside the command.
fn marker(signal_path: &Path) -> String {
    signal_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| signal_path.display().to_string())
}

/// Check whether muzak hooks are already present.
pub fn has_hooks(hooks_file: &Path, signal_path: &Path) -> bool {
    if !hooks_file.exists() {
        return false;
    }
    match fs::read_to_string(hooks_file) {
        Ok(contents) => contents.contains(&marker(signal_path)),
        Err(_) => false,
    }
}

/// Merge muzak hook entries into the hooks file, preserving existing hooks.
/// Installing twice is a no-op.
pub fn install(hooks_file: &Path, signal_path: &Path) -> Result<()> {
    if let Some(parent) = hooks_file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create hooks directory: {:?}", parent))?;
    }

    let mut data = read_hooks_file(hooks_file);
    let marker = marker(signal_path);

    let start_cmd = format!("echo start > {}", signal_path.display());
    let stop_cmd = format!("echo stop > {}", signal_path.display());

    for event in START_EVENTS {
        add_hook(&mut data, event, &start_cmd, &marker);
    }
    for event in STOP_EVENTS {
        add_hook(&mut data, event, &stop_cmd, &marker);
    }

    write_hooks_file(hooks_file, &data)
}

/// Remove muzak entries from the hooks file. Other tools' hooks survive;
/// the file itself is deleted once nothing remains in it.
pub fn remove(hooks_file: &Path, signal_path: &Path) -> Result<()> {
    if !hooks_file.exists() {
        return Ok(());
    }

    let mut data = read_hooks_file(hooks_file);
    let marker = marker(signal_path);

    for entries in data.hooks.values_mut() {
        entries.retain(|entry| !entry.command.contains(&marker));
    }
    data.hooks.retain(|_, entries| !entries.is_empty());

    if data.hooks.is_empty() {
        fs::remove_file(hooks_file)
            .with_context(|| format!("Failed to delete hooks file: {:?}", hooks_file))
    } else {
        write_hooks_file(hooks_file, &data)
    }
}

fn add_hook(data: &mut HooksFile, event: &str, command: &str, marker: &str) {
    let entries = data.hooks.entry(event.to_string()).or_default();
    if entries.iter().any(|entry| entry.command.contains(marker)) {
        return;
    }
    entries.push(HookEntry {
        command: command.to_string(),
        extra: serde_json::Map::new(),
    });
}

fn read_hooks_file(path: &Path) -> HooksFile {
    if path.exists() {
        match fs::read_to_string(path) {
            // Corrupted file: start fresh rather than fail the install
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => HooksFile::default(),
        }
    } else {
        HooksFile::default()
    }
}

fn write_hooks_file(path: &Path, data: &HooksFile) -> Result<()> {
    let contents =
        serde_json::to_string_pretty(data).context("Failed to serialize hooks file")?;
    fs::write(path, contents).with_context(|| format!("Failed to write hooks file: {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(dir: &Path) -> (PathBuf, PathBuf) {
        (dir.join("hooks.json"), dir.join("muzak-signal"))
    }

    #[test]
    fn install_creates_entries_for_every_event() {
        let dir = tempfile::tempdir().unwrap();
        let (hooks_file, signal_path) = paths(dir.path());

        install(&hooks_file, &signal_path).unwrap();
        assert!(has_hooks(&hooks_file, &signal_path));

        let data = read_hooks_file(&hooks_file);
        assert_eq!(data.hooks.len(), START_EVENTS.len() + STOP_EVENTS.len());
        assert!(data.hooks["beforeSubmitPrompt"][0]
            .command
            .starts_with("echo start > "));
        assert!(data.hooks["stop"][0].command.starts_with("echo stop > "));
        assert!(data.hooks["sessionEnd"][0]
            .command
            .starts_with("echo stop > "));
    }

    #[test]
    fn install_twice_does_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let (hooks_file, signal_path) = paths(dir.path());

        install(&hooks_file, &signal_path).unwrap();
        install(&hooks_file, &signal_path).unwrap();

        let data = read_hooks_file(&hooks_file);
        for entries in data.hooks.values() {
            assert_eq!(entries.len(), 1);
        }
    }

    #[test]
    fn remove_strips_only_marked_entries() {
        let dir = tempfile::tempdir().unwrap();
        let (hooks_file, signal_path) = paths(dir.path());

        fs::write(
            &hooks_file,
            r#"{"version":1,"hooks":{"stop":[{"command":"make lint","timeout":5}]}}"#,
        )
        .unwrap();

        install(&hooks_file, &signal_path).unwrap();
        remove(&hooks_file, &signal_path).unwrap();

        let data = read_hooks_file(&hooks_file);
        assert_eq!(data.hooks.len(), 1);
        assert_eq!(data.hooks["stop"].len(), 1);
        assert_eq!(data.hooks["stop"][0].command, "make lint");
        // Unknown fields survive the round trip
        assert_eq!(
            data.hooks["stop"][0].extra.get("timeout"),
            Some(&serde_json::json!(5))
        );
    }

    #[test]
    fn remove_deletes_the_file_when_nothing_remains() {
        let dir = tempfile::tempdir().unwrap();
        let (hooks_file, signal_path) = paths(dir.path());

        install(&hooks_file, &signal_path).unwrap();
        remove(&hooks_file, &signal_path).unwrap();
        assert!(!hooks_file.exists());
    }

    #[test]
    fn remove_without_file_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (hooks_file, signal_path) = paths(dir.path());
        assert!(remove(&hooks_file, &signal_path).is_ok());
    }

    #[test]
    fn corrupted_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (hooks_file, signal_path) = paths(dir.path());

        fs::write(&hooks_file, "{ not json").unwrap();
        install(&hooks_file, &signal_path).unwrap();
        assert!(has_hooks(&hooks_file, &signal_path));
    }
}
