//! Manifest discovery and validation for WidgetDeck
//!
//! This module handles discovering plugin directories, reading and parsing
//! `plugin.json` manifests, and validating manifest contents before any
//! plugin code is instantiated.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::error::{DeckError, PluginError, Result};

use super::types::{PluginManifest, PluginType};

/// File name of the manifest inside a plugin directory.
pub const MANIFEST_FILE: &str = "plugin.json";

static ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9._\-]{0,63}$").expect("valid id pattern"));

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+\.\d+\.\d+(?:[-+][0-9A-Za-z.\-]+)?$").expect("valid version pattern")
});

/// A manifest found on disk, together with the directory it came from.
#[derive(Debug, Clone)]
pub struct DiscoveredPlugin {
    pub manifest: PluginManifest,
    pub path: PathBuf,
}

/// Discover plugin manifests across multiple directories.
///
/// Scans each directory for subdirectories containing a `plugin.json` file.
/// Invalid manifests are logged as warnings and skipped; they never fail
/// the overall discovery.
pub fn discover_manifests(dirs: &[PathBuf]) -> Result<Vec<DiscoveredPlugin>> {
    let mut found = Vec::new();

    for dir in dirs {
        if !dir.exists() {
            info!(dir = %dir.display(), "Plugin directory does not exist, skipping");
            continue;
        }

        if !dir.is_dir() {
            warn!(path = %dir.display(), "Plugin path is not a directory, skipping");
            continue;
        }

        let entries = fs::read_dir(dir).map_err(|e| {
            DeckError::Config(format!(
                "Failed to read plugin directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_dir() && p.join(MANIFEST_FILE).exists())
            .collect();
        // read_dir order is platform-dependent
        paths.sort();

        for entry_path in paths {
            match read_manifest(&entry_path) {
                Ok(manifest) => {
                    info!(
                        plugin = %manifest.id,
                        version = %manifest.version,
                        kind = %manifest.plugin_type,
                        "Discovered plugin"
                    );
                    found.push(DiscoveredPlugin {
                        manifest,
                        path: entry_path,
                    });
                }
                Err(e) => {
                    warn!(
                        dir = %entry_path.display(),
                        error = %e,
                        "Invalid plugin manifest, skipping"
                    );
                }
            }
        }
    }

    Ok(found)
}

/// Read and validate a manifest.
///
/// `path` may be a plugin directory (containing `plugin.json`) or the
/// manifest file itself. Every failure is reported as
/// `PluginError::ManifestInvalid`.
pub fn read_manifest(path: &Path) -> std::result::Result<PluginManifest, PluginError> {
    let manifest_path = if path.is_dir() {
        path.join(MANIFEST_FILE)
    } else {
        path.to_path_buf()
    };

    if !manifest_path.exists() {
        return Err(PluginError::ManifestInvalid(format!(
            "No {} found at {}",
            MANIFEST_FILE,
            path.display()
        )));
    }

    let content = fs::read_to_string(&manifest_path).map_err(|e| {
        PluginError::ManifestInvalid(format!(
            "Failed to read {}: {}",
            manifest_path.display(),
            e
        ))
    })?;

    let manifest: PluginManifest = serde_json::from_str(&content).map_err(|e| {
        PluginError::ManifestInvalid(format!(
            "Malformed {}: {}",
            manifest_path.display(),
            e
        ))
    })?;

    validate_manifest(&manifest)?;
    Ok(manifest)
}

/// Validate a parsed manifest.
///
/// Checks:
/// - `id` is 1-64 characters of `[a-z0-9._-]`, starting alphanumeric
/// - `name` and `author` are non-blank
/// - `version` is `MAJOR.MINOR.PATCH` with an optional suffix
/// - `dependencies` has no duplicates and does not name the plugin itself
pub fn validate_manifest(manifest: &PluginManifest) -> std::result::Result<(), PluginError> {
    if !ID_RE.is_match(&manifest.id) {
        return Err(PluginError::ManifestInvalid(format!(
            "Invalid plugin id '{}': must be 1-64 lowercase alphanumeric characters, '.', '_' or '-', starting with alphanumeric",
            manifest.id
        )));
    }

    if manifest.name.trim().is_empty() {
        return Err(PluginError::ManifestInvalid(format!(
            "Plugin '{}' has an empty name",
            manifest.id
        )));
    }

    if manifest.author.trim().is_empty() {
        return Err(PluginError::ManifestInvalid(format!(
            "Plugin '{}' has an empty author",
            manifest.id
        )));
    }

    if !VERSION_RE.is_match(manifest.version.trim()) {
        return Err(PluginError::ManifestInvalid(format!(
            "Plugin '{}' has an invalid version '{}'",
            manifest.id, manifest.version
        )));
    }

    let mut seen = HashSet::new();
    for dep in &manifest.dependencies {
        if dep == &manifest.id {
            return Err(PluginError::ManifestInvalid(format!(
                "Plugin '{}' cannot depend on itself",
                manifest.id
            )));
        }
        if !seen.insert(dep.as_str()) {
            return Err(PluginError::ManifestInvalid(format!(
                "Plugin '{}' lists dependency '{}' more than once",
                manifest.id, dep
            )));
        }
    }

    if manifest.slot.is_some() && manifest.plugin_type != PluginType::Widget {
        warn!(
            plugin = %manifest.id,
            kind = %manifest.plugin_type,
            "Ignoring slot on non-widget plugin"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::types::Permission;
    use tempfile::TempDir;

    fn valid_manifest() -> PluginManifest {
        PluginManifest::new("test-plugin", "Test Plugin", PluginType::Widget)
            .with_permissions(&[Permission::Widgets])
    }

    fn write_plugin_json(dir: &Path, manifest: &PluginManifest) {
        let content = serde_json::to_string_pretty(manifest).unwrap();
        fs::write(dir.join(MANIFEST_FILE), content).unwrap();
    }

    // ---- validate_manifest tests ----

    #[test]
    fn test_validate_valid_manifest() {
        assert!(validate_manifest(&valid_manifest()).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_ids() {
        let too_long = "a".repeat(65);
        for id in ["", "Upper", "-leading", "has space", too_long.as_str()] {
            let mut m = valid_manifest();
            m.id = id.to_string();
            let err = validate_manifest(&m).unwrap_err();
            assert!(
                matches!(err, PluginError::ManifestInvalid(_)),
                "id {:?} should be invalid",
                id
            );
        }
    }

    #[test]
    fn test_validate_accepts_dotted_ids() {
        let mut m = valid_manifest();
        m.id = "com.example.weather_v2".to_string();
        assert!(validate_manifest(&m).is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_name_and_author() {
        let mut m = valid_manifest();
        m.name = "  ".to_string();
        assert!(validate_manifest(&m).is_err());

        let mut m = valid_manifest();
        m.author = String::new();
        assert!(validate_manifest(&m).is_err());
    }

    #[test]
    fn test_validate_versions() {
        for good in ["1.0.0", "0.12.3", "2.0.0-beta.1"] {
            let mut m = valid_manifest();
            m.version = good.to_string();
            assert!(validate_manifest(&m).is_ok(), "{} should be valid", good);
        }
        for bad in ["", "1", "1.0", "v1.0.0", "one.two.three"] {
            let mut m = valid_manifest();
            m.version = bad.to_string();
            assert!(validate_manifest(&m).is_err(), "{} should be invalid", bad);
        }
    }

    #[test]
    fn test_validate_rejects_self_dependency() {
        let m = valid_manifest().with_dependencies(&["test-plugin"]);
        let err = validate_manifest(&m).unwrap_err();
        assert!(err.to_string().contains("cannot depend on itself"));
    }

    #[test]
    fn test_validate_rejects_duplicate_dependency() {
        let m = valid_manifest().with_dependencies(&["timer", "timer"]);
        assert!(validate_manifest(&m).is_err());
    }

    #[test]
    fn test_validate_allows_slot_on_non_widget() {
        let mut m = PluginManifest::new("hook", "Hook", PluginType::EventHook);
        m.slot = Some("sidebar".to_string());
        assert!(validate_manifest(&m).is_ok());
    }

    // ---- read_manifest tests ----

    #[test]
    fn test_read_manifest_from_directory() {
        let tmp = TempDir::new().unwrap();
        write_plugin_json(tmp.path(), &valid_manifest());

        let manifest = read_manifest(tmp.path()).unwrap();
        assert_eq!(manifest.id, "test-plugin");
    }

    #[test]
    fn test_read_manifest_from_file() {
        let tmp = TempDir::new().unwrap();
        write_plugin_json(tmp.path(), &valid_manifest());

        let manifest = read_manifest(&tmp.path().join(MANIFEST_FILE)).unwrap();
        assert_eq!(manifest.name, "Test Plugin");
    }

    #[test]
    fn test_read_manifest_missing() {
        let tmp = TempDir::new().unwrap();
        let err = read_manifest(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("No plugin.json found"));
    }

    #[test]
    fn test_read_manifest_malformed_json() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(MANIFEST_FILE), "{ broken json").unwrap();

        let err = read_manifest(tmp.path()).unwrap_err();
        assert!(matches!(err, PluginError::ManifestInvalid(_)));
        assert!(err.to_string().contains("Malformed"));
    }

    #[test]
    fn test_read_manifest_missing_required_field() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(MANIFEST_FILE),
            r#"{ "id": "x", "name": "X", "version": "1.0.0", "type": "widget" }"#,
        )
        .unwrap();

        let err = read_manifest(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("author"));
    }

    // ---- discover_manifests tests ----

    #[test]
    fn test_discover_with_valid_plugins() {
        let tmp = TempDir::new().unwrap();

        let notes_dir = tmp.path().join("notes");
        fs::create_dir(&notes_dir).unwrap();
        let mut m1 = valid_manifest();
        m1.id = "notes".to_string();
        write_plugin_json(&notes_dir, &m1);

        let weather_dir = tmp.path().join("weather");
        fs::create_dir(&weather_dir).unwrap();
        let mut m2 = valid_manifest();
        m2.id = "weather".to_string();
        write_plugin_json(&weather_dir, &m2);

        let found = discover_manifests(&[tmp.path().to_path_buf()]).unwrap();
        let ids: Vec<&str> = found.iter().map(|p| p.manifest.id.as_str()).collect();
        assert_eq!(ids, vec!["notes", "weather"]);
        assert_eq!(found[0].path, notes_dir);
    }

    #[test]
    fn test_discover_nonexistent_directory() {
        let found = discover_manifests(&[PathBuf::from("/nonexistent/path/plugins")]).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_discover_skips_files_and_empty_dirs() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("not-a-dir.txt"), "hello").unwrap();
        fs::create_dir(tmp.path().join("empty-dir")).unwrap();

        let found = discover_manifests(&[tmp.path().to_path_buf()]).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_discover_skips_invalid_plugins() {
        let tmp = TempDir::new().unwrap();

        let valid_dir = tmp.path().join("valid-plugin");
        fs::create_dir(&valid_dir).unwrap();
        write_plugin_json(&valid_dir, &valid_manifest());

        let invalid_dir = tmp.path().join("invalid-plugin");
        fs::create_dir(&invalid_dir).unwrap();
        fs::write(invalid_dir.join(MANIFEST_FILE), "{ broken json").unwrap();

        let found = discover_manifests(&[tmp.path().to_path_buf()]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].manifest.id, "test-plugin");
    }
}
