use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::Episode;
use crate::error::{Result, SnaError};

/// Episodes gathered from a file or a directory of `episode_*.json` files.
#[derive(Debug, Clone, Default)]
pub struct LoadedBatch {
    pub episodes: Vec<Episode>,
    /// Files that contributed at least one episode.
    pub files_loaded: usize,
    /// Unreadable or malformed files, with the reason they were skipped.
    pub skipped: Vec<(PathBuf, String)>,
    /// Files whose bytes matched an already loaded file.
    pub duplicates: usize,
    /// True when the input was one file holding exactly one episode object.
    pub single_episode: bool,
}

/// Parse episode JSON in any of the accepted shapes.
///
/// - a single episode object
/// - an object with an `"episodes"` array
/// - a bare array of episode objects
///
/// Array elements that are not usable episode objects are skipped with a
/// warning; a top-level value of any other kind is an error.
pub fn parse_episodes(content: &str, origin: &str) -> Result<Vec<Episode>> {
    episodes_from_value(serde_json::from_str(content)?, origin)
}

/// True for a top-level episode object (not an `"episodes"` wrapper).
fn is_single_object(value: &JsonValue) -> bool {
    matches!(value, JsonValue::Object(map) if !map.contains_key("episodes"))
}

fn episodes_from_value(value: JsonValue, origin: &str) -> Result<Vec<Episode>> {
    let items = match value {
        JsonValue::Object(mut map) => match map.remove("episodes") {
            Some(JsonValue::Array(items)) => items,
            Some(_) => {
                return Err(SnaError::Parse(format!(
                    "{}: \"episodes\" must be an array",
                    origin
                )))
            }
            None => return Ok(vec![serde_json::from_value(JsonValue::Object(map))?]),
        },
        JsonValue::Array(items) => items,
        other => {
            return Err(SnaError::Parse(format!(
                "{}: expected an episode object or array, found {}",
                origin,
                json_kind(&other)
            )))
        }
    };

    let mut episodes = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            log::warn!("{}: skipping entry {} ({} is not an episode)", origin, index, json_kind(&item));
            continue;
        }
        match serde_json::from_value::<Episode>(item) {
            Ok(episode) => episodes.push(episode),
            Err(e) => log::warn!("{}: skipping entry {}: {}", origin, index, e),
        }
    }
    Ok(episodes)
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Load every episode from one JSON file.
pub fn load_episodes(path: &Path) -> Result<Vec<Episode>> {
    let content = std::fs::read_to_string(path)?;
    parse_episodes(&content, &path.display().to_string())
}

/// Find `episode_*.json` files below `root`, sorted by path.
pub fn discover_episode_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(SnaError::InvalidInput(format!(
            "Not a directory: {}",
            root.display()
        )));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_episode_file(path))
        .collect();
    files.sort();

    log::info!("Discovered {} episode files in {}", files.len(), root.display());
    Ok(files)
}

fn is_episode_file(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };
    name.starts_with("episode_")
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
}

/// Load a file or a directory of episode files.
///
/// A directory is scanned for `episode_*.json`; files that fail to read or
/// parse are logged and skipped, and byte-identical files load once.
/// Directory results are ordered by episode number. A file input that fails
/// to parse is an error.
pub fn load_batch(path: &Path) -> Result<LoadedBatch> {
    if path.is_file() {
        let content = std::fs::read_to_string(path)?;
        let value: JsonValue = serde_json::from_str(&content)?;
        let single_episode = is_single_object(&value);
        let episodes = episodes_from_value(value, &path.display().to_string())?;
        if episodes.is_empty() {
            return Err(SnaError::NoEpisodes(path.display().to_string()));
        }
        return Ok(LoadedBatch {
            files_loaded: 1,
            single_episode: single_episode && episodes.len() == 1,
            episodes,
            ..LoadedBatch::default()
        });
    }

    if !path.exists() {
        return Err(SnaError::InvalidInput(format!(
            "Input not found: {}",
            path.display()
        )));
    }

    let mut batch = LoadedBatch::default();
    let mut seen_hashes = HashSet::new();

    for file in discover_episode_files(path)? {
        let bytes = match std::fs::read(&file) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Skipping {}: {}", file.display(), e);
                batch.skipped.push((file, e.to_string()));
                continue;
            }
        };

        if !seen_hashes.insert(content_hash(&bytes)) {
            log::debug!("Skipping duplicate episode file {}", file.display());
            batch.duplicates += 1;
            continue;
        }

        let parsed = String::from_utf8(bytes)
            .map_err(|e| SnaError::Parse(e.to_string()))
            .and_then(|content| parse_episodes(&content, &file.display().to_string()));
        match parsed {
            Ok(episodes) if !episodes.is_empty() => {
                batch.files_loaded += 1;
                batch.episodes.extend(episodes);
            }
            Ok(_) => {
                log::warn!("Skipping {}: no episodes", file.display());
                batch.skipped.push((file, "no episodes".to_string()));
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", file.display(), e);
                batch.skipped.push((file, e.to_string()));
            }
        }
    }

    if batch.episodes.is_empty() {
        return Err(SnaError::NoEpisodes(path.display().to_string()));
    }

    // Path order puts episode_10 before episode_2
    batch.episodes.sort_by_key(|ep| ep.episode);

    log::info!(
        "Loaded {} episodes from {} files ({} skipped, {} duplicates)",
        batch.episodes.len(),
        batch.files_loaded,
        batch.skipped.len(),
        batch.duplicates
    );
    Ok(batch)
}

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn episode_json(number: i64) -> String {
        format!(
            r#"{{"episode": {}, "winCondition": "party", "agentIds": ["Boss"], "agentClassValues": ["Boss"], "actions": []}}"#,
            number
        )
    }

    #[test]
    fn test_parse_single_object() {
        let episodes = parse_episodes(&episode_json(3), "inline").unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].episode, 3);
    }

    #[test]
    fn test_parse_episodes_wrapper_and_bare_array() {
        let wrapped = format!(r#"{{"episodes": [{}, {}]}}"#, episode_json(1), episode_json(2));
        assert_eq!(parse_episodes(&wrapped, "inline").unwrap().len(), 2);

        let bare = format!("[{}, 42, {}]", episode_json(1), episode_json(2));
        // The number is skipped, not fatal
        assert_eq!(parse_episodes(&bare, "inline").unwrap().len(), 2);
    }

    #[test]
    fn test_parse_rejects_scalars_and_bad_json() {
        assert!(matches!(parse_episodes("\"hello\"", "inline"), Err(SnaError::Parse(_))));
        assert!(matches!(parse_episodes("{oops", "inline"), Err(SnaError::Json(_))));
        assert!(matches!(
            parse_episodes(r#"{"episodes": 5}"#, "inline"),
            Err(SnaError::Parse(_))
        ));
    }

    #[test]
    fn test_discover_episode_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("run2")).unwrap();
        fs::write(root.join("episode_1.json"), episode_json(1)).unwrap();
        fs::write(root.join("run2/episode_2.JSON"), episode_json(2)).unwrap();
        fs::write(root.join("summary.json"), "{}").unwrap();
        fs::write(root.join("episode_3.txt"), "nope").unwrap();

        let files = discover_episode_files(root).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("episode_")));
    }

    #[test]
    fn test_load_batch_directory_skips_and_dedupes() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("episode_10.json"), episode_json(10)).unwrap();
        fs::write(root.join("episode_2.json"), episode_json(2)).unwrap();
        fs::write(root.join("episode_2_copy.json"), episode_json(2)).unwrap();
        fs::write(root.join("episode_bad.json"), "{not json").unwrap();

        let batch = load_batch(root).unwrap();
        assert_eq!(batch.episodes.len(), 2);
        assert_eq!(batch.duplicates, 1);
        assert_eq!(batch.skipped.len(), 1);
        assert!(!batch.single_episode);
        // Sorted numerically, not by path
        assert_eq!(batch.episodes[0].episode, 2);
        assert_eq!(batch.episodes[1].episode, 10);
    }

    #[test]
    fn test_load_batch_single_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("episode_1.json");
        fs::write(&path, episode_json(1)).unwrap();

        let batch = load_batch(&path).unwrap();
        assert!(batch.single_episode);
        assert_eq!(batch.files_loaded, 1);
    }

    #[test]
    fn test_load_batch_file_shapes() {
        let temp_dir = TempDir::new().unwrap();
        let wrapped = temp_dir.path().join("wrapped.json");
        fs::write(&wrapped, format!(r#"{{"episodes": [{}]}}"#, episode_json(3))).unwrap();
        let bare = temp_dir.path().join("bare.json");
        fs::write(&bare, format!("[{}]", episode_json(4))).unwrap();
        let broken = temp_dir.path().join("broken.json");
        fs::write(&broken, "{not json").unwrap();

        // One episode in a container is still a batch
        let batch = load_batch(&wrapped).unwrap();
        assert_eq!(batch.episodes[0].episode, 3);
        assert!(!batch.single_episode);
        assert!(!load_batch(&bare).unwrap().single_episode);
        assert!(matches!(load_batch(&broken), Err(SnaError::Json(_))));
    }

    #[test]
    fn test_load_batch_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(load_batch(temp_dir.path()), Err(SnaError::NoEpisodes(_))));
        assert!(matches!(
            load_batch(&temp_dir.path().join("missing")),
            Err(SnaError::InvalidInput(_))
        ));
    }
}
