//! Recorded fix tracks for the deterministic CLI harness.
//!
//! A track is a JSON-lines file: one `PositionSample` per line, blank lines
//! and lines starting with `#` ignored. Tracks live under `fixtures/` and
//! are replayed by `rig_cli replay` and the integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::location::PositionSample;

/// Default location for fixture tracks.
pub const DEFAULT_FIXTURE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

const TRACK_EXTENSION: &str = "jsonl";

/// Metadata describing an available track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackMetadata {
    pub name: String,
    pub path: PathBuf,
}

/// Read every fix of a JSON-lines track, in file order.
pub fn load_track<P: AsRef<Path>>(path: P) -> Result<Vec<PositionSample>> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading track {}", path.display()))?;
    parse_track(&contents).with_context(|| format!("parsing {}", path.display()))
}

/// Parse JSON-lines track contents.
pub fn parse_track(contents: &str) -> Result<Vec<PositionSample>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|(idx, line)| {
            serde_json::from_str::<PositionSample>(line.trim())
                .with_context(|| format!("line {}", idx + 1))
        })
        .collect()
}

/// Catalog responsible for discovering tracks on disk.
pub struct FixtureCatalog {
    root: PathBuf,
}

impl FixtureCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List all tracks, sorted by name.
    pub fn discover(&self) -> Result<Vec<TrackMetadata>> {
        let mut tracks = Vec::new();
        if !self.root.exists() {
            return Ok(tracks);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(TRACK_EXTENSION) {
                tracks.push(TrackMetadata {
                    name: path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or_default()
                        .to_string(),
                    path,
                });
            }
        }

        tracks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tracks)
    }

    /// Load a track by name or path.
    pub fn load(&self, track: &str) -> Result<Vec<PositionSample>> {
        load_track(self.resolve(track)?)
    }

    /// Resolve a track name or path to a file on disk.
    pub fn resolve(&self, track: &str) -> Result<PathBuf> {
        let as_path = Path::new(track);
        if as_path.exists() {
            return Ok(as_path.to_path_buf());
        }

        let candidate = self.root.join(format!("{track}.{TRACK_EXTENSION}"));
        if candidate.exists() {
            Ok(candidate)
        } else {
            Err(anyhow!(
                "Track '{track}' not found in {}",
                self.root.display()
            ))
        }
    }
}

impl Default for FixtureCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_FIXTURE_ROOT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn parses_lines_and_skips_comments() {
        let contents = r#"
# recorded on the test field
{"latitude":47.0,"longitude":8.0,"horizontal_accuracy_m":3.5,"timestamp":"2026-05-02T09:30:00Z"}

{"latitude":47.1,"longitude":8.1,"horizontal_accuracy_m":-1.0,"timestamp":"2026-05-02T09:30:00.200Z"}
"#;
        let samples = parse_track(contents).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].horizontal_accuracy_m, 3.5);
        assert_eq!(
            samples[1].timestamp,
            Utc.with_ymd_and_hms(2026, 5, 2, 9, 30, 0).unwrap()
                + chrono::Duration::milliseconds(200)
        );
    }

    #[test]
    fn reports_bad_line_number() {
        let err = parse_track("{\"latitude\":1}\n").unwrap_err();
        assert!(format!("{:#}", err).contains("line 1"));
    }

    #[test]
    fn missing_track_is_an_error() {
        let catalog = FixtureCatalog::new("/nonexistent/rig_fixtures");
        assert!(catalog.discover().unwrap().is_empty());
        assert!(catalog.load("nope").is_err());
    }

    #[test]
    fn default_catalog_finds_bundled_tracks() {
        let tracks = FixtureCatalog::default().discover().unwrap();
        assert!(tracks.iter().any(|track| track.name == "center_burst"));

        let samples = FixtureCatalog::default().load("center_burst").unwrap();
        assert!(samples.len() >= 12);
    }
}
