// ABOUTME: Named die-roll presets and the versioned text file format that stores them.
// ABOUTME: Reads the current marker-delimited JSON records and the legacy pipe-delimited lines.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Version written by [`write_preset_file`].
pub const CURRENT_VERSION: u32 = 2;
const OLDEST_VERSION: u32 = 1;

const HEADER: &str = "__DICE__:";
const META_MARKER: &str = "«__META__»";
const PRESET_MARKER: &str = "«PRESET»";
const EOF_MARKER: &str = "«__EOF__»";

/// A saved, named die-roll specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DieRollPreset {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "DieRollSpec")]
    pub spec: String,
}

impl DieRollPreset {
    pub fn new(name: impl Into<String>, description: impl Into<String>, spec: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            spec: spec.into(),
        }
    }
}

/// Information about a preset file as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PresetMetadata {
    /// Seconds since the Unix epoch when the file was saved.
    pub timestamp: i64,
    pub date_time: String,
    pub comment: String,
    pub file_version: u32,
}

impl PresetMetadata {
    /// Metadata stamped with the current time.
    pub fn now(comment: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            timestamp: now.timestamp(),
            date_time: now.to_rfc3339(),
            comment: comment.into(),
            file_version: CURRENT_VERSION,
        }
    }
}

/// Replace the preset with the same name, or add it.
pub fn upsert_preset(presets: &mut Vec<DieRollPreset>, preset: DieRollPreset) {
    match presets.iter_mut().find(|p| p.name == preset.name) {
        Some(existing) => *existing = preset,
        None => presets.push(preset),
    }
}

/// Remove the preset with the given name. Returns whether one was removed.
pub fn remove_preset(presets: &mut Vec<DieRollPreset>, name: &str) -> bool {
    let before = presets.len();
    presets.retain(|p| p.name != name);
    presets.len() != before
}

/// Read a preset file of any supported version.
pub fn read_preset_file(path: impl AsRef<Path>) -> Result<(Vec<DieRollPreset>, PresetMetadata)> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let (presets, meta) = parse_presets(&text)?;
    tracing::info!(
        path = %path.display(),
        version = meta.file_version,
        presets = presets.len(),
        "read preset file"
    );
    Ok((presets, meta))
}

/// Write presets in the current format. The file is written to a
/// temporary sibling first and renamed into place.
pub fn write_preset_file(path: impl AsRef<Path>, presets: &[DieRollPreset], meta: &PresetMetadata) -> Result<()> {
    let path = path.as_ref();
    let text = render_presets(presets, meta)?;

    let temp_path = temp_path(path);
    fs::write(&temp_path, text)?;
    fs::rename(&temp_path, path)?;

    tracing::info!(path = %path.display(), presets = presets.len(), "wrote preset file");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Parse the contents of a preset file. Presets come back sorted by name.
pub fn parse_presets(text: &str) -> Result<(Vec<DieRollPreset>, PresetMetadata)> {
    let (header, body) = text.split_once('\n').unwrap_or((text, ""));
    let fields = header
        .trim()
        .strip_prefix(HEADER)
        .ok_or_else(|| Error::CorruptFile(format!("missing '{}' header", HEADER)))?;
    let mut fields = fields.split_whitespace();
    let version: u32 = fields
        .next()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| Error::CorruptFile("malformed version in header".to_string()))?;

    if !(OLDEST_VERSION..=CURRENT_VERSION).contains(&version) {
        return Err(Error::UnsupportedVersion(version));
    }
    let (mut presets, mut meta) = if version == OLDEST_VERSION {
        read_legacy(fields, body)?
    } else {
        read_current(body)?
    };

    meta.file_version = version;
    presets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok((presets, meta))
}

/// Render presets in the current format, sorted by name.
pub fn render_presets(presets: &[DieRollPreset], meta: &PresetMetadata) -> Result<String> {
    let meta = PresetMetadata {
        file_version: CURRENT_VERSION,
        ..meta.clone()
    };
    let mut sorted: Vec<&DieRollPreset> = presets.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut out = format!("{}{}\n", HEADER, CURRENT_VERSION);
    out.push_str(&format!("{} {}\n", META_MARKER, serde_json::to_string(&meta)?));
    for preset in sorted {
        out.push_str(&format!("{} {}\n", PRESET_MARKER, serde_json::to_string(preset)?));
    }
    out.push_str(EOF_MARKER);
    out.push('\n');
    Ok(out)
}

/// Version 1: `__DICE__:1 [<timestamp> <date>]` then `name|description|spec` lines.
fn read_legacy<'a>(
    mut header: impl Iterator<Item = &'a str>,
    body: &str,
) -> Result<(Vec<DieRollPreset>, PresetMetadata)> {
    let meta = PresetMetadata {
        timestamp: header.next().and_then(|t| t.parse().ok()).unwrap_or_default(),
        date_time: header.collect::<Vec<_>>().join(" "),
        ..Default::default()
    };

    let mut presets = Vec::new();
    for (n, line) in body.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.splitn(3, '|');
        match (fields.next(), fields.next(), fields.next()) {
            (Some(name), Some(description), Some(spec)) => {
                presets.push(DieRollPreset::new(name, description, spec))
            }
            _ => {
                return Err(Error::CorruptFile(format!(
                    "line {}: expected name|description|spec",
                    n + 2
                )))
            }
        }
    }
    Ok((presets, meta))
}

/// One `«MARKER» body` block; the body may continue over several lines.
struct Block<'a> {
    marker: &'a str,
    body: String,
}

/// Version 2: marker-delimited JSON records ending with the EOF marker.
fn read_current(body: &str) -> Result<(Vec<DieRollPreset>, PresetMetadata)> {
    let mut blocks = split_blocks(body)?.into_iter();

    let meta = match blocks.next() {
        Some(block) if block.marker == META_MARKER => serde_json::from_str(&block.body)
            .map_err(|e| Error::CorruptFile(format!("malformed metadata: {}", e)))?,
        _ => return Err(Error::CorruptFile("missing metadata record".to_string())),
    };

    let mut presets = Vec::new();
    for block in blocks {
        if block.marker != PRESET_MARKER {
            return Err(Error::CorruptFile(format!(
                "unexpected record marker {}",
                block.marker
            )));
        }
        presets.push(serde_json::from_str(&block.body)?);
    }
    Ok((presets, meta))
}

fn split_blocks(body: &str) -> Result<Vec<Block<'_>>> {
    let mut blocks = Vec::new();
    let mut current: Option<Block<'_>> = None;

    for line in body.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('«') {
            let end = trimmed
                .find('»')
                .map(|i| i + '»'.len_utf8())
                .ok_or_else(|| Error::CorruptFile(format!("malformed record prefix '{}'", line)))?;
            blocks.extend(current.take());

            let marker = &trimmed[..end];
            if marker == EOF_MARKER {
                return Ok(blocks);
            }
            current = Some(Block {
                marker,
                body: trimmed[end..].to_string(),
            });
        } else if let Some(block) = current.as_mut() {
            block.body.push('\n');
            block.body.push_str(line);
        } else if !line.trim().is_empty() {
            return Err(Error::CorruptFile("data outside of any record".to_string()));
        }
    }

    Err(Error::CorruptFile(format!("missing {} terminator", EOF_MARKER)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Vec<DieRollPreset> {
        vec![
            DieRollPreset::new("Longsword", "melee", "Attack=d20+5 | c19 | dc 15"),
            DieRollPreset::new("Fireball", "8d6 save for half", "8d6 fire"),
        ]
    }

    fn meta() -> PresetMetadata {
        PresetMetadata {
            timestamp: 1_700_000_000,
            date_time: "2023-11-14T22:13:20+00:00".to_string(),
            comment: "party presets".to_string(),
            file_version: CURRENT_VERSION,
        }
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("presets.dice");
        write_preset_file(&path, &sample(), &meta()).unwrap();

        let (presets, read_meta) = read_preset_file(&path).unwrap();
        assert_eq!(read_meta, meta());
        let names: Vec<&str> = presets.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Fireball", "Longsword"]);
        assert_eq!(presets[1].spec, "Attack=d20+5 | c19 | dc 15");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_rendered_layout() {
        let text = render_presets(&sample(), &meta()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "__DICE__:2");
        assert!(lines[1].starts_with("«__META__» {\"Timestamp\":1700000000"));
        assert!(lines[2].starts_with("«PRESET» {\"Name\":\"Fireball\""));
        assert!(lines[3].contains("\"DieRollSpec\":\"Attack=d20+5 | c19 | dc 15\""));
        assert_eq!(lines[4], "«__EOF__»");
    }

    #[test]
    fn test_multiline_records() {
        let text = "__DICE__:2\n\
                    «__META__» {\"Timestamp\": 5,\n  \"Comment\": \"hand edited\"}\n\
                    «PRESET» {\n  \"Name\": \"Stab\",\n  \"DieRollSpec\": \"d4\"\n}\n\
                    «__EOF__»\n";
        let (presets, meta) = parse_presets(text).unwrap();
        assert_eq!(meta.timestamp, 5);
        assert_eq!(meta.comment, "hand edited");
        assert_eq!(presets, vec![DieRollPreset::new("Stab", "", "d4")]);
    }

    #[test]
    fn test_legacy_version() {
        let text = "__DICE__:1 1500000000 2017-07-14\n\
                    Sneak|rogue sneak attack|d20+7|c\n\
                    \n\
                    Bite|wolf|d6+1\n";
        let (presets, meta) = parse_presets(text).unwrap();
        assert_eq!(meta.file_version, 1);
        assert_eq!(meta.timestamp, 1_500_000_000);
        assert_eq!(meta.date_time, "2017-07-14");
        assert_eq!(presets[0], DieRollPreset::new("Bite", "wolf", "d6+1"));
        assert_eq!(presets[1].spec, "d20+7|c");
    }

    #[test]
    fn test_legacy_bad_line() {
        assert!(matches!(
            parse_presets("__DICE__:1\nonly|two\n"),
            Err(Error::CorruptFile(_))
        ));
    }

    #[test]
    fn test_unsupported_versions() {
        assert!(matches!(parse_presets("__DICE__:0\n"), Err(Error::UnsupportedVersion(0))));
        assert!(matches!(parse_presets("__DICE__:3\n"), Err(Error::UnsupportedVersion(3))));
    }

    #[test]
    fn test_corrupt_files() {
        let cases = [
            "",
            "PRESETS v2\n",
            "__DICE__:x\n",
            "__DICE__:2\n«__META__» {}\n«PRESET» {\"Name\":\"a\",\"DieRollSpec\":\"d4\"}\n",
            "__DICE__:2\n«PRESET» {\"Name\":\"a\",\"DieRollSpec\":\"d4\"}\n«__EOF__»\n",
            "__DICE__:2\n«__META__» {}\n«OTHER» {}\n«__EOF__»\n",
            "__DICE__:2\n«__META__\n«__EOF__»\n",
            "__DICE__:2\nstray\n«__META__» {}\n«__EOF__»\n",
            "__DICE__:2\n«__META__» {\"Timestamp\":\n«__EOF__»\n",
        ];
        for text in cases {
            assert!(matches!(parse_presets(text), Err(Error::CorruptFile(_))), "{:?}", text);
        }
    }

    #[test]
    fn test_malformed_preset_record() {
        let text = "__DICE__:2\n«__META__» {}\n«PRESET» {\"Name\": 3}\n«__EOF__»\n";
        assert!(matches!(parse_presets(text), Err(Error::Json(_))));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            read_preset_file(dir.path().join("nope.dice")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_upsert_and_remove() {
        let mut presets = sample();
        upsert_preset(&mut presets, DieRollPreset::new("Fireball", "upcast", "9d6 fire"));
        assert_eq!(presets.len(), 2);
        assert_eq!(presets[1].spec, "9d6 fire");
        upsert_preset(&mut presets, DieRollPreset::new("Dagger", "", "d4"));
        assert_eq!(presets.len(), 3);

        assert!(remove_preset(&mut presets, "Longsword"));
        assert!(!remove_preset(&mut presets, "Longsword"));
        assert_eq!(presets.len(), 2);
    }

    #[test]
    fn test_metadata_now() {
        let meta = PresetMetadata::now("saved");
        assert!(meta.timestamp > 1_600_000_000);
        assert_eq!(meta.file_version, CURRENT_VERSION);
        assert_eq!(meta.comment, "saved");
    }
}
