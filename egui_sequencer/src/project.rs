//! 项目文件
//!
//! 以 JSON 保存/加载序列器快照与主题名称。

use crate::error::SequencerResult;
use crate::structure::SequencerSnapshot;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const PROJECT_VERSION: &str = "1.0";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub version: String,
    #[serde(default = "default_theme")]
    pub theme: String,
    pub snapshot: SequencerSnapshot,
}

fn default_theme() -> String {
    "default".to_string()
}

impl ProjectFile {
    pub fn new(snapshot: SequencerSnapshot, theme: &str) -> Self {
        Self {
            version: PROJECT_VERSION.to_string(),
            theme: theme.to_string(),
            snapshot,
        }
    }

    /// 保存到指定路径，父目录不存在时自动创建
    pub fn save_to_path(&self, path: &Path) -> SequencerResult<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let json_content = serde_json::to_string_pretty(self)?;
        fs::write(path, json_content)?;
        log::info!("saved {} notes to {}", self.snapshot.notes.len(), path.display());
        Ok(())
    }

    /// 从指定路径加载；越界的数值会被修正
    pub fn load_from_path(path: &Path) -> SequencerResult<Self> {
        let json_content = fs::read_to_string(path)?;
        let mut project: ProjectFile = serde_json::from_str(&json_content)?;
        if project.version != PROJECT_VERSION {
            log::warn!("project version {} differs from {}", project.version, PROJECT_VERSION);
        }
        let fixes = project.snapshot.sanitize();
        if fixes > 0 {
            log::warn!("{fixes} out-of-range values fixed while loading {}", path.display());
        }
        log::info!("loaded {} notes from {}", project.snapshot.notes.len(), path.display());
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SequencerError;
    use crate::structure::NoteRecord;

    fn scratch_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("egui_sequencer_{}_{}", std::process::id(), fastrand::u32(..)))
            .join(name)
    }

    #[test]
    fn project_round_trips_through_disk() {
        let mut snapshot = SequencerSnapshot::default();
        snapshot.notes.push(NoteRecord {
            time: 1.5,
            pitch: 61,
            duration: 2.0,
            velocity: 90,
        });
        snapshot.selected = vec![0];
        let project = ProjectFile::new(snapshot, "live");

        let path = scratch_path("song.json");
        project.save_to_path(&path).unwrap();
        let loaded = ProjectFile::load_from_path(&path).unwrap();
        assert_eq!(loaded, project);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn loading_fixes_out_of_range_values() {
        let path = scratch_path("broken.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let json = r#"{
            "version": "1.0",
            "snapshot": {
                "notes": [{ "time": -4.0, "pitch": 200, "duration": 1.0, "velocity": 10 }],
                "signature": { "upper": 4, "lower": 4 },
                "length": 16.0,
                "visible_time_range": { "start": 0.0, "end": 64.0 },
                "vertical_range": { "start": 0.0, "end": 127.0 },
                "selected": [3]
            }
        }"#;
        fs::write(&path, json).unwrap();

        let project = ProjectFile::load_from_path(&path).unwrap();
        assert_eq!(project.theme, "default");
        let note = project.snapshot.notes[0];
        assert_eq!((note.time, note.pitch), (0.0, 127));
        assert!(project.snapshot.selected.is_empty());
        assert_eq!(project.snapshot.visible_time_range.end, 16.0);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_or_malformed_files_are_errors() {
        let path = scratch_path("missing.json");
        assert!(matches!(ProjectFile::load_from_path(&path), Err(SequencerError::Io(_))));

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(ProjectFile::load_from_path(&path), Err(SequencerError::Json(_))));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
