use log::warn;
use nih_plug::prelude::Enum;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// LOUDNESS TARGET PRESETS
// =============================================================================

/// Delivery standards the target level can be locked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[repr(usize)]
pub enum LevelPreset {
    #[serde(rename = "Custom")]
    #[name = "Custom"]
    Custom,
    #[serde(rename = "EBU R128")]
    #[name = "EBU R128"]
    EbuR128,
    #[serde(rename = "ATSC A/85")]
    #[name = "ATSC A/85"]
    AtscA85,
    #[serde(rename = "Streaming")]
    #[name = "Streaming"]
    Streaming,
    #[serde(rename = "Podcast")]
    #[name = "Podcast"]
    Podcast,
}

impl LevelPreset {
    pub fn all_presets() -> [LevelPreset; 5] {
        [
            LevelPreset::Custom,
            LevelPreset::EbuR128,
            LevelPreset::AtscA85,
            LevelPreset::Streaming,
            LevelPreset::Podcast,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            LevelPreset::Custom => "Custom",
            LevelPreset::EbuR128 => "EBU R128",
            LevelPreset::AtscA85 => "ATSC A/85",
            LevelPreset::Streaming => "Streaming",
            LevelPreset::Podcast => "Podcast",
        }
    }

    /// Values used when the baked-in table is unavailable.
    pub fn builtin(&self) -> Option<LevelPresetValues> {
        let (level, deviation) = match self {
            LevelPreset::Custom => return None,
            LevelPreset::EbuR128 => (-23.0, 1.0),
            LevelPreset::AtscA85 => (-24.0, 2.0),
            LevelPreset::Streaming => (-14.0, 1.0),
            LevelPreset::Podcast => (-16.0, 1.0),
        };
        Some(LevelPresetValues { level, deviation })
    }
}

impl Default for LevelPreset {
    fn default() -> Self {
        LevelPreset::Custom
    }
}

/// Level (LUFS) and deviation (dB) a preset locks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelPresetValues {
    pub level: f32,
    pub deviation: f32,
}

#[derive(Debug)]
pub struct PresetManager {
    presets: HashMap<String, LevelPresetValues>,
}

impl PresetManager {
    /// Load presets from baked-in JSON. This is fallible but non-fatal:
    /// on a parse error the built-in table is used.
    pub fn new() -> Self {
        Self::from_json(include_str!("../presets.json"))
    }

    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str::<HashMap<String, LevelPresetValues>>(json) {
            Ok(presets) => Self { presets },
            Err(e) => {
                warn!("level presets: {e}, using built-in values");
                Self::default()
            }
        }
    }

    /// Level and deviation for `preset`; `None` for Custom.
    pub fn values(&self, preset: LevelPreset) -> Option<LevelPresetValues> {
        if preset == LevelPreset::Custom {
            return None;
        }
        self.presets
            .get(preset.name())
            .copied()
            .or_else(|| preset.builtin())
    }
}

impl Default for PresetManager {
    fn default() -> Self {
        let presets = LevelPreset::all_presets()
            .iter()
            .filter_map(|p| p.builtin().map(|v| (p.name().to_string(), v)))
            .collect();
        Self { presets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baked_in_table_matches_builtin() {
        let pm = PresetManager::new();
        for p in LevelPreset::all_presets() {
            assert_eq!(pm.values(p), p.builtin(), "{}", p.name());
        }
    }

    #[test]
    fn test_custom_has_no_values() {
        assert_eq!(PresetManager::new().values(LevelPreset::Custom), None);
    }

    #[test]
    fn test_malformed_json_falls_back() {
        let pm = PresetManager::from_json("{ not json");
        assert_eq!(
            pm.values(LevelPreset::Streaming).map(|v| v.level),
            Some(-14.0)
        );
    }

    #[test]
    fn test_missing_entry_falls_back() {
        let pm = PresetManager::from_json(r#"{ "EBU R128": { "level": -23.0, "deviation": 1.0 } }"#);
        assert_eq!(pm.values(LevelPreset::Podcast).map(|v| v.level), Some(-16.0));
    }
}
