//! Project-wide settings.

use serde::{Deserialize, Serialize};

/// Settings consulted by editing operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Language code used to render block labels.
    pub language: String,
    /// Offset between slot contents displaced by a refresh and the script
    /// they came from.
    pub relocation_offset: (f64, f64),
    /// Whether the palette host is told to refresh after structural changes.
    pub refresh_palette: bool,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        ProjectSettings {
            language: "en".to_string(),
            relocation_offset: (20.0, 20.0),
            refresh_palette: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: ProjectSettings = serde_json::from_str(r#"{"language":"de"}"#).unwrap();
        assert_eq!(settings.language, "de");
        assert_eq!(settings.relocation_offset, (20.0, 20.0));
        assert!(settings.refresh_palette);
    }
}
