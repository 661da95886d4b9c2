use std::path::Path;

use serde::{Deserialize, Serialize};

/// Positioning strategy for a layout pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Hand the box tree to the external layered engine.
    Layered,
    /// No auto-layout: grid placements (or the origin) are kept as-is.
    /// Exists for deterministic tests and snapshot rendering.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Right,
    Down,
}

/// Whether the layered engine may see into grouping containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Hierarchy {
    IncludeChildren,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    pub algorithm: Algorithm,
    pub direction: Direction,
    /// Enables responsive span hints: children asking for wide spans get a
    /// width boost before layout.
    pub grid: bool,
    /// Spacing factor; the engine option map multiplies it out (see the
    /// adapter).
    pub spacing: Option<f32>,
    /// Container padding in px, also the grid sub-layout inset.
    pub padding: Option<f32>,
    pub hierarchy: Hierarchy,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            algorithm: Algorithm::Layered,
            direction: Direction::Right,
            grid: false,
            spacing: None,
            padding: None,
            hierarchy: Hierarchy::IncludeChildren,
        }
    }
}

impl LayoutConfig {
    /// Spacing between layers in px: `(spacing ?? 2) * 60`.
    pub fn layer_spacing(&self) -> f32 {
        self.spacing.unwrap_or(2.0) * 60.0
    }

    /// Uniform container padding in px.
    pub fn container_padding(&self) -> f32 {
        self.padding.unwrap_or(56.0)
    }
}

/// Load a layout config file for the CLI. Strict JSON is tried first, then
/// JSON5 for hand-written files with comments or trailing commas.
pub fn load_layout_config(path: Option<&Path>) -> anyhow::Result<LayoutConfig> {
    let Some(path) = path else {
        return Ok(LayoutConfig::default());
    };
    let contents = std::fs::read_to_string(path)?;
    if let Ok(config) = serde_json::from_str::<LayoutConfig>(&contents) {
        return Ok(config);
    }
    let config = json5::from_str::<LayoutConfig>(&contents)?;
    Ok(config)
}
