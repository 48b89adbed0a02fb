use anyhow::{Context, Result};

use std::fs;
use std::path::{Path, PathBuf};

use crate::image::Preprocess;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub preprocess: Preprocess,
    // graph node fed with the image tensor, the graph's first input when unset
    pub input_node: Option<String>,
    // graph node read for probabilities, the graph's first output when unset
    pub output_node: Option<String>,
    pub top_k: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            preprocess: Preprocess::default(),
            input_node: None,
            output_node: None,
            top_k: 5,
        }
    }
}

impl ClassifierConfig {
    pub fn load() -> Option<Self> {
        let config_path = Self::config_path()?;
        Self::load_valid(&config_path)
    }

    /// Settings from `path`, or `None` when missing, unparsable or invalid
    fn load_valid(path: &Path) -> Option<Self> {
        fs::read_to_string(path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .filter(|config: &Self| config.validate().is_ok())
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Option<()> {
        let config_path = Self::config_path()?;
        self.save_to(config_path).ok()
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }

    #[allow(deprecated)]
    pub fn config_path() -> Option<PathBuf> {
        let home = std::env::home_dir()?;
        Some(home.join(".config").join("visionlabel").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        self.preprocess.validate()
    }
}
