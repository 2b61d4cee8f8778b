//! Settings file.
//!
//! Every key is optional; missing keys and a missing file fall back to the
//! defaults below.
//!
//! ```toml
//! padding = 300
//! max_padding = 2000
//! author = "reftypeset"
//! output_dir = "output"
//! primer_dir = "primers"
//! genetic_code = 1
//! latex_command = "pdflatex"
//! keep_extensions = ["pdf", "tex"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::genetic_code::GeneticCodes;
use crate::model::ModelError;

/// Default settings file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "reftypeset.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Intronic bases shown on each side of an exon
    pub padding: usize,
    pub max_padding: usize,
    /// Author written into the PDF metadata
    pub author: String,
    pub output_dir: PathBuf,
    /// Directory searched for `<gene>.csv` primer lists
    pub primer_dir: PathBuf,
    /// NCBI translation table id
    pub genetic_code: u8,
    pub latex_command: String,
    /// Extensions kept next to a compiled document
    pub keep_extensions: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            padding: 300,
            max_padding: 2000,
            author: "reftypeset".to_string(),
            output_dir: PathBuf::from("output"),
            primer_dir: PathBuf::from("primers"),
            genetic_code: 1,
            latex_command: "pdflatex".to_string(),
            keep_extensions: vec!["pdf".to_string(), "tex".to_string()],
        }
    }
}

impl Settings {
    /// Loads settings from a specific path.
    /// Returns defaults if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse settings from {}", path.display()))
        } else {
            Ok(Settings::default())
        }
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.padding > self.max_padding {
            return Err(ModelError::PaddingTooLarge {
                padding: self.padding,
                max: self.max_padding,
            }
            .into());
        }
        let codes = GeneticCodes::get_all();
        if codes.get(self.genetic_code).is_none() {
            let known: Vec<String> = codes
                .all()
                .iter()
                .map(|code| format!("{} ({})", code.id, code.name))
                .collect();
            bail!(
                "Unknown genetic code: {} (available: {})",
                self.genetic_code,
                known.join(", ")
            );
        }
        if self.latex_command.trim().is_empty() {
            bail!("latex_command must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("none.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.padding, 300);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "padding = 50\nauthor = \"Genetics Lab\"\n").unwrap();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.padding, 50);
        assert_eq!(settings.author, "Genetics Lab");
        assert_eq!(settings.max_padding, 2000);
        assert_eq!(settings.keep_extensions, vec!["pdf", "tex"]);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "padding = \"lots\"\n").unwrap();
        let err = Settings::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse settings"));
    }

    #[test]
    fn test_validate_padding_limit() {
        let settings = Settings {
            padding: 2500,
            ..Settings::default()
        };
        let err = settings.validate().unwrap_err();
        assert_eq!(
            err.downcast_ref::<ModelError>(),
            Some(&ModelError::PaddingTooLarge {
                padding: 2500,
                max: 2000
            })
        );
    }

    #[test]
    fn test_validate_genetic_code() {
        let settings = Settings {
            genetic_code: 42,
            ..Settings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("1 (Standard)"));
    }
}
