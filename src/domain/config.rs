use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Configuration for a conversion run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "Versions")]
pub struct Config {
    /// The tag that starts the precondition section of a note.
    ///
    /// Matched case-insensitively. Everything after it, up to the end of the
    /// note, is treated as the test case's preconditions.
    precondition_marker: String,

    /// A TestLink requirement specification XML file.
    ///
    /// Test cases whose `doc_id` matches a requirement in this file are
    /// linked to it in the generated XML.
    pub requirements: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            precondition_marker: default_precondition_marker(),
            requirements: None,
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Returns the precondition marker.
    #[must_use]
    pub fn precondition_marker(&self) -> &str {
        &self.precondition_marker
    }

    /// Sets the precondition marker.
    ///
    /// An empty marker is ignored and the current marker is kept.
    pub fn set_precondition_marker(&mut self, marker: impl Into<String>) {
        let marker = marker.into();
        if !marker.trim().is_empty() {
            self.precondition_marker = marker;
        }
    }
}

fn default_precondition_marker() -> String {
    "[PRECONDITIONS]".to_string()
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_precondition_marker")]
        precondition_marker: String,

        #[serde(default)]
        requirements: Option<PathBuf>,
    },
}

impl From<Versions> for super::Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                precondition_marker,
                requirements,
            } => {
                let mut config = Self {
                    requirements,
                    ..Self::default()
                };
                config.set_precondition_marker(precondition_marker);
                config
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"_version = \"1\"\nprecondition_marker = \"[PRE]\"\nrequirements = \"reqs.xml\"\n",
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.precondition_marker(), "[PRE]");
        assert_eq!(config.requirements, Some(PathBuf::from("reqs.xml")));
    }

    #[test]
    fn load_missing_file_returns_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.toml");

        let error = Config::load(&missing).unwrap_err();
        assert!(error.starts_with("Failed to read config file:"));
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"_version = \"1\"\nprecondition_marker = 3\n")
            .unwrap();

        let error = Config::load(file.path()).unwrap_err();
        assert!(error.starts_with("Failed to parse config file:"));
    }

    #[test]
    fn empty_file_returns_default() {
        let expected = Config::default();
        let actual: Config = toml::from_str(r#"_version = "1""#).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn blank_marker_falls_back_to_default() {
        let actual: Config =
            toml::from_str("_version = \"1\"\nprecondition_marker = \"  \"\n").unwrap();
        assert_eq!(actual.precondition_marker(), "[PRECONDITIONS]");
    }
}
