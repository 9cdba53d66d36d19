//! Loading and handling the recommender's YAML configuration.
//!
//! Every field has a default, so a partial file (or no file at all) is valid.
//!
//! ```no_run
//! use assessment_recommender::config::load_config;
//!
//! let config = load_config("/path/to/config.yaml").unwrap();
//! println!("serving {} on {}", config.index_path.display(), config.bind);
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{error::Error, fs};
use tracing::{debug, info};

use crate::artifacts::ArtifactPaths;
use crate::embedding::{EncodeOptions, ModelSource};

/// Runtime configuration for building, serving and evaluating.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct RecommenderConfig {
    /// Binary flat index file.
    pub index_path: PathBuf,

    /// JSON metadata file paired with the index.
    pub metadata_path: PathBuf,

    /// Hugging Face model id used for both build and query encoding.
    pub model_id: String,

    pub model_revision: String,

    /// Local model directory; takes precedence over the Hub when set.
    pub model_dir: Option<PathBuf>,

    pub normalize_embeddings: bool,

    pub max_sequence_length: usize,

    /// HTTP listen address.
    pub bind: String,

    /// CORS origins; `"*"` allows any.
    pub allowed_origins: Vec<String>,

    /// Echo the resolved query text as `query_used` in responses.
    pub include_query_source: bool,

    // Deadline for fetching a query URL.
    pub fetch_timeout_secs: u64,

    pub user_agent: String,

    // Load assets at server start instead of on the first request.
    pub preload: bool,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("catalog.index"),
            metadata_path: PathBuf::from("catalog_metadata.json"),
            model_id: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            model_revision: "main".to_string(),
            model_dir: None,
            normalize_embeddings: true,
            max_sequence_length: 256,
            bind: "0.0.0.0:8000".to_string(),
            allowed_origins: vec!["*".to_string()],
            include_query_source: false,
            fetch_timeout_secs: 10,
            user_agent: "Mozilla/5.0".to_string(),
            preload: false,
        }
    }
}

impl RecommenderConfig {
    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths::new(&self.index_path, &self.metadata_path)
    }

    pub fn model_source(&self) -> ModelSource {
        match &self.model_dir {
            Some(dir) => ModelSource::Local(dir.clone()),
            None => ModelSource::Hub {
                model_id: self.model_id.clone(),
                revision: self.model_revision.clone(),
            },
        }
    }

    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            normalize: self.normalize_embeddings,
            max_sequence_length: self.max_sequence_length,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

/// Loads the configuration from a YAML file.
///
/// # Errors
/// Returns an error if the file cannot be read or is not valid YAML for
/// [`RecommenderConfig`].
pub fn load_config(file: &str) -> Result<RecommenderConfig, Box<dyn Error>> {
    debug!("Loading config from {file}");
    let content = fs::read_to_string(file)?;
    let config: RecommenderConfig = serde_yaml::from_str(&content)?;
    Ok(config)
}

/// Resolve the configuration: an explicit path must exist; the default
/// location is optional and falls back to built-in defaults.
pub fn resolve_config(explicit: Option<&Path>, default_path: &Path) -> Result<RecommenderConfig, Box<dyn Error>> {
    match explicit {
        Some(path) => load_config(&path.to_string_lossy()),
        None if default_path.is_file() => load_config(&default_path.to_string_lossy()),
        None => {
            info!("No config at {}, using defaults", default_path.display());
            Ok(RecommenderConfig::default())
        }
    }
}

/// Write the default configuration to `path`, creating parent directories.
pub fn write_default_config(path: &Path) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let yaml = serde_yaml::to_string(&RecommenderConfig::default())?;
    fs::write(path, yaml)?;
    info!("Created config file: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_valid_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
index_path: "/srv/arec/catalog.index"
metadata_path: "/srv/arec/catalog_metadata.json"
model_dir: "/srv/models/minilm"
bind: "127.0.0.1:9000"
allowed_origins: ["https://frontend.example.com"]
include_query_source: true
fetch_timeout_secs: 3
"#
        )
        .unwrap();

        let config = load_config(temp_file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.bind, "127.0.0.1:9000");
        assert_eq!(config.allowed_origins, vec!["https://frontend.example.com"]);
        assert!(config.include_query_source);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(3));
        assert_eq!(config.model_source(), ModelSource::Local(PathBuf::from("/srv/models/minilm")));
        assert_eq!(
            config.artifact_paths(),
            ArtifactPaths::new("/srv/arec/catalog.index", "/srv/arec/catalog_metadata.json")
        );
        // untouched fields keep their defaults
        assert_eq!(config.model_id, "sentence-transformers/all-MiniLM-L6-v2");
        assert_eq!(config.max_sequence_length, 256);
        assert!(!config.preload);
    }

    #[test]
    fn test_defaults_use_hub_model() {
        let config = RecommenderConfig::default();
        assert_eq!(
            config.model_source(),
            ModelSource::Hub {
                model_id: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
                revision: "main".to_string(),
            }
        );
        assert_eq!(config.encode_options(), EncodeOptions::default());
    }

    #[test]
    fn test_load_config_invalid_file() {
        assert!(load_config("non/existent/path").is_err());
    }

    #[test]
    fn test_load_config_invalid_format() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, r#"invalid: config: format"#).unwrap();
        assert!(load_config(temp_file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_resolve_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = resolve_config(None, &dir.path().join("config.yaml")).unwrap();
        assert_eq!(config, RecommenderConfig::default());
        assert!(resolve_config(Some(&dir.path().join("missing.yaml")), Path::new("unused")).is_err());
    }

    #[test]
    fn test_written_default_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.yaml");
        write_default_config(&path).unwrap();
        let config = resolve_config(None, &path).unwrap();
        assert_eq!(config, RecommenderConfig::default());
    }
}
