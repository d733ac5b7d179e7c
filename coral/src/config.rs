use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::cache::{PdfTextCache, PdfToText, DEFAULT_EXTRACTOR};
use crate::errors::{SearchError, SearchResult};

/// Settings shared by every search, loaded from YAML.
///
/// # Configuration Locations
///
/// Files are merged in this order, later ones overriding earlier ones:
/// 1. Global `<config dir>/coral/config.yaml`
/// 2. Local `.coral.yaml` in the current directory
/// 3. A file given with `--config`
///
/// Missing global and local files are skipped. Command-line flags are applied last
/// through [`CoralConfig::merge_with_cli`].
///
/// # Configuration Format
///
/// ```yaml
/// search:
///   # Globs matched against each file name; empty means every file
///   included: ["*.md", "*.pdf"]
///   # Globs matched against full paths; matching directories are not descended
///   excluded: ["*/node_modules", "*/.git"]
///   follow_links: false
///
/// cache:
///   # Defaults to <cache dir>/coral/pdf-text
///   dir: "/var/tmp/coral-pdf"
///   extractor: "pdftotext"
///
/// viewer:
///   text_command: "code"
///   text_extensions: ["txt", "md", "rs"]
///
/// thread_count: 4
/// log_level: "info"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoralConfig {
    #[serde(default)]
    pub search: SearchSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub viewer: ViewerSettings,

    /// Threads used by the content phase. Defaults to the number of CPU cores.
    #[serde(default = "default_thread_count")]
    pub thread_count: NonZeroUsize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default)]
    pub included: Vec<String>,
    #[serde(default)]
    pub excluded: Vec<String>,
    #[serde(default)]
    pub follow_links: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_extractor")]
    pub extractor: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: None,
            extractor: default_extractor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerSettings {
    /// Program that opens text-like files
    #[serde(default = "default_text_command")]
    pub text_command: String,
    /// Extensions, without the dot, sent to `text_command`
    #[serde(default = "default_text_extensions")]
    pub text_extensions: Vec<String>,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            text_command: default_text_command(),
            text_extensions: default_text_extensions(),
        }
    }
}

/// Values given on the command line. `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub included: Option<Vec<String>>,
    pub excluded: Option<Vec<String>>,
    pub follow_links: Option<bool>,
    pub thread_count: Option<NonZeroUsize>,
    pub log_level: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub extractor: Option<PathBuf>,
}

fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_extractor() -> PathBuf {
    PathBuf::from(DEFAULT_EXTRACTOR)
}

fn default_text_command() -> String {
    "code".to_string()
}

fn default_text_extensions() -> Vec<String> {
    [
        "txt", "md", "py", "js", "html", "css", "json", "xml", "yml", "yaml", "ini", "cfg",
        "conf",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for CoralConfig {
    fn default() -> Self {
        Self {
            search: SearchSettings::default(),
            cache: CacheSettings::default(),
            viewer: ViewerSettings::default(),
            thread_count: default_thread_count(),
            log_level: default_log_level(),
        }
    }
}

impl CoralConfig {
    /// Loads configuration from the default locations
    pub fn load() -> SearchResult<Self> {
        Self::load_from(None)
    }

    /// Loads the default locations plus an explicit file, which must exist
    pub fn load_from(config_path: Option<&Path>) -> SearchResult<Self> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(SearchError::config_error(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
        }

        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("coral").join("config.yaml")),
            Some(PathBuf::from(".coral.yaml")),
            config_path.map(PathBuf::from),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Applies command-line values on top of the loaded configuration
    pub fn merge_with_cli(mut self, cli: ConfigOverrides) -> Self {
        if let Some(included) = cli.included.filter(|v| !v.is_empty()) {
            self.search.included = included;
        }
        if let Some(excluded) = cli.excluded.filter(|v| !v.is_empty()) {
            self.search.excluded = excluded;
        }
        if let Some(follow_links) = cli.follow_links {
            self.search.follow_links = follow_links;
        }
        if let Some(thread_count) = cli.thread_count {
            self.thread_count = thread_count;
        }
        if let Some(log_level) = cli.log_level {
            self.log_level = log_level;
        }
        if cli.cache_dir.is_some() {
            self.cache.dir = cli.cache_dir;
        }
        if let Some(extractor) = cli.extractor {
            self.cache.extractor = extractor;
        }
        self
    }

    /// Directory holding extracted document text
    pub fn cache_dir(&self) -> PathBuf {
        self.cache
            .dir
            .clone()
            .unwrap_or_else(PdfTextCache::default_dir)
    }

    /// Opens the document cache described by this configuration
    pub fn build_cache(&self) -> PdfTextCache {
        PdfTextCache::new(
            self.cache_dir(),
            Box::new(PdfToText::new(&self.cache.extractor)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        config_path
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let config_path = write_config(
            dir.path(),
            r#"
search:
  included: ["*.md", "*.pdf"]
  excluded: ["*/node_modules"]
  follow_links: true
cache:
  dir: "/tmp/coral-test-cache"
  extractor: "/opt/poppler/bin/pdftotext"
viewer:
  text_command: "gedit"
  text_extensions: ["txt", "rs"]
thread_count: 4
log_level: "debug"
"#,
        );

        let config = CoralConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.search.included, vec!["*.md", "*.pdf"]);
        assert_eq!(config.search.excluded, vec!["*/node_modules"]);
        assert!(config.search.follow_links);
        assert_eq!(config.cache_dir(), PathBuf::from("/tmp/coral-test-cache"));
        assert_eq!(
            config.cache.extractor,
            PathBuf::from("/opt/poppler/bin/pdftotext")
        );
        assert_eq!(config.viewer.text_command, "gedit");
        assert_eq!(config.viewer.text_extensions, vec!["txt", "rs"]);
        assert_eq!(config.thread_count, NonZeroUsize::new(4).unwrap());
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_default_values() {
        let dir = tempdir().unwrap();
        let config_path = write_config(
            dir.path(),
            r#"
search:
  excluded: ["*/.git"]
"#,
        );

        let config = CoralConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.search.excluded, vec!["*/.git"]);
        assert!(config.search.included.is_empty());
        assert!(!config.search.follow_links);
        assert_eq!(config.cache.extractor, PathBuf::from("pdftotext"));
        assert_eq!(config.viewer.text_command, "code");
        assert!(config.viewer.text_extensions.contains(&"conf".to_string()));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_merge_with_cli() {
        let mut config = CoralConfig::default();
        config.search.included = vec!["*.md".to_string()];
        config.search.excluded = vec!["*/target".to_string()];

        let merged = config.merge_with_cli(ConfigOverrides {
            excluded: Some(vec!["*/node_modules".to_string()]),
            included: Some(vec![]),
            thread_count: NonZeroUsize::new(8),
            extractor: Some(PathBuf::from("/usr/local/bin/pdftotext")),
            ..ConfigOverrides::default()
        });

        assert_eq!(merged.search.included, vec!["*.md"]); // File value (CLI empty)
        assert_eq!(merged.search.excluded, vec!["*/node_modules"]); // CLI value
        assert_eq!(merged.thread_count, NonZeroUsize::new(8).unwrap());
        assert_eq!(
            merged.cache.extractor,
            PathBuf::from("/usr/local/bin/pdftotext")
        );
        assert_eq!(merged.log_level, "warn");
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempdir().unwrap();
        let config_path = write_config(
            dir.path(),
            r#"
search:
  excluded: 12
thread_count: "invalid"
"#,
        );

        let result = CoralConfig::load_from(Some(&config_path));
        assert!(matches!(result, Err(SearchError::ConfigError(_))));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = CoralConfig::load_from(Some(Path::new("nonexistent.yaml")));
        assert!(matches!(result, Err(SearchError::ConfigError(_))));
    }
}
