use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use config::{Config as ConfigLib, ConfigError, Environment, File};
use eid_card::{CardKind, CardProfile, CardVariant, FilePaths, OuterAidLayout};
use serde::Deserialize;

/// Base name of the settings file looked up in the working directory
const DEFAULT_CONFIG_NAME: &str = "eid-reader";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Reader to use instead of the first one reported by PC/SC
    #[serde(default)]
    pub reader: Option<String>,
    pub card: CardKind,
    /// Overrides the default file paths of the card kind
    #[serde(default)]
    pub files: Option<FilePaths>,
    /// Overrides the SELECT response layout of outer-AID cards
    #[serde(default)]
    pub outer_aid: Option<OuterAidLayout>,
    pub verbose: bool,
    #[serde(default)]
    pub wait_timeout_secs: Option<u64>,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_sources(path, None)
    }

    pub fn load_with_sources(
        path: Option<&Path>,
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("card", "apollo")?
            .set_default("verbose", false)?;

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_NAME).required(false)),
        };

        // Explicit overrides keep tests independent of the process environment
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // EID_READER, EID_CARD, EID_FILES__PHOTO, EID_OUTER_AID__SELECT_LE ...
            builder = builder.add_source(
                Environment::with_prefix("EID")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Card profile for the configured card kind with overrides applied
    pub fn profile(&self) -> CardProfile {
        let mut profile = CardProfile::for_kind(self.card);
        if let Some(files) = &self.files {
            profile.files = files.clone();
        }
        if let Some(layout) = self.outer_aid {
            profile.variant = CardVariant::OuterAid(layout);
        }
        profile
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_secs.map(Duration::from_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.profile().validate().map_err(ConfigError::Message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::load_with_sources(None, Some(HashMap::new()))
            .expect("Failed to load config");

        assert_eq!(config.card, CardKind::Apollo);
        assert!(config.reader.is_none());
        assert!(!config.verbose);
        assert_eq!(config.wait_timeout(), None);
        assert_eq!(config.profile(), CardProfile::apollo());
    }

    #[test]
    fn test_env_config() {
        let env_vars = vars(&[
            ("card", "gemalto"),
            ("reader", "ACS ACR38U 00 00"),
            ("wait_timeout_secs", "30"),
        ]);

        let config =
            AppConfig::load_with_sources(None, Some(env_vars)).expect("Failed to load config");

        assert_eq!(config.card, CardKind::Gemalto);
        assert_eq!(config.reader.as_deref(), Some("ACS ACR38U 00 00"));
        assert_eq!(config.wait_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.profile(), CardProfile::gemalto());
    }

    #[test]
    fn test_file_overrides_paths_and_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reader.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
card = "gemalto"

[files]
photo = "0F07"

[outer_aid]
strip_inner_tag = true
"#
        )
        .unwrap();

        let config = AppConfig::load_with_sources(Some(&path), Some(HashMap::new()))
            .expect("Failed to load config");
        let profile = config.profile();

        assert_eq!(profile.files.photo, vec![0x0F, 0x07]);
        assert_eq!(profile.files.document, vec![0x0F, 0x02]);
        match profile.variant {
            CardVariant::OuterAid(layout) => {
                assert!(layout.strip_inner_tag);
                assert_eq!(layout.length_offset, 2);
            }
            CardVariant::Plain => panic!("expected outer-AID variant"),
        }
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(AppConfig::load_with_sources(Some(&path), Some(HashMap::new())).is_err());
    }

    #[test]
    fn test_short_path_rejected() {
        let env_vars = vars(&[("files.document", "0F")]);
        assert!(AppConfig::load_with_sources(None, Some(env_vars)).is_err());
    }
}
