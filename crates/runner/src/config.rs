//! Annealing configuration files.
//!
//! A config file holds an [`AnnealConfig`] in TOML or JSON, chosen by file
//! extension (`.json` is JSON, anything else TOML). Missing fields take their
//! defaults, so a file may set only what it changes:
//!
//! ```toml
//! t_max = 0.001
//! n_steps = 40
//! cooling = "linear"
//!
//! [moves]
//! translate_sigma = 0.3
//! ```

use std::path::Path;
use thiserror::Error;
use treepack_core::AnnealConfig;

/// Errors from loading or saving configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] treepack_core::Error),
}

/// Config file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Format implied by a path's extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

/// Parses and validates a config from text.
pub fn parse_config(text: &str, format: ConfigFormat) -> Result<AnnealConfig, ConfigError> {
    let config: AnnealConfig = match format {
        ConfigFormat::Toml => toml::from_str(text)?,
        ConfigFormat::Json => serde_json::from_str(text)?,
    };
    config.validate()?;
    Ok(config)
}

/// Renders a config as text.
pub fn render_config(config: &AnnealConfig, format: ConfigFormat) -> Result<String, ConfigError> {
    Ok(match format {
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
    })
}

/// Loads and validates a config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AnnealConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let config = parse_config(&text, ConfigFormat::from_path(path))?;
    log::debug!("loaded annealing config from {}", path.display());
    Ok(config)
}

/// Writes a config file in the format implied by its extension.
pub fn save_config<P: AsRef<Path>>(config: &AnnealConfig, path: P) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let text = render_config(config, ConfigFormat::from_path(path))?;
    std::fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use treepack_core::CoolingSchedule;

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("a.JSON")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("config")), ConfigFormat::Toml);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let text = "t_max = 0.001\nn_steps = 40\ncooling = \"linear\"\n\n\
                    [moves]\ntranslate_sigma = 0.3\n";
        let config = parse_config(text, ConfigFormat::Toml).unwrap();
        let defaults = AnnealConfig::default();

        assert_eq!(config.t_max, 0.001);
        assert_eq!(config.n_steps, 40);
        assert_eq!(config.cooling, CoolingSchedule::Linear);
        assert_eq!(config.moves.translate_sigma, 0.3);
        assert_eq!(config.t_min, defaults.t_min);
        assert_eq!(config.moves.levy_exponent, defaults.moves.levy_exponent);
    }

    #[test]
    fn test_polynomial_schedule_json() {
        let text = r#"{ "cooling": { "polynomial": { "degree": 2.0 } }, "seed": 9 }"#;
        let config = parse_config(text, ConfigFormat::Json).unwrap();
        assert_eq!(config.cooling, CoolingSchedule::Polynomial { degree: 2.0 });
        assert_eq!(config.seed, 9);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let text = "t_max = 0.00001\nt_min = 0.001\n";
        assert!(matches!(
            parse_config(text, ConfigFormat::Toml),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse_config("n_steps = \"ten\"", ConfigFormat::Toml),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn test_render_then_parse_defaults() {
        let defaults = AnnealConfig::default();
        for format in [ConfigFormat::Toml, ConfigFormat::Json] {
            let text = render_config(&defaults, format).unwrap();
            assert_eq!(parse_config(&text, format).unwrap(), defaults);
        }
    }
}
