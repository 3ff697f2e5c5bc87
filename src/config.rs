use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_models() -> Vec<String> {
    vec!["llama-3.2-1b".to_string(), "llava".to_string()]
}

fn default_model() -> String {
    "llama-3.2-1b".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default = "default_model")]
    pub default_model: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            base_url: default_base_url(),
            models: default_models(),
            default_model: default_model(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            width: 1000,
            height: 700,
            min_width: 600,
            min_height: 400,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            window: WindowConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = Self::get_config_path();

        if config_path.exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => return config,
                    Err(e) => eprintln!("Error parsing config.toml: {}. Using defaults.", e),
                },
                Err(e) => eprintln!("Error reading config.toml: {}. Using defaults.", e),
            }
        } else if let Some(parent) = config_path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        Config::default()
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Models offered in the picker; the default model is always included.
    pub fn model_choices(&self) -> Vec<String> {
        let mut models = self.server.models.clone();
        if !models.contains(&self.server.default_model) {
            models.insert(0, self.server.default_model.clone());
        }
        models
    }

    pub fn get_config_path() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/rag-desk/config.toml")
        } else {
            PathBuf::from("config.toml")
        }
    }

    pub fn get_config_dir() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/rag-desk")
        } else {
            PathBuf::from(".")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.server.default_model, "llama-3.2-1b");
        assert_eq!(config.window.width, 1000);
    }

    #[test]
    fn test_partial_server_section() {
        let config = Config::parse(
            r#"
            [server]
            base_url = "http://rag.local:9000"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.base_url, "http://rag.local:9000");
        assert_eq!(config.server.models, default_models());
    }

    #[test]
    fn test_partial_window_section_keeps_server() {
        let config = Config::parse(
            r#"
            [server]
            base_url = "http://rag.local:9000"

            [window]
            width = 1200
            "#,
        )
        .unwrap();
        assert_eq!(config.server.base_url, "http://rag.local:9000");
        assert_eq!(config.window.width, 1200);
        assert_eq!(config.window.height, 700);
        assert_eq!(config.window.min_width, 600);
        assert_eq!(config.window.min_height, 400);
    }

    #[test]
    fn test_default_model_added_to_choices() {
        let config = Config::parse(
            r#"
            [server]
            models = ["mistral"]
            default_model = "phi3"
            "#,
        )
        .unwrap();
        assert_eq!(config.model_choices(), vec!["phi3", "mistral"]);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::parse("[server\nbase_url = 1").is_err());
    }
}
