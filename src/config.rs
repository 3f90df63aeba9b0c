use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

fn default_model() -> String {
    "llama3.2-vision".to_string()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub ollama: OllamaConfig,
    pub window: WindowConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OllamaConfig {
    pub host: String,
    #[serde(default = "default_model")]
    pub model: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ExportConfig {
    pub directory: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ollama: OllamaConfig {
                host: "http://localhost:11434".to_string(),
                model: "llama3.2-vision".to_string(),
            },
            window: WindowConfig {
                width: 700,
                height: 640,
                min_width: 400,
                min_height: 300,
            },
            export: ExportConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = Self::get_config_path();

        if config_path.exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(config) => return config,
                    Err(e) => eprintln!("Error parsing config.toml: {}. Using defaults.", e),
                },
                Err(e) => eprintln!("Error reading config.toml: {}. Using defaults.", e),
            }
        } else {
            // Create config directory if it doesn't exist
            if let Some(parent) = config_path.parent() {
                let _ = fs::create_dir_all(parent);
            }
        }

        Config::default()
    }

    pub fn get_config_path() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/askbox/config.toml")
        } else {
            PathBuf::from("config.toml")
        }
    }

    pub fn export_dir(&self) -> PathBuf {
        if let Some(dir) = &self.export.directory {
            return dir.clone();
        }
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join("Downloads")
        } else {
            PathBuf::from(".")
        }
    }
}
