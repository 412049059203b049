use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Archivo de configuración buscado en el directorio actual si no se pasa `--config`
pub const DEFAULT_CONFIG_FILE: &str = "signspeak.toml";

/// Configuración del servicio (lee signspeak.toml)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    #[serde(default = "default_scaler_path")]
    pub scaler_path: PathBuf,
    #[serde(default = "default_label_encoder_path")]
    pub label_encoder_path: PathBuf,
    #[serde(default = "default_dataset_dir")]
    pub dataset_dir: PathBuf,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_model_path() -> PathBuf { PathBuf::from("landmark_mlp.onnx") }
fn default_scaler_path() -> PathBuf { PathBuf::from("landmark_scaler.json") }
fn default_label_encoder_path() -> PathBuf { PathBuf::from("label_encoder.json") }
fn default_dataset_dir() -> PathBuf { PathBuf::from("dataset") }
fn default_workers() -> usize { 4 }

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            scaler_path: default_scaler_path(),
            label_encoder_path: default_label_encoder_path(),
            dataset_dir: default_dataset_dir(),
            workers: default_workers(),
        }
    }
}

impl ServiceConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("No se pudo leer la configuración {:?}", path))?;
        Self::from_toml(&content).with_context(|| format!("Configuración inválida en {:?}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// `--config` explícito, o `signspeak.toml` si existe, o los valores por defecto
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }
}
