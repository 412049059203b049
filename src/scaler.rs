use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::gesture_classifier::ClassifierError;

/// Estadísticas de estandarización exportadas junto al modelo:
/// `{ "mean": [..], "scale": [..] }`
#[derive(Debug, Deserialize)]
struct ScalerJson {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

/// Escalador de características `(x - mean) / scale`, equivalente a un
/// StandardScaler ya ajustado. Inmutable una vez cargado.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let content = fs::read_to_string(path)?;
        let data: ScalerJson = serde_json::from_str(&content)?;
        Self::from_stats(data.mean, data.scale)
    }

    /// Construye el escalador validando que ambas estadísticas cuadren.
    /// Un `scale` de 0 se trata como 1 (característica constante en entrenamiento).
    pub fn from_stats(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ClassifierError> {
        if mean.is_empty() || mean.len() != scale.len() {
            return Err(ClassifierError::InvalidArtifact(format!(
                "scaler: mean tiene {} valores y scale {}",
                mean.len(),
                scale.len()
            )));
        }
        if mean.iter().chain(scale.iter()).any(|v| !v.is_finite()) {
            return Err(ClassifierError::InvalidArtifact(
                "scaler: estadísticas no finitas".to_string(),
            ));
        }

        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();

        Ok(Self { mean, scale })
    }

    /// Escalador que no modifica la entrada
    pub fn identity(n_features: usize) -> Self {
        Self {
            mean: vec![0.0; n_features],
            scale: vec![1.0; n_features],
        }
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Estandariza en f64 y entrega la entrada del modelo en f32
    pub fn transform(&self, features: &[f64]) -> Result<Vec<f32>, ClassifierError> {
        if features.len() != self.n_features() {
            return Err(ClassifierError::InvalidFeatureSize {
                expected: self.n_features(),
                actual: features.len(),
            });
        }

        let scaled: Vec<f32> = features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| ((x - mean) / scale) as f32)
            .collect();

        if let Some(idx) = scaled.iter().position(|v| !v.is_finite()) {
            return Err(ClassifierError::FeatureOutOfRange(idx));
        }
        Ok(scaled)
    }
}
