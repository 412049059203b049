use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::{Tensor, ValueType};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::label_encoder::LabelEncoder;
use crate::scaler::StandardScaler;
use crate::types::{FeatureVector, LANDMARK_VECTOR_LEN};

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("ONNX Runtime error: {0}")]
    OnnxError(#[from] ort::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid feature size: expected {expected}, got {actual}")]
    InvalidFeatureSize { expected: usize, actual: usize },

    #[error("No output tensor found")]
    NoOutputTensor,

    #[error("Missing ONNX {kind}")]
    MissingIo { kind: &'static str },

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("Class index {index} out of range ({classes} classes)")]
    UnknownClassIndex { index: usize, classes: usize },

    #[error("Feature {0} out of f32 range")]
    FeatureOutOfRange(usize),

    #[error("Model produced non-finite scores")]
    NonFiniteScores,

    #[error("Scoring panicked: {0}")]
    ScoringPanicked(String),

    #[error("ONNX session lock poisoned")]
    SessionPoisoned,
}

/// Función de puntuación ya entrenada: recibe el vector escalado y devuelve
/// una distribución de probabilidad sobre las clases.
pub trait ScoringModel: Send + Sync {
    fn score(&self, input: &[f32]) -> Result<Vec<f32>, ClassifierError>;
}

/// Modelo ONNX con entrada `[1, 63]` y salida de probabilidades `[1, C]`
pub struct OnnxModel {
    // ONNX Runtime necesita acceso exclusivo a la sesión para ejecutar
    session: Mutex<Session>,
    input_name: String,
    prob_output_name: String,
}

impl OnnxModel {
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let model_path = model_path.as_ref();
        let session = Session::builder()?.commit_from_file(model_path)?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or(ClassifierError::MissingIo { kind: "input" })?;

        let prob_output_name = session
            .outputs
            .iter()
            .find(|output| {
                matches!(
                    output.output_type,
                    ValueType::Tensor {
                        ty: TensorElementType::Float32,
                        ..
                    }
                )
            })
            .or_else(|| session.outputs.first())
            .map(|output| output.name.clone())
            .ok_or(ClassifierError::MissingIo { kind: "output" })?;

        info!(model = %model_path.display(), "[ONNX] Modelo cargado");
        info!(input = %input_name, output = %prob_output_name, "[ONNX] Entradas/salidas");

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            prob_output_name,
        })
    }
}

impl ScoringModel for OnnxModel {
    fn score(&self, input: &[f32]) -> Result<Vec<f32>, ClassifierError> {
        // Tensor de entrada [1, N]
        let input_value = Tensor::from_array((vec![1_usize, input.len()], input.to_vec()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifierError::SessionPoisoned)?;
        let outputs = session.run(ort::inputs![
            self.input_name.as_str() => input_value,
        ])?;

        let (prob_shape, prob_data) =
            outputs[self.prob_output_name.as_str()].try_extract_tensor::<f32>()?;

        let num_classes = match prob_shape.len() {
            0 => return Err(ClassifierError::NoOutputTensor),
            1 => prob_shape[0],
            _ => prob_shape[1],
        };
        let num_classes = usize::try_from(num_classes).map_err(|_| ClassifierError::NoOutputTensor)?;

        Ok(prob_data.iter().take(num_classes).copied().collect())
    }
}

/// Resultado de una clasificación: predicción o error, nunca ambos
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClassificationResult {
    Prediction { prediction: String, confidence: f32 },
    Error { error: String },
}

impl ClassificationResult {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Adaptador del clasificador: escalador + modelo + decodificador de etiquetas.
///
/// Los artefactos se cargan una sola vez al arrancar y no se modifican
/// después, así que el adaptador se comparte entre hilos sin bloqueo.
pub struct GestureClassifier {
    model: Box<dyn ScoringModel>,
    scaler: StandardScaler,
    encoder: LabelEncoder,
}

impl GestureClassifier {
    pub fn new(
        model: Box<dyn ScoringModel>,
        scaler: StandardScaler,
        encoder: LabelEncoder,
    ) -> Result<Self, ClassifierError> {
        if scaler.n_features() != LANDMARK_VECTOR_LEN {
            return Err(ClassifierError::InvalidFeatureSize {
                expected: LANDMARK_VECTOR_LEN,
                actual: scaler.n_features(),
            });
        }

        Ok(Self {
            model,
            scaler,
            encoder,
        })
    }

    /// Carga los tres artefactos desde disco; cualquier fallo es fatal para el arranque
    pub fn load(
        model_path: impl AsRef<Path>,
        scaler_path: impl AsRef<Path>,
        encoder_path: impl AsRef<Path>,
    ) -> Result<Self, ClassifierError> {
        let encoder = LabelEncoder::load(encoder_path)?;
        let scaler = StandardScaler::load(scaler_path)?;
        let model = OnnxModel::load(model_path)?;

        info!(classes = ?encoder.classes(), "Clases cargadas");

        Self::new(Box::new(model), scaler, encoder)
    }

    /// Predice probabilidades para todas las clases
    pub fn predict_scores(&self, features: &FeatureVector) -> Result<Vec<f32>, ClassifierError> {
        let scaled = self.scaler.transform(features)?;
        let scores = self.model.score(&scaled)?;

        if scores.is_empty() {
            return Err(ClassifierError::NoOutputTensor);
        }
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(ClassifierError::NonFiniteScores);
        }

        Ok(scores)
    }

    /// Predice la clase más probable y su probabilidad
    pub fn predict_single(&self, features: &FeatureVector) -> Result<(String, f32), ClassifierError> {
        let scores = self.predict_scores(features)?;

        // predict_scores ya descartó NaN, así que total_cmp ordena como partial_cmp
        let (index, &confidence) = scores
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .ok_or(ClassifierError::NoOutputTensor)?;

        let label = self.encoder.decode(index)?;
        Ok((label.to_string(), confidence))
    }

    /// Clasifica un vector normalizado. Nunca falla ni entra en pánico: cualquier
    /// error del escalador, del modelo o del decodificador se devuelve como
    /// `ClassificationResult::Error`.
    pub fn classify(&self, features: &FeatureVector) -> ClassificationResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.predict_single(features)))
            .unwrap_or_else(|payload| Err(ClassifierError::ScoringPanicked(panic_message(&*payload))));

        match outcome {
            Ok((prediction, confidence)) => ClassificationResult::Prediction {
                prediction,
                confidence,
            },
            Err(e) => {
                warn!(error = %e, "Error clasificando");
                ClassificationResult::error(e.to_string())
            }
        }
    }

    /// Obtiene las etiquetas de clases
    pub fn labels(&self) -> &[String] {
        self.encoder.classes()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
