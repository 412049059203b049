use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::gesture_classifier::{ClassificationResult, GestureClassifier};
use crate::normalizer::normalize;
use crate::sample_store::{SampleStore, StoreError, DEFAULT_LABEL};
use crate::types::{landmarks_from_slice, LandmarkVector};

pub const INVALID_LANDMARKS: &str = "Invalid landmarks";
pub const INVALID_SAMPLE: &str = "Invalid sample";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Payload ausente, longitud distinta de 63 o valores no numéricos/finitos
    #[error("Invalid landmarks")]
    InvalidInput,

    #[error("Classification failed: {0}")]
    ClassificationFailure(String),

    #[error("Could not save sample: {0}")]
    PersistenceFailure(String),

    #[error("Session {0} is closed")]
    SessionClosed(u64),

    #[error("Service is shutting down")]
    ShuttingDown,
}

/// Payload de `predict` y `live_landmarks`: `{landmarks: [63 números]}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LandmarksPayload {
    #[serde(default)]
    pub landmarks: Option<Vec<f64>>,
}

/// Payload de `save_sample`: `{label?, landmarks}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SamplePayload {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub landmarks: Option<Vec<f64>>,
}

/// Respuesta de la clasificación puntual, con status estilo HTTP
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictResponse {
    pub status: u16,
    pub body: ClassificationResult,
}

/// Valida el payload antes de tocar el normalizador o el clasificador
pub fn validate_landmarks(raw: Option<&[f64]>) -> Result<LandmarkVector, ServiceError> {
    raw.and_then(landmarks_from_slice)
        .ok_or(ServiceError::InvalidInput)
}

/// Tubería compartida por todas las sesiones: clasificador + dataset.
/// No guarda estado por petición.
pub struct Pipeline {
    classifier: GestureClassifier,
    store: SampleStore,
}

impl Pipeline {
    pub fn new(classifier: GestureClassifier, store: SampleStore) -> Self {
        Self { classifier, store }
    }

    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    /// Valida, normaliza y clasifica. `Err` solo para entrada inválida; los
    /// fallos del clasificador llegan como `ClassificationResult::Error`.
    pub fn classify_landmarks(
        &self,
        raw: Option<&[f64]>,
    ) -> Result<ClassificationResult, ServiceError> {
        let landmarks = validate_landmarks(raw)?;
        let features = normalize(&landmarks);
        Ok(self.classifier.classify(&features))
    }

    /// Valida y guarda una muestra cruda. Devuelve la etiqueta usada.
    pub fn save_sample(
        &self,
        label: Option<&str>,
        raw: Option<&[f64]>,
    ) -> Result<String, ServiceError> {
        let label = label.unwrap_or(DEFAULT_LABEL);
        let landmarks = validate_landmarks(raw)?;

        match self.store.save(label, &landmarks) {
            Ok(_) => Ok(label.to_string()),
            Err(StoreError::InvalidLabel(_)) => Err(ServiceError::InvalidInput),
            Err(e) => Err(ServiceError::PersistenceFailure(e.to_string())),
        }
    }
}

/// Clasificación puntual (petición/respuesta).
///
/// - 200 `{prediction, confidence}`
/// - 400 `{error: "Invalid landmarks"}` si falta el campo o no hay 63 números
/// - 422 `{error: <motivo>}` si falla el clasificador
pub fn handle_predict(pipeline: &Pipeline, data: Value) -> PredictResponse {
    let result = serde_json::from_value::<LandmarksPayload>(data)
        .map_err(|_| ServiceError::InvalidInput)
        .and_then(|payload| pipeline.classify_landmarks(payload.landmarks.as_deref()));

    match result {
        Ok(body) if body.is_error() => PredictResponse { status: 422, body },
        Ok(body) => PredictResponse { status: 200, body },
        Err(_) => PredictResponse {
            status: 400,
            body: ClassificationResult::error(INVALID_LANDMARKS),
        },
    }
}

/// Mensajes del canal `server_message`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Message { message: String },
    Error { error: String },
}

/// Eventos que el servidor empuja a una sesión en vivo
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    ServerMessage(ServerMessage),
    Prediction(ClassificationResult),
}

impl ServerEvent {
    pub fn message(message: impl Into<String>) -> Self {
        Self::ServerMessage(ServerMessage::Message {
            message: message.into(),
        })
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::ServerMessage(ServerMessage::Error {
            error: error.into(),
        })
    }
}

/// `live_landmarks` → `prediction`
pub fn on_live_landmarks(pipeline: &Pipeline, data: Value) -> ServerEvent {
    let result = serde_json::from_value::<LandmarksPayload>(data)
        .map_err(|_| ServiceError::InvalidInput)
        .and_then(|payload| pipeline.classify_landmarks(payload.landmarks.as_deref()));

    match result {
        Ok(result) => ServerEvent::Prediction(result),
        Err(_) => {
            debug!("live_landmarks rechazado: payload inválido");
            ServerEvent::Prediction(ClassificationResult::error(INVALID_LANDMARKS))
        }
    }
}

/// `save_sample` → `server_message`
pub fn on_save_sample(pipeline: &Pipeline, data: Value) -> ServerEvent {
    let result = serde_json::from_value::<SamplePayload>(data)
        .map_err(|_| ServiceError::InvalidInput)
        .and_then(|payload| {
            pipeline.save_sample(payload.label.as_deref(), payload.landmarks.as_deref())
        });

    match result {
        Ok(label) => ServerEvent::message(format!("Saved one sample for '{}'", label)),
        Err(ServiceError::InvalidInput) => ServerEvent::error(INVALID_SAMPLE),
        Err(e) => {
            warn!(error = %e, "No se pudo guardar la muestra");
            ServerEvent::error(e.to_string())
        }
    }
}
