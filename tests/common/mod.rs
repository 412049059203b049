#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use signspeak::gesture_classifier::{ClassifierError, GestureClassifier, ScoringModel};
use signspeak::handlers::{Pipeline, ServerEvent};
use signspeak::label_encoder::LabelEncoder;
use signspeak::sample_store::SampleStore;
use signspeak::scaler::StandardScaler;
use signspeak::service::GestureService;
use signspeak::types::LANDMARK_VECTOR_LEN;
use tempfile::TempDir;

pub const CLASSES: [&str; 3] = ["hola", "gracias", "adios"];
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Modelo determinista: elige la clase según el signo del x normalizado del punto 1
/// y cuenta las invocaciones.
pub struct SignModel {
    pub calls: Arc<AtomicUsize>,
}

impl ScoringModel for SignModel {
    fn score(&self, input: &[f32]) -> Result<Vec<f32>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let x = input[3];
        Ok(if x > 0.0 {
            vec![0.8, 0.15, 0.05]
        } else if x < 0.0 {
            vec![0.05, 0.15, 0.8]
        } else {
            vec![0.2, 0.6, 0.2]
        })
    }
}

/// Modelo que siempre falla
pub struct BrokenModel;

impl ScoringModel for BrokenModel {
    fn score(&self, input: &[f32]) -> Result<Vec<f32>, ClassifierError> {
        Err(ClassifierError::InvalidFeatureSize {
            expected: 42,
            actual: input.len(),
        })
    }
}

pub struct Harness {
    pub service: GestureService,
    pub calls: Arc<AtomicUsize>,
    pub dataset: TempDir,
}

impl Harness {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn classifier_with(model: Box<dyn ScoringModel>) -> GestureClassifier {
    GestureClassifier::new(
        model,
        StandardScaler::identity(LANDMARK_VECTOR_LEN),
        LabelEncoder::from_classes(CLASSES.iter().map(|c| c.to_string()).collect()).unwrap(),
    )
    .unwrap()
}

pub fn harness(workers: usize) -> Harness {
    let calls = Arc::new(AtomicUsize::new(0));
    let model = SignModel {
        calls: Arc::clone(&calls),
    };
    let dataset = TempDir::new().unwrap();
    let store = SampleStore::open(dataset.path()).unwrap();
    let service = GestureService::start(Pipeline::new(classifier_with(Box::new(model)), store), workers);
    Harness {
        service,
        calls,
        dataset,
    }
}

pub fn broken_harness() -> Harness {
    let dataset = TempDir::new().unwrap();
    let store = SampleStore::open(dataset.path()).unwrap();
    let service = GestureService::start(Pipeline::new(classifier_with(Box::new(BrokenModel)), store), 2);
    Harness {
        service,
        calls: Arc::new(AtomicUsize::new(0)),
        dataset,
    }
}

/// Mano con la muñeca en (0.5, 0.5) y el punto 1 desplazado `dx` en x
pub fn hand(dx: f64) -> Vec<f64> {
    let mut v = Vec::with_capacity(LANDMARK_VECTOR_LEN);
    for p in 0..21 {
        let x = if p == 1 { 0.5 + dx } else { 0.5 };
        let y = 0.5 + p as f64 * 0.01;
        v.extend([x, y, -0.02]);
    }
    v
}

pub fn recv(rx: &Receiver<ServerEvent>) -> ServerEvent {
    rx.recv_timeout(RECV_TIMEOUT).expect("evento del servidor")
}
