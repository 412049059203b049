//! Clasificación de gestos de la mano a partir de 21 landmarks (x, y, z).
//!
//! Flujo: landmarks crudos → [`normalizer`] → [`gesture_classifier`] → respuesta.
//! Las muestras etiquetadas se guardan en [`sample_store`] para reentrenar.

pub mod config;
pub mod csv_loader;
pub mod gesture_classifier;
pub mod handlers;
pub mod label_encoder;
pub mod normalizer;
pub mod sample_store;
pub mod scaler;
pub mod service;
pub mod session;
pub mod types;
