use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use csv::WriterBuilder;
use thiserror::Error;
use tracing::{debug, info};

use crate::types::{LandmarkVector, LANDMARK_VECTOR_LEN};

/// Nombre del log de cada etiqueta: `<dataset>/<label>/samples.csv`
pub const SAMPLES_FILE: &str = "samples.csv";

/// Etiqueta usada cuando el cliente no envía ninguna
pub const DEFAULT_LABEL: &str = "unknown";

pub const MAX_LABEL_LEN: usize = 64;

/// Nombres de dispositivo que Windows no permite como directorio
const RESERVED_NAMES: [&str; 4] = ["con", "prn", "aux", "nul"];

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid label '{0}'")]
    InvalidLabel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Lock poisoned for label '{0}'")]
    LockPoisoned(String),
}

/// Valida que la etiqueta sea un identificador seguro para nombrar un directorio:
/// 1..=64 caracteres de `[A-Za-z0-9_-]`. Así no hay separadores, `.`/`..`
/// ni nombres vacíos. También rechaza los nombres de dispositivo de Windows
/// (`CON`, `NUL`, `COM1`, `LPT9`, ... sin distinguir mayúsculas).
pub fn validate_label(label: &str) -> Result<&str, StoreError> {
    let valid = !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !is_reserved_name(label);

    if valid {
        Ok(label)
    } else {
        Err(StoreError::InvalidLabel(label.to_string()))
    }
}

fn is_reserved_name(label: &str) -> bool {
    let lower = label.to_ascii_lowercase();
    if RESERVED_NAMES.contains(&lower.as_str()) {
        return true;
    }
    match lower.as_bytes() {
        [b'c', b'o', b'm', d] | [b'l', b'p', b't', d] => (b'1'..=b'9').contains(d),
        _ => false,
    }
}

/// Dataset de muestras etiquetadas: un log CSV de solo-añadir por etiqueta.
///
/// Las escrituras a una misma etiqueta se serializan con un candado propio de
/// esa etiqueta; etiquetas distintas no se coordinan entre sí. El candado se
/// indexa por la etiqueta en minúsculas: "A" y "a" comparten archivo en un
/// sistema de archivos que no distingue mayúsculas.
pub struct SampleStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SampleStore {
    /// Abre (y crea si hace falta) el directorio raíz del dataset
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "Dataset abierto");

        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ruta del log de una etiqueta (no la crea)
    pub fn log_path(&self, label: &str) -> Result<PathBuf, StoreError> {
        let label = validate_label(label)?;
        Ok(self.root.join(label).join(SAMPLES_FILE))
    }

    /// Añade una muestra cruda como una fila de 63 valores al log de `label`.
    /// Crea el directorio de la etiqueta la primera vez.
    pub fn save(&self, label: &str, landmarks: &LandmarkVector) -> Result<PathBuf, StoreError> {
        let path = self.log_path(label)?;
        let row = encode_row(landmarks)?;

        let lock = self.label_lock(label)?;
        let _guard = lock
            .lock()
            .map_err(|_| StoreError::LockPoisoned(label.to_string()))?;

        if let Some(folder) = path.parent() {
            fs::create_dir_all(folder)?;
        }

        // Una sola escritura por fila en modo append
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&row)?;
        file.sync_data()?;

        info!(label, path = %path.display(), "Muestra guardada");
        Ok(path)
    }

    fn label_lock(&self, label: &str) -> Result<Arc<Mutex<()>>, StoreError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| StoreError::LockPoisoned(label.to_string()))?;

        // Nunca se vacía: una entrada por directorio de etiqueta del dataset
        Ok(Arc::clone(locks.entry(label.to_ascii_lowercase()).or_default()))
    }
}

/// Serializa la fila completa (con salto de línea) en memoria. Cada f64 se
/// escribe con la representación más corta que vuelve al mismo valor.
fn encode_row(landmarks: &LandmarkVector) -> Result<Vec<u8>, StoreError> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::with_capacity(LANDMARK_VECTOR_LEN * 20));
    writer.write_record(landmarks.iter().map(|v| v.to_string()))?;
    writer
        .into_inner()
        .map_err(|e| StoreError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_loader::load_samples;
    use tempfile::TempDir;

    fn sample(seed: f64) -> LandmarkVector {
        let mut v = [0.0f64; LANDMARK_VECTOR_LEN];
        for (i, x) in v.iter_mut().enumerate() {
            *x = seed + i as f64 * 0.01;
        }
        v
    }

    #[test]
    fn test_validate_label() {
        assert!(validate_label("hola").is_ok());
        assert!(validate_label("A_b-9").is_ok());
        assert!(validate_label("unknown").is_ok());

        for bad in ["", ".", "..", "../etc", "a/b", "a\\b", "with space", "ñ", "x.csv"] {
            assert!(validate_label(bad).is_err(), "debería rechazar {:?}", bad);
        }
        assert!(validate_label(&"a".repeat(MAX_LABEL_LEN + 1)).is_err());
    }

    #[test]
    fn test_reserved_device_names() {
        for bad in ["CON", "con", "Nul", "PRN", "aux", "COM1", "com9", "LPT3"] {
            assert!(validate_label(bad).is_err(), "debería rechazar {:?}", bad);
        }
        for ok in ["COM0", "COM10", "console", "nul_", "LPT", "auxiliar"] {
            assert!(validate_label(ok).is_ok(), "debería aceptar {:?}", ok);
        }
    }

    #[test]
    fn test_case_variants_share_a_lock() {
        let tmp = TempDir::new().unwrap();
        let store = SampleStore::open(tmp.path()).unwrap();

        let upper = store.label_lock("Hola").unwrap();
        let lower = store.label_lock("hola").unwrap();
        assert!(Arc::ptr_eq(&upper, &lower));
        assert!(!Arc::ptr_eq(&upper, &store.label_lock("adios").unwrap()));
    }

    #[test]
    fn test_lock_registry_holds_one_entry_per_label() {
        let tmp = TempDir::new().unwrap();
        let store = SampleStore::open(tmp.path()).unwrap();

        for i in 0..20 {
            let label = if i % 2 == 0 { "A" } else { "a" };
            store.save(label, &sample(i as f64)).unwrap();
        }
        store.save("B", &sample(0.0)).unwrap();
        assert_eq!(store.locks.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_rows_keep_f64_precision() {
        let tmp = TempDir::new().unwrap();
        let store = SampleStore::open(tmp.path()).unwrap();

        let mut raw = sample(0.0);
        raw[0] = 0.123456789012345;
        raw[1] = 1e39;
        raw[2] = -3.4e-310;
        store.save("D", &raw).unwrap();

        let content = fs::read_to_string(store.log_path("D").unwrap()).unwrap();
        assert!(content.starts_with("0.123456789012345,"), "{}", content);
        assert_eq!(load_samples(store.log_path("D").unwrap()).unwrap(), vec![raw]);
    }

    #[test]
    fn test_save_creates_label_dir_lazily() {
        let tmp = TempDir::new().unwrap();
        let store = SampleStore::open(tmp.path().join("dataset")).unwrap();
        assert!(!store.root().join("A").exists());

        let path = store.save("A", &sample(0.0)).unwrap();
        assert_eq!(path, store.root().join("A").join(SAMPLES_FILE));
        assert!(path.exists());
    }

    #[test]
    fn test_rows_are_appended_in_order() {
        let tmp = TempDir::new().unwrap();
        let store = SampleStore::open(tmp.path()).unwrap();

        store.save("B", &sample(1.0)).unwrap();
        store.save("B", &sample(2.0)).unwrap();

        let rows = load_samples(store.log_path("B").unwrap()).unwrap();
        assert_eq!(rows, vec![sample(1.0), sample(2.0)]);
    }

    #[test]
    fn test_invalid_label_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = SampleStore::open(tmp.path().join("dataset")).unwrap();

        let err = store.save("../escape", &sample(0.0)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidLabel(_)));
        assert!(!tmp.path().join("escape").exists());
        assert_eq!(fs::read_dir(store.root()).unwrap().count(), 0);
    }

    #[test]
    fn test_concurrent_saves_same_label() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(SampleStore::open(tmp.path()).unwrap());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..8 {
                        store.save("C", &sample(i as f64 * 100.0 + j as f64)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let rows = load_samples(store.log_path("C").unwrap()).unwrap();
        assert_eq!(rows.len(), 16 * 8);
    }
}
