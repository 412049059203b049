use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;

use crate::types::{landmarks_from_slice, LandmarkVector, LANDMARK_VECTOR_LEN};

/// Carga todas las muestras de un log `samples.csv` (sin cabecera, 63 valores
/// por fila), en el mismo formato que escribe `SampleStore`.
pub fn load_samples(path: impl AsRef<Path>) -> Result<Vec<LandmarkVector>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;

    let mut samples = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record =
            result.with_context(|| format!("Fila {} inválida en {:?}", row_idx + 1, path))?;
        if record.len() != LANDMARK_VECTOR_LEN {
            bail!(
                "La fila {} tiene {} columnas (se esperaban {})",
                row_idx + 1,
                record.len(),
                LANDMARK_VECTOR_LEN
            );
        }

        let values = record
            .iter()
            .map(|field| field.trim().parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .with_context(|| format!("Valor no numérico en fila {}", row_idx + 1))?;

        match landmarks_from_slice(&values) {
            Some(landmarks) => samples.push(landmarks),
            None => bail!("La fila {} contiene valores no finitos", row_idx + 1),
        }
    }

    Ok(samples)
}

/// Etiqueta implícita de un log: el nombre de su carpeta (`<dataset>/<label>/samples.csv`)
pub fn label_from_path(path: impl AsRef<Path>) -> Option<String> {
    path.as_ref()
        .parent()
        .and_then(|dir| dir.file_name())
        .and_then(|name| name.to_str())
        .map(str::to_string)
}
