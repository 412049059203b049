use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::gesture_classifier::ClassifierError;

#[derive(Debug, Deserialize)]
struct ClassesJson {
    index_to_class: HashMap<String, String>,
}

/// Decodifica el índice de clase del modelo a su nombre legible
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let content = fs::read_to_string(path)?;
        let data: ClassesJson = serde_json::from_str(&content)?;

        // Convertir HashMap a Vec ordenado por índice
        let mut pairs: Vec<(usize, String)> = data
            .index_to_class
            .into_iter()
            .map(|(k, v)| {
                k.parse::<usize>().map(|idx| (idx, v)).map_err(|_| {
                    ClassifierError::InvalidArtifact(format!("label encoder: índice inválido '{}'", k))
                })
            })
            .collect::<Result<_, _>>()?;
        pairs.sort_by_key(|(idx, _)| *idx);

        // Los índices deben ser exactamente 0..n
        if let Some((pos, (idx, _))) = pairs.iter().enumerate().find(|(pos, (idx, _))| pos != idx) {
            return Err(ClassifierError::InvalidArtifact(format!(
                "label encoder: falta el índice {} (encontrado {})",
                pos, idx
            )));
        }

        Self::from_classes(pairs.into_iter().map(|(_, name)| name).collect())
    }

    pub fn from_classes(classes: Vec<String>) -> Result<Self, ClassifierError> {
        if classes.is_empty() {
            return Err(ClassifierError::InvalidArtifact(
                "label encoder sin clases".to_string(),
            ));
        }
        Ok(Self { classes })
    }

    pub fn decode(&self, index: usize) -> Result<&str, ClassifierError> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(ClassifierError::UnknownClassIndex {
                index,
                classes: self.classes.len(),
            })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}
