/// Vector crudo tal como llega del cliente: 21 puntos x 3 coordenadas.
/// Layout: [p][c] donde p=punto (0 = muñeca), c=coordenada
///
/// Se guarda en f64 para no perder precisión en el dataset; el paso a f32
/// ocurre al construir la entrada del modelo.
pub type LandmarkVector = [f64; LANDMARK_VECTOR_LEN];

/// Vector normalizado (mismo layout que `LandmarkVector`)
pub type FeatureVector = [f64; LANDMARK_VECTOR_LEN];

/// Constantes del sistema
pub const NUM_LANDMARKS: usize = 21;
pub const NUM_COORDS: usize = 3; // x, y, z
pub const LANDMARK_VECTOR_LEN: usize = NUM_LANDMARKS * NUM_COORDS; // 63
pub const WRIST_INDEX: usize = 0;
pub const SCALE_FLOOR: f64 = 1e-6;

/// Convierte una secuencia arbitraria en un `LandmarkVector`.
///
/// Devuelve `None` si la longitud no es 63 o si algún valor no es finito
/// (NaN / ±Inf).
pub fn landmarks_from_slice(values: &[f64]) -> Option<LandmarkVector> {
    if values.len() != LANDMARK_VECTOR_LEN || values.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let mut landmarks = [0.0f64; LANDMARK_VECTOR_LEN];
    landmarks.copy_from_slice(values);
    Some(landmarks)
}
