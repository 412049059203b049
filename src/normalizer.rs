use crate::types::{FeatureVector, LandmarkVector, NUM_COORDS, SCALE_FLOOR, WRIST_INDEX};

/// Normaliza los landmarks para que el modelo sea invariante a la posición y
/// al tamaño de la mano (no a la rotación).
///
/// 1. Traslada x/y para que la muñeca (punto 0) quede en el origen
/// 2. Divide x/y por `max(rango_x, rango_y, 1e-6)`
/// 3. Deja z intacto
///
/// La entrada debe tener exactamente 63 valores; el tipo ya lo garantiza.
pub fn normalize(landmarks: &LandmarkVector) -> FeatureVector {
    let mut coords = *landmarks;

    let wrist_base = WRIST_INDEX * NUM_COORDS;
    let (wrist_x, wrist_y) = (coords[wrist_base], coords[wrist_base + 1]);

    for point in coords.chunks_exact_mut(NUM_COORDS) {
        point[0] -= wrist_x;
        point[1] -= wrist_y;
    }

    let scale = normalization_scale(&coords);

    for point in coords.chunks_exact_mut(NUM_COORDS) {
        point[0] /= scale;
        point[1] /= scale;
    }

    coords
}

/// Escala usada por `normalize`: el mayor de los rangos x/y, con piso 1e-6
pub fn normalization_scale(coords: &[f64]) -> f64 {
    let xs = coords.iter().step_by(NUM_COORDS).copied();
    let ys = coords.iter().skip(1).step_by(NUM_COORDS).copied();

    range(xs).max(range(ys)).max(SCALE_FLOOR)
}

fn range(values: impl Iterator<Item = f64>) -> f64 {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| {
        (min.min(v), max.max(v))
    });
    if min > max {
        return 0.0;
    }
    max - min
}
