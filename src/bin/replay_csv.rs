use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use signspeak::config::ServiceConfig;
use signspeak::csv_loader::{label_from_path, load_samples};
use signspeak::gesture_classifier::GestureClassifier;
use signspeak::normalizer::normalize;

/// Reclasifica las muestras guardadas de una etiqueta (dataset/<label>/samples.csv)
#[derive(Parser, Debug)]
#[command(name = "replay_csv", version, about)]
struct Args {
    /// Log de muestras a reproducir
    csv_path: PathBuf,

    /// Etiqueta esperada (por defecto, el nombre de la carpeta del CSV)
    #[arg(long)]
    label: Option<String>,

    /// Archivo de configuración TOML con las rutas de los artefactos
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Imprime el vector normalizado de cada fila
    #[arg(long)]
    dump_features: bool,

    /// Imprime las 5 clases más probables de cada fila
    #[arg(long)]
    top: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let cfg = ServiceConfig::resolve(args.config.as_deref())?;

    let expected = args
        .label
        .clone()
        .or_else(|| label_from_path(&args.csv_path))
        .ok_or_else(|| anyhow!("No se pudo deducir la etiqueta de {:?}", args.csv_path))?;

    println!("🎞️  Reproduciendo muestras desde {:?}", args.csv_path);
    let samples = load_samples(&args.csv_path)?;
    if samples.is_empty() {
        println!("ℹ️  El CSV no contiene muestras");
        return Ok(());
    }

    let classifier =
        GestureClassifier::load(&cfg.model_path, &cfg.scaler_path, &cfg.label_encoder_path)
            .context("No se pudieron cargar los artefactos del clasificador")?;

    let mut hits = 0usize;
    let mut failures = 0usize;

    for (idx, sample) in samples.iter().enumerate() {
        let features = normalize(sample);

        match classifier.predict_single(&features) {
            Ok((label, conf)) => {
                let mark = if label == expected { "✓" } else { "✗" };
                if label == expected {
                    hits += 1;
                }
                println!("  {:>4}. {} {:<20} {:>6.2}%", idx + 1, mark, label, conf * 100.0);
            }
            Err(e) => {
                failures += 1;
                println!("  {:>4}. ❌ {}", idx + 1, e);
                continue;
            }
        }

        if args.top {
            let scores = classifier.predict_scores(&features)?;
            let mut ranked: Vec<(&String, f32)> =
                classifier.labels().iter().zip(scores.iter().copied()).collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
            for (label, score) in ranked.iter().take(5) {
                println!("          {:<20} {:>6.2}%", label, score * 100.0);
            }
        }

        if args.dump_features {
            for (p, point) in features.chunks_exact(3).enumerate() {
                println!(
                    "          {:02}: {:>10.6} {:>10.6} {:>10.6}",
                    p, point[0], point[1], point[2]
                );
            }
        }
    }

    let total = samples.len();
    println!(
        "\n🥇 '{}': {}/{} aciertos ({:.1}%), {} errores",
        expected,
        hits,
        total,
        hits as f32 / total as f32 * 100.0,
        failures
    );

    Ok(())
}
