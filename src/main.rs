/*
Servicio de clasificación de gestos (lenguaje de señas) a partir de landmarks.

1. Carga modelo ONNX + escalador + codificador de etiquetas (falla si falta alguno)
2. Normaliza cada vector de 63 valores (21 puntos x 3)
3. Clasifica y responde; opcionalmente guarda muestras etiquetadas en dataset/

El transporte de red queda fuera: este binario atiende una sesión en vivo por
stdin/stdout, un evento JSON por línea:

    {"event": "live_landmarks", "data": {"landmarks": [...63 números...]}}
    {"event": "save_sample", "data": {"label": "hola", "landmarks": [...]}}
    {"event": "predict", "data": {"landmarks": [...]}}

Para ejecutar:
    RUST_LOG=debug ./target/release/signspeak --config signspeak.toml
*/

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use signspeak::config::ServiceConfig;
use signspeak::gesture_classifier::GestureClassifier;
use signspeak::handlers::Pipeline;
use signspeak::sample_store::SampleStore;
use signspeak::service::GestureService;
use signspeak::session::EVENT_DISCONNECT;

/// Servicio de clasificación de gestos a partir de landmarks de la mano
#[derive(Parser, Debug)]
#[command(name = "signspeak", version, about)]
struct Cli {
    /// Archivo de configuración TOML (por defecto ./signspeak.toml si existe)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Modelo ONNX
    #[arg(long)]
    model: Option<PathBuf>,

    /// Estadísticas del escalador (JSON)
    #[arg(long)]
    scaler: Option<PathBuf>,

    /// Codificador de etiquetas (JSON)
    #[arg(long)]
    label_encoder: Option<PathBuf>,

    /// Directorio del dataset
    #[arg(long)]
    dataset_dir: Option<PathBuf>,

    /// Hilos del pool de workers
    #[arg(long)]
    workers: Option<usize>,

    /// Verbosidad (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn into_config(self) -> Result<ServiceConfig> {
        let mut cfg = ServiceConfig::resolve(self.config.as_deref())?;
        if let Some(path) = self.model {
            cfg.model_path = path;
        }
        if let Some(path) = self.scaler {
            cfg.scaler_path = path;
        }
        if let Some(path) = self.label_encoder {
            cfg.label_encoder_path = path;
        }
        if let Some(dir) = self.dataset_dir {
            cfg.dataset_dir = dir;
        }
        if let Some(workers) = self.workers {
            cfg.workers = workers;
        }
        Ok(cfg)
    }
}

/// Una línea de entrada: `{"event": ..., "data": ...}`
#[derive(Debug, Deserialize)]
struct ClientFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // stdout queda reservado para los eventos
    fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let cfg = cli.into_config()?;

    info!("Inicializando clasificador ONNX...");
    let classifier =
        GestureClassifier::load(&cfg.model_path, &cfg.scaler_path, &cfg.label_encoder_path)
            .context("No se pudieron cargar los artefactos del clasificador")?;
    let store = SampleStore::open(&cfg.dataset_dir)
        .with_context(|| format!("No se pudo abrir el dataset {:?}", cfg.dataset_dir))?;
    info!(dataset = %cfg.dataset_dir.display(), "Clasificador cargado");

    let service = GestureService::start(Pipeline::new(classifier, store), cfg.workers);
    run_console(&service)?;
    service.shutdown();
    Ok(())
}

/// Atiende una sesión en vivo sobre stdin/stdout hasta EOF o `disconnect`
fn run_console(service: &GestureService) -> Result<()> {
    let (mut session, events) = service.connect();

    let printer = thread::spawn(move || -> io::Result<()> {
        let stdout = io::stdout();
        for event in events {
            let mut out = stdout.lock();
            serde_json::to_writer(&mut out, &event)?;
            writeln!(out)?;
            out.flush()?;
        }
        Ok(())
    });

    for line in io::stdin().lock().lines() {
        let line = line.context("Error leyendo stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let frame: ClientFrame = match serde_json::from_str(&line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Línea ignorada: JSON inválido");
                continue;
            }
        };

        if frame.event == "predict" {
            let response = service.predict(frame.data);
            let mut out = io::stdout().lock();
            serde_json::to_writer(&mut out, &response)?;
            writeln!(out)?;
            out.flush()?;
            continue;
        }

        session.dispatch(&frame.event, frame.data)?;
        if frame.event == EVENT_DISCONNECT {
            break;
        }
    }

    session.disconnect();
    drop(session);

    // El printer termina cuando los workers sueltan las respuestas en vuelo
    match printer.join() {
        Ok(result) => result.context("Error escribiendo en stdout"),
        Err(_) => Err(anyhow!("El hilo de salida terminó con pánico")),
    }
}
