use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::handlers::{handle_predict, Pipeline, PredictResponse, ServerEvent};
use crate::session::{DispatchTable, Job, Session};

/// Servicio de clasificación: tubería compartida + pool de workers que atiende
/// los eventos de todas las sesiones en vivo.
///
/// Cada worker tiene su propia cola (carril). Una sesión queda fijada a un
/// carril al conectarse, así sus respuestas salen en el orden de sus eventos
/// mientras sesiones distintas avanzan en paralelo.
pub struct GestureService {
    pipeline: Arc<Pipeline>,
    dispatch: Arc<DispatchTable>,
    lanes: Vec<Sender<Job>>,
    shutdown: Option<Sender<()>>,
    workers: Vec<JoinHandle<()>>,
    next_session: AtomicU64,
}

impl GestureService {
    pub fn start(pipeline: Pipeline, workers: usize) -> Self {
        Self::with_dispatch(pipeline, DispatchTable::default(), workers)
    }

    pub fn with_dispatch(pipeline: Pipeline, dispatch: DispatchTable, workers: usize) -> Self {
        let pipeline = Arc::new(pipeline);
        // Nunca se envía nada: al soltar el Sender los workers ven el canal cerrado
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let mut lanes = Vec::with_capacity(workers.max(1));
        let mut handles = Vec::with_capacity(workers.max(1));
        for idx in 0..workers.max(1) {
            let (jobs_tx, jobs_rx) = unbounded::<Job>();
            let worker_pipeline = Arc::clone(&pipeline);
            let shutdown_rx = shutdown_rx.clone();
            let spawned = thread::Builder::new()
                .name(format!("signspeak-worker-{}", idx))
                .spawn(move || worker_loop(idx, &worker_pipeline, &jobs_rx, &shutdown_rx));
            match spawned {
                Ok(handle) => {
                    lanes.push(jobs_tx);
                    handles.push(handle);
                }
                Err(e) => error!(error = %e, "No se pudo lanzar el worker"),
            }
        }

        info!(workers = handles.len(), "Servicio iniciado");

        Self {
            pipeline,
            dispatch: Arc::new(dispatch),
            lanes,
            shutdown: Some(shutdown_tx),
            workers: handles,
            next_session: AtomicU64::new(1),
        }
    }

    /// Clasificación puntual, resuelta en el hilo que llama
    pub fn predict(&self, data: Value) -> PredictResponse {
        handle_predict(&self.pipeline, data)
    }

    /// Abre una sesión en vivo. El receptor entrega la bienvenida y después las
    /// respuestas a cada evento, en el mismo orden que los eventos.
    pub fn connect(&self) -> (Session, Receiver<ServerEvent>) {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let (outbound_tx, outbound_rx) = unbounded();
        let session = Session::open(
            id,
            outbound_tx,
            self.lane_for(id),
            Arc::clone(&self.dispatch),
        );
        (session, outbound_rx)
    }

    fn lane_for(&self, session: u64) -> Sender<Job> {
        if self.lanes.is_empty() {
            // Sin workers: un carril sin receptor, cada envío falla con ShuttingDown
            return unbounded::<Job>().0;
        }
        let idx = (session % self.lanes.len() as u64) as usize;
        self.lanes[idx].clone()
    }

    /// Detiene los workers tras vaciar la cola pendiente
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.shutdown.take().is_none() {
            return;
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("Un worker terminó con pánico");
            }
        }
        info!("Servicio detenido");
    }
}

impl Drop for GestureService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(idx: usize, pipeline: &Pipeline, jobs: &Receiver<Job>, shutdown: &Receiver<()>) {
    debug!(worker = idx, "Worker listo");
    loop {
        select! {
            recv(jobs) -> job => match job {
                Ok(job) => job.run(pipeline),
                Err(_) => break,
            },
            recv(shutdown) -> _ => {
                // Vaciar lo que ya estaba encolado antes de salir
                for job in jobs.try_iter() {
                    job.run(pipeline);
                }
                break;
            }
        }
    }
    debug!(worker = idx, "Worker terminado");
}
