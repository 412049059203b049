use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::Sender;
use serde_json::Value;
use tracing::{debug, info};

use crate::handlers::{on_live_landmarks, on_save_sample, Pipeline, ServerEvent, ServiceError};

pub const EVENT_CONNECT: &str = "connect";
pub const EVENT_DISCONNECT: &str = "disconnect";
pub const EVENT_LIVE_LANDMARKS: &str = "live_landmarks";
pub const EVENT_SAVE_SAMPLE: &str = "save_sample";

pub const WELCOME_MESSAGE: &str = "Connected to SignSpeak backend";

pub type SessionId = u64;

/// Handler de un evento de datos: cada evento se atiende de forma independiente
pub type EventHandler = fn(&Pipeline, Value) -> ServerEvent;

/// Qué hace el worker con un trabajo
pub enum Work {
    /// Evento de datos: se ejecuta el handler registrado
    Handle { handler: EventHandler, data: Value },
    /// Respuesta ya resuelta que sólo debe salir en su turno
    Reply(ServerEvent),
}

/// Trabajo pendiente en el carril de una sesión
pub struct Job {
    pub session: SessionId,
    pub event: &'static str,
    pub work: Work,
    pub reply: Sender<ServerEvent>,
}

impl Job {
    /// Ejecuta el handler y empuja el resultado a la sesión
    pub fn run(self, pipeline: &Pipeline) {
        let event = match self.work {
            Work::Handle { handler, data } => handler(pipeline, data),
            Work::Reply(event) => event,
        };
        if self.reply.send(event).is_err() {
            debug!(session = self.session, event = self.event, "Sesión cerrada, respuesta descartada");
        }
    }
}

/// Tabla explícita nombre de evento → handler
pub struct DispatchTable {
    handlers: HashMap<&'static str, EventHandler>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, event: &'static str, handler: EventHandler) {
        self.handlers.insert(event, handler);
    }

    /// Devuelve el nombre registrado (con vida `'static`) junto a su handler
    pub fn lookup(&self, event: &str) -> Option<(&'static str, EventHandler)> {
        self.handlers
            .get_key_value(event)
            .map(|(&name, &handler)| (name, handler))
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        let mut table = Self::new();
        table.register(EVENT_LIVE_LANDMARKS, on_live_landmarks);
        table.register(EVENT_SAVE_SAMPLE, on_save_sample);
        table
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Disconnected,
}

/// Sesión en vivo: `Connected -> Connected* -> Disconnected`.
///
/// No guarda estado entre eventos aparte de su identidad. Todo evento pasa por
/// el carril de la sesión, así que las respuestas salen en el orden de llegada.
pub struct Session {
    id: SessionId,
    state: SessionState,
    outbound: Sender<ServerEvent>,
    jobs: Sender<Job>,
    dispatch: Arc<DispatchTable>,
}

impl Session {
    /// Abre la sesión y envía el mensaje de bienvenida
    pub(crate) fn open(
        id: SessionId,
        outbound: Sender<ServerEvent>,
        jobs: Sender<Job>,
        dispatch: Arc<DispatchTable>,
    ) -> Self {
        info!(session = id, "Cliente conectado");
        let _ = outbound.send(ServerEvent::message(WELCOME_MESSAGE));

        Self {
            id,
            state: SessionState::Connected,
            outbound,
            jobs,
            dispatch,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Despacha un evento entrante. Las respuestas son asíncronas pero
    /// respetan el orden de los eventos.
    pub fn dispatch(&mut self, event: &str, data: Value) -> Result<(), ServiceError> {
        if !self.is_connected() {
            return Err(ServiceError::SessionClosed(self.id));
        }

        match event {
            EVENT_DISCONNECT => {
                self.disconnect();
                Ok(())
            }
            // Ya conectada: se repite la bienvenida
            EVENT_CONNECT => self.enqueue(
                EVENT_CONNECT,
                Work::Reply(ServerEvent::message(WELCOME_MESSAGE)),
            ),
            _ => match self.dispatch.lookup(event) {
                Some((name, handler)) => self.enqueue(name, Work::Handle { handler, data }),
                None => {
                    debug!(session = self.id, event, "Evento desconocido");
                    self.enqueue(
                        "unknown",
                        Work::Reply(ServerEvent::error(format!("Unknown event '{}'", event))),
                    )
                }
            },
        }
    }

    fn enqueue(&self, event: &'static str, work: Work) -> Result<(), ServiceError> {
        self.jobs
            .send(Job {
                session: self.id,
                event,
                work,
                reply: self.outbound.clone(),
            })
            .map_err(|_| ServiceError::ShuttingDown)
    }

    /// Cierra la sesión (estado terminal). Idempotente.
    pub fn disconnect(&mut self) {
        if self.state == SessionState::Disconnected {
            return;
        }
        self.state = SessionState::Disconnected;
        info!(session = self.id, "Cliente desconectado");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}
