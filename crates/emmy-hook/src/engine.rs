//! The engine started by the init routine.
//!
//! Owns the transporter to the front-end. The connect runs on its own
//! `emmy-engine` thread so the init routine returns to the injector
//! immediately; the session logic picks the result up with
//! [`Engine::wait_for_connection`] and consumes inbound frames through
//! [`Engine::take_events`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use emmy_core::sync::Mutex;
use emmy_core::EngineConfig;
use emmy_protocol::{PipeTransporter, StopStatus, TransportError, TransportEventReceiver, TransportResult, Transporter};
use once_cell::sync::OnceCell;
use tracing::{error, info};

use crate::error::HookError;

/// Name of the thread that performs the initial connect.
pub const ENGINE_THREAD_NAME: &str = "emmy-engine";

static ENGINE: OnceCell<Engine> = OnceCell::new();

/// The engine installed in this process, once the init routine has run.
pub fn engine() -> Option<&'static Engine>
{
    ENGINE.get()
}

pub(crate) fn install(engine: Engine) -> Result<&'static Engine, HookError>
{
    ENGINE.try_insert(engine).map_err(|_| HookError::AlreadyRunning)
}

pub struct Engine
{
    config: EngineConfig,
    transporter: Arc<PipeTransporter>,
    connector: Mutex<Option<JoinHandle<TransportResult<()>>>>,
}

impl Engine
{
    /// Create the transporter and start connecting to `config.pipe_name`.
    ///
    /// ## Errors
    ///
    /// - `Spawn`: the connect thread could not be created
    pub fn start(config: EngineConfig) -> Result<Self, HookError>
    {
        let transporter = Arc::new(PipeTransporter::with_config(config.transport.clone()));

        let connector = {
            let transporter = Arc::clone(&transporter);
            let pipe_name = config.pipe_name.clone();
            thread::Builder::new()
                .name(ENGINE_THREAD_NAME.to_string())
                .spawn(move || {
                    let result = transporter.connect(&pipe_name);
                    match &result {
                        Ok(()) => info!(pipe = %pipe_name, "Engine connected to front-end"),
                        Err(e) => error!(pipe = %pipe_name, error = %e, "Engine could not reach front-end"),
                    }
                    result
                })
                .map_err(HookError::Spawn)?
        };

        Ok(Self {
            config,
            transporter,
            connector: Mutex::new(Some(connector)),
        })
    }

    pub fn config(&self) -> &EngineConfig
    {
        &self.config
    }

    pub fn transporter(&self) -> &PipeTransporter
    {
        &self.transporter
    }

    /// Receiver of inbound frames; `None` after the first call. Frames
    /// arriving before the first call are dropped.
    pub fn take_events(&self) -> Option<TransportEventReceiver>
    {
        self.transporter.take_events()
    }

    /// Block until the initial connect finishes.
    ///
    /// Returns `None` if another caller already collected the result.
    pub fn wait_for_connection(&self) -> Option<TransportResult<()>>
    {
        let handle = self.connector.lock().take()?;
        Some(handle.join().unwrap_or_else(|_| {
            Err(TransportError::ConnectFailed {
                endpoint: self.config.pipe_name.clone(),
                reason: "connect thread panicked".to_string(),
            })
        }))
    }

    /// Stop the transporter; the session is over.
    pub fn shutdown(&self) -> StopStatus
    {
        self.transporter.stop()
    }
}
