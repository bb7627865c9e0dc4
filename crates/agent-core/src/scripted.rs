use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::AgentError;
use crate::oracle::{Instruction, OracleConnector, OracleReply, OracleSession};

/// Context handed to a scripted responder for each instruction.
#[derive(Debug)]
pub struct ScriptCall<'a> {
    pub starting_page: &'a str,
    pub instruction: &'a Instruction,
    /// Zero-based index of this instruction within its session.
    pub call_index: usize,
}

type Responder = dyn Fn(&ScriptCall<'_>) -> Result<OracleReply, AgentError> + Send + Sync;
type OpenGuard = dyn Fn(&str) -> Result<(), AgentError> + Send + Sync;

#[derive(Default)]
struct Ledger {
    opened: AtomicUsize,
    stopped: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
    calls: Mutex<Vec<(String, String)>>,
}

/// Deterministic oracle used for tests and offline development.
///
/// Every instruction is answered by a closure, so a test can describe the
/// page behind each session without a live agent.
#[derive(Clone)]
pub struct ScriptedConnector {
    responder: Arc<Responder>,
    open_guard: Option<Arc<OpenGuard>>,
    latency: Duration,
    ledger: Arc<Ledger>,
}

impl ScriptedConnector {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ScriptCall<'_>) -> Result<OracleReply, AgentError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            open_guard: None,
            latency: Duration::ZERO,
            ledger: Arc::new(Ledger::default()),
        }
    }

    /// Reject session creation for pages the guard refuses.
    pub fn with_open_guard<F>(mut self, guard: F) -> Self
    where
        F: Fn(&str) -> Result<(), AgentError> + Send + Sync + 'static,
    {
        self.open_guard = Some(Arc::new(guard));
        self
    }

    /// Delay applied to every instruction, to make overlap observable.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn opened(&self) -> usize {
        self.ledger.opened.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.ledger.stopped.load(Ordering::SeqCst)
    }

    /// Highest number of sessions that were open at the same time.
    pub fn peak_active(&self) -> usize {
        self.ledger.peak_active.load(Ordering::SeqCst)
    }

    /// `(starting_page, prompt)` for every instruction received so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.ledger.calls.lock().clone()
    }
}

#[async_trait]
impl OracleConnector for ScriptedConnector {
    async fn open(&self, starting_page: &str) -> Result<Box<dyn OracleSession>, AgentError> {
        if let Some(guard) = &self.open_guard {
            guard(starting_page)?;
        }
        let seq = self.ledger.opened.fetch_add(1, Ordering::SeqCst);
        let active = self.ledger.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.ledger.peak_active.fetch_max(active, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            id: format!("scripted-{seq}"),
            starting_page: starting_page.to_string(),
            calls: 0,
            stopped: false,
            connector: self.clone(),
        }))
    }
}

struct ScriptedSession {
    id: String,
    starting_page: String,
    calls: usize,
    stopped: bool,
    connector: ScriptedConnector,
}

#[async_trait]
impl OracleSession for ScriptedSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn invoke(&mut self, instruction: &Instruction) -> Result<OracleReply, AgentError> {
        if self.stopped {
            return Err(AgentError::instruction("session already stopped"));
        }
        if !self.connector.latency.is_zero() {
            tokio::time::sleep(self.connector.latency).await;
        }
        self.connector
            .ledger
            .calls
            .lock()
            .push((self.starting_page.clone(), instruction.prompt.clone()));
        let call = ScriptCall {
            starting_page: &self.starting_page,
            instruction,
            call_index: self.calls,
        };
        self.calls += 1;
        (self.connector.responder)(&call)
    }

    async fn stop(&mut self) -> Result<(), AgentError> {
        if !self.stopped {
            self.stopped = true;
            self.connector.ledger.stopped.fetch_add(1, Ordering::SeqCst);
            self.connector.ledger.active.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
