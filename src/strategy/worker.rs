//! # Worker Channel Strategy
//!
//! Canale bidirezionale persistente verso un worker fuori processo.
//!
//! ## Protocollo (JSON una riga per messaggio):
//! - Comandi → worker: `compress` (job, path di input/output, preset), `cancel`
//! - Eventi ← worker: `progress` (molti), `done` oppure `error` (terminali)
//!
//! ## Gestione risorse:
//! - Il documento viene trasferito tramite una directory temporanea posseduta
//!   dal singolo tentativo; al termine (successo, errore, timeout o
//!   cancellazione) la directory viene rilasciata
//! - Timeout rigido (default 5 minuti) → `Timeout` + comando `cancel`
//! - Un solo job in volo per canale (lock sul ricevitore eventi)
//!
//! ## Esempio:
//! ```ignore
//! let worker = WorkerChannel::spawn("gs-worker", &[], Duration::from_secs(300))?;
//! let outcome = worker.attempt(&source, QualityTier::Balanced, &|cp| println!("{}", cp.message)).await?;
//! ```

use super::{Checkpoint, CompressionOutcome, CompressionStrategy, OnCheckpoint, OutcomeArtifact, StrategyKind};
use crate::artifact::SourceArtifact;
use crate::error::{OptimizeError, OptimizeResult};
use crate::quality::{self, QualityTier, WorkerPreset};
use crate::stats::VerificationStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Default hard timeout for one job
pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(300);

const CHANNEL_CAPACITY: usize = 64;

/// Message sent to the worker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerCommand {
    Compress {
        job_id: u64,
        input_path: PathBuf,
        output_path: PathBuf,
        quality: QualityTier,
        preset: WorkerPreset,
    },
    Cancel {
        job_id: u64,
    },
}

/// Message received from the worker
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerEvent {
    Progress {
        #[serde(default)]
        job_id: Option<u64>,
        message: String,
        #[serde(default)]
        percent: Option<u8>,
    },
    Done {
        job_id: u64,
    },
    Error {
        #[serde(default)]
        job_id: Option<u64>,
        message: String,
    },
}

/// Out-of-process worker reached through a message channel
pub struct WorkerChannel {
    label: String,
    commands: mpsc::Sender<WorkerCommand>,
    events: Mutex<mpsc::Receiver<WorkerEvent>>,
    timeout: Duration,
    next_job: AtomicU64,
    _child: Option<std::sync::Mutex<Child>>,
}

impl WorkerChannel {
    /// Wrap an existing channel pair (in-process workers, tests)
    pub fn from_channels(
        label: impl Into<String>,
        commands: mpsc::Sender<WorkerCommand>,
        events: mpsc::Receiver<WorkerEvent>,
        timeout: Duration,
    ) -> Self {
        Self {
            label: label.into(),
            commands,
            events: Mutex::new(events),
            timeout,
            next_job: AtomicU64::new(1),
            _child: None,
        }
    }

    /// Spawn the worker process and bridge its stdin/stdout to the channel
    pub fn spawn(program: &str, args: &[String], timeout: Duration) -> OptimizeResult<Self> {
        let unavailable = |reason: String| OptimizeError::StrategyUnavailable {
            strategy: StrategyKind::WorkerChannel,
            remediation: reason,
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| unavailable(format!("Failed to start worker '{}': {}. Check that it is installed.", program, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| unavailable(format!("Worker '{}' has no stdin pipe", program)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| unavailable(format!("Worker '{}' has no stdout pipe", program)))?;

        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            if let Err(e) = pump_commands(stdin, command_rx).await {
                warn!("Worker stdin closed: {}", e);
            }
        });
        tokio::spawn(async move {
            if let Err(e) = pump_events(BufReader::new(stdout), event_tx).await {
                warn!("Worker stdout closed: {}", e);
            }
        });

        info!("🔧 Worker '{}' started (timeout: {:?})", program, timeout);

        let mut channel = Self::from_channels(program, command_tx, event_rx, timeout);
        channel._child = Some(std::sync::Mutex::new(child));
        Ok(channel)
    }

    /// Wait for the terminal event of `job_id`, forwarding progress
    async fn await_terminal(
        &self,
        events: &mut mpsc::Receiver<WorkerEvent>,
        job_id: u64,
        on_checkpoint: OnCheckpoint<'_>,
    ) -> OptimizeResult<()> {
        let ours = |id: Option<u64>| id.map_or(true, |id| id == job_id);

        loop {
            match events.recv().await {
                Some(WorkerEvent::Progress { job_id: id, message, percent }) if ours(id) => {
                    on_checkpoint(Checkpoint {
                        message,
                        percent_hint: percent,
                    });
                }
                Some(WorkerEvent::Done { job_id: id }) if id == job_id => return Ok(()),
                Some(WorkerEvent::Error { job_id: id, message }) if ours(id) => {
                    return Err(OptimizeError::SourceUnprocessable(message));
                }
                Some(other) => debug!("Ignoring worker event for another job: {:?}", other),
                None => return Err(self.unavailable()),
            }
        }
    }
}

#[async_trait]
impl CompressionStrategy for WorkerChannel {
    fn kind(&self) -> StrategyKind {
        StrategyKind::WorkerChannel
    }

    async fn is_ready(&self) -> bool {
        !self.commands.is_closed()
    }

    fn remediation(&self) -> String {
        format!("Worker '{}' is not running. Restart the compression worker.", self.label)
    }

    async fn attempt(
        &self,
        source: &SourceArtifact,
        tier: QualityTier,
        on_checkpoint: OnCheckpoint<'_>,
    ) -> OptimizeResult<CompressionOutcome> {
        let mut events = self.events.lock().await;
        while let Ok(stale) = events.try_recv() {
            debug!("Discarding stale worker event: {:?}", stale);
        }

        let job_id = self.next_job.fetch_add(1, Ordering::Relaxed);

        // Owns the transferred buffer; removed on every exit path
        let workdir = tempfile::tempdir()?;
        let input_path = workdir.path().join("input.pdf");
        let output_path = workdir.path().join("output.pdf");
        tokio::fs::write(&input_path, source.bytes()).await?;

        self.commands
            .send(WorkerCommand::Compress {
                job_id,
                input_path,
                output_path: output_path.clone(),
                quality: tier,
                preset: quality::describe(tier).worker_preset,
            })
            .await
            .map_err(|_| self.unavailable())?;

        on_checkpoint(Checkpoint::new("🚀 Document handed to worker..."));

        match tokio::time::timeout(self.timeout, self.await_terminal(&mut events, job_id, on_checkpoint)).await {
            Ok(Ok(())) => {
                let bytes = tokio::fs::read(&output_path).await.map_err(|e| {
                    OptimizeError::SourceUnprocessable(format!("Worker produced no output: {}", e))
                })?;
                debug!("Worker job {} finished: {} bytes", job_id, bytes.len());
                Ok(CompressionOutcome {
                    artifact: OutcomeArtifact::Payload(bytes),
                    reported: None,
                    verification: VerificationStatus::Verified,
                    strategy: StrategyKind::WorkerChannel,
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!("⏱️ Worker job {} timed out after {:?}", job_id, self.timeout);
                let _ = self.commands.try_send(WorkerCommand::Cancel { job_id });
                Err(OptimizeError::Timeout {
                    strategy: StrategyKind::WorkerChannel,
                    after: self.timeout,
                })
            }
        }
    }
}

/// Serialize commands as JSON lines onto the worker's stdin
pub async fn pump_commands<W>(mut writer: W, mut commands: mpsc::Receiver<WorkerCommand>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = commands.recv().await {
        let mut line = serde_json::to_string(&command)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Parse JSON lines from the worker's stdout; other output is skipped
pub async fn pump_events<R>(reader: R, events: mpsc::Sender<WorkerEvent>) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<WorkerEvent>(line) {
            Ok(event) => {
                if events.send(event).await.is_err() {
                    break;
                }
            }
            Err(e) => debug!("Ignoring worker output '{}': {}", line, e),
        }
    }
    Ok(())
}
