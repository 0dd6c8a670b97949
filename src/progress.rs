//! # Progress Simulation Module
//!
//! Questo modulo produce una percentuale di avanzamento percepita, disaccoppiata
//! dal completamento reale del lavoro.
//!
//! ## Responsabilità:
//! - Avanzamento su cadenza casuale (default 300-500 ms) con incrementi casuali
//! - Soft ceiling a 95%: solo `complete()` porta al 100%
//! - Messaggi di stato scelti in base alla percentuale, mai all'indietro
//! - Checkpoint reali delle strategie (`advance_checkpoint`): il messaggio
//!   resta visibile fino al checkpoint successivo, i tick avanzano solo
//!   la percentuale e `message_index`
//! - Pubblicazione dello stato tramite `tokio::sync::watch`
//!
//! ## Regole di finalizzazione:
//! - `complete()` e `cancel()` sono idempotenti e vincono sui tick in volo:
//!   ogni tick controlla `is_active` e il contatore di generazione sotto lo
//!   stesso lock
//! - `complete()` nasconde la barra dopo un ritardo fisso (default 1 s)
//! - `cancel()` la nasconde subito senza toccare la percentuale
//!
//! ## Esempio:
//! ```ignore
//! let progress = ProgressSimulator::new(ProgressSettings::default());
//! let mut rx = progress.subscribe();
//! progress.start(default_messages());
//! progress.advance_checkpoint("📤 Uploading document...", Some(30));
//! progress.complete();
//! ```

use rand::Rng;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Status messages shown while a compression runs
pub const DEFAULT_MESSAGES: [&str; 6] = [
    "🔧 Connecting to compression engine...",
    "📖 Analyzing PDF structure...",
    "🎨 Optimizing embedded images...",
    "⚙️ Applying compression...",
    "🔬 Verifying output quality...",
    "✨ Finalizing optimized PDF...",
];

pub fn default_messages() -> Vec<String> {
    DEFAULT_MESSAGES.iter().map(|m| m.to_string()).collect()
}

/// Tuning of the simulated progress
#[derive(Debug, Clone)]
pub struct ProgressSettings {
    pub tick_min: Duration,
    pub tick_max: Duration,
    pub increment_min: u8,
    pub increment_max: u8,
    /// Highest percentage reachable without `complete()`
    pub ceiling: u8,
    pub hide_delay: Duration,
    pub done_message: String,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            tick_min: Duration::from_millis(300),
            tick_max: Duration::from_millis(500),
            increment_min: 3,
            increment_max: 20,
            ceiling: 95,
            hide_delay: Duration::from_secs(1),
            done_message: "✅ Compression complete!".to_string(),
        }
    }
}

/// Snapshot published to subscribers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressState {
    pub percent: u8,
    pub message_index: usize,
    pub message: String,
    pub is_active: bool,
    pub visible: bool,
}

struct Inner {
    state: ProgressState,
    messages: Vec<String>,
    /// A real checkpoint message is showing
    pinned: bool,
    generation: u64,
    ticker: Option<JoinHandle<()>>,
}

struct Shared {
    inner: Mutex<Inner>,
    tx: watch::Sender<ProgressState>,
    settings: ProgressSettings,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, inner: &Inner) {
        self.tx.send_replace(inner.state.clone());
    }

    /// Apply one tick; false once the run it belongs to is over
    fn tick(&self, generation: u64, increment: u8) -> bool {
        let mut inner = self.lock();
        if !inner.state.is_active || inner.generation != generation {
            return false;
        }

        let ceiling = self.settings.ceiling;
        inner.state.percent = inner.state.percent.saturating_add(increment).min(ceiling);

        let count = inner.messages.len();
        if count > 0 {
            let index = (inner.state.percent as usize * count / 100).min(count - 1);
            if index > inner.state.message_index {
                inner.state.message_index = index;
                if !inner.pinned {
                    inner.state.message = inner.messages[index].clone();
                }
            }
        }

        self.publish(&inner);
        inner.state.percent < ceiling
    }
}

/// Bounded, monotonic, timer-driven progress indicator
#[derive(Clone)]
pub struct ProgressSimulator {
    shared: Arc<Shared>,
}

impl ProgressSimulator {
    pub fn new(settings: ProgressSettings) -> Self {
        let (tx, _) = watch::channel(ProgressState::default());
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: ProgressState::default(),
                    messages: Vec::new(),
                    pinned: false,
                    generation: 0,
                    ticker: None,
                }),
                tx,
                settings,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressState> {
        self.shared.tx.subscribe()
    }

    pub fn snapshot(&self) -> ProgressState {
        self.shared.lock().state.clone()
    }

    /// Reset to 0% and start ticking
    pub fn start(&self, messages: Vec<String>) {
        let mut inner = self.shared.lock();
        if let Some(ticker) = inner.ticker.take() {
            ticker.abort();
        }
        inner.generation += 1;
        inner.state = ProgressState {
            percent: 0,
            message_index: 0,
            message: messages.first().cloned().unwrap_or_default(),
            is_active: true,
            visible: true,
        };
        inner.messages = messages;
        inner.pinned = false;
        self.shared.publish(&inner);

        let generation = inner.generation;
        inner.ticker = Some(tokio::spawn(run_ticker(Arc::downgrade(&self.shared), generation)));
        debug!("Progress run {} started", generation);
    }

    /// Show a real checkpoint; the percentage only moves forward
    pub fn advance_checkpoint(&self, message: impl Into<String>, percent_hint: Option<u8>) {
        let mut inner = self.shared.lock();
        if !inner.state.is_active {
            return;
        }
        if let Some(hint) = percent_hint {
            let hint = hint.min(self.shared.settings.ceiling);
            inner.state.percent = inner.state.percent.max(hint);
        }
        inner.state.message = message.into();
        inner.pinned = true;
        self.shared.publish(&inner);
    }

    /// Jump to 100% and hide after the configured delay
    pub fn complete(&self) {
        let mut inner = self.shared.lock();
        if !self.finalize(&mut inner) {
            return;
        }
        inner.state.percent = 100;
        inner.state.message = self.shared.settings.done_message.clone();

        let hide_delay = self.shared.settings.hide_delay;
        if hide_delay.is_zero() {
            inner.state.visible = false;
            self.shared.publish(&inner);
            return;
        }
        self.shared.publish(&inner);

        let generation = inner.generation;
        let shared = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(hide_delay).await;
            if let Some(shared) = shared.upgrade() {
                let mut inner = shared.lock();
                if inner.generation == generation && !inner.state.is_active {
                    inner.state.visible = false;
                    shared.publish(&inner);
                }
            }
        });
    }

    /// Stop and hide immediately, keeping the last percentage
    pub fn cancel(&self) {
        let mut inner = self.shared.lock();
        if !self.finalize(&mut inner) {
            return;
        }
        inner.state.visible = false;
        self.shared.publish(&inner);
    }

    /// Stop ticking; false if the run was already finalized
    fn finalize(&self, inner: &mut Inner) -> bool {
        if !inner.state.is_active {
            return false;
        }
        inner.state.is_active = false;
        inner.generation += 1;
        if let Some(ticker) = inner.ticker.take() {
            ticker.abort();
        }
        true
    }
}

impl Default for ProgressSimulator {
    fn default() -> Self {
        Self::new(ProgressSettings::default())
    }
}

async fn run_ticker(shared: Weak<Shared>, generation: u64) {
    loop {
        let Some((delay, increment)) = shared.upgrade().map(|s| next_tick(&s.settings)) else {
            return;
        };
        tokio::time::sleep(delay).await;

        let Some(shared) = shared.upgrade() else {
            return;
        };
        if !shared.tick(generation, increment) {
            return;
        }
    }
}

fn next_tick(settings: &ProgressSettings) -> (Duration, u8) {
    let mut rng = rand::rng();
    let lo = settings.tick_min.min(settings.tick_max).as_millis() as u64;
    let hi = settings.tick_min.max(settings.tick_max).as_millis() as u64;
    let inc_lo = settings.increment_min.min(settings.increment_max);
    let inc_hi = settings.increment_min.max(settings.increment_max);
    (
        Duration::from_millis(rng.random_range(lo..=hi)),
        rng.random_range(inc_lo..=inc_hi),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulator() -> ProgressSimulator {
        ProgressSimulator::default()
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_stay_below_ceiling() {
        let progress = simulator();
        progress.start(default_messages());

        tokio::time::sleep(Duration::from_secs(60)).await;

        let state = progress.snapshot();
        assert_eq!(state.percent, 95);
        assert!(state.is_active);
        assert!(state.visible);
        assert_eq!(state.message_index, DEFAULT_MESSAGES.len() - 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_never_regresses() {
        let progress = simulator();
        progress.start(default_messages());

        let mut last = progress.snapshot();
        for step in 0..100 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if step == 20 {
                progress.advance_checkpoint("📤 Uploading document...", Some(5));
            }
            let now = progress.snapshot();
            assert!(now.percent >= last.percent);
            assert!(now.message_index >= last.message_index);
            last = now;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkpoint_hint_is_capped() {
        let progress = simulator();
        progress.start(default_messages());

        progress.advance_checkpoint("Page 3 of 4", Some(99));
        let state = progress.snapshot();
        assert_eq!(state.percent, 95);
        assert_eq!(state.message, "Page 3 of 4");
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkpoint_message_survives_ticks() {
        let progress = simulator();
        progress.start(default_messages());

        progress.advance_checkpoint("Page 3 of 4", None);
        tokio::time::sleep(Duration::from_secs(60)).await;

        let state = progress.snapshot();
        assert_eq!(state.message, "Page 3 of 4");
        assert_eq!(state.percent, 95);
        assert_eq!(state.message_index, DEFAULT_MESSAGES.len() - 1);

        progress.advance_checkpoint("Page 4 of 4", None);
        assert_eq!(progress.snapshot().message, "Page 4 of 4");

        progress.complete();
        assert_eq!(progress.snapshot().message, "✅ Compression complete!");

        progress.start(default_messages());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(progress.snapshot().message, DEFAULT_MESSAGES[DEFAULT_MESSAGES.len() - 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_then_hide() {
        let progress = simulator();
        let rx = progress.subscribe();
        progress.start(default_messages());
        tokio::time::sleep(Duration::from_secs(2)).await;

        progress.complete();
        let state = rx.borrow().clone();
        assert_eq!(state.percent, 100);
        assert!(!state.is_active);
        assert!(state.visible);
        assert_eq!(state.message, "✅ Compression complete!");

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(!progress.snapshot().visible);
        assert_eq!(progress.snapshot().percent, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalization_is_idempotent() {
        let progress = simulator();
        progress.start(default_messages());
        progress.complete();
        let after_complete = progress.snapshot();

        progress.complete();
        progress.cancel();
        progress.advance_checkpoint("late checkpoint", Some(50));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(progress.snapshot(), after_complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_hides_immediately() {
        let progress = simulator();
        progress.start(default_messages());
        tokio::time::sleep(Duration::from_secs(1)).await;
        let before = progress.snapshot().percent;

        progress.cancel();
        let state = progress.snapshot();
        assert!(!state.visible);
        assert!(!state.is_active);
        assert_eq!(state.percent, before);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(progress.snapshot().percent, before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_ignores_previous_hide() {
        let progress = simulator();
        progress.start(default_messages());
        progress.complete();

        progress.start(default_messages());
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let state = progress.snapshot();
        assert!(state.visible);
        assert!(state.is_active);
        assert!(state.percent < 100);
    }
}
