//! # Progress Reporter
//!
//! Rende visibile la subscription del progress simulator: progress bar con
//! `indicatif` oppure eventi JSON `progress`, a seconda della modalità.

use crate::json_output::JsonMessage;
use crate::progress::ProgressState;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    Bar,
    Json,
    Silent,
}

/// Background task following a progress subscription
pub struct ProgressReporter {
    bar: Option<ProgressBar>,
    task: JoinHandle<()>,
}

impl ProgressReporter {
    pub fn spawn(mut rx: watch::Receiver<ProgressState>, mode: ReportMode) -> Self {
        let bar = (mode == ReportMode::Bar).then(styled_bar);
        let task_bar = bar.clone();

        let task = tokio::spawn(async move {
            let mut last: Option<ProgressState> = None;
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                if !should_report(last.as_ref(), &state) {
                    continue;
                }
                match (mode, &task_bar) {
                    (ReportMode::Bar, Some(bar)) => render(bar, &state),
                    (ReportMode::Json, _) => JsonMessage::progress(&state).emit(),
                    _ => {}
                }
                last = Some(state);
            }
        });

        Self { bar, task }
    }

    /// Stop following and leave the bar at 100% with a summary
    pub fn finish(self, summary: &str) {
        self.task.abort();
        if let Some(bar) = self.bar {
            bar.set_position(100);
            bar.finish_with_message(summary.to_string());
        }
    }

    /// Stop following and leave the bar where it stopped
    pub fn abandon(self, message: &str) {
        self.task.abort();
        if let Some(bar) = self.bar {
            bar.abandon_with_message(message.to_string());
        }
    }
}

fn styled_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
    {
        bar.set_style(style.progress_chars("=>-"));
    }
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn render(bar: &ProgressBar, state: &ProgressState) {
    bar.set_position(state.percent as u64);
    bar.set_message(state.message.clone());
}

/// Skip updates that change nothing a reader would see
fn should_report(last: Option<&ProgressState>, state: &ProgressState) -> bool {
    match last {
        Some(last) => {
            last.percent != state.percent || last.message != state.message || last.visible != state.visible
        }
        None => state.visible || state.is_active,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(percent: u8, message: &str) -> ProgressState {
        ProgressState {
            percent,
            message_index: 0,
            message: message.to_string(),
            is_active: true,
            visible: true,
        }
    }

    #[test]
    fn test_should_report_changes_only() {
        let first = state(10, "📖 Analyzing PDF structure...");
        assert!(should_report(None, &first));
        assert!(!should_report(Some(&first), &first.clone()));
        assert!(should_report(Some(&first), &state(12, "📖 Analyzing PDF structure...")));
        assert!(should_report(Some(&first), &state(10, "Page 2")));
        assert!(!should_report(None, &ProgressState::default()));
    }

    #[test]
    fn test_render_updates_bar() {
        let bar = ProgressBar::hidden();
        bar.set_length(100);
        render(&bar, &state(42, "⚙️ Applying compression..."));
        assert_eq!(bar.position(), 42);
        assert_eq!(bar.message(), "⚙️ Applying compression...");
    }

    #[tokio::test]
    async fn test_silent_reporter_stops_with_sender() {
        let (tx, rx) = watch::channel(ProgressState::default());
        let reporter = ProgressReporter::spawn(rx, ReportMode::Silent);
        tx.send_replace(state(5, "start"));
        drop(tx);
        reporter.task.await.unwrap();
    }
}
