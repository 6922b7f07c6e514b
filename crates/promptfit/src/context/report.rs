//! Diagnostics for fill passes, reductions, and send attempts.
//!
//! The [`ContextWindowManager`](super::ContextWindowManager) reports what it
//! decided through [`BudgetEvent`]s delivered to a [`BudgetObserver`]. None of
//! this affects the assembled prompt.
//!
//! | Observer | Use case |
//! |----------|----------|
//! | [`NoopObserver`] | Default; discard everything |
//! | [`LoggingObserver`] | Structured logging via `tracing` |
//! | [`FnObserver`] | Quick closures |
//! | [`RecordingObserver`] | Keep fill reports and reductions for inspection |

use super::fill::FillOutcome;
use super::reduce::Reduction;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Events emitted by the manager.
#[derive(Debug)]
pub enum BudgetEvent<'a> {
    /// The model's tokenizer fell back to character counting.
    TokenizerDegraded { model: &'a str, encoding: &'a str },
    /// A fill pass completed.
    Filled {
        available: usize,
        outcome: &'a FillOutcome,
    },
    /// A generation attempt is starting.
    AttemptStarted { attempt: u32, prompt_tokens: usize },
    /// The client reported the prompt as too large.
    ContextTooLarge { attempt: u32, message: &'a str },
    /// The reducer shrank or removed a block.
    Reduced(&'a Reduction),
    /// Nothing left to reduce; the request fails.
    Exhausted { attempts: u32 },
    /// Generation finished successfully.
    Succeeded { attempts: u32 },
    /// The caller cancelled generation.
    Cancelled { attempt: u32 },
}

/// Receives [`BudgetEvent`]s.
pub trait BudgetObserver: Send + Sync {
    fn on_event(&self, event: &BudgetEvent<'_>) {
        let _ = event;
    }
}

pub struct NoopObserver;
impl BudgetObserver for NoopObserver {}

/// Logs every event through `tracing`.
pub struct LoggingObserver;

impl BudgetObserver for LoggingObserver {
    fn on_event(&self, event: &BudgetEvent<'_>) {
        match event {
            BudgetEvent::TokenizerDegraded { model, encoding } => {
                warn!("Token counts for {model} use {encoding}; budget is approximate");
            }
            BudgetEvent::Filled { available, outcome } => {
                info!(
                    "Context filled: {}/{} tokens, included={:?}, truncated={:?}, excluded={:?}",
                    outcome.used_tokens(),
                    available,
                    outcome.included_names(),
                    outcome.truncated_names(),
                    outcome.excluded_names,
                );
            }
            BudgetEvent::AttemptStarted {
                attempt,
                prompt_tokens,
            } => {
                debug!("Generation attempt {attempt} (~{prompt_tokens} prompt tokens)");
            }
            BudgetEvent::ContextTooLarge { attempt, message } => {
                warn!("Attempt {attempt} rejected as too large: {message}");
            }
            BudgetEvent::Reduced(reduction) => {
                info!(
                    "Reduced {} ({:?}), freed {} tokens",
                    reduction.name,
                    reduction.action,
                    reduction.freed_tokens()
                );
            }
            BudgetEvent::Exhausted { attempts } => {
                warn!("No reducible context left after {attempts} attempt(s)");
            }
            BudgetEvent::Succeeded { attempts } => {
                debug!("Generation succeeded after {attempts} attempt(s)");
            }
            BudgetEvent::Cancelled { attempt } => {
                info!("Generation cancelled during attempt {attempt}");
            }
        }
    }
}

/// An observer backed by a closure.
pub struct FnObserver<F>(F)
where
    F: Fn(&BudgetEvent<'_>) + Send + Sync;

impl<F> FnObserver<F>
where
    F: Fn(&BudgetEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> BudgetObserver for FnObserver<F>
where
    F: Fn(&BudgetEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &BudgetEvent<'_>) {
        (self.0)(event)
    }
}

/// Owned summary of one fill pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillReport {
    pub available: usize,
    pub used: usize,
    pub included: Vec<String>,
    pub truncated: Vec<String>,
    pub excluded: Vec<String>,
}

impl FillReport {
    pub fn new(available: usize, outcome: &FillOutcome) -> Self {
        Self {
            available,
            used: outcome.used_tokens(),
            included: outcome.included_names().into_iter().map(String::from).collect(),
            truncated: outcome.truncated_names().into_iter().map(String::from).collect(),
            excluded: outcome.excluded_names.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Recorded {
    fills: Vec<FillReport>,
    reductions: Vec<Reduction>,
    attempts: u32,
}

/// Keeps fill reports, reductions and the attempt count.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    inner: Mutex<Recorded>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fills(&self) -> Vec<FillReport> {
        self.lock().fills.clone()
    }

    /// The most recent fill report.
    pub fn last_fill(&self) -> Option<FillReport> {
        self.lock().fills.last().cloned()
    }

    pub fn reductions(&self) -> Vec<Reduction> {
        self.lock().reductions.clone()
    }

    pub fn attempts(&self) -> u32 {
        self.lock().attempts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BudgetObserver for RecordingObserver {
    fn on_event(&self, event: &BudgetEvent<'_>) {
        let mut inner = self.lock();
        match event {
            BudgetEvent::Filled { available, outcome } => {
                inner.fills.push(FillReport::new(*available, outcome));
            }
            BudgetEvent::Reduced(reduction) => inner.reductions.push((*reduction).clone()),
            BudgetEvent::AttemptStarted { .. } => inner.attempts += 1,
            _ => {}
        }
    }
}

impl<T: BudgetObserver + ?Sized> BudgetObserver for std::sync::Arc<T> {
    fn on_event(&self, event: &BudgetEvent<'_>) {
        (**self).on_event(event)
    }
}
