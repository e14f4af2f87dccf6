//! TUI module: Terminal User Interface using Ratatui.
//!
//! Provides the trial parameter form, the prediction readouts and an about
//! view, with every network call on a background worker.

mod app;
mod styles;
mod ui;
mod worker;

pub use app::{App, Screen};
pub use styles::TrialTheme;
pub use worker::{ApiStatus, PredictionOutcome, PredictionProgress, PredictionWorker, WorkerHandle};
