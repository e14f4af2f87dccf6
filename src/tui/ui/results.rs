//! Prediction results panel.

use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Frame,
};

use crate::domain::PredictionRecord;
use crate::tui::styles::TrialTheme;
use crate::tui::worker::PredictionOutcome;

/// Results panel state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResultsState {
    #[default]
    Idle,
    /// Waiting on the service
    Pending { started: Instant, timeout: Duration },
    Complete(PredictionOutcome),
    /// Shown inline; the form stays editable
    Error {
        message: String,
        at: DateTime<Local>,
    },
}

impl ResultsState {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// Label, help text and value for each readout, in output order.
#[must_use]
pub fn readouts(prediction: &PredictionRecord) -> [(&'static str, &'static str, f64); 3] {
    [
        (
            "Deaths Rate",
            "Predicted rate of deaths in the trial",
            prediction.rate_deaths_calc,
        ),
        (
            "Serious Adverse Events Rate",
            "Predicted rate of serious adverse events",
            prediction.rate_serious_aes_calc,
        ),
        (
            "Other Adverse Events Rate",
            "Predicted rate of other adverse events",
            prediction.rate_other_aes_calc,
        ),
    ]
}

#[must_use]
pub fn format_rate(value: f64) -> String {
    format!("{value:.3}")
}

/// Render the results panel
pub fn render_results(f: &mut Frame, area: Rect, state: &ResultsState) {
    let block = Block::default()
        .title(Span::styled(" Prediction Results ", TrialTheme::subtitle()))
        .borders(Borders::ALL)
        .border_style(TrialTheme::border());
    let inner = block.inner(area);
    f.render_widget(block, area);

    match state {
        ResultsState::Idle => {
            let p = Paragraph::new(Line::from(Span::styled(
                "Fill in the trial parameters and press Enter to generate predictions.",
                TrialTheme::text_muted(),
            )))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
            f.render_widget(p, inner);
        }
        ResultsState::Pending { started, timeout } => {
            render_pending(f, inner, started.elapsed(), *timeout);
        }
        ResultsState::Complete(outcome) => render_outcome(f, inner, outcome),
        ResultsState::Error { message, at } => {
            let text = vec![
                Line::from(vec![
                    Span::styled("✗ ", TrialTheme::danger()),
                    Span::styled(message.clone(), TrialTheme::danger()),
                ]),
                Line::from(Span::styled(
                    format!("at {}", at.format("%H:%M:%S")),
                    TrialTheme::text_muted(),
                )),
            ];
            f.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), inner);
        }
    }
}

fn render_pending(f: &mut Frame, area: Rect, elapsed: Duration, timeout: Duration) {
    let ratio = if timeout.is_zero() {
        1.0
    } else {
        (elapsed.as_secs_f64() / timeout.as_secs_f64()).clamp(0.0, 1.0)
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(0)])
        .split(area);

    f.render_widget(
        Paragraph::new(Span::styled("Generating predictions...", TrialTheme::info())),
        chunks[0],
    );

    let gauge = Gauge::default()
        .gauge_style(TrialTheme::gauge(1.0 - ratio))
        .ratio(ratio)
        .label(format!(
            "{:.0}s / {}s",
            elapsed.as_secs_f64(),
            timeout.as_secs()
        ));
    f.render_widget(gauge, chunks[1]);
}

fn render_outcome(f: &mut Frame, area: Rect, outcome: &PredictionOutcome) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(4), Constraint::Length(1)])
        .split(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(rows[0]);

    for (i, (label, help, value)) in readouts(&outcome.prediction).into_iter().enumerate() {
        let text = vec![
            Line::from(Span::styled(label, TrialTheme::text_secondary())),
            Line::from(Span::styled(format_rate(value), TrialTheme::rate())),
            Line::from(Span::styled(help, TrialTheme::text_muted())),
        ];
        let p = Paragraph::new(text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(p, columns[i]);
    }

    let footer = Paragraph::new(Line::from(Span::styled(
        format!(
            "Received {} in {} ms",
            outcome.received_at.format("%H:%M:%S"),
            outcome.elapsed.as_millis()
        ),
        TrialTheme::text_muted(),
    )))
    .alignment(Alignment::Right);
    f.render_widget(footer, rows[1]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readouts_follow_output_order() {
        let prediction = PredictionRecord {
            rate_deaths_calc: 0.022,
            rate_serious_aes_calc: 0.25,
            rate_other_aes_calc: 0.8,
        };
        let labels: Vec<_> = readouts(&prediction)
            .iter()
            .map(|(label, _, value)| format!("{label}: {}", format_rate(*value)))
            .collect();

        assert_eq!(
            labels,
            vec![
                "Deaths Rate: 0.022",
                "Serious Adverse Events Rate: 0.250",
                "Other Adverse Events Rate: 0.800",
            ]
        );
    }

    #[test]
    fn test_pending_flag() {
        assert!(!ResultsState::Idle.is_pending());
        assert!(ResultsState::Pending {
            started: Instant::now(),
            timeout: Duration::from_secs(30)
        }
        .is_pending());
    }
}
