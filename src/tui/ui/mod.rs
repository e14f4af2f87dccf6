//! UI module: View components for the TUI.

pub mod form;
pub mod results;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::domain::TARGET_NAMES;
use crate::tui::styles::{TrialTheme, TITLE};
use crate::tui::worker::ApiStatus;

pub fn render_header(f: &mut Frame, area: Rect, api_url: &str, status: &ApiStatus) {
    let indicator = match status {
        ApiStatus::Unknown => "● unknown".to_string(),
        ApiStatus::Checking => "● checking...".to_string(),
        ApiStatus::Healthy => "● API is healthy".to_string(),
        ApiStatus::Unhealthy(reason) => format!("● API health check failed: {reason}"),
        ApiStatus::Unreachable(_) => "● Cannot reach API".to_string(),
    };

    let header = Paragraph::new(vec![
        Line::from(Span::styled(format!(" {TITLE} "), TrialTheme::header())),
        Line::from(vec![
            Span::styled(format!(" {api_url} "), TrialTheme::text_secondary()),
            Span::styled(indicator, TrialTheme::api_status(status)),
        ]),
    ])
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(TrialTheme::border()),
    );

    f.render_widget(header, area);
}

pub fn render_disclaimer(f: &mut Frame, area: Rect) {
    let text = vec![Line::from(vec![Span::styled(
        "Predictions are estimates based on historical data and should be used for planning purposes only.",
        TrialTheme::text_muted(),
    )])];

    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(TrialTheme::border());

    let p = Paragraph::new(text).block(block).wrap(Wrap { trim: true });

    f.render_widget(p, area);
}

/// Model description and usage instructions.
pub fn render_about(f: &mut Frame, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(2)])
        .margin(1)
        .split(area);

    let mut text = vec![
        Line::from(Span::styled("About", TrialTheme::subtitle())),
        Line::from(Span::styled(
            "This client queries an XGBoost model that predicts the rate of adverse events \
             in clinical trials from trial characteristics. The model was trained on publicly \
             available data from ClinicalTrials.gov (https://clinicaltrials.gov/).",
            TrialTheme::text(),
        )),
        Line::from(""),
        Line::from(Span::styled("Predictions include:", TrialTheme::title())),
    ];
    for (name, label) in TARGET_NAMES.iter().zip([
        "Rate of Deaths",
        "Rate of Serious Adverse Events",
        "Rate of Other Adverse Events",
    ]) {
        text.push(Line::from(vec![
            Span::styled(format!("  • {label} "), TrialTheme::text()),
            Span::styled(format!("({name})"), TrialTheme::text_muted()),
        ]));
    }
    text.extend([
        Line::from(""),
        Line::from(Span::styled("Instructions", TrialTheme::subtitle())),
        Line::from(Span::styled(
            "  1. Fill in all trial parameters",
            TrialTheme::text(),
        )),
        Line::from(Span::styled(
            "  2. Press Enter to generate predictions",
            TrialTheme::text(),
        )),
        Line::from(Span::styled(
            "  3. Review the predicted outcomes",
            TrialTheme::text(),
        )),
    ]);

    f.render_widget(Paragraph::new(text).wrap(Wrap { trim: false }), chunks[0]);

    let footer = Paragraph::new(Line::from(vec![
        Span::styled("[Esc/A] ", TrialTheme::key_hint()),
        Span::styled("Back to form ", TrialTheme::key_desc()),
        Span::styled("[Q] ", TrialTheme::key_hint()),
        Span::styled("Quit", TrialTheme::key_desc()),
    ]))
    .block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(TrialTheme::border()),
    );
    f.render_widget(footer, chunks[1]);
}
