//! Trial parameter input form.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use serde_json::{Map, Value};

use crate::domain::{Domain, Feature, TrialFeatureRecord};
use crate::tui::styles::TrialTheme;

/// Starting value of the minimum age input.
pub const DEFAULT_MIN_AGE: u16 = 18;

/// Widget backing one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldInput {
    /// Select box, cycled with ←/→
    Choice {
        options: &'static [&'static str],
        index: usize,
    },
    /// True/False radio
    Flag(bool),
    /// Bounded integer input
    Number { value: u16, min: u16, max: u16 },
}

impl FieldInput {
    fn for_feature(feature: Feature) -> Self {
        match feature.domain() {
            Domain::Choices(options) => Self::Choice { options, index: 0 },
            Domain::Flag => Self::Flag(true),
            Domain::Range { min, max } => {
                let (min, max) = (min.round() as u16, max.round() as u16);
                Self::Number {
                    value: DEFAULT_MIN_AGE.clamp(min, max),
                    min,
                    max,
                }
            }
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Choice { options, index } => Value::from(options[*index]),
            Self::Flag(value) => Value::Bool(*value),
            Self::Number { value, .. } => Value::from(*value),
        }
    }

    /// Text shown inside the field box.
    fn display(&self) -> String {
        match self {
            Self::Choice { options, index } => {
                format!("◀ {} ▶  ({}/{})", options[*index], index + 1, options.len())
            }
            Self::Flag(value) => {
                let (yes, no) = if *value { ("●", "○") } else { ("○", "●") };
                format!("{yes} True   {no} False")
            }
            Self::Number { value, .. } => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub feature: Feature,
    pub input: FieldInput,
}

/// Trial form state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialFormState {
    pub fields: Vec<FormField>,
    pub selected_field: usize,
    /// Widget-level complaint, cleared on the next accepted edit
    pub notice: Option<String>,
}

impl Default for TrialFormState {
    fn default() -> Self {
        Self {
            fields: Feature::ALL
                .iter()
                .map(|&feature| FormField {
                    feature,
                    input: FieldInput::for_feature(feature),
                })
                .collect(),
            selected_field: 0,
            notice: None,
        }
    }
}

impl TrialFormState {
    pub fn next_field(&mut self) {
        self.selected_field = (self.selected_field + 1) % self.fields.len();
    }

    pub fn prev_field(&mut self) {
        if self.selected_field == 0 {
            self.selected_field = self.fields.len() - 1;
        } else {
            self.selected_field -= 1;
        }
    }

    fn current(&mut self) -> &mut FieldInput {
        &mut self.fields[self.selected_field].input
    }

    /// ←/→ on the focused field: cycle options, flip the radio or step the number.
    pub fn cycle(&mut self, forward: bool) {
        self.notice = None;
        if matches!(self.current(), FieldInput::Number { .. }) {
            self.step(if forward { 1 } else { -1 });
            return;
        }
        match self.current() {
            FieldInput::Choice { options, index } => {
                let len = options.len();
                *index = if forward {
                    (*index + 1) % len
                } else {
                    (*index + len - 1) % len
                };
            }
            FieldInput::Flag(value) => *value = !*value,
            FieldInput::Number { .. } => {}
        }
    }

    /// Space on the radio field.
    pub fn toggle(&mut self) {
        if let FieldInput::Flag(value) = self.current() {
            *value = !*value;
        }
    }

    /// `+`/`-` on the number field, saturating at the bounds.
    pub fn step(&mut self, delta: i32) {
        if let FieldInput::Number { value, min, max } = self.current() {
            let next = (i32::from(*value) + delta).clamp(i32::from(*min), i32::from(*max));
            *value = u16::try_from(next).unwrap_or(*min);
        }
    }

    /// Append a digit to the number field; values past the bound are refused.
    pub fn input_digit(&mut self, digit: u32) {
        let feature = self.fields[self.selected_field].feature;
        let mut rejected = None;
        if let FieldInput::Number { value, min, max } = self.current() {
            let candidate = u32::from(*value) * 10 + digit;
            if candidate > u32::from(*max) {
                rejected = Some(format!(
                    "{} must be between {min} and {max}",
                    feature.label()
                ));
            } else {
                *value = u16::try_from(candidate).unwrap_or(*max).max(*min);
            }
        }
        self.notice = rejected;
    }

    pub fn delete_digit(&mut self) {
        if let FieldInput::Number { value, min, .. } = self.current() {
            *value = (*value / 10).max(*min);
        }
        self.notice = None;
    }

    /// The request body for the current selections.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|field| (field.feature.name().to_string(), field.input.to_json()))
            .collect();
        Value::Object(map)
    }

    /// Assemble the full record.
    ///
    /// # Errors
    /// Only if the widgets produced something the record cannot hold.
    pub fn to_record(&self) -> Result<TrialFeatureRecord, String> {
        TrialFeatureRecord::from_json(&self.to_payload()).map_err(|e| e.to_string())
    }
}

/// Render the trial parameter form
pub fn render_trial_form(f: &mut Frame, area: Rect, state: &TrialFormState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Header
            Constraint::Min(0),    // Fields
            Constraint::Length(2), // Footer/notice
        ])
        .split(area);

    render_form_header(f, chunks[0]);
    render_form_fields(f, chunks[1], state);
    render_form_footer(f, chunks[2], state);
}

fn render_form_header(f: &mut Frame, area: Rect) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(" ", TrialTheme::text()),
        Span::styled("Trial Parameters", TrialTheme::subtitle()),
        Span::styled(
            " │ Enter the study characteristics",
            TrialTheme::text_secondary(),
        ),
    ]))
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(TrialTheme::border()),
    );

    f.render_widget(header, area);
}

fn render_form_fields(f: &mut Frame, area: Rect, state: &TrialFormState) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .horizontal_margin(1)
        .split(area);

    let mid = (state.fields.len() + 1) / 2;

    render_field_column(f, columns[0], &state.fields[..mid], 0, state.selected_field);
    render_field_column(
        f,
        columns[1],
        &state.fields[mid..],
        mid,
        state.selected_field,
    );
}

fn render_field_column(
    f: &mut Frame,
    area: Rect,
    fields: &[FormField],
    offset: usize,
    selected: usize,
) {
    let constraints: Vec<Constraint> = fields
        .iter()
        .map(|_| Constraint::Length(3))
        .chain(std::iter::once(Constraint::Min(0)))
        .collect();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    for (i, field) in fields.iter().enumerate() {
        let is_selected = offset + i == selected;
        let (border_style, title_style, value_style) = if is_selected {
            (
                TrialTheme::border_focused(),
                TrialTheme::focused(),
                TrialTheme::selected(),
            )
        } else {
            (
                TrialTheme::border(),
                TrialTheme::text_secondary(),
                TrialTheme::text(),
            )
        };

        let block = Block::default()
            .title(Span::styled(
                format!(" {} ", field.feature.label()),
                title_style,
            ))
            .borders(Borders::ALL)
            .border_style(border_style);

        let mut spans = vec![
            Span::raw(" "),
            Span::styled(field.input.display(), value_style),
        ];
        if is_selected {
            spans.push(Span::styled(
                format!("  {}", field.feature.help()),
                TrialTheme::text_muted(),
            ));
        }

        f.render_widget(Paragraph::new(Line::from(spans)).block(block), chunks[i]);
    }
}

fn render_form_footer(f: &mut Frame, area: Rect, state: &TrialFormState) {
    let content = if let Some(notice) = &state.notice {
        Line::from(vec![
            Span::styled("! ", TrialTheme::warning()),
            Span::styled(notice.clone(), TrialTheme::warning()),
        ])
    } else {
        Line::from(vec![
            Span::styled("[↑↓] ", TrialTheme::key_hint()),
            Span::styled("Field ", TrialTheme::key_desc()),
            Span::styled("[←→] ", TrialTheme::key_hint()),
            Span::styled("Change ", TrialTheme::key_desc()),
            Span::styled("[0-9 +/-] ", TrialTheme::key_hint()),
            Span::styled("Age ", TrialTheme::key_desc()),
            Span::styled("[Enter] ", TrialTheme::key_hint()),
            Span::styled("Generate Predictions ", TrialTheme::key_desc()),
            Span::styled("[H] ", TrialTheme::key_hint()),
            Span::styled("Health ", TrialTheme::key_desc()),
            Span::styled("[R] ", TrialTheme::key_hint()),
            Span::styled("Reset ", TrialTheme::key_desc()),
            Span::styled("[A] ", TrialTheme::key_hint()),
            Span::styled("About ", TrialTheme::key_desc()),
            Span::styled("[Q] ", TrialTheme::key_hint()),
            Span::styled("Quit", TrialTheme::key_desc()),
        ])
    };

    let footer = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(TrialTheme::border()),
    );

    f.render_widget(footer, area);
}
