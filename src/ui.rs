use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};

use crate::app::{App, InputField, InputMode};
use crate::search::{star_count, SearchVariant};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, form, status line, panels, footer
    let [header_area, query_area, url_area, status_area, panels_area, footer_area] =
        Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .areas(area);

    render_header(app, frame, header_area);
    render_input(app, frame, query_area, InputField::Query);
    render_input(app, frame, url_area, InputField::Url);
    render_status(app, frame, status_area);

    let panel_areas: [Rect; 3] =
        Layout::horizontal([Constraint::Ratio(1, 3); 3]).areas(panels_area);
    for variant in SearchVariant::ALL {
        render_result_panel(app, frame, panel_areas[variant.index()], variant);
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let key_indicator = if app.has_api_key() {
        Span::raw("")
    } else {
        Span::styled(" [no API key] ", Style::default().fg(Color::Yellow))
    };

    let title = Line::from(vec![
        Span::styled(
            " AI Search Comparator ",
            Style::default().fg(Color::Cyan).bold(),
        ),
        key_indicator,
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    frame.render_widget(Paragraph::new(title), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect, field: InputField) {
    let (title, value, cursor) = match field {
        InputField::Query => (" Query ", app.query_input.as_str(), app.query_cursor),
        InputField::Url => (
            " Context URL (optional) ",
            app.url_input.as_str(),
            app.url_cursor,
        ),
    };

    let editing =
        app.input_mode == InputMode::Editing && app.focused_field == field && !app.is_searching;

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing {
            Color::Yellow
        } else {
            Color::DarkGray
        }))
        .title(title);

    let input = Paragraph::new(value)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    if editing {
        frame.set_cursor_position((area.x + cursor as u16 + 1, area.y + 1));
    }
}

fn render_status(app: &App, frame: &mut Frame, area: Rect) {
    let line = if app.is_searching {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        Line::from(vec![
            Span::styled(
                format!(" Comparing perspectives{}", dots),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(
                format!("  {}s", app.elapsed_seconds()),
                Style::default().fg(Color::Magenta).bold(),
            ),
        ])
    } else if !app.has_searched() {
        Line::from(Span::styled(
            " Enter a topic to begin your search.",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::default()
    };

    frame.render_widget(Paragraph::new(line), area);
}

fn render_result_panel(app: &mut App, frame: &mut Frame, area: Rect, variant: SearchVariant) {
    let idx = variant.index();
    app.panel_areas[idx] = Some(area);

    let state = &app.results[idx];
    let selected = app.selected_panel == idx;
    let border_color = if selected { Color::Cyan } else { Color::DarkGray };

    let title = match state.score.filter(|_| state.is_settled_success()) {
        Some(score) => format!(" {} {} ", variant.display_name(), star_row(score)),
        None => format!(" {} ", variant.display_name()),
    };

    // Sources strip below the content when a settled result has any
    let sources: Vec<(String, String)> = state
        .valid_sources()
        .map(|citation| {
            let label = citation
                .title
                .clone()
                .unwrap_or_else(|| citation.uri.clone());
            (label, citation.uri.clone())
        })
        .collect();
    let show_sources = state.is_settled_success() && !sources.is_empty();

    let (content_area, sources_area) = if show_sources {
        let height = (sources.len().min(4) + 2) as u16;
        let [content_area, sources_area] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(height)]).areas(area);
        (content_area, Some(sources_area))
    } else {
        (area, None)
    };

    // Priority: loading, then error, then content, then idle placeholder
    let lines: Vec<Line<'static>> = if state.is_loading {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        vec![
            Line::default(),
            Line::from(Span::styled(
                format!("Searching{}", dots),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            )),
        ]
    } else if let Some(error) = &state.error {
        let mut lines = vec![Line::from(Span::styled(
            "Request Failed",
            Style::default().fg(Color::Red).bold(),
        ))];
        for message_line in error.lines() {
            lines.push(Line::from(Span::styled(
                message_line.to_string(),
                Style::default().fg(Color::Red),
            )));
        }
        lines
    } else if let Some(content) = &state.content {
        content_lines(content)
    } else {
        vec![
            Line::default(),
            Line::from(Span::styled(
                "Waiting for query...",
                Style::default().fg(Color::DarkGray),
            )),
        ]
    };

    // Track wrapped height so scrolling can clamp to the content
    let inner_width = content_area.width.saturating_sub(2).max(1);
    let total_lines: u16 = lines
        .iter()
        .map(|line| {
            let width = line.width() as u16;
            if width == 0 {
                1
            } else {
                (width - 1) / inner_width + 1
            }
        })
        .sum();
    app.panel_lines[idx] = total_lines;
    app.panel_viewport[idx] = content_area.height.saturating_sub(2);

    let content_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let content = Paragraph::new(Text::from(lines))
        .block(content_block)
        .wrap(Wrap { trim: false })
        .scroll((app.panel_scroll[idx], 0));

    frame.render_widget(content, content_area);

    if let Some(sources_area) = sources_area {
        let sources_block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color))
            .title(format!(" Sources ({}) ", sources.len()));

        let items: Vec<ListItem> = sources
            .iter()
            .map(|(label, _uri)| {
                ListItem::new(Line::from(vec![
                    Span::styled("→ ", Style::default().fg(Color::DarkGray)),
                    Span::styled(label.clone(), Style::default().fg(Color::Blue)),
                ]))
            })
            .collect();

        frame.render_widget(List::new(items).block(sources_block), sources_area);
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.input_mode {
        InputMode::Normal => " VIEW ",
        InputMode::Editing => " EDIT ",
    };

    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.input_mode {
        InputMode::Editing => vec![
            Span::styled(" Tab ", key_style),
            Span::styled(" field ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" search ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" panels ", label_style),
        ],
        InputMode::Normal => vec![
            Span::styled(" i ", key_style),
            Span::styled(" query ", label_style),
            Span::styled(" u ", key_style),
            Span::styled(" URL ", label_style),
            Span::styled(" h/l ", key_style),
            Span::styled(" panel ", label_style),
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" search ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    spans.extend(hints);

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn star_row(score: f64) -> String {
    let filled = star_count(score);
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

/// Style markdown-ish response text line by line: headings, list bullets,
/// and **bold** spans. Anything fancier renders as plain text.
fn content_lines(content: &str) -> Vec<Line<'static>> {
    content
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with('#') {
                let text = trimmed.trim_start_matches('#').trim_start().to_string();
                Line::from(Span::styled(
                    text,
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ))
            } else if let Some(item) = trimmed.strip_prefix("* ").or_else(|| trimmed.strip_prefix("- ")) {
                let mut spans = vec![Span::raw("• ")];
                spans.extend(markdown_spans(item));
                Line::from(spans)
            } else {
                Line::from(markdown_spans(line))
            }
        })
        .collect()
}

/// Split a line on `**` markers, alternating plain and bold spans. An
/// unclosed marker renders literally.
fn markdown_spans(text: &str) -> Vec<Span<'static>> {
    let segments: Vec<&str> = text.split("**").collect();
    let balanced = segments.len() % 2 == 1;
    let mut spans: Vec<Span<'static>> = Vec::new();

    for (i, segment) in segments.iter().enumerate() {
        let in_marker = i % 2 == 1;
        if segment.is_empty() && in_marker {
            continue;
        }
        if in_marker && (balanced || i + 1 < segments.len()) {
            spans.push(Span::styled(
                segment.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        } else if in_marker {
            // Trailing unclosed marker
            spans.push(Span::raw(format!("**{}", segment)));
        } else if !segment.is_empty() {
            spans.push(Span::raw(segment.to_string()));
        }
    }

    spans
}
