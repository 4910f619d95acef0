use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Clear, Dataset, GraphType, List, ListItem, ListState, Paragraph},
    Frame,
};
use crate::app::{App, AppState, LEAD_FIELDS};
use crate::dashboard::{format_pct, ChartRow, DashboardSnapshot};

pub fn render(f: &mut Frame, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, app, layout[0]);

    match app.state {
        AppState::Select => render_select(f, app, layout[1]),
        AppState::Loading => render_loading(f, "Fetching market data...", layout[1]),
        AppState::Dashboard => render_dashboard(f, app, layout[1]),
        AppState::LeadForm => {
            render_dashboard(f, app, layout[1]);
            render_lead_form(f, app, layout[1]);
        }
    }

    render_footer(f, app, layout[2]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(" BIST-30 Portfolio ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" | "),
        Span::styled(
            match app.state {
                AppState::Select => "Select",
                AppState::Loading => "Loading",
                AppState::Dashboard => "Dashboard",
                AppState::LeadForm => "Training Videos",
            },
            Style::default().fg(Color::Yellow),
        ),
        Span::raw(" | "),
        Span::styled(
            format!("{} selected", app.selection.len()),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
    ];

    if let Some(snap) = &app.snapshot {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            format!("{} .. {}", snap.window_start, snap.window_end),
            Style::default().fg(Color::Gray),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let hint = match app.state {
        AppState::Select => "↑/↓: move | space: toggle | Enter: analyze | q/Esc: quit",
        AppState::Loading => "Loading...",
        AppState::Dashboard => "f: training videos | r: reset | q/Esc: quit",
        AppState::LeadForm => "Tab: next field | Enter: submit | Esc: back",
    };

    let footer = Paragraph::new(Line::from(vec![
        Span::styled(" Controls: ", Style::default().fg(Color::Gray)),
        Span::styled(hint, Style::default().fg(Color::White)),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(footer, area);
}

fn render_error(f: &mut Frame, err: &str, area: Rect) {
    let error = Paragraph::new(err)
        .style(Style::default().fg(Color::Red))
        .block(Block::default().borders(Borders::ALL).title(" Error "));
    f.render_widget(error, area);
}

fn render_select(f: &mut Frame, app: &App, area: Rect) {
    let constraints = if app.error_msg.is_some() {
        vec![Constraint::Min(0), Constraint::Length(3)]
    } else {
        vec![Constraint::Percentage(100)]
    };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let items: Vec<ListItem> = app
        .config
        .universe
        .iter()
        .map(|symbol| {
            let (mark, style) = if app.is_selected(symbol) {
                ("[x] ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
            } else {
                ("[ ] ", Style::default().fg(Color::White))
            };
            ListItem::new(Line::from(vec![Span::styled(mark, style), Span::styled(symbol.as_str(), style)]))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" Choose stocks "))
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(Some(app.cursor));
    f.render_stateful_widget(list, chunks[0], &mut state);

    if let Some(err) = &app.error_msg {
        render_error(f, err, chunks[1]);
    }
}

fn render_loading(f: &mut Frame, msg: &str, area: Rect) {
    let block = Block::default().borders(Borders::ALL);
    let text = Paragraph::new(msg)
        .alignment(Alignment::Center)
        .block(block);
    f.render_widget(text, area);
}

fn points(rows: &[ChartRow], pick: fn(&ChartRow) -> Option<f64>) -> Vec<(f64, f64)> {
    rows.iter()
        .enumerate()
        .filter_map(|(i, row)| pick(row).map(|v| (i as f64, v)))
        .collect()
}

fn delta_line(label: &str, value: Option<f64>) -> Line<'static> {
    let color = match value {
        Some(v) if v >= 0.0 => Color::Green,
        Some(_) => Color::Red,
        None => Color::Gray,
    };
    Line::from(vec![
        Span::styled(format!("{}: ", label), Style::default().fg(Color::Gray)),
        Span::styled(format_pct(value), Style::default().fg(color)),
    ])
}

fn metric_card(title: String, value: Option<f64>, extra: Line<'static>) -> Paragraph<'static> {
    Paragraph::new(vec![
        Line::from(Span::styled(
            format_pct(value),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        extra,
    ])
    .block(Block::default().borders(Borders::ALL).title(title))
}

fn render_metrics(f: &mut Frame, snap: &DashboardSnapshot, area: Rect) {
    let cards = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(area);

    let m = &snap.metrics;
    let widgets = [
        metric_card(
            " Your Portfolio ".to_string(),
            m.selected_return,
            Line::from(Span::styled(snap.selected.join(", "), Style::default().fg(Color::Cyan))),
        ),
        metric_card(
            format!(" Top {} ", snap.top_k.len()),
            m.top_k_return,
            delta_line("vs yours", m.top_k_delta),
        ),
        metric_card(
            format!(" {} ", snap.benchmark),
            m.benchmark_return,
            delta_line("yours vs index", m.benchmark_delta),
        ),
        metric_card(
            format!(" {} ", snap.fx),
            m.fx_return,
            Line::from(vec![
                Span::styled("Deposit: ", Style::default().fg(Color::Gray)),
                Span::styled(format_pct(Some(m.deposit_rate)), Style::default().fg(Color::Yellow)),
            ]),
        ),
    ];

    for (widget, chunk) in widgets.into_iter().zip(cards.iter()) {
        f.render_widget(widget, *chunk);
    }
}

fn render_dashboard(f: &mut Frame, app: &App, area: Rect) {
    let constraints = if app.error_msg.is_some() && app.state == AppState::Dashboard {
        vec![Constraint::Min(0), Constraint::Length(3)]
    } else {
        vec![Constraint::Percentage(100)]
    };

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(constraints)
        .split(area);

    if let Some(snap) = &app.snapshot {
        let dashboard_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(75), Constraint::Percentage(25)])
            .split(main_chunks[0]);

        let selected_points = points(&snap.chart, |r| r.selected);
        let top_k_points = points(&snap.chart, |r| r.top_k);
        let benchmark_points = points(&snap.chart, |r| r.benchmark);
        let top_k_name = format!("Top {}", snap.top_k.len());

        let datasets = vec![
            Dataset::default()
                .name("Your Portfolio")
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Cyan))
                .data(&selected_points),
            Dataset::default()
                .name(top_k_name.as_str())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Yellow))
                .data(&top_k_points),
            Dataset::default()
                .name(snap.benchmark.as_str())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Magenta))
                .data(&benchmark_points),
        ];

        let (min_value, max_value) = selected_points
            .iter()
            .chain(&top_k_points)
            .chain(&benchmark_points)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, v)| (lo.min(*v), hi.max(*v)));
        let (min_value, max_value) = if min_value.is_finite() {
            (min_value, max_value)
        } else {
            (100.0, 100.0)
        };
        let x_max = snap.chart.len().max(1) as f64;

        let chart = Chart::new(datasets)
            .block(
                Block::default()
                    .title(Span::styled(
                        "Growth of 100 TRY",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL),
            )
            .x_axis(
                Axis::default()
                    .title("Days")
                    .style(Style::default().fg(Color::Gray))
                    .bounds([0.0, x_max]),
            )
            .y_axis(
                Axis::default()
                    .title("Value")
                    .style(Style::default().fg(Color::Gray))
                    .bounds([min_value * 0.95, max_value * 1.05])
                    .labels(vec![
                        Span::styled(format!("{:.1}", min_value), Style::default().fg(Color::Gray)),
                        Span::styled(format!("{:.1}", max_value), Style::default().fg(Color::Gray)),
                    ]),
            );

        f.render_widget(chart, dashboard_chunks[0]);
        render_metrics(f, snap, dashboard_chunks[1]);
    }

    if app.state == AppState::Dashboard {
        if let Some(err) = &app.error_msg {
            render_error(f, err, main_chunks[1]);
        }
    }
}

fn centered(area: Rect, width_pct: u16, height: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_pct) / 2),
            Constraint::Percentage(width_pct),
            Constraint::Percentage((100 - width_pct) / 2),
        ])
        .split(vertical[1])[1]
}

fn render_lead_form(f: &mut Frame, app: &App, area: Rect) {
    let popup = centered(area, 60, 11);
    f.render_widget(Clear, popup);

    let values = [&app.lead.name, &app.lead.email, &app.lead.phone];
    let mut lines = vec![
        Line::from(Span::styled(
            "Sign up for the free training videos",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    for (i, (label, value)) in LEAD_FIELDS.iter().zip(values).enumerate() {
        let style = if i == app.lead_field {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{:<8}", label), Style::default().fg(Color::Gray)),
            Span::styled(value.as_str(), style),
            Span::styled(if i == app.lead_field { "_" } else { "" }, style),
        ]));
    }
    lines.push(Line::from(""));
    if let Some(ack) = &app.lead_ack {
        lines.push(Line::from(Span::styled(ack.as_str(), Style::default().fg(Color::Green))));
    } else if let Some(err) = &app.error_msg {
        lines.push(Line::from(Span::styled(err.as_str(), Style::default().fg(Color::Red))));
    }

    let form = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Training Videos "));
    f.render_widget(form, popup);
}
