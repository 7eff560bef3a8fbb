use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Chart, Dataset, GraphType, List, ListItem, ListState, Paragraph, Wrap,
    },
    Frame,
};
use crate::app::App;
use crate::chart::PriceChart;
use crate::view::{DetailPanel, ProfitClass};

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

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(layout[1]);

    render_list(f, app, body[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(0)])
        .split(body[1]);

    render_details(f, app.dashboard.view().detail.as_ref(), right[0]);
    render_chart(f, app, right[1]);
    render_footer(f, app, layout[2]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let state = app.dashboard.state();
    let spans = vec![
        Span::styled(" Stockboard ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" | "),
        Span::styled(
            state.selected_symbol().to_string(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | Range: "),
        Span::styled(state.time_range().label(), Style::default().fg(Color::Yellow)),
        Span::raw(" | Stats: "),
        if state.stats().is_empty() {
            Span::styled("pending", Style::default().fg(Color::Gray))
        } else {
            Span::styled(
                format!("{} symbols", state.stats().len()),
                Style::default().fg(Color::Green),
            )
        },
    ];

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn render_list(f: &mut Frame, app: &App, area: Rect) {
    let selected = app.dashboard.state().selected_symbol();
    let items: Vec<ListItem> = app
        .dashboard
        .view()
        .list
        .iter()
        .map(|entry| {
            let style = if entry.symbol == selected {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(Span::styled(entry.text.clone(), style)))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" Stocks "))
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ");

    let mut list_state = ListState::default().with_selected(Some(app.cursor));
    f.render_stateful_widget(list, area, &mut list_state);
}

fn profit_color(class: ProfitClass) -> Color {
    match class {
        ProfitClass::Positive => Color::Green,
        ProfitClass::NonPositive => Color::Red,
    }
}

fn render_details(f: &mut Frame, detail: Option<&DetailPanel>, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Details ");
    let Some(detail) = detail else {
        f.render_widget(Paragraph::new("Loading profile...").block(block), area);
        return;
    };

    let text = vec![
        Line::from(Span::styled(
            detail.symbol.clone(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("Summary: {}", detail.summary)),
        Line::from(format!("Book Value: {}", detail.book_value)),
        Line::from(Span::styled(
            format!("Profit: {}", detail.profit),
            Style::default().fg(profit_color(detail.profit_class)),
        )),
    ];

    let panel = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    f.render_widget(panel, area);
}

fn line_color(chart: &PriceChart) -> Color {
    match chart.config.line_color {
        "green" => Color::Green,
        "red" => Color::Red,
        "cyan" => Color::Cyan,
        _ => Color::White,
    }
}

fn render_chart(f: &mut Frame, app: &App, area: Rect) {
    let view = app.dashboard.view();
    let chart = &view.chart;

    let mut title = match &view.chart_subject {
        Some(subject) => format!(" {} - {} ", subject.symbol, subject.range.label()),
        None => " Price ".to_string(),
    };
    match chart.series().last() {
        Some(last) => title.push_str(&format!("| {} ", chart.tooltip(last))),
        None if chart.is_empty() => title.push_str("| no data "),
        None => {}
    }

    let points = chart.points();
    let datasets = vec![Dataset::default()
        .name(chart.config.series_label)
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(line_color(chart)))
        .data(&points)];

    let [y_min, y_max] = chart.y_bounds();
    let x_labels: Vec<Span> = chart
        .x_labels()
        .into_iter()
        .map(|l| Span::styled(l, Style::default().fg(Color::Gray)))
        .collect();

    let widget = Chart::new(datasets)
        .block(
            Block::default()
                .title(Span::styled(
                    title,
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL),
        )
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds(chart.x_bounds())
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title("Price")
                .style(Style::default().fg(Color::Gray))
                .bounds([y_min, y_max])
                .labels(vec![
                    Span::styled(format!("{:.1}", y_min), Style::default().fg(Color::Gray)),
                    Span::styled(format!("{:.1}", y_max), Style::default().fg(Color::Gray)),
                ]),
        );

    f.render_widget(widget, area);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(" Controls: ", Style::default().fg(Color::Gray)),
        Span::styled(
            "Up/Down: move | Enter: select | 1-4: 1M/3M/1Y/5Y | r: refresh stats | q/Esc: quit",
            Style::default().fg(Color::White),
        ),
    ];
    if let Some(msg) = app.dashboard.latest_diagnostic() {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(msg.to_string(), Style::default().fg(Color::Red)));
    }

    let footer = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}
