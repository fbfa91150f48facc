use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, View};
use crate::models::Post;

const EXCERPT_LINES: usize = 2;

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(0),    // Post list / reader
            Constraint::Length(1), // Status line
        ])
        .split(frame.area());

    match app.view {
        View::List => {
            render_header(frame, app, chunks[0]);
            render_post_list(frame, app, chunks[1]);
            render_list_status(frame, app, chunks[2]);
        }
        View::Detail => {
            render_post_title(frame, app, chunks[0]);
            render_post_body(frame, app, chunks[1]);
            render_detail_status(frame, app, chunks[2]);
        }
    }

    if app.show_help {
        render_help(frame);
    }
}

fn offline_span(app: &App) -> Option<Span<'static>> {
    app.is_offline.then(|| {
        Span::styled(
            " OFFLINE ",
            Style::default()
                .fg(Color::White)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD),
        )
    })
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" VRID Blog ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut spans = Vec::new();
    if let Some(offline) = offline_span(app) {
        spans.push(offline);
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled(
        format!(" {} Posts | Page {}", app.feed.posts.len(), app.feed.current_page),
        Style::default().fg(Color::White),
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), inner);
}

fn post_card(post: &Post, width: usize) -> ListItem<'static> {
    let mut lines = vec![
        Line::from(Span::styled(
            post.published_display(),
            Style::default().fg(Color::Blue),
        )),
        Line::from(Span::styled(
            post.title_text(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )),
    ];

    let excerpt = post.excerpt_text();
    lines.extend(
        textwrap::wrap(&excerpt, width.max(10))
            .into_iter()
            .take(EXCERPT_LINES)
            .map(|line| {
                Line::from(Span::styled(
                    line.into_owned(),
                    Style::default().fg(Color::Gray),
                ))
            }),
    );
    lines.push(Line::default());

    ListItem::new(lines)
}

fn render_post_list(frame: &mut Frame, app: &App, area: Rect) {
    let width = usize::from(area.width.saturating_sub(4));

    let items: Vec<ListItem> = app
        .feed
        .posts
        .iter()
        .map(|post| post_card(post, width))
        .collect();

    let block = Block::default().borders(Borders::ALL);

    if items.is_empty() {
        let placeholder = if app.feed.is_loading {
            "Loading posts..."
        } else {
            "No posts yet. Press 'r' to refresh."
        };
        let paragraph = Paragraph::new(placeholder)
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, area);
        return;
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(Some(app.selected_index));

    frame.render_stateful_widget(list, area, &mut state);
}

fn render_list_status(frame: &mut Frame, app: &App, area: Rect) {
    let (status, color) = if app.feed.is_loading {
        ("Loading...".to_string(), Color::Yellow)
    } else if let Some(error) = &app.feed.error {
        (format!("{error} - press R to retry"), Color::Red)
    } else if !app.feed.has_more_pages {
        ("End of feed | r:refresh  ?:help  q:quit".to_string(), Color::DarkGray)
    } else {
        (
            "j/k:nav  enter:read  r:refresh  o:open  ?:help  q:quit".to_string(),
            Color::DarkGray,
        )
    };

    let paragraph = Paragraph::new(status).style(Style::default().fg(color));
    frame.render_widget(paragraph, area);
}

fn render_post_title(frame: &mut Frame, app: &App, area: Rect) {
    let title = app
        .detail
        .post
        .as_ref()
        .map(|p| p.title_text())
        .unwrap_or_else(|| "Post".to_string());

    let block = Block::default()
        .title(" Post ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let mut spans = Vec::new();
    if let Some(offline) = offline_span(app) {
        spans.push(offline);
        spans.push(Span::raw(" "));
    }
    spans.push(Span::raw(title));

    let paragraph = Paragraph::new(Line::from(spans))
        .block(block)
        .wrap(Wrap { trim: true });

    frame.render_widget(paragraph, area);
}

fn render_post_body(frame: &mut Frame, app: &App, area: Rect) {
    let content = match (&app.detail.error, &app.detail.post) {
        (Some(error), _) => error.clone(),
        (None, Some(post)) if post.content.protected => {
            "This post is password protected.".to_string()
        }
        (None, Some(_)) => app.detail.body.clone(),
        (None, None) => "Loading...".to_string(),
    };

    let block = Block::default().borders(Borders::ALL);

    let paragraph = Paragraph::new(content)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.detail.scroll, 0));

    frame.render_widget(paragraph, area);
}

fn render_detail_status(frame: &mut Frame, app: &App, area: Rect) {
    let byline = app
        .detail
        .post
        .as_ref()
        .map(|p| format!("{} | ", p.published_display()))
        .unwrap_or_default();

    let text = format!("{byline}j/k:scroll  esc:back  o:open in browser  q:quit");
    let paragraph = Paragraph::new(text).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

fn render_help(frame: &mut Frame) {
    let area = centered_rect(50, 60, frame.area());

    let help_text = [
        "",
        " Post list:",
        "   j / ↓    Move down (loads more at the end)",
        "   k / ↑    Move up",
        "   g / G    First / last post",
        "   Enter    Read post",
        "   r        Refresh from page 1",
        "   R        Retry after an error",
        "",
        " Reader:",
        "   j / k    Scroll",
        "   Esc      Back to list",
        "",
        " General:",
        "   o        Open in browser",
        "   ?        Toggle this help",
        "   q        Quit",
        "",
        " Press any key to close",
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(help_text.join("\n"))
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(ratatui::widgets::Clear, area);
    frame.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
