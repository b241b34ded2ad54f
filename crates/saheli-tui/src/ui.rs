use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use saheli_core::speech_input::LISTENING_PLACEHOLDER;
use saheli_core::state::BackgroundKind;
use saheli_core::{Background, ChatRole};

use crate::app::{App, FocusPane, InputMode};

pub const DELETE_CONFIRM: &str = "क्या आप वाकई इस बातचीत को हटाना चाहते हैं?";

/// Colours derived from the chosen background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub bg: Color,
    pub fg: Color,
    pub muted: Color,
    pub user: Color,
    pub model: Color,
}

pub fn palette(background: &Background) -> Palette {
    let dark = background.is_dark();
    let bg = match (background.kind, background.rgb()) {
        (BackgroundKind::Glass, _) => Color::Rgb(30, 41, 59),
        (_, Some((r, g, b))) => Color::Rgb(r, g, b),
        _ => Color::Reset,
    };
    let fg = match background.kind {
        BackgroundKind::Default => Color::Reset,
        _ if dark => Color::White,
        _ => Color::Black,
    };
    Palette {
        bg,
        fg,
        muted: if dark { Color::Gray } else { Color::DarkGray },
        user: if dark { Color::LightCyan } else { Color::Blue },
        model: if dark { Color::LightMagenta } else { Color::Magenta },
    }
}

/// Render `**bold**` runs; an unmatched marker stays literal.
fn parse_markdown_line(text: &str) -> Line<'static> {
    let pieces: Vec<&str> = text.split("**").collect();
    // An even piece count means the last marker never closed
    let closed = if pieces.len() % 2 == 0 { pieces.len() - 2 } else { pieces.len() - 1 };

    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut literal = String::new();
    for (i, piece) in pieces.iter().enumerate() {
        let bold = i % 2 == 1 && i <= closed;
        if bold && !piece.is_empty() {
            if !literal.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut literal)));
            }
            spans.push(Span::styled(piece.to_string(), Style::default().add_modifier(Modifier::BOLD)));
        } else {
            if i > closed {
                literal.push_str("**");
            }
            literal.push_str(piece);
        }
    }
    if !literal.is_empty() {
        spans.push(Span::raw(literal));
    }
    Line::from(spans)
}

/// Rows the wrapped paragraph occupies at `width`, clamped to the scroll range.
fn wrapped_rows(paragraph: &Paragraph, width: u16) -> u16 {
    paragraph.line_count(width).min(u16::MAX as usize) as u16
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let colors = palette(app.state.background());

    frame.render_widget(Block::default().style(Style::default().bg(colors.bg).fg(colors.fg)), area);

    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let main_area = if app.show_sidebar {
        let [sidebar_area, main_area] = Layout::horizontal([
            Constraint::Length(34.min(body_area.width / 2)),
            Constraint::Min(0),
        ])
        .areas(body_area);
        render_sidebar(app, frame, sidebar_area, &colors);
        app.sidebar_area = Some(sidebar_area);
        main_area
    } else {
        app.sidebar_area = None;
        body_area
    };

    let [timeline_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(main_area);

    render_timeline(app, frame, timeline_area, &colors);
    render_input(app, frame, input_area, &colors);
    render_footer(app, frame, footer_area);

    if app.confirm_delete.is_some() {
        render_delete_confirm(frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![Span::styled(
        format!(" {} ", app.state.persona().name()),
        Style::default().fg(Color::Magenta).bold(),
    )];

    if app.state.is_loading() {
        // Pulses while a reply streams in
        let pulse = match app.animation_frame {
            0 => Color::Magenta,
            1 => Color::LightMagenta,
            _ => Color::Gray,
        };
        spans.push(Span::styled("● ", Style::default().fg(pulse)));
    }
    if app.speech_input.is_listening() {
        spans.push(Span::styled("🎙 ", Style::default().fg(Color::Red)));
    }
    spans.push(Span::styled(
        format!("v{}", env!("CARGO_PKG_VERSION")),
        Style::default().fg(Color::Gray),
    ));

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_sidebar(app: &mut App, frame: &mut Frame, area: Rect, colors: &Palette) {
    let [list_area, picker_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(5),
    ])
    .areas(area);

    let focused = app.focus == FocusPane::Sidebar;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Magenta } else { colors.muted }))
        .title(format!(" बातचीत ({}) ", app.state.conversations().len()));

    let active = app.state.active_id();
    let items: Vec<ListItem> = app
        .state
        .conversations()
        .iter()
        .map(|conv| {
            if Some(conv.id.as_str()) == active {
                ListItem::new(format!("● {}", conv.title))
                    .style(Style::default().fg(colors.model).add_modifier(Modifier::BOLD))
            } else {
                ListItem::new(format!("  {}", conv.title))
            }
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Magenta)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, list_area, &mut app.sidebar_state);

    let key = Style::default().bg(Color::DarkGray).fg(Color::White);
    let picker = Paragraph::new(vec![
        Line::from(vec![
            Span::styled(" n ", key),
            Span::raw(" नई बातचीत "),
            Span::styled(" d ", key),
            Span::raw(" हटाओ"),
        ]),
        Line::from(vec![
            Span::styled(" 1 ", key),
            Span::styled(" ■ ", Style::default().fg(Color::Rgb(255, 255, 255))),
            Span::styled(" 2 ", key),
            Span::styled(" ■ ", Style::default().fg(Color::Rgb(245, 245, 244))),
            Span::styled(" 3 ", key),
            Span::styled(" ■ ", Style::default().fg(Color::Rgb(0, 0, 0))),
        ]),
        Line::from(vec![
            Span::styled(" 4 ", key),
            Span::raw(" ग्लास "),
            Span::styled(" 0 ", key),
            Span::raw(" रीसेट"),
        ]),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors.muted))
            .title(" बैकग्राउंड "),
    );
    frame.render_widget(picker, picker_area);
}

fn render_timeline(app: &mut App, frame: &mut Frame, area: Rect, colors: &Palette) {
    app.timeline_area = Some(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors.muted))
        .title(
            app.state
                .active_conversation()
                .map(|c| format!(" {} ", c.title))
                .unwrap_or_default(),
        );
    let inner = block.inner(area);
    app.timeline_height = inner.height;

    let lines = timeline_lines(app, colors);

    let timeline = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });
    let max_scroll = wrapped_rows(&timeline, inner.width).saturating_sub(inner.height);
    if app.follow_bottom || app.timeline_scroll >= max_scroll {
        app.timeline_scroll = max_scroll;
        app.follow_bottom = true;
    }

    let timeline = timeline.block(block).scroll((app.timeline_scroll, 0));
    frame.render_widget(timeline, area);
}

fn timeline_lines(app: &App, colors: &Palette) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let messages = app.visible_messages();
    let target = app.action_target().map(|m| m.id.clone());
    let selected = app.state.selected_message();

    if messages.is_empty() && !app.state.is_loading() {
        lines.push(Line::from(Span::styled(
            format!("{} से कुछ भी पूछो...", app.state.persona().name()),
            Style::default().fg(colors.muted).add_modifier(Modifier::ITALIC),
        )));
    }

    for msg in &messages {
        let is_user = msg.role == ChatRole::User;
        let alignment = if is_user { Alignment::Right } else { Alignment::Left };
        let color = if is_user { colors.user } else { colors.model };

        let mut label = vec![Span::styled(
            app.author(msg.role).to_string(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )];
        if selected == Some(msg.id.as_str()) {
            label.insert(0, Span::styled("▶ ", Style::default().fg(color)));
        }
        if app.state.tts_loading() == Some(msg.id.as_str()) {
            let dots = ".".repeat(app.animation_frame as usize + 1);
            label.push(Span::styled(format!("  ⏳{}", dots), Style::default().fg(colors.muted)));
        } else if app.state.speaking() == Some(msg.id.as_str()) {
            label.push(Span::styled("  🔊", Style::default().fg(color)));
        }
        lines.push(Line::from(label).alignment(alignment));

        for text_line in msg.text().lines() {
            let line = if is_user {
                Line::from(text_line.to_string())
            } else {
                parse_markdown_line(text_line)
            };
            lines.push(line.alignment(alignment));
        }

        if target.as_deref() == Some(msg.id.as_str()) {
            let key = Style::default().fg(colors.muted).add_modifier(Modifier::REVERSED);
            let speak_label = if app.state.speaking() == Some(msg.id.as_str()) { " रोको " } else { " सुनो " };
            lines.push(
                Line::from(vec![
                    Span::styled(" s ", key),
                    Span::styled(speak_label, Style::default().fg(colors.muted)),
                    Span::styled(" c ", key),
                    Span::styled(" कॉपी ", Style::default().fg(colors.muted)),
                ])
                .alignment(alignment),
            );
        }
        lines.push(Line::default());
    }

    let reply_started = app
        .state
        .reply_message_id()
        .and_then(|id| app.state.active_conversation()?.message(id))
        .is_some_and(|m| !m.is_blank());
    if app.state.is_loading() && !reply_started {
        lines.push(Line::from(Span::styled(
            app.state.persona().name().to_string(),
            Style::default().fg(colors.model).add_modifier(Modifier::BOLD),
        )));
        let dots = ".".repeat(app.animation_frame as usize + 1);
        lines.push(Line::from(Span::styled(
            format!("टाइप कर रही है{}", dots),
            Style::default().fg(colors.muted).add_modifier(Modifier::ITALIC),
        )));
    }

    if !app.state.is_loading() {
        if let Some(error) = app.state.error() {
            lines.push(Line::from(Span::styled(error.to_string(), Style::default().fg(Color::Red))));
        }
    }
    if let Some(error) = app.state.client_error() {
        lines.push(Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
    }

    lines
}

fn render_input(app: &App, frame: &mut Frame, area: Rect, colors: &Palette) {
    let editing = app.input_mode == InputMode::Editing && app.focus == FocusPane::Timeline;
    let loading = app.state.is_loading();

    let mut title = vec![Span::raw(" संदेश ")];
    if app.speech_input.is_listening() {
        title.push(Span::styled("● सुन रही हूँ ", Style::default().fg(Color::Red)));
    }
    let border = if editing && !loading { Color::Magenta } else { colors.muted };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Line::from(title));

    let inner_width = area.width.saturating_sub(2) as usize;

    if loading || (app.input.is_empty() && app.speech_input.is_listening()) {
        let placeholder = if loading {
            format!("{} टाइप कर रही है...", app.state.persona().name())
        } else {
            LISTENING_PLACEHOLDER.to_string()
        };
        let input = Paragraph::new(placeholder)
            .style(Style::default().fg(colors.muted).add_modifier(Modifier::ITALIC))
            .block(block);
        frame.render_widget(input, area);
        return;
    }

    // Keep the cursor in view by scrolling horizontally
    let scroll_offset = if inner_width == 0 || app.input_cursor < inner_width {
        0
    } else {
        app.input_cursor - inner_width + 1
    };
    let visible_text: String = app.input.chars().skip(scroll_offset).take(inner_width).collect();

    let input = Paragraph::new(visible_text.clone())
        .style(Style::default().fg(colors.user))
        .block(block);
    frame.render_widget(input, area);

    if editing && app.confirm_delete.is_none() {
        let before_cursor: String = visible_text
            .chars()
            .take(app.input_cursor - scroll_offset)
            .collect();
        let cursor_x = Span::raw(before_cursor).width() as u16;
        frame.set_cursor_position((area.x + 1 + cursor_x, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match (app.focus, app.input_mode) {
        (FocusPane::Sidebar, _) => (" CHATS ", Style::default().bg(Color::Magenta).fg(Color::White)),
        (_, InputMode::Editing) => (" TYPE ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        (_, InputMode::Normal) => (" VIEW ", Style::default().bg(Color::Blue).fg(Color::White)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [Span::styled(key, key_style), Span::styled(label, label_style)]
    };

    let mut hints: Vec<Span> = Vec::new();
    if app.confirm_delete.is_some() {
        hints.extend(hint(" y ", " हाँ "));
        hints.extend(hint(" n ", " नहीं "));
    } else {
        match (app.focus, app.input_mode) {
            (FocusPane::Sidebar, _) => {
                hints.extend(hint(" j/k ", " nav "));
                hints.extend(hint(" Enter ", " open "));
                hints.extend(hint(" n ", " new "));
                hints.extend(hint(" d ", " delete "));
                hints.extend(hint(" 0-4 ", " background "));
                hints.extend(hint(" Esc ", " close "));
            }
            (_, InputMode::Editing) => {
                hints.extend(hint(" Enter ", " send "));
                hints.extend(hint(" Esc ", " view "));
                hints.extend(hint(" ^B ", " chats "));
                hints.extend(hint(" ^N ", " new "));
            }
            (_, InputMode::Normal) => {
                hints.extend(hint(" j/k ", " message "));
                if app.action_target().is_some() {
                    hints.extend(hint(" s ", " speak "));
                    hints.extend(hint(" c ", " copy "));
                }
                hints.extend(hint(" i ", " type "));
                hints.extend(hint(" Tab ", " chats "));
                hints.extend(hint(" q ", " quit "));
            }
        }
        if app.speech_input.is_available() {
            let label = if app.speech_input.is_listening() { " stop mic " } else { " mic " };
            hints.extend(hint(" ^R ", label));
        }
    }

    if let Some(notice) = &app.notice {
        hints.push(Span::styled(format!("  {}", notice), Style::default().fg(Color::Green)));
    }

    let footer_content = Line::from(
        vec![Span::styled(mode_text, mode_style), Span::styled(" ", label_style)]
            .into_iter()
            .chain(hints)
            .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_delete_confirm(frame: &mut Frame, area: Rect) {
    let popup_width = 56.min(area.width.saturating_sub(4));
    let popup_height = 5;
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" हटाएँ? ");

    let body = Paragraph::new(vec![
        Line::from(DELETE_CONFIRM),
        Line::default(),
        Line::from(vec![
            Span::styled(" y ", Style::default().bg(Color::Red).fg(Color::White)),
            Span::raw(" हाँ   "),
            Span::styled(" n ", Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(" नहीं"),
        ]),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(block);

    frame.render_widget(body, popup_area);
}
