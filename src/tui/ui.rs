//! Drawing the shell: welcome banner, output log, status bar and prompt

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState,
    },
    Frame,
};
use std::time::Duration;
use textwrap::wrap;
use unicode_width::UnicodeWidthChar;

use super::html::html_to_lines;
use super::ViewState;
use crate::output::{LineBody, LineClass, OutputLine, RenderedContent, StreamingLine};
use crate::shell::{BannerState, Shell, Theme, PROMPT};

/// New lines are drawn dimmed for this long
pub const FADE_IN: Duration = Duration::from_millis(300);

/// Loop iterations per cursor blink phase
pub const BLINK_FRAMES: u64 = 16;

const ACCENT_RED: Color = Color::Rgb(220, 100, 100);
const BORDER_DIM: Color = Color::Rgb(50, 50, 55);

struct Palette {
    background: Color,
    foreground: Color,
    info: Color,
    success: Color,
    error: Color,
    highlight: Color,
    dim: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        let background = theme.background().parse().unwrap_or(Color::Reset);
        let foreground = theme.foreground().parse().unwrap_or(Color::Reset);
        match theme {
            Theme::Dark => Self {
                background,
                foreground,
                info: Color::Rgb(100, 200, 200),
                success: Color::Rgb(100, 200, 140),
                error: ACCENT_RED,
                highlight: Color::Rgb(30, 60, 30),
                dim: Color::Rgb(100, 100, 110),
            },
            Theme::Light => Self {
                background,
                foreground,
                info: Color::Rgb(13, 110, 253),
                success: Color::Rgb(25, 135, 84),
                error: Color::Rgb(220, 53, 69),
                highlight: Color::Rgb(222, 226, 230),
                dim: Color::Rgb(108, 117, 125),
            },
        }
    }

    fn class_style(&self, class: LineClass) -> Style {
        let fg = match class {
            LineClass::Plain => self.foreground,
            LineClass::Info => self.info,
            LineClass::Success => self.success,
            LineClass::Error => self.error,
            LineClass::Command => self.foreground,
        };
        let style = Style::default().fg(fg);
        if class == LineClass::Command {
            style.add_modifier(Modifier::BOLD)
        } else {
            style
        }
    }
}

/// Whether a frame must be drawn even though nothing was applied
pub fn is_animating(shell: &Shell) -> bool {
    shell.banner().state() == BannerState::Typing
        || shell
            .output()
            .lines()
            .last()
            .is_some_and(|line| line.appeared_at.elapsed() < FADE_IN)
}

pub fn draw(f: &mut Frame, shell: &Shell, view: &ViewState) {
    let palette = Palette::for_theme(view.theme);
    let area = f.area();

    f.render_widget(
        Block::default().style(Style::default().bg(palette.background)),
        area,
    );

    if view.halted {
        draw_halted(f, &palette, area);
        return;
    }

    let banner_height = if shell.banner().is_visible() { 2 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(banner_height),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(2),
        ])
        .split(area);

    draw_banner(f, shell, &palette, chunks[0]);
    draw_output(f, shell, &palette, chunks[1]);
    draw_status(f, shell, view, &palette, chunks[2]);
    draw_input(f, shell, view, &palette, chunks[3]);
}

fn draw_halted(f: &mut Frame, palette: &Palette, area: Rect) {
    let y = area.y + area.height / 2;
    let line_area = Rect {
        x: area.x,
        y,
        width: area.width,
        height: 1.min(area.height),
    };
    let text = Paragraph::new(Line::styled(
        "System halted.",
        Style::default().fg(palette.foreground),
    ))
    .alignment(Alignment::Center);
    f.render_widget(text, line_area);
}

fn draw_banner(f: &mut Frame, shell: &Shell, palette: &Palette, area: Rect) {
    if area.height == 0 {
        return;
    }
    let banner = shell.banner();
    let mut style = Style::default()
        .fg(palette.success)
        .add_modifier(Modifier::BOLD);
    if banner.state() == BannerState::Fading {
        style = style.add_modifier(Modifier::DIM);
    }
    f.render_widget(Paragraph::new(Line::styled(banner.visible_text().to_string(), style)), area);
}

fn draw_output(f: &mut Frame, shell: &Shell, palette: &Palette, area: Rect) {
    if area.height < 2 || area.width < 10 {
        return;
    }

    let content_width = (area.width.saturating_sub(2) as usize).max(8);

    let mut all_lines: Vec<Line<'static>> = Vec::new();
    for line in shell.output().lines() {
        render_line(line, content_width, palette, &mut all_lines);
    }

    // scroll_offset = 0 shows the bottom
    let max_lines = area.height as usize;
    let total_lines = all_lines.len();
    let scroll_offset = shell
        .output()
        .scroll_offset()
        .min(total_lines.saturating_sub(max_lines));

    let visible_start = total_lines
        .saturating_sub(max_lines)
        .saturating_sub(scroll_offset);
    let visible_end = (visible_start + max_lines).min(total_lines);

    let visible_items: Vec<ListItem> = all_lines
        .get(visible_start..visible_end)
        .unwrap_or(&[])
        .iter()
        .cloned()
        .map(ListItem::new)
        .collect();

    f.render_widget(List::new(visible_items), area);

    if total_lines > max_lines {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(None)
            .end_symbol(None)
            .track_symbol(Some("│"))
            .thumb_symbol("█");

        let mut scrollbar_state =
            ScrollbarState::new(total_lines.saturating_sub(max_lines)).position(visible_start);

        let scrollbar_area = Rect {
            x: area.x + area.width.saturating_sub(1),
            y: area.y,
            width: 1,
            height: area.height,
        };

        f.render_stateful_widget(scrollbar, scrollbar_area, &mut scrollbar_state);
    }
}

fn render_line(line: &OutputLine, width: usize, palette: &Palette, out: &mut Vec<Line<'static>>) {
    let mut style = palette.class_style(line.class);
    if line.highlighted {
        style = style.bg(palette.highlight).add_modifier(Modifier::BOLD);
    }
    if line.appeared_at.elapsed() < FADE_IN {
        style = style.add_modifier(Modifier::DIM);
    }

    match &line.body {
        LineBody::Text(text) => {
            for raw in text.split('\n') {
                if raw.is_empty() {
                    out.push(Line::default());
                    continue;
                }
                for wrapped in wrap(raw, width) {
                    out.push(Line::styled(wrapped.into_owned(), style));
                }
            }
        }
        LineBody::Stream(stream) => render_stream(stream, width, style, palette, out),
    }
}

fn render_stream(
    stream: &StreamingLine,
    width: usize,
    style: Style,
    palette: &Palette,
    out: &mut Vec<Line<'static>>,
) {
    let prefix = Span::styled(
        stream.prefix().to_string(),
        Style::default().fg(palette.info).add_modifier(Modifier::BOLD),
    );

    let mut body: Vec<Line<'static>> = match stream.content() {
        RenderedContent::Html(html) => html_to_lines(html, style),
        RenderedContent::Plain(text) => text
            .split('\n')
            .map(|raw| Line::styled(raw.to_string(), style))
            .collect(),
    };

    match body.first_mut() {
        Some(first) => first.spans.insert(0, prefix),
        None => body.push(Line::from(prefix)),
    }

    for line in body {
        out.extend(wrap_spans(line, width));
    }
}

/// Hard-wrap a styled line at `width` display columns
fn wrap_spans(line: Line<'static>, width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut used = 0;

    for span in line.spans {
        let mut piece = String::new();
        for c in span.content.chars() {
            let w = c.width().unwrap_or(0);
            if used + w > width && used > 0 {
                if !piece.is_empty() {
                    current.push(Span::styled(std::mem::take(&mut piece), span.style));
                }
                lines.push(Line::from(std::mem::take(&mut current)));
                used = 0;
            }
            piece.push(c);
            used += w;
        }
        if !piece.is_empty() {
            current.push(Span::styled(piece, span.style));
        }
    }

    lines.push(Line::from(current));
    lines
}

fn draw_status(f: &mut Frame, shell: &Shell, view: &ViewState, palette: &Palette, area: Rect) {
    let dim = Style::default().fg(palette.dim);
    let mut spans = vec![
        Span::styled(
            format!(" md {} ", if shell.markdown_enabled() { "on" } else { "off" }),
            dim,
        ),
        Span::styled("│", Style::default().fg(BORDER_DIM)),
        Span::styled(format!(" {} ", view.theme.name()), dim),
    ];

    if shell.is_selecting() {
        spans.push(Span::styled("│", Style::default().fg(BORDER_DIM)));
        spans.push(Span::styled(
            " ↑/↓ select · Enter open · Esc cancel ",
            Style::default().fg(palette.info),
        ));
    }

    if let Some(status) = &view.status {
        spans.push(Span::styled("│", Style::default().fg(BORDER_DIM)));
        spans.push(Span::styled(
            format!(" {}", status),
            Style::default().fg(palette.success),
        ));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_input(f: &mut Frame, shell: &Shell, view: &ViewState, palette: &Palette, area: Rect) {
    let input = shell.input();
    let mut style = Style::default().fg(palette.foreground);
    if input.dimmed {
        style = style.add_modifier(Modifier::DIM);
    }

    let mut spans = vec![
        Span::styled(PROMPT, Style::default().fg(palette.success).add_modifier(Modifier::BOLD)),
        Span::styled(input.value.clone(), style),
    ];

    let cursor_on = (view.frame / BLINK_FRAMES) % 2 == 0;
    if !input.read_only && cursor_on {
        spans.push(Span::styled("█", Style::default().fg(palette.foreground)));
    }

    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(BORDER_DIM));
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}
