//! UI rendering for the front panel.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::cpu::CpuSnapshot;
use super::app::PanelApp;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &PanelApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55),
            Constraint::Percentage(45),
        ])
        .split(frame.area());

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    let snap = app.snapshot().ok();
    draw_leds(frame, left_chunks[0], snap.as_ref());
    draw_registers(frame, left_chunks[1], app, snap.as_ref());
    draw_status(frame, left_chunks[2], app);

    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(18),
            Constraint::Length(5),
        ])
        .split(chunks[1]);

    draw_listing(frame, right_chunks[0], app);
    draw_help(frame, right_chunks[1]);
}

/// Draw the four output LEDs, most significant bit first.
fn draw_leds(frame: &mut Frame, area: Rect, snap: Option<&CpuSnapshot>) {
    let led = snap.map_or(0, |s| s.led);
    let spans: Vec<Span> = (0..4)
        .rev()
        .map(|bit| {
            if led & (1 << bit) != 0 {
                Span::styled(" ● ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
            } else {
                Span::styled(" ○ ", Style::default().fg(Color::DarkGray))
            }
        })
        .collect();

    let paragraph = Paragraph::new(vec![Line::from(spans), Line::from(format!(" {:04b}", led))])
        .block(Block::default()
            .title(" Output ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red)));

    frame.render_widget(paragraph, area);
}

/// Draw register state.
fn draw_registers(frame: &mut Frame, area: Rect, app: &PanelApp, snap: Option<&CpuSnapshot>) {
    let Some(snap) = snap else {
        frame.render_widget(Paragraph::new("core unavailable"), area);
        return;
    };

    let running = app.machine.is_running();
    let content = vec![
        Line::from(vec![
            Span::raw("A:  "),
            Span::styled(format!("{:04b}", snap.a), Style::default().fg(Color::White)),
            Span::raw(format!(" = {:2}", snap.a)),
            Span::raw("    B:  "),
            Span::styled(format!("{:04b}", snap.b), Style::default().fg(Color::White)),
            Span::raw(format!(" = {:2}", snap.b)),
        ]),
        Line::from(vec![
            Span::raw("PC: "),
            Span::styled(format!("{:02}", snap.pc), Style::default().fg(Color::Yellow)),
            Span::raw("   C: "),
            Span::styled(
                if snap.carry { "1" } else { "0" },
                if snap.carry { Style::default().fg(Color::Green) } else { Style::default().fg(Color::Gray) },
            ),
            Span::raw(format!("   IR: {:08b}", snap.instruction)),
        ]),
        Line::from(vec![
            Span::raw("IN: "),
            Span::styled(format!("{:04b}", app.input), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(vec![
            Span::raw("Steps: "),
            Span::styled(format!("{}", snap.cycles), Style::default().fg(Color::Cyan)),
            Span::raw("   State: "),
            Span::styled(
                if running { "Running".to_string() } else { format!("{:?}", snap.state) },
                if running {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::Red)
                }),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw the ROM listing.
fn draw_listing(frame: &mut Frame, area: Rect, app: &PanelApp) {
    let items: Vec<ListItem> = app
        .listing()
        .into_iter()
        .map(|(addr, text, is_current)| {
            let prefix = if is_current { "▶ " } else { "  " };
            let style = if is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!("{}{:02}: {}", prefix, addr, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" ROM ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &PanelApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("r: Run  p/space: Stop  s: Step"),
        Line::from("x: Reset  0-3: Input bit  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}
