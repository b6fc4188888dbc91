use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Circle};
use ratatui::widgets::{Block, Borders, Paragraph, Sparkline};

use crate::shared::{BALL_RADIUS, CANVAS_HEIGHT, CANVAS_WIDTH, DisplayState, ParamSlot};

const SIDE_PANEL_WIDTH: u16 = 34;

/// Draw one frame. Returns the inner canvas area so clicks can be mapped back.
pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, spectrum: &[f32]) -> Rect {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(SIDE_PANEL_WIDTH)])
        .split(area);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(8),                                // settings
            Constraint::Length(ParamSlot::ALL.len() as u16 + 2), // knob list
            Constraint::Length(6),                                // spectrum
            Constraint::Min(3),                                   // status + help
        ])
        .split(columns[1]);

    let canvas_area = draw_canvas(frame, columns[0], state);
    draw_settings(frame, side[0], state);
    draw_params(frame, side[1], state);
    draw_spectrum(frame, side[2], spectrum);
    draw_status(frame, side[3], state);
    canvas_area
}

fn draw_canvas(frame: &mut Frame, area: Rect, state: &DisplayState) -> Rect {
    let block = Block::default().borders(Borders::ALL).title(" tonelab ");
    let inner = block.inner(area);
    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds([0.0, CANVAS_WIDTH])
        .y_bounds([0.0, CANVAS_HEIGHT])
        .paint(|ctx| {
            for ball in &state.balls {
                let (r, g, b) = ball.color;
                ctx.draw(&Circle {
                    x: ball.x,
                    y: CANVAS_HEIGHT - ball.y, // canvas y points up
                    radius: BALL_RADIUS,
                    color: Color::Rgb(r, g, b),
                });
            }
        });
    frame.render_widget(canvas, area);
    inner
}

fn draw_settings(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let dim = Style::default().fg(Color::DarkGray);
    let rec = if state.recording {
        Span::styled("● REC", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
    } else {
        Span::styled("○ rec", dim)
    };
    let audio = if state.chain_ready {
        Span::styled("audio on", Style::default().fg(Color::Green))
    } else {
        Span::styled("audio off", Style::default().fg(Color::Yellow))
    };
    let lines = vec![
        Line::from(vec![Span::styled("scale  ", dim), Span::raw(state.scale_label)]),
        Line::from(vec![
            Span::styled("key    ", dim),
            Span::raw(format!("{}{}", state.key, state.octave)),
        ]),
        Line::from(vec![Span::styled("wave   ", dim), Span::raw(state.params.waveform.label())]),
        Line::from(vec![Span::styled("balls  ", dim), Span::raw(state.balls.len().to_string())]),
        Line::from(vec![Span::styled("notes  ", dim), Span::raw(state.last_notes.join(" "))]),
        Line::from(vec![rec, Span::raw("  "), audio]),
    ];
    let block = Block::default().borders(Borders::ALL).title(" settings ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn param_text(slot: ParamSlot, state: &DisplayState) -> String {
    let p = &state.params;
    match slot {
        ParamSlot::Attack => format!("{:.2} s", p.envelope.attack),
        ParamSlot::Decay => format!("{:.2} s", p.envelope.decay),
        ParamSlot::Sustain => format!("{:.2}", p.envelope.sustain),
        ParamSlot::Release => format!("{:.2} s", p.envelope.release),
        ParamSlot::DelayMix => format!("{:.0}%", p.delay_mix * 100.0),
        ParamSlot::ReverbMix => format!("{:.0}%", p.reverb_mix * 100.0),
        ParamSlot::Gain => format!("{:.2}", p.gain),
        ParamSlot::Lowpass => format!("{:.0} Hz", p.lowpass_hz),
        ParamSlot::Highpass => format!("{:.0} Hz", p.highpass_hz),
        ParamSlot::BallSpeed => format!("{:.1}x", state.ball_speed),
    }
}

fn draw_params(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let lines: Vec<Line> = ParamSlot::ALL
        .iter()
        .map(|&slot| {
            let selected = slot == state.selected_param;
            let style = if selected {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default().fg(Color::White)
            };
            let marker = if selected { ">" } else { " " };
            Line::from(Span::styled(
                format!("{marker} {:<9}{:>12}", slot.label(), param_text(slot, state)),
                style,
            ))
        })
        .collect();
    let block = Block::default().borders(Borders::ALL).title(" knob ");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_spectrum(frame: &mut Frame, area: Rect, spectrum: &[f32]) {
    let bars: Vec<u64> = spectrum.iter().map(|m| (m.clamp(0.0, 1.0) * 100.0) as u64).collect();
    let sparkline = Sparkline::default()
        .block(Block::default().borders(Borders::ALL).title(" spectrum "))
        .data(bars)
        .max(100)
        .style(Style::default().fg(Color::Magenta));
    frame.render_widget(sparkline, area);
}

fn draw_status(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let lines = vec![
        Line::from(state.status.as_str()),
        Line::from(Span::styled(
            "click/space spawn  c clear  r rec  q quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    frame.render_widget(Paragraph::new(lines), area);
}
