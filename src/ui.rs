use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph, Widget, Wrap},
};

use tracepad::feedback::Severity;
use tracepad::mapper::{GridCell, GridSpec, Point};

use crate::App;

const SIDE_PANEL_WIDTH: u16 = 34;

fn split(area: Rect) -> (Rect, Rect, Rect, Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(4),
            Constraint::Length(1),
        ])
        .split(area);
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(SIDE_PANEL_WIDTH)])
        .split(rows[1]);
    (rows[0], cols[0], cols[1], rows[2])
}

/// Drawable surface inside the canvas border, in terminal cells
pub fn canvas_rect(area: Rect) -> Rect {
    let (_, canvas, _, _) = split(area);
    Block::bordered().inner(canvas)
}

/// Terminal cell showing grid cell `cell`, if it is on the grid
fn cell_position(cell: GridCell, grid: &GridSpec, rect: Rect) -> Option<Position> {
    if !grid.contains(cell) || rect.width == 0 || rect.height == 0 {
        return None;
    }
    let n = grid.grid_size as i64;
    let col = cell.x as i64 * rect.width as i64 / n;
    let row = cell.y as i64 * rect.height as i64 / n;
    Some(Position::new(rect.x + col as u16, rect.y + row as u16))
}

fn paint(buf: &mut Buffer, pos: Position, symbol: &str, style: Style) {
    if let Some(c) = buf.cell_mut(pos) {
        c.set_symbol(symbol).set_style(style);
    }
}

fn severity_style(sev: Severity) -> Style {
    let color = match sev {
        Severity::Success => Color::Green,
        Severity::Warning => Color::Yellow,
        Severity::Error => Color::Red,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

fn percent(v: f64) -> String {
    format!("{:>5.1}%", v * 100.0)
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let session = &self.session;
        let grid = session.config().grid;
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let dim = Style::default().add_modifier(Modifier::DIM);

        let (title, canvas, side, help) = split(area);

        let guide = if session.template().is_some() {
            Span::styled("guided", Style::default().fg(Color::Blue))
        } else {
            Span::styled("free drawing (no template)", dim)
        };
        Paragraph::new(Line::from(vec![
            Span::styled(format!(" tracepad  letter {} ", session.letter()), bold),
            guide,
        ]))
        .render(title, buf);

        let block = Block::bordered().title(format!(" {} ", session.letter()));
        let inner = block.inner(canvas);
        block.render(canvas, buf);

        for y in inner.top()..inner.bottom() {
            for x in inner.left()..inner.right() {
                paint(buf, Position::new(x, y), "·", dim);
            }
        }

        if let Some(template) = session.template() {
            let style = Style::default().fg(Color::Blue);
            for cell in template.cells() {
                if let Some(pos) = cell_position(cell, &grid, inner) {
                    paint(buf, pos, "░", style);
                }
            }
        }

        let trace_style = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);
        let live_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
        let live: &[Point] = session.live_stroke().map(|s| s.points()).unwrap_or(&[]);
        for (points, style) in [(session.points(), trace_style), (live, live_style)] {
            for p in points {
                if let Some(pos) = cell_position(p.cell(), &grid, inner) {
                    paint(buf, pos, "█", style);
                }
            }
        }

        let m = session.metrics();
        let mut lines = vec![
            Line::from(Span::styled("Metrics", bold)),
            Line::from(format!("alignment {}", percent(m.alignment_score))),
            Line::from(format!("direction {}", percent(m.direction_score))),
            Line::from(format!("coverage  {}", percent(m.coverage_score))),
            Line::from(Span::styled(
                format!("accuracy  {}", percent(m.total_accuracy)),
                bold,
            )),
            Line::from(format!("time      {:>5.1}s", m.total_time)),
            Line::from(format!("strokes   {:>6}", m.stroke_count)),
            Line::default(),
        ];

        if session.can_submit() {
            lines.push(Line::from(Span::styled(
                "ready to submit (s)",
                Style::default().fg(Color::Green),
            )));
        } else if session.can_try_again() {
            lines.push(Line::from(Span::styled(
                format!(
                    "need {:.0}% to submit",
                    session.config().submit_threshold * 100.0
                ),
                dim,
            )));
        }

        if let Some(signal) = session.current_signal() {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                signal.text().to_string(),
                severity_style(signal.severity()),
            )));
        }

        if let Some(status) = &self.status {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(status.clone(), dim)));
        }

        Paragraph::new(lines)
            .block(Block::bordered().title(" Progress "))
            .wrap(Wrap { trim: true })
            .render(side, buf);

        Paragraph::new(Span::styled(
            " s submit   r try again   n next letter   esc quit",
            Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
        ))
        .render(help, buf);
    }
}
