//! Render error boundary.
//!
//! A panic raised while drawing a frame is caught exactly once; from then on
//! the boundary renders a static fallback panel instead of the wrapped view,
//! for the remaining lifetime of the session. There is no recovery path.

use ratatui::{
    layout::Alignment,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use std::backtrace::Backtrace;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Captured render failure: message plus a blank-stripped backtrace.
#[derive(Debug, Clone)]
pub struct RenderFailure {
    pub message: String,
    pub trace: String,
}

/// Catches a panicking render and pins the fallback panel afterwards.
#[derive(Debug, Default)]
pub struct RenderBoundary {
    failure: Option<RenderFailure>,
}

impl RenderBoundary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the wrapped render unless the boundary has already tripped.
    /// Returns `None` when the fallback should be shown instead; the
    /// wrapped closure is never invoked again once a failure is recorded.
    pub fn run<T>(&mut self, render: impl FnOnce() -> T) -> Option<T> {
        if self.failure.is_some() {
            return None;
        }
        match catch_unwind(AssertUnwindSafe(render)) {
            Ok(value) => Some(value),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!("Render failed: {message}");
                self.failure = Some(RenderFailure {
                    message,
                    trace: strip_blanks(&Backtrace::force_capture().to_string()),
                });
                None
            }
        }
    }

    pub fn failure(&self) -> Option<&RenderFailure> {
        self.failure.as_ref()
    }

    /// Draw the wrapped view, or the fallback panel once tripped.
    pub fn draw(&mut self, frame: &mut Frame, render: impl FnOnce(&mut Frame)) {
        let area = frame.area();
        if self.run(|| render(&mut *frame)).is_none() {
            if let Some(failure) = self.failure.clone() {
                render_fallback(frame, area, &failure);
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Drop blank lines from a captured trace.
fn strip_blanks(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_fallback(frame: &mut Frame, area: ratatui::layout::Rect, failure: &RenderFailure) {
    frame.render_widget(Clear, area);
    let block = Block::default()
        .title(" Error ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = vec![
        Line::from(Span::styled(
            "An unrecoverable display error occurred.",
            Style::default().fg(Color::White),
        )),
        Line::from(Span::styled(
            failure.message.clone(),
            Style::default().fg(Color::Red),
        )),
        Line::from(""),
    ];
    lines.extend(
        failure
            .trace
            .lines()
            .map(|line| Line::from(Span::styled(line.to_string(), Style::default().fg(Color::DarkGray)))),
    );
    let body = Paragraph::new(lines)
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: false });
    frame.render_widget(body, inner);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_until_a_panic() {
        let mut boundary = RenderBoundary::new();
        assert_eq!(boundary.run(|| 7), Some(7));
        assert!(boundary.failure().is_none());
    }

    #[test]
    fn never_runs_the_wrapped_render_after_a_catch() {
        let mut boundary = RenderBoundary::new();
        let mut calls = 0;

        let result = boundary.run(|| -> u32 { panic!("boom") });
        assert!(result.is_none());
        assert!(boundary.failure().is_some());

        for _ in 0..3 {
            let result = boundary.run(|| {
                calls += 1;
                calls
            });
            assert!(result.is_none());
        }
        assert_eq!(calls, 0, "wrapped render ran after the boundary tripped");
    }

    #[test]
    fn captures_the_panic_message() {
        let mut boundary = RenderBoundary::new();
        let _ = boundary.run(|| -> () { panic!("exploded: {}", 42) });
        let failure = boundary.failure().unwrap();
        assert_eq!(failure.message, "exploded: 42");
    }

    #[test]
    fn strip_blanks_removes_empty_lines() {
        let stripped = strip_blanks("one\n\n  \ntwo\n");
        assert_eq!(stripped, "one\ntwo");
    }
}
