//! Progress reporting for in-flight guard steps.
//!
//! Runners push [`GuardProgressEvent`]s into a [`ProgressSink`] supplied by
//! the caller, so concurrent evaluations can each have their own sink.
//! [`ProgressEmitter`] renders events for a terminal: one appended line per
//! transition when non-interactive, or a spinner line redrawn in place every
//! [`TICK`] when interactive.
//!
//! Operator output goes through the sink only. Diagnostics use `tracing`.

use std::io::{IsTerminal, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::core::format::{count_label, elapsed_label};
use crate::core::types::{GuardProgressEvent, GuardStep, ProgressState, StepOutcome};

/// Redraw interval for the interactive spinner.
pub const TICK: Duration = Duration::from_millis(80);

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const CLEAR_LINE: &str = "\r\x1b[2K";

/// Receives progress events from the review and judge runners.
pub trait ProgressSink {
    fn on_progress(&self, event: &GuardProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&GuardProgressEvent),
{
    fn on_progress(&self, event: &GuardProgressEvent) {
        self(event);
    }
}

/// Discards all events.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _event: &GuardProgressEvent) {}
}

/// Line for a step satisfied from cache.
pub fn render_cached(step: GuardStep) -> String {
    format!("   ○ {step} · cached")
}

/// Line for a step that started executing (non-interactive).
pub fn render_active(step: GuardStep) -> String {
    format!("   ◌ {step} · running")
}

/// Spinner line for an executing step (interactive).
pub fn render_spinner(step: GuardStep, frame: usize, elapsed: Duration) -> String {
    format!(
        "   {} {step} · {}",
        SPINNER[frame % SPINNER.len()],
        elapsed_label(elapsed)
    )
}

/// Completion line plus detail sub-lines.
///
/// Reviews list non-zero blocker/nitpick counts; judges list a reason only
/// when they failed.
pub fn render_done(step: GuardStep, outcome: &StepOutcome, elapsed: Option<Duration>) -> Vec<String> {
    let ok = match (&outcome.review, &outcome.judge) {
        (Some(counts), _) => counts.blockers == 0,
        (None, Some(verdict)) => verdict.passed,
        (None, None) => true,
    };
    let glyph = if ok { "✓" } else { "✗" };
    let timing = elapsed.map_or_else(|| "done".to_string(), elapsed_label);

    let mut lines = vec![format!("   {glyph} {step} · {timing}")];
    if let Some(counts) = outcome.review {
        if counts.blockers > 0 {
            lines.push(sub_line(&count_label(counts.blockers, "blocker")));
        }
        if counts.nitpicks > 0 {
            lines.push(sub_line(&count_label(counts.nitpicks, "nitpick")));
        }
    }
    if let Some(verdict) = &outcome.judge
        && !verdict.passed
    {
        let reason = verdict.reason.as_deref().unwrap_or("no reason given");
        lines.push(sub_line(&format!("reason: {reason}")));
    }
    lines
}

fn sub_line(text: &str) -> String {
    format!("      └ {text}")
}

fn event_elapsed(event: &GuardProgressEvent) -> Option<Duration> {
    let inflight = event.inflight?;
    inflight.ended_at?.duration_since(inflight.began_at).ok()
}

struct ActiveLine {
    step: GuardStep,
    began: Instant,
}

struct EmitterState {
    out: Box<dyn Write + Send>,
    interactive: bool,
    active: Option<ActiveLine>,
    frame: usize,
    closed: bool,
}

impl EmitterState {
    fn write(&mut self, text: &str) {
        if let Err(err) = self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush())
        {
            warn!(err = %err, "failed to write progress");
        }
    }

    /// Finish the current spinner line as-is so it is never touched again.
    fn seal_active(&mut self) {
        if self.active.take().is_some() && self.interactive {
            self.write("\n");
        }
    }

    fn redraw(&mut self) {
        if self.closed {
            return;
        }
        let Some(active) = &self.active else {
            return;
        };
        self.frame = self.frame.wrapping_add(1);
        let line = render_spinner(active.step, self.frame, active.began.elapsed());
        self.write(&format!("{CLEAR_LINE}{line}"));
    }

    fn handle(&mut self, event: &GuardProgressEvent) {
        if self.closed {
            return;
        }
        match event.state() {
            ProgressState::Cached => {
                self.seal_active();
                self.write(&format!("{}\n", render_cached(event.step)));
            }
            ProgressState::Active => {
                self.seal_active();
                self.active = Some(ActiveLine {
                    step: event.step,
                    began: Instant::now(),
                });
                if self.interactive {
                    self.frame = 0;
                    let line = render_spinner(event.step, 0, Duration::ZERO);
                    self.write(&format!("{CLEAR_LINE}{line}"));
                } else {
                    self.write(&format!("{}\n", render_active(event.step)));
                }
            }
            ProgressState::Done => {
                let same_step = self
                    .active
                    .as_ref()
                    .is_some_and(|active| active.step == event.step);
                let slot = if same_step {
                    self.active.take()
                } else {
                    self.seal_active();
                    None
                };
                let elapsed =
                    event_elapsed(event).or_else(|| slot.map(|active| active.began.elapsed()));
                let Some(outcome) = &event.outcome else {
                    return;
                };
                let mut text = String::new();
                if self.interactive {
                    text.push_str(CLEAR_LINE);
                }
                for line in render_done(event.step, outcome, elapsed) {
                    text.push_str(&line);
                    text.push('\n');
                }
                self.write(&text);
            }
        }
    }
}

struct Ticker {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Ticker {
    fn spawn(state: Arc<Mutex<EmitterState>>) -> Self {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            while let Err(RecvTimeoutError::Timeout) = stopped.recv_timeout(TICK) {
                lock(&state).redraw();
            }
        });
        Self { stop, handle }
    }

    fn cancel(self) {
        // A send error only means the thread already exited.
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            warn!("progress ticker panicked");
        }
    }
}

/// Terminal renderer for guard progress.
pub struct ProgressEmitter {
    state: Arc<Mutex<EmitterState>>,
    ticker: Mutex<Option<Ticker>>,
}

impl ProgressEmitter {
    /// Render into `out`; `interactive` enables the in-place spinner.
    pub fn new(out: impl Write + Send + 'static, interactive: bool) -> Self {
        let state = Arc::new(Mutex::new(EmitterState {
            out: Box::new(out),
            interactive,
            active: None,
            frame: 0,
            closed: false,
        }));
        let ticker = interactive.then(|| Ticker::spawn(Arc::clone(&state)));
        Self {
            state,
            ticker: Mutex::new(ticker),
        }
    }

    /// Render to stderr, interactive when stderr is a terminal.
    pub fn stderr() -> Self {
        let stderr = std::io::stderr();
        let interactive = stderr.is_terminal();
        Self::new(stderr, interactive)
    }

    /// Stop the redraw timer and seal any pending line. Later events are ignored.
    pub fn done(&self) {
        if let Some(ticker) = lock(&self.ticker).take() {
            ticker.cancel();
        }
        let mut state = lock(&self.state);
        if state.closed {
            return;
        }
        state.seal_active();
        state.closed = true;
    }
}

impl ProgressSink for ProgressEmitter {
    fn on_progress(&self, event: &GuardProgressEvent) {
        lock(&self.state).handle(event);
    }
}

impl Drop for ProgressEmitter {
    fn drop(&mut self) {
        self.done();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::SystemTime;

    use super::*;
    use crate::core::types::{ReviewCounts, Verdict};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("lock")).into_owned()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn review_done(step: GuardStep, blockers: u32, nitpicks: u32) -> GuardProgressEvent {
        let began = SystemTime::now();
        GuardProgressEvent::finished(
            "1.vision",
            step,
            began,
            began + Duration::from_millis(1_500),
            StepOutcome {
                path: PathBuf::from("r.md"),
                review: Some(ReviewCounts { blockers, nitpicks }),
                judge: None,
            },
        )
    }

    fn judge_outcome(verdict: Verdict) -> StepOutcome {
        StepOutcome {
            path: PathBuf::from("j.md"),
            review: None,
            judge: Some(verdict),
        }
    }

    #[test]
    fn review_sub_lines_pluralize() {
        let step = GuardStep::review(1);
        let outcome = StepOutcome {
            path: PathBuf::from("r.md"),
            review: Some(ReviewCounts {
                blockers: 1,
                nitpicks: 2,
            }),
            judge: None,
        };
        let lines = render_done(step, &outcome, Some(Duration::from_millis(1_200)));
        assert_eq!(lines[0], "   ✗ review.r1 · 1.2s");
        assert_eq!(lines[1], "      └ 1 blocker");
        assert_eq!(lines[2], "      └ 2 nitpicks");
    }

    #[test]
    fn clean_review_has_no_sub_lines() {
        let outcome = StepOutcome {
            path: PathBuf::from("r.md"),
            review: Some(ReviewCounts::default()),
            judge: None,
        };
        assert_eq!(render_done(GuardStep::review(1), &outcome, None).len(), 1);
    }

    #[test]
    fn judge_reason_only_on_failure() {
        let step = GuardStep::judge(1);
        let passed = render_done(step, &judge_outcome(Verdict::pass("fine")), None);
        assert_eq!(passed, vec!["   ✓ judge.j1 · done".to_string()]);

        let failed = render_done(step, &judge_outcome(Verdict::fail("1 > 0")), None);
        assert_eq!(failed.len(), 2);
        assert_eq!(failed[1], "      └ reason: 1 > 0");
    }

    #[test]
    fn non_interactive_appends_one_line_per_transition() {
        let buf = SharedBuf::default();
        let emitter = ProgressEmitter::new(buf.clone(), false);
        let step = GuardStep::review(1);
        emitter.on_progress(&GuardProgressEvent::cached("1.vision", GuardStep::review(2)));
        emitter.on_progress(&GuardProgressEvent::began("1.vision", step, SystemTime::now()));
        emitter.on_progress(&review_done(step, 0, 1));
        emitter.done();

        let text = buf.text();
        assert!(!text.contains('\r'));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "   ○ review.r2 · cached",
                "   ◌ review.r1 · running",
                "   ✓ review.r1 · 1.5s",
                "      └ 1 nitpick",
            ]
        );
    }

    #[test]
    fn nothing_is_written_after_done() {
        let buf = SharedBuf::default();
        let emitter = ProgressEmitter::new(buf.clone(), false);
        emitter.done();
        emitter.on_progress(&GuardProgressEvent::cached("1.vision", GuardStep::review(1)));
        assert!(buf.text().is_empty());
    }

    #[test]
    fn interactive_redraws_then_seals() {
        let buf = SharedBuf::default();
        let emitter = ProgressEmitter::new(buf.clone(), true);
        let step = GuardStep::review(1);
        emitter.on_progress(&GuardProgressEvent::began("1.vision", step, SystemTime::now()));
        thread::sleep(TICK * 4);
        emitter.on_progress(&review_done(step, 2, 0));
        emitter.done();

        let text = buf.text();
        assert!(text.matches(CLEAR_LINE).count() >= 3, "expected redraws: {text:?}");
        assert!(text.ends_with("   ✗ review.r1 · 1.5s\n      └ 2 blockers\n"));

        let len = text.len();
        thread::sleep(TICK * 2);
        assert_eq!(buf.text().len(), len);
    }

    #[test]
    fn interactive_done_seals_pending_line() {
        let buf = SharedBuf::default();
        let emitter = ProgressEmitter::new(buf.clone(), true);
        emitter.on_progress(&GuardProgressEvent::began(
            "1.vision",
            GuardStep::judge(1),
            SystemTime::now(),
        ));
        emitter.done();
        assert!(buf.text().ends_with('\n'));
    }

    #[test]
    fn closures_are_sinks() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: &GuardProgressEvent| seen.lock().expect("lock").push(event.step);
        sink.on_progress(&GuardProgressEvent::cached("1.vision", GuardStep::judge(3)));
        assert_eq!(*seen.lock().expect("lock"), vec![GuardStep::judge(3)]);
    }
}
