//! Live progress rendering.
//!
//! Every tick the whole job tree is redrawn from the atomically published
//! job statuses. In interactive mode the display lives on the terminal's
//! alternate screen; once the engine signals completion the reporter leaves
//! it and prints one final frame to the normal screen.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::{Job, JobStatus};

pub const SPINNER: [char; 12] = ['▁', '▃', '▄', '▅', '▆', '▇', '█', '▇', '▆', '▅', '▄', '▃'];

/// One spinner cycle every two seconds.
pub const TICK: Duration = Duration::from_millis(166);

pub const COMPLETED: char = '✓';
pub const FAILED: char = '✕';
pub const SKIPPED: char = '-';

const LINE_WIDTH: usize = 60;

const ENTER_ALT_SCREEN: &str = "\x1b[?1049h";
const LEAVE_ALT_SCREEN: &str = "\x1b[?1049l";
const CLEAR_SCREEN: &str = "\x1b[H\x1b[J";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressStyle {
    /// Redraw on the alternate screen, then print the final frame.
    #[default]
    Interactive,
    /// Print the final frame only.
    Plain,
    /// Print nothing.
    Hidden,
}

pub struct ProgressReporter {
    title: String,
    jobs: Vec<Arc<Job>>,
    style: ProgressStyle,
}

impl ProgressReporter {
    pub fn new(title: impl Into<String>, jobs: Vec<Arc<Job>>, style: ProgressStyle) -> Self {
        Self {
            title: title.into(),
            jobs,
            style,
        }
    }

    /// Render the current state of every job.
    pub fn frame(&self, tick: usize) -> String {
        let mut out = format!("crossbuild: {}\n", self.title);
        out.push_str(&"═".repeat(LINE_WIDTH + 2));
        out.push('\n');
        for job in &self.jobs {
            render_job(&mut out, job, 0, false, tick);
            out.push('\n');
        }
        out
    }

    /// Draw until `done` becomes true (or its sender is dropped), then write
    /// the final frame. Returns the writer.
    pub async fn run<W: Write + Send>(
        self,
        mut out: W,
        mut done: watch::Receiver<bool>,
    ) -> io::Result<W> {
        if self.style == ProgressStyle::Hidden {
            finished(&mut done).await;
            return Ok(out);
        }

        let interactive = self.style == ProgressStyle::Interactive;
        if interactive {
            out.write_all(ENTER_ALT_SCREEN.as_bytes())?;
        }

        let mut interval = tokio::time::interval(TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut tick = 0usize;
        loop {
            tokio::select! {
                _ = finished(&mut done) => break,
                _ = interval.tick() => {
                    if interactive {
                        out.write_all(CLEAR_SCREEN.as_bytes())?;
                        out.write_all(self.frame(tick).as_bytes())?;
                        out.flush()?;
                    }
                    tick += 1;
                }
            }
        }

        if interactive {
            out.write_all(LEAVE_ALT_SCREEN.as_bytes())?;
        }
        out.write_all(self.frame(tick).as_bytes())?;
        out.flush()?;
        Ok(out)
    }
}

// Resolves once the flag is set or the sender is gone.
async fn finished(done: &mut watch::Receiver<bool>) {
    let _ = done.wait_for(|finished| *finished).await;
}

/// A job is resolved once it and all of its descendants have an outcome.
/// Pending jobs under a failed ancestor are resolved as skipped.
fn is_resolved(job: &Job, ancestor_failed: bool) -> bool {
    let status = job.status();
    let own = status.is_terminal() || (status == JobStatus::Pending && ancestor_failed);
    let failed = ancestor_failed || status == JobStatus::Failed;
    own && job.children().iter().all(|c| is_resolved(c, failed))
}

fn glyph(job: &Job, ancestor_failed: bool, tick: usize) -> char {
    if !is_resolved(job, ancestor_failed) {
        return SPINNER[tick % SPINNER.len()];
    }
    match job.status() {
        JobStatus::Completed => COMPLETED,
        JobStatus::Failed => FAILED,
        _ => SKIPPED,
    }
}

fn render_job(out: &mut String, job: &Job, level: usize, ancestor_failed: bool, tick: usize) {
    let leader = if level == 0 {
        String::new()
    } else {
        format!("└─{}", "──".repeat(level - 1))
    };
    let label = format!("{leader}{}", job.name());
    let mark = glyph(job, ancestor_failed, tick);
    out.push_str(&format!("{label:<LINE_WIDTH$} {mark}\n"));

    let failed = ancestor_failed || job.status() == JobStatus::Failed;
    for child in job.children() {
        render_job(out, child, level + 1, failed, tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::tests::runner;
    use crossbuild_core::{LogLevel, Logger, Target};
    use futures::FutureExt;

    fn row(label: &str, mark: char) -> String {
        format!("{label:<60} {mark}")
    }

    fn rows(frame: &str) -> Vec<&str> {
        frame.lines().skip(2).collect()
    }

    #[test]
    fn test_pending_tree_spins() {
        let job = Job::group("crossbuild", false)
            .with_child(Job::group("build", true).with_child(Job::leaf("linux_amd64", None, runner(true))));
        let reporter = ProgressReporter::new("build demo", vec![Arc::new(job)], ProgressStyle::Plain);

        let frame = reporter.frame(3);
        let lines: Vec<&str> = frame.lines().collect();
        assert_eq!(lines[0], "crossbuild: build demo");
        assert_eq!(lines[1], "═".repeat(62));
        assert_eq!(
            rows(&frame),
            vec![
                row("crossbuild", SPINNER[3]).as_str(),
                row("└─build", SPINNER[3]).as_str(),
                row("└───linux_amd64", SPINNER[3]).as_str(),
                "",
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_marks_and_skips() {
        let job = Arc::new(
            Job::group("crossbuild", false)
                .with_child(Job::leaf("pre-build", None, runner(false)))
                .with_child(Job::group("build", true).with_child(Job::leaf("linux_amd64", None, runner(true)))),
        );
        assert!(!job.run(&Logger::new("", LogLevel::Info)).await);

        let reporter = ProgressReporter::new("build demo", vec![job], ProgressStyle::Plain);
        let frame = reporter.frame(0);
        assert_eq!(
            rows(&frame),
            vec![
                row("crossbuild", FAILED).as_str(),
                row("└─pre-build", FAILED).as_str(),
                row("└─build", SKIPPED).as_str(),
                row("└───linux_amd64", SKIPPED).as_str(),
                "",
            ]
        );
    }

    #[tokio::test]
    async fn test_completed_tree() {
        let a = Arc::new(Job::group("crossbuild", false).with_child(Job::leaf("setup", None, runner(true))));
        let b = Arc::new(Job::leaf("post-build", None, runner(true)));
        let logger = Logger::new("", LogLevel::Info);
        assert!(a.run(&logger).await);
        assert!(b.run(&logger).await);

        let reporter = ProgressReporter::new("build demo", vec![a, b], ProgressStyle::Plain);
        assert_eq!(
            rows(&reporter.frame(0)),
            vec![
                row("crossbuild", COMPLETED).as_str(),
                row("└─setup", COMPLETED).as_str(),
                "",
                row("post-build", COMPLETED).as_str(),
                "",
            ]
        );
    }

    #[tokio::test]
    async fn test_composite_waits_for_descendants() {
        let (release, wait) = tokio::sync::oneshot::channel::<()>();
        let wait = Arc::new(std::sync::Mutex::new(Some(wait)));
        let slow: crate::job::Runner = Arc::new(move |_l: Logger, _t: Option<Target>| {
            let rx = wait.lock().unwrap().take();
            async move {
                if let Some(rx) = rx {
                    let _ = rx.await;
                }
                true
            }
            .boxed()
        });
        let job = Arc::new(
            Job::group("targets", true)
                .with_child(Job::leaf("fast", None, runner(true)))
                .with_child(Job::leaf("slow", None, slow)),
        );

        let handle = tokio::spawn({
            let job = job.clone();
            async move { job.run(&Logger::new("", LogLevel::Info)).await }
        });
        while job.children()[0].status() != JobStatus::Completed {
            tokio::task::yield_now().await;
        }

        let reporter = ProgressReporter::new("t", vec![job.clone()], ProgressStyle::Plain);
        let frame = reporter.frame(1);
        assert_eq!(rows(&frame)[0], row("targets", SPINNER[1]));
        assert_eq!(rows(&frame)[1], row("└─fast", COMPLETED));
        assert_eq!(rows(&frame)[2], row("└─slow", SPINNER[1]));

        release.send(()).unwrap();
        assert!(handle.await.unwrap());
        assert_eq!(rows(&reporter.frame(1))[0], row("targets", COMPLETED));
    }

    #[tokio::test]
    async fn test_plain_writes_one_final_frame() {
        let job = Arc::new(Job::leaf("only", None, runner(true)));
        assert!(job.run(&Logger::new("", LogLevel::Info)).await);

        let (tx, rx) = watch::channel(false);
        let reporter = ProgressReporter::new("demo", vec![job], ProgressStyle::Plain);
        let task = tokio::spawn(reporter.run(Vec::new(), rx));
        tokio::time::sleep(Duration::from_millis(400)).await;
        tx.send(true).unwrap();

        let out = String::from_utf8(task.await.unwrap().unwrap()).unwrap();
        assert_eq!(out.matches("crossbuild: demo").count(), 1);
        assert!(out.contains(&row("only", COMPLETED)));
        assert!(!out.contains('\x1b'));
    }

    #[tokio::test]
    async fn test_interactive_uses_alternate_screen() {
        let job = Arc::new(Job::leaf("only", None, runner(true)));
        let (tx, rx) = watch::channel(false);
        let reporter = ProgressReporter::new("demo", vec![job.clone()], ProgressStyle::Interactive);
        let task = tokio::spawn(reporter.run(Vec::new(), rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(job.run(&Logger::new("", LogLevel::Info)).await);
        drop(tx);

        let out = String::from_utf8(task.await.unwrap().unwrap()).unwrap();
        assert!(out.starts_with(ENTER_ALT_SCREEN));
        let (_live, after) = out.split_once(LEAVE_ALT_SCREEN).unwrap();
        assert_eq!(after.matches("crossbuild: demo").count(), 1);
        assert!(after.contains(&row("only", COMPLETED)));
    }

    #[tokio::test]
    async fn test_hidden_writes_nothing() {
        let (tx, rx) = watch::channel(false);
        let reporter = ProgressReporter::new("demo", vec![], ProgressStyle::Hidden);
        let task = tokio::spawn(reporter.run(Vec::new(), rx));
        tx.send(true).unwrap();
        assert!(task.await.unwrap().unwrap().is_empty());
    }
}
