use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

/// How startup stages are reported on stderr.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartupStyle {
    Auto,
    Plain,
    Spinner,
}

impl StartupStyle {
    /// `VISION_UI=plain|spinner`; anything else means auto.
    pub fn from_env() -> Self {
        match std::env::var("VISION_UI").as_deref() {
            Ok("plain") => StartupStyle::Plain,
            Ok("spinner") => StartupStyle::Spinner,
            _ => StartupStyle::Auto,
        }
    }
}

/// Reports the agent's startup stages: config, telemetry, cameras.
#[derive(Clone, Debug)]
pub struct StartupReport {
    spinners: bool,
}

impl StartupReport {
    pub fn new(style: StartupStyle, stderr_is_tty: bool) -> Self {
        let spinners = stderr_is_tty && style != StartupStyle::Plain;
        Self { spinners }
    }

    pub fn stage(&self, name: &str) -> Stage {
        if !self.spinners {
            eprintln!("==> {}", name);
            return Stage::new(name, None);
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg} {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(name.to_string());
        Stage::new(name, Some(spinner))
    }
}

/// A running startup stage. Dropping it without `fail` marks it done.
pub struct Stage {
    name: String,
    started: Instant,
    spinner: Option<ProgressBar>,
    failed: bool,
}

impl Stage {
    fn new(name: &str, spinner: Option<ProgressBar>) -> Self {
        Self {
            name: name.to_string(),
            started: Instant::now(),
            spinner,
            failed: false,
        }
    }

    /// Mark the stage as failed; the reason is logged separately.
    pub fn fail(mut self) {
        self.failed = true;
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        let mark = if self.failed { "✘" } else { "✔" };
        let line = format!("{} {} ({})", mark, self.name, short_duration(self.started.elapsed()));
        match &self.spinner {
            Some(spinner) if self.failed => spinner.abandon_with_message(line),
            Some(spinner) => spinner.finish_with_message(line),
            None => eprintln!("{line}"),
        }
    }
}

fn short_duration(elapsed: Duration) -> String {
    if elapsed.as_millis() >= 1000 {
        format!("{:.1}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}
