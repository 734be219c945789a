use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

const SPINNER_TICK_MS: u64 = 80;

/// A stderr spinner shown while a pipeline step runs.
pub struct StepSpinner {
    pb: ProgressBar,
}

impl StepSpinner {
    pub fn new(hidden: bool) -> Self {
        let pb = ProgressBar::new_spinner().with_style(Self::spinner_style());
        pb.set_draw_target(if hidden {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stderr()
        });
        Self { pb }
    }

    pub fn start(&self, message: &str) {
        self.pb.reset();
        self.pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
        self.pb.set_message(message.to_string());
    }

    pub fn finish(&self, message: &str) {
        self.pb.disable_steady_tick();
        self.pb.finish_with_message(format!("✓ {}", message));
    }

    pub fn abandon(&self) {
        self.pb.disable_steady_tick();
        self.pb.finish_and_clear();
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_reports_finished_message() {
        let spinner = StepSpinner::new(true);
        spinner.start("Parsing");
        assert!(!spinner.pb.is_finished());
        assert_eq!(spinner.pb.message(), "Parsing");
        spinner.finish("Parsed");
        assert!(spinner.pb.is_finished());
        assert_eq!(spinner.pb.message(), "✓ Parsed");
    }

    #[test]
    fn abandon_clears_the_spinner() {
        let spinner = StepSpinner::new(true);
        spinner.start("Mapping");
        spinner.abandon();
        assert!(spinner.pb.is_finished());
    }
}
