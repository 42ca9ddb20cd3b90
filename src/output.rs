// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::plan::{ExecutionRecord, PlanReport, StackReport};
use crate::provider::ResponsePayload;
use crate::types::StackName;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    #[default]
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                println!("{message}");
            }
            OutputMode::Json => self.event("success", message),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(&self.json_event("error", message)) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print one line per stack, then a summary.
    pub fn report(&self, report: &PlanReport) {
        for stack in report.stacks() {
            self.stack(stack);
        }

        for warning in report.diagnostics().warnings() {
            if self.mode == OutputMode::Normal {
                eprintln!("Warning: {}", warning.message);
            }
        }

        let failures = report.failure_count();
        let summary = format!(
            "{}: {} stack(s), {} failed",
            report.action(),
            report.stacks().len(),
            failures
        );
        if failures == 0 {
            self.success(&summary);
        } else {
            self.error(&summary);
        }
    }

    fn stack(&self, stack: &StackReport) {
        let record = &stack.record;
        match self.mode {
            OutputMode::Normal => println!("{}", describe(stack)),
            OutputMode::Quiet => {
                if !record.is_clean() {
                    println!("{}", describe(stack));
                }
            }
            OutputMode::Json => {
                let line = StackLine::new(&stack.stack, record);
                if let Ok(json) = serde_json::to_string(&line) {
                    println!("{json}");
                }
            }
        }
    }

    /// Print execution generations, one per line.
    pub fn generations(&self, generations: &[Vec<StackName>]) {
        for (index, generation) in generations.iter().enumerate() {
            let names: Vec<&str> = generation.iter().map(StackName::as_str).collect();
            match self.mode {
                OutputMode::Json => {
                    let line = GenerationLine {
                        generation: index,
                        stacks: names,
                    };
                    if let Ok(json) = serde_json::to_string(&line) {
                        println!("{json}");
                    }
                }
                OutputMode::Normal | OutputMode::Quiet => {
                    println!("{index}: {}", names.join(" "));
                }
            }
        }
    }

    fn event(&self, event: &str, message: &str) {
        if let Ok(json) = serde_json::to_string(&self.json_event(event, message)) {
            println!("{json}");
        }
    }

    fn json_event<'a>(&self, event: &'a str, message: &'a str) -> JsonEvent<'a> {
        JsonEvent {
            event,
            message,
            duration_secs: self.start_time.map(|_| self.elapsed_secs()),
        }
    }
}

fn describe(stack: &StackReport) -> String {
    let record = &stack.record;
    let mut line = format!("{} {}", stack.path, record.status);
    if let Some(drift) = record.drift {
        line.push_str(&format!(" ({drift})"));
    }
    if let Some(error) = &record.error {
        line.push_str(&format!(": {error}"));
    }
    line
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct StackLine<'a> {
    stack: &'a StackName,
    status: &'static str,
    drift: Option<&'static str>,
    response: Option<&'a ResponsePayload>,
    error: Option<String>,
}

impl<'a> StackLine<'a> {
    fn new(stack: &'a StackName, record: &'a ExecutionRecord) -> Self {
        Self {
            stack,
            status: record.status.as_str(),
            drift: record.drift.map(|d| d.as_str()),
            response: record.response.as_ref(),
            error: record.error.as_ref().map(|e| e.to_string()),
        }
    }
}

#[derive(Serialize)]
struct GenerationLine<'a> {
    generation: usize,
    stacks: Vec<&'a str>,
}
