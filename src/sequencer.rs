//! Replay loop: files in order, records in file order, one fixed keystroke sequence per entry.
//!
//! The cancellation flag is only looked at before a file, before an entry and while
//! waiting at a checkpoint. Once an entry's keystrokes start they run to completion
//! or to the first actuator error.

use crate::actuator::{Actuator, Key, Modifier};
use crate::cancel::CancellationFlag;
use crate::console::{Input, Prompt};
use crate::date::normalize_date;
use crate::discover::InputFile;
use crate::duration::{format_hours, normalize_duration, to_decimal_hours};
use crate::error::Result;
use crate::errorlog::ErrorLog;
use crate::extract::{RawActivityRecord, DEFAULT_PROJECT};
use crate::mapping::{MappingTable, ResolverState};
use log::{error, info, warn};
use std::thread;
use std::time::Duration;

/// Successful submissions between two operator confirmations.
pub const CHECKPOINT_EVERY: usize = 14;
/// Operator token that ends a checkpoint (case-insensitive).
pub const CONFIRM_TOKEN: &str = "go";
/// 8.5 hours.
pub const EXPECTED_DAILY_MINUTES: u32 = 510;

/// Tab presses after each field of the timesheet form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FocusPlan {
    pub after_dl_number: usize,
    pub after_second_field: usize,
    pub after_title: usize,
    pub after_date: usize,
    pub after_duration: usize,
}

impl Default for FocusPlan {
    fn default() -> Self {
        FocusPlan {
            after_dl_number: 5,
            after_second_field: 2,
            after_title: 2,
            after_date: 5,
            after_duration: 3,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SequencerOptions {
    pub step_delay: Duration,
    pub select_all: Modifier,
    pub focus: FocusPlan,
    pub checkpoint_every: usize,
    pub confirm_token: String,
    pub expected_minutes: u32,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        SequencerOptions {
            step_delay: Duration::from_millis(crate::config::DEFAULT_STEP_DELAY_MS),
            select_all: Modifier::platform_default(),
            focus: FocusPlan::default(),
            checkpoint_every: CHECKPOINT_EVERY,
            confirm_token: CONFIRM_TOKEN.to_string(),
            expected_minutes: EXPECTED_DAILY_MINUTES,
        }
    }
}

/// An entry ready to be keyed into the form.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedEntry {
    pub project: String,
    /// False when the billing code came from the fallback.
    pub mapped: bool,
    pub dl_number: String,
    pub second_field: String,
    pub title: String,
    /// `DD/MM/YYYY`
    pub day: String,
    pub decimal_duration: f64,
    pub rounded_minutes: u32,
}

/// Normalizes one record. Mapping is resolved before the duration is parsed, so a
/// matching record updates `state` even if its duration then turns out to be invalid.
pub fn normalize(record: &RawActivityRecord, table: &MappingTable, state: &mut ResolverState) -> Result<NormalizedEntry> {
    let day = normalize_date(&record.day);
    let project = if record.project.trim().is_empty() {
        DEFAULT_PROJECT.to_string()
    } else {
        record.project.clone()
    };
    let resolution = table.resolve(state, &project, &record.title);
    let (rounded_minutes, decimal_duration) = normalize_duration(&record.duration)?;
    Ok(NormalizedEntry {
        project,
        mapped: !resolution.is_fallback(),
        dl_number: resolution.dl_number,
        second_field: resolution.second_field,
        title: resolution.title,
        day,
        decimal_duration,
        rounded_minutes,
    })
}

/// How a file's total compares to the expected daily hours.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TotalStatus {
    Exact,
    Short { hours: u32, minutes: u32 },
    Over { hours: u32, minutes: u32 },
}

pub fn assess_total(total_minutes: u32, expected_minutes: u32) -> TotalStatus {
    use std::cmp::Ordering::*;
    match total_minutes.cmp(&expected_minutes) {
        Equal => TotalStatus::Exact,
        Less => {
            let diff = expected_minutes - total_minutes;
            TotalStatus::Short { hours: diff / 60, minutes: diff % 60 }
        }
        Greater => {
            let diff = total_minutes - expected_minutes;
            TotalStatus::Over { hours: diff / 60, minutes: diff % 60 }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FileReport {
    pub name: String,
    pub total_minutes: u32,
    pub submitted: usize,
    /// Rows rejected by the reader or records with an invalid duration.
    pub skipped: usize,
    /// Entries abandoned after an actuator error.
    pub failed: usize,
    /// Processing stopped early because of cancellation.
    pub partial: bool,
    pub status: TotalStatus,
}

impl FileReport {
    pub fn decimal_total(&self) -> f64 {
        to_decimal_hours(self.total_minutes)
    }
}

/// Formats the end-of-file line shown to the operator.
pub fn summary_line(report: &FileReport, expected_minutes: u32) -> String {
    let total = format_hours(report.decimal_total());
    let expected = format_hours(to_decimal_hours(expected_minutes));
    let head = format!("File '{}' done: total = {} hours", report.name, total);
    let body = match report.status {
        TotalStatus::Exact => format!("{} (exactly {} hours).", head, expected),
        TotalStatus::Short { hours, minutes } => format!(
            "{}. {} hours and {} minutes missing to reach {} hours.",
            head, hours, minutes, expected
        ),
        TotalStatus::Over { hours, minutes } => format!(
            "{}. {} hours and {} minutes more than {} hours recorded.",
            head, hours, minutes, expected
        ),
    };
    if report.partial {
        format!("{} (stopped early)", body)
    } else {
        body
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunReport {
    pub files: Vec<FileReport>,
    pub cancelled: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Checkpoint {
    Resumed,
    Cancelled,
}

fn pause(d: Duration) {
    if !d.is_zero() {
        thread::sleep(d);
    }
}

/// Replays entries for one run. Resolver state and the checkpoint counter live as long as the sequencer.
pub struct Sequencer<'a, A: Actuator, P: Prompt> {
    actuator: &'a mut A,
    prompt: &'a mut P,
    table: &'a MappingTable,
    sink: &'a ErrorLog,
    cancel: CancellationFlag,
    options: SequencerOptions,
    state: ResolverState,
    since_checkpoint: usize,
}

impl<'a, A: Actuator, P: Prompt> Sequencer<'a, A, P> {
    pub fn new(
        actuator: &'a mut A,
        prompt: &'a mut P,
        table: &'a MappingTable,
        sink: &'a ErrorLog,
        cancel: CancellationFlag,
        options: SequencerOptions,
    ) -> Self {
        Sequencer {
            actuator,
            prompt,
            table,
            sink,
            cancel,
            options,
            state: ResolverState::default(),
            since_checkpoint: 0,
        }
    }

    pub fn entries_since_checkpoint(&self) -> usize {
        self.since_checkpoint
    }

    /// Processes `files` in order until done or cancelled.
    pub fn run(&mut self, files: &[InputFile]) -> RunReport {
        let mut report = RunReport::default();
        for file in files {
            if self.cancel.is_cancelled() {
                println!("Stop requested; remaining files are skipped.");
                break;
            }
            println!("\n{}", "=".repeat(60));
            println!("Processing file: {}", file.name);
            println!("{}", "=".repeat(60));
            if let Some(r) = self.process_file(file) {
                println!("\n{}", "-".repeat(60));
                println!("{}", summary_line(&r, self.options.expected_minutes));
                println!("{}", "-".repeat(60));
                report.files.push(r);
            }
        }
        report.cancelled = self.cancel.is_cancelled();
        report
    }

    /// One file. `None` if the file could not be read at all (already logged).
    pub fn process_file(&mut self, file: &InputFile) -> Option<FileReport> {
        let extraction = match file.kind.reader().extract(&file.path) {
            Ok(x) => x,
            Err(e) => {
                let msg = format!("could not process {}: {}", file.name, e);
                error!("{}", msg);
                self.sink.record(&file.name, &msg);
                return None;
            }
        };
        for reject in &extraction.rejects {
            warn!("{}: {}", reject.context, reject.message);
            self.sink.record(&reject.context, &reject.message);
        }

        let mut total_minutes = 0u32;
        let mut submitted = 0;
        let mut skipped = extraction.rejects.len();
        let mut failed = 0;
        let mut partial = false;

        for (idx, record) in extraction.records.iter().enumerate() {
            if self.cancel.is_cancelled() {
                partial = true;
                break;
            }
            let entry = match normalize(record, self.table, &mut self.state) {
                Ok(e) => e,
                Err(e) => {
                    let msg = format!("{}; entry skipped", e);
                    warn!("{}", msg);
                    self.sink.record(&record.to_string(), &msg);
                    skipped += 1;
                    continue;
                }
            };
            if !entry.mapped {
                self.sink.record(
                    &record.to_string(),
                    &format!("no mapping for project '{}'; using previous values", entry.project),
                );
            }
            total_minutes += entry.rounded_minutes;
            print_entry(idx + 1, &entry);

            if let Err(e) = self.submit(&entry) {
                let msg = format!("automatic entry failed (entry {}): {}", idx + 1, e);
                error!("{}", msg);
                self.sink.record(&record.to_string(), &msg);
                failed += 1;
                continue;
            }
            println!("Entry {} submitted.", idx + 1);
            submitted += 1;
            self.since_checkpoint += 1;

            if self.since_checkpoint >= self.options.checkpoint_every
                && self.checkpoint() == Checkpoint::Cancelled
            {
                partial = true;
                break;
            }
        }

        Some(FileReport {
            name: file.name.clone(),
            total_minutes,
            submitted,
            skipped,
            failed,
            partial,
            status: assess_total(total_minutes, self.options.expected_minutes),
        })
    }

    /// Keys one entry into the form. Stops at the first failing step.
    fn submit(&mut self, entry: &NormalizedEntry) -> Result<()> {
        let d = self.options.step_delay;
        let focus = self.options.focus;
        let a = &mut *self.actuator;

        a.send_text(&entry.dl_number)?;
        pause(d);
        a.press_key_n_times(Key::Tab, focus.after_dl_number, d)?;
        a.send_text(&entry.second_field)?;
        pause(d);
        a.press_key_n_times(Key::Tab, focus.after_second_field, d)?;
        a.chord(self.options.select_all, 'a')?;
        a.press_key(Key::Backspace)?;
        a.send_text(&entry.title)?;
        pause(d);
        a.press_key_n_times(Key::Tab, focus.after_title, d)?;
        a.send_text(&entry.day)?;
        pause(d);
        a.press_key_n_times(Key::Tab, focus.after_date, d)?;
        a.send_text(&format_hours(entry.decimal_duration))?;
        pause(d);
        a.press_key_n_times(Key::Tab, focus.after_duration, d)?;
        pause(d * 2);
        Ok(())
    }

    /// Blocks until the operator types the confirmation token or the run is cancelled.
    fn checkpoint(&mut self) -> Checkpoint {
        println!("\n[IMPORTANT] {} entries have been made.", self.since_checkpoint);
        println!("Please confirm the entries so far in the timesheet ('release and transfer all').");
        println!("Type '{}' once that is done.", self.options.confirm_token.to_uppercase());
        loop {
            match self.prompt.next_line(Some(&self.cancel)) {
                Input::Line(line) if line.trim().eq_ignore_ascii_case(&self.options.confirm_token) => {
                    self.since_checkpoint = 0;
                    info!("checkpoint confirmed, resuming");
                    println!("Confirmation received. Continuing...");
                    return Checkpoint::Resumed;
                }
                Input::Line(_) => println!(
                    "Invalid input. Type '{}' once you have confirmed the entries.",
                    self.options.confirm_token.to_uppercase()
                ),
                Input::Cancelled => return Checkpoint::Cancelled,
                Input::Closed => {
                    warn!("input closed while waiting for checkpoint confirmation; stopping");
                    self.cancel.cancel();
                    return Checkpoint::Cancelled;
                }
            }
        }
    }
}

fn print_entry(n: usize, e: &NormalizedEntry) {
    println!("\nEntry {}:", n);
    println!("  Project: {}", e.project);
    println!("  DL: {}", e.dl_number);
    println!("  Second field: {}", e.second_field);
    println!("  Title: {}", e.title);
    println!("  Duration (decimal): {} hours", format_hours(e.decimal_duration));
    println!("  Date: {}", e.day);
}
