// Copyright (c) 2025 Robert August Vincent II <pillarsdotnet@gmail.com>
// Co-author: Cursor-AI.

//! # tsfill — Timesheet replay CLI
//!
//! Reads the time tracker's daily exports (`All Activities YYYY-MM-DD.csv` / `.xlsx`)
//! from the working directory, turns every activity into a timesheet entry
//! (billing code, secondary field, title, `DD/MM/YYYY` date, quarter-hour duration)
//! and types the entries into the web timesheet form, oldest file first.
//!
//! ## Entry pipeline
//!
//! 1. Duration `H:MM:SS` → whole minutes → rounded **up** to 15 → decimal hours.
//! 2. Day → `DD/MM/YYYY`, or `01/01/2025` when unparsable.
//! 3. Project → first `mappings.json` label contained in it (case-insensitive, file order).
//!    No match reuses the last matched values of this run, with a placeholder title.
//! 4. Keystrokes: DL, 5×Tab, second field, 2×Tab, select-all + Backspace, title,
//!    2×Tab, date, 5×Tab, hours, 3×Tab.
//!
//! Every 14 submitted entries the run pauses until the operator types `GO`.
//! Typing `stop` ends the run after the current step.
//!
//! ## Subcommands
//!
//! | Command   | Description |
//! |-----------|-------------|
//! | `run`     | Default. Replay all exports, then offer `restart` / `end`. |
//! | `files`   | List the exports in processing order. |
//! | `preview` | Show normalized entries and daily totals without typing anything; optional file name. |
//! | `help`    | Show usage. |

mod actuator;
mod cancel;
mod config;
mod console;
mod date;
mod discover;
mod duration;
mod error;
mod errorlog;
mod extract;
mod mapping;
mod sequencer;

use actuator::{Actuator, ActuatorSession, DryRunActuator, XdotoolActuator};
use cancel::CancellationFlag;
use config::{Backend, Settings};
use console::{Console, Input, Prompt};
use discover::{discover, discover_required, undated, InputFile, FILE_PREFIX};
use error::{Error, Result};
use errorlog::ErrorLog;
use log::{error, warn};
use mapping::{MappingTable, ResolverState};
use sequencer::{assess_total, normalize, summary_line, FileReport, RunReport, Sequencer, SequencerOptions};
use std::any::Any;
use std::env;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::process;
#[cfg(unix)]
use libc::{signal, SIG_IGN};

fn usage() -> &'static str {
    r#"Usage: tsfill [command] [options]

Commands:
  run              Replay all exports into the timesheet form (default)
  files            List the exports in processing order
  preview [file]   Show normalized entries and totals without typing anything
  help             Show this text

Options:
  --dir <path>       Directory holding the exports (TSFILL_DIR; default: current directory)
  --mappings <path>  Mapping document (TSFILL_MAPPINGS; default: <dir>/mappings.json)
  --url <url>        Timesheet page to open (TSFILL_URL)
  --dry-run          Log keystrokes instead of sending them (TSFILL_BACKEND=dry-run)

Environment:
  TSFILL_ERROR_LOG       Error log path (default: <dir>/errorlog.csv)
  TSFILL_STEP_DELAY_MS   Pause between form steps (default: 1000)
  RUST_LOG               Log filter (default: info)

While running, type 'stop' to stop after the current step.
"#
}

fn make_actuator(backend: Backend) -> Box<dyn Actuator> {
    match backend {
        Backend::Xdotool => Box::new(XdotoolActuator::default()),
        Backend::DryRun => Box::new(DryRunActuator),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// One processing run. The actuator session is closed on every path out of here.
fn run_once<P: Prompt>(
    settings: &Settings,
    actuator: Box<dyn Actuator>,
    prompt: &mut P,
    cancel: CancellationFlag,
) -> Result<RunReport> {
    println!("\nStarting actuator session...");
    let mut session = ActuatorSession::open(actuator)?;
    let outcome = replay(settings, &mut session, prompt, cancel.clone());
    prompt.ask("Press Enter to close the session...");
    if let Err(e) = session.close() {
        error!("closing actuator session failed: {}", e);
    }
    // `stop` may also arrive at the close prompt
    outcome.map(|mut report| {
        report.cancelled |= cancel.is_cancelled();
        report
    })
}

fn replay<P: Prompt>(
    settings: &Settings,
    actuator: &mut Box<dyn Actuator>,
    prompt: &mut P,
    cancel: CancellationFlag,
) -> Result<RunReport> {
    println!("Opening the timesheet page...");
    actuator.navigate(&settings.target_url)?;
    println!("Please log in in the browser window and open the entry page.");
    prompt.ask("Press Enter once you are logged in...");

    println!("Loading mappings from {}...", settings.mappings_path.display());
    let table = MappingTable::load(&settings.mappings_path)?;
    if table.is_empty() {
        warn!("mapping document has no labels; every entry gets the fallback values");
    } else {
        println!("Loaded {} mappings.", table.len());
    }
    println!("Looking for exports in {}...", settings.work_dir.display());
    let files = discover_required(&settings.work_dir)?;
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    println!("Found files: {:?}", names);

    let sink = ErrorLog::new(&settings.error_log_path);
    println!("Problems are logged to {}.", sink.path().display());
    let options = SequencerOptions {
        step_delay: settings.step_delay,
        select_all: settings.select_all_modifier,
        ..Default::default()
    };
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        Sequencer::new(actuator, prompt, &table, &sink, cancel.clone(), options).run(&files)
    }));
    match result {
        Ok(report) => Ok(report),
        Err(payload) => {
            eprintln!("An unexpected error occurred: {}", panic_message(payload.as_ref()));
            Ok(RunReport {
                files: Vec::new(),
                cancelled: cancel.is_cancelled(),
            })
        }
    }
}

/// Runs until the operator stops, ends, or input closes.
fn cmd_run(settings: &Settings) -> Result<()> {
    let mut console = Console::spawn();
    loop {
        let cancel = CancellationFlag::new();
        console.arm(cancel.clone());
        println!("Type 'stop' at any time to stop after the current step.");
        let result = run_once(settings, make_actuator(settings.backend), &mut console, cancel);
        console.disarm();
        let report = result?;
        if report.cancelled {
            println!("Stopped.");
            return Ok(());
        }
        match console.ask("Process finished. Type 'end' to quit or 'restart' to start over: ") {
            Input::Line(l) if l.trim().eq_ignore_ascii_case("restart") => {
                println!("Restarting...");
            }
            Input::Line(l) if l.trim().eq_ignore_ascii_case("end") => {
                println!("Exiting.");
                return Ok(());
            }
            _ => {
                println!("Unknown command. Exiting.");
                return Ok(());
            }
        }
    }
}

/// Lists exports in the order `run` would process them.
fn cmd_files(settings: &Settings) -> Result<()> {
    let files = discover(&settings.work_dir)?;
    if files.is_empty() {
        println!("No '{} YYYY-MM-DD' exports found in {}.", FILE_PREFIX, settings.work_dir.display());
        return Ok(());
    }
    for f in &files {
        let date = if f.date == undated() {
            "(no date)".to_string()
        } else {
            f.date.format("%Y-%m-%d").to_string()
        };
        println!("{:<10}  {}", date, f.name);
    }
    Ok(())
}

fn select_files(files: Vec<InputFile>, dir: &Path, name: Option<&str>) -> Result<Vec<InputFile>> {
    let Some(name) = name else {
        return Ok(files);
    };
    let selected: Vec<InputFile> = files
        .into_iter()
        .filter(|f| f.name.contains(name))
        .collect();
    if selected.is_empty() {
        return Err(Error::NoInputFiles(format!("{} named like {:?}", dir.display(), name)));
    }
    Ok(selected)
}

/// Prints what `run` would type, file by file. Nothing is typed and nothing is logged to the error log.
fn cmd_preview(settings: &Settings, name: Option<&str>) -> Result<()> {
    let table = MappingTable::load(&settings.mappings_path)?;
    let labels: Vec<&str> = table.rules().iter().map(|r| r.label.as_str()).collect();
    println!("Mapping labels (in match order): {:?}", labels);
    let files = select_files(discover_required(&settings.work_dir)?, &settings.work_dir, name)?;
    let mut state = ResolverState::default();
    let expected = SequencerOptions::default().expected_minutes;
    for file in &files {
        println!("\n{}", file.name);
        let extraction = match file.kind.reader().extract(&file.path) {
            Ok(x) => x,
            Err(e) => {
                println!("  unreadable: {}", e);
                continue;
            }
        };
        for reject in &extraction.rejects {
            println!("  skipped: {} ({})", reject.context, reject.message);
        }
        let mut total = 0;
        let mut count = 0;
        for record in &extraction.records {
            match normalize(record, &table, &mut state) {
                Ok(e) => {
                    total += e.rounded_minutes;
                    count += 1;
                    // '*' marks entries that took the previous mapping
                    let marker = if e.mapped { ' ' } else { '*' };
                    println!(
                        " {}{}  {:<10} {:<24} {:>5}  {}",
                        marker,
                        e.day,
                        e.dl_number,
                        e.second_field,
                        duration::format_hours(e.decimal_duration),
                        e.title
                    );
                }
                Err(e) => println!("  skipped: {} ({})", record, e),
            }
        }
        let report = FileReport {
            name: file.name.clone(),
            total_minutes: total,
            submitted: count,
            skipped: extraction.rejects.len() + extraction.records.len() - count,
            failed: 0,
            partial: false,
            status: assess_total(total, expected),
        };
        println!("  {}", summary_line(&report, expected));
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();
    #[cfg(unix)]
    unsafe {
        signal(libc::SIGPIPE, SIG_IGN);
    }
    let mut args: Vec<String> = env::args().skip(1).collect();
    let cmd = match args.first() {
        Some(a) if !a.starts_with('-') => Some(args.remove(0)),
        _ => None,
    };
    if matches!(cmd.as_deref(), Some("help")) || args.iter().any(|a| a == "--help" || a == "-h") {
        print!("{}", usage());
        return;
    }

    let result = Settings::from_env_and_args(&args).and_then(|(settings, rest)| match cmd.as_deref() {
        None | Some("run") => cmd_run(&settings),
        Some("files") => cmd_files(&settings),
        Some("preview") => cmd_preview(&settings, rest.first().map(String::as_str)),
        Some(other) => Err(Error::Config(format!("unknown command '{}'\n\n{}", other, usage()))),
    });
    if let Err(e) = result {
        eprintln!("tsfill: {}", e);
        process::exit(1);
    }
}
