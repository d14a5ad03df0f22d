//! Run settings: built-in defaults, then `TSFILL_*` environment variables, then flags.

use crate::actuator::Modifier;
use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Timesheet web client opened before replaying entries.
pub const DEFAULT_TARGET_URL: &str = "https://zeiterfassung-bag.msappproxy.net/bag_nav_ch_prod/WebClient/tablet.aspx?profile=SITETNTTABLET&company=A.%20Baggenstos%20%26%20Co.%20AG";
pub const DEFAULT_MAPPINGS_FILE: &str = "mappings.json";
pub const DEFAULT_ERROR_LOG_FILE: &str = "errorlog.csv";
pub const DEFAULT_STEP_DELAY_MS: u64 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Xdotool,
    DryRun,
}

impl Backend {
    fn parse(s: &str) -> Result<Backend> {
        match s.trim().to_lowercase().as_str() {
            "xdotool" => Ok(Backend::Xdotool),
            "dry-run" | "dryrun" => Ok(Backend::DryRun),
            other => Err(Error::Config(format!("unknown backend {:?} (expected xdotool or dry-run)", other))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub work_dir: PathBuf,
    pub mappings_path: PathBuf,
    pub error_log_path: PathBuf,
    pub target_url: String,
    pub backend: Backend,
    pub step_delay: Duration,
    pub select_all_modifier: Modifier,
}

impl Settings {
    /// Defaults rooted at `work_dir`.
    pub fn with_work_dir(work_dir: PathBuf) -> Settings {
        Settings {
            mappings_path: work_dir.join(DEFAULT_MAPPINGS_FILE),
            error_log_path: work_dir.join(DEFAULT_ERROR_LOG_FILE),
            work_dir,
            target_url: DEFAULT_TARGET_URL.to_string(),
            backend: Backend::Xdotool,
            step_delay: Duration::from_millis(DEFAULT_STEP_DELAY_MS),
            select_all_modifier: Modifier::platform_default(),
        }
    }

    /// Resolves settings from the process environment and `args` (flags after the command).
    /// Returns the settings and any positional arguments.
    pub fn from_env_and_args(args: &[String]) -> Result<(Settings, Vec<String>)> {
        let cwd = env::current_dir()?;
        Self::resolve(args, |k| env::var(k).ok(), cwd)
    }

    pub fn resolve<F>(args: &[String], var: F, cwd: PathBuf) -> Result<(Settings, Vec<String>)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut dir = var("TSFILL_DIR").map(PathBuf::from);
        let mut mappings = var("TSFILL_MAPPINGS").map(PathBuf::from);
        let mut url = var("TSFILL_URL");
        let mut backend = var("TSFILL_BACKEND").map(|b| Backend::parse(&b)).transpose()?;
        let error_log = var("TSFILL_ERROR_LOG").map(PathBuf::from);
        let step_delay = match var("TSFILL_STEP_DELAY_MS") {
            Some(ms) => Some(ms.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!("TSFILL_STEP_DELAY_MS must be a number of milliseconds, got {:?}", ms))
            })?),
            None => None,
        };

        let mut positional = Vec::new();
        let mut it = args.iter();
        while let Some(arg) = it.next() {
            let mut value = |flag: &str| {
                it.next()
                    .cloned()
                    .ok_or_else(|| Error::Config(format!("{} needs a value", flag)))
            };
            match arg.as_str() {
                "--dir" => dir = Some(PathBuf::from(value("--dir")?)),
                "--mappings" => mappings = Some(PathBuf::from(value("--mappings")?)),
                "--url" => url = Some(value("--url")?),
                "--dry-run" => backend = Some(Backend::DryRun),
                s if s.starts_with("--") => return Err(Error::Config(format!("unknown option {}", s))),
                _ => positional.push(arg.clone()),
            }
        }

        let work_dir = match dir {
            Some(d) if d.is_relative() => cwd.join(d),
            Some(d) => d,
            None => cwd,
        };
        let mut s = Settings::with_work_dir(work_dir);
        if let Some(m) = mappings {
            s.mappings_path = m;
        }
        if let Some(e) = error_log {
            s.error_log_path = e;
        }
        if let Some(u) = url {
            s.target_url = u;
        }
        if let Some(b) = backend {
            s.backend = b;
        }
        if let Some(ms) = step_delay {
            s.step_delay = Duration::from_millis(ms);
        }
        Ok((s, positional))
    }
}
