//! Operator input.
//!
//! One thread owns stdin. While a run is armed, the line `stop` cancels that run
//! (once; the listener then disarms) and is swallowed. Every other line is handed
//! to whichever prompt is waiting.

use crate::cancel::CancellationFlag;
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Token that cancels a running replay.
pub const STOP_TOKEN: &str = "stop";

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// What a prompt got back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    Line(String),
    /// The cancellation flag was observed while waiting.
    Cancelled,
    /// Input is exhausted (stdin closed).
    Closed,
}

pub trait Prompt {
    /// Blocks for the next line. With `cancel`, also returns [`Input::Cancelled`] as soon as the flag is set.
    fn next_line(&mut self, cancel: Option<&CancellationFlag>) -> Input;

    /// Prints `message` (no newline) and waits for a line.
    fn ask(&mut self, message: &str) -> Input {
        print!("{}", message);
        let _ = io::stdout().flush();
        self.next_line(None)
    }
}

/// Returns true when `line` is the stop token (trimmed, case-insensitive).
pub fn is_stop_token(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(STOP_TOKEN)
}

type Armed = Arc<Mutex<Option<CancellationFlag>>>;

/// Routes a line: fires and disarms the armed flag on `stop`, otherwise returns it for forwarding.
fn route_line(armed: &Armed, line: String) -> Option<String> {
    if is_stop_token(&line) {
        let taken = armed.lock().ok().and_then(|mut a| a.take());
        if let Some(flag) = taken {
            if flag.cancel() {
                println!("Stop received. Finishing the current step, then stopping.");
            }
            return None;
        }
    }
    Some(line)
}

/// Stdin-backed prompt with the background stop listener.
pub struct Console {
    rx: Receiver<String>,
    armed: Armed,
}

impl Console {
    /// Spawns the stdin reader thread.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        let armed: Armed = Arc::new(Mutex::new(None));
        let router = armed.clone();
        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if let Some(line) = route_line(&router, line) {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            }
        });
        Console { rx, armed }
    }

    /// Lets `stop` cancel the given run.
    pub fn arm(&self, flag: CancellationFlag) {
        if let Ok(mut a) = self.armed.lock() {
            *a = Some(flag);
        }
    }

    pub fn disarm(&self) {
        if let Ok(mut a) = self.armed.lock() {
            *a = None;
        }
    }
}

impl Prompt for Console {
    fn next_line(&mut self, cancel: Option<&CancellationFlag>) -> Input {
        let Some(flag) = cancel else {
            return match self.rx.recv() {
                Ok(line) => Input::Line(line),
                Err(_) => Input::Closed,
            };
        };
        loop {
            if flag.is_cancelled() {
                return Input::Cancelled;
            }
            match self.rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => return Input::Line(line),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Input::Closed,
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use super::{Input, Prompt};
    use crate::cancel::CancellationFlag;
    use std::collections::VecDeque;

    /// Prompt fed from a fixed list of lines; `Closed` once exhausted.
    #[derive(Debug, Default)]
    pub struct ScriptedPrompt {
        lines: VecDeque<String>,
        /// Lines consumed so far.
        pub consumed: usize,
        /// Flag to fire when the line at this index is about to be read.
        cancel_at: Option<(usize, CancellationFlag)>,
    }

    impl ScriptedPrompt {
        pub fn new<I, S>(lines: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            ScriptedPrompt {
                lines: lines.into_iter().map(Into::into).collect(),
                consumed: 0,
                cancel_at: None,
            }
        }

        /// Simulates the operator typing `stop` right before line `index` would be read.
        pub fn cancel_before(mut self, index: usize, flag: CancellationFlag) -> Self {
            self.cancel_at = Some((index, flag));
            self
        }
    }

    impl Prompt for ScriptedPrompt {
        fn next_line(&mut self, cancel: Option<&CancellationFlag>) -> Input {
            if let Some((at, flag)) = &self.cancel_at {
                if *at == self.consumed {
                    flag.cancel();
                }
            }
            if cancel.map(CancellationFlag::is_cancelled).unwrap_or(false) {
                return Input::Cancelled;
            }
            match self.lines.pop_front() {
                Some(line) => {
                    self.consumed += 1;
                    Input::Line(line)
                }
                None => Input::Closed,
            }
        }

        fn ask(&mut self, _message: &str) -> Input {
            self.next_line(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::scripted::ScriptedPrompt;
    use super::*;

    #[test]
    fn test_is_stop_token() {
        assert!(is_stop_token("stop"));
        assert!(is_stop_token("  STOP \n"));
        assert!(!is_stop_token("stopp"));
        assert!(!is_stop_token("go"));
    }

    #[test]
    fn test_route_line_stop_fires_once_then_forwards() {
        let armed: Armed = Arc::new(Mutex::new(None));
        let flag = CancellationFlag::new();
        *armed.lock().unwrap() = Some(flag.clone());
        assert_eq!(route_line(&armed, "go".to_string()), Some("go".to_string()));
        assert!(!flag.is_cancelled());
        assert_eq!(route_line(&armed, "Stop".to_string()), None);
        assert!(flag.is_cancelled());
        // Disarmed: a second stop is ordinary input.
        assert_eq!(route_line(&armed, "stop".to_string()), Some("stop".to_string()));
    }

    #[test]
    fn test_route_line_unarmed_forwards_stop() {
        let armed: Armed = Arc::new(Mutex::new(None));
        assert_eq!(route_line(&armed, "stop".to_string()), Some("stop".to_string()));
    }

    #[test]
    fn test_scripted_prompt() {
        let mut p = ScriptedPrompt::new(["a", "b"]);
        assert_eq!(p.next_line(None), Input::Line("a".to_string()));
        assert_eq!(p.next_line(None), Input::Line("b".to_string()));
        assert_eq!(p.next_line(None), Input::Closed);
        assert_eq!(p.consumed, 2);
    }

    #[test]
    fn test_scripted_prompt_cancel_before() {
        let flag = CancellationFlag::new();
        let mut p = ScriptedPrompt::new(["x", "go"]).cancel_before(1, flag.clone());
        assert_eq!(p.next_line(Some(&flag)), Input::Line("x".to_string()));
        assert_eq!(p.next_line(Some(&flag)), Input::Cancelled);
        assert!(flag.is_cancelled());
    }
}
