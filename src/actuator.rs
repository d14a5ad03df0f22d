//! UI-driving backends.
//!
//! An [`Actuator`] types into whatever widget has focus. The sequencer only cares
//! whether each call succeeded.

use crate::error::{Error, Result};
use log::{debug, info};
use std::ops::{Deref, DerefMut};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Tab,
    Backspace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Modifier {
    Control,
    Command,
}

impl Modifier {
    /// Select-all modifier for this platform.
    pub fn platform_default() -> Modifier {
        if cfg!(target_os = "macos") {
            Modifier::Command
        } else {
            Modifier::Control
        }
    }
}

pub trait Actuator {
    fn open_session(&mut self) -> Result<()>;
    fn close_session(&mut self) -> Result<()>;
    fn navigate(&mut self, url: &str) -> Result<()>;
    fn send_text(&mut self, text: &str) -> Result<()>;
    fn press_key(&mut self, key: Key) -> Result<()>;
    fn chord(&mut self, modifier: Modifier, key: char) -> Result<()>;

    /// Presses `key` `n` times, pausing `delay` after each press.
    fn press_key_n_times(&mut self, key: Key, n: usize, delay: Duration) -> Result<()> {
        for _ in 0..n {
            self.press_key(key)?;
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
        Ok(())
    }
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn open_session(&mut self) -> Result<()> {
        (**self).open_session()
    }
    fn close_session(&mut self) -> Result<()> {
        (**self).close_session()
    }
    fn navigate(&mut self, url: &str) -> Result<()> {
        (**self).navigate(url)
    }
    fn send_text(&mut self, text: &str) -> Result<()> {
        (**self).send_text(text)
    }
    fn press_key(&mut self, key: Key) -> Result<()> {
        (**self).press_key(key)
    }
    fn chord(&mut self, modifier: Modifier, key: char) -> Result<()> {
        (**self).chord(modifier, key)
    }
    fn press_key_n_times(&mut self, key: Key, n: usize, delay: Duration) -> Result<()> {
        (**self).press_key_n_times(key, n, delay)
    }
}

/// Open session that is closed exactly once: by [`close`](Self::close), or on drop (including unwinding).
pub struct ActuatorSession<A: Actuator> {
    inner: A,
    open: bool,
}

impl<A: Actuator> ActuatorSession<A> {
    pub fn open(mut inner: A) -> Result<Self> {
        inner.open_session()?;
        Ok(ActuatorSession { inner, open: true })
    }

    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        info!("closing actuator session");
        self.inner.close_session()
    }
}

impl<A: Actuator> Deref for ActuatorSession<A> {
    type Target = A;
    fn deref(&self) -> &A {
        &self.inner
    }
}

impl<A: Actuator> DerefMut for ActuatorSession<A> {
    fn deref_mut(&mut self) -> &mut A {
        &mut self.inner
    }
}

impl<A: Actuator> Drop for ActuatorSession<A> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::error!("closing actuator session failed: {}", e);
        }
    }
}

/// Drives the focused X11 window through the `xdotool` binary.
pub struct XdotoolActuator {
    /// Per-character typing delay passed to `xdotool type`.
    pub type_delay_ms: u32,
}

impl Default for XdotoolActuator {
    fn default() -> Self {
        XdotoolActuator { type_delay_ms: 12 }
    }
}

fn key_name(key: Key) -> &'static str {
    match key {
        Key::Tab => "Tab",
        Key::Backspace => "BackSpace",
    }
}

fn modifier_name(m: Modifier) -> &'static str {
    match m {
        Modifier::Control => "ctrl",
        Modifier::Command => "super",
    }
}

fn run_tool(program: &str, args: &[&str]) -> Result<()> {
    debug!("{} {:?}", program, args);
    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .status()
        .map_err(|e| Error::Actuator(format!("{}: {}", program, e)))?;
    if !status.success() {
        return Err(Error::Actuator(format!("{} {:?} exited with {}", program, args, status)));
    }
    Ok(())
}

impl Actuator for XdotoolActuator {
    fn open_session(&mut self) -> Result<()> {
        run_tool("xdotool", &["version"])
            .map_err(|e| Error::Actuator(format!("xdotool is not usable ({}); install it or use --dry-run", e)))
    }

    fn close_session(&mut self) -> Result<()> {
        Ok(())
    }

    fn navigate(&mut self, url: &str) -> Result<()> {
        let opener = if cfg!(target_os = "macos") { "open" } else { "xdg-open" };
        run_tool(opener, &[url])
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        let delay = self.type_delay_ms.to_string();
        run_tool("xdotool", &["type", "--delay", &delay, "--", text])
    }

    fn press_key(&mut self, key: Key) -> Result<()> {
        run_tool("xdotool", &["key", key_name(key)])
    }

    fn chord(&mut self, modifier: Modifier, key: char) -> Result<()> {
        let combo = format!("{}+{}", modifier_name(modifier), key);
        run_tool("xdotool", &["key", &combo])
    }
}

/// Logs every operation instead of performing it.
#[derive(Debug, Default)]
pub struct DryRunActuator;

impl Actuator for DryRunActuator {
    fn open_session(&mut self) -> Result<()> {
        info!("[dry-run] open session");
        Ok(())
    }

    fn close_session(&mut self) -> Result<()> {
        info!("[dry-run] close session");
        Ok(())
    }

    fn navigate(&mut self, url: &str) -> Result<()> {
        info!("[dry-run] navigate {}", url);
        Ok(())
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        info!("[dry-run] type {:?}", text);
        Ok(())
    }

    fn press_key(&mut self, key: Key) -> Result<()> {
        info!("[dry-run] key {}", key_name(key));
        Ok(())
    }

    fn chord(&mut self, modifier: Modifier, key: char) -> Result<()> {
        info!("[dry-run] key {}+{}", modifier_name(modifier), key);
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::recording::{Op, RecordingActuator};
    use super::*;

    #[test]
    fn test_press_key_n_times() {
        let mut a = RecordingActuator::default();
        a.press_key_n_times(Key::Tab, 3, Duration::ZERO).unwrap();
        assert_eq!(a.ops.borrow().len(), 3);
        assert!(a.ops.borrow().iter().all(|op| *op == Op::Key(Key::Tab)));
    }

    #[test]
    fn test_press_key_n_times_stops_at_failure() {
        let mut a = RecordingActuator::failing_at(1);
        assert!(a.press_key_n_times(Key::Tab, 5, Duration::ZERO).is_err());
        assert_eq!(a.ops.borrow().len(), 1);
    }

    #[test]
    fn test_session_closes_once_on_explicit_close() {
        let a = RecordingActuator::default();
        let ops = a.ops.clone();
        let session = ActuatorSession::open(a).unwrap();
        session.close().unwrap();
        assert_eq!(*ops.borrow(), vec![Op::Open, Op::Close]);
    }

    #[test]
    fn test_session_closes_on_drop() {
        let a = RecordingActuator::default();
        let ops = a.ops.clone();
        {
            let mut session = ActuatorSession::open(a).unwrap();
            session.send_text("x").unwrap();
        }
        assert_eq!(*ops.borrow(), vec![Op::Open, Op::Text("x".into()), Op::Close]);
    }

    #[test]
    fn test_session_closes_during_unwind() {
        let a = RecordingActuator::default();
        let ops = a.ops.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _session = ActuatorSession::open(a).unwrap();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(*ops.borrow(), vec![Op::Open, Op::Close]);
    }

    #[test]
    fn test_boxed_actuator_delegates() {
        let a = RecordingActuator::default();
        let ops = a.ops.clone();
        let mut boxed: Box<dyn Actuator> = Box::new(a);
        boxed.chord(Modifier::Control, 'a').unwrap();
        assert_eq!(*ops.borrow(), vec![Op::Chord(Modifier::Control, 'a')]);
    }

    #[test]
    fn test_dry_run_always_succeeds() {
        let mut a = DryRunActuator;
        assert!(a.open_session().is_ok());
        assert!(a.send_text("DL1").is_ok());
        assert!(a.press_key_n_times(Key::Tab, 2, Duration::ZERO).is_ok());
        assert!(a.close_session().is_ok());
    }
}
