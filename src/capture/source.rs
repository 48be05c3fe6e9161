//! Event sources feeding the capture state machine.

use std::collections::VecDeque;
use std::io::{self, BufRead};

use super::CaptureEvent;
use crate::keybindings::{KeyAction, KeyBindings};
use crate::model::Point;

/// A blocking source of capture events.
pub trait EventSource {
    /// Wait for the next event. `Ok(None)` means the input has ended.
    fn next_event(&mut self) -> io::Result<Option<CaptureEvent>>;
}

/// In-memory event queue for headless runs and tests.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEvents {
    events: VecDeque<CaptureEvent>,
}

impl ScriptedEvents {
    pub fn new(events: impl IntoIterator<Item = CaptureEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }

    /// Queue another event.
    pub fn push(&mut self, event: CaptureEvent) {
        self.events.push_back(event);
    }

    /// Events not yet consumed.
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl EventSource for ScriptedEvents {
    fn next_event(&mut self) -> io::Result<Option<CaptureEvent>> {
        Ok(self.events.pop_front())
    }
}

/// Line-oriented key/click reader.
///
/// Each line is one event:
///
/// ```text
/// click 120.5 88     # vertex (the "click" word is optional)
/// 140 90
/// backspace          # any key name from the bindings
/// enter
/// ```
///
/// Blank lines and `#` comments are skipped. Unknown keys and malformed
/// clicks are logged and skipped.
pub struct KeyScript<R> {
    reader: R,
    bindings: KeyBindings,
    line_no: usize,
}

impl<R: BufRead> KeyScript<R> {
    pub fn new(reader: R, bindings: KeyBindings) -> Self {
        Self {
            reader,
            bindings,
            line_no: 0,
        }
    }

    fn parse_line(&self, line: &str) -> Option<CaptureEvent> {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            return None;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let coords = match tokens.as_slice() {
            ["click", rest @ ..] => rest,
            [x, y] if x.parse::<f64>().is_ok() && y.parse::<f64>().is_ok() => &tokens[..],
            [key] => {
                return match self.bindings.action_for_key(key) {
                    Some(action) => Some(event_for(action)),
                    None => {
                        log::warn!("line {}: unbound key '{}'", self.line_no, key);
                        None
                    }
                };
            }
            _ => {
                log::warn!("line {}: cannot parse '{}'", self.line_no, line);
                return None;
            }
        };

        match parse_point(coords) {
            Some(p) => Some(CaptureEvent::PointAdded(p)),
            None => {
                log::warn!("line {}: bad click coordinates '{}'", self.line_no, line);
                None
            }
        }
    }
}

impl<R: BufRead> EventSource for KeyScript<R> {
    fn next_event(&mut self) -> io::Result<Option<CaptureEvent>> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if self.reader.read_until(b'\n', &mut buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let Ok(line) = std::str::from_utf8(&buf) else {
                log::warn!("line {}: not valid UTF-8", self.line_no);
                continue;
            };
            if let Some(event) = self.parse_line(line) {
                return Ok(Some(event));
            }
        }
    }
}

fn event_for(action: KeyAction) -> CaptureEvent {
    match action {
        KeyAction::Finish => CaptureEvent::Finish,
        KeyAction::Undo => CaptureEvent::UndoLast,
        KeyAction::Reset => CaptureEvent::Reset,
        KeyAction::Quit => CaptureEvent::Quit,
    }
}

fn parse_point(coords: &[&str]) -> Option<Point> {
    let [x, y] = coords else {
        return None;
    };
    let x: f64 = x.parse().ok()?;
    let y: f64 = y.parse().ok()?;
    (x.is_finite() && y.is_finite()).then(|| Point::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(script: &str) -> Vec<CaptureEvent> {
        let mut source = KeyScript::new(script.as_bytes(), KeyBindings::default());
        let mut events = Vec::new();
        while let Some(e) = source.next_event().unwrap() {
            events.push(e);
        }
        events
    }

    #[test]
    fn test_key_script() {
        let script = "\
# plant 1
click 10 20
30.5 40
backspace

escape
enter   # done
Q
";
        assert_eq!(
            read_all(script),
            vec![
                CaptureEvent::PointAdded(Point::new(10.0, 20.0)),
                CaptureEvent::PointAdded(Point::new(30.5, 40.0)),
                CaptureEvent::UndoLast,
                CaptureEvent::Reset,
                CaptureEvent::Finish,
                CaptureEvent::Quit,
            ]
        );
    }

    #[test]
    fn test_bad_lines_skipped() {
        let script = "click 1\nclick a b\nspace\nclick 1 2 3\n5 nan\n7 8\n";
        assert_eq!(
            read_all(script),
            vec![CaptureEvent::PointAdded(Point::new(7.0, 8.0))]
        );
    }

    #[test]
    fn test_invalid_utf8_line_skipped() {
        let script: &[u8] = b"\xff\xfe click\n1 2\nenter\n";
        let mut source = KeyScript::new(script, KeyBindings::default());
        assert_eq!(
            source.next_event().unwrap(),
            Some(CaptureEvent::PointAdded(Point::new(1.0, 2.0)))
        );
        assert_eq!(source.next_event().unwrap(), Some(CaptureEvent::Finish));
        assert_eq!(source.next_event().unwrap(), None);
    }

    #[test]
    fn test_custom_bindings() {
        let mut bindings = KeyBindings::default();
        bindings.finish = vec!["f".into()];
        let mut source = KeyScript::new("f\nenter\n".as_bytes(), bindings);
        assert_eq!(source.next_event().unwrap(), Some(CaptureEvent::Finish));
        assert_eq!(source.next_event().unwrap(), None);
    }

    #[test]
    fn test_scripted_events() {
        let mut events = ScriptedEvents::new([CaptureEvent::Reset]);
        events.push(CaptureEvent::Quit);
        assert_eq!(events.remaining(), 2);
        assert_eq!(events.next_event().unwrap(), Some(CaptureEvent::Reset));
        assert_eq!(events.next_event().unwrap(), Some(CaptureEvent::Quit));
        assert_eq!(events.next_event().unwrap(), None);
    }
}
