use std::collections::VecDeque;
use std::fmt;
use std::io::{BufRead, Write};

use tracing::debug;

use crate::error::{CalibrationError, Result};
use crate::keying::{clamp_channel, ColorBound};

/// One of the six adjustable channel controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    UpperR,
    UpperG,
    UpperB,
    LowerR,
    LowerG,
    LowerB,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::UpperR,
        Channel::UpperG,
        Channel::UpperB,
        Channel::LowerR,
        Channel::LowerG,
        Channel::LowerB,
    ];

    /// Short command name, e.g. `ug` for Upper G
    pub fn short_name(&self) -> &'static str {
        match self {
            Channel::UpperR => "ur",
            Channel::UpperG => "ug",
            Channel::UpperB => "ub",
            Channel::LowerR => "lr",
            Channel::LowerG => "lg",
            Channel::LowerB => "lb",
        }
    }

    pub fn from_short_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.short_name().eq_ignore_ascii_case(name))
    }

    fn is_upper(&self) -> bool {
        matches!(self, Channel::UpperR | Channel::UpperG | Channel::UpperB)
    }

    fn index(&self) -> usize {
        match self {
            Channel::UpperR | Channel::LowerR => 0,
            Channel::UpperG | Channel::LowerG => 1,
            Channel::UpperB | Channel::LowerB => 2,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = if self.is_upper() { "Upper" } else { "Lower" };
        let color = ["R", "G", "B"][self.index()];
        write!(f, "{} {}", side, color)
    }
}

/// Current position of all six controls, each held in 0..=255
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelSettings {
    upper: [u8; 3],
    lower: [u8; 3],
}

impl ChannelSettings {
    pub fn new(lower: [i32; 3], upper: [i32; 3]) -> Self {
        Self {
            lower: lower.map(clamp_channel),
            upper: upper.map(clamp_channel),
        }
    }

    /// Move one control, clamping the value into range
    pub fn set(&mut self, channel: Channel, value: i32) {
        let slot = if channel.is_upper() {
            &mut self.upper
        } else {
            &mut self.lower
        };
        slot[channel.index()] = clamp_channel(value);
    }

    pub fn get(&self, channel: Channel) -> u8 {
        if channel.is_upper() {
            self.upper[channel.index()]
        } else {
            self.lower[channel.index()]
        }
    }

    pub fn bound(&self) -> ColorBound {
        ColorBound::new(self.lower, self.upper)
    }
}

/// What the operator did while the loop was waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Controls may have moved; render again
    Adjusted,
    /// Accept the current range
    Confirm,
}

/// The operator-facing input side of calibration: six bounded channel
/// controls plus a confirm signal.
pub trait ControlSurface {
    fn settings(&self) -> ChannelSettings;

    /// Block until the operator does something
    fn wait_event(&mut self) -> Result<ControlEvent>;
}

/// Line-oriented controls for a terminal.
///
/// ```text
/// upper 90 255 90     set all three upper channels
/// lower 0 180 0       set all three lower channels
/// ug 240              set a single channel (ur ug ub lr lg lb)
/// show                print the current values
/// <empty line>        confirm
/// ```
pub struct TerminalControls<R, W> {
    input: R,
    feedback: W,
    settings: ChannelSettings,
    help_shown: bool,
}

const TERMINAL_HELP: &str = "\
  upper R G B     set the upper bound      e.g. upper 90 255 90
  lower R G B     set the lower bound      e.g. lower 0 180 0
  ur|ug|ub|lr|lg|lb N                      set a single channel
  show            print the current values
  <empty line>    confirm";

impl<R: BufRead, W: Write> TerminalControls<R, W> {
    pub fn new(input: R, feedback: W) -> Self {
        Self {
            input,
            feedback,
            settings: ChannelSettings::default(),
            help_shown: false,
        }
    }

    /// Apply one command line to the settings
    fn apply(&mut self, line: &str) -> std::result::Result<(), CalibrationError> {
        let invalid = || CalibrationError::InvalidCommand {
            command: line.to_string(),
        };
        let mut words = line.split_whitespace();
        let head = words.next().ok_or_else(invalid)?.to_ascii_lowercase();
        let values = words
            .map(|w| w.parse::<i32>().map_err(|_| invalid()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        match (head.as_str(), values.as_slice()) {
            ("show" | "?", []) => {}
            ("upper", [r, g, b]) => {
                self.settings.set(Channel::UpperR, *r);
                self.settings.set(Channel::UpperG, *g);
                self.settings.set(Channel::UpperB, *b);
            }
            ("lower", [r, g, b]) => {
                self.settings.set(Channel::LowerR, *r);
                self.settings.set(Channel::LowerG, *g);
                self.settings.set(Channel::LowerB, *b);
            }
            (name, [value]) => {
                let channel = Channel::from_short_name(name).ok_or_else(invalid)?;
                self.settings.set(channel, *value);
            }
            _ => return Err(invalid()),
        }
        Ok(())
    }

    fn print_settings(&mut self) -> Result<()> {
        let line = Channel::ALL
            .iter()
            .map(|c| format!("{}={}", c.short_name(), self.settings.get(*c)))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(self.feedback, "  {}", line)?;
        self.feedback.flush()?;
        Ok(())
    }
}

impl<R: BufRead, W: Write> ControlSurface for TerminalControls<R, W> {
    fn settings(&self) -> ChannelSettings {
        self.settings
    }

    fn wait_event(&mut self) -> Result<ControlEvent> {
        if !self.help_shown {
            writeln!(self.feedback, "{}", TERMINAL_HELP)?;
            self.help_shown = true;
        }
        write!(self.feedback, "> ")?;
        self.feedback.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(CalibrationError::ControlsClosed.into());
        }

        let line = line.trim();
        if line.is_empty() {
            return Ok(ControlEvent::Confirm);
        }

        match self.apply(line) {
            Ok(()) => {
                debug!("Calibration controls now {:?}", self.settings);
                self.print_settings()?;
            }
            Err(e) => {
                // A typo must not end the session
                writeln!(self.feedback, "  {} (try `upper R G B`, `lower R G B` or `ug 200`)", e)?;
            }
        }
        Ok(ControlEvent::Adjusted)
    }
}

/// Replays a fixed sequence of control changes.
///
/// Used to drive calibration without an operator, e.g. in tests.
#[derive(Debug, Clone, Default)]
pub struct ScriptedControls {
    settings: ChannelSettings,
    script: VecDeque<(Option<ChannelSettings>, ControlEvent)>,
}

impl ScriptedControls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a move of the controls to `settings`
    pub fn adjust(mut self, settings: ChannelSettings) -> Self {
        self.script.push_back((Some(settings), ControlEvent::Adjusted));
        self
    }

    /// Queue a confirm of whatever the controls show at that point
    pub fn confirm(mut self) -> Self {
        self.script.push_back((None, ControlEvent::Confirm));
        self
    }

    /// Set the controls and confirm straight away
    pub fn accepting(bound: ColorBound) -> Self {
        let settings = ChannelSettings::new(
            bound.lower.map(i32::from),
            bound.upper.map(i32::from),
        );
        Self::new().adjust(settings).confirm()
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl ControlSurface for ScriptedControls {
    fn settings(&self) -> ChannelSettings {
        self.settings
    }

    fn wait_event(&mut self) -> Result<ControlEvent> {
        let (settings, event) = self
            .script
            .pop_front()
            .ok_or(CalibrationError::ControlsClosed)?;
        if let Some(settings) = settings {
            self.settings = settings;
        }
        Ok(event)
    }
}
