use std::collections::HashMap;

use tracing::debug;

use super::geometry::Vec2;

pub const KEYBOARD_DEVICE: &str = "keyboard";
const KEY_DOWN_PREFIX: &str = "keyDown-";

/// Per-frame input from the input collaborator: device name to the
/// active tokens on that device, oldest first.
pub type InputEvents = HashMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ControlMode {
    #[default]
    Keyboard,
}

impl ControlMode {
    pub fn device_name(self) -> &'static str {
        match self {
            ControlMode::Keyboard => KEYBOARD_DEVICE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Dodge,
}

impl Command {
    pub fn from_token(token: &str) -> Option<Self> {
        let key = token.strip_prefix(KEY_DOWN_PREFIX).unwrap_or(token);
        match key {
            "up" => Some(Command::MoveUp),
            "down" => Some(Command::MoveDown),
            "left" => Some(Command::MoveLeft),
            "right" => Some(Command::MoveRight),
            "space" => Some(Command::Dodge),
            _ => None,
        }
    }

    const fn unit_delta(self) -> (f32, f32) {
        match self {
            Command::MoveUp => (0.0, -1.0),
            Command::MoveDown => (0.0, 1.0),
            Command::MoveLeft => (-1.0, 0.0),
            Command::MoveRight => (1.0, 0.0),
            Command::Dodge => (0.0, 0.0),
        }
    }
}

/// Turns raw device tokens into this frame's command list.
#[derive(Debug, Clone, Default)]
pub struct Controller {
    mode: ControlMode,
    commands: Vec<Command>,
}

impl Controller {
    pub fn new(mode: ControlMode) -> Self {
        Self {
            mode,
            commands: Vec::new(),
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    /// Clears last frame's commands and rebuilds them from `events`,
    /// keeping token order and dropping repeats.
    pub fn capture(&mut self, events: &InputEvents) {
        self.commands.clear();
        let Some(tokens) = events.get(self.mode.device_name()) else {
            return;
        };
        for token in tokens {
            match Command::from_token(token) {
                Some(command) if !self.commands.contains(&command) => self.commands.push(command),
                Some(_) => {}
                None => debug!(token = token.as_str(), "input_token_ignored"),
            }
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_active(&self, command: Command) -> bool {
        self.commands.contains(&command)
    }

    /// Sum of the active movement directions; opposite keys cancel.
    pub fn movement_direction(&self) -> Vec2 {
        let (x, y) = self
            .commands
            .iter()
            .map(|command| command.unit_delta())
            .fold((0.0, 0.0), |(ax, ay), (dx, dy)| (ax + dx, ay + dy));
        Vec2::new(x, y)
    }

    /// Most recently pressed movement command, for facing direction.
    pub fn latest_movement(&self) -> Option<Command> {
        self.commands
            .iter()
            .rev()
            .copied()
            .find(|command| *command != Command::Dodge)
    }
}
