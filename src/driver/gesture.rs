use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const SWIPE_MOVE: Duration = Duration::from_millis(300);
pub const SCROLL_MOVE: Duration = Duration::from_millis(800);
pub const LONG_PRESS_HOLD: Duration = Duration::from_millis(1000);

/// Fractions of the centre coordinate the finger travels to.
const NEAR_EDGE: f64 = 0.3;
const FAR_EDGE: f64 = 1.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2,
            y: self.y + self.height / 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UP" => Ok(Direction::Up),
            "DOWN" => Ok(Direction::Down),
            "LEFT" => Ok(Direction::Left),
            "RIGHT" => Ok(Direction::Right),
            other => Err(format!("expected UP, DOWN, LEFT or RIGHT, got '{other}'")),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
        })
    }
}

/// Single-finger press, optional hold, move, release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gesture {
    pub start: Point,
    pub end: Point,
    /// Pause between press and move.
    pub hold: Duration,
    /// Duration of the pointer move from `start` to `end`.
    pub travel: Duration,
}

impl Gesture {
    pub fn swipe(window: Size, direction: Direction) -> Self {
        Self::drag(window, direction, SWIPE_MOVE)
    }

    pub fn scroll(window: Size, direction: Direction) -> Self {
        Self::drag(window, direction, SCROLL_MOVE)
    }

    pub fn long_press(at: Point) -> Self {
        Self {
            start: at,
            end: at,
            hold: LONG_PRESS_HOLD,
            travel: Duration::ZERO,
        }
    }

    /// Starts at the window centre and travels toward the edge named by `direction`.
    fn drag(window: Size, direction: Direction, travel: Duration) -> Self {
        let start = Point {
            x: window.width / 2,
            y: window.height / 2,
        };
        let scaled = |v: i64, f: f64| (v as f64 * f).round() as i64;
        let end = match direction {
            Direction::Up => Point { y: scaled(start.y, NEAR_EDGE), ..start },
            Direction::Down => Point { y: scaled(start.y, FAR_EDGE), ..start },
            Direction::Left => Point { x: scaled(start.x, NEAR_EDGE), ..start },
            Direction::Right => Point { x: scaled(start.x, FAR_EDGE), ..start },
        };
        Self {
            start,
            end,
            hold: Duration::ZERO,
            travel,
        }
    }
}
