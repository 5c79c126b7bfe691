use std::time::Duration;

use async_trait::async_trait;
use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use image::RgbaImage;

use crate::computer::{Computer, MouseButton, Point};
use crate::errors::{ScreenPilotError, ScreenPilotResult};

/// Pixels of scroll delta per wheel step: enigo scrolls in lines, the planner
/// reasons in pixels.
const SCROLL_STEP_PX: i32 = 40;
/// Gap between the two presses of a double click.
const DOUBLE_CLICK_GAP: Duration = Duration::from_millis(80);
/// Pointer settle time between drag waypoints.
const DRAG_STEP_PAUSE: Duration = Duration::from_millis(20);
/// Fixed pause for the `wait` action.
const WAIT_DURATION: Duration = Duration::from_millis(1000);

/// Display and input backend for the machine screenpilot runs on: xcap for
/// primary-monitor capture, enigo for pointer/keyboard injection. Input work
/// runs on the blocking pool since neither library is async.
#[derive(Debug, Default)]
pub struct LocalComputer;

impl LocalComputer {
    pub fn new() -> Self {
        Self
    }
}

fn input_err(e: impl std::fmt::Display) -> ScreenPilotError {
    ScreenPilotError::ActionExecution(e.to_string())
}

fn join_err(e: tokio::task::JoinError) -> ScreenPilotError {
    ScreenPilotError::ActionExecution(format!("input task failed: {e}"))
}

/// Run `f` with a fresh enigo handle on the blocking pool.
async fn with_enigo<F>(f: F) -> ScreenPilotResult<()>
where
    F: FnOnce(&mut Enigo) -> Result<(), enigo::InputError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut enigo = Enigo::new(&Settings::default()).map_err(input_err)?;
        f(&mut enigo).map_err(input_err)
    })
    .await
    .map_err(join_err)?
}

fn primary_monitor() -> ScreenPilotResult<xcap::Monitor> {
    let monitors = xcap::Monitor::all()
        .map_err(|e| ScreenPilotError::Config(format!("cannot enumerate displays: {e}")))?;
    let mut fallback = None;
    for monitor in monitors {
        if monitor.is_primary() {
            return Ok(monitor);
        }
        fallback.get_or_insert(monitor);
    }
    fallback.ok_or_else(|| ScreenPilotError::Config("no display found".into()))
}

fn map_button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Wheel => Button::Middle,
        MouseButton::Back => Button::Back,
        MouseButton::Forward => Button::Forward,
    }
}

/// Convert a pixel delta to wheel steps, keeping at least one step for any
/// non-zero delta.
fn wheel_steps(delta_px: i32) -> i32 {
    let steps = delta_px / SCROLL_STEP_PX;
    if steps == 0 {
        delta_px.signum()
    } else {
        steps
    }
}

/// Map a planner key symbol ("ENTER", "ctrl", "a", "F5", ...) to an enigo
/// key.
fn map_key(name: &str) -> ScreenPilotResult<Key> {
    let lower = name.trim().to_lowercase();
    let key = match lower.as_str() {
        "enter" | "return" => Key::Return,
        "tab" => Key::Tab,
        "space" => Key::Space,
        "backspace" | "back" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "escape" | "esc" => Key::Escape,
        "ctrl" | "control" => Key::Control,
        "alt" | "option" | "opt" => Key::Alt,
        "shift" => Key::Shift,
        "meta" | "cmd" | "command" | "win" | "super" => Key::Meta,
        "up" | "arrowup" => Key::UpArrow,
        "down" | "arrowdown" => Key::DownArrow,
        "left" | "arrowleft" => Key::LeftArrow,
        "right" | "arrowright" => Key::RightArrow,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" | "page_up" => Key::PageUp,
        "pagedown" | "page_down" => Key::PageDown,
        "capslock" | "caps" => Key::CapsLock,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        single => {
            let mut chars = single.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => {
                    return Err(ScreenPilotError::ActionExecution(format!(
                        "unrecognized key symbol '{name}'"
                    )))
                }
            }
        }
    };
    Ok(key)
}

#[async_trait]
impl Computer for LocalComputer {
    async fn dimensions(&self) -> ScreenPilotResult<(u32, u32)> {
        tokio::task::spawn_blocking(|| {
            let monitor = primary_monitor()?;
            Ok((monitor.width(), monitor.height()))
        })
        .await
        .map_err(join_err)?
    }

    async fn screenshot(&self) -> ScreenPilotResult<RgbaImage> {
        tokio::task::spawn_blocking(|| {
            let monitor = primary_monitor()?;
            let captured = monitor
                .capture_image()
                .map_err(|e| ScreenPilotError::ActionExecution(format!("screen capture failed: {e}")))?;
            // xcap pins an older `image` major than this crate; rebuild the same
            // RGBA pixel buffer as our `image` version's RgbaImage.
            let (width, height) = (captured.width(), captured.height());
            RgbaImage::from_raw(width, height, captured.into_raw()).ok_or_else(|| {
                ScreenPilotError::ActionExecution("screen capture produced an invalid buffer".into())
            })
        })
        .await
        .map_err(join_err)?
    }

    async fn mouse_move(&self, x: i32, y: i32) -> ScreenPilotResult<()> {
        with_enigo(move |e| e.move_mouse(x, y, Coordinate::Abs)).await
    }

    async fn click(&self, x: i32, y: i32, button: MouseButton) -> ScreenPilotResult<()> {
        let button = map_button(button);
        with_enigo(move |e| {
            e.move_mouse(x, y, Coordinate::Abs)?;
            e.button(button, Direction::Click)
        })
        .await
    }

    async fn double_click(&self, x: i32, y: i32) -> ScreenPilotResult<()> {
        with_enigo(move |e| {
            e.move_mouse(x, y, Coordinate::Abs)?;
            e.button(Button::Left, Direction::Click)?;
            std::thread::sleep(DOUBLE_CLICK_GAP);
            e.button(Button::Left, Direction::Click)
        })
        .await
    }

    async fn drag(&self, path: &[Point]) -> ScreenPilotResult<()> {
        let path = path.to_vec();
        with_enigo(move |e| {
            let Some(first) = path.first() else {
                return Ok(());
            };
            e.move_mouse(first.x, first.y, Coordinate::Abs)?;
            e.button(Button::Left, Direction::Press)?;
            for point in &path[1..] {
                std::thread::sleep(DRAG_STEP_PAUSE);
                e.move_mouse(point.x, point.y, Coordinate::Abs)?;
            }
            e.button(Button::Left, Direction::Release)
        })
        .await
    }

    async fn scroll(&self, x: i32, y: i32, dx: i32, dy: i32) -> ScreenPilotResult<()> {
        with_enigo(move |e| {
            e.move_mouse(x, y, Coordinate::Abs)?;
            let horizontal = wheel_steps(dx);
            let vertical = wheel_steps(dy);
            if horizontal != 0 {
                e.scroll(horizontal, Axis::Horizontal)?;
            }
            if vertical != 0 {
                e.scroll(vertical, Axis::Vertical)?;
            }
            Ok(())
        })
        .await
    }

    async fn type_text(&self, text: &str) -> ScreenPilotResult<()> {
        let text = text.to_owned();
        with_enigo(move |e| e.text(&text)).await
    }

    async fn key_press(&self, keys: &[String]) -> ScreenPilotResult<()> {
        let keys = keys
            .iter()
            .map(|k| map_key(k))
            .collect::<ScreenPilotResult<Vec<Key>>>()?;
        with_enigo(move |e| {
            for key in &keys {
                e.key(*key, Direction::Press)?;
            }
            for key in keys.iter().rev() {
                e.key(*key, Direction::Release)?;
            }
            Ok(())
        })
        .await
    }

    async fn wait(&self) -> ScreenPilotResult<()> {
        tokio::time::sleep(WAIT_DURATION).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_key_names() {
        assert_eq!(map_key("ENTER").unwrap(), Key::Return);
        assert_eq!(map_key("return").unwrap(), Key::Return);
        assert_eq!(map_key("esc").unwrap(), Key::Escape);
        assert_eq!(map_key("CTRL").unwrap(), Key::Control);
        assert_eq!(map_key("cmd").unwrap(), Key::Meta);
        assert_eq!(map_key("ArrowDown").unwrap(), Key::DownArrow);
        assert_eq!(map_key("F5").unwrap(), Key::F5);
    }

    #[test]
    fn map_key_single_characters() {
        assert_eq!(map_key("a").unwrap(), Key::Unicode('a'));
        assert_eq!(map_key("7").unwrap(), Key::Unicode('7'));
        assert_eq!(map_key("/").unwrap(), Key::Unicode('/'));
    }

    #[test]
    fn map_key_rejects_unknown_symbols() {
        assert!(map_key("hyperdrive").is_err());
        assert!(map_key("").is_err());
    }

    #[test]
    fn map_button_covers_vocabulary() {
        assert_eq!(map_button(MouseButton::Left), Button::Left);
        assert_eq!(map_button(MouseButton::Wheel), Button::Middle);
        assert_eq!(map_button(MouseButton::Forward), Button::Forward);
    }

    #[test]
    fn wheel_steps_rounds_toward_zero_but_keeps_motion() {
        assert_eq!(wheel_steps(0), 0);
        assert_eq!(wheel_steps(120), 3);
        assert_eq!(wheel_steps(-120), -3);
        // Small deltas still produce one step in the right direction.
        assert_eq!(wheel_steps(10), 1);
        assert_eq!(wheel_steps(-10), -1);
    }
}
