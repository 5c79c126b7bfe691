pub mod local;
pub mod scaler;

use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::errors::ScreenPilotResult;

/// Mouse buttons the planning service can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Right,
    Wheel,
    Back,
    Forward,
}

/// A screen position, in whichever coordinate space the surrounding API
/// declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Display and input surface. Implementations address the *native*
/// resolution of the device; wrap one in a [`scaler::Scaler`] to talk to it
/// in the planner's virtual coordinates instead.
#[async_trait]
pub trait Computer: Send + Sync {
    /// Pixel dimensions of the display this computer draws on.
    async fn dimensions(&self) -> ScreenPilotResult<(u32, u32)>;

    /// Capture the current screen contents.
    async fn screenshot(&self) -> ScreenPilotResult<RgbaImage>;

    async fn mouse_move(&self, x: i32, y: i32) -> ScreenPilotResult<()>;

    async fn click(&self, x: i32, y: i32, button: MouseButton) -> ScreenPilotResult<()>;

    async fn double_click(&self, x: i32, y: i32) -> ScreenPilotResult<()>;

    /// Press at the first waypoint, move through the rest, release at the
    /// last. An empty path is a no-op.
    async fn drag(&self, path: &[Point]) -> ScreenPilotResult<()>;

    /// Scroll by pixel deltas with the pointer at (x, y).
    async fn scroll(&self, x: i32, y: i32, dx: i32, dy: i32) -> ScreenPilotResult<()>;

    async fn type_text(&self, text: &str) -> ScreenPilotResult<()>;

    /// Press the named keys as a chord: all down in order, released in
    /// reverse.
    async fn key_press(&self, keys: &[String]) -> ScreenPilotResult<()>;

    /// Let the screen settle before the next observation.
    async fn wait(&self) -> ScreenPilotResult<()>;
}

#[async_trait]
impl<T: Computer + ?Sized> Computer for std::sync::Arc<T> {
    async fn dimensions(&self) -> ScreenPilotResult<(u32, u32)> {
        (**self).dimensions().await
    }

    async fn screenshot(&self) -> ScreenPilotResult<RgbaImage> {
        (**self).screenshot().await
    }

    async fn mouse_move(&self, x: i32, y: i32) -> ScreenPilotResult<()> {
        (**self).mouse_move(x, y).await
    }

    async fn click(&self, x: i32, y: i32, button: MouseButton) -> ScreenPilotResult<()> {
        (**self).click(x, y, button).await
    }

    async fn double_click(&self, x: i32, y: i32) -> ScreenPilotResult<()> {
        (**self).double_click(x, y).await
    }

    async fn drag(&self, path: &[Point]) -> ScreenPilotResult<()> {
        (**self).drag(path).await
    }

    async fn scroll(&self, x: i32, y: i32, dx: i32, dy: i32) -> ScreenPilotResult<()> {
        (**self).scroll(x, y, dx, dy).await
    }

    async fn type_text(&self, text: &str) -> ScreenPilotResult<()> {
        (**self).type_text(text).await
    }

    async fn key_press(&self, keys: &[String]) -> ScreenPilotResult<()> {
        (**self).key_press(keys).await
    }

    async fn wait(&self) -> ScreenPilotResult<()> {
        (**self).wait().await
    }
}
