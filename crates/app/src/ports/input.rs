//! Input port — synthetic mouse and keyboard events.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use macrobot_domain::error::MacrobotError;
use macrobot_domain::geometry::Point;
use macrobot_domain::key::Key;

/// Pause between the last key press and the first release of a hotkey.
pub const HOTKEY_SETTLE: Duration = Duration::from_millis(50);

/// Drives the mouse and keyboard.
///
/// Click methods take an optional point; `None` clicks at the current
/// cursor position.
pub trait InputDevice: Send + Sync {
    /// Move the cursor, optionally along a human-looking path.
    fn move_to(
        &self,
        point: Point,
        humanized: bool,
    ) -> impl Future<Output = Result<(), MacrobotError>> + Send;

    fn click(&self, point: Option<Point>) -> impl Future<Output = Result<(), MacrobotError>> + Send;

    fn double_click(
        &self,
        point: Option<Point>,
    ) -> impl Future<Output = Result<(), MacrobotError>> + Send;

    fn right_click(
        &self,
        point: Option<Point>,
    ) -> impl Future<Output = Result<(), MacrobotError>> + Send;

    /// Type text, waiting `delay` between characters when set.
    fn type_text(
        &self,
        text: &str,
        delay: Option<Duration>,
    ) -> impl Future<Output = Result<(), MacrobotError>> + Send;

    fn key_down(&self, key: Key) -> impl Future<Output = Result<(), MacrobotError>> + Send;

    fn key_up(&self, key: Key) -> impl Future<Output = Result<(), MacrobotError>> + Send;

    /// Press and release a single key.
    fn press_key(&self, key: Key) -> impl Future<Output = Result<(), MacrobotError>> + Send;

    /// Press every key in order, settle, then release them in reverse order.
    fn hotkey(&self, keys: &[Key]) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        async move {
            for key in keys {
                self.key_down(*key).await?;
            }
            tokio::time::sleep(HOTKEY_SETTLE).await;
            for key in keys.iter().rev() {
                self.key_up(*key).await?;
            }
            Ok(())
        }
    }

    fn drag(
        &self,
        from: Point,
        to: Point,
    ) -> impl Future<Output = Result<(), MacrobotError>> + Send;

    /// Scroll the wheel; positive amounts scroll up.
    fn scroll(&self, amount: i32) -> impl Future<Output = Result<(), MacrobotError>> + Send;
}

impl<T: InputDevice> InputDevice for Arc<T> {
    fn move_to(
        &self,
        point: Point,
        humanized: bool,
    ) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        (**self).move_to(point, humanized)
    }

    fn click(&self, point: Option<Point>) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        (**self).click(point)
    }

    fn double_click(
        &self,
        point: Option<Point>,
    ) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        (**self).double_click(point)
    }

    fn right_click(
        &self,
        point: Option<Point>,
    ) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        (**self).right_click(point)
    }

    fn type_text(
        &self,
        text: &str,
        delay: Option<Duration>,
    ) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        (**self).type_text(text, delay)
    }

    fn key_down(&self, key: Key) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        (**self).key_down(key)
    }

    fn key_up(&self, key: Key) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        (**self).key_up(key)
    }

    fn press_key(&self, key: Key) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        (**self).press_key(key)
    }

    fn hotkey(&self, keys: &[Key]) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        (**self).hotkey(keys)
    }

    fn drag(
        &self,
        from: Point,
        to: Point,
    ) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        (**self).drag(from, to)
    }

    fn scroll(&self, amount: i32) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        (**self).scroll(amount)
    }
}
