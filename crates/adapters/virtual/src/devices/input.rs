//! Virtual input — records mouse and keyboard calls instead of sending them.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use macrobot_app::ports::InputDevice;
use macrobot_domain::error::MacrobotError;
use macrobot_domain::geometry::Point;
use macrobot_domain::key::Key;

/// One recorded input call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    MoveTo { point: Point, humanized: bool },
    Click { point: Point },
    DoubleClick { point: Point },
    RightClick { point: Point },
    Type { text: String },
    KeyDown(Key),
    KeyUp(Key),
    PressKey(Key),
    Drag { from: Point, to: Point },
    Scroll(i32),
}

/// A simulated mouse and keyboard.
///
/// Clicks without a point land on the current cursor position; clicks,
/// moves and drags move the cursor.
#[derive(Debug, Default)]
pub struct VirtualInput {
    events: Mutex<Vec<InputEvent>>,
    cursor: Mutex<Point>,
}

impl VirtualInput {
    /// Every call recorded so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<InputEvent> {
        self.lock_events().clone()
    }

    /// Forget recorded calls, keeping the cursor where it is.
    pub fn clear(&self) {
        self.lock_events().clear();
    }

    #[must_use]
    pub fn cursor(&self) -> Point {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_events(&self) -> MutexGuard<'_, Vec<InputEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn place_cursor(&self, point: Option<Point>) -> Point {
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(point) = point {
            *cursor = point;
        }
        *cursor
    }

    fn record(&self, event: InputEvent) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        self.lock_events().push(event);
        async { Ok(()) }
    }
}

impl InputDevice for VirtualInput {
    fn move_to(
        &self,
        point: Point,
        humanized: bool,
    ) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        self.place_cursor(Some(point));
        self.record(InputEvent::MoveTo { point, humanized })
    }

    fn click(&self, point: Option<Point>) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        let point = self.place_cursor(point);
        self.record(InputEvent::Click { point })
    }

    fn double_click(
        &self,
        point: Option<Point>,
    ) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        let point = self.place_cursor(point);
        self.record(InputEvent::DoubleClick { point })
    }

    fn right_click(
        &self,
        point: Option<Point>,
    ) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        let point = self.place_cursor(point);
        self.record(InputEvent::RightClick { point })
    }

    fn type_text(
        &self,
        text: &str,
        delay: Option<Duration>,
    ) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        let typed = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
        self.lock_events().push(InputEvent::Type {
            text: text.to_string(),
        });
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay.saturating_mul(typed)).await;
            }
            Ok(())
        }
    }

    fn key_down(&self, key: Key) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        self.record(InputEvent::KeyDown(key))
    }

    fn key_up(&self, key: Key) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        self.record(InputEvent::KeyUp(key))
    }

    fn press_key(&self, key: Key) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        self.record(InputEvent::PressKey(key))
    }

    fn drag(
        &self,
        from: Point,
        to: Point,
    ) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        self.place_cursor(Some(to));
        self.record(InputEvent::Drag { from, to })
    }

    fn scroll(&self, amount: i32) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        self.record(InputEvent::Scroll(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test]
    async fn should_click_at_cursor_when_no_point_given() {
        let input = VirtualInput::default();
        input.move_to(Point::new(5, 6), true).await.unwrap();
        input.click(None).await.unwrap();

        assert_eq!(
            input.events(),
            vec![
                InputEvent::MoveTo {
                    point: Point::new(5, 6),
                    humanized: true
                },
                InputEvent::Click {
                    point: Point::new(5, 6)
                },
            ]
        );
    }

    #[tokio::test]
    async fn should_move_cursor_when_dragging() {
        let input = VirtualInput::default();
        input
            .drag(Point::new(0, 0), Point::new(40, 50))
            .await
            .unwrap();
        assert_eq!(input.cursor(), Point::new(40, 50));
    }

    #[tokio::test(start_paused = true)]
    async fn should_take_inter_key_delay_per_character() {
        let input = VirtualInput::default();
        let start = Instant::now();
        input
            .type_text("abcd", Some(Duration::from_millis(25)))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(
            input.events(),
            vec![InputEvent::Type {
                text: "abcd".into()
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_record_hotkey_through_default_sequence() {
        let input = VirtualInput::default();
        input.hotkey(&[Key::Alt, Key::F(4)]).await.unwrap();
        assert_eq!(
            input.events(),
            vec![
                InputEvent::KeyDown(Key::Alt),
                InputEvent::KeyDown(Key::F(4)),
                InputEvent::KeyUp(Key::F(4)),
                InputEvent::KeyUp(Key::Alt),
            ]
        );
    }

    #[tokio::test]
    async fn should_forget_events_when_cleared() {
        let input = VirtualInput::default();
        input.scroll(-3).await.unwrap();
        input.clear();
        assert!(input.events().is_empty());
    }
}
