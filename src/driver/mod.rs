//! Device driver seam. The coordinator owns one driver exclusively per instruction and
//! lends `&dyn DeviceDriver` to the resolver and executor.
pub mod appium;
pub mod gesture;
pub mod locator;

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::MobiClawResult;

pub use appium::AppiumDriver;
pub use gesture::{Direction, Gesture, Point, Rect, Size};
pub use locator::Locator;

/// Opaque element reference handed out by `find_element`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(pub String);

#[async_trait]
pub trait DeviceDriver: Send + Sync {
    async fn start_session(&mut self) -> MobiClawResult<()>;

    /// Must be safe to call when no session is open.
    async fn end_session(&mut self) -> MobiClawResult<()>;

    /// Waits up to `timeout`; `MobiClawError::ElementNotFound` when it expires.
    async fn find_element(&self, locator: &Locator, timeout: Duration) -> MobiClawResult<ElementId>;

    async fn click(&self, element: &ElementId) -> MobiClawResult<()>;

    async fn send_keys(&self, element: &ElementId, text: &str) -> MobiClawResult<()>;

    async fn clear(&self, element: &ElementId) -> MobiClawResult<()>;

    async fn element_rect(&self, element: &ElementId) -> MobiClawResult<Rect>;

    async fn window_size(&self) -> MobiClawResult<Size>;

    async fn perform_gesture(&self, gesture: &Gesture) -> MobiClawResult<()>;

    async fn activate_app(&self, app_id: &str) -> MobiClawResult<()>;

    async fn terminate_app(&self, app_id: &str) -> MobiClawResult<()>;

    /// PNG bytes of the current screen.
    async fn screenshot(&self) -> MobiClawResult<Vec<u8>>;

    async fn back(&self) -> MobiClawResult<()>;
}
