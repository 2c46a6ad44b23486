//! One handler per action kind. Adding a kind means one `ActionType` variant plus one
//! arm in `handler_for`.
use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::driver::{DeviceDriver, Direction, ElementId, Gesture, Locator};
use crate::errors::{MobiClawError, MobiClawResult};
use crate::model::ActionType;
use crate::perception::EvidenceStore;

/// Borrowed view of everything a handler may need for one attempt.
pub struct ActionContext<'a> {
    pub action_type: ActionType,
    pub locator: Option<&'a str>,
    pub value: Option<&'a str>,
    pub driver: &'a dyn DeviceDriver,
    pub evidence: &'a EvidenceStore,
    pub wait_timeout: Duration,
}

impl ActionContext<'_> {
    fn invalid(&self, reason: impl Into<String>) -> MobiClawError {
        MobiClawError::InvalidActionValue {
            action: self.action_type.to_string(),
            value: self.value.unwrap_or_default().to_string(),
            reason: reason.into(),
        }
    }

    fn required_value(&self, what: &str) -> MobiClawResult<&str> {
        self.value
            .ok_or_else(|| self.invalid(format!("{} requires {what}", self.action_type)))
    }

    fn direction(&self) -> MobiClawResult<Direction> {
        self.required_value("a direction")?
            .parse::<Direction>()
            .map_err(|reason| self.invalid(reason))
    }

    async fn element(&self) -> MobiClawResult<ElementId> {
        let raw = self.locator.ok_or_else(|| {
            MobiClawError::DriverOperationFailed(format!("{} has no resolved locator", self.action_type))
        })?;
        self.driver
            .find_element(&Locator::parse(raw), self.wait_timeout)
            .await
    }
}

pub type Handler = for<'a> fn(&'a ActionContext<'a>) -> BoxFuture<'a, MobiClawResult<()>>;

pub fn handler_for(action_type: ActionType) -> Handler {
    match action_type {
        ActionType::Tap => tap,
        ActionType::LongPress => long_press,
        ActionType::Type => type_text,
        ActionType::Clear => clear,
        ActionType::Swipe => swipe,
        ActionType::Scroll => scroll,
        ActionType::Back => back,
        ActionType::VerifyText => verify_text,
        ActionType::VerifyElement => verify_element,
        ActionType::Wait => wait,
        ActionType::LaunchApp => launch_app,
        ActionType::CloseApp => close_app,
        ActionType::TakeScreenshot => take_screenshot,
    }
}

fn tap<'a>(cx: &'a ActionContext<'a>) -> BoxFuture<'a, MobiClawResult<()>> {
    Box::pin(async move {
        let el = cx.element().await?;
        cx.driver.click(&el).await
    })
}

fn long_press<'a>(cx: &'a ActionContext<'a>) -> BoxFuture<'a, MobiClawResult<()>> {
    Box::pin(async move {
        let el = cx.element().await?;
        let rect = cx.driver.element_rect(&el).await?;
        cx.driver
            .perform_gesture(&Gesture::long_press(rect.center()))
            .await
    })
}

fn type_text<'a>(cx: &'a ActionContext<'a>) -> BoxFuture<'a, MobiClawResult<()>> {
    Box::pin(async move {
        let text = cx.required_value("text to enter")?;
        let el = cx.element().await?;
        cx.driver.send_keys(&el, text).await
    })
}

fn clear<'a>(cx: &'a ActionContext<'a>) -> BoxFuture<'a, MobiClawResult<()>> {
    Box::pin(async move {
        let el = cx.element().await?;
        cx.driver.clear(&el).await
    })
}

fn swipe<'a>(cx: &'a ActionContext<'a>) -> BoxFuture<'a, MobiClawResult<()>> {
    Box::pin(async move {
        let direction = cx.direction()?;
        let window = cx.driver.window_size().await?;
        cx.driver
            .perform_gesture(&Gesture::swipe(window, direction))
            .await
    })
}

fn scroll<'a>(cx: &'a ActionContext<'a>) -> BoxFuture<'a, MobiClawResult<()>> {
    Box::pin(async move {
        let direction = cx.direction()?;
        let window = cx.driver.window_size().await?;
        cx.driver
            .perform_gesture(&Gesture::scroll(window, direction))
            .await
    })
}

fn back<'a>(cx: &'a ActionContext<'a>) -> BoxFuture<'a, MobiClawResult<()>> {
    Box::pin(async move { cx.driver.back().await })
}

/// With a value, any element containing that text; otherwise the resolved element.
fn verify_text<'a>(cx: &'a ActionContext<'a>) -> BoxFuture<'a, MobiClawResult<()>> {
    Box::pin(async move {
        match cx.value {
            Some(text) => cx
                .driver
                .find_element(&Locator::text_contains(text), cx.wait_timeout)
                .await
                .map(|_| ()),
            None => cx.element().await.map(|_| ()),
        }
    })
}

fn verify_element<'a>(cx: &'a ActionContext<'a>) -> BoxFuture<'a, MobiClawResult<()>> {
    Box::pin(async move { cx.element().await.map(|_| ()) })
}

fn wait<'a>(cx: &'a ActionContext<'a>) -> BoxFuture<'a, MobiClawResult<()>> {
    Box::pin(async move {
        let raw = cx.required_value("a number of milliseconds")?;
        let ms = raw
            .parse::<u64>()
            .map_err(|_| cx.invalid("not a whole number of milliseconds"))?;
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    })
}

fn launch_app<'a>(cx: &'a ActionContext<'a>) -> BoxFuture<'a, MobiClawResult<()>> {
    Box::pin(async move {
        let app = cx.required_value("an app identifier")?;
        cx.driver.activate_app(app).await
    })
}

fn close_app<'a>(cx: &'a ActionContext<'a>) -> BoxFuture<'a, MobiClawResult<()>> {
    Box::pin(async move {
        let app = cx.required_value("an app identifier")?;
        cx.driver.terminate_app(app).await
    })
}

fn take_screenshot<'a>(cx: &'a ActionContext<'a>) -> BoxFuture<'a, MobiClawResult<()>> {
    Box::pin(async move {
        let png = cx.driver.screenshot().await?;
        let name = format!("manual_{}.png", cx.value.unwrap_or("screenshot"));
        let saved = cx.evidence.save(&name, &png).await?;
        tracing::info!(evidence = %saved, "manual screenshot saved");
        Ok(())
    })
}
