//! Scoped work inside an embedded frame.
//!
//! [`FrameRegion::run`] waits for the frame, switches the driver into it,
//! runs the body and switches back to the top-level document whether the
//! body succeeded, failed or panicked.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::warn;

use crate::driver::ElementRef;
use crate::error::E2eResult;
use crate::session::BrowserSession;

pub struct FrameRegion<'a> {
    session: &'a BrowserSession,
    frame: ElementRef,
    present_outside: Vec<ElementRef>,
    displayed_inside: Vec<ElementRef>,
}

impl<'a> FrameRegion<'a> {
    pub fn new(session: &'a BrowserSession, frame: ElementRef) -> Self {
        Self {
            session,
            frame,
            present_outside: Vec::new(),
            displayed_inside: Vec::new(),
        }
    }

    /// Before entering, wait for `element` in the enclosing document.
    pub fn when_present(mut self, element: ElementRef) -> Self {
        self.present_outside.push(element);
        self
    }

    /// After entering, wait for `element` in the frame to be displayed.
    pub fn when_displayed_inside(mut self, element: ElementRef) -> Self {
        self.displayed_inside.push(element);
        self
    }

    pub async fn run<F, Fut, T>(self, body: F) -> E2eResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = E2eResult<T>>,
    {
        let session = self.session;
        let driver = session.driver();

        for element in &self.present_outside {
            session
                .wait_until(&format!("{} to be present", element), move || async move {
                    driver.exists(element).await
                })
                .await?;
        }
        let frame = &self.frame;
        session
            .wait_until(&format!("frame {} to be available", frame), move || async move {
                driver.exists(frame).await
            })
            .await?;

        driver.switch_to_frame(frame).await?;

        let displayed_inside = &self.displayed_inside;
        let outcome = AssertUnwindSafe(async move {
            for element in displayed_inside {
                session
                    .wait_until(&format!("{} to be displayed", element), move || async move {
                        driver.is_displayed(element).await
                    })
                    .await?;
            }
            body().await
        })
        .catch_unwind()
        .await;

        let restored = driver.switch_to_default_content().await;

        match outcome {
            Ok(Ok(value)) => restored.map(|_| value),
            Ok(Err(e)) => {
                if let Err(restore_err) = restored {
                    warn!("Failed to leave frame {}: {}", frame, restore_err);
                }
                Err(e)
            }
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
