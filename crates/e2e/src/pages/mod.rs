//! Page objects.
//!
//! One type per rendered page. Gestures that keep the browser on the same
//! page return `&Self` so calls chain; gestures that lead elsewhere return
//! the page object for the page that is expected next. Every page derefs to
//! [`PageObject`] for the shared lookup and wait primitives.

use std::time::Duration;

use crate::driver::{Driver, ElementRef};
use crate::error::{E2eError, E2eResult};
use crate::session::BrowserSession;

/// Id of the status bar that editors and the dashboard report into.
pub const BUTTER_BAR: &str = "gcb-butterbar-message";

/// Account the page flows log in with.
pub const DEFAULT_LOGIN: &str = "test@example.com";

macro_rules! page_object {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name {
            base: $crate::pages::PageObject,
        }

        impl $name {
            pub fn new(session: $crate::session::BrowserSession) -> Self {
                Self {
                    base: $crate::pages::PageObject::new(session),
                }
            }
        }

        impl std::ops::Deref for $name {
            type Target = $crate::pages::PageObject;

            fn deref(&self) -> &Self::Target {
                &self.base
            }
        }
    };
}

mod admin;
mod analytics;
mod announcements;
mod assets;
mod content_editor;
mod dashboard;
mod editor;
mod lesson;
mod root;
mod settings;

pub use admin::{AddCourseEditorPage, AdminPage, AdminSettingsPage, ConfigPropertyOverridePage};
pub use analytics::AnalyticsPage;
pub use announcements::{AnnouncementsEditorPage, AnnouncementsPage};
pub use assets::{
    AssetsEditorPage, AssetsPage, ImageEditorPage, LabelEditorPage, MultipleChoiceEditorPage,
    QuestionEditorPage, ShortAnswerEditorPage,
};
pub use content_editor::{instance_ids, CourseContentEditor};
pub use dashboard::{DashboardPage, ImportPage};
pub use editor::EditorPage;
pub use lesson::{AssessmentConfirmationPage, BatchSubmission, LessonPage};
pub use root::{LoginPage, RegisterPage, RootPage, WelcomePage};
pub use settings::{CourseOptionsEditorPage, SettingsPage};

/// Primitives shared by every page.
#[derive(Clone)]
pub struct PageObject {
    session: BrowserSession,
}

impl PageObject {
    pub fn new(session: BrowserSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &BrowserSession {
        &self.session
    }

    pub fn driver(&self) -> &dyn Driver {
        self.session.driver()
    }

    pub async fn get(&self, url: &str) -> E2eResult<()> {
        self.session.get(url, true).await
    }

    /// Fail with `NoSuchElement` unless `element` is on the page.
    pub async fn find(&self, element: ElementRef) -> E2eResult<ElementRef> {
        if self.driver().exists(&element).await? {
            Ok(element)
        } else {
            Err(E2eError::NoSuchElement(element.to_string()))
        }
    }

    pub async fn find_element_by_css_selector(
        &self,
        selector: &str,
        index: Option<usize>,
    ) -> E2eResult<ElementRef> {
        self.find(ElementRef::css(selector).at(index)).await
    }

    pub async fn find_element_by_id(&self, id: &str) -> E2eResult<ElementRef> {
        self.find(ElementRef::id(id)).await
    }

    pub async fn find_element_by_link_text(
        &self,
        text: &str,
        index: Option<usize>,
    ) -> E2eResult<ElementRef> {
        self.find(ElementRef::link_text(text).at(index)).await
    }

    pub async fn find_element_by_name(&self, name: &str) -> E2eResult<ElementRef> {
        self.find(ElementRef::name(name)).await
    }

    pub async fn click(&self, element: &ElementRef) -> E2eResult<()> {
        self.driver().click(element).await
    }

    pub async fn click_link(&self, text: &str) -> E2eResult<()> {
        let link = self.find_element_by_link_text(text, None).await?;
        self.driver().click(&link).await
    }

    /// Replace the contents of a text field.
    pub async fn fill(&self, element: &ElementRef, value: &str) -> E2eResult<()> {
        self.driver().clear(element).await?;
        self.driver().send_keys(element, value).await
    }

    pub async fn text_of(&self, element: &ElementRef) -> E2eResult<String> {
        self.driver().text(element).await
    }

    /// Every match of `element`, in document order.
    pub async fn find_all(&self, element: &ElementRef) -> E2eResult<Vec<ElementRef>> {
        let count = self.driver().count(element).await?;
        Ok((0..count).map(|i| element.clone().nth(i)).collect())
    }

    pub async fn wait_until_text_contains(&self, element: &ElementRef, value: &str) -> E2eResult<()> {
        let driver = self.driver();
        self.session
            .wait_until(
                &format!("{:?} in {}", value, element),
                move || async move { Ok(driver.text(element).await?.contains(value)) },
            )
            .await
    }

    pub async fn wait_until_displayed(&self, element: &ElementRef, timeout: Option<Duration>) -> E2eResult<()> {
        let driver = self.driver();
        let description = format!("{} to be displayed", element);
        let condition = move || async move { driver.is_displayed(element).await };
        match timeout {
            Some(timeout) => self.session.wait_until_within(timeout, &description, condition).await,
            None => self.session.wait_until(&description, condition).await,
        }
    }

    pub async fn expect_status_message_to_be(&self, value: &str) -> E2eResult<()> {
        self.wait_until_text_contains(&ElementRef::id(BUTTER_BAR), value)
            .await
    }

    pub async fn wait_until_status_message_hidden(&self) -> E2eResult<&Self> {
        let driver = self.driver();
        let bar = &ElementRef::id(BUTTER_BAR);
        self.session
            .wait_until("status message to be hidden", move || async move {
                if !driver.exists(bar).await? {
                    return Ok(true);
                }
                Ok(!driver.is_displayed(bar).await?)
            })
            .await?;
        Ok(self)
    }

    pub async fn status_message(&self) -> E2eResult<String> {
        let bar = self.find_element_by_id(BUTTER_BAR).await?;
        self.driver().text(&bar).await
    }

    pub async fn go_back(&self) -> E2eResult<&Self> {
        self.driver().back().await?;
        Ok(self)
    }

    /// Wait for a dialog to open and return its message.
    pub async fn switch_to_alert(&self) -> E2eResult<String> {
        let driver = self.driver();
        let message = parking_lot::Mutex::new(None);
        let seen = &message;
        self.session
            .wait_until("alert to be present", move || async move {
                let text = driver.alert_text().await?;
                let present = text.is_some();
                *seen.lock() = text;
                Ok(present)
            })
            .await?;
        Ok(message.into_inner().unwrap_or_default())
    }

    /// Wait for the dialog the last gesture opened, then accept it.
    pub async fn accept_alert(&self) -> E2eResult<()> {
        self.switch_to_alert().await?;
        self.driver().accept_alert().await
    }

    /// The last path segment of the current URL.
    pub async fn where_am_i(&self) -> E2eResult<Option<String>> {
        let url = self.driver().current_url().await?;
        Ok(url.rsplit_once('/').map(|(_, last)| last.to_string()))
    }
}

/// Script setting the `n`-th CodeMirror instance on the page.
pub(crate) fn set_codemirror_script(n: usize, body: &str) -> E2eResult<String> {
    Ok(format!(
        "$('.CodeMirror')[{}].CodeMirror.setValue({});",
        n,
        serde_json::to_string(body)?
    ))
}

pub(crate) fn get_codemirror_script(n: usize) -> String {
    format!("return $('.CodeMirror')[{}].CodeMirror.getValue();", n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codemirror_scripts_quote_the_body() {
        assert_eq!(
            set_codemirror_script(1, "it's <b>\"bold\"</b>").unwrap(),
            r#"$('.CodeMirror')[1].CodeMirror.setValue("it's <b>\"bold\"</b>");"#
        );
        assert_eq!(
            get_codemirror_script(0),
            "return $('.CodeMirror')[0].CodeMirror.getValue();"
        );
    }
}
