//! Course settings tab and the course options editor.

use std::time::Duration;

use tokio::time::sleep;

use super::editor::editor_page;
use super::PageObject;
use crate::driver::ElementRef;
use crate::error::E2eResult;
use crate::session::BrowserSession;

/// Pause after accepting the discard-changes dialog before the settings tab
/// is looked at again.
const CONFIRM_SETTLE: Duration = Duration::from_millis(200);

page_object!(
    /// The dashboard's course settings tab
    SettingsPage
);

impl SettingsPage {
    /// Wait until the "Homepage" sub tab is the selected one.
    pub async fn open(session: BrowserSession) -> E2eResult<Self> {
        let page = Self::new(session);
        let base: &PageObject = &page;
        let driver = base.driver();
        let tab = &ElementRef::link_text("Homepage");
        base.session()
            .wait_until("settings tab to load", move || async move {
                Ok(driver.attribute(tab, "class").await?.as_deref() == Some("selected"))
            })
            .await?;
        Ok(page)
    }
}

editor_page!(
    /// Editor for the course options shown on the settings tab
    CourseOptionsEditorPage
);

impl CourseOptionsEditorPage {
    pub async fn set_course_name(&self, name: &str) -> E2eResult<&Self> {
        let field = self.find_element_by_name("course:title").await?;
        self.fill(&field, name).await?;
        Ok(self)
    }

    pub async fn click_close(&self) -> E2eResult<SettingsPage> {
        self.close().await?;
        SettingsPage::open(self.session().clone()).await
    }

    /// Close with unsaved changes and accept the discard prompt.
    pub async fn click_close_and_confirm(&self) -> E2eResult<SettingsPage> {
        self.close().await?;
        self.accept_alert().await?;
        sleep(CONFIRM_SETTLE).await;
        SettingsPage::open(self.session().clone()).await
    }
}
