//! Site administration: the course list, site settings and their editors.

use std::ops::Deref;

use super::editor::editor_page;
use super::DashboardPage;
use crate::driver::ElementRef;
use crate::error::{E2eError, E2eResult};
use crate::session::BrowserSession;

/// The admin course list. Keeps the dashboard menu.
pub struct AdminPage {
    dashboard: DashboardPage,
}

impl AdminPage {
    pub fn new(session: BrowserSession) -> Self {
        Self {
            dashboard: DashboardPage::new(session),
        }
    }

    pub async fn click_add_course(&self) -> E2eResult<AddCourseEditorPage> {
        let add = self.find_element_by_id("add_course").await?;
        self.click(&add).await?;
        AddCourseEditorPage::open(self.session().clone()).await
    }

    pub async fn click_settings(&self) -> E2eResult<AdminSettingsPage> {
        self.ensure_menu_group_is_open("admin").await?;
        self.click_link("Site settings").await?;
        Ok(AdminSettingsPage::new(self.session().clone()))
    }
}

impl Deref for AdminPage {
    type Target = DashboardPage;

    fn deref(&self) -> &DashboardPage {
        &self.dashboard
    }
}

page_object!(
    /// The table of site-wide configuration properties
    AdminSettingsPage
);

impl AdminSettingsPage {
    /// The admin emails property has the first override button.
    pub async fn click_override_admin_user_emails(&self) -> E2eResult<ConfigPropertyOverridePage> {
        let button = self
            .find_element_by_css_selector("button.gcb-button", Some(0))
            .await?;
        self.click(&button).await?;
        ConfigPropertyOverridePage::open(self.session().clone()).await
    }

    pub async fn click_override(&self, setting_name: &str) -> E2eResult<ConfigPropertyOverridePage> {
        let button = self.find_element_by_id(setting_name).await?;
        self.click(&button).await?;
        ConfigPropertyOverridePage::open(self.session().clone()).await
    }

    pub async fn verify_admin_user_emails_contains(&self, email: &str) -> E2eResult<&Self> {
        let cell = ElementRef::css("table.gcb-config tr")
            .nth(1)
            .child_css("td")
            .nth(1);
        let shown = self.text_of(&cell).await?;
        if !shown.contains(email) {
            return Err(E2eError::AssertionFailed(format!(
                "admin emails {:?} do not include {}",
                shown, email
            )));
        }
        Ok(self)
    }
}

editor_page!(
    /// Editor overriding one configuration property
    ConfigPropertyOverridePage
);

impl ConfigPropertyOverridePage {
    pub async fn clear_value(&self) -> E2eResult<&Self> {
        let field = self.find_element_by_name("value").await?;
        self.driver().clear(&field).await?;
        Ok(self)
    }

    /// Type into the value field of a text property.
    pub async fn set_value(&self, value: &str) -> E2eResult<&Self> {
        let field = self.find_element_by_name("value").await?;
        self.driver().send_keys(&field, value).await?;
        Ok(self)
    }

    /// Set a boolean property. The checkbox next to the hidden value field
    /// is toggled only when the stored value differs.
    pub async fn set_bool_value(&self, value: bool) -> E2eResult<&Self> {
        let field = self.find_element_by_name("value").await?;
        let current = self
            .driver()
            .attribute(&field, "value")
            .await?
            .unwrap_or_default()
            .to_lowercase();
        if current != value.to_string() {
            let checkbox = field.parent_element().child_css(r#"[type="checkbox"]"#);
            self.driver().send_keys(&checkbox, " ").await?;
        }
        Ok(self)
    }

    pub async fn click_close(&self) -> E2eResult<AdminSettingsPage> {
        self.close().await?;
        Ok(AdminSettingsPage::new(self.session().clone()))
    }
}

editor_page!(
    /// The new course form
    AddCourseEditorPage
);

impl AddCourseEditorPage {
    /// Clear all three fields, then fill the given ones.
    pub async fn set_fields(
        &self,
        name: Option<&str>,
        title: Option<&str>,
        email: Option<&str>,
    ) -> E2eResult<&Self> {
        let fields = [
            (self.find_element_by_name("name").await?, name),
            (self.find_element_by_name("title").await?, title),
            (self.find_element_by_name("admin_email").await?, email),
        ];
        for (field, _) in &fields {
            self.driver().clear(field).await?;
        }
        for (field, value) in &fields {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                self.driver().send_keys(field, value).await?;
            }
        }
        Ok(self)
    }

    pub async fn click_close(&self) -> E2eResult<AdminPage> {
        self.close().await?;
        Ok(AdminPage::new(self.session().clone()))
    }
}
