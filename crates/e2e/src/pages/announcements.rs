use super::editor::editor_page;
use crate::driver::ElementRef;
use crate::error::{expect_equal, E2eResult};

page_object!(
    /// The public announcements list
    AnnouncementsPage
);

impl AnnouncementsPage {
    pub async fn click_add_new(&self) -> E2eResult<AnnouncementsEditorPage> {
        let add = self
            .find_element_by_css_selector("#gcb-add-announcement > button", None)
            .await?;
        self.click(&add).await?;
        AnnouncementsEditorPage::open(self.session().clone()).await
    }

    /// Check the first announcement shown. Fields left `None` are not
    /// checked.
    pub async fn verify_announcement(
        &self,
        title: Option<&str>,
        date: Option<&str>,
        body: Option<&str>,
    ) -> E2eResult<&Self> {
        if let Some(title) = title {
            let shown = self.text_of(&ElementRef::css("div.gcb-aside h2").nth(0)).await?;
            expect_equal("announcement title", title, shown.as_str())?;
        }
        if let Some(date) = date {
            let shown = self.text_of(&ElementRef::css("div.gcb-aside p").nth(0)).await?;
            expect_equal("announcement date", date, shown.as_str())?;
        }
        if let Some(body) = body {
            let shown = self.text_of(&ElementRef::css("div.gcb-aside p").nth(1)).await?;
            expect_equal("announcement body", body, shown.as_str())?;
        }
        Ok(self)
    }
}

editor_page!(AnnouncementsEditorPage);

impl AnnouncementsEditorPage {
    pub async fn enter_fields(
        &self,
        title: Option<&str>,
        date: Option<&str>,
        body: Option<&str>,
    ) -> E2eResult<&Self> {
        if let Some(title) = title {
            let field = self.find_element_by_name("title").await?;
            self.fill(&field, title).await?;
        }
        if let Some(date) = date {
            let field = self.find_element_by_name("date").await?;
            self.fill(&field, date).await?;
        }
        if let Some(body) = body {
            // HTML entry mode
            let html_tab = self
                .find_element_by_css_selector("div.cb-editor-field div.buttonbar-div button", Some(1))
                .await?;
            self.click(&html_tab).await?;
            self.setvalue_codemirror(0, body).await?;
        }
        Ok(self)
    }

    pub async fn click_close(&self) -> E2eResult<AnnouncementsPage> {
        self.close().await?;
        Ok(AnnouncementsPage::new(self.session().clone()))
    }
}
