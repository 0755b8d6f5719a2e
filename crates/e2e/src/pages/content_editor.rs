//! Unit, lesson, assessment and link editors on the dashboard.
//!
//! These share a title field, rich-text fields with a tab bar (rich text,
//! plain HTML, preview) and a lightbox for custom tags, which is hosted in
//! its own iframe.

use regex::Regex;
use std::ops::Deref;

use super::{DashboardPage, EditorPage};
use crate::driver::{ElementRef, Locator};
use crate::error::{expect_equal, E2eError, E2eResult};
use crate::frame::FrameRegion;
use crate::session::BrowserSession;

pub const UNIT_CREATED: &str = "New unit has been created and saved.";
pub const UNIT_LOADED: &str = "Success.";
pub const ASSESSMENT_CREATED: &str = "New assessment has been created and saved.";
pub const LESSON_CREATED: &str = "New lesson has been created and saved.";
pub const LINK_CREATED: &str = "New link has been created and saved.";

/// Rich-text field positions
pub const INDEX_UNIT_HEADER: usize = 0;
pub const INDEX_UNIT_FOOTER: usize = 1;
pub const INDEX_CONTENT: usize = 0;
pub const INDEX_REVIEWER_FEEDBACK: usize = 1;

const RICH_TEXT_TAB: usize = 0;
const HTML_TAB: usize = 1;
const PREVIEW_TAB: usize = 2;

const LIGHTBOX_FRAME: &str = "iframe#modal-editor-iframe, iframe[name=\"modal-editor-iframe\"]";

pub struct CourseContentEditor {
    editor: EditorPage,
    instanceid_snapshot: Vec<String>,
}

impl CourseContentEditor {
    /// Wait for the editor to load and show `expected_message`.
    pub async fn open(session: BrowserSession, expected_message: &str) -> E2eResult<Self> {
        let editor = EditorPage::open(session).await?;
        editor.expect_status_message_to_be(expected_message).await?;
        Ok(Self {
            editor,
            instanceid_snapshot: Vec::new(),
        })
    }

    pub async fn set_title(&self, title: &str) -> E2eResult<&Self> {
        let field = self.find_element_by_name("title").await?;
        self.fill(&field, title).await?;
        Ok(self)
    }

    fn tab_button(field_index: Option<usize>, button_index: usize) -> ElementRef {
        ElementRef::css("div.cb-editor-field div.buttonbar-div")
            .at(field_index)
            .child(Locator::TagName("button".to_string()))
            .nth(button_index)
    }

    async fn click_tab(&self, field_index: Option<usize>, button_index: usize) -> E2eResult<()> {
        self.wait_until_status_message_hidden().await?;
        let button = self.find(Self::tab_button(field_index, button_index)).await?;
        self.click(&button).await
    }

    pub async fn click_rich_text(&self, index: Option<usize>) -> E2eResult<&Self> {
        self.click_tab(index, RICH_TEXT_TAB).await?;
        self.wait_until_displayed(&ElementRef::css(".yui-editor-editable"), None)
            .await?;
        Ok(self)
    }

    pub async fn click_plain_text(&self, index: Option<usize>) -> E2eResult<&Self> {
        self.click_tab(index, HTML_TAB).await?;
        Ok(self)
    }

    pub async fn click_preview(&self, index: Option<usize>) -> E2eResult<&Self> {
        self.click_tab(index, PREVIEW_TAB).await?;
        Ok(self)
    }

    async fn assert_tab_selected(&self, field_index: Option<usize>, button_index: usize) -> E2eResult<()> {
        self.wait_until_status_message_hidden().await?;
        let button = self.find(Self::tab_button(field_index, button_index)).await?;
        let class = self
            .driver()
            .attribute(&button, "class")
            .await?
            .unwrap_or_default();
        if !class.contains("selected") {
            return Err(E2eError::AssertionFailed(format!(
                "{} is not selected (class {:?})",
                button, class
            )));
        }
        Ok(())
    }

    pub async fn assert_editor_mode_is_html(&self, index: Option<usize>) -> E2eResult<&Self> {
        self.assert_tab_selected(index, HTML_TAB).await?;
        Ok(self)
    }

    pub async fn assert_editor_mode_is_rich_text(&self, index: Option<usize>) -> E2eResult<&Self> {
        self.assert_tab_selected(index, RICH_TEXT_TAB).await?;
        Ok(self)
    }

    /// Click the toolbar link that inserts a custom tag.
    pub async fn click_rte_add_custom_tag(&self, button_text: &str, index: usize) -> E2eResult<&Self> {
        let link = self
            .find_element_by_link_text(button_text, Some(index))
            .await?;
        self.click(&link).await?;
        Ok(self)
    }

    /// The custom tag lightbox, entered once its Close and Save links show.
    fn lightbox(&self) -> FrameRegion<'_> {
        FrameRegion::new(self.session(), ElementRef::css(LIGHTBOX_FRAME))
            .when_displayed_inside(ElementRef::partial_link_text("Close"))
            .when_displayed_inside(ElementRef::partial_link_text("Save"))
    }

    pub async fn set_rte_lightbox_field(&self, field_css_selector: &str, value: &str) -> E2eResult<&Self> {
        self.lightbox()
            .run(|| async {
                let field = self
                    .find_element_by_css_selector(field_css_selector, None)
                    .await?;
                self.fill(&field, value).await
            })
            .await?;
        Ok(self)
    }

    pub async fn ensure_rte_lightbox_field_has_value(
        &self,
        field_css_selector: &str,
        value: &str,
    ) -> E2eResult<&Self> {
        self.lightbox()
            .run(|| async {
                let field = self
                    .find_element_by_css_selector(field_css_selector, None)
                    .await?;
                let shown = self.driver().attribute(&field, "value").await?;
                expect_equal(field_css_selector, Some(value), shown.as_deref())
            })
            .await?;
        Ok(self)
    }

    /// Save the lightbox and wait for it to hide.
    pub async fn click_rte_save(&self) -> E2eResult<&Self> {
        self.lightbox().run(|| self.click_link("Save")).await?;

        let driver = self.driver();
        let modal = &ElementRef::id("modal-editor");
        self.session()
            .wait_until("lightbox to hide", move || async move {
                let class = driver.attribute(modal, "class").await?.unwrap_or_default();
                Ok(class.contains("hidden"))
            })
            .await?;
        Ok(self)
    }

    /// Type at the start of the rich-text body.
    pub async fn send_rte_text(&self, text: &str) -> E2eResult<&Self> {
        let body = self
            .find_element_by_css_selector(".yui-editor-editable", None)
            .await?;
        self.driver().send_keys(&body, text).await?;
        Ok(self)
    }

    pub async fn doubleclick_rte_element(&self, elt_css_selector: &str, index: usize) -> E2eResult<&Self> {
        FrameRegion::new(
            self.session(),
            ElementRef::css(".yui-editor-editable").nth(index),
        )
        .run(|| async {
            let target = self
                .find_element_by_css_selector(elt_css_selector, None)
                .await?;
            self.driver().double_click(&target).await
        })
        .await?;
        Ok(self)
    }

    /// Wait for the preview to render, then match its markup.
    pub async fn ensure_preview_document_matches_regex(
        &self,
        pattern: &str,
        index: Option<usize>,
    ) -> E2eResult<&Self> {
        let regex = Regex::new(pattern)?;

        let driver = self.driver();
        let spinner = &ElementRef::css("div.preview-editor div.ajax-spinner").at(index);
        self.session()
            .wait_until("preview spinner to close", move || async move {
                Ok(!driver.is_displayed(spinner).await?)
            })
            .await?;

        let preview = ElementRef::css("div.preview-editor iframe").at(index);
        let html = FrameRegion::new(self.session(), preview)
            .run(|| self.driver().page_source())
            .await?;
        if !regex.is_match(&html) {
            return Err(E2eError::AssertionFailed(format!(
                "preview does not match {:?}: {}",
                pattern, html
            )));
        }
        Ok(self)
    }

    async fn rte_contents(&self) -> E2eResult<String> {
        let textarea = self
            .find_element_by_css_selector("div.cb-editor-field div.rte-div textarea", None)
            .await?;
        Ok(self
            .driver()
            .attribute(&textarea, "value")
            .await?
            .unwrap_or_default())
    }

    pub async fn ensure_instanceid_count_equals(&self, value: usize) -> E2eResult<&Self> {
        let ids = instance_ids(&self.rte_contents().await?);
        expect_equal("instance id count", value, ids.len())?;
        Ok(self)
    }

    /// Remember the custom tag instance ids currently in the body.
    pub async fn take_snapshot_of_instanceid_list(&mut self) -> E2eResult<Vec<String>> {
        self.instanceid_snapshot = instance_ids(&self.rte_contents().await?);
        Ok(self.instanceid_snapshot.clone())
    }

    pub async fn ensure_instanceid_list_matches_last_snapshot(&self) -> E2eResult<&Self> {
        let ids = instance_ids(&self.rte_contents().await?);
        expect_equal("instance ids", &self.instanceid_snapshot, &ids)?;
        Ok(self)
    }

    pub async fn ensure_lesson_body_textarea_matches_regex(&self, pattern: &str) -> E2eResult<&Self> {
        let regex = Regex::new(pattern)?;
        let contents = self.rte_contents().await?;
        if !regex.is_match(&contents) {
            return Err(E2eError::AssertionFailed(format!(
                "lesson body does not match {:?}: {}",
                pattern, contents
            )));
        }
        Ok(self)
    }

    pub async fn set_pre_assessment(&self, assessment_name: &str) -> E2eResult<&Self> {
        self.select("pre_assessment", assessment_name).await
    }

    pub async fn set_post_assessment(&self, assessment_name: &str) -> E2eResult<&Self> {
        self.select("post_assessment", assessment_name).await
    }

    pub async fn set_questions_are_scored(&self) -> E2eResult<&Self> {
        self.select("scored", "Questions are scored").await
    }

    pub async fn set_questions_give_feedback(&self) -> E2eResult<&Self> {
        self.select("scored", "Questions only give feedback").await
    }

    async fn select(&self, name: &str, visible_text: &str) -> E2eResult<&Self> {
        let select = self.find_element_by_name(name).await?;
        self.driver()
            .select_by_visible_text(&select, visible_text)
            .await?;
        Ok(self)
    }

    pub async fn set_contents_on_one_page(&self, setting: bool) -> E2eResult<&Self> {
        let mut label = None;
        for candidate in self.find_all(&ElementRef::tag_name("label")).await? {
            if self.text_of(&candidate).await? == "Show Contents on One Page" {
                label = Some(candidate);
                break;
            }
        }
        let label = label.ok_or_else(|| {
            E2eError::NoSuchElement("label \"Show Contents on One Page\"".to_string())
        })?;
        let checkbox = label
            .parent_element()
            .parent_element()
            .child_css("input[type=\"checkbox\"]");
        if self.driver().is_selected(&checkbox).await? != setting {
            self.click(&checkbox).await?;
        }
        Ok(self)
    }

    /// Switch from the settings pane to the content pane.
    pub async fn select_content(&self) -> E2eResult<&Self> {
        self.toggle_settings(true).await
    }

    pub async fn select_settings(&self) -> E2eResult<&Self> {
        self.toggle_settings(false).await
    }

    async fn toggle_settings(&self, expect_checked: bool) -> E2eResult<&Self> {
        let button = self
            .find_element_by_css_selector(".togglebutton.md-settings", None)
            .await?;
        let checked = self
            .driver()
            .is_selected(&button.child_css("input[type=\"checkbox\"]"))
            .await?;
        expect_equal("settings toggle checked", expect_checked, checked)?;
        self.click(&button).await?;
        Ok(self)
    }

    pub async fn click_close(&self) -> E2eResult<DashboardPage> {
        self.close().await?;
        Ok(DashboardPage::new(self.session().clone()))
    }
}

impl Deref for CourseContentEditor {
    type Target = EditorPage;

    fn deref(&self) -> &EditorPage {
        &self.editor
    }
}

/// The `instanceid` attribute values in a rich-text body, in order.
pub fn instance_ids(html: &str) -> Vec<String> {
    html.split(" instanceid=\"")
        .skip(1)
        .map(|rest| rest.split('"').next().unwrap_or_default().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_ids_in_order() {
        let html = r#"<p>intro</p><gcb-youtube instanceid="Ab12" videoid="x"></gcb-youtube>
<gcb-markdown instanceid="Zz9"></gcb-markdown><div data-instanceid="no"></div>"#;
        assert_eq!(instance_ids(html), vec!["Ab12", "Zz9"]);
        assert!(instance_ids("<p>plain</p>").is_empty());
    }

    #[test]
    fn test_tab_button_path() {
        assert_eq!(
            CourseContentEditor::tab_button(Some(1), HTML_TAB).to_string(),
            "css \"div.cb-editor-field div.buttonbar-div\"[1] > tag \"button\"[1]"
        );
    }
}
