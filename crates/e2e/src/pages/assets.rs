//! The assets tab and the editors reached from it: questions, labels and
//! uploaded files.

use std::ops::Deref;

use super::editor::editor_page;
use super::DashboardPage;
use crate::driver::{ElementRef, Locator};
use crate::error::{expect_equal, E2eError, E2eResult};
use crate::frame::FrameRegion;
use crate::session::BrowserSession;

page_object!(
    /// The dashboard's assets tab
    AssetsPage
);

impl AssetsPage {
    pub async fn click_sub_tab(&self, text: &str) -> E2eResult<&Self> {
        self.click_link(text).await?;
        Ok(self)
    }

    pub async fn click_upload(&self) -> E2eResult<AssetsEditorPage> {
        self.click(&ElementRef::css("#upload-button")).await?;
        AssetsEditorPage::open(self.session().clone()).await
    }

    /// Open the editor of an uploaded image from the edit icon beside its
    /// link.
    pub async fn click_edit_image(&self, name: &str) -> E2eResult<ImageEditorPage> {
        let link = self.find_element_by_link_text(name, None).await?;
        let edit = link.parent_element().child_css("a.md-mode-edit");
        self.click(&edit).await?;
        ImageEditorPage::open(self.session().clone()).await
    }

    pub async fn click_add_label(&self) -> E2eResult<LabelEditorPage> {
        self.click_link("Add Label").await?;
        LabelEditorPage::open(self.session().clone()).await
    }

    pub async fn verify_label_present(&self, title: &str) -> E2eResult<&Self> {
        self.find(label(title)).await?;
        Ok(self)
    }

    pub async fn verify_label_not_present(&self, title: &str) -> E2eResult<&Self> {
        if self.driver().exists(&label(title)).await? {
            return Err(E2eError::AssertionFailed(format!(
                "unexpectedly found label {}",
                title
            )));
        }
        Ok(self)
    }

    pub async fn click_edit_label(&self, title: &str) -> E2eResult<LabelEditorPage> {
        let entry = self.find(label(title)).await?;
        self.click(&entry).await?;
        LabelEditorPage::open(self.session().clone()).await
    }

    pub async fn click_add_short_answer(&self) -> E2eResult<ShortAnswerEditorPage> {
        self.click_link("Add Short Answer").await?;
        ShortAnswerEditorPage::open(self.session().clone()).await
    }

    pub async fn click_add_multiple_choice(&self) -> E2eResult<MultipleChoiceEditorPage> {
        self.click_link("Add Multiple Choice").await?;
        MultipleChoiceEditorPage::open(self.session().clone()).await
    }

    pub async fn click_add_question_group(&self) -> E2eResult<QuestionEditorPage> {
        self.click_link("Add Question Group").await?;
        QuestionEditorPage::open(self.session().clone()).await
    }

    pub async fn click_edit_short_answer(&self, _name: &str) -> E2eResult<ShortAnswerEditorPage> {
        Err(E2eError::NotImplemented("AssetsPage::click_edit_short_answer"))
    }

    pub async fn click_edit_mc_question(&self) -> E2eResult<MultipleChoiceEditorPage> {
        Err(E2eError::NotImplemented("AssetsPage::click_edit_mc_question"))
    }

    /// Check that a question with this description is listed.
    pub async fn verify_question_exists(&self, description: &str) -> E2eResult<&Self> {
        let cells = self
            .find_all(&ElementRef::css("#gcb-main-content tbody td"))
            .await?;
        for cell in &cells {
            if self.text_of(cell).await? == description {
                return Ok(self);
            }
        }
        Err(E2eError::AssertionFailed(format!(
            "{:?} not found among {} listed cells",
            description,
            cells.len()
        )))
    }

    pub async fn click_question_preview(&self) -> E2eResult<&Self> {
        let preview = self
            .find_element_by_css_selector("#gcb-main-content tbody td .md-visibility", None)
            .await?;
        self.click(&preview).await?;
        Ok(self)
    }

    /// Check the question text in the preview dialog, then close it.
    pub async fn verify_question_preview(&self, question_text: &str) -> E2eResult<&Self> {
        FrameRegion::new(self.session(), ElementRef::css("#modal-window iframe"))
            .run(|| async {
                let shown = self.text_of(&ElementRef::css(".qt-question")).await?;
                expect_equal("previewed question", question_text, shown.as_str())
            })
            .await?;
        self.click(&ElementRef::css("#modal-window .close-button")).await?;
        Ok(self)
    }

    pub async fn verify_image_file_by_name(&self, name: &str) -> E2eResult<&Self> {
        self.find_element_by_link_text(name, None).await?;
        Ok(self)
    }

    pub async fn verify_no_image_file_by_name(&self, name: &str) -> E2eResult<&Self> {
        self.wait_until_displayed(&ElementRef::id("upload-button"), None)
            .await?;
        if self.driver().exists(&ElementRef::link_text(name)).await? {
            return Err(E2eError::AssertionFailed(format!(
                "found file {} which should be absent",
                name
            )));
        }
        Ok(self)
    }

    pub async fn click_outline(&self) -> E2eResult<DashboardPage> {
        self.click_link("Outline").await?;
        Ok(DashboardPage::new(self.session().clone()))
    }
}

fn label(title: &str) -> ElementRef {
    ElementRef::id(format!("label_{}", title))
}

editor_page!(
    /// The file upload form
    AssetsEditorPage
);

impl AssetsEditorPage {
    /// Put a local file path into the file input.
    pub async fn select_file(&self, path: &str) -> E2eResult<&Self> {
        let input = self.find_element_by_name("file").await?;
        self.driver().send_keys(&input, path).await?;
        Ok(self)
    }

    /// Upload, then follow the redirect back to the assets list.
    pub async fn click_upload_and_expect_saved(&self) -> E2eResult<AssetsPage> {
        self.click_link("Upload").await?;
        self.expect_status_message_to_be("Saved.").await?;
        let driver = self.driver();
        self.session()
            .wait_until("title to contain \"Assets\"", move || async move {
                let title = driver.execute_script(DOCUMENT_TITLE).await?;
                Ok(title.as_str().is_some_and(|t| t.contains("Assets")))
            })
            .await?;
        Ok(AssetsPage::new(self.session().clone()))
    }

    pub async fn click_close(&self) -> E2eResult<DashboardPage> {
        self.close().await?;
        Ok(DashboardPage::new(self.session().clone()))
    }
}

const DOCUMENT_TITLE: &str = "return document.title;";

editor_page!(
    /// View and delete an uploaded image
    ImageEditorPage
);

impl ImageEditorPage {
    pub async fn click_delete(&self) -> E2eResult<&Self> {
        self.click_link("Delete").await?;
        Ok(self)
    }

    /// Accept the delete confirmation.
    pub async fn confirm_delete(&self) -> E2eResult<AssetsPage> {
        self.accept_alert().await?;
        Ok(AssetsPage::new(self.session().clone()))
    }
}

editor_page!(
    /// Create or edit a label
    LabelEditorPage
);

impl LabelEditorPage {
    pub async fn set_title(&self, text: &str) -> E2eResult<&Self> {
        let field = self.find_element_by_name("title").await?;
        self.fill(&field, text).await?;
        Ok(self)
    }

    pub async fn verify_title(&self, text: &str) -> E2eResult<&Self> {
        self.verify_value("title", text).await
    }

    pub async fn set_description(&self, description: &str) -> E2eResult<&Self> {
        let field = self.find_element_by_name("description").await?;
        self.fill(&field, description).await?;
        Ok(self)
    }

    pub async fn verify_description(&self, description: &str) -> E2eResult<&Self> {
        self.verify_value("description", description).await
    }

    async fn verify_value(&self, name: &str, expected: &str) -> E2eResult<&Self> {
        let field = self.find_element_by_name(name).await?;
        let value = self.driver().attribute(&field, "value").await?;
        expect_equal(&format!("label {}", name), Some(expected), value.as_deref())?;
        Ok(self)
    }

    /// Pick the label type by its position among the radio buttons.
    pub async fn set_type(&self, type_num: usize) -> E2eResult<&Self> {
        let radio = self.find(label_type(type_num)).await?;
        self.click(&radio).await?;
        Ok(self)
    }

    pub async fn verify_type(&self, type_num: usize) -> E2eResult<&Self> {
        let radio = self.find(label_type(type_num)).await?;
        if !self.driver().is_selected(&radio).await? {
            return Err(E2eError::AssertionFailed(format!(
                "label type {} is not checked",
                type_num
            )));
        }
        Ok(self)
    }

    pub async fn click_delete(&self) -> E2eResult<&Self> {
        self.click_link("Delete").await?;
        Ok(self)
    }

    pub async fn confirm_delete(&self) -> E2eResult<AssetsPage> {
        self.accept_alert().await?;
        Ok(AssetsPage::new(self.session().clone()))
    }

    pub async fn click_close(&self) -> E2eResult<AssetsPage> {
        self.close().await?;
        Ok(AssetsPage::new(self.session().clone()))
    }
}

fn label_type(type_num: usize) -> ElementRef {
    ElementRef::id(format!("_inputex_radioId{}", type_num))
}

editor_page!(
    /// Fields shared by the question and question group editors
    QuestionEditorPage
);

impl QuestionEditorPage {
    pub async fn set_question(&self, question: &str) -> E2eResult<&Self> {
        // Plain text entry
        let tab = self
            .find_element_by_css_selector(".mc-question .editor-field-tabbar button", Some(1))
            .await?;
        self.click(&tab).await?;
        self.setvalue_codemirror(0, question).await?;
        Ok(self)
    }

    pub async fn set_description(&self, description: &str) -> E2eResult<&Self> {
        let field = self.find_element_by_name("description").await?;
        self.fill(&field, description).await?;
        Ok(self)
    }

    pub async fn click_close(&self) -> E2eResult<AssetsPage> {
        self.close().await?;
        Ok(AssetsPage::new(self.session().clone()))
    }
}

pub struct MultipleChoiceEditorPage {
    question: QuestionEditorPage,
}

impl MultipleChoiceEditorPage {
    pub async fn open(session: BrowserSession) -> E2eResult<Self> {
        Ok(Self {
            question: QuestionEditorPage::open(session).await?,
        })
    }

    pub async fn click_add_a_choice(&self) -> E2eResult<&Self> {
        self.click_link("Add a choice").await?;
        Ok(self)
    }

    /// Set the text of choice `n` (from zero).
    pub async fn set_answer(&self, n: usize, answer: &str) -> E2eResult<&Self> {
        let tabbar = self
            .find_element_by_css_selector(".mc-choice-text .editor-field-tabbar", Some(n))
            .await?;
        let plain_text = tabbar.child(Locator::TagName("button".to_string())).nth(1);
        self.click(&plain_text).await?;
        // Instance 0 is the question body; each choice has text and feedback.
        self.setvalue_codemirror(2 * n + 1, answer).await?;
        Ok(self)
    }

    pub async fn click_allow_only_one_selection(&self) -> E2eResult<&Self> {
        Err(E2eError::NotImplemented(
            "MultipleChoiceEditorPage::click_allow_only_one_selection",
        ))
    }

    pub async fn click_allow_multiple_selections(&self) -> E2eResult<&Self> {
        Err(E2eError::NotImplemented(
            "MultipleChoiceEditorPage::click_allow_multiple_selections",
        ))
    }
}

impl Deref for MultipleChoiceEditorPage {
    type Target = QuestionEditorPage;

    fn deref(&self) -> &QuestionEditorPage {
        &self.question
    }
}

pub struct ShortAnswerEditorPage {
    question: QuestionEditorPage,
}

impl ShortAnswerEditorPage {
    pub async fn open(session: BrowserSession) -> E2eResult<Self> {
        Ok(Self {
            question: QuestionEditorPage::open(session).await?,
        })
    }

    pub async fn click_add_an_answer(&self) -> E2eResult<&Self> {
        self.click_link("Add an answer").await?;
        Ok(self)
    }

    pub async fn set_score(&self, n: usize, score: &str) -> E2eResult<&Self> {
        let field = self
            .find_element_by_name(&format!("graders[{}]score", n))
            .await?;
        self.fill(&field, score).await?;
        Ok(self)
    }

    pub async fn set_response(&self, n: usize, response: &str) -> E2eResult<&Self> {
        let field = self
            .find_element_by_name(&format!("graders[{}]response", n))
            .await?;
        self.fill(&field, response).await?;
        Ok(self)
    }

    pub async fn click_delete_this_answer(&self, _n: usize) -> E2eResult<&Self> {
        Err(E2eError::NotImplemented(
            "ShortAnswerEditorPage::click_delete_this_answer",
        ))
    }
}

impl Deref for ShortAnswerEditorPage {
    type Target = QuestionEditorPage;

    fn deref(&self) -> &QuestionEditorPage {
        &self.question
    }
}
