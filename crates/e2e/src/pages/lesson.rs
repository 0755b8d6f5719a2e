//! Lesson and assessment pages as a student sees them.

use serde_json::Value;
use std::time::Duration;

use super::{get_codemirror_script, set_codemirror_script, RootPage};
use crate::driver::ElementRef;
use crate::error::{expect_equal, E2eError, E2eResult};
use crate::frame::FrameRegion;

const CORRECT_FEEDBACK: &str = "Yes, the answer is correct.";
const INCORRECT_FEEDBACK: &str = "No, the answer is incorrect.";

page_object!(
    /// A unit page showing lesson content and embedded question batches
    LessonPage
);

/// Where submitting a question batch leads.
pub enum BatchSubmission {
    /// Lesson batches grade in place.
    Lesson(LessonPage),
    Assessment(AssessmentConfirmationPage),
}

impl LessonPage {
    /// The standalone multiple choice question in `batch` whose text is
    /// `question_text`.
    pub async fn find_question(&self, batch: &str, question_text: &str) -> E2eResult<ElementRef> {
        let questions = self
            .find_all(&ElementRef::css(format!(
                "[data-question-batch-id=\"{}\"] .qt-mc-question.qt-standalone",
                batch
            )))
            .await?;
        if questions.is_empty() {
            return Err(E2eError::AssertionFailed(format!(
                "no questions in batch {:?}",
                batch
            )));
        }
        for question in questions {
            if self.text_of(&question.child_css(".qt-question")).await? == question_text {
                return Ok(question);
            }
        }
        Err(E2eError::AssertionFailed(format!(
            "no question in batch {:?} matched {:?}",
            batch, question_text
        )))
    }

    pub async fn set_answer_for_mc_question(
        &self,
        batch: &str,
        question_text: &str,
        answer: &str,
    ) -> E2eResult<&Self> {
        let question = self.find_question(batch, question_text).await?;
        for choice in self.find_all(&question.child_css(".qt-choices > *")).await? {
            if self.text_of(&choice).await? == answer {
                self.click(&choice.child_css("input[type=\"radio\"]")).await?;
                return Ok(self);
            }
        }
        Err(E2eError::AssertionFailed(format!(
            "no answer to question {:?} in batch {:?} matched {:?}",
            question_text, batch, answer
        )))
    }

    /// Click the check-answer button of `batch` whose label contains
    /// `button_text`. Batches whose id starts with `L` belong to lessons.
    pub async fn submit_question_batch(&self, batch: &str, button_text: &str) -> E2eResult<BatchSubmission> {
        let buttons = self
            .find_all(&ElementRef::css(format!(
                "div[data-question-batch-id=\"{}\"] .qt-check-answer-button",
                batch
            )))
            .await?;
        for button in buttons {
            if self.text_of(&button).await?.contains(button_text) {
                self.click(&button).await?;
                let session = self.session().clone();
                return Ok(if batch.starts_with('L') {
                    BatchSubmission::Lesson(LessonPage::new(session))
                } else {
                    BatchSubmission::Assessment(AssessmentConfirmationPage::new(session))
                });
            }
        }
        Err(E2eError::AssertionFailed(format!(
            "no button found matching {:?}",
            button_text
        )))
    }

    pub async fn verify_correct_submission(&self, batch: &str, question_text: &str) -> E2eResult<&Self> {
        self.verify_feedback(batch, question_text, CORRECT_FEEDBACK).await
    }

    pub async fn verify_incorrect_submission(&self, batch: &str, question_text: &str) -> E2eResult<&Self> {
        self.verify_feedback(batch, question_text, INCORRECT_FEEDBACK).await
    }

    async fn verify_feedback(&self, batch: &str, question_text: &str, expected: &str) -> E2eResult<&Self> {
        let question = self.find_question(batch, question_text).await?;
        let shown = self.text_of(&question.child_css(".qt-feedback")).await?;
        expect_equal("feedback", expected, shown.as_str())?;
        Ok(self)
    }

    pub async fn verify_correct_grading(&self, batch: &str) -> E2eResult<&Self> {
        self.verify_grade(batch, "Your score is: 1/1").await
    }

    pub async fn verify_incorrect_grading(&self, batch: &str) -> E2eResult<&Self> {
        self.verify_grade(batch, "Your score is: 0/1").await
    }

    async fn verify_grade(&self, batch: &str, expected: &str) -> E2eResult<&Self> {
        let report = self
            .find_element_by_css_selector(
                &format!(".qt-grade-report[data-question-batch-id=\"{}\"]", batch),
                None,
            )
            .await?;
        let shown = self.text_of(&report).await?;
        expect_equal("grade report", expected, shown.as_str())?;
        Ok(self)
    }

    pub async fn play_video(&self, instance_id: &str) -> E2eResult<&Self> {
        self.driver()
            .execute_script(&format!(
                "document.getElementById({}).play();",
                serde_json::to_string(instance_id)?
            ))
            .await?;
        // Let playback start before anything else happens.
        self.session().pause(Duration::from_secs(1)).await;
        Ok(self)
    }

    pub async fn pause_video(&self, instance_id: &str) -> E2eResult<&Self> {
        self.driver()
            .execute_script(&format!(
                "document.getElementById({}).pause();",
                serde_json::to_string(instance_id)?
            ))
            .await?;
        Ok(self)
    }

    /// Wait until the video element's `attribute` property equals `desired`.
    pub async fn wait_for_video_state(
        &self,
        instance_id: &str,
        attribute: &str,
        desired: Value,
        max_patience: Duration,
    ) -> E2eResult<&Self> {
        let script = format!(
            "return document.getElementById({})[{}];",
            serde_json::to_string(instance_id)?,
            serde_json::to_string(attribute)?
        );
        let driver = self.driver();
        let (script, desired) = (&script, &desired);
        self.session()
            .wait_until_within(
                max_patience,
                &format!("video {} {} to be {}", instance_id, attribute, desired),
                move || async move { Ok(driver.execute_script(script).await? == *desired) },
            )
            .await?;
        Ok(self)
    }

    /// Assert the lesson body text is exactly `expected`.
    pub async fn assert_lesson_content_contains(&self, expected: &str) -> E2eResult<&Self> {
        let body = self
            .find_element_by_css_selector(".gcb-lesson-content", None)
            .await?;
        let shown = self.text_of(&body).await?;
        expect_equal("lesson content", expected, shown.as_str())?;
        Ok(self)
    }

    pub async fn click_edit_lesson(&self, index: Option<usize>) -> E2eResult<&Self> {
        let edit = self
            .find_element_by_css_selector(".gcb-edit-lesson-button", index)
            .await?;
        self.click(&edit).await?;
        Ok(self)
    }

    /// The in-place editor iframe, entered once its spinner is hidden.
    fn edit_lesson_frame(&self, index: Option<usize>) -> FrameRegion<'_> {
        let editor = ElementRef::css("div.in-place-lesson-editor").at(index);
        FrameRegion::new(self.session(), editor.child_css("iframe"))
            .when_present(editor.child_css(".ajax-spinner.hidden"))
    }

    pub async fn edit_lesson_iframe_assert_equal_codemirror(
        &self,
        expected: &str,
        index: Option<usize>,
    ) -> E2eResult<&Self> {
        self.edit_lesson_frame(index)
            .run(|| async {
                let actual = self.driver().execute_script(&get_codemirror_script(0)).await?;
                expect_equal("lesson body", Some(expected), actual.as_str())
            })
            .await?;
        Ok(self)
    }

    pub async fn edit_lesson_iframe_setvalue_codemirror(
        &self,
        value: &str,
        index: Option<usize>,
    ) -> E2eResult<&Self> {
        let script = set_codemirror_script(0, value)?;
        self.edit_lesson_frame(index)
            .run(|| async {
                self.driver().execute_script(&script).await?;
                Ok(())
            })
            .await?;
        Ok(self)
    }

    /// Save the in-place editor and wait for it to close.
    pub async fn edit_lesson_iframe_click_save(&self, index: Option<usize>) -> E2eResult<&Self> {
        self.edit_lesson_frame(index)
            .run(|| async {
                self.click(&ElementRef::css(".inputEx-Button-Submit-Link"))
                    .await
            })
            .await?;

        let driver = self.driver();
        let editors = &ElementRef::css("div.in-place-lesson-editor");
        self.session()
            .wait_until("in-place editor to close", move || async move {
                Ok(driver.count(editors).await? == 0)
            })
            .await?;
        Ok(self)
    }
}

page_object!(
    /// The page shown after an assessment is submitted
    AssessmentConfirmationPage
);

impl AssessmentConfirmationPage {
    pub async fn verify_correct_submission(&self) -> E2eResult<&Self> {
        self.verify_score("Your score for this assessment is 100%").await
    }

    pub async fn verify_incorrect_submission(&self) -> E2eResult<&Self> {
        self.verify_score("Your score for this assessment is 0%").await
    }

    async fn verify_score(&self, expected: &str) -> E2eResult<&Self> {
        let heading = self
            .find_element_by_css_selector(".gcb-top-content[role=\"heading\"]", None)
            .await?;
        let shown = self.text_of(&heading).await?;
        if !shown.contains(expected) {
            return Err(E2eError::AssertionFailed(format!(
                "{:?} not found in {:?}",
                expected, shown
            )));
        }
        Ok(self)
    }

    pub async fn return_to_unit(&self) -> E2eResult<LessonPage> {
        self.click_link("Return to Unit").await?;
        Ok(LessonPage::new(self.session().clone()))
    }

    pub async fn click_course(&self) -> E2eResult<RootPage> {
        self.click_link("Course").await?;
        Ok(RootPage::new(self.session().clone()))
    }
}
