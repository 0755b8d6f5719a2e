use std::time::Duration;

use super::content_editor::{
    CourseContentEditor, ASSESSMENT_CREATED, LESSON_CREATED, LINK_CREATED, UNIT_CREATED,
    UNIT_LOADED,
};
use super::editor::editor_page;
use super::{AdminPage, AnalyticsPage, AssetsPage, LessonPage, RootPage, SettingsPage, BUTTER_BAR};
use crate::driver::ElementRef;
use crate::error::{expect_equal, E2eError, E2eResult};

const ACTIVE_GROUP: &str = "gcb-active-group";

page_object!(
    /// The course dashboard with its collapsible menu groups
    DashboardPage
);

impl DashboardPage {
    pub async fn load(self, base_url: &str, course: &str) -> E2eResult<Self> {
        self.get(&format!("{}/{}/dashboard", base_url, course)).await?;
        Ok(self)
    }

    pub async fn verify_read_only_course(&self) -> E2eResult<&Self> {
        self.verify_status("Read-only course.").await
    }

    pub async fn verify_not_publicly_available(&self) -> E2eResult<&Self> {
        self.verify_status("The course is not publicly available.").await
    }

    async fn verify_status(&self, expected: &str) -> E2eResult<&Self> {
        let bar = self.find_element_by_id(BUTTER_BAR).await?;
        let shown = self.text_of(&bar).await?;
        expect_equal("status message", expected, shown.as_str())?;
        Ok(self)
    }

    pub async fn verify_selected_group(&self, group: &str) -> E2eResult<&Self> {
        let class = self.group_class(group).await?;
        if !class.contains(ACTIVE_GROUP) {
            return Err(E2eError::AssertionFailed(format!(
                "menu group {} is not selected (class {:?})",
                group, class
            )));
        }
        Ok(self)
    }

    pub fn find_menu_group(&self, name: &str) -> ElementRef {
        ElementRef::css(format!("#menu-group__{}", name))
    }

    async fn group_class(&self, name: &str) -> E2eResult<String> {
        let group = self.find(self.find_menu_group(name)).await?;
        Ok(self
            .driver()
            .attribute(&group, "class")
            .await?
            .unwrap_or_default())
    }

    /// Expand a menu group unless it is already open.
    pub async fn ensure_menu_group_is_open(&self, name: &str) -> E2eResult<&Self> {
        if !self.group_class(name).await?.contains(ACTIVE_GROUP) {
            let group = self.find_menu_group(name);
            self.click(&group.child_css(".gcb-collapse__button")).await?;
            let content = group.child_css(".gcb-collapse__content a");
            self.wait_until_displayed(&content, Some(Duration::from_secs(1)))
                .await?;
        }
        Ok(self)
    }

    pub async fn click_admin(&self) -> E2eResult<AdminPage> {
        self.open_menu_item("admin", "Courses").await?;
        Ok(AdminPage::new(self.session().clone()))
    }

    pub async fn click_import(&self) -> E2eResult<ImportPage> {
        self.click(&ElementRef::css("#import_course")).await?;
        ImportPage::open(self.session().clone()).await
    }

    pub async fn click_settings(&self) -> E2eResult<SettingsPage> {
        self.open_menu_item("settings", "Course").await?;
        SettingsPage::open(self.session().clone()).await
    }

    /// Open the analytics page listed under `name`.
    pub async fn click_analytics(&self, name: &str) -> E2eResult<AnalyticsPage> {
        self.open_menu_item("analytics", name).await?;
        Ok(AnalyticsPage::new(self.session().clone()))
    }

    pub async fn click_add_unit(&self) -> E2eResult<CourseContentEditor> {
        self.click(&ElementRef::css("#add_unit > button")).await?;
        CourseContentEditor::open(self.session().clone(), UNIT_CREATED).await
    }

    pub async fn click_edit_unit(&self, unit_title: &str) -> E2eResult<CourseContentEditor> {
        self.click_link(unit_title).await?;
        let edit = self.find_element_by_id("gcb-edit-unit-button").await?;
        self.click(&edit).await?;
        CourseContentEditor::open(self.session().clone(), UNIT_LOADED).await
    }

    pub async fn click_add_assessment(&self) -> E2eResult<CourseContentEditor> {
        self.click(&ElementRef::css("#add_assessment > button")).await?;
        CourseContentEditor::open(self.session().clone(), ASSESSMENT_CREATED).await
    }

    pub async fn click_add_link(&self) -> E2eResult<CourseContentEditor> {
        self.click(&ElementRef::css("#add_link > button")).await?;
        CourseContentEditor::open(self.session().clone(), LINK_CREATED).await
    }

    pub async fn click_add_lesson(&self) -> E2eResult<CourseContentEditor> {
        self.click(&ElementRef::css("div.course-outline li.add-lesson button"))
            .await?;
        CourseContentEditor::open(self.session().clone(), LESSON_CREATED).await
    }

    pub async fn click_edit_lesson(&self, lesson_index: usize) -> E2eResult<CourseContentEditor> {
        let edit = self
            .find_element_by_css_selector("div.row.lesson a.md-mode-edit", Some(lesson_index))
            .await?;
        self.click(&edit).await?;
        CourseContentEditor::open(self.session().clone(), "").await
    }

    pub async fn click_style(&self) -> E2eResult<AssetsPage> {
        self.open_menu_item("style", "CSS").await?;
        Ok(AssetsPage::new(self.session().clone()))
    }

    pub async fn click_edit(&self) -> E2eResult<AssetsPage> {
        self.open_menu_item("edit", "Outline").await?;
        Ok(AssetsPage::new(self.session().clone()))
    }

    pub async fn click_i18n(&self) -> E2eResult<&Self> {
        self.open_menu_item("publish", "Translations").await?;
        Ok(self)
    }

    async fn open_menu_item(&self, group: &str, link: &str) -> E2eResult<()> {
        self.ensure_menu_group_is_open(group).await?;
        self.click_link(link).await
    }

    pub async fn verify_course_outline_contains_unit(&self, unit_title: &str) -> E2eResult<&Self> {
        self.find_element_by_link_text(unit_title, None).await?;
        Ok(self)
    }

    pub async fn click_on_course_outline_components(&self, title: &str) -> E2eResult<LessonPage> {
        self.click_link(title).await?;
        Ok(LessonPage::new(self.session().clone()))
    }

    pub async fn click_course(&self) -> E2eResult<RootPage> {
        self.click(&ElementRef::css("div.course-outline div.course div.name a"))
            .await?;
        Ok(RootPage::new(self.session().clone()))
    }
}

editor_page!(
    /// The course import form
    ImportPage
);

impl ImportPage {
    pub async fn click_close(&self) -> E2eResult<DashboardPage> {
        self.close().await?;
        Ok(DashboardPage::new(self.session().clone()))
    }
}
