//! Course home, login, registration and welcome pages.

use super::{AnnouncementsPage, DashboardPage, DEFAULT_LOGIN};
use crate::driver::ElementRef;
use crate::error::{E2eError, E2eResult};

page_object!(
    /// The course home page
    RootPage
);

impl RootPage {
    pub async fn load(self, base_url: &str) -> E2eResult<Self> {
        self.get(&format!("{}/", base_url)).await?;
        Ok(self)
    }

    /// Log in as an administrator and open the welcome page.
    pub async fn load_welcome_page(&self, base_url: &str) -> E2eResult<WelcomePage> {
        self.click_login().await?.login(DEFAULT_LOGIN, true).await?;
        self.get(&format!("{}/admin/welcome", base_url)).await?;
        Ok(WelcomePage::new(self.session().clone()))
    }

    pub async fn click_login(&self) -> E2eResult<LoginPage> {
        self.click_link("Login").await?;
        Ok(LoginPage::new(self.session().clone()))
    }

    pub async fn click_logout(&self) -> E2eResult<&Self> {
        self.click_link("Logout").await?;
        Ok(self)
    }

    pub async fn click_dashboard(&self) -> E2eResult<DashboardPage> {
        self.click_link("Dashboard").await?;
        Ok(DashboardPage::new(self.session().clone()))
    }

    pub async fn click_announcements(&self) -> E2eResult<AnnouncementsPage> {
        self.click_link("Announcements").await?;
        Ok(AnnouncementsPage::new(self.session().clone()))
    }

    pub async fn click_register(&self) -> E2eResult<RegisterPage> {
        self.click_link("Register").await?;
        Ok(RegisterPage::new(self.session().clone()))
    }
}

page_object!(
    /// The development login form
    LoginPage
);

impl LoginPage {
    pub async fn login(&self, email: &str, admin: bool) -> E2eResult<RootPage> {
        let field = self.find_element_by_id("email").await?;
        self.fill(&field, email).await?;
        if admin {
            let admin_box = self.find_element_by_id("admin").await?;
            self.click(&admin_box).await?;
        }
        let submit = self.find_element_by_id("submit-login").await?;
        self.click(&submit).await?;
        Ok(RootPage::new(self.session().clone()))
    }
}

page_object!(RegisterPage);

impl RegisterPage {
    pub async fn enroll(&self, name: &str) -> E2eResult<&Self> {
        let field = self.find_element_by_name("form01").await?;
        self.driver().send_keys(&field, name).await?;
        self.driver().submit(&field).await?;
        Ok(self)
    }

    pub async fn verify_enrollment(&self) -> E2eResult<&Self> {
        let text = self.text_of(&ElementRef::css(".gcb-top-content")).await?;
        if !text.contains("Thank you for registering") {
            return Err(E2eError::AssertionFailed(format!(
                "registration not confirmed, page says {:?}",
                text
            )));
        }
        Ok(self)
    }

    pub async fn click_course(&self) -> E2eResult<RootPage> {
        self.click_link("Course").await?;
        Ok(RootPage::new(self.session().clone()))
    }
}

page_object!(WelcomePage);

impl WelcomePage {
    pub async fn click_explore_sample_course(&self) -> E2eResult<DashboardPage> {
        let explore = self.find_element_by_id("explore").await?;
        self.click(&explore).await?;
        Ok(DashboardPage::new(self.session().clone()))
    }
}
