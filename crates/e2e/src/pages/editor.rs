use std::ops::Deref;

use super::{get_codemirror_script, set_codemirror_script, PageObject, BUTTER_BAR};
use crate::driver::ElementRef;
use crate::error::{expect_equal, E2eResult};
use crate::session::BrowserSession;

/// A page hosting a schema-driven editor form.
pub struct EditorPage {
    base: PageObject,
}

impl EditorPage {
    /// Wait until the form has loaded: the status bar reports success or
    /// is no longer shown.
    pub async fn open(session: BrowserSession) -> E2eResult<Self> {
        let base = PageObject::new(session);
        let driver = base.driver();
        let bar = &ElementRef::id(BUTTER_BAR);
        base.session()
            .wait_until("editor to load", move || async move {
                Ok(driver.text(bar).await?.contains("Success") || !driver.is_displayed(bar).await?)
            })
            .await?;
        Ok(Self { base })
    }

    /// Choose the publication status, e.g. "Public" or "Private".
    pub async fn set_status(&self, status: &str) -> E2eResult<&Self> {
        let select = self.find_element_by_name("is_draft").await?;
        self.driver().select_by_visible_text(&select, status).await?;
        Ok(self)
    }

    pub async fn click_save(&self) -> E2eResult<&Self> {
        self.click_save_with("Save", "Saved").await
    }

    /// Click the `link_text` button and wait for `status_message`.
    pub async fn click_save_with(&self, link_text: &str, status_message: &str) -> E2eResult<&Self> {
        self.click_link(link_text).await?;
        self.expect_status_message_to_be(status_message).await?;
        Ok(self)
    }

    /// Click "Close". The caller builds the page it lands on.
    pub(crate) async fn close(&self) -> E2eResult<()> {
        self.click_link("Close").await
    }

    pub async fn setvalue_codemirror(&self, nth_instance: usize, code_body: &str) -> E2eResult<&Self> {
        self.driver()
            .execute_script(&set_codemirror_script(nth_instance, code_body)?)
            .await?;
        Ok(self)
    }

    pub async fn assert_equal_codemirror(&self, nth_instance: usize, expected: &str) -> E2eResult<&Self> {
        let actual = self
            .driver()
            .execute_script(&get_codemirror_script(nth_instance))
            .await?;
        expect_equal(
            &format!("CodeMirror {}", nth_instance),
            Some(expected),
            actual.as_str(),
        )?;
        Ok(self)
    }
}

impl Deref for EditorPage {
    type Target = PageObject;

    fn deref(&self) -> &PageObject {
        &self.base
    }
}

macro_rules! editor_page {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name {
            editor: $crate::pages::EditorPage,
        }

        impl $name {
            /// Wait for the editor form to load.
            pub async fn open(session: $crate::session::BrowserSession) -> $crate::error::E2eResult<Self> {
                Ok(Self {
                    editor: $crate::pages::EditorPage::open(session).await?,
                })
            }
        }

        impl std::ops::Deref for $name {
            type Target = $crate::pages::EditorPage;

            fn deref(&self) -> &Self::Target {
                &self.editor
            }
        }
    };
}

pub(crate) use editor_page;
