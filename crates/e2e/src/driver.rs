//! Browser driver abstraction.
//!
//! Page objects talk to the browser only through [`Driver`]. Elements are
//! never held as live handles: an [`ElementRef`] is a description of how to
//! find an element (locator, position among duplicates, enclosing element),
//! and every operation resolves it afresh against the current document. This
//! keeps page objects valid across reloads and lets tests script the driver.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::error::E2eResult;

/// How an element is looked up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Locator {
    Css(String),
    Id(String),
    Name(String),
    LinkText(String),
    PartialLinkText(String),
    TagName(String),
    #[serde(rename = "xpath")]
    XPath(String),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(v) => write!(f, "css {:?}", v),
            Locator::Id(v) => write!(f, "id {:?}", v),
            Locator::Name(v) => write!(f, "name {:?}", v),
            Locator::LinkText(v) => write!(f, "link text {:?}", v),
            Locator::PartialLinkText(v) => write!(f, "partial link text {:?}", v),
            Locator::TagName(v) => write!(f, "tag {:?}", v),
            Locator::XPath(v) => write!(f, "xpath {:?}", v),
        }
    }
}

/// A resolvable reference to one element.
///
/// `index` picks among several matches (first when unset). `parent` scopes
/// the lookup to the descendants of another element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementRef {
    pub locator: Locator,
    pub index: Option<usize>,
    pub parent: Option<Box<ElementRef>>,
}

impl ElementRef {
    pub fn new(locator: Locator) -> Self {
        Self {
            locator,
            index: None,
            parent: None,
        }
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Locator::Css(selector.into()))
    }

    pub fn id(id: impl Into<String>) -> Self {
        Self::new(Locator::Id(id.into()))
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::new(Locator::Name(name.into()))
    }

    pub fn link_text(text: impl Into<String>) -> Self {
        Self::new(Locator::LinkText(text.into()))
    }

    pub fn partial_link_text(text: impl Into<String>) -> Self {
        Self::new(Locator::PartialLinkText(text.into()))
    }

    pub fn tag_name(tag: impl Into<String>) -> Self {
        Self::new(Locator::TagName(tag.into()))
    }

    /// The `index`-th match instead of the first.
    pub fn nth(self, index: usize) -> Self {
        self.at(Some(index))
    }

    pub fn at(mut self, index: Option<usize>) -> Self {
        self.index = index;
        self
    }

    /// An element looked up among the descendants of this one.
    pub fn child(&self, locator: Locator) -> ElementRef {
        ElementRef {
            locator,
            index: None,
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn child_css(&self, selector: impl Into<String>) -> ElementRef {
        self.child(Locator::Css(selector.into()))
    }

    pub fn parent_element(&self) -> ElementRef {
        self.child(Locator::XPath("..".to_string()))
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{} > ", parent)?;
        }
        write!(f, "{}", self.locator)?;
        if let Some(index) = self.index {
            write!(f, "[{}]", index)?;
        }
        Ok(())
    }
}

/// Operations a browser must support for the page objects.
///
/// Element operations fail with `NoSuchElement` when the reference does
/// not resolve. Lookups run against the document of the frame most
/// recently switched to.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Navigate the top-level document and leave any frame.
    async fn goto(&self, url: &str) -> E2eResult<()>;

    async fn back(&self) -> E2eResult<()>;

    async fn current_url(&self) -> E2eResult<String>;

    /// Serialized markup of the current document.
    async fn page_source(&self) -> E2eResult<String>;

    /// Number of elements matching the reference, ignoring its index.
    async fn count(&self, element: &ElementRef) -> E2eResult<usize>;

    async fn click(&self, element: &ElementRef) -> E2eResult<()>;

    async fn double_click(&self, element: &ElementRef) -> E2eResult<()>;

    async fn clear(&self, element: &ElementRef) -> E2eResult<()>;

    /// Type `text` into the element. For a rich-text frame the text goes to
    /// the start of its body.
    async fn send_keys(&self, element: &ElementRef, text: &str) -> E2eResult<()>;

    /// Submit the form the element belongs to.
    async fn submit(&self, element: &ElementRef) -> E2eResult<()>;

    async fn select_by_visible_text(&self, element: &ElementRef, text: &str) -> E2eResult<()>;

    /// Rendered text, trimmed.
    async fn text(&self, element: &ElementRef) -> E2eResult<String>;

    /// The element property of that name if it is a scalar, else the
    /// markup attribute.
    async fn attribute(&self, element: &ElementRef, name: &str) -> E2eResult<Option<String>>;

    async fn is_displayed(&self, element: &ElementRef) -> E2eResult<bool>;

    /// Run `script` as a function body in the current frame's window and
    /// return its result.
    async fn execute_script(&self, script: &str) -> E2eResult<Value>;

    async fn switch_to_frame(&self, frame: &ElementRef) -> E2eResult<()>;

    async fn switch_to_default_content(&self) -> E2eResult<()>;

    /// Message of the open alert or confirmation dialog, if any.
    async fn alert_text(&self) -> E2eResult<Option<String>>;

    /// Accept the open alert or confirmation dialog. Fails with
    /// `NoSuchAlert` when none is open.
    async fn accept_alert(&self) -> E2eResult<()>;

    async fn exists(&self, element: &ElementRef) -> E2eResult<bool> {
        Ok(self.count(element).await? > element.index.unwrap_or(0))
    }

    async fn is_selected(&self, element: &ElementRef) -> E2eResult<bool> {
        Ok(self.attribute(element, "checked").await?.as_deref() == Some("true"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_names_the_whole_path() {
        let choice = ElementRef::css(".mc-choice-text .editor-field-tabbar")
            .nth(2)
            .child(Locator::TagName("button".to_string()))
            .nth(1);
        assert_eq!(
            choice.to_string(),
            "css \".mc-choice-text .editor-field-tabbar\"[2] > tag \"button\"[1]"
        );
    }

    #[test]
    fn test_serializes_for_lookup_scripts() {
        let el = ElementRef::link_text("Save").child_css("span");
        assert_eq!(
            serde_json::to_value(&el).unwrap(),
            json!({
                "locator": {"by": "css", "value": "span"},
                "index": null,
                "parent": {
                    "locator": {"by": "link_text", "value": "Save"},
                    "index": null,
                    "parent": null,
                },
            })
        );
        assert_eq!(
            serde_json::to_value(ElementRef::id("x").parent_element()).unwrap()["locator"],
            json!({"by": "xpath", "value": ".."})
        );
    }
}
