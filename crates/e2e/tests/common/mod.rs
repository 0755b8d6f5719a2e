//! A scripted in-memory driver for page object tests.
//!
//! Elements are registered under the display form of their reference with
//! every unset index read as `0`, so `css "a"` and `css "a"[0]` name the same
//! element. Every gesture is appended to an action log.

#![allow(dead_code)]

use async_trait::async_trait;
use courseware_e2e::{BrowserSession, Driver, E2eError, E2eResult, ElementRef, LoadRetry, WaitConfig};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

pub const BAR: &str = "gcb-butterbar-message";

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub text: String,
    pub attrs: HashMap<String, String>,
    pub displayed: bool,
}

impl FakeElement {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            attrs: HashMap::new(),
            displayed: true,
        }
    }

    pub fn hidden() -> Self {
        Self {
            displayed: false,
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }
}

type Effect = Arc<dyn Fn(&mut FakeState) + Send + Sync>;

#[derive(Default)]
pub struct FakeState {
    pub url: String,
    pub history: Vec<String>,
    pub sources: VecDeque<String>,
    pub source: String,
    pub elements: HashMap<String, FakeElement>,
    pub actions: Vec<String>,
    pub frames: Vec<String>,
    pub scripts: HashMap<String, Value>,
    /// Message of the dialog currently open
    pub alert: Option<String>,
    effects: HashMap<String, Effect>,
}

impl FakeState {
    pub fn set(&mut self, element: &ElementRef, value: FakeElement) {
        self.elements.insert(key(element), value);
    }

    pub fn set_text(&mut self, element: &ElementRef, text: &str) {
        self.elements.entry(key(element)).or_default().text = text.to_string();
    }

    fn get(&self, element: &ElementRef) -> E2eResult<&FakeElement> {
        self.elements
            .get(&key(element))
            .ok_or_else(|| E2eError::NoSuchElement(element.to_string()))
    }
}

/// Display form of `element` with unset indexes read as the first match.
pub fn key(element: &ElementRef) -> String {
    fn normalize(element: &ElementRef) -> ElementRef {
        ElementRef {
            locator: element.locator.clone(),
            index: Some(element.index.unwrap_or(0)),
            parent: element.parent.as_ref().map(|p| Box::new(normalize(p))),
        }
    }
    normalize(element).to_string()
}

#[derive(Clone, Default)]
pub struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, element: ElementRef, value: FakeElement) -> Self {
        self.state.lock().set(&element, value);
        self
    }

    /// An editor page whose status bar has already been dismissed.
    pub fn with_hidden_butter_bar(self) -> Self {
        self.with(ElementRef::id(BAR), FakeElement::hidden())
    }

    /// Documents served by successive `goto` calls; the last one sticks.
    pub fn with_sources(self, sources: &[&str]) -> Self {
        self.state
            .lock()
            .sources
            .extend(sources.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_script_result(self, script: &str, result: Value) -> Self {
        self.state.lock().scripts.insert(script.to_string(), result);
        self
    }

    /// Run `effect` whenever `element` is clicked.
    pub fn on_click<F>(self, element: ElementRef, effect: F) -> Self
    where
        F: Fn(&mut FakeState) + Send + Sync + 'static,
    {
        self.state.lock().effects.insert(key(&element), Arc::new(effect));
        self
    }

    pub fn update<F: FnOnce(&mut FakeState)>(&self, change: F) {
        change(&mut *self.state.lock());
    }

    pub fn actions(&self) -> Vec<String> {
        self.state.lock().actions.clone()
    }

    pub fn frames(&self) -> Vec<String> {
        self.state.lock().frames.clone()
    }

    pub fn history(&self) -> Vec<String> {
        self.state.lock().history.clone()
    }

    /// A session over this driver with short waits and instant retries.
    pub fn session(&self) -> BrowserSession {
        BrowserSession::new(Arc::new(self.clone()))
            .with_wait(WaitConfig::new(
                Duration::from_millis(300),
                Duration::from_millis(5),
            ))
            .with_load_retry(LoadRetry {
                attempts: 3,
                delay: Duration::ZERO,
            })
    }

    fn record(&self, element: &ElementRef, action: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.get(element)?;
        let action = format!("{} {}", action, key(element));
        state.actions.push(action);
        Ok(())
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.url = url.to_string();
        state.history.push(url.to_string());
        state.frames.clear();
        if let Some(source) = state.sources.pop_front() {
            state.source = source;
        }
        Ok(())
    }

    async fn back(&self) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.history.pop();
        state.url = state.history.last().cloned().unwrap_or_default();
        state.actions.push("back".to_string());
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        Ok(self.state.lock().url.clone())
    }

    async fn page_source(&self) -> E2eResult<String> {
        Ok(self.state.lock().source.clone())
    }

    async fn count(&self, element: &ElementRef) -> E2eResult<usize> {
        let state = self.state.lock();
        let mut n = 0;
        while state
            .elements
            .contains_key(&key(&element.clone().nth(n)))
        {
            n += 1;
        }
        Ok(n)
    }

    async fn click(&self, element: &ElementRef) -> E2eResult<()> {
        self.record(element, "click")?;
        let mut state = self.state.lock();
        if let Some(effect) = state.effects.get(&key(element)).cloned() {
            effect(&mut *state);
        }
        Ok(())
    }

    async fn double_click(&self, element: &ElementRef) -> E2eResult<()> {
        self.record(element, "double_click")
    }

    async fn clear(&self, element: &ElementRef) -> E2eResult<()> {
        self.record(element, "clear")
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> E2eResult<()> {
        self.record(element, &format!("send_keys {:?} to", text))
    }

    async fn submit(&self, element: &ElementRef) -> E2eResult<()> {
        self.record(element, "submit")
    }

    async fn select_by_visible_text(&self, element: &ElementRef, text: &str) -> E2eResult<()> {
        self.record(element, &format!("select {:?} in", text))
    }

    async fn text(&self, element: &ElementRef) -> E2eResult<String> {
        Ok(self.state.lock().get(element)?.text.clone())
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> E2eResult<Option<String>> {
        Ok(self.state.lock().get(element)?.attrs.get(name).cloned())
    }

    async fn is_displayed(&self, element: &ElementRef) -> E2eResult<bool> {
        Ok(self.state.lock().get(element)?.displayed)
    }

    async fn execute_script(&self, script: &str) -> E2eResult<Value> {
        let mut state = self.state.lock();
        state.actions.push(format!("script {}", script));
        Ok(state.scripts.get(script).cloned().unwrap_or(Value::Null))
    }

    async fn switch_to_frame(&self, frame: &ElementRef) -> E2eResult<()> {
        self.record(frame, "enter")?;
        self.state.lock().frames.push(key(frame));
        Ok(())
    }

    async fn switch_to_default_content(&self) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.frames.clear();
        state.actions.push("leave frames".to_string());
        Ok(())
    }

    async fn alert_text(&self) -> E2eResult<Option<String>> {
        Ok(self.state.lock().alert.clone())
    }

    async fn accept_alert(&self) -> E2eResult<()> {
        let mut state = self.state.lock();
        let message = state.alert.take().ok_or(E2eError::NoSuchAlert)?;
        state.actions.push(format!("accept alert {:?}", message));
        Ok(())
    }
}
