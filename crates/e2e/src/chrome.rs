//! [`Driver`] over headless Chrome.
//!
//! Every lookup is a script evaluated in the page: the script walks the
//! frame stack from the top-level document, resolves the target
//! [`ElementRef`] there and performs the action. References and arguments
//! are passed as JSON literals, never spliced into script text.
//!
//! Clicks and submits run deferred and stamp the top document. The driver
//! then waits on what followed: a JavaScript dialog, a navigation (until
//! a document without the stamp has loaded), or neither.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    EventFrameRequestedNavigation, EventJavascriptDialogOpening, FrameId,
    HandleJavaScriptDialogParams,
};
use chromiumoxide::listeners::EventStream;
use chromiumoxide::page::Page;
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::driver::{Driver, ElementRef};
use crate::error::{E2eError, E2eResult};
use crate::wait::{wait_for_result, WaitConfig};

/// Chrome launch settings
#[derive(Debug, Clone)]
pub struct ChromeConfig {
    pub headless: bool,
    pub window_size: (u32, u32),
    pub args: Vec<String>,
    /// Chrome executable; auto-detected when unset
    pub chrome_path: Option<String>,
    /// Launch attempts before giving up
    pub launch_attempts: usize,
    /// How long element lookups keep retrying while the element is absent
    pub implicit_wait: Duration,
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1600, 1000),
            args: vec![
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--disable-extensions".to_string(),
            ],
            chrome_path: None,
            launch_attempts: 10,
            implicit_wait: Duration::from_secs(2),
        }
    }
}

/// Prefix of the throwaway profile directories.
const PROFILE_PREFIX: &str = "courseware-e2e-";

/// A fresh browser profile, deleted when dropped. Parallel browsers must
/// not share one.
fn profile_dir() -> E2eResult<TempDir> {
    Ok(tempfile::Builder::new().prefix(PROFILE_PREFIX).tempdir()?)
}

impl ChromeConfig {
    fn to_browser_config(&self, profile: &TempDir) -> E2eResult<BrowserConfig> {
        let mut config = BrowserConfig::builder();
        if !self.headless {
            config = config.with_head();
        }
        config = config.window_size(self.window_size.0, self.window_size.1);
        config = config.arg(format!("--user-data-dir={}", profile.path().display()));

        for arg in &self.args {
            config = config.arg(arg.clone());
        }
        if let Some(path) = &self.chrome_path {
            config = config.chrome_executable(path.clone());
        }

        config.build().map_err(E2eError::BrowserLaunch)
    }
}

pub struct ChromeDriver {
    browser: tokio::sync::Mutex<Option<Browser>>,
    page: Page,
    events: Mutex<PageEvents>,
    frames: Mutex<Vec<ElementRef>>,
    implicit_wait: Duration,
    handler: JoinHandle<()>,
    // Declared last: the browser must be gone before its profile is removed.
    _profile: TempDir,
}

/// Page events that gestures wait on.
///
/// The handler task hands events to these streams before it resolves the
/// reply of any later command, so draining them right after a command
/// returns sees everything the page raised before that command ran.
struct PageEvents {
    dialogs: EventStream<EventJavascriptDialogOpening>,
    navigations: EventStream<EventFrameRequestedNavigation>,
    main_frame: Option<FrameId>,
    /// Message of the dialog blocking the page
    dialog: Option<String>,
    /// Navigations requested for the top document so far
    navigation_count: u64,
}

impl PageEvents {
    async fn listen(page: &Page) -> E2eResult<Self> {
        Ok(Self {
            dialogs: page.event_listener::<EventJavascriptDialogOpening>().await?,
            navigations: page.event_listener::<EventFrameRequestedNavigation>().await?,
            main_frame: page.mainframe().await?,
            dialog: None,
            navigation_count: 0,
        })
    }

    /// Fold in every event delivered so far, without waiting.
    fn drain(&mut self) {
        while let Some(Some(opened)) = self.dialogs.next().now_or_never() {
            debug!("Dialog opened: {:?}", opened.message);
            self.dialog = Some(opened.message.clone());
        }
        while let Some(Some(requested)) = self.navigations.next().now_or_never() {
            if self.main_frame.as_ref().map_or(true, |main| *main == requested.frame_id) {
                debug!("Navigation requested: {}", requested.url);
                self.navigation_count += 1;
            }
        }
    }
}

/// What a click or submit has led to so far.
#[derive(Debug, PartialEq, Eq)]
enum GestureState {
    /// A dialog blocks the page until it is handled.
    Dialog,
    /// The top document is being replaced.
    Navigating,
    /// The gesture ran without leaving the document.
    Done,
    Pending,
}

impl GestureState {
    /// `ran` is whether the deferred gesture is known to have run.
    fn classify(dialog_open: bool, navigated: bool, ran: bool) -> Self {
        if dialog_open {
            GestureState::Dialog
        } else if navigated {
            GestureState::Navigating
        } else if ran {
            GestureState::Done
        } else {
            GestureState::Pending
        }
    }
}

/// Longest a single page query may take while a gesture settles. A query
/// issued just as a dialog opens does not return until the dialog is gone.
const GESTURE_QUERY_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Deserialize)]
struct ScriptOutcome {
    #[serde(default)]
    value: Value,
    error: Option<String>,
}

impl ChromeDriver {
    /// Launch Chrome and open a blank page. Launching is retried, since
    /// the browser occasionally fails to come up on loaded CI machines.
    pub async fn launch(config: ChromeConfig) -> E2eResult<Self> {
        let attempts = config.launch_attempts.max(1);
        let mut attempt = 0;
        let (mut browser, mut handler, profile) = loop {
            attempt += 1;
            let profile = profile_dir()?;
            match Browser::launch(config.to_browser_config(&profile)?).await {
                Ok((browser, handler)) => break (browser, handler, profile),
                Err(e) if attempt < attempts => {
                    warn!("Chrome launch failed ({}), retrying {} more times", e, attempts - attempt);
                }
                Err(e) => return Err(E2eError::BrowserLaunch(e.to_string())),
            }
        };

        // chromiumoxide only makes progress while its handler is polled
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("Browser handler error: {}", e);
                }
            }
        });

        let (page, events) = match open_page(&browser).await {
            Ok(opened) => opened,
            Err(e) => {
                let _ = browser.close().await;
                handler.abort();
                return Err(e);
            }
        };
        info!("Chrome launched with profile {}", profile.path().display());

        Ok(Self {
            browser: tokio::sync::Mutex::new(Some(browser)),
            page,
            events: Mutex::new(events),
            frames: Mutex::new(Vec::new()),
            implicit_wait: config.implicit_wait,
            handler,
            _profile: profile,
        })
    }

    /// Close the browser.
    pub async fn close(&self) -> E2eResult<()> {
        if let Some(mut browser) = self.browser.lock().await.take() {
            debug!("Closing browser");
            browser.close().await?;
        }
        self.handler.abort();
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> E2eResult<ScriptOutcome> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| E2eError::Script(e.to_string()))?
            .into_value()
            .map_err(|e| E2eError::Script(e.to_string()))
    }

    /// Run `action` against `target` inside the current frame.
    async fn run(&self, target: Option<&ElementRef>, action: &str, arg: Value) -> E2eResult<Value> {
        let frames = self.frames.lock().clone();
        let script = lookup_script(&frames, target, action, &arg)?;
        let start = Instant::now();

        loop {
            let retry = match self.evaluate(&script).await {
                Ok(ScriptOutcome { error: None, value }) => return Ok(value),
                Ok(ScriptOutcome { error: Some(error), .. }) => {
                    let err = outcome_error(&error, &frames, target, &arg);
                    if error != "element" {
                        return Err(err);
                    }
                    err
                }
                // The execution context goes away while a navigation lands.
                Err(e) => e,
            };
            if start.elapsed() >= self.implicit_wait {
                return Err(retry);
            }
            sleep(Duration::from_millis(100)).await;
        }
    }

    async fn run_on(&self, target: &ElementRef, action: &str, arg: Value) -> E2eResult<Value> {
        self.run(Some(target), action, arg).await
    }

    /// Wait for the current document to finish loading.
    async fn settle(&self) -> E2eResult<()> {
        let this = self;
        wait_for_result(
            move || async move {
                let state = this.run(None, READY_STATE, Value::Null).await?;
                Ok(state.as_str() == Some("complete"))
            },
            WaitConfig::default(),
            "document ready",
        )
        .await
    }

    fn drain_events(&self) -> (bool, u64) {
        let mut events = self.events.lock();
        events.drain();
        (events.dialog.is_some(), events.navigation_count)
    }

    /// Run a deferred gesture script against `target` and wait for its
    /// outcome: a dialog ends the wait at once, a navigation of the top
    /// document is followed until the new document has loaded.
    async fn gesture(&self, target: &ElementRef, action: &str) -> E2eResult<()> {
        let stamp = uuid::Uuid::new_v4().to_string();
        let (_, before) = self.drain_events();
        self.run_on(target, action, Value::from(stamp.as_str())).await?;

        let ran_check = top_script(GESTURE_RAN, &stamp)?;
        let start = Instant::now();
        let mut seen_done = false;
        loop {
            let ran = match timeout(GESTURE_QUERY_TIMEOUT, self.evaluate(&ran_check)).await {
                Ok(Ok(outcome)) => outcome.value.as_bool() == Some(true),
                // The old document is going away, or a dialog holds the page.
                Ok(Err(_)) | Err(_) => false,
            };
            let (dialog_open, navigations) = self.drain_events();
            match GestureState::classify(dialog_open, navigations != before, ran) {
                GestureState::Dialog => return Ok(()),
                GestureState::Navigating => return self.wait_for_new_document(&stamp).await,
                // A form submission requests its navigation a task later.
                GestureState::Done if seen_done => return Ok(()),
                GestureState::Done => seen_done = true,
                GestureState::Pending => {}
            }
            if start.elapsed() >= self.implicit_wait {
                debug!("Gesture on {} has not run after {:?}", target, start.elapsed());
                return Ok(());
            }
            sleep(Duration::from_millis(20)).await;
        }
    }

    /// Wait until the document stamped with `stamp` has been replaced and
    /// its successor is loaded.
    async fn wait_for_new_document(&self, stamp: &str) -> E2eResult<()> {
        self.frames.lock().clear();
        let script = top_script(DOCUMENT_STATE, stamp)?;
        let this = self;
        let script = &script;
        wait_for_result(
            move || async move {
                let outcome = timeout(GESTURE_QUERY_TIMEOUT, this.evaluate(script))
                    .await
                    .map_err(|_| E2eError::Script("document did not answer".to_string()))??;
                Ok(outcome.value["stamped"] == Value::Bool(false)
                    && outcome.value["ready"].as_str() == Some("complete"))
            },
            WaitConfig::default(),
            "new document to load",
        )
        .await
    }
}

async fn open_page(browser: &Browser) -> E2eResult<(Page, PageEvents)> {
    let page = browser.new_page("about:blank").await?;
    let events = PageEvents::listen(&page).await?;
    Ok((page, events))
}

#[async_trait]
impl Driver for ChromeDriver {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.frames.lock().clear();
        self.page.goto(url).await?;
        self.settle().await
    }

    async fn back(&self) -> E2eResult<()> {
        self.frames.lock().clear();
        let stamp = uuid::Uuid::new_v4().to_string();
        self.evaluate(&top_script(GO_BACK, &stamp)?).await?;
        self.wait_for_new_document(&stamp).await
    }

    async fn current_url(&self) -> E2eResult<String> {
        let url: String = self
            .page
            .evaluate("window.location.href")
            .await?
            .into_value()?;
        Ok(url)
    }

    async fn page_source(&self) -> E2eResult<String> {
        let value = self.run(None, PAGE_SOURCE, Value::Null).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn count(&self, element: &ElementRef) -> E2eResult<usize> {
        let value = self.run(None, COUNT, serde_json::to_value(element)?).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn click(&self, element: &ElementRef) -> E2eResult<()> {
        self.gesture(element, CLICK).await
    }

    async fn double_click(&self, element: &ElementRef) -> E2eResult<()> {
        self.run_on(element, DOUBLE_CLICK, Value::Null).await?;
        Ok(())
    }

    async fn clear(&self, element: &ElementRef) -> E2eResult<()> {
        self.run_on(element, CLEAR, Value::Null).await?;
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> E2eResult<()> {
        self.run_on(element, SEND_KEYS, Value::from(text)).await?;
        Ok(())
    }

    async fn submit(&self, element: &ElementRef) -> E2eResult<()> {
        self.gesture(element, SUBMIT).await
    }

    async fn select_by_visible_text(&self, element: &ElementRef, text: &str) -> E2eResult<()> {
        self.run_on(element, SELECT, Value::from(text)).await?;
        Ok(())
    }

    async fn text(&self, element: &ElementRef) -> E2eResult<String> {
        let value = self.run_on(element, TEXT, Value::Null).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> E2eResult<Option<String>> {
        let value = self.run_on(element, ATTRIBUTE, Value::from(name)).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn is_displayed(&self, element: &ElementRef) -> E2eResult<bool> {
        let value = self.run_on(element, DISPLAYED, Value::Null).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn execute_script(&self, script: &str) -> E2eResult<Value> {
        self.run(None, EXECUTE, Value::from(script)).await
    }

    async fn switch_to_frame(&self, frame: &ElementRef) -> E2eResult<()> {
        self.run_on(frame, IS_FRAME, Value::Null).await?;
        self.frames.lock().push(frame.clone());
        Ok(())
    }

    async fn switch_to_default_content(&self) -> E2eResult<()> {
        self.frames.lock().clear();
        Ok(())
    }

    async fn alert_text(&self) -> E2eResult<Option<String>> {
        let mut events = self.events.lock();
        events.drain();
        Ok(events.dialog.clone())
    }

    async fn accept_alert(&self) -> E2eResult<()> {
        let message = {
            let mut events = self.events.lock();
            events.drain();
            events.dialog.take()
        };
        let message = message.ok_or(E2eError::NoSuchAlert)?;
        self.page
            .execute(HandleJavaScriptDialogParams::new(true))
            .await?;
        debug!("Accepted dialog {:?}", message);
        Ok(())
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

fn outcome_error(error: &str, frames: &[ElementRef], target: Option<&ElementRef>, arg: &Value) -> E2eError {
    let target = target.map(ToString::to_string).unwrap_or_else(|| "document".to_string());
    match error {
        "element" => E2eError::NoSuchElement(target),
        "frame" => E2eError::NoSuchFrame(
            frames
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" / "),
        ),
        "option" => E2eError::NoSuchOption {
            select: target,
            option: arg.as_str().unwrap_or_default().to_string(),
        },
        other => E2eError::Script(format!("{}: {}", target, other)),
    }
}

/// A script run in the top-level document with `stamp` bound to `arg`.
fn top_script(body: &str, stamp: &str) -> E2eResult<String> {
    Ok(format!(
        "(() => {{\nconst arg = {};\n{}\n}})()",
        serde_json::to_string(stamp)?,
        body
    ))
}

/// Wrap `action` with the frame walk and target lookup.
fn lookup_script(
    frames: &[ElementRef],
    target: Option<&ElementRef>,
    action: &str,
    arg: &Value,
) -> E2eResult<String> {
    Ok(format!(
        "(() => {{\n{locate}\nconst frames = {frames};\nconst target = {target};\nconst arg = {arg};\n{enter}\n{action}\n}})()",
        locate = LOCATE,
        frames = serde_json::to_string(frames)?,
        target = serde_json::to_string(&target)?,
        arg = serde_json::to_string(arg)?,
        enter = ENTER,
        action = action,
    ))
}

const LOCATE: &str = r#"
const candidates = (scope, locator) => {
  const q = (selector) => Array.from(scope.querySelectorAll(selector));
  switch (locator.by) {
    case 'css': return q(locator.value);
    case 'id': return q('[id]').filter((e) => e.id === locator.value);
    case 'name': return q('[name]').filter((e) => e.getAttribute('name') === locator.value);
    case 'link_text': return q('a').filter((e) => e.innerText.trim() === locator.value);
    case 'partial_link_text': return q('a').filter((e) => e.innerText.includes(locator.value));
    case 'tag_name': return q(locator.value);
    case 'xpath': {
      const owner = scope.ownerDocument || scope;
      const snapshot = owner.evaluate(locator.value, scope, null, 7, null);
      const found = [];
      for (let i = 0; i < snapshot.snapshotLength; i++) found.push(snapshot.snapshotItem(i));
      return found;
    }
  }
  return [];
};
const all = (doc, ref) => {
  const scope = ref.parent ? resolve(doc, ref.parent) : doc;
  return scope ? candidates(scope, ref.locator) : [];
};
const resolve = (doc, ref) => all(doc, ref)[ref.index ?? 0] ?? null;
"#;

const ENTER: &str = r#"
let win = window;
let doc = document;
for (const frame of frames) {
  const el = resolve(doc, frame);
  if (!el || !el.contentDocument) return { error: 'frame' };
  win = el.contentWindow;
  doc = el.contentDocument;
}
const el = target ? resolve(doc, target) : null;
if (target && !el) return { error: 'element' };
"#;

/// Takes the reference as `arg` so that a missing element counts as zero.
const COUNT: &str = "return { value: all(doc, arg).length };";

const READY_STATE: &str = "return { value: doc.readyState };";

const PAGE_SOURCE: &str = "return { value: doc.documentElement.outerHTML };";

// Gestures are deferred so that a dialog they open cannot block this
// script's reply. `arg` stamps the top document; the stamp's `ran` twin is
// set once the gesture has returned.
const CLICK: &str = r#"
el.scrollIntoView({ block: 'center' });
window.__coursewareDocument = arg;
setTimeout(() => { el.click(); window.__coursewareRan = arg; }, 0);
return { value: null };
"#;

const GESTURE_RAN: &str = "return { value: window.__coursewareRan === arg };";

const DOCUMENT_STATE: &str = r#"
return { value: { stamped: window.__coursewareDocument === arg, ready: document.readyState } };
"#;

const GO_BACK: &str = r#"
window.__coursewareDocument = arg;
history.back();
return { value: null };
"#;

const DOUBLE_CLICK: &str = r#"
el.dispatchEvent(new win.MouseEvent('dblclick', { bubbles: true, cancelable: true, view: win }));
return { value: null };
"#;

const CLEAR: &str = r#"
el.focus();
if ('value' in el) { el.value = ''; } else { el.textContent = ''; }
el.dispatchEvent(new win.Event('input', { bubbles: true }));
el.dispatchEvent(new win.Event('change', { bubbles: true }));
return { value: null };
"#;

const SEND_KEYS: &str = r#"
if (el.tagName === 'IFRAME') {
  const body = el.contentDocument && el.contentDocument.body;
  if (!body) return { error: 'frame' };
  body.insertAdjacentText('afterbegin', arg);
} else if ('value' in el) {
  el.focus();
  el.value = el.value + arg;
} else if (el.isContentEditable) {
  el.focus();
  el.insertAdjacentText('beforeend', arg);
} else {
  return { error: 'element is not editable' };
}
el.dispatchEvent(new win.Event('input', { bubbles: true }));
el.dispatchEvent(new win.Event('change', { bubbles: true }));
return { value: null };
"#;

const SUBMIT: &str = r#"
const form = el.form || el.closest('form');
if (!form) return { error: 'no enclosing form' };
window.__coursewareDocument = arg;
setTimeout(() => {
  if (form.requestSubmit) { form.requestSubmit(); } else { form.submit(); }
  window.__coursewareRan = arg;
}, 0);
return { value: null };
"#;

const SELECT: &str = r#"
const option = Array.from(el.options || []).find((o) => o.text.trim() === arg);
if (!option) return { error: 'option' };
option.selected = true;
el.dispatchEvent(new win.Event('change', { bubbles: true }));
return { value: null };
"#;

const TEXT: &str = "return { value: (el.innerText ?? el.textContent ?? '').trim() };";

const ATTRIBUTE: &str = r#"
const prop = arg === 'class' ? el.className : el[arg];
if (prop !== undefined && prop !== null && typeof prop !== 'object' && typeof prop !== 'function') {
  return { value: String(prop) };
}
return { value: el.getAttribute(arg) };
"#;

const DISPLAYED: &str = r#"
const style = win.getComputedStyle(el);
return { value: style.display !== 'none' && style.visibility !== 'hidden' && el.getClientRects().length > 0 };
"#;

const EXECUTE: &str = r#"
const result = win.Function(arg)();
return { value: result === undefined ? null : result };
"#;

const IS_FRAME: &str = r#"
if (!el.contentDocument) return { error: 'element is not a frame' };
return { value: null };
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments_are_json_literals() {
        let target = ElementRef::name("title");
        let script = lookup_script(&[], Some(&target), SEND_KEYS, &Value::from(r#"'); alert('x");"#))
            .unwrap();
        assert!(script.contains(r#"const arg = "'); alert('x");"#));
        assert!(script.contains(r#"const target = {"locator":{"by":"name","value":"title"},"index":null,"parent":null};"#));
        assert!(script.contains("const frames = [];"));
    }

    #[test]
    fn test_gesture_state_precedence() {
        assert_eq!(GestureState::classify(true, true, true), GestureState::Dialog);
        assert_eq!(GestureState::classify(false, true, true), GestureState::Navigating);
        assert_eq!(GestureState::classify(false, true, false), GestureState::Navigating);
        assert_eq!(GestureState::classify(false, false, true), GestureState::Done);
        assert_eq!(GestureState::classify(false, false, false), GestureState::Pending);
    }

    #[test]
    fn test_gestures_stamp_the_top_document() {
        let target = ElementRef::id("go");
        let stamp = Value::from("4f2c");
        for action in [CLICK, SUBMIT] {
            let script = lookup_script(&[], Some(&target), action, &stamp).unwrap();
            assert!(script.contains(r#"const arg = "4f2c";"#));
            assert!(script.contains("window.__coursewareDocument = arg;"));
            assert!(script.contains("window.__coursewareRan = arg;"));
        }

        let state = top_script(DOCUMENT_STATE, "4f2c").unwrap();
        assert!(state.starts_with("(() => {\nconst arg = \"4f2c\";"));
        assert!(state.contains("window.__coursewareDocument === arg"));
    }

    #[test]
    fn test_profile_dir_is_removed_on_drop() {
        let profile = profile_dir().unwrap();
        let path = profile.path().to_path_buf();
        assert!(path.is_dir());
        assert!(path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(PROFILE_PREFIX)));

        drop(profile);
        assert!(!path.exists());
    }

    #[test]
    fn test_unknown_outcome_is_script_error() {
        let target = ElementRef::id("go");
        let err = outcome_error("no enclosing form", &[], Some(&target), &Value::Null);
        assert_eq!(err.to_string(), "Script failed: id \"go\": no enclosing form");

        let err = outcome_error("option", &[], Some(&target), &Value::from("Public"));
        assert!(matches!(err, E2eError::NoSuchOption { option, .. } if option == "Public"));
    }
}
