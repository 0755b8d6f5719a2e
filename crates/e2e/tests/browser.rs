//! Tests that need a local Chrome and a built courseware-web binary.
//!
//! Run with: cargo test -p courseware-e2e --test browser -- --ignored

use courseware_e2e::{
    BrowserSession, ChromeConfig, ChromeDriver, Driver, ElementRef, FrameRegion, ServerConfig,
    ServerHandle,
};
use std::path::PathBuf;
use std::sync::Arc;

const PAGE: &str = "data:text/html,\
<p id='status'>Loading</p>\
<ul><li class='item'>One</li><li class='item'>Two</li></ul>\
<input name='title' value='draft'>\
<button id='go' onclick=\"document.getElementById('status').textContent='Saved'\">Go</button>\
<iframe srcdoc=\"<p class='inner'>Inside</p>\"></iframe>";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("courseware_e2e=debug"))
        .with_test_writer()
        .try_init();
}

async fn launch() -> (Arc<ChromeDriver>, BrowserSession) {
    init_tracing();
    let driver = Arc::new(ChromeDriver::launch(ChromeConfig::default()).await.unwrap());
    let session = BrowserSession::new(driver.clone());
    (driver, session)
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_chrome_element_operations() {
    let (driver, session) = launch().await;
    session.get(PAGE, false).await.unwrap();

    assert_eq!(driver.count(&ElementRef::css("li.item")).await.unwrap(), 2);
    assert_eq!(
        driver.text(&ElementRef::css("li.item").nth(1)).await.unwrap(),
        "Two"
    );
    assert!(!driver.exists(&ElementRef::css("li.item").nth(2)).await.unwrap());

    let title = ElementRef::name("title");
    driver.clear(&title).await.unwrap();
    driver.send_keys(&title, "final").await.unwrap();
    assert_eq!(
        driver.attribute(&title, "value").await.unwrap().as_deref(),
        Some("final")
    );

    driver.click(&ElementRef::id("go")).await.unwrap();
    assert_eq!(driver.text(&ElementRef::id("status")).await.unwrap(), "Saved");

    driver.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_chrome_frame_region_restores_top_document() {
    let (driver, session) = launch().await;
    session.get(PAGE, false).await.unwrap();

    let paragraph = ElementRef::css("p.inner");
    let inner = FrameRegion::new(&session, ElementRef::tag_name("iframe"))
        .when_displayed_inside(paragraph.clone())
        .run(|| driver.text(&paragraph))
        .await
        .unwrap();
    assert_eq!(inner, "Inside");

    assert!(driver.exists(&ElementRef::id("status")).await.unwrap());
    assert!(!driver.exists(&paragraph).await.unwrap());

    driver.close().await.unwrap();
}

const CONFIRM_PAGE: &str = "data:text/html,\
<p id='status'>Kept</p>\
<button id='delete' onclick=\"if (confirm('Delete this label?')) \
document.getElementById('status').textContent='Deleted'\">Delete</button>\
<a id='away' href='about:blank'>Away</a>";

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_chrome_accepts_confirmation_dialog() {
    let (driver, session) = launch().await;
    session.get(CONFIRM_PAGE, false).await.unwrap();
    assert!(matches!(
        driver.accept_alert().await,
        Err(courseware_e2e::E2eError::NoSuchAlert)
    ));

    driver.click(&ElementRef::id("delete")).await.unwrap();
    let page = courseware_e2e::pages::PageObject::new(session.clone());
    assert_eq!(page.switch_to_alert().await.unwrap(), "Delete this label?");
    driver.accept_alert().await.unwrap();

    page.wait_until_text_contains(&ElementRef::id("status"), "Deleted")
        .await
        .unwrap();
    assert_eq!(driver.alert_text().await.unwrap(), None);

    driver.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_chrome_click_waits_for_the_next_document() {
    let (driver, session) = launch().await;
    session.get(CONFIRM_PAGE, false).await.unwrap();

    driver.click(&ElementRef::id("away")).await.unwrap();
    assert_eq!(driver.current_url().await.unwrap(), "about:blank");
    assert!(!driver.exists(&ElementRef::id("status")).await.unwrap());

    driver.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a built courseware-web binary and Chrome"]
async fn test_server_health_in_browser() {
    let (driver, session) = launch().await;
    let server = ServerHandle::spawn(ServerConfig {
        binary_path: PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../target/debug/courseware-web"),
        ..ServerConfig::default()
    })
    .await
    .unwrap();

    session.get(&server.url("/api/health"), true).await.unwrap();
    assert!(driver.page_source().await.unwrap().contains("courseware-web"));

    driver.close().await.unwrap();
}
