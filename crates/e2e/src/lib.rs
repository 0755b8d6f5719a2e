//! Courseware UI test harness
//!
//! This crate drives the Courseware web application in a real browser:
//! - Spawns the web server as a subprocess on a free port
//! - Controls headless Chrome over the DevTools protocol
//! - Models each screen as a page object with fluent, awaitable gestures
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Courseware UI tests (Rust)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ServerHandle        courseware-web subprocess + health     │
//! │  BrowserSession      Arc<dyn Driver> + WaitConfig + retry   │
//! │    └── ChromeDriver  chromiumoxide, frame stack, scripts    │
//! │  FrameRegion         enter iframe, always restore           │
//! │  pages::*            RootPage, DashboardPage, editors ...   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod chrome;
pub mod driver;
pub mod error;
pub mod frame;
pub mod pages;
pub mod server;
pub mod session;
pub mod wait;

pub use chrome::{ChromeConfig, ChromeDriver};
pub use driver::{Driver, ElementRef, Locator};
pub use error::{E2eError, E2eResult};
pub use frame::FrameRegion;
pub use server::{ServerConfig, ServerHandle};
pub use session::{BrowserSession, LoadRetry};
pub use wait::WaitConfig;
