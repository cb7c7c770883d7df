//! Browser automation over the Chrome DevTools Protocol.
//!
//! The crate keeps one WebSocket per tab, multiplexes command/reply
//! pairs and event streams over it, and layers page navigation, element
//! finding and interaction, network introspection, dialog handling, and
//! iframe resolution on top.
//!
//! ```no_run
//! use chromepilot::{Criteria, FindElements, Tab};
//!
//! # async fn run() -> chromepilot::Result<()> {
//! let tab = Tab::connect("127.0.0.1", 9222).await?;
//! tab.go_to("https://example.com", None).await?;
//! let button = tab.find(Criteria::new().id("submit")).await?;
//! button.click_center().await?;
//! # Ok(())
//! # }
//! ```

pub mod cdp;
pub mod commands;
pub mod discovery;
pub mod element;
pub mod error;
pub mod finder;
mod iframe;
pub mod keyboard;
mod scripts;
pub mod tab;
pub mod utils;

pub use cdp::{Connection, ConnectionConfig, Event, ReconnectConfig};
pub use element::{ElementHandle, Rect};
pub use error::{Error, Result};
pub use finder::{By, Criteria, FindElements};
pub use tab::Tab;
