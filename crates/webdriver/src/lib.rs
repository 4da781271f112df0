//! Walnut WebDriver
//!
//! A [`walnut_core::Driver`] implementation speaking the W3C WebDriver
//! protocol over HTTP. Works against chromedriver, geckodriver,
//! msedgedriver or a Selenium grid.

pub mod client;
pub mod protocol;

pub use client::WebDriverClient;
pub use protocol::{element_arg, ELEMENT_KEY};
