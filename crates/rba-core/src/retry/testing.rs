//! Shared fixtures for retry unit tests.

use std::fmt;

use super::classify::{Classify, ErrorKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestError {
    pub kind: &'static str,
    pub status: Option<u16>,
    pub message: String,
}

impl TestError {
    pub fn of(kind: &'static str) -> Self {
        Self::with_message(kind, kind)
    }

    pub fn http(code: u16) -> Self {
        Self {
            kind: "http",
            status: Some(code),
            message: format!("HTTP {}", code),
        }
    }

    pub fn with_message(kind: &'static str, message: &str) -> Self {
        Self {
            kind,
            status: None,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TestError {}

impl Classify for TestError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::new(self.kind)
    }

    fn status_code(&self) -> Option<u16> {
        self.status
    }
}
