//! Provider adapter integration tests.

#[path = "adapters/local_test.rs"]
mod local_test;
#[path = "adapters/logger_test.rs"]
mod logger_test;
#[cfg(feature = "mailjet")]
#[path = "adapters/mailjet_test.rs"]
mod mailjet_test;
