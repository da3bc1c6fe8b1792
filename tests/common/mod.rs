#![allow(dead_code)]

pub mod app;
pub mod completion;
pub mod factory;

pub use app::{test_config, TestApp};
pub use completion::{FailingCacheStore, ScriptedCompletion};
pub use factory::Factory;
