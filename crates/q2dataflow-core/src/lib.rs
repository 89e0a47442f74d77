//! q2dataflow Core Library
//!
//! This library turns plugin action signatures into tool templates for
//! workflow languages (WDL and CWL), and runs actions from the argument files
//! those tools produce.

pub mod builtins;
pub mod case;
pub mod classify;
pub mod config;
pub mod convert;
pub mod error;
pub mod profiles;
pub mod reformat;
pub mod registry;
pub mod runner;
pub mod signature;
pub mod store;
pub mod template;
pub mod utils;

pub use crate::{
    config::{ColumnIndexing, Settings},
    error::{Error, Result},
    profiles::{profile_for, Language, LanguageProfile},
    registry::{ActionRegistry, PluginRegistry},
    runner::{ActionBackend, ActionRunner, RunOptions},
    signature::{Action, Plugin, Signature, TypeDescriptor},
    store::{StatusEvent, TemplateStore},
    template::{make_action_template, ActionTemplate},
};
