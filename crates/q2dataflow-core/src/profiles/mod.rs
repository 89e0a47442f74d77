//! Target description languages and their per-language capabilities.
//!
//! A [`LanguageProfile`] is everything the language-neutral parameter cases
//! need to know about a target: its reserved words, type names, literal
//! syntax, how file arguments are encoded, and how a whole tool document is
//! laid out.
//!
//! # Examples
//!
//! ```
//! use q2dataflow_core::profiles::{profile_for, Language};
//! use std::str::FromStr;
//!
//! let language = Language::from_str("CWL").unwrap();
//! assert_eq!(language, Language::Cwl);
//! assert_eq!(language.to_string(), "cwl");
//!
//! let profile = profile_for(language);
//! assert_eq!(profile.prefix(), "q2cwl_");
//! ```

pub mod cwl;
pub mod wdl;

// Internal imports (std, crate)
use std::fmt;
use std::str::FromStr;

use crate::case::DeclType;
use crate::template::ActionTemplate;

// External imports (alphabetized)
use serde_json::{Map, Value as JsonValue};

/// Supported description languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    /// Workflow Description Language 1.0
    #[default]
    Wdl,
    /// Common Workflow Language v1.0
    Cwl,
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wdl" => Ok(Language::Wdl),
            "cwl" => Ok(Language::Cwl),
            _ => Err(format!("Unknown language: {}", s)),
        }
    }
}

impl Language {
    /// Returns the language identifier as a string slice
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wdl => "wdl",
            Self::Cwl => "cwl",
        }
    }

    /// File extension of generated documents
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wdl => "wdl",
            Self::Cwl => "cwl",
        }
    }

    /// Returns an iterator over all supported languages
    pub fn all() -> impl Iterator<Item = Self> {
        [Language::Wdl, Language::Cwl].into_iter()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Language-specific rendering rules used by the parameter cases and templates
pub trait LanguageProfile {
    fn language(&self) -> Language;

    /// Prefix of every synthetic declaration name, e.g. `q2wdl_`
    fn prefix(&self) -> &'static str;

    fn is_keyword(&self, name: &str) -> bool;

    /// Name of a declaration type, without any optional marker
    fn type_name(&self, ty: &DeclType) -> String;

    /// Whether optional declarations that have a default are still marked optional
    fn marks_optional_with_default(&self) -> bool;

    /// Encode a file or directory path argument
    fn path_argument(&self, path: &str, ty: &DeclType) -> JsonValue;

    /// Key of a declaration in the argument file
    fn argument_key(&self, template: &ActionTemplate, name: &str) -> String;

    /// Render the complete tool document
    fn render_document(&self, template: &ActionTemplate) -> crate::Result<String>;

    /// Serialize an argument map in the language's argument file format
    fn dump_arguments(&self, arguments: &Map<String, JsonValue>) -> crate::Result<String>;

    /// Suffix of argument files, e.g. `inputs.json`
    fn arguments_suffix(&self) -> &'static str;

    /// Comment leader used for generated headers
    fn comment(&self) -> &'static str {
        "#"
    }

    /// Text placed before the header, e.g. an interpreter line
    fn preamble(&self) -> Option<&'static str> {
        None
    }

    /// Key the engine wraps runtime arguments in, if any
    fn runtime_envelope(&self) -> Option<&'static str> {
        None
    }

    fn reserved_prefix(&self) -> String {
        format!("{}reserved_", self.prefix())
    }

    fn metafile_prefix(&self) -> String {
        format!("{}metafile_", self.prefix())
    }

    fn collection_keys_prefix(&self) -> String {
        format!("{}collection_keys_", self.prefix())
    }

    /// Declaration name of a signature entry, rewritten when it is a keyword
    fn physical_name(&self, logical: &str) -> String {
        if self.is_keyword(logical) {
            format!("{}{}", self.reserved_prefix(), logical)
        } else {
            logical.to_string()
        }
    }

    /// Declared type including the optional marker
    fn type_label(&self, ty: &DeclType, optional: bool, has_default: bool) -> String {
        let marked = optional && (self.marks_optional_with_default() || !has_default);
        if marked {
            format!("{}?", self.type_name(ty))
        } else {
            self.type_name(ty)
        }
    }
}

/// Profile for a language
pub fn profile_for(language: Language) -> Box<dyn LanguageProfile> {
    match language {
        Language::Wdl => Box::new(wdl::WdlProfile),
        Language::Cwl => Box::new(cwl::CwlProfile),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("wdl".parse::<Language>().unwrap(), Language::Wdl);
        assert_eq!("Cwl".parse::<Language>().unwrap(), Language::Cwl);
        assert!("nextflow".parse::<Language>().is_err());
    }

    #[test]
    fn test_all() {
        let all: Vec<_> = Language::all().map(|l| l.as_str()).collect();
        assert_eq!(all, vec!["wdl", "cwl"]);
    }

    #[test]
    fn test_physical_name() {
        let wdl = profile_for(Language::Wdl);
        assert_eq!(wdl.physical_name("input"), "q2wdl_reserved_input");
        assert_eq!(wdl.physical_name("table"), "table");

        let cwl = profile_for(Language::Cwl);
        assert_eq!(cwl.physical_name("input"), "input");
    }

    #[test]
    fn test_optional_marker_rules() {
        let wdl = profile_for(Language::Wdl);
        assert_eq!(wdl.type_label(&DeclType::Bool, true, true), "Boolean?");
        assert_eq!(wdl.type_label(&DeclType::Str, false, false), "String");

        let cwl = profile_for(Language::Cwl);
        assert_eq!(cwl.type_label(&DeclType::Bool, true, true), "boolean");
        assert_eq!(cwl.type_label(&DeclType::Bool, true, false), "boolean?");
    }
}
