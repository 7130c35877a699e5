//! Grok pattern engine
//!
//! A record mapping such as `%{LOGLEVEL:level} %{GREEDYDATA:message}` is
//! expanded against a library of named fragments into one regular expression,
//! then applied to every tailed line.
//!
//! # Flow
//! ```text
//! pattern files -> PatternLibrary -> GrokCompiler -> CompiledPattern -> FieldExtractor
//! ```
//!
//! # Example
//! ```
//! use tailgrok_log_pipeline::grok::{FieldExtractor, PatternLibrary};
//!
//! let library = PatternLibrary::builtin();
//! let extractor = FieldExtractor::from_definition(
//!     "%{LOGLEVEL:logLevel} %{GREEDYDATA:actualLoggingMessage}",
//!     &library,
//! )
//! .unwrap();
//!
//! let fields = extractor.extract("INFO my test message");
//! assert_eq!(fields["logLevel"], "INFO");
//! assert_eq!(fields["actualLoggingMessage"], "my test message");
//! ```

pub mod compiler;
pub mod extractor;
pub mod loader;

pub use compiler::{CompiledPattern, GrokCompiler};
pub use extractor::FieldExtractor;
pub use loader::PatternLibrary;
