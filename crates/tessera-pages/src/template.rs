//! Template store and template sources.
//!
//! - [`TemplateStore`]: cache of parsed templates keyed by component name,
//!   with include resolution and invalidation
//! - [`TemplateSource`]: where template text comes from
//! - [`MemoryTemplateSource`] / [`FileTemplateSource`]: bundled sources

pub mod source;
pub mod store;

pub use source::{FileTemplateSource, MemoryTemplateSource, TemplateSource};
pub use store::{TemplateLookup, TemplateStore};
pub use tessera_pages_ast::{Arg, Template, Token};
