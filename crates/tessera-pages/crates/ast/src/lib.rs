//! Template token stream for tessera-pages.
//!
//! This crate provides the typed token structures and the parser for the
//! textual templates rendered by `tessera-pages`. It is kept separate from the
//! engine so that tooling (formatters, linters, template previews) can share it
//! without pulling in the runtime.
//!
//! ## Template Syntax
//!
//! ```text
//! <div class="counter">
//!     <h2>{{ props.title }}</h2>
//!     <span>{{ state.count }}</span>
//!     <p>{{ format_total(state.count, "items") }}</p>
//!     <button data-event="click" data-action="increment">+</button>
//!     {{ @children }}
//!     {{ @include footer }}
//! </div>
//! ```
//!
//! ## Main Types
//!
//! - [`Template`] - A parsed template: an ordered list of tokens
//! - [`Token`] - One piece of a template (literal text, reference, call, slot, include)
//! - [`Arg`] - An argument passed to a helper method call
//!
//! ## Usage
//!
//! ```rust
//! use tessera_pages_ast::{Template, Token};
//!
//! let template = Template::parse("<p>{{ state.count }}</p>");
//! assert_eq!(template.tokens()[1], Token::StateRef("count".to_string()));
//! ```

mod parser;
mod token;

pub use parser::parse;
pub use token::{Arg, Template, Token};
