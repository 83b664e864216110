//! Pipeline stages for notebook-to-PDF conversion.
//!
//! Each submodule implements one transformation step, so each can be tested
//! on its own and the PDF backend can change without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ notebook ──▶ html ──▶ pdf
//! (URL/path)  (nbformat)   (classic)  (builtin layout | external command)
//!                           │  ▲          │
//!                 markdown ─┘  template   └─ layout (HTML → blocks, wrapping)
//! ```
//!
//! 1. [`input`]    - canonicalise the user-supplied path or URL to a local file
//! 2. [`notebook`] - decode nbformat v4 JSON into typed cells and outputs
//! 3. [`html`]     - render cells to a standalone HTML document, using
//!    [`markdown`] for text cells and [`template`] for page chrome
//! 4. [`pdf`]      - turn that document into PDF bytes; the built-in engine
//!    reads it back through [`layout`]

pub mod html;
pub mod input;
pub mod layout;
pub mod markdown;
pub mod notebook;
pub mod pdf;
pub mod template;
