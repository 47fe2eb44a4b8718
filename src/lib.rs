//! script2ext: UserScript to Chrome MV3 extension converter
//!
//! Two conversion paths share one output shape (a set of generated files):
//!
//! - **agent mode** drives a remote model through a bounded tool-calling
//!   conversation that writes the files, checks them and fixes them;
//! - **shim mode** rewrites GM_* calls against static shims.
//!
//! # Quick Start
//!
//! ```no_run
//! use script2ext::prelude::*;
//!
//! # async fn example() -> script2ext::error::Result<()> {
//! let config = ConverterConfig::from_env();
//! let converter = AgentConverter::from_config(&config)?;
//! let result = converter
//!     .convert(ConvertRequest::new("// ==UserScript==\n// ==/UserScript==\nalert(1);"))
//!     .await?;
//! for file in &result.files {
//!     println!("{}", file.path);
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod package;
pub mod prelude;
pub mod provider;
pub mod shim;
pub mod types;
pub mod userscript;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(feature = "cli")]
pub mod logging;
