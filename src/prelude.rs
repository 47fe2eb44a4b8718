//! Convenience re-exports for common use.

pub use crate::agent::{AgentConverter, ConversionResult, ConvertRequest, LoopExit};
pub use crate::config::{AgentSettings, ConverterConfig};
pub use crate::error::{ConvertError, Result};
pub use crate::package::{build_zip, fetch_requires, PackageInput};
pub use crate::provider::{ChatTransport, OpenRouterTransport};
pub use crate::shim::convert_with_shims;
pub use crate::types::{
    AgentStep, CheckIssue, CheckReport, FileKind, GeneratedFile, ProgressEvent, ProgressSink, Severity,
    StreamEvent, StreamSink,
};
pub use crate::userscript::{parse_userscript, UserScriptMeta};
