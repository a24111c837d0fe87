//! macOS platform implementation
//!
//! TODO: Poll with CGEventSourceKeyState and inject with CGEventPost.

use crate::{Error, InputProbe, Result};
use std::sync::Arc;

pub fn system_probe() -> Result<Arc<dyn InputProbe>> {
    Err(Error::not_implemented(
        "macOS input probing is not supported yet",
    )
    .with_suggestions(vec![
        "Run on Windows".to_string(),
        "Grant Input Monitoring and Accessibility once support lands".to_string(),
    ]))
}
