//! Linux platform implementation
//!
//! TODO: Poll key state through XQueryKeymap and inject with XTest.

use crate::{Error, InputProbe, Result};
use std::sync::Arc;

pub fn system_probe() -> Result<Arc<dyn InputProbe>> {
    Err(Error::not_implemented(
        "Linux input probing is not supported yet",
    )
    .with_suggestions(vec!["Run on Windows".to_string()]))
}
