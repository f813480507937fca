//! Vision port — locating template images on screen.

use std::future::Future;
use std::sync::Arc;

use macrobot_domain::error::MacrobotError;
use macrobot_domain::geometry::{MatchResult, Region};

/// Finds template images on the current screen.
pub trait Vision: Send + Sync {
    /// Search for `template`, optionally restricted to `region`.
    ///
    /// A template that is not on screen is a normal result
    /// ([`MatchResult::not_found`]), not an error. Errors are reserved for
    /// failures of the capture or matching backend itself.
    fn find(
        &self,
        template: &str,
        confidence: Option<f32>,
        region: Option<Region>,
    ) -> impl Future<Output = Result<MatchResult, MacrobotError>> + Send;
}

impl<T: Vision> Vision for Arc<T> {
    fn find(
        &self,
        template: &str,
        confidence: Option<f32>,
        region: Option<Region>,
    ) -> impl Future<Output = Result<MatchResult, MacrobotError>> + Send {
        (**self).find(template, confidence, region)
    }
}
