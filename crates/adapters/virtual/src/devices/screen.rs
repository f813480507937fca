use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use macrobot_app::ports::Vision;
use macrobot_domain::error::MacrobotError;
use macrobot_domain::geometry::{MatchResult, Point, Region};

#[derive(Debug, Default)]
struct ScreenState {
    shown: HashMap<String, MatchResult>,
    scripted: HashMap<String, VecDeque<bool>>,
    searches: HashMap<String, usize>,
}

/// A simulated screen that answers template searches from what it was told
/// to show.
///
/// Scripted answers take priority and are consumed one per search; once a
/// template's script runs out, searches fall back to whether it is shown.
#[derive(Debug, Default)]
pub struct VirtualScreen {
    state: Mutex<ScreenState>,
}

impl VirtualScreen {
    /// Show `template` covering `region`; matches report the region centre.
    pub fn show(&self, template: impl Into<String>, region: Region) {
        self.lock()
            .shown
            .insert(template.into(), MatchResult::found_in(region, None));
    }

    /// Show `template` at a single point.
    pub fn show_at(&self, template: impl Into<String>, point: Point) {
        self.lock()
            .shown
            .insert(template.into(), MatchResult::found_at(point));
    }

    pub fn hide(&self, template: &str) {
        self.lock().shown.remove(template);
    }

    /// Queue visibility answers for the next searches of `template`.
    pub fn script(&self, template: impl Into<String>, answers: Vec<bool>) {
        self.lock()
            .scripted
            .entry(template.into())
            .or_default()
            .extend(answers);
    }

    /// Number of searches made for `template`.
    #[must_use]
    pub fn find_count(&self, template: &str) -> usize {
        self.lock().searches.get(template).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, ScreenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, template: &str, confidence: Option<f32>, region: Option<Region>) -> MatchResult {
        let mut state = self.lock();
        *state.searches.entry(template.to_string()).or_insert(0) += 1;

        let shown = state.shown.get(template).copied();
        let scripted = state
            .scripted
            .get_mut(template)
            .and_then(VecDeque::pop_front);

        let hit = match (scripted, shown) {
            (Some(false), _) | (None, None) => return MatchResult::not_found(),
            (Some(true), Some(hit)) | (None, Some(hit)) => hit,
            (Some(true), None) => MatchResult::found_at(Point::new(0, 0)),
        };

        match (region, hit.point) {
            (Some(region), Some(point)) if !region.contains(point) => MatchResult::not_found(),
            _ => MatchResult { confidence, ..hit },
        }
    }
}

impl Vision for VirtualScreen {
    fn find(
        &self,
        template: &str,
        confidence: Option<f32>,
        region: Option<Region>,
    ) -> impl Future<Output = Result<MatchResult, MacrobotError>> + Send {
        let result = self.lookup(template, confidence, region);
        tracing::trace!(template, found = result.found, "virtual screen search");
        async move { Ok(result) }
    }
}
