/// "Data not yet available" signal
///
/// Starts loading and flips to loaded exactly once. Nothing flips it back:
/// a later empty result, a failed refresh or a closed stream all leave it
/// loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingTracker {
    loaded: bool,
}

impl LoadingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        !self.loaded
    }

    /// Records that an initial value was produced.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn mark_loaded(&mut self) -> bool {
        let transitioned = !self.loaded;
        self.loaded = true;
        transitioned
    }
}
