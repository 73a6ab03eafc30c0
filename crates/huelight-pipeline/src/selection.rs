//! Session selection state and the active-category resolver.
//!
//! Two mutually exclusive mechanisms pick what gets highlighted:
//!
//! - **manual**: up to two explicitly chosen [`ColorCategory`] values,
//!   kept in insertion order with oldest-first eviction;
//! - **vision mode**: a [`VisionMode`] preset mapping to a fixed
//!   category subset.
//!
//! Both values are remembered independently, but exactly one is active
//! at a time ([`SelectionState::selection`]). Whichever mutator ran last
//! decides which one. [`active_categories`] is the single place that
//! turns a state into the set the mask builder consumes.
//!
//! [`SharedSelection`] is the cross-thread handle: UI events mutate it,
//! the frame loop copies a [`SelectionState`] out of it once per frame.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::criteria::{ActiveCategories, ColorCategory, VisionMode};

/// Maximum number of manually selected categories.
pub const MAX_MANUAL_COLORS: usize = 2;

/// Up to two manually chosen categories in insertion order.
///
/// Filled slots always precede empty ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManualSelection {
    slots: [Option<ColorCategory>; MAX_MANUAL_COLORS],
}

impl ManualSelection {
    /// Toggle `category`.
    ///
    /// A selected category is removed. An unselected one is appended
    /// when there is room; otherwise the oldest entry is evicted and
    /// the new one appended.
    pub fn toggle(&mut self, category: ColorCategory) {
        let [first, second] = self.slots;
        self.slots = if first == Some(category) {
            [second, None]
        } else if second == Some(category) {
            [first, None]
        } else if first.is_none() {
            [Some(category), None]
        } else if second.is_none() {
            [first, Some(category)]
        } else {
            [second, Some(category)]
        };
    }

    /// Remove every selected category.
    pub fn clear(&mut self) {
        self.slots = [None; MAX_MANUAL_COLORS];
    }

    /// Returns `true` if `category` is selected.
    #[must_use]
    pub fn contains(&self, category: ColorCategory) -> bool {
        self.slots.contains(&Some(category))
    }

    /// Number of selected categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Returns `true` if nothing is selected.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.slots[0].is_none()
    }

    /// Selected categories, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = ColorCategory> + '_ {
        self.slots.iter().flatten().copied()
    }

    /// Selected categories, oldest first, as a vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<ColorCategory> {
        self.iter().collect()
    }
}

/// Which mechanism currently drives highlighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionSource {
    /// Manually chosen colors.
    Manual,
    /// A vision-mode preset.
    #[default]
    VisionMode,
}

/// The active selection, as a tagged variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Highlight the manually chosen colors.
    Manual(ManualSelection),
    /// Highlight the preset's categories.
    Vision(VisionMode),
}

/// Per-session highlighting state.
///
/// Small and `Copy`, so a frame can work from its own snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionState {
    source: SelectionSource,
    manual: ManualSelection,
    vision_mode: VisionMode,
    grayscale_background: bool,
}

impl SelectionState {
    /// Session defaults: normal vision, no manual colors, color background.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle a manual color and make manual selection active.
    pub fn toggle(&mut self, category: ColorCategory) {
        self.manual.toggle(category);
        self.source = SelectionSource::Manual;
    }

    /// Clear the manual colors and make manual selection active.
    pub fn clear_manual(&mut self) {
        self.manual.clear();
        self.source = SelectionSource::Manual;
    }

    /// Replace the vision mode and make it active.
    ///
    /// The manual selection is kept but no longer consulted.
    pub fn select_mode(&mut self, mode: VisionMode) {
        self.vision_mode = mode;
        self.source = SelectionSource::VisionMode;
    }

    /// Toggle the grayscale background.
    pub fn set_grayscale_background(&mut self, enabled: bool) {
        self.grayscale_background = enabled;
    }

    /// The active mechanism with its value.
    #[must_use]
    pub const fn selection(&self) -> Selection {
        match self.source {
            SelectionSource::Manual => Selection::Manual(self.manual),
            SelectionSource::VisionMode => Selection::Vision(self.vision_mode),
        }
    }

    /// Which mechanism is active.
    #[must_use]
    pub const fn source(&self) -> SelectionSource {
        self.source
    }

    /// The remembered manual selection (active or not).
    #[must_use]
    pub const fn manual(&self) -> &ManualSelection {
        &self.manual
    }

    /// The remembered vision mode (active or not).
    #[must_use]
    pub const fn vision_mode(&self) -> VisionMode {
        self.vision_mode
    }

    /// Whether the suppressed background is fully desaturated.
    #[must_use]
    pub const fn grayscale_background(&self) -> bool {
        self.grayscale_background
    }

    /// Returns `true` if nothing would be highlighted.
    #[must_use]
    pub fn is_passthrough(&self) -> bool {
        active_categories(self).is_empty()
    }
}

/// Resolve the categories the mask builder should match.
#[must_use]
pub fn active_categories(state: &SelectionState) -> ActiveCategories {
    match state.selection() {
        Selection::Manual(manual) => manual.iter().collect(),
        Selection::Vision(mode) => mode.categories(),
    }
}

/// Thread-safe handle to a [`SelectionState`].
///
/// Mutators hold the lock only long enough to update the small state
/// value; [`snapshot`](Self::snapshot) only long enough to copy it. No
/// lock is ever held while a frame is processed.
#[derive(Debug, Clone, Default)]
pub struct SharedSelection {
    inner: Arc<Mutex<SelectionState>>,
}

impl SharedSelection {
    /// Wrap an initial state.
    #[must_use]
    pub fn new(state: SelectionState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Copy the current state.
    #[must_use]
    pub fn snapshot(&self) -> SelectionState {
        *self.lock()
    }

    /// Toggle a manual color; takes effect on the next frame.
    pub fn toggle_manual_color(&self, category: ColorCategory) {
        let mut state = self.lock();
        state.toggle(category);
        log::debug!(
            "toggled {category}: manual selection now {:?}",
            state.manual().to_vec()
        );
    }

    /// Clear every manual color; takes effect on the next frame.
    pub fn clear_manual_colors(&self) {
        self.lock().clear_manual();
        log::debug!("cleared manual selection");
    }

    /// Switch vision mode; takes effect on the next frame.
    pub fn select_vision_mode(&self, mode: VisionMode) {
        self.lock().select_mode(mode);
        log::debug!("vision mode set to {mode}");
    }

    /// Enable or disable the grayscale background.
    pub fn set_grayscale_background(&self, enabled: bool) {
        self.lock().set_grayscale_background(enabled);
        log::debug!("grayscale background {}", if enabled { "on" } else { "off" });
    }

    /// Apply an arbitrary update under the lock.
    pub fn update(&self, f: impl FnOnce(&mut SelectionState)) {
        f(&mut self.lock());
    }

    /// The state is plain data, so a panic in another holder cannot
    /// leave it half-written; recover from poisoning.
    fn lock(&self) -> MutexGuard<'_, SelectionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
