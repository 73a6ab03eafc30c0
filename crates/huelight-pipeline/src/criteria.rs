//! Color categories, their fixed HSV criteria, and vision-mode presets.
//!
//! Each [`ColorCategory`] owns an immutable [`CategoryCriteria`]: a hue
//! interval in degrees plus saturation and value floors. A hue interval
//! whose minimum exceeds its maximum wraps across 0°/360° (deep red).
//!
//! The criteria table is part of the product's visible behavior and is
//! intentionally not configurable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::hsv::Hsv;

/// A named color family the user can ask to highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorCategory {
    /// Deep red through pink-red, wrapping across 0°.
    Red,
    /// Yellow and yellow-green.
    Yellow,
    /// Greens.
    Green,
    /// Blues.
    Blue,
}

impl ColorCategory {
    /// Every category, in table order.
    pub const ALL: [Self; 4] = [Self::Red, Self::Yellow, Self::Green, Self::Blue];

    /// The fixed classification criteria for this category.
    #[must_use]
    pub const fn criteria(self) -> CategoryCriteria {
        match self {
            Self::Red => CategoryCriteria {
                hue_min: 330.0,
                hue_max: 30.0,
                min_saturation: 0.20,
                min_value: 0.15,
            },
            Self::Yellow => CategoryCriteria {
                hue_min: 40.0,
                hue_max: 80.0,
                min_saturation: 0.20,
                min_value: 0.20,
            },
            Self::Green => CategoryCriteria {
                hue_min: 80.0,
                hue_max: 160.0,
                min_saturation: 0.18,
                min_value: 0.12,
            },
            Self::Blue => CategoryCriteria {
                hue_min: 180.0,
                hue_max: 260.0,
                min_saturation: 0.18,
                min_value: 0.08,
            },
        }
    }

    /// Lowercase name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Blue => "blue",
        }
    }

    /// The first category (in table order) whose criteria accept `hsv`.
    #[must_use]
    pub fn classify(hsv: Hsv) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|&c| c.criteria().matches(hsv.hue_degrees(), hsv.s, hsv.v))
    }

    const fn bit(self) -> u8 {
        match self {
            Self::Red => 1,
            Self::Yellow => 1 << 1,
            Self::Green => 1 << 2,
            Self::Blue => 1 << 3,
        }
    }
}

impl fmt::Display for ColorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorCategory {
    type Err = ParseSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseSelectionError::UnknownCategory(s.to_owned()))
    }
}

/// Hue range and floors that decide category membership.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryCriteria {
    /// Lower hue bound in degrees.
    pub hue_min: f32,
    /// Upper hue bound in degrees. Below `hue_min` for wrap-around ranges.
    pub hue_max: f32,
    /// Minimum saturation, `[0, 1]`.
    pub min_saturation: f32,
    /// Minimum value, `[0, 1]`.
    pub min_value: f32,
}

impl CategoryCriteria {
    /// Returns `true` if the hue interval crosses 0°/360°.
    #[must_use]
    pub fn wraps(&self) -> bool {
        self.hue_min > self.hue_max
    }

    /// Test a pixel given its hue in degrees and its saturation/value.
    ///
    /// The floors are checked first; bounds are inclusive.
    #[must_use]
    pub fn matches(&self, hue_deg: f32, s: f32, v: f32) -> bool {
        if s < self.min_saturation || v < self.min_value {
            return false;
        }
        if self.wraps() {
            hue_deg >= self.hue_min || hue_deg <= self.hue_max
        } else {
            (self.hue_min..=self.hue_max).contains(&hue_deg)
        }
    }
}

/// Test a pixel against one category.
#[must_use]
pub fn matches(hue_deg: f32, s: f32, v: f32, category: ColorCategory) -> bool {
    category.criteria().matches(hue_deg, s, v)
}

/// Test a pixel against every category in `categories`; `true` if any
/// accepts it.
#[must_use]
pub fn matches_any(hsv: Hsv, categories: ActiveCategories) -> bool {
    let hue_deg = hsv.hue_degrees();
    categories
        .iter()
        .any(|c| matches(hue_deg, hsv.s, hsv.v, c))
}

/// A set of color categories, iterated in table order.
///
/// Backed by a bitset so it is `Copy` and cheap to pass per frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ActiveCategories(u8);

impl ActiveCategories {
    /// The empty set: nothing is highlighted.
    pub const EMPTY: Self = Self(0);

    /// Add a category.
    pub const fn insert(&mut self, category: ColorCategory) {
        self.0 |= category.bit();
    }

    /// Returns `true` if `category` is in the set.
    #[must_use]
    pub const fn contains(self, category: ColorCategory) -> bool {
        self.0 & category.bit() != 0
    }

    /// Returns `true` if no category is active.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of active categories.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate the active categories in table order.
    pub fn iter(self) -> impl Iterator<Item = ColorCategory> {
        ColorCategory::ALL
            .into_iter()
            .filter(move |&c| self.contains(c))
    }
}

impl FromIterator<ColorCategory> for ActiveCategories {
    fn from_iter<I: IntoIterator<Item = ColorCategory>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for c in iter {
            set.insert(c);
        }
        set
    }
}

impl fmt::Display for ActiveCategories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.iter().map(ColorCategory::name).collect();
        f.write_str(&names.join("+"))
    }
}

/// A color-vision deficiency preset.
///
/// Each preset highlights the categories a viewer with that deficiency
/// has the most trouble telling apart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisionMode {
    /// Typical color vision: nothing is highlighted.
    #[default]
    Normal,
    /// Deuteranomaly.
    GreenWeak,
    /// Protanomaly.
    RedWeak,
    /// Tritanomaly.
    BlueWeak,
}

impl VisionMode {
    /// Every mode, in presentation order.
    pub const ALL: [Self; 4] = [Self::Normal, Self::GreenWeak, Self::RedWeak, Self::BlueWeak];

    /// The fixed category subset this mode highlights.
    #[must_use]
    pub fn categories(self) -> ActiveCategories {
        match self {
            Self::Normal => ActiveCategories::EMPTY,
            Self::GreenWeak => [ColorCategory::Green].into_iter().collect(),
            Self::RedWeak => [ColorCategory::Red].into_iter().collect(),
            Self::BlueWeak => [ColorCategory::Blue, ColorCategory::Yellow]
                .into_iter()
                .collect(),
        }
    }

    /// Kebab-case name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::GreenWeak => "green-weak",
            Self::RedWeak => "red-weak",
            Self::BlueWeak => "blue-weak",
        }
    }

    /// Clinical name of the simulated deficiency.
    #[must_use]
    pub const fn clinical_name(self) -> Option<&'static str> {
        match self {
            Self::Normal => None,
            Self::GreenWeak => Some("deuteranomaly"),
            Self::RedWeak => Some("protanomaly"),
            Self::BlueWeak => Some("tritanomaly"),
        }
    }
}

impl fmt::Display for VisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VisionMode {
    type Err = ParseSelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| {
                m.name().eq_ignore_ascii_case(s)
                    || m.clinical_name().is_some_and(|c| c.eq_ignore_ascii_case(s))
            })
            .ok_or_else(|| ParseSelectionError::UnknownVisionMode(s.to_owned()))
    }
}

/// Failure to parse a category or vision-mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseSelectionError {
    /// Not one of red, yellow, green, blue.
    #[error("unknown color category {0:?} (expected red, yellow, green or blue)")]
    UnknownCategory(String),
    /// Not a known vision mode or clinical alias.
    #[error(
        "unknown vision mode {0:?} (expected normal, green-weak, red-weak, blue-weak or a clinical name)"
    )]
    UnknownVisionMode(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::hsv::rgb8_to_hsv;

    #[test]
    fn red_wraps_and_others_do_not() {
        assert!(ColorCategory::Red.criteria().wraps());
        assert!(!ColorCategory::Yellow.criteria().wraps());
        assert!(!ColorCategory::Green.criteria().wraps());
        assert!(!ColorCategory::Blue.criteria().wraps());
    }

    #[test]
    fn red_matches_across_zero() {
        assert!(matches(350.0, 0.9, 0.9, ColorCategory::Red));
        assert!(matches(0.0, 0.9, 0.9, ColorCategory::Red));
        assert!(matches(15.0, 0.9, 0.9, ColorCategory::Red));
    }

    #[test]
    fn red_rejects_opposite_hue() {
        assert!(!matches(180.0, 0.9, 0.9, ColorCategory::Red));
        assert!(!matches(100.0, 0.9, 0.9, ColorCategory::Red));
    }

    #[test]
    fn hue_bounds_are_inclusive() {
        assert!(matches(330.0, 0.5, 0.5, ColorCategory::Red));
        assert!(matches(30.0, 0.5, 0.5, ColorCategory::Red));
        assert!(matches(40.0, 0.5, 0.5, ColorCategory::Yellow));
        assert!(matches(80.0, 0.5, 0.5, ColorCategory::Yellow));
        assert!(matches(80.0, 0.5, 0.5, ColorCategory::Green));
        assert!(matches(260.0, 0.5, 0.5, ColorCategory::Blue));
        assert!(!matches(260.5, 0.5, 0.5, ColorCategory::Blue));
    }

    #[test]
    fn saturation_floor_rejects_washed_out_pixels() {
        assert!(!matches(120.0, 0.17, 0.9, ColorCategory::Green));
        assert!(matches(120.0, 0.18, 0.9, ColorCategory::Green));
    }

    #[test]
    fn value_floor_rejects_dark_pixels() {
        assert!(!matches(220.0, 0.9, 0.07, ColorCategory::Blue));
        assert!(matches(220.0, 0.9, 0.08, ColorCategory::Blue));
        assert!(!matches(0.0, 0.9, 0.14, ColorCategory::Red));
    }

    #[test]
    fn matches_any_is_a_logical_or() {
        let set: ActiveCategories = [ColorCategory::Red, ColorCategory::Blue]
            .into_iter()
            .collect();
        assert!(matches_any(rgb8_to_hsv(230, 20, 20), set));
        assert!(matches_any(rgb8_to_hsv(20, 40, 230), set));
        assert!(!matches_any(rgb8_to_hsv(20, 230, 20), set));
    }

    #[test]
    fn matches_any_of_empty_set_is_false() {
        assert!(!matches_any(rgb8_to_hsv(255, 0, 0), ActiveCategories::EMPTY));
    }

    #[test]
    fn classify_finds_matching_category() {
        assert_eq!(
            ColorCategory::classify(rgb8_to_hsv(230, 230, 20)),
            Some(ColorCategory::Yellow)
        );
        assert_eq!(
            ColorCategory::classify(rgb8_to_hsv(20, 40, 230)),
            Some(ColorCategory::Blue)
        );
        assert_eq!(ColorCategory::classify(rgb8_to_hsv(128, 128, 128)), None);
    }

    #[test]
    fn classify_prefers_table_order_on_shared_boundary() {
        // Yellow and green share the 80° bound; yellow is listed first.
        let on_boundary = |c: ColorCategory| c.criteria().matches(80.0, 0.8, 0.8);
        assert!(on_boundary(ColorCategory::Yellow));
        assert!(on_boundary(ColorCategory::Green));
        let first = ColorCategory::ALL.into_iter().find(|&c| on_boundary(c));
        assert_eq!(first, Some(ColorCategory::Yellow));
    }

    #[test]
    fn vision_mode_mapping() {
        assert!(VisionMode::Normal.categories().is_empty());

        let green_weak = VisionMode::GreenWeak.categories();
        assert_eq!(green_weak.iter().collect::<Vec<_>>(), [ColorCategory::Green]);

        let red_weak = VisionMode::RedWeak.categories();
        assert_eq!(red_weak.iter().collect::<Vec<_>>(), [ColorCategory::Red]);

        let blue_weak = VisionMode::BlueWeak.categories();
        assert_eq!(blue_weak.len(), 2);
        assert!(blue_weak.contains(ColorCategory::Blue));
        assert!(blue_weak.contains(ColorCategory::Yellow));
        assert!(!blue_weak.contains(ColorCategory::Red));
        assert!(!blue_weak.contains(ColorCategory::Green));
    }

    #[test]
    fn active_categories_iterate_in_table_order() {
        let set: ActiveCategories = [ColorCategory::Blue, ColorCategory::Red]
            .into_iter()
            .collect();
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            [ColorCategory::Red, ColorCategory::Blue]
        );
        assert_eq!(set.to_string(), "red+blue");
        assert_eq!(ActiveCategories::EMPTY.to_string(), "none");
    }

    #[test]
    fn category_names_parse_case_insensitively() {
        assert_eq!("Green".parse::<ColorCategory>(), Ok(ColorCategory::Green));
        assert_eq!(" blue ".parse::<ColorCategory>(), Ok(ColorCategory::Blue));
        assert!(matches!(
            "purple".parse::<ColorCategory>(),
            Err(ParseSelectionError::UnknownCategory(_))
        ));
    }

    #[test]
    fn vision_modes_parse_with_clinical_aliases() {
        assert_eq!("blue-weak".parse::<VisionMode>(), Ok(VisionMode::BlueWeak));
        assert_eq!("Tritanomaly".parse::<VisionMode>(), Ok(VisionMode::BlueWeak));
        assert_eq!("deuteranomaly".parse::<VisionMode>(), Ok(VisionMode::GreenWeak));
        assert_eq!("protanomaly".parse::<VisionMode>(), Ok(VisionMode::RedWeak));
        assert!("achromatopsia".parse::<VisionMode>().is_err());
    }

    #[test]
    fn category_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&ColorCategory::Yellow).unwrap();
        assert_eq!(json, "\"yellow\"");
        let mode: VisionMode = serde_json::from_str("\"red-weak\"").unwrap();
        assert_eq!(mode, VisionMode::RedWeak);
    }
}
