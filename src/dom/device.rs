//! Device and user-preference detection.

use serde::Serialize;

use super::url;
use crate::host::{Capability, Host};

/// Media query for the reduced-motion preference.
pub const REDUCED_MOTION_QUERY: &str = "(prefers-reduced-motion: reduce)";
/// Media query for the high-contrast preference.
pub const HIGH_CONTRAST_QUERY: &str = "(prefers-contrast: high)";

/// Widest viewport still treated as a phone.
pub const MOBILE_MAX_WIDTH: f64 = 768.0;
/// Widest viewport still treated as a tablet.
pub const TABLET_MAX_WIDTH: f64 = 1024.0;

/// Coarse device class derived from the viewport width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// `width <= 768`
    Mobile,
    /// `768 < width <= 1024`
    Tablet,
    /// `width > 1024`
    Desktop,
}

impl DeviceClass {
    /// Classify a viewport width.
    #[must_use]
    pub fn from_width(width: f64) -> Self {
        if width <= MOBILE_MAX_WIDTH {
            Self::Mobile
        } else if width <= TABLET_MAX_WIDTH {
            Self::Tablet
        } else {
            Self::Desktop
        }
    }

    /// Classify the host's current viewport.
    pub fn detect<H: Host>(host: &H) -> Self {
        Self::from_width(host.viewport().width)
    }
}

/// Whether the visitor asked for reduced motion, either through the OS
/// preference or a `?motion=reduce` query parameter.
pub fn prefers_reduced_motion<H: Host>(host: &H) -> bool {
    if url::query_param(&host.location_query(), "motion").as_deref()
        == Some("reduce")
    {
        return true;
    }
    host.matches_media(REDUCED_MOTION_QUERY)
}

/// Whether the visitor asked for high contrast.
pub fn prefers_high_contrast<H: Host>(host: &H) -> bool {
    host.matches_media(HIGH_CONTRAST_QUERY)
}

/// Snapshot of detected browser features, reported in status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    /// Device class at detection time.
    pub device: DeviceClass,
    /// `IntersectionObserver` available.
    pub intersection_observer: bool,
    /// CSS custom properties available.
    pub custom_properties: bool,
    /// Reduced motion requested.
    pub reduced_motion: bool,
    /// High contrast requested.
    pub high_contrast: bool,
}

impl Features {
    /// Detect every feature on `host`.
    pub fn detect<H: Host>(host: &H) -> Self {
        Self {
            device: DeviceClass::detect(host),
            intersection_observer: host
                .supports(Capability::IntersectionObserver),
            custom_properties: host.supports(Capability::CustomProperties),
            reduced_motion: prefers_reduced_motion(host),
            high_contrast: prefers_high_contrast(host),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    #[test]
    fn classifies_widths_at_the_breakpoints() {
        assert_eq!(DeviceClass::from_width(768.0), DeviceClass::Mobile);
        assert_eq!(DeviceClass::from_width(769.0), DeviceClass::Tablet);
        assert_eq!(DeviceClass::from_width(1024.0), DeviceClass::Tablet);
        assert_eq!(DeviceClass::from_width(1025.0), DeviceClass::Desktop);
    }

    #[test]
    fn reduced_motion_from_media_or_query() {
        let host = MemoryHost::new();
        assert!(!prefers_reduced_motion(&host));

        host.set_location("/", "?theme=dark&motion=reduce");
        assert!(prefers_reduced_motion(&host));

        host.set_location("/", "");
        host.set_media(REDUCED_MOTION_QUERY, true);
        assert!(prefers_reduced_motion(&host));
    }

    #[test]
    fn features_snapshot_serializes_camel_case() {
        let host = MemoryHost::new();
        host.set_viewport(400.0, 800.0);
        let json = serde_json::to_value(Features::detect(&host)).unwrap();
        assert_eq!(json["device"], "mobile");
        assert_eq!(json["intersectionObserver"], true);
        assert_eq!(json["highContrast"], false);
    }
}
