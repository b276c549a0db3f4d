//! Resource configurations (`ResTable_config`) and configuration matching.

use crate::errors::{ResourcesError, ResourcesResult};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// The qualifiers of a resource configuration. A `None` field means the
/// qualifier is not constrained, so `Config::default()` is the
/// configuration-less ("default") configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Config {
    pub mcc: Option<u16>,
    pub mnc: Option<u16>,
    pub language: Option<String>,
    pub region: Option<String>,
    pub orientation: Option<u8>,
    pub touchscreen: Option<u8>,
    pub density: Option<u16>,
    pub keyboard: Option<u8>,
    pub navigation: Option<u8>,
    pub input_flags: Option<u8>,
    pub screen_width: Option<u16>,
    pub screen_height: Option<u16>,
    pub sdk_version: Option<u16>,
    pub screen_layout: Option<u8>,
    pub ui_mode: Option<u8>,
    pub smallest_width_dp: Option<u16>,
    pub screen_width_dp: Option<u16>,
    pub screen_height_dp: Option<u16>,
    pub script: Option<String>,
    pub variant: Option<String>,
    pub screen_layout2: Option<u8>,
    pub color_mode: Option<u8>,
}

impl Config {
    #[must_use]
    pub fn is_default(&self) -> bool {
        self == &Self::default()
    }

    /// Builds a request configuration from a locale tag such as `fr`,
    /// `fr-FR`, `fr-rFR` or `fr_FR`.
    pub fn from_locale(tag: &str) -> ResourcesResult<Self> {
        lazy_static! {
            static ref RE: Regex = Regex::new(r"^([a-zA-Z]{2,3})(?:[-_]r?([a-zA-Z]{2}|[0-9]{3}))?$")
                .expect("failed to compile locale regex");
        }
        let caps = RE
            .captures(tag)
            .ok_or_else(|| ResourcesError::InvalidLocale(tag.to_string()))?;
        Ok(Self {
            language: caps.get(1).map(|m| m.as_str().to_lowercase()),
            region: caps.get(2).map(|m| m.as_str().to_uppercase()),
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_density(self, density: u16) -> Self {
        Self {
            density: Some(density),
            ..self
        }
    }

    /// Number of constrained qualifiers.
    fn specificity(&self) -> usize {
        [
            self.mcc.is_some(),
            self.mnc.is_some(),
            self.language.is_some(),
            self.region.is_some(),
            self.orientation.is_some(),
            self.touchscreen.is_some(),
            self.density.is_some(),
            self.keyboard.is_some(),
            self.navigation.is_some(),
            self.input_flags.is_some(),
            self.screen_width.is_some(),
            self.screen_height.is_some(),
            self.sdk_version.is_some(),
            self.screen_layout.is_some(),
            self.ui_mode.is_some(),
            self.smallest_width_dp.is_some(),
            self.screen_width_dp.is_some(),
            self.screen_height_dp.is_some(),
            self.script.is_some(),
            self.variant.is_some(),
            self.screen_layout2.is_some(),
            self.color_mode.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }

    /// Tells whether a stored configuration can be selected for `request`.
    ///
    /// Density never conflicts (the closest one is picked), and a platform
    /// version conflicts only when it is newer than the requested one.
    #[must_use]
    pub fn is_compatible_with(&self, request: &Self) -> bool {
        fn same<T: PartialEq>(stored: &Option<T>, requested: &Option<T>) -> bool {
            stored.is_none() || stored == requested
        }

        let sdk_ok = match (self.sdk_version, request.sdk_version) {
            (Some(stored), Some(requested)) => stored <= requested,
            _ => true,
        };

        sdk_ok
            && same(&self.mcc, &request.mcc)
            && same(&self.mnc, &request.mnc)
            && same(&self.language, &request.language)
            && same(&self.region, &request.region)
            && same(&self.script, &request.script)
            && same(&self.variant, &request.variant)
            && same(&self.orientation, &request.orientation)
            && same(&self.touchscreen, &request.touchscreen)
            && same(&self.keyboard, &request.keyboard)
            && same(&self.navigation, &request.navigation)
            && same(&self.input_flags, &request.input_flags)
            && same(&self.screen_width, &request.screen_width)
            && same(&self.screen_height, &request.screen_height)
            && same(&self.screen_layout, &request.screen_layout)
            && same(&self.ui_mode, &request.ui_mode)
            && same(&self.smallest_width_dp, &request.smallest_width_dp)
            && same(&self.screen_width_dp, &request.screen_width_dp)
            && same(&self.screen_height_dp, &request.screen_height_dp)
            && same(&self.screen_layout2, &request.screen_layout2)
            && same(&self.color_mode, &request.color_mode)
    }

    fn locale_rank(&self, request: &Self) -> u8 {
        match (&self.language, &self.region) {
            (Some(_), Some(_)) if self.language == request.language => 2,
            (Some(_), None) if self.language == request.language => 1,
            _ => 0,
        }
    }

    fn density_rank(&self, request: &Self) -> i32 {
        match (self.density, request.density) {
            (Some(stored), Some(requested)) if stored == requested => i32::MAX,
            // prefer the closest density, scaling down being better than up
            (Some(stored), Some(requested)) => {
                let distance = (i32::from(stored) - i32::from(requested)).abs();
                if stored > requested {
                    -distance
                } else {
                    -2 * distance
                }
            }
            (Some(_), None) => i32::MIN,
            (None, _) => i32::MIN + 1,
        }
    }

    /// Compares two compatible configurations for `request`: the greatest is
    /// the better match. Locale beats density which beats specificity, and
    /// ties are broken on the canonical configuration order.
    #[must_use]
    pub fn compare_for(&self, other: &Self, request: &Self) -> Ordering {
        self.locale_rank(request)
            .cmp(&other.locale_rank(request))
            .then_with(|| self.density_rank(request).cmp(&other.density_rank(request)))
            .then_with(|| self.specificity().cmp(&other.specificity()))
            .then_with(|| self.sdk_version.cmp(&other.sdk_version))
            .then_with(|| other.cmp(self))
    }
}

/// Unpacks a two-byte language or region code, handling the packed
/// three-letter form whose first byte has its high bit set.
pub(crate) fn unpack_locale_part(raw: [u8; 2], base: u8) -> Option<String> {
    if raw == [0, 0] {
        return None;
    }
    if raw[0] & 0x80 == 0 {
        let s = raw
            .iter()
            .filter(|b| **b != 0)
            .map(|b| char::from(*b))
            .collect();
        return Some(s);
    }
    let first = raw[1] & 0x1f;
    let second = ((raw[1] & 0xe0) >> 5) | ((raw[0] & 0x03) << 3);
    let third = (raw[0] & 0x7c) >> 2;
    Some(
        [first, second, third]
            .iter()
            .map(|c| char::from(base.wrapping_add(*c)))
            .collect(),
    )
}

#[cfg_attr(not(any(test, feature = "writer")), allow(dead_code))]
pub(crate) fn pack_locale_part(part: Option<&str>, base: u8) -> [u8; 2] {
    match part.map(str::as_bytes) {
        Some([a, b]) => [*a, *b],
        Some([a, b, c]) => {
            let first = a.wrapping_sub(base) & 0x1f;
            let second = b.wrapping_sub(base) & 0x1f;
            let third = c.wrapping_sub(base) & 0x1f;
            [0x80 | (third << 2) | (second >> 3), (second << 5) | first]
        }
        _ => [0, 0],
    }
}

fn density_name(density: u16) -> String {
    match density {
        120 => "ldpi".to_string(),
        160 => "mdpi".to_string(),
        213 => "tvdpi".to_string(),
        240 => "hdpi".to_string(),
        320 => "xhdpi".to_string(),
        480 => "xxhdpi".to_string(),
        640 => "xxxhdpi".to_string(),
        0xfffe => "anydpi".to_string(),
        0xffff => "nodpi".to_string(),
        other => format!("{other}dpi"),
    }
}

/// Prints configurations the way `aapt` qualifies resource directories.
impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_default() {
            return write!(f, "default");
        }
        let mut parts = Vec::new();
        if let Some(mcc) = self.mcc {
            parts.push(format!("mcc{mcc}"));
        }
        if let Some(mnc) = self.mnc {
            parts.push(format!("mnc{mnc}"));
        }
        if let Some(language) = &self.language {
            parts.push(language.clone());
        }
        if let Some(region) = &self.region {
            parts.push(format!("r{region}"));
        }
        if let Some(sw) = self.smallest_width_dp {
            parts.push(format!("sw{sw}dp"));
        }
        if let Some(w) = self.screen_width_dp {
            parts.push(format!("w{w}dp"));
        }
        if let Some(h) = self.screen_height_dp {
            parts.push(format!("h{h}dp"));
        }
        match self.orientation {
            Some(1) => parts.push("port".to_string()),
            Some(2) => parts.push("land".to_string()),
            Some(other) => parts.push(format!("orientation{other}")),
            None => (),
        }
        if let Some(ui_mode) = self.ui_mode {
            match ui_mode & 0x30 {
                0x10 => parts.push("notnight".to_string()),
                0x20 => parts.push("night".to_string()),
                _ => parts.push(format!("uimode{ui_mode:#x}")),
            }
        }
        if let Some(density) = self.density {
            parts.push(density_name(density));
        }
        if let Some(sdk) = self.sdk_version {
            parts.push(format!("v{sdk}"));
        }
        if parts.is_empty() {
            parts.push("other".to_string());
        }
        write!(f, "{}", parts.join("-"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_tags() {
        let fr = Config::from_locale("fr-rFR").unwrap();
        assert_eq!(fr.language.as_deref(), Some("fr"));
        assert_eq!(fr.region.as_deref(), Some("FR"));
        assert_eq!(Config::from_locale("de").unwrap().region, None);
        assert!(Config::from_locale("not a locale").is_err());
        assert_eq!(fr.to_string(), "fr-rFR");
        assert_eq!(Config::default().to_string(), "default");
    }

    #[test]
    fn packed_languages() {
        assert_eq!(unpack_locale_part(*b"en", b'a').as_deref(), Some("en"));
        assert_eq!(unpack_locale_part([0, 0], b'a'), None);
        let packed = pack_locale_part(Some("fil"), b'a');
        assert_eq!(unpack_locale_part(packed, b'a').as_deref(), Some("fil"));
    }

    #[test]
    fn compatibility() {
        let fr = Config::from_locale("fr").unwrap();
        let de = Config::from_locale("de").unwrap();
        assert!(Config::default().is_compatible_with(&de));
        assert!(!fr.is_compatible_with(&de));
        assert!(fr.is_compatible_with(&fr));
        let hdpi = Config::default().with_density(240);
        assert!(hdpi.is_compatible_with(&de));
    }

    #[test]
    fn locale_beats_density() {
        let request = Config::from_locale("fr").unwrap().with_density(240);
        let fr = Config::from_locale("fr").unwrap();
        let hdpi = Config::default().with_density(240);
        assert_eq!(fr.compare_for(&hdpi, &request), Ordering::Greater);
        assert_eq!(hdpi.compare_for(&Config::default(), &request), Ordering::Greater);
    }
}
