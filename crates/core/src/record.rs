use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

/// Numeric attributes a phone can be compared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Ram,
    Battery,
    Screen,
    Weight,
    Year,
    Price,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Ram,
        Dimension::Battery,
        Dimension::Screen,
        Dimension::Weight,
        Dimension::Year,
        Dimension::Price,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Ram => "ram",
            Dimension::Battery => "battery",
            Dimension::Screen => "screen",
            Dimension::Weight => "weight",
            Dimension::Year => "year",
            Dimension::Price => "price",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Anything that can be projected onto the shared dimension list.
///
/// Implemented by catalog records and by query specs so both go through the
/// same normalization parameters.
pub trait FeatureSource {
    fn value(&self, dim: Dimension) -> f64;
}

/// One catalog entry. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneRecord {
    pub brand: String,
    pub ram_gb: f64,
    pub battery_mah: f64,
    pub screen_in: f64,
    pub weight_g: f64,
    pub launch_year: i32,
    pub price_usd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub front_camera_mp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back_camera_mp: Option<f64>,
}

impl PhoneRecord {
    /// Check the loader-side invariant: every numeric field finite and > 0.
    pub fn validate(&self) -> Result<()> {
        for dim in Dimension::ALL {
            check_positive(dim.as_str(), self.value(dim))?;
        }
        if let Some(mp) = self.front_camera_mp {
            check_positive("front_camera_mp", mp)?;
        }
        if let Some(mp) = self.back_camera_mp {
            check_positive("back_camera_mp", mp)?;
        }
        if self.brand.trim().is_empty() {
            return Err(AnalyticsError::InvalidArgument("brand is empty".to_string()));
        }
        Ok(())
    }
}

impl FeatureSource for PhoneRecord {
    fn value(&self, dim: Dimension) -> f64 {
        match dim {
            Dimension::Ram => self.ram_gb,
            Dimension::Battery => self.battery_mah,
            Dimension::Screen => self.screen_in,
            Dimension::Weight => self.weight_g,
            Dimension::Year => self.launch_year as f64,
            Dimension::Price => self.price_usd,
        }
    }
}

/// A query specification over the six base dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhoneSpec {
    pub ram_gb: f64,
    pub battery_mah: f64,
    pub screen_in: f64,
    pub weight_g: f64,
    pub launch_year: i32,
    pub price_usd: f64,
}

impl PhoneSpec {
    pub fn validate(&self) -> Result<()> {
        for dim in Dimension::ALL {
            check_positive(dim.as_str(), self.value(dim))?;
        }
        Ok(())
    }
}

impl FeatureSource for PhoneSpec {
    fn value(&self, dim: Dimension) -> f64 {
        match dim {
            Dimension::Ram => self.ram_gb,
            Dimension::Battery => self.battery_mah,
            Dimension::Screen => self.screen_in,
            Dimension::Weight => self.weight_g,
            Dimension::Year => self.launch_year as f64,
            Dimension::Price => self.price_usd,
        }
    }
}

impl From<&PhoneRecord> for PhoneSpec {
    fn from(r: &PhoneRecord) -> Self {
        Self {
            ram_gb: r.ram_gb,
            battery_mah: r.battery_mah,
            screen_in: r.screen_in,
            weight_g: r.weight_g,
            launch_year: r.launch_year,
            price_usd: r.price_usd,
        }
    }
}

/// Normalized values over an ordered dimension list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub dims: Vec<Dimension>,
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value for `dim`, if the vector covers it.
    pub fn get(&self, dim: Dimension) -> Option<f64> {
        self.dims
            .iter()
            .position(|d| *d == dim)
            .map(|i| self.values[i])
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AnalyticsError::InvalidArgument(format!(
            "{name} must be finite and > 0, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> PhoneRecord {
        PhoneRecord {
            brand: "Pixel".to_string(),
            ram_gb: 8.0,
            battery_mah: 4500.0,
            screen_in: 6.3,
            weight_g: 190.0,
            launch_year: 2023,
            price_usd: 699.0,
            front_camera_mp: Some(10.5),
            back_camera_mp: None,
        }
    }

    #[test]
    fn valid_record_passes() {
        assert!(record().validate().is_ok());
    }

    #[test]
    fn non_positive_field_rejected() {
        let mut r = record();
        r.weight_g = 0.0;
        let err = r.validate().unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidArgument(ref m) if m.contains("weight")));
    }

    #[test]
    fn nan_camera_rejected() {
        let mut r = record();
        r.back_camera_mp = Some(f64::NAN);
        assert!(r.validate().is_err());
    }

    #[test]
    fn spec_from_record_copies_dimensions() {
        let r = record();
        let spec = PhoneSpec::from(&r);
        for dim in Dimension::ALL {
            assert_eq!(spec.value(dim), r.value(dim));
        }
    }

    #[test]
    fn feature_vector_lookup_by_dimension() {
        let fv = FeatureVector {
            dims: vec![Dimension::Price, Dimension::Ram],
            values: vec![1.5, -0.5],
        };
        assert_eq!(fv.get(Dimension::Ram), Some(-0.5));
        assert_eq!(fv.get(Dimension::Weight), None);
    }

    #[test]
    fn record_deserializes_without_cameras() {
        let json = r#"{"brand":"Nokia","ram_gb":4,"battery_mah":3000,"screen_in":5.5,
            "weight_g":160,"launch_year":2020,"price_usd":150}"#;
        let r: PhoneRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.front_camera_mp, None);
        assert_eq!(r.launch_year, 2020);
    }
}
