//! Wire format of sensor payloads
//!
//! Every field is optional; the classifier decides which combinations are
//! meaningful. Field names are the broker contract and must not change.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
pub(super) struct WirePayload {
    #[serde(default)]
    pub zone_name: Option<String>,
    #[serde(default)]
    pub object_class: Option<String>,
    /// String or number
    #[serde(default)]
    pub object_id: Option<Value>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub equipment: Option<String>,
    /// Seconds since epoch, possibly fractional
    #[serde(default, deserialize_with = "lenient_number")]
    pub unix_time: Option<f64>,
    /// 0/1 as number, bool or string
    #[serde(default)]
    pub detection_value: Option<Value>,
    #[serde(default, rename = "box")]
    pub boxes: Option<Vec<WireBox>>,
    #[serde(default)]
    pub sensor_namespace: Option<String>,
    #[serde(default)]
    pub severity: Option<Value>,
    #[serde(default)]
    pub details: Option<Value>,

    // Tracking position
    #[serde(default, rename = "position_x", deserialize_with = "lenient_number")]
    pub pos_x: Option<f64>,
    #[serde(default, rename = "position_y", deserialize_with = "lenient_number")]
    pub pos_y: Option<f64>,
    #[serde(default, rename = "position_z", deserialize_with = "lenient_number")]
    pub pos_z: Option<f64>,

    // Diagnostics metrics
    #[serde(default, deserialize_with = "lenient_number")]
    pub non_zero_points_reference: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub non_zero_points: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub mean_intensity_reference: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub mean_intensity: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct WireBox {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub dimensions_x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub dimensions_y: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub dimensions_z: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub position_x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub position_y: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub position_z: Option<f64>,
}

/// Number, numeric string, or anything else as missing
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    })
}
