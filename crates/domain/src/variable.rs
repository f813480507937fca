//! Run-scoped variables written by perception steps and read by later steps.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// An untyped variable value.
///
/// Serialized untagged, so a stored point reads as `{"x": 1, "y": 2}` and
/// a cleared variable as `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Point(Point),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The value as a point, if it is point-shaped.
    #[must_use]
    pub fn as_point(&self) -> Option<Point> {
        match self {
            Self::Point(point) => Some(*point),
            _ => None,
        }
    }
}

impl From<Point> for Value {
    fn from(value: Point) -> Self {
        Self::Point(value)
    }
}

impl From<Option<Point>> for Value {
    fn from(value: Option<Point>) -> Self {
        value.map_or(Self::Null, Self::Point)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// String form used by `variable_equals` comparisons.
impl fmt::Display for Value {
    #[allow(clippy::cast_possible_truncation)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(value) if value.is_finite() && value.fract() == 0.0 => {
                write!(f, "{}", *value as i64)
            }
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
            Self::Point(point) => write!(f, "{},{}", point.x, point.y),
        }
    }
}

/// The variable scope of one run. Shared by every nested step; later writes
/// overwrite earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variables(HashMap<String, Value>);

impl Variables {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// The named variable as a point, `None` when missing or not point-shaped.
    #[must_use]
    pub fn point(&self, name: &str) -> Option<Point> {
        self.get(name).and_then(Value::as_point)
    }

    /// String form of the named variable; a missing variable reads as `"null"`.
    #[must_use]
    pub fn display(&self, name: &str) -> String {
        self.get(name).map_or_else(|| Value::Null.to_string(), ToString::to_string)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_render_values_for_comparison() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::from("ready").to_string(), "ready");
        assert_eq!(Value::from(Point::new(4, 5)).to_string(), "4,5");
    }

    #[test]
    fn should_read_missing_variable_as_null() {
        let vars = Variables::new();
        assert_eq!(vars.display("nope"), "null");
        assert!(vars.point("nope").is_none());
    }

    #[test]
    fn should_overwrite_on_later_write() {
        let mut vars = Variables::new();
        vars.set("p", Point::new(1, 2));
        vars.set("p", Value::Null);
        assert_eq!(vars.get("p"), Some(&Value::Null));
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn should_store_none_point_as_null() {
        let mut vars = Variables::new();
        vars.set("p", None::<Point>);
        assert!(vars.get("p").is_some_and(Value::is_null));
    }

    #[test]
    fn should_deserialize_point_shaped_json_as_point() {
        let value: Value = serde_json::from_value(serde_json::json!({"x": 10, "y": 20})).unwrap();
        assert_eq!(value.as_point(), Some(Point::new(10, 20)));
        let value: Value = serde_json::from_value(serde_json::json!(null)).unwrap();
        assert!(value.is_null());
    }
}
