//! Search-state types observed by the connector.
//!
//! The host hands the connector a full search state on every change. Only the
//! query and the refinement maps matter for reporting, so everything else in
//! the host payload is ignored during deserialization.

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

/// An attribute-keyed map that keeps insertion (or document) order.
///
/// Encoding walks refinements in the order the host supplied them, so a
/// hash map would make the output depend on hashing.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> AttributeMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert or replace the value for `attribute`, keeping its original position.
    pub fn insert(&mut self, attribute: impl Into<String>, value: V) {
        let attribute = attribute.into();
        match self.entries.iter_mut().find(|(a, _)| *a == attribute) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((attribute, value)),
        }
    }

    pub fn get(&self, attribute: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(a, _)| a == attribute)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, attribute: &str) -> bool {
        self.get(attribute).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(a, v)| (a.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for AttributeMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for AttributeMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (attribute, value) in iter {
            map.insert(attribute, value);
        }
        map
    }
}

impl<V: Serialize> Serialize for AttributeMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (attribute, value) in &self.entries {
            map.serialize_entry(attribute, value)?;
        }
        map.end()
    }
}

/// A per-attribute refinement value read from host JSON.
///
/// Host state is not validated upstream, so a value that does not fit
/// yields `None` and the attribute is left out rather than failing the
/// whole snapshot.
pub trait RefinementValue: Sized {
    fn from_json(value: Value) -> Option<Self>;
}

/// Facet values: strings as-is, numbers and booleans as text.
impl RefinementValue for Vec<String> {
    fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(items.into_iter().filter_map(facet_value_text).collect()),
            _ => None,
        }
    }
}

fn facet_value_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl RefinementValue for NumericFilter {
    fn from_json(value: Value) -> Option<Self> {
        Some(NumericFilter::from_json(&value))
    }
}

/// Anything other than a map (including `null`) reads as an empty map.
impl<'de, V: RefinementValue> Deserialize<'de> for AttributeMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AttributeMapVisitor<V>(PhantomData<V>);

        impl<'de, V: RefinementValue> Visitor<'de> for AttributeMapVisitor<V> {
            type Value = AttributeMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map keyed by attribute name")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = AttributeMap::new();
                while let Some((attribute, value)) = access.next_entry::<String, Value>()? {
                    match V::from_json(value) {
                        Some(value) => map.insert(attribute, value),
                        None => tracing::debug!(%attribute, "Ignoring malformed refinement"),
                    }
                }
                Ok(map)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                while access.next_element::<IgnoredAny>()?.is_some() {}
                Ok(AttributeMap::new())
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(AttributeMap::new())
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(AttributeMap::new())
            }

            fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
                Ok(AttributeMap::new())
            }

            fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
                Ok(AttributeMap::new())
            }

            fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
                Ok(AttributeMap::new())
            }

            fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
                Ok(AttributeMap::new())
            }

            fn visit_str<E: de::Error>(self, _: &str) -> Result<Self::Value, E> {
                Ok(AttributeMap::new())
            }
        }

        deserializer.deserialize_any(AttributeMapVisitor(PhantomData))
    }
}

/// Facet values selected per attribute, in selection order.
pub type FacetRefinements = AttributeMap<Vec<String>>;

/// Numeric filters per attribute.
pub type NumericRefinements = AttributeMap<NumericFilter>;

/// A numeric filter on one attribute.
///
/// Bounds win over equality values when both are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(into = "RawNumericFilter")]
pub enum NumericFilter {
    /// Both `>=` and `<=` are set
    Range { lower: f64, upper: f64 },
    /// Only `>=` is set
    AtLeast(f64),
    /// Only `<=` is set
    AtMost(f64),
    /// Only `=` is set
    Equals(Vec<f64>),
    /// None of the recognized operators is set
    #[default]
    Unconstrained,
}

impl NumericFilter {
    /// Build a filter from the presence of each operator.
    pub fn from_operators(lower: Option<f64>, upper: Option<f64>, equals: Vec<f64>) -> Self {
        match (lower, upper) {
            (Some(lower), Some(upper)) => NumericFilter::Range { lower, upper },
            (Some(lower), None) => NumericFilter::AtLeast(lower),
            (None, Some(upper)) => NumericFilter::AtMost(upper),
            (None, None) if !equals.is_empty() => NumericFilter::Equals(equals),
            (None, None) => NumericFilter::Unconstrained,
        }
    }

    /// Read a filter from its wire form.
    ///
    /// Operands that are not numbers are dropped; a bound takes the first
    /// numeric operand. Input with no usable operator is `Unconstrained`.
    pub fn from_json(filter: &Value) -> Self {
        NumericFilter::from_operators(
            operands(filter, ">=").first().copied(),
            operands(filter, "<=").first().copied(),
            operands(filter, "="),
        )
    }
}

fn operands(filter: &Value, operator: &str) -> Vec<f64> {
    match filter.get(operator) {
        Some(Value::Number(n)) => n.as_f64().into_iter().collect(),
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_f64).collect(),
        _ => Vec::new(),
    }
}

impl<'de> Deserialize<'de> for NumericFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(NumericFilter::from_json(&value))
    }
}

/// Wire form of a numeric filter: operator symbol to value(s).
#[derive(Debug, Clone, Default, Serialize)]
struct RawNumericFilter {
    #[serde(rename = ">=", default, skip_serializing_if = "Option::is_none")]
    gte: Option<OneOrMany>,
    #[serde(rename = "<=", default, skip_serializing_if = "Option::is_none")]
    lte: Option<OneOrMany>,
    #[serde(rename = "=", default, skip_serializing_if = "Option::is_none")]
    eq: Option<OneOrMany>,
}

/// A bound is written as a bare number, equality values as an array.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum OneOrMany {
    One(f64),
    Many(Vec<f64>),
}

impl From<NumericFilter> for RawNumericFilter {
    fn from(filter: NumericFilter) -> Self {
        let mut raw = RawNumericFilter::default();
        match filter {
            NumericFilter::Range { lower, upper } => {
                raw.gte = Some(OneOrMany::One(lower));
                raw.lte = Some(OneOrMany::One(upper));
            }
            NumericFilter::AtLeast(lower) => raw.gte = Some(OneOrMany::One(lower)),
            NumericFilter::AtMost(upper) => raw.lte = Some(OneOrMany::One(upper)),
            NumericFilter::Equals(values) => raw.eq = Some(OneOrMany::Many(values)),
            NumericFilter::Unconstrained => {}
        }
        raw
    }
}

/// The part of the host search state that drives reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateSnapshot {
    /// Query text as typed by the user
    pub query: String,
    /// Plain (conjunctive) facet refinements
    #[serde(alias = "facetsRefinements")]
    pub facet_refinements: FacetRefinements,
    /// Disjunctive (OR) facet refinements
    #[serde(alias = "disjunctiveFacetsRefinements")]
    pub disjunctive_facet_refinements: FacetRefinements,
    /// Hierarchical facet refinements
    #[serde(alias = "hierarchicalFacetsRefinements")]
    pub hierarchical_facet_refinements: FacetRefinements,
    /// Numeric filters
    pub numeric_refinements: NumericRefinements,
}

impl StateSnapshot {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Merge the three facet sources into one map.
    ///
    /// Sources are visited plain, disjunctive, hierarchical; the first source
    /// to name an attribute keeps it.
    pub fn merged_facet_refinements(&self) -> FacetRefinements {
        let mut merged = FacetRefinements::new();
        for source in [
            &self.facet_refinements,
            &self.disjunctive_facet_refinements,
            &self.hierarchical_facet_refinements,
        ] {
            for (attribute, values) in source.iter() {
                if !merged.contains_key(attribute) {
                    merged.insert(attribute, values.clone());
                }
            }
        }
        merged
    }
}

/// One `render` call: the search state plus the opaque results payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSnapshot {
    #[serde(default)]
    pub state: StateSnapshot,
    #[serde(default)]
    pub results: serde_json::Value,
}

impl SearchSnapshot {
    pub fn new(state: StateSnapshot, results: serde_json::Value) -> Self {
        Self { state, results }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_map_keeps_document_order() {
        let map: FacetRefinements =
            serde_json::from_value(json!({"size": ["M"], "color": ["red"], "brand": ["acme"]}))
                .unwrap();
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["size", "color", "brand"]);
    }

    #[test]
    fn test_attribute_map_replace_keeps_position() {
        let mut map = AttributeMap::new();
        map.insert("a", 1);
        map.insert("b", 2);
        map.insert("a", 3);
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![("a", &3), ("b", &2)]);
    }

    #[test]
    fn test_numeric_filter_from_wire() {
        let filter: NumericFilter = serde_json::from_value(json!({">=": [10], "<=": 20})).unwrap();
        assert_eq!(
            filter,
            NumericFilter::Range {
                lower: 10.0,
                upper: 20.0
            }
        );

        let filter: NumericFilter = serde_json::from_value(json!({"=": [1, 2]})).unwrap();
        assert_eq!(filter, NumericFilter::Equals(vec![1.0, 2.0]));

        let filter: NumericFilter = serde_json::from_value(json!({"<=": 5})).unwrap();
        assert_eq!(filter, NumericFilter::AtMost(5.0));

        let filter: NumericFilter = serde_json::from_value(json!({"!=": 5})).unwrap();
        assert_eq!(filter, NumericFilter::Unconstrained);
    }

    #[test]
    fn test_numeric_filter_ignores_non_numeric_operands() {
        let filter: NumericFilter = serde_json::from_value(json!({">=": "10"})).unwrap();
        assert_eq!(filter, NumericFilter::Unconstrained);

        let filter: NumericFilter = serde_json::from_value(json!({"=": [[10, 20]]})).unwrap();
        assert_eq!(filter, NumericFilter::Unconstrained);

        let filter: NumericFilter = serde_json::from_value(json!({">=": "1", "<=": [20]})).unwrap();
        assert_eq!(filter, NumericFilter::AtMost(20.0));

        let filter: NumericFilter = serde_json::from_value(json!(null)).unwrap();
        assert_eq!(filter, NumericFilter::Unconstrained);
    }

    #[test]
    fn test_malformed_refinements_contribute_nothing() {
        let state: StateSnapshot = serde_json::from_value(json!({
            "query": "tv",
            "facetsRefinements": {"brand": ["acme"], "size": "L", "tags": [null, {}]},
            "disjunctiveFacetsRefinements": null,
            "hierarchicalFacetsRefinements": ["oops"],
            "numericRefinements": {
                "price": {">=": "10"},
                "weight": null,
                "screen": {"=": [[40, 50]]},
                "year": {"<=": 2020}
            }
        }))
        .unwrap();

        assert_eq!(state.query, "tv");
        assert!(!state.facet_refinements.contains_key("size"));
        assert!(state.disjunctive_facet_refinements.is_empty());
        assert!(state.hierarchical_facet_refinements.is_empty());
        assert_eq!(
            crate::core::encode_state(&state),
            "brand=brand_acme&year=year_to2020"
        );
    }

    #[test]
    fn test_scalar_facet_values_read_as_text() {
        let state: StateSnapshot = serde_json::from_value(json!({
            "facetsRefinements": {"rating": [4, 4.5], "in_stock": [true]}
        }))
        .unwrap();
        assert_eq!(
            state.facet_refinements.get("rating"),
            Some(&vec!["4".to_string(), "4.5".to_string()])
        );
        assert_eq!(
            crate::core::encode_state(&state),
            "rating=rating_4+4.5&in_stock=in_stock_true"
        );
    }

    #[test]
    fn test_bounds_win_over_equality() {
        let filter: NumericFilter = serde_json::from_value(json!({">=": 3, "=": [7]})).unwrap();
        assert_eq!(filter, NumericFilter::AtLeast(3.0));
    }

    #[test]
    fn test_numeric_filter_serializes_to_operators() {
        let value = serde_json::to_value(NumericFilter::Range {
            lower: 1.0,
            upper: 2.0,
        })
        .unwrap();
        assert_eq!(value, json!({">=": 1.0, "<=": 2.0}));
    }

    #[test]
    fn test_snapshot_projects_host_state() {
        let state: StateSnapshot = serde_json::from_value(json!({
            "query": "shoes",
            "page": 3,
            "index": "products",
            "facetsRefinements": {"brand": ["acme"]},
            "disjunctiveFacetsRefinements": {"color": ["red", "blue"]},
            "numericRefinements": {"price": {">=": [10]}}
        }))
        .unwrap();

        assert_eq!(state.query, "shoes");
        assert_eq!(
            state.facet_refinements.get("brand"),
            Some(&vec!["acme".to_string()])
        );
        assert_eq!(state.disjunctive_facet_refinements.len(), 1);
        assert!(state.hierarchical_facet_refinements.is_empty());
        assert_eq!(
            state.numeric_refinements.get("price"),
            Some(&NumericFilter::AtLeast(10.0))
        );
    }

    #[test]
    fn test_merge_first_source_wins() {
        let mut state = StateSnapshot::new("");
        state.facet_refinements.insert("brand", vec!["acme".to_string()]);
        state
            .disjunctive_facet_refinements
            .insert("brand", vec!["other".to_string()]);
        state
            .disjunctive_facet_refinements
            .insert("color", vec!["red".to_string()]);
        state
            .hierarchical_facet_refinements
            .insert("category", vec!["shoes > running".to_string()]);

        let merged = state.merged_facet_refinements();
        let entries: Vec<(&str, &Vec<String>)> = merged.iter().collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], ("brand", &vec!["acme".to_string()]));
        assert_eq!(entries[1].0, "color");
        assert_eq!(entries[2].0, "category");
    }
}
