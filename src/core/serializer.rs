//! Canonical text encoding of active refinements.
//!
//! The encoding is what the analytics sink receives, and (together with the
//! query) what duplicate suppression compares. It must be a pure function of
//! the refinement maps: same maps in the same order, same string.
//!
//! Grammar:
//!
//! ```text
//! facet     attr=attr_v1+v2+...
//! numeric   attr=attr_V            (>= and <= equal)
//!           attr=attr_LOWtoHIGH    (>= and <=)
//!           attr=attr_fromLOW      (>= only)
//!           attr=attr_toHIGH       (<= only)
//!           attr=attr_v1-v2-...    (= only)
//! ```

use crate::core::state::{FacetRefinements, NumericFilter, NumericRefinements, StateSnapshot};

/// Separator between encoded entries and between the facet and numeric parts.
pub const ENTRY_SEPARATOR: &str = "&";

/// Encode facet and numeric refinements into one string.
///
/// `facets` is expected to be already merged across facet sources (see
/// [`StateSnapshot::merged_facet_refinements`]).
pub fn encode_refinements(facets: &FacetRefinements, numeric: &NumericRefinements) -> String {
    [encode_facets(facets), encode_numeric(numeric)]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(ENTRY_SEPARATOR)
}

/// Encode the refinements of a full state snapshot.
pub fn encode_state(state: &StateSnapshot) -> String {
    encode_refinements(
        &state.merged_facet_refinements(),
        &state.numeric_refinements,
    )
}

/// Encode facet refinements. Attributes without values are skipped.
pub fn encode_facets(facets: &FacetRefinements) -> String {
    facets
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(attribute, values)| {
            let attribute = urlencoding::encode(attribute);
            let values = values
                .iter()
                .map(|v| urlencoding::encode(v))
                .collect::<Vec<_>>()
                .join("+");
            format!("{attribute}={attribute}_{values}")
        })
        .collect::<Vec<_>>()
        .join(ENTRY_SEPARATOR)
}

/// Encode numeric refinements. Unconstrained filters are skipped.
pub fn encode_numeric(numeric: &NumericRefinements) -> String {
    numeric
        .iter()
        .filter_map(|(attribute, filter)| {
            encode_numeric_filter(filter).map(|body| format!("{attribute}={attribute}_{body}"))
        })
        .collect::<Vec<_>>()
        .join(ENTRY_SEPARATOR)
}

/// The part after `attr_` for a single numeric filter.
fn encode_numeric_filter(filter: &NumericFilter) -> Option<String> {
    match filter {
        NumericFilter::Range { lower, upper } if lower == upper => Some(format_number(*lower)),
        NumericFilter::Range { lower, upper } => Some(format!(
            "{}to{}",
            format_number(*lower),
            format_number(*upper)
        )),
        NumericFilter::AtLeast(lower) => Some(format!("from{}", format_number(*lower))),
        NumericFilter::AtMost(upper) => Some(format!("to{}", format_number(*upper))),
        NumericFilter::Equals(values) if !values.is_empty() => Some(
            values
                .iter()
                .map(|v| format_number(*v))
                .collect::<Vec<_>>()
                .join("-"),
        ),
        NumericFilter::Equals(_) | NumericFilter::Unconstrained => None,
    }
}

/// Shortest decimal form: integral values print without a fraction.
///
/// Magnitudes at or above 1e21 or below 1e-6 use exponent form with an
/// explicit sign (`1e+21`, `1.5e-7`), as a browser prints them.
fn format_number(value: f64) -> String {
    // f64's Display already prints 10.0 as "10"; -0.0 is the only zero to fold.
    if value == 0.0 {
        return "0".to_string();
    }
    let magnitude = value.abs();
    if magnitude >= 1e21 || magnitude < 1e-6 {
        let text = format!("{value:e}");
        return match text.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => text,
        };
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facets(entries: &[(&str, &[&str])]) -> FacetRefinements {
        entries
            .iter()
            .map(|(a, vs)| (*a, vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    fn numeric(entries: Vec<(&str, NumericFilter)>) -> NumericRefinements {
        entries.into_iter().collect()
    }

    #[test]
    fn test_facet_grammar() {
        let encoded = encode_facets(&facets(&[("color", &["red", "blue"])]));
        assert_eq!(encoded, "color=color_red+blue");
    }

    #[test]
    fn test_facets_joined_in_order() {
        let encoded = encode_facets(&facets(&[("size", &["M"]), ("brand", &["acme", "zeta"])]));
        assert_eq!(encoded, "size=size_M&brand=brand_acme+zeta");
    }

    #[test]
    fn test_facet_text_is_percent_encoded() {
        let encoded = encode_facets(&facets(&[("product type", &["T-shirt & tops", "a+b"])]));
        assert_eq!(
            encoded,
            "product%20type=product%20type_T-shirt%20%26%20tops+a%2Bb"
        );
    }

    #[test]
    fn test_empty_facet_contributes_nothing() {
        let encoded = encode_facets(&facets(&[("color", &[]), ("size", &["L"])]));
        assert_eq!(encoded, "size=size_L");
    }

    #[test]
    fn test_numeric_grammar() {
        let cases = vec![
            (
                NumericFilter::Range {
                    lower: 10.0,
                    upper: 10.0,
                },
                "price=price_10",
            ),
            (
                NumericFilter::Range {
                    lower: 10.0,
                    upper: 20.0,
                },
                "price=price_10to20",
            ),
            (NumericFilter::AtLeast(10.0), "price=price_from10"),
            (NumericFilter::AtMost(20.0), "price=price_to20"),
            (NumericFilter::Equals(vec![10.0, 20.0]), "price=price_10-20"),
            (NumericFilter::AtLeast(9.99), "price=price_from9.99"),
        ];

        for (filter, expected) in cases {
            assert_eq!(encode_numeric(&numeric(vec![("price", filter)])), expected);
        }
    }

    #[test]
    fn test_unconstrained_numeric_contributes_nothing() {
        let refinements = numeric(vec![
            ("price", NumericFilter::Unconstrained),
            ("rating", NumericFilter::Equals(vec![])),
            ("stock", NumericFilter::AtLeast(1.0)),
        ]);
        assert_eq!(encode_numeric(&refinements), "stock=stock_from1");
    }

    #[test]
    fn test_combined_encoding() {
        let encoded = encode_refinements(
            &facets(&[("color", &["red"])]),
            &numeric(vec![("price", NumericFilter::AtMost(50.0))]),
        );
        assert_eq!(encoded, "color=color_red&price=price_to50");
    }

    #[test]
    fn test_empty_part_leaves_no_separator() {
        let facet_only = encode_refinements(&facets(&[("color", &["red"])]), &numeric(vec![]));
        assert_eq!(facet_only, "color=color_red");

        let numeric_only = encode_refinements(
            &FacetRefinements::new(),
            &numeric(vec![("price", NumericFilter::AtLeast(1.0))]),
        );
        assert_eq!(numeric_only, "price=price_from1");

        assert_eq!(
            encode_refinements(&FacetRefinements::new(), &NumericRefinements::new()),
            ""
        );
    }

    #[test]
    fn test_encode_state_merges_sources() {
        let mut state = StateSnapshot::new("shoes");
        state.facet_refinements.insert("brand", vec!["acme".into()]);
        state
            .disjunctive_facet_refinements
            .insert("color", vec!["red".into(), "blue".into()]);
        state
            .hierarchical_facet_refinements
            .insert("category", vec!["Shoes".into()]);
        state.numeric_refinements.insert(
            "price",
            NumericFilter::Range {
                lower: 10.0,
                upper: 20.0,
            },
        );

        assert_eq!(
            encode_state(&state),
            "brand=brand_acme&color=color_red+blue&category=category_Shoes&price=price_10to20"
        );
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let mut state = StateSnapshot::new("q");
        state
            .facet_refinements
            .insert("color", vec!["red".into(), "blue".into()]);
        state
            .numeric_refinements
            .insert("price", NumericFilter::Equals(vec![1.0, 2.0]));

        let copy = state.clone();
        assert_eq!(encode_state(&state), encode_state(&copy));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(-5.5), "-5.5");
        assert_eq!(format_number(0.000001), "0.000001");
        assert_eq!(format_number(123456789012.5), "123456789012.5");
    }

    #[test]
    fn test_format_number_exponent_ranges() {
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(-2.5e22), "-2.5e+22");
        assert_eq!(format_number(1e-7), "1e-7");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
    }
}
