//! Property-based tests for query option bounds.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::model::{QueryFacet, QueryLimits, QueryOptions};

    proptest! {
        #[test]
        fn test_top_within_bounds_is_accepted(top in 0u64..=10_000) {
            let options = QueryOptions::parse(&format!("$top={top}"));
            let facet = QueryFacet::parse(&options, &QueryLimits::default());
            prop_assert_eq!(facet.map(|f| f.top), Ok(Some(top)));
        }

        #[test]
        fn test_negative_top_is_invalid(top in i64::MIN..0) {
            let options = QueryOptions::parse(&format!("$top={top}"));
            let err = QueryFacet::parse(&options, &QueryLimits::default()).unwrap_err();
            prop_assert_eq!(err.code(), "query_invalid_error");
            // Negative values never count towards the batch-wide sum
            prop_assert_eq!(options.top_hint(), 0);
        }

        #[test]
        fn test_non_numeric_top_is_a_parse_error(top in "[a-z]{1,8}") {
            let options = QueryOptions::parse(&format!("$top={top}"));
            let err = QueryFacet::parse(&options, &QueryLimits::default()).unwrap_err();
            prop_assert_eq!(err.code(), "query_parse_error");
        }

        #[test]
        fn test_first_duplicate_wins(first in 0u64..1000, second in 0u64..1000) {
            let options = QueryOptions::parse(&format!("$skip={first}&$skip={second}"));
            let facet = QueryFacet::parse(&options, &QueryLimits::default()).unwrap();
            prop_assert_eq!(facet.skip, Some(first));
        }

        #[test]
        fn test_search_length_bound(len in 1usize..=400) {
            let q = "x".repeat(len);
            let options = QueryOptions::parse(&format!("q={q}"));
            let result = QueryFacet::parse(&options, &QueryLimits::default());
            prop_assert_eq!(result.is_ok(), len <= 255);
        }
    }
}
