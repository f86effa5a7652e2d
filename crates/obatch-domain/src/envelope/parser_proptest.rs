//! Property-based tests for the envelope parser.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::envelope::parse_envelope;
    use crate::error::DomainError;

    fn set_name() -> impl Strategy<Value = String> {
        "[A-Z][a-zA-Z]{0,10}"
    }

    fn request_line() -> impl Strategy<Value = String> {
        prop_oneof![
            set_name().prop_map(|s| format!("GET {s} HTTP/1.1")),
            set_name().prop_map(|s| format!("POST {s} HTTP/1.1")),
            (set_name(), "[a-z0-9]{1,8}").prop_map(|(s, k)| format!("DELETE {s}('{k}') HTTP/1.1")),
            (set_name(), "[a-z0-9]{1,8}", set_name())
                .prop_map(|(s, k, t)| format!("POST {s}('{k}')/_{t} HTTP/1.1")),
        ]
    }

    fn wrap(lines: &[String], crlf: bool) -> String {
        let nl = if crlf { "\r\n" } else { "\n" };
        let mut body = String::new();
        for line in lines {
            body.push_str(&format!(
                "--batch{nl}Content-Type: application/http{nl}{nl}{line}{nl}{nl}"
            ));
        }
        body.push_str(&format!("--batch--{nl}"));
        body
    }

    proptest! {
        #[test]
        fn test_parts_keep_source_order(lines in prop::collection::vec(request_line(), 1..20), crlf in any::<bool>()) {
            let env = parse_envelope("batch", &wrap(&lines, crlf)).unwrap();
            prop_assert_eq!(env.parts.len(), lines.len());
            for (i, (part, line)) in env.parts.iter().zip(&lines).enumerate() {
                prop_assert_eq!(part.index, i);
                prop_assert_eq!(&part.request_line(), line);
            }
        }

        #[test]
        fn test_one_bad_line_rejects_everything(
            lines in prop::collection::vec(request_line(), 1..10),
            at in any::<prop::sample::Index>(),
            set in set_name(),
        ) {
            let mut lines = lines;
            let bad = format!("GET {set}('k')/ HTTP/1.1");
            let pos = at.index(lines.len() + 1);
            lines.insert(pos, bad.clone());
            let err = parse_envelope("batch", &wrap(&lines, true)).unwrap_err();
            prop_assert_eq!(err, DomainError::PathFormat { request_line: bad });
        }

        #[test]
        fn test_arbitrary_input_never_panics(body in ".{0,300}") {
            let _ = parse_envelope("batch", &body);
        }
    }
}
