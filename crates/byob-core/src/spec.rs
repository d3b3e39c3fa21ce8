//! Block spec tokenizer.
//!
//! A definition's spec is a space-separated token string: plain label words,
//! `%name` input references and `$nl` line breaks. A `'` toggles a quoting
//! mode in which spaces do not split, so label words and input names may
//! contain spaces (`%'step size'`). Quote characters only delimit; they are
//! not part of the resulting token.
//!
//! The semantic ("compiled") spec produced from a definition uses type tags
//! instead of input names (`move %n steps`) and `%br` for line breaks. It
//! never needs quoting and is split with [`split_block_spec`].

/// Line break marker in a definition spec.
pub const LINE_BREAK: &str = "$nl";

/// Line break marker in a semantic block spec.
pub const BREAK_TAG: &str = "%br";

/// Input placeholder in abstract specs and translations.
pub const PLACEHOLDER: &str = "_";

/// Splits a definition spec into tokens.
///
/// Total and forgiving: unbalanced quotes simply keep the rest of the string
/// in one token. Consecutive spaces yield empty tokens, and the empty spec
/// yields a single empty token, so that [`join_spec`] reproduces the input.
pub fn parse_spec(spec: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut word = String::new();
    let mut quoted = false;

    for c in spec.chars() {
        match c {
            '\'' => quoted = !quoted,
            ' ' if !quoted => parts.push(std::mem::take(&mut word)),
            _ => word.push(c),
        }
    }
    parts.push(word);
    parts
}

/// Returns `true` if the token references an input (`%` followed by at
/// least one character).
pub fn is_input_token(token: &str) -> bool {
    token.len() > 1 && token.starts_with('%')
}

/// Returns the input name referenced by a `%name` token.
pub fn input_name(token: &str) -> Option<&str> {
    if is_input_token(token) {
        Some(&token[1..])
    } else {
        None
    }
}

/// Renders an input reference, quoting names that contain spaces.
pub fn input_token(name: &str) -> String {
    if name.contains(' ') {
        format!("%'{name}'")
    } else {
        format!("%{name}")
    }
}

/// Joins tokens back into a definition spec.
///
/// Tokens containing spaces are re-quoted so that the result parses back to
/// the same token sequence. Surrounding whitespace is trimmed.
pub fn join_spec<S: AsRef<str>>(tokens: &[S]) -> String {
    let rendered: Vec<String> = tokens
        .iter()
        .map(|token| {
            let token = token.as_ref();
            match input_name(token) {
                Some(name) => input_token(name),
                None if token.contains(' ') => format!("'{token}'"),
                None => token.to_string(),
            }
        })
        .collect();
    rendered.join(" ").trim().to_string()
}

/// Splits a semantic block spec into its non-empty words.
pub fn split_block_spec(spec: &str) -> Vec<&str> {
    spec.split(' ').filter(|part| !part.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_plain_and_inputs() {
        assert_eq!(
            parse_spec("move %steps steps"),
            vec!["move", "%steps", "steps"]
        );
    }

    #[test]
    fn quotes_suppress_splitting() {
        assert_eq!(
            parse_spec("say %'the message' 'for real'"),
            vec!["say", "%the message", "for real"]
        );
    }

    #[test]
    fn unbalanced_quote_keeps_remainder_together() {
        assert_eq!(parse_spec("a 'b c d"), vec!["a", "b c d"]);
    }

    #[test]
    fn empty_spec_is_single_empty_token() {
        assert_eq!(parse_spec(""), vec![""]);
        assert_eq!(join_spec(&parse_spec("")), "");
    }

    #[test]
    fn input_token_detection() {
        assert!(is_input_token("%n"));
        assert!(!is_input_token("%"));
        assert!(!is_input_token("move"));
        assert_eq!(input_name("%steps"), Some("steps"));
        assert_eq!(input_name("steps"), None);
    }

    #[test]
    fn join_requotes_tokens_with_spaces() {
        let tokens = parse_spec("say %'the message'");
        assert_eq!(join_spec(&tokens), "say %'the message'");
        assert_eq!(parse_spec(&join_spec(&tokens)), tokens);
    }

    #[test]
    fn split_block_spec_drops_empty_words() {
        assert_eq!(split_block_spec(" move  %n steps "), vec!["move", "%n", "steps"]);
    }

    fn spec_token() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z?]{1,6}",
            "[a-z]{1,6}".prop_map(|name| format!("%{name}")),
            Just(LINE_BREAK.to_string()),
        ]
    }

    proptest! {
        #[test]
        fn parse_then_join_reproduces_plain_specs(
            tokens in proptest::collection::vec(spec_token(), 1..8)
        ) {
            let spec = tokens.join(" ");
            let parsed = parse_spec(&spec);
            prop_assert_eq!(&parsed, &tokens);
            prop_assert_eq!(join_spec(&parsed), spec);
            let inputs = parsed.iter().filter(|t| is_input_token(t)).count();
            let percent = tokens.iter().filter(|t| t.starts_with('%')).count();
            prop_assert_eq!(inputs, percent);
        }
    }
}
