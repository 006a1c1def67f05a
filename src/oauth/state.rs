// Anti-forgery state for the provider handshake
//
// `state` is an HS256 JWT over the login request's query arguments, signed
// with a random per-login secret that only the encrypted state cookie knows.

use std::collections::HashMap;

use super::OAuthError;
use crate::utils::crypto::{create_hs256_jwt, verify_hs256_jwt};

/// Query arguments with every value kept, in request order
pub type StateArgs = HashMap<String, Vec<String>>;

/// Collect a query string into [`StateArgs`]
#[must_use]
pub fn query_args(query_string: &str) -> StateArgs {
    let mut args = StateArgs::new();
    for (key, value) in url::form_urlencoded::parse(query_string.as_bytes()) {
        args.entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    args
}

/// # Errors
///
/// Returns [`OAuthError::InvalidState`] if the arguments cannot be signed
pub fn encode_state(args: &StateArgs, secret: &str) -> Result<String, OAuthError> {
    let payload =
        serde_json::to_value(args).map_err(|e| OAuthError::InvalidState(e.to_string()))?;
    create_hs256_jwt(&payload, secret.as_bytes())
        .map_err(|e| OAuthError::InvalidState(e.to_string()))
}

/// # Errors
///
/// Returns [`OAuthError::InvalidState`] if the signature does not match or the payload is not
/// a map of string lists
pub fn decode_state(state: &str, secret: &str) -> Result<StateArgs, OAuthError> {
    let payload = verify_hs256_jwt(state, secret.as_bytes())
        .map_err(|e| OAuthError::InvalidState(e.to_string()))?;
    serde_json::from_value(payload).map_err(|e| OAuthError::InvalidState(e.to_string()))
}

/// Post-login target carried through the handshake, `next` before `redirect`
#[must_use]
pub fn redirect_from_state(args: &StateArgs) -> Option<&str> {
    ["next", "redirect"]
        .iter()
        .find_map(|key| args.get(*key).and_then(|values| values.first()))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_args_keep_repeated_values() {
        let args = query_args("redirect=%2Fdashboard%2F5&tag=a&tag=b");
        assert_eq!(args["redirect"], vec!["/dashboard/5"]);
        assert_eq!(args["tag"], vec!["a", "b"]);
        assert!(query_args("").is_empty());
    }

    #[test]
    fn test_state_roundtrip_with_secret() {
        let args = query_args("next=%2Fsqllab%2F");
        let state = encode_state(&args, "per-login-secret").unwrap();

        let decoded = decode_state(&state, "per-login-secret").unwrap();
        assert_eq!(redirect_from_state(&decoded), Some("/sqllab/"));
    }

    #[test]
    fn test_state_with_other_secret_is_rejected() {
        let state = encode_state(&StateArgs::new(), "per-login-secret").unwrap();
        assert!(matches!(
            decode_state(&state, "attacker-secret"),
            Err(OAuthError::InvalidState(_))
        ));
    }

    #[test]
    fn test_redirect_prefers_next() {
        let args = query_args("redirect=%2Fb&next=%2Fa");
        assert_eq!(redirect_from_state(&args), Some("/a"));
        assert_eq!(redirect_from_state(&StateArgs::new()), None);
    }
}
