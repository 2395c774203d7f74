use eyre::Result;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

#[derive(Clone)]
pub enum Auth {
    /// OAuth bearer token, as used by Google Cloud APIs
    Bearer(String),
    /// Snowflake session token returned by a login request
    Snowflake(String),
    /// Don't use any authentication
    None,
}

impl Auth {
    /// Add the `Authorization` header for this scheme, if any
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<()> {
        let value = match self {
            Self::Bearer(token) => format!("Bearer {}", token),
            Self::Snowflake(token) => format!("Snowflake Token=\"{}\"", token),
            Self::None => return Ok(()),
        };
        let mut value = HeaderValue::from_str(&value)?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
        Ok(())
    }
}

impl std::fmt::Display for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => write!(f, "Bearer"),
            Self::Snowflake(_) => write!(f, "Snowflake"),
            Self::None => write!(f, "None"),
        }
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Auth::{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header() {
        let mut headers = HeaderMap::new();
        Auth::Bearer("abc".into()).apply(&mut headers).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer abc");
        assert!(headers[AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn test_snowflake_header() {
        let mut headers = HeaderMap::new();
        Auth::Snowflake("tok".into()).apply(&mut headers).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Snowflake Token=\"tok\"");
    }

    #[test]
    fn test_none_adds_nothing() {
        let mut headers = HeaderMap::new();
        Auth::None.apply(&mut headers).unwrap();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_debug_hides_token() {
        let auth = Auth::Bearer("secret".into());
        assert!(!format!("{:?}", auth).contains("secret"));
    }
}
