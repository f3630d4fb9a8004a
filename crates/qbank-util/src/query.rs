//! URL query parameter parsing.

/// Query parameters of a URL, in order of appearance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryVars {
    pairs: Vec<(String, String)>,
}

impl QueryVars {
    /// Parse the query of `url`.
    ///
    /// The part after the first `?` (up to any `#`) is split on `&`, each
    /// piece on its first `=`. A parameter without `=` gets an empty value.
    /// Values are returned as written, without percent-decoding.
    pub fn parse(url: &str) -> Self {
        let Some((_, rest)) = url.split_once('?') else {
            return Self::default();
        };
        let query = rest.split_once('#').map_or(rest, |(q, _)| q);
        let pairs = query
            .split('&')
            .filter(|piece| !piece.is_empty())
            .map(|piece| match piece.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (piece.to_string(), String::new()),
            })
            .collect();
        Self { pairs }
    }

    /// Value of the first parameter named `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Parameter names in order of appearance.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.pairs
    }
}

/// Shorthand for [`QueryVars::parse`].
pub fn query_vars(url: &str) -> QueryVars {
    QueryVars::parse(url)
}
