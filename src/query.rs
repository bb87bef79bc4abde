use std::fmt::Display;

/// Default row cap per request. Rows beyond it are dropped by the service.
pub const DEFAULT_LIMIT: usize = 20_000;

/// SoQL simple-filter request: ordered field-equality predicates plus a row limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub(crate) predicates: Vec<(String, String)>,
    pub(crate) limit: usize,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Query {
    pub fn new() -> Self {
        Self {
            predicates: Vec::new(),
            limit: DEFAULT_LIMIT,
        }
    }

    /// Add a `field = value` predicate. A repeated field replaces the earlier value.
    pub fn kw(mut self, field: impl Into<String>, value: impl Display) -> Self {
        self.set(field, value.to_string());
        self
    }

    /// Like [`Query::kw`], but `None` leaves the field unfiltered.
    pub fn kw_opt(self, field: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.kw(field, v),
            None => self,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Construct a query from an iterator of field/value pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Display,
    {
        let mut q = Self::new();
        for (k, v) in pairs {
            q = q.kw(k, v);
        }
        q
    }

    pub fn set(&mut self, field: impl Into<String>, value: String) {
        let field = field.into();
        match self.predicates.iter_mut().find(|(k, _)| *k == field) {
            Some(slot) => slot.1 = value,
            None => self.predicates.push((field, value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.predicates
            .iter()
            .find(|(k, _)| k == field)
            .map(|(_, v)| v.as_str())
    }

    pub fn row_limit(&self) -> usize {
        self.limit
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.predicates.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Query-string pairs in request order, `$limit` first.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut out = Vec::with_capacity(self.predicates.len() + 1);
        out.push(("$limit".to_string(), self.limit.to_string()));
        out.extend(self.predicates.iter().cloned());
        out
    }
}
