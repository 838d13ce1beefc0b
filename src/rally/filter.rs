use std::fmt;

/// Server-side filter expression. Renders in the service's query language,
/// one parenthesised binary expression per combinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFilter {
    Equals { field: String, value: String },
    And(Box<QueryFilter>, Box<QueryFilter>),
    Or(Box<QueryFilter>, Box<QueryFilter>),
    /// User-supplied expression passed through verbatim.
    Raw(String),
}

impl QueryFilter {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn raw(expression: impl Into<String>) -> Self {
        Self::Raw(expression.into())
    }

    pub fn and(self, other: QueryFilter) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: QueryFilter) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// `field = v1 OR field = v2 ...`; `None` when there are no values.
    pub fn any_of<I, S>(field: &str, values: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        values
            .into_iter()
            .map(|v| Self::equals(field, v))
            .reduce(QueryFilter::or)
    }

    /// Conjunction of every filter; `None` when empty.
    pub fn all_of(filters: impl IntoIterator<Item = QueryFilter>) -> Option<Self> {
        filters.into_iter().reduce(QueryFilter::and)
    }
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '(' || c == ')' || c == '"')
}

impl fmt::Display for QueryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryFilter::Equals { field, value } => {
                if needs_quotes(value) {
                    write!(f, "({field} = \"{}\")", value.replace('"', "\\\""))
                } else {
                    write!(f, "({field} = {value})")
                }
            }
            QueryFilter::And(a, b) => write!(f, "({a} AND {b})"),
            QueryFilter::Or(a, b) => write!(f, "({a} OR {b})"),
            QueryFilter::Raw(expr) => f.write_str(expr),
        }
    }
}
