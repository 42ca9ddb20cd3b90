// ABOUTME: Parameter values: literals, lists, or deferred resolver expressions.
// ABOUTME: Resolver arguments are themselves parameter values, forming a tree.

use serde::Deserialize;

/// A stack parameter as declared in configuration.
///
/// Literal scalars are kept as strings; lists are joined with commas once
/// resolved. Resolver expressions are evaluated at action time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "RawParam")]
pub enum ParamValue {
    Literal(String),
    List(Vec<ParamValue>),
    Resolver(ResolverExpr),
}

/// A typed handle naming a resolver kind and its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverExpr {
    #[serde(rename = "resolver")]
    pub kind: String,
    #[serde(default)]
    pub args: Vec<ParamValue>,
}

impl ParamValue {
    pub fn literal(value: impl Into<String>) -> Self {
        ParamValue::Literal(value.into())
    }

    pub fn resolver<I>(kind: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = ParamValue>,
    {
        ParamValue::Resolver(ResolverExpr::new(kind, args))
    }

    /// Literal text, if this value needs no resolution.
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            ParamValue::Literal(s) => Some(s),
            _ => None,
        }
    }

    /// Every resolver expression in this value, outermost first.
    pub fn resolver_exprs(&self) -> Vec<&ResolverExpr> {
        let mut found = Vec::new();
        self.collect_exprs(&mut found);
        found
    }

    fn collect_exprs<'a>(&'a self, found: &mut Vec<&'a ResolverExpr>) {
        match self {
            ParamValue::Literal(_) => {}
            ParamValue::List(items) => {
                for item in items {
                    item.collect_exprs(found);
                }
            }
            ParamValue::Resolver(expr) => {
                found.push(expr);
                for arg in &expr.args {
                    arg.collect_exprs(found);
                }
            }
        }
    }
}

impl ResolverExpr {
    pub fn new<I>(kind: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = ParamValue>,
    {
        Self {
            kind: kind.into(),
            args: args.into_iter().collect(),
        }
    }

    /// Literal arguments, or `None` when any argument is itself deferred.
    pub fn literal_args(&self) -> Option<Vec<&str>> {
        self.args.iter().map(ParamValue::as_literal).collect()
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::literal(value)
    }
}

impl From<ResolverExpr> for ParamValue {
    fn from(expr: ResolverExpr) -> Self {
        ParamValue::Resolver(expr)
    }
}

// YAML scalars arrive typed; parameters are always text.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawParam {
    Resolver(ResolverExpr),
    List(Vec<ParamValue>),
    Bool(bool),
    // Integral floats keep their fraction: `1.0` stays `1.0`.
    Number(serde_yaml::Number),
    Text(String),
}

impl From<RawParam> for ParamValue {
    fn from(raw: RawParam) -> Self {
        match raw {
            RawParam::Resolver(expr) => ParamValue::Resolver(expr),
            RawParam::List(items) => ParamValue::List(items),
            RawParam::Bool(b) => ParamValue::Literal(b.to_string()),
            RawParam::Number(n) => ParamValue::Literal(n.to_string()),
            RawParam::Text(s) => ParamValue::Literal(s),
        }
    }
}
