//! Parameter schemas for actions.
//!
//! A [`Schema`] maps parameter names to a [`Field`], and a field is an
//! ordered list of [`Rule`]s. [`Schema::validate`] interprets the rules
//! against a parameter object and returns the normalized parameters
//! (defaults applied, values coerced, unknown keys optionally stripped).
//!
//! Rule evaluation per field:
//! 1. `Default` fills a missing value
//! 2. `Required` rejects a missing or null value; otherwise a missing value ends evaluation
//! 3. `Type` checks (and, unless strict, coerces) the value
//! 4. Remaining rules run in declaration order

use offline_first_types::{FieldError, Params, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Value kinds a field can be constrained to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// JSON string.
    String,
    /// Any JSON number.
    Number,
    /// Number without a fractional part.
    Integer,
    /// JSON boolean.
    Boolean,
    /// JSON object.
    Object,
    /// JSON array.
    Array,
}

impl Kind {
    fn name(&self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Number => "number",
            Kind::Integer => "integer",
            Kind::Boolean => "boolean",
            Kind::Object => "object",
            Kind::Array => "array",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Kind::String => value.is_string(),
            Kind::Number => value.is_number(),
            Kind::Integer => value.is_i64() || value.is_u64() || is_whole_f64(value),
            Kind::Boolean => value.is_boolean(),
            Kind::Object => value.is_object(),
            Kind::Array => value.is_array(),
        }
    }

    /// Loose conversions applied when validation is not strict.
    fn coerce(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Kind::Number | Kind::Integer, Value::String(s)) => {
                let n: f64 = s.trim().parse().ok()?;
                let coerced = number_value(n)?;
                self.matches(&coerced).then_some(coerced)
            }
            (Kind::Boolean, Value::String(s)) => match s.trim() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            (Kind::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (Kind::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
            _ => None,
        }
    }
}

fn is_whole_f64(value: &Value) -> bool {
    value.as_f64().is_some_and(|f| f.fract() == 0.0)
}

fn number_value(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Some(Value::Number(Number::from(n as i64)))
    } else {
        Number::from_f64(n).map(Value::Number)
    }
}

/// One constraint on a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Rule {
    /// Value must be present and not null.
    Required,
    /// Value must be of this kind.
    Type {
        /// Expected kind.
        kind: Kind,
    },
    /// Value used when the parameter is missing.
    Default {
        /// The default.
        value: Value,
    },
    /// Value must equal one of these.
    OneOf {
        /// Accepted values.
        values: Vec<Value>,
    },
    /// Lower bound: numeric value, or length of a string or array.
    Min {
        /// Inclusive bound.
        value: f64,
    },
    /// Upper bound: numeric value, or length of a string or array.
    Max {
        /// Inclusive bound.
        value: f64,
    },
    /// Value must be an object matching this nested schema.
    Shape {
        /// Nested fields.
        fields: Schema,
    },
    /// Value must be an array whose elements match this field.
    Items {
        /// Element constraints.
        field: Box<Field>,
    },
}

/// Ordered constraints on one parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Field {
    rules: Vec<Rule>,
}

impl Field {
    /// A field with no constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// A field of the given kind.
    pub fn of(kind: Kind) -> Self {
        Self::new().rule(Rule::Type { kind })
    }

    /// A string field.
    pub fn string() -> Self {
        Self::of(Kind::String)
    }

    /// A number field.
    pub fn number() -> Self {
        Self::of(Kind::Number)
    }

    /// An integer field.
    pub fn integer() -> Self {
        Self::of(Kind::Integer)
    }

    /// A boolean field.
    pub fn boolean() -> Self {
        Self::of(Kind::Boolean)
    }

    /// An object field matching `fields`.
    pub fn object(fields: Schema) -> Self {
        Self::of(Kind::Object).rule(Rule::Shape { fields })
    }

    /// An array field whose elements match `item`.
    pub fn array(item: Field) -> Self {
        Self::of(Kind::Array).rule(Rule::Items {
            field: Box::new(item),
        })
    }

    /// Append a rule.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Require the value.
    pub fn required(self) -> Self {
        self.rule(Rule::Required)
    }

    /// Default for a missing value.
    pub fn default_value(self, value: impl Into<Value>) -> Self {
        self.rule(Rule::Default {
            value: value.into(),
        })
    }

    /// Inclusive lower bound.
    pub fn min(self, value: f64) -> Self {
        self.rule(Rule::Min { value })
    }

    /// Inclusive upper bound.
    pub fn max(self, value: f64) -> Self {
        self.rule(Rule::Max { value })
    }

    /// Restrict to a set of values.
    pub fn one_of<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.rule(Rule::OneOf {
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    /// The rules in declaration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    fn kinds(&self) -> impl Iterator<Item = Kind> + '_ {
        self.rules.iter().filter_map(|r| match r {
            Rule::Type { kind } => Some(*kind),
            _ => None,
        })
    }

    fn check(&self, path: &str) -> Result<(), String> {
        let kinds: Vec<Kind> = self.kinds().collect();
        if kinds.windows(2).any(|w| w[0] != w[1]) {
            return Err(format!("'{path}' declares conflicting types"));
        }
        let kind = kinds.first().copied();

        let mut min = None;
        let mut max = None;
        for rule in &self.rules {
            match rule {
                Rule::Min { value } => min = Some(*value),
                Rule::Max { value } => max = Some(*value),
                Rule::OneOf { values } if values.is_empty() => {
                    return Err(format!("'{path}' accepts no values"));
                }
                Rule::Default { value } => {
                    if let Some(kind) = kind {
                        if !value.is_null() && !kind.matches(value) {
                            return Err(format!("'{path}' default is not a {}", kind.name()));
                        }
                    }
                }
                Rule::Shape { fields } => {
                    if matches!(kind, Some(k) if k != Kind::Object) {
                        return Err(format!("'{path}' has a shape but is not an object"));
                    }
                    fields.check_at(path)?;
                }
                Rule::Items { field } => {
                    if matches!(kind, Some(k) if k != Kind::Array) {
                        return Err(format!("'{path}' has items but is not an array"));
                    }
                    field.check(&format!("{path}[]"))?;
                }
                _ => {}
            }
        }
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(format!("'{path}' has min {min} greater than max {max}"));
            }
        }
        Ok(())
    }

    /// Validate one value. `None` means the parameter is missing.
    fn apply(
        &self,
        path: &str,
        value: Option<Value>,
        opts: &ValidateOptions,
        errors: &mut Vec<FieldError>,
    ) -> Option<Value> {
        let mut value = value.or_else(|| {
            self.rules.iter().find_map(|r| match r {
                Rule::Default { value } => Some(value.clone()),
                _ => None,
            })
        });

        let missing = matches!(value, None | Some(Value::Null));
        if missing {
            if self.rules.contains(&Rule::Required) {
                errors.push(FieldError::new(path, "is required"));
            }
            return value;
        }
        let mut current = value.take()?;

        if let Some(kind) = self.kinds().next() {
            if !kind.matches(&current) {
                match (opts.strict, kind.coerce(&current)) {
                    (false, Some(coerced)) => current = coerced,
                    _ => {
                        errors.push(FieldError::new(
                            path,
                            format!("must be of type {}", kind.name()),
                        ));
                        return Some(current);
                    }
                }
            }
        }

        for rule in &self.rules {
            if opts.abort_early && !errors.is_empty() {
                break;
            }
            match rule {
                Rule::Required | Rule::Type { .. } | Rule::Default { .. } => {}
                Rule::OneOf { values } => {
                    if !values.contains(&current) {
                        errors.push(FieldError::new(path, "is not an accepted value"));
                    }
                }
                Rule::Min { value: bound } => {
                    if let Some(measure) = measure(&current) {
                        if measure < *bound {
                            errors.push(FieldError::new(path, format!("must be at least {bound}")));
                        }
                    }
                }
                Rule::Max { value: bound } => {
                    if let Some(measure) = measure(&current) {
                        if measure > *bound {
                            errors.push(FieldError::new(path, format!("must be at most {bound}")));
                        }
                    }
                }
                Rule::Shape { fields } => match current {
                    Value::Object(map) => {
                        current = Value::Object(fields.apply(path, map, opts, errors));
                    }
                    _ => errors.push(FieldError::new(path, "must be an object")),
                },
                Rule::Items { field } => match current {
                    Value::Array(items) => {
                        let mut normalized = Vec::with_capacity(items.len());
                        for (i, item) in items.into_iter().enumerate() {
                            if opts.abort_early && !errors.is_empty() {
                                break;
                            }
                            let item_path = format!("{path}[{i}]");
                            if let Some(v) = field.apply(&item_path, Some(item), opts, errors) {
                                normalized.push(v);
                            }
                        }
                        current = Value::Array(normalized);
                    }
                    _ => errors.push(FieldError::new(path, "must be an array")),
                },
            }
        }
        Some(current)
    }
}

/// Size used by `Min`/`Max`: the number itself, or a length.
fn measure(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(a) => Some(a.len() as f64),
        _ => None,
    }
}

/// Options for schema validation.
///
/// Defaults: stop at the first failure, keep unknown keys, coerce loosely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidateOptions {
    /// Stop at the first failed rule.
    pub abort_early: bool,
    /// Remove keys the schema does not declare.
    pub strip_unknown: bool,
    /// Reject instead of coercing mismatched types.
    pub strict: bool,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            abort_early: true,
            strip_unknown: false,
            strict: false,
        }
    }
}

/// Parameter name → field constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: BTreeMap<String, Field>,
}

impl Schema {
    /// An empty schema (accepts any object).
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Declared fields.
    pub fn fields(&self) -> &BTreeMap<String, Field> {
        &self.fields
    }

    /// Reject schemas whose rules can never be satisfied or contradict each other.
    pub fn check(&self) -> Result<(), String> {
        self.check_at("")
    }

    fn check_at(&self, prefix: &str) -> Result<(), String> {
        for (name, field) in &self.fields {
            if name.is_empty() {
                return Err("field names must not be empty".to_string());
            }
            field.check(&join(prefix, name))?;
        }
        Ok(())
    }

    /// Validate `params`, returning the normalized parameters.
    pub fn validate(
        &self,
        params: Params,
        opts: &ValidateOptions,
    ) -> Result<Params, ValidationError> {
        let mut errors = Vec::new();
        let normalized = self.apply("", params, opts, &mut errors);
        if errors.is_empty() {
            Ok(normalized)
        } else {
            Err(ValidationError { errors })
        }
    }

    fn apply(
        &self,
        prefix: &str,
        mut params: Map<String, Value>,
        opts: &ValidateOptions,
        errors: &mut Vec<FieldError>,
    ) -> Map<String, Value> {
        let mut out = Map::new();
        for (name, field) in &self.fields {
            if opts.abort_early && !errors.is_empty() {
                break;
            }
            let path = join(prefix, name);
            if let Some(v) = field.apply(&path, params.remove(name), opts, errors) {
                out.insert(name.clone(), v);
            }
        }
        if !opts.strip_unknown {
            out.extend(params);
        }
        out
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn todo_schema() -> Schema {
        Schema::new()
            .field("title", Field::string().required().min(1.0))
            .field("priority", Field::integer().default_value(3).min(1.0).max(5.0))
    }

    #[test]
    fn valid_params_pass_and_get_defaults() {
        let out = todo_schema()
            .validate(params(json!({ "title": "milk" })), &ValidateOptions::default())
            .unwrap();

        assert_eq!(out.get("title"), Some(&json!("milk")));
        assert_eq!(out.get("priority"), Some(&json!(3)));
    }

    #[test]
    fn missing_required_field_fails() {
        let err = todo_schema()
            .validate(Params::new(), &ValidateOptions::default())
            .unwrap_err();

        assert!(err.has_path("title"));
    }

    #[test]
    fn null_counts_as_missing_for_required() {
        let err = todo_schema()
            .validate(params(json!({ "title": null })), &ValidateOptions::default())
            .unwrap_err();

        assert_eq!(err.errors[0].message, "is required");
    }

    #[test]
    fn abort_early_stops_at_first_failure() {
        let input = params(json!({ "title": "", "priority": 9 }));

        let early = todo_schema()
            .validate(input.clone(), &ValidateOptions::default())
            .unwrap_err();
        assert_eq!(early.errors.len(), 1);

        let all = todo_schema()
            .validate(
                input,
                &ValidateOptions {
                    abort_early: false,
                    ..ValidateOptions::default()
                },
            )
            .unwrap_err();
        assert_eq!(all.errors.len(), 2);
    }

    #[test]
    fn loose_mode_coerces_strings() {
        let out = todo_schema()
            .validate(
                params(json!({ "title": 42, "priority": "2" })),
                &ValidateOptions::default(),
            )
            .unwrap();

        assert_eq!(out.get("title"), Some(&json!("42")));
        assert_eq!(out.get("priority"), Some(&json!(2)));
    }

    #[test]
    fn strict_mode_rejects_mismatched_types() {
        let err = todo_schema()
            .validate(
                params(json!({ "title": "ok", "priority": "2" })),
                &ValidateOptions {
                    strict: true,
                    ..ValidateOptions::default()
                },
            )
            .unwrap_err();

        assert_eq!(err.errors[0].path, "priority");
        assert_eq!(err.errors[0].message, "must be of type integer");
    }

    #[test]
    fn unknown_keys_kept_unless_stripped() {
        let input = params(json!({ "title": "a", "extra": true }));

        let kept = todo_schema()
            .validate(input.clone(), &ValidateOptions::default())
            .unwrap();
        assert!(kept.contains_key("extra"));

        let stripped = todo_schema()
            .validate(
                input,
                &ValidateOptions {
                    strip_unknown: true,
                    ..ValidateOptions::default()
                },
            )
            .unwrap();
        assert!(!stripped.contains_key("extra"));
    }

    #[test]
    fn nested_shape_reports_dotted_path() {
        let schema = Schema::new().field(
            "owner",
            Field::object(Schema::new().field("email", Field::string().required())).required(),
        );

        let err = schema
            .validate(params(json!({ "owner": {} })), &ValidateOptions::default())
            .unwrap_err();
        assert!(err.has_path("owner.email"));
    }

    #[test]
    fn items_validate_each_element() {
        let schema = Schema::new().field("tags", Field::array(Field::string().max(3.0)));

        let err = schema
            .validate(
                params(json!({ "tags": ["ok", "toolong"] })),
                &ValidateOptions::default(),
            )
            .unwrap_err();
        assert!(err.has_path("tags[1]"));
    }

    #[test]
    fn one_of_restricts_values() {
        let schema = Schema::new().field("state", Field::string().one_of(["open", "done"]));

        assert!(schema
            .validate(params(json!({ "state": "open" })), &ValidateOptions::default())
            .is_ok());
        assert!(schema
            .validate(params(json!({ "state": "lost" })), &ValidateOptions::default())
            .is_err());
    }

    #[test]
    fn optional_missing_field_is_skipped() {
        let schema = Schema::new().field("note", Field::string().min(3.0));
        let out = schema
            .validate(Params::new(), &ValidateOptions::default())
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn check_rejects_contradictions() {
        assert!(todo_schema().check().is_ok());

        let inverted = Schema::new().field("n", Field::number().min(5.0).max(1.0));
        assert!(inverted.check().is_err());

        let conflicting = Schema::new().field("n", Field::number().rule(Rule::Type {
            kind: Kind::String,
        }));
        assert!(conflicting.check().is_err());

        let empty_choice =
            Schema::new().field("n", Field::new().rule(Rule::OneOf { values: vec![] }));
        assert!(empty_choice.check().is_err());

        let bad_default = Schema::new().field("n", Field::number().default_value("x"));
        assert!(bad_default.check().is_err());

        let unnamed = Schema::new().field("", Field::string());
        assert!(unnamed.check().is_err());
    }

    #[test]
    fn schema_deserializes_from_json() {
        let schema: Schema = serde_json::from_value(json!({
            "title": [{ "rule": "type", "kind": "string" }, { "rule": "required" }]
        }))
        .unwrap();

        assert!(schema
            .validate(Params::new(), &ValidateOptions::default())
            .is_err());
    }

    #[test]
    fn validate_options_deserialize_with_defaults() {
        let opts: ValidateOptions =
            serde_json::from_value(json!({ "stripUnknown": true })).unwrap();
        assert!(opts.abort_early);
        assert!(opts.strip_unknown);
        assert!(!opts.strict);
    }
}
