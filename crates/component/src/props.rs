//! Declarative prop schemas.

use std::fmt;
use std::rc::Rc;
use vdom::{PropValue, Props};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropType {
    String,
    Number,
    Boolean,
    Array,
    /// Any non-null record or list.
    Object,
    Function,
}

impl PropType {
    pub fn matches(self, value: &PropValue) -> bool {
        match self {
            PropType::String => matches!(value, PropValue::Text(_)),
            PropType::Number => matches!(value, PropValue::Number(_)),
            PropType::Boolean => matches!(value, PropValue::Bool(_)),
            PropType::Array => matches!(value, PropValue::List(_)),
            PropType::Object => matches!(value, PropValue::Record(_) | PropValue::List(_)),
            PropType::Function => matches!(value, PropValue::Handler(_)),
        }
    }
}

type Validator = Rc<dyn Fn(Option<&PropValue>) -> bool>;

/// Rules for one prop. Build with [`PropRule::new`] and the chained setters.
#[derive(Clone, Default)]
pub struct PropRule {
    ty: Option<PropType>,
    required: bool,
    validator: Option<Validator>,
}

impl PropRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_type(mut self, ty: PropType) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Custom check; receives `None` when the prop is absent.
    pub fn validator(mut self, f: impl Fn(Option<&PropValue>) -> bool + 'static) -> Self {
        self.validator = Some(Rc::new(f));
        self
    }
}

impl fmt::Debug for PropRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropRule")
            .field("ty", &self.ty)
            .field("required", &self.required)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Check `props` against `schema`, in schema order.
///
/// Never fails; every violation becomes one message. A missing required
/// prop short-circuits the remaining checks for that prop.
pub fn validate_props(props: &Props, schema: &[(&str, PropRule)]) -> Vec<String> {
    let mut errors = Vec::new();
    for (key, rule) in schema {
        let value = props.get(key);
        if rule.required && value.is_none() {
            errors.push(format!("Missing required prop: {key}"));
            continue;
        }
        if let (Some(value), Some(ty)) = (value, rule.ty) {
            if !ty.matches(value) {
                errors.push(format!("Invalid type for prop {key}"));
            }
        }
        if let Some(validator) = &rule.validator {
            if !validator(value) {
                errors.push(format!("Custom validation failed for prop {key}"));
            }
        }
    }
    if !errors.is_empty() {
        log::debug!(target: "component.props", "{} prop violations", errors.len());
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdom::Handler;

    fn schema() -> Vec<(&'static str, PropRule)> {
        vec![
            ("title", PropRule::new().of_type(PropType::String).required()),
            ("count", PropRule::new().of_type(PropType::Number)),
            (
                "size",
                PropRule::new().validator(|v| {
                    matches!(v, Some(PropValue::Number(n)) if *n > 0.0)
                }),
            ),
        ]
    }

    #[test]
    fn valid_props_produce_no_errors() {
        let props = Props::new()
            .with("title", "Hello")
            .with("count", 3)
            .with("size", 2);
        assert!(validate_props(&props, &schema()).is_empty());
    }

    #[test]
    fn each_violation_is_reported() {
        let props = Props::new().with("count", "three").with("size", -1);
        assert_eq!(
            validate_props(&props, &schema()),
            vec![
                "Missing required prop: title",
                "Invalid type for prop count",
                "Custom validation failed for prop size",
            ]
        );
    }

    #[test]
    fn validator_sees_absent_props() {
        let props = Props::new().with("title", "t");
        assert_eq!(
            validate_props(&props, &schema()),
            vec!["Custom validation failed for prop size"]
        );
    }

    #[test]
    fn object_accepts_lists_but_not_null() {
        assert!(PropType::Object.matches(&PropValue::from(vec![PropValue::Null])));
        assert!(!PropType::Object.matches(&PropValue::Null));
        assert!(PropType::Function.matches(&PropValue::from(Handler::new(|_| {}))));
        assert!(!PropType::Array.matches(&PropValue::from("a")));
    }
}
