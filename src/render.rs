//! Payload rendering for audit logs.
//!
//! Payloads are rendered as compact JSON. If a value cannot be serialized
//! (non-string map keys, a failing `Serialize` impl, ...), its `Debug` form is
//! used instead and the reason is reported back to the caller.

use std::any::Any;
use std::fmt;

use serde::Serialize;

/// A value that can appear as a request or response payload in an audit log.
///
/// Implemented for every `Serialize + Debug + 'static` type.
pub trait Loggable: fmt::Debug {
    /// Serializes the value to JSON text.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error for values JSON cannot represent.
    fn to_json(&self) -> Result<String, serde_json::Error>;

    /// Default textual form, used when [`to_json`](Loggable::to_json) fails.
    fn fallback(&self) -> String {
        format!("{:?}", self)
    }

    /// Access to the concrete value, for handlers that receive it back.
    fn as_any(&self) -> &dyn Any;
}

impl<T> Loggable for T
where
    T: Serialize + fmt::Debug + 'static,
{
    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Result of rendering a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// The text to log
    pub text: String,
    /// Serializer error message, if the fallback form was used
    pub fallback_reason: Option<String>,
}

/// Renders a payload for logging.
///
/// A missing payload, or one that serializes to JSON `null`, renders as
/// `none_label`.
///
/// # Examples
///
/// ```
/// use admin_audit::render::render;
///
/// let rendered = render(Some(&vec![1, 2, 3]), "none");
/// assert_eq!(rendered.text, "[1,2,3]");
///
/// let rendered = render(Some(&()), "none");
/// assert_eq!(rendered.text, "none");
/// ```
pub fn render(value: Option<&dyn Loggable>, none_label: &str) -> Rendered {
    let Some(value) = value else {
        return Rendered {
            text: none_label.to_string(),
            fallback_reason: None,
        };
    };

    match value.to_json() {
        Ok(json) if json == "null" => Rendered {
            text: none_label.to_string(),
            fallback_reason: None,
        },
        Ok(json) => Rendered {
            text: json,
            fallback_reason: None,
        },
        Err(err) => Rendered {
            text: value.fallback(),
            fallback_reason: Some(err.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Serialize)]
    struct RoleChange {
        role: String,
    }

    #[test]
    fn renders_struct_as_json() {
        let change = RoleChange {
            role: "ADMIN".to_string(),
        };
        let rendered = render(Some(&change), "none");
        assert_eq!(rendered.text, r#"{"role":"ADMIN"}"#);
        assert!(rendered.fallback_reason.is_none());
    }

    #[test]
    fn missing_value_renders_none_label() {
        let rendered = render(None, "n/a");
        assert_eq!(rendered.text, "n/a");
    }

    #[test]
    fn null_json_renders_none_label() {
        let nothing: Option<RoleChange> = None;
        assert_eq!(render(Some(&nothing), "none").text, "none");
    }

    #[test]
    fn unsupported_map_key_falls_back_to_debug() {
        let mut grid = HashMap::new();
        grid.insert((1, 2), "cell");
        let rendered = render(Some(&grid), "none");

        assert_eq!(rendered.text, format!("{:?}", grid));
        assert!(rendered.fallback_reason.is_some());
    }

    #[test]
    fn as_any_recovers_concrete_type() {
        let change = RoleChange {
            role: "USER".to_string(),
        };
        let loggable: &dyn Loggable = &change;
        let back = loggable.as_any().downcast_ref::<RoleChange>();
        assert_eq!(back.map(|c| c.role.as_str()), Some("USER"));
    }
}
