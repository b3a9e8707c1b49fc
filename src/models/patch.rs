use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single field of a partial update.
///
/// `Absent` means the field was not sent, `Null` means it was sent as
/// `null`, `Value` carries the new value. Fields must be annotated with
/// `#[serde(default, skip_serializing_if = "Patch::is_absent")]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Absent,
    Null,
    Value(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Absent
    }
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Patch::Null)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Patch::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Applies the patch to an optional field. `Null` clears it.
    pub fn apply_to(&self, target: &mut Option<T>)
    where
        T: Clone,
    {
        match self {
            Patch::Absent => {}
            Patch::Null => *target = None,
            Patch::Value(v) => *target = Some(v.clone()),
        }
    }

    /// Applies the patch to a required field. Callers reject `Null` during validation.
    pub fn apply_required(&self, target: &mut T)
    where
        T: Clone,
    {
        if let Patch::Value(v) = self {
            *target = v.clone();
        }
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Value(value),
            None => Patch::Null,
        })
    }
}

impl<T> Serialize for Patch<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Patch::Value(v) => serializer.serialize_some(v),
            Patch::Absent | Patch::Null => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, Serialize)]
    struct Body {
        #[serde(default, skip_serializing_if = "Patch::is_absent")]
        notes: Patch<String>,
        #[serde(default, skip_serializing_if = "Patch::is_absent")]
        priority: Patch<u8>,
    }

    #[test]
    fn distinguishes_absent_null_and_value() {
        let body: Body = serde_json::from_str(r#"{"notes": null}"#).unwrap();
        assert_eq!(body.notes, Patch::Null);
        assert_eq!(body.priority, Patch::Absent);

        let body: Body = serde_json::from_str(r#"{"priority": 3}"#).unwrap();
        assert_eq!(body.priority, Patch::Value(3));
        assert!(body.notes.is_absent());
    }

    #[test]
    fn absent_fields_are_not_serialized() {
        let body = Body {
            notes: Patch::Null,
            priority: Patch::Absent,
        };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"notes":null}"#);
    }

    #[test]
    fn apply_to_clears_on_null() {
        let mut notes = Some("rewatch".to_string());
        Patch::<String>::Absent.apply_to(&mut notes);
        assert_eq!(notes.as_deref(), Some("rewatch"));
        Patch::<String>::Null.apply_to(&mut notes);
        assert_eq!(notes, None);
        Patch::Value("new".to_string()).apply_to(&mut notes);
        assert_eq!(notes.as_deref(), Some("new"));
    }
}
