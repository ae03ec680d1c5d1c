//! Presence-aware field updates.

/// One field of a partial update.
///
/// `Keep` is distinct from `Clear`: an omitted field never overwrites the
/// stored value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldPatch<T> {
    #[default]
    Keep,
    Set(T),
    Clear,
}

impl<T> FieldPatch<T> {
    /// Maps "present / absent" boundary input. Absent means `Keep`.
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Set(value),
            None => Self::Keep,
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Self::Set(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FieldPatch<U> {
        match self {
            Self::Keep => FieldPatch::Keep,
            Self::Set(value) => FieldPatch::Set(f(value)),
            Self::Clear => FieldPatch::Clear,
        }
    }
}

impl<T: PartialEq> FieldPatch<T> {
    /// Applies the patch to a nullable slot. Returns whether the slot changed.
    pub fn apply_optional(self, slot: &mut Option<T>) -> bool {
        let next = match self {
            Self::Keep => return false,
            Self::Set(value) => Some(value),
            Self::Clear => None,
        };
        if *slot == next {
            return false;
        }
        *slot = next;
        true
    }
}
