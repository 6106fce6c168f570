use serde::{Deserialize, Serialize};

macro_rules! impl_uuid {
    ($struct_name:ty) => {
        impl $struct_name {
            /// Mints a fresh time-ordered identifier.
            pub fn now() -> Self {
                Self {
                    inner: uuid::Uuid::now_v7(),
                }
            }

            pub fn is_nil(&self) -> bool {
                self.inner.is_nil()
            }
        }

        impl From<uuid::Uuid> for $struct_name {
            fn from(value: uuid::Uuid) -> Self {
                Self { inner: value }
            }
        }

        impl std::fmt::Display for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.inner.fmt(f)
            }
        }
    };
}

/// Identity of a non-visual model object (a class, a note's payload, a link).
#[derive(Clone, Copy, Debug, Hash, PartialOrd, Ord, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelUuid {
    inner: uuid::Uuid,
}

impl_uuid!(ModelUuid);

/// Identity of a visual element (a shape or a whole diagram).
#[derive(Clone, Copy, Debug, Hash, PartialOrd, Ord, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewUuid {
    inner: uuid::Uuid,
}

impl_uuid!(ViewUuid);

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, derive_more::From)]
pub enum EntityUuid {
    Model(ModelUuid),
    View(ViewUuid),
}

pub trait Entity {
    fn tagged_uuid(&self) -> EntityUuid;
}
