//! Typed ids for images, annotations and categories.
//!
//! Each id is a `u64` newtype so an image id can never be passed where a
//! category id is expected. All three serialize as bare numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! typed_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            #[inline]
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            #[inline]
            pub fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

typed_id! {
    /// Identifies an image within a dataset.
    ImageId
}

typed_id! {
    /// Identifies an annotation within its owning image; every image numbers
    /// its annotations from 1.
    AnnotationId
}

typed_id! {
    /// A category id, minted by a [`CategoryRegistry`](super::CategoryRegistry).
    CategoryId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_order_numerically() {
        assert!(ImageId(2) < ImageId(10));
        assert!(CategoryId(10) > CategoryId(5));
    }

    #[test]
    fn display_is_bare_number_and_debug_names_the_kind() {
        assert_eq!(CategoryId(7).to_string(), "7");
        assert_eq!(format!("{:?}", AnnotationId(3)), "AnnotationId(3)");
        assert_eq!(ImageId::from(4), ImageId::new(4));
    }

    #[test]
    fn ids_serialize_transparently() {
        assert_eq!(serde_json::to_string(&CategoryId(12)).unwrap(), "12");
        let id: ImageId = serde_json::from_str("5").unwrap();
        assert_eq!(id.as_u64(), 5);
    }
}
