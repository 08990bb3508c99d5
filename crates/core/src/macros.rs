//! Helper macro for string-backed enumerations.
//!
//! Every enumerated column is stored as `TEXT` with a `CHECK` constraint.
//! The macro generates the enum, its database string mapping, `FromStr`
//! (rejecting unknown values with [`CoreError::Validation`]), `Display`,
//! and serde support using the same strings.
//!
//! [`CoreError::Validation`]: crate::error::CoreError::Validation

macro_rules! define_str_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($label:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $value)] $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Return the database string representation.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $value ),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $value => Ok(Self::$variant), )+
                    other => Err($crate::error::CoreError::Validation(format!(
                        "Unknown {} '{}'. Must be one of: {}",
                        $label,
                        other,
                        [$($value),+].join(", ")
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}
