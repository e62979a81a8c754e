use crate::db::DatabaseError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Serde uses the same string form as the database column.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

str_enum!(ProductStatus {
    Draft => "draft",
    Active => "active",
    Archived => "archived",
});

str_enum!(OrderStatus {
    New => "NEW",
    Paid => "PAID",
    Cancelled => "CANCELLED",
});

str_enum!(PaymentStatus {
    Pending => "PENDING",
    Success => "SUCCESS",
    Failed => "FAILED",
});

str_enum!(ReactionKind {
    Like => "like",
    Love => "love",
    Haha => "haha",
    Wow => "wow",
    Sad => "sad",
    Angry => "angry",
});

str_enum!(Sport {
    Nba => "NBA",
    Nfl => "NFL",
    Epl => "EPL",
});

str_enum!(MatchStatus {
    Live => "live",
    Recent => "recent",
    Upcoming => "upcoming",
});

str_enum!(SearchScope {
    All => "all",
    News => "news",
    Products => "products",
});

str_enum!(RoleVisibility {
    All => "all",
    Staff => "staff",
    Private => "private",
});

impl Sport {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Nba => "NBA Basketball",
            Self::Nfl => "NFL American Football",
            Self::Epl => "Premier League Football",
        }
    }
}

impl MatchStatus {
    /// Public label: matches stored as `recent` are reported as `finished`.
    pub fn public_label(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Recent => "finished",
            Self::Upcoming => "upcoming",
        }
    }

    /// Accepts the stored names plus the public `finished` alias.
    pub fn from_public(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Some(Self::Live),
            "recent" | "finished" => Some(Self::Recent),
            "upcoming" => Some(Self::Upcoming),
            _ => None,
        }
    }
}

impl ReactionKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Like => "Like",
            Self::Love => "Love",
            Self::Haha => "Haha",
            Self::Wow => "Wow",
            Self::Sad => "Sad",
            Self::Angry => "Angry",
        }
    }
}

impl SearchScope {
    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "All content",
            Self::News => "News",
            Self::Products => "Products",
        }
    }
}
