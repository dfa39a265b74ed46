//! Closed vocabularies stored on records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKindError {
    kind: &'static str,
    value: String,
}

impl fmt::Display for ParseKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for ParseKindError {}

macro_rules! kind_enum {
    ($(#[$meta:meta])* $name:ident, $label:literal, default = $default:ident, { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseKindError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ParseKindError { kind: $label, value: s.to_string() }),
                }
            }
        }
    };
}

kind_enum!(
    /// Role of a branch; drives its display color.
    BranchType, "branch type", default = Development, {
        Main => "main",
        Development => "development",
        Experimental => "experimental",
        Alternate => "alternate",
    }
);

kind_enum!(
    CommitType, "commit type", default = Update, {
        Initial => "initial",
        LevelUp => "level_up",
        Story => "story",
        Equipment => "equipment",
        Death => "death",
        Resurrection => "resurrection",
        Update => "update",
    }
);

kind_enum!(
    TagType, "tag type", default = Milestone, {
        Milestone => "milestone",
        Death => "death",
        Resurrection => "resurrection",
        Retirement => "retirement",
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!("level-up".parse::<CommitType>().unwrap(), CommitType::LevelUp);
        assert_eq!(CommitType::LevelUp.to_string(), "level_up");
        assert_eq!(" Experimental ".parse::<BranchType>().unwrap(), BranchType::Experimental);
        assert!("wedding".parse::<TagType>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        assert_eq!(serde_json::to_value(CommitType::LevelUp).unwrap(), serde_json::json!("level_up"));
        let parsed: TagType = serde_json::from_value(serde_json::json!("retirement")).unwrap();
        assert_eq!(parsed, TagType::Retirement);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(BranchType::default(), BranchType::Development);
        assert_eq!(CommitType::default(), CommitType::Update);
        assert_eq!(TagType::default(), TagType::Milestone);
    }
}
