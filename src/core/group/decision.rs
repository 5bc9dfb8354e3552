//! Per-photo culling decisions.

use crate::error::SessionError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Star rating, 0 (unrated) to 3
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rating(u8);

impl Rating {
    pub const UNRATED: Rating = Rating(0);
    pub const MAX: u8 = 3;

    pub fn new(stars: u8) -> Result<Self, SessionError> {
        Self::try_from(stars)
    }

    pub fn stars(self) -> u8 {
        self.0
    }

    pub fn is_rated(self) -> bool {
        self.0 > 0
    }
}

impl TryFrom<u8> for Rating {
    type Error = SessionError;

    fn try_from(stars: u8) -> Result<Self, Self::Error> {
        if stars > Self::MAX {
            return Err(SessionError::InvalidRating(stars));
        }
        Ok(Rating(stars))
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            write!(f, "unrated")
        } else {
            write!(f, "{}", "★".repeat(self.0 as usize))
        }
    }
}

impl Serialize for Rating {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

// Session files may have been edited by hand; clamp instead of failing the load.
impl<'de> Deserialize<'de> for Rating {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Ok(Rating(raw.clamp(0, Self::MAX as i64) as u8))
    }
}

/// The culling decision for one photo.
///
/// A rejected photo is never rated and a rated photo is never rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DecisionRecord")]
pub struct Decision {
    rating: Rating,
    rejected: bool,
}

#[derive(Deserialize)]
struct DecisionRecord {
    #[serde(default)]
    rating: Rating,
    #[serde(default)]
    rejected: bool,
}

impl From<DecisionRecord> for Decision {
    fn from(record: DecisionRecord) -> Self {
        if record.rejected {
            Decision::rejected_decision()
        } else {
            Decision::rated(record.rating)
        }
    }
}

impl Decision {
    pub fn rated(rating: Rating) -> Self {
        Self {
            rating,
            rejected: false,
        }
    }

    pub fn rejected_decision() -> Self {
        Self {
            rating: Rating::UNRATED,
            rejected: true,
        }
    }

    pub fn rating(&self) -> Rating {
        self.rating
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected
    }

    /// Not rejected and rated at least one star
    pub fn is_selected(&self) -> bool {
        !self.rejected && self.rating.is_rated()
    }

    pub fn is_undecided(&self) -> bool {
        !self.rejected && !self.rating.is_rated()
    }

    /// Apply a rating. A positive rating clears rejection; zero only clears the rating.
    pub fn with_rating(self, rating: Rating) -> Self {
        if rating.is_rated() {
            Self::rated(rating)
        } else {
            Self {
                rating: Rating::UNRATED,
                rejected: self.rejected,
            }
        }
    }

    pub fn with_rejected(self, rejected: bool) -> Self {
        if rejected {
            Self::rejected_decision()
        } else {
            Self {
                rating: self.rating,
                rejected: false,
            }
        }
    }
}
