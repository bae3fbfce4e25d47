use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core candidate data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    /// Unique ballot number, used for ordering and display.
    pub number: u32,
    pub name: String,
    /// Path to the uploaded photo, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_path: Option<String>,
    pub vision: String,
    pub mission: String,
    /// Denormalised tally; always equal to the number of receipts
    /// referencing this candidate.
    pub votes: u64,
}

impl CandidateCore {
    /// Create a new candidate with an empty tally.
    pub fn new(
        number: u32,
        name: impl Into<String>,
        vision: impl Into<String>,
        mission: impl Into<String>,
        photo_path: Option<String>,
    ) -> Self {
        Self {
            number,
            name: name.into(),
            photo_path,
            vision: vision.into(),
            mission: mission.into(),
            votes: 0,
        }
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateCore {
        pub fn example1() -> Self {
            Self::new(
                1,
                "Paslon 1",
                "Mewujudkan kampus unggul",
                "Transparansi, inovasi, kolaborasi",
                None,
            )
        }

        pub fn example2() -> Self {
            Self::new(
                2,
                "Paslon 2",
                "Kampus berdaya saing",
                "Pelayanan, prestasi, integritas",
                None,
            )
        }
    }
}
