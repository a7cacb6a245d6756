//! Lesson records and site configuration
//!
//! One `LessonRecord` is one row of the intermediate CSV that sits between
//! the scraper and the PBN converter. Column names match the legacy
//! spreadsheet so existing files keep working.

use crate::auction::Seat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A scraped lesson deal. Hands stay in the site's colon format here;
/// parsing into [`crate::hand::Hand`] happens where cards are needed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonRecord {
    #[serde(rename = "Subfolder")]
    pub subfolder: String,
    #[serde(rename = "Filename")]
    pub filename: String,
    #[serde(rename = "DealNumber")]
    pub deal_number: Option<u32>,
    #[serde(rename = "Kind")]
    pub kind: String,
    #[serde(rename = "NorthHand")]
    pub north_hand: String,
    #[serde(rename = "EastHand")]
    pub east_hand: String,
    #[serde(rename = "SouthHand")]
    pub south_hand: String,
    #[serde(rename = "WestHand")]
    pub west_hand: String,
    #[serde(rename = "Dealer")]
    pub dealer: String,
    #[serde(rename = "Student")]
    pub student: String,
    #[serde(rename = "Auction")]
    pub auction: String,
    #[serde(rename = "Contract")]
    pub contract: String,
    #[serde(rename = "Declarer")]
    pub declarer: String,
    #[serde(rename = "Lead")]
    pub lead: String,
    #[serde(rename = "Analysis")]
    pub analysis: String,
}

impl LessonRecord {
    /// The recorded hand for a seat, still in colon format.
    pub fn hand_field(&self, seat: Seat) -> &str {
        match seat {
            Seat::North => &self.north_hand,
            Seat::East => &self.east_hand,
            Seat::South => &self.south_hand,
            Seat::West => &self.west_hand,
        }
    }

    pub fn set_hand_field(&mut self, seat: Seat, value: String) {
        match seat {
            Seat::North => self.north_hand = value,
            Seat::East => self.east_hand = value,
            Seat::South => self.south_hand = value,
            Seat::West => self.west_hand = value,
        }
    }

    /// Dealer seat, if the field holds one.
    pub fn dealer_seat(&self) -> Option<Seat> {
        self.dealer.parse().ok()
    }

    pub fn declarer_seat(&self) -> Option<Seat> {
        self.declarer.parse().ok()
    }

    pub fn student_seat(&self) -> Option<Seat> {
        self.student.parse().ok()
    }
}

/// Read a whole lesson CSV.
pub fn read_lesson_csv(path: &Path) -> Result<Vec<LessonRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open lesson CSV {}", path.display()))?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: LessonRecord = row.context("Failed to read CSV row")?;
        records.push(record);
    }
    Ok(records)
}

/// Write a lesson CSV with the legacy column order.
pub fn write_lesson_csv(path: &Path, records: &[LessonRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV {}", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// How the student seat is found for one lesson subfolder.
#[derive(Debug, Clone)]
pub enum StudentRule {
    /// The whole folder puts the student in one seat.
    Fixed(Seat),
    /// The seat varies by deal; a probe phrase in the analysis decides.
    Probe {
        phrase: &'static str,
        when_found: Seat,
        otherwise: Seat,
    },
}

/// Immutable per-site configuration, built once and passed into the
/// scraper and the PBN formatter.
#[derive(Debug, Clone)]
pub struct LessonConfig {
    /// Student seat when no folder rule applies.
    pub default_student: Seat,
    /// Folder-specific student seat rules.
    pub student_rules: HashMap<String, StudentRule>,
    /// Label used in per-board title comments and the `%HRTitleEvent`
    /// header, e.g. "Baker".
    pub title_prefix: String,
}

impl LessonConfig {
    /// The rules accumulated for the legacy site: declarer-play lessons
    /// seat the student South; the opening-lead folder seats West; third
    /// hand seats East; the two defensive folders that mix sides probe the
    /// analysis text.
    pub fn site_defaults(title_prefix: &str) -> LessonConfig {
        let mut student_rules = HashMap::new();
        student_rules.insert("OLead".to_string(), StudentRule::Fixed(Seat::West));
        student_rules.insert("ThirdHand".to_string(), StudentRule::Fixed(Seat::East));
        for folder in ["SecondHand", "Signals"] {
            student_rules.insert(
                folder.to_string(),
                StudentRule::Probe {
                    phrase: "You are East",
                    when_found: Seat::East,
                    otherwise: Seat::West,
                },
            );
        }
        LessonConfig {
            default_student: Seat::South,
            student_rules,
            title_prefix: title_prefix.to_string(),
        }
    }

    /// Student seat for a deal in `subfolder` with the given analysis
    /// prose.
    pub fn student_for(&self, subfolder: &str, analysis: &str) -> Seat {
        match self.student_rules.get(subfolder) {
            Some(StudentRule::Fixed(seat)) => *seat,
            Some(StudentRule::Probe {
                phrase,
                when_found,
                otherwise,
            }) => {
                if analysis.contains(phrase) {
                    *when_found
                } else {
                    *otherwise
                }
            }
            None => self.default_student,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_rules() {
        let config = LessonConfig::site_defaults("Baker");
        assert_eq!(config.student_for("NMF", ""), Seat::South);
        assert_eq!(config.student_for("OLead", ""), Seat::West);
        assert_eq!(config.student_for("ThirdHand", ""), Seat::East);
        assert_eq!(config.student_for("Signals", "You are East here."), Seat::East);
        assert_eq!(config.student_for("Signals", "Partner leads."), Seat::West);
        assert_eq!(config.student_for("SecondHand", ""), Seat::West);
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lessons.csv");
        let record = LessonRecord {
            subfolder: "NMF".to_string(),
            filename: "deal01.html".to_string(),
            deal_number: Some(1),
            kind: "Bidding".to_string(),
            north_hand: "S:AK4 H:QJ2 D:T98 C:A765".to_string(),
            dealer: "North".to_string(),
            student: "South".to_string(),
            auction: "1NT pass 2C pass | 2D pass 3NT pass | pass pass".to_string(),
            contract: "3NT".to_string(),
            declarer: "North".to_string(),
            ..Default::default()
        };
        write_lesson_csv(&path, &[record.clone()]).unwrap();

        let header = std::fs::read_to_string(&path).unwrap();
        assert!(header.starts_with(
            "Subfolder,Filename,DealNumber,Kind,NorthHand,EastHand,SouthHand,WestHand,\
             Dealer,Student,Auction,Contract,Declarer,Lead,Analysis"
        ));

        let records = read_lesson_csv(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].deal_number, Some(1));
        assert_eq!(records[0].dealer_seat(), Some(Seat::North));
        assert_eq!(records[0].contract, "3NT");
    }
}
