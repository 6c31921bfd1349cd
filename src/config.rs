//! Run configuration: phases, roster, workflow vocabulary.
//!
//! Loaded from JSON by the CLI; every structural problem is caught here,
//! before any metric is computed.

use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::cohort::CohortWindow;
use crate::error::{Error, Result};
use crate::identity::normalize_key;

/// A named comparison window ("Before AI", "With AI", ...).
#[derive(Debug, Clone, Deserialize)]
pub struct PhaseConfig {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// A value given once for all phases, or one value per phase.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PerPhase {
    Scalar(f64),
    List(Vec<f64>),
}

impl PerPhase {
    pub fn for_phase(&self, phase_idx: usize) -> f64 {
        match self {
            PerPhase::Scalar(v) => *v,
            PerPhase::List(values) => values[phase_idx],
        }
    }

    fn check_len(&self, what: &str, member: &str, phase_count: usize) -> Result<()> {
        if let PerPhase::List(values) = self {
            if values.len() != phase_count {
                return Err(Error::Config(format!(
                    "member '{member}': {what} lists {} values for {phase_count} phases",
                    values.len()
                )));
            }
        }
        Ok(())
    }
}

fn default_capacity() -> PerPhase {
    PerPhase::Scalar(1.0)
}

fn default_leave() -> PerPhase {
    PerPhase::Scalar(0.0)
}

/// One roster member. `key` is the stable identity key (normalized on load);
/// leave and capacity may vary per phase.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberConfig {
    pub key: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default = "default_leave")]
    pub leave_days: PerPhase,
    #[serde(default = "default_capacity")]
    pub capacity: PerPhase,
}

fn default_states() -> Vec<String> {
    ["New", "To Do", "In Progress", "Review", "Release Pending", "Waiting"]
        .map(String::from)
        .to_vec()
}

fn default_item_types() -> Vec<String> {
    ["Story", "Task", "Bug", "Epic"].map(String::from).to_vec()
}

/// Configuration for one source's report run.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Source/project identifier; becomes the source column label when
    /// reports are merged.
    pub source: String,
    /// Salt for pseudonym derivation. Every source being merged must share
    /// it, or the same person gets different pseudonyms.
    #[serde(default)]
    pub salt: String,
    #[serde(default = "default_states")]
    pub states: Vec<String>,
    #[serde(default = "default_item_types")]
    pub item_types: Vec<String>,
    pub phases: Vec<PhaseConfig>,
    #[serde(default)]
    pub members: Vec<MemberConfig>,
}

impl ReportConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: ReportConfig = serde_json::from_str(&raw)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn normalize(&mut self) {
        for member in &mut self.members {
            member.key = normalize_key(&member.key);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.trim().is_empty() {
            return Err(Error::Config("source name is empty".to_string()));
        }
        if self.phases.is_empty() {
            return Err(Error::Config("no phases configured".to_string()));
        }
        for phase in &self.phases {
            if phase.name.trim().is_empty() {
                return Err(Error::Config("phase with empty name".to_string()));
            }
            if phase.end_date < phase.start_date {
                return Err(Error::Config(format!(
                    "phase '{}': end date {} precedes start date {}",
                    phase.name, phase.end_date, phase.start_date
                )));
            }
        }
        let mut names: Vec<&str> = self.phases.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.phases.len() {
            return Err(Error::Config("duplicate phase names".to_string()));
        }

        let mut keys: Vec<&str> = self.members.iter().map(|m| m.key.as_str()).collect();
        keys.sort_unstable();
        keys.dedup();
        if keys.len() != self.members.len() {
            return Err(Error::Config(
                "duplicate member keys after normalization".to_string(),
            ));
        }
        for member in &self.members {
            member
                .leave_days
                .check_len("leave_days", &member.key, self.phases.len())?;
            member
                .capacity
                .check_len("capacity", &member.key, self.phases.len())?;
        }
        Ok(())
    }

    /// Window for one member in one phase.
    pub fn member_window(&self, member: &MemberConfig, phase_idx: usize) -> CohortWindow {
        let phase = &self.phases[phase_idx];
        CohortWindow {
            name: phase.name.clone(),
            start_date: phase.start_date,
            end_date: phase.end_date,
            leave_days: member.leave_days.for_phase(phase_idx),
            capacity: member.capacity.for_phase(phase_idx),
        }
    }

    /// Window for the team scope in one phase: leave and capacity are the
    /// roster sums (a 6-person roster has capacity ~6 FTE). With no roster
    /// the team reads as one full-time capacity.
    pub fn team_window(&self, phase_idx: usize) -> CohortWindow {
        let phase = &self.phases[phase_idx];
        let (leave, capacity) = if self.members.is_empty() {
            (0.0, 1.0)
        } else {
            (
                self.members
                    .iter()
                    .map(|m| m.leave_days.for_phase(phase_idx))
                    .sum(),
                self.members
                    .iter()
                    .map(|m| m.capacity.for_phase(phase_idx))
                    .sum(),
            )
        };
        CohortWindow {
            name: phase.name.clone(),
            start_date: phase.start_date,
            end_date: phase.end_date,
            leave_days: leave,
            capacity,
        }
    }
}
