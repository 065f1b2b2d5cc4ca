//! Firing profiles.
//!
//! A profile is an immutable, ordered list of `(elapsed seconds, target)`
//! control points.  Between points the target ramps linearly; two points
//! with the same temperature form a hold.  Before the first point the first
//! target applies (a pre-ramp hold), after the last point the last target.
//!
//! ```text
//!  temp
//!   ▲            ┌────────┐ hold
//!   │           /          \
//!   │   ramp   /            \ cool
//!   │ ───────●              ●───────
//!   └──────────────────────────────────▶ elapsed
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, ProfileError};

/// Maximum control points in one profile (stack-allocated).
pub const MAX_PROFILE_POINTS: usize = 64;

/// Largest target magnitude a point may carry.
pub const MAX_ABS_TARGET: f64 = 10_000.0;

/// Profile identifier, normally the profile file stem.
pub type ProfileId = heapless::String<32>;

/// Human-readable profile name.
pub type ProfileName = heapless::String<48>;

/// One control point of a firing schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfilePoint {
    pub elapsed_secs: f64,
    pub target: f64,
}

/// Validated firing schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    id: ProfileId,
    name: ProfileName,
    points: heapless::Vec<ProfilePoint, MAX_PROFILE_POINTS>,
}

/// On-disk profile document: `{ "name": "...", "data": [[secs, temp], ...] }`.
#[derive(Debug, Serialize, Deserialize)]
struct ProfileFile {
    name: String,
    data: Vec<(f64, f64)>,
}

impl Profile {
    /// Build a profile, rejecting empty or non-increasing point lists.
    pub fn new(id: &str, name: &str, points: &[(f64, f64)]) -> Result<Self, ProfileError> {
        if points.is_empty() {
            return Err(ProfileError::Empty);
        }

        let mut stored = heapless::Vec::new();
        for (index, &(elapsed_secs, target)) in points.iter().enumerate() {
            if !elapsed_secs.is_finite()
                || elapsed_secs < 0.0
                || !target.is_finite()
                || target.abs() > MAX_ABS_TARGET
            {
                return Err(ProfileError::InvalidPoint { index });
            }
            if index > 0 && elapsed_secs <= points[index - 1].0 {
                return Err(ProfileError::NonIncreasing { index });
            }
            stored
                .push(ProfilePoint {
                    elapsed_secs,
                    target,
                })
                .map_err(|_| ProfileError::TooManyPoints)?;
        }

        Ok(Self {
            id: bounded(id)?,
            name: bounded(name)?,
            points: stored,
        })
    }

    /// Parse a profile document.  `id` is usually the file stem.
    pub fn from_json(id: &str, text: &str) -> Result<Self, Error> {
        let file: ProfileFile =
            serde_json::from_str(text).map_err(|e| Error::Load(format!("profile {id}: {e}")))?;
        Ok(Self::new(id, &file.name, &file.data)?)
    }

    /// Serialise back to the profile document format.
    pub fn to_json(&self) -> Result<String, Error> {
        let file = ProfileFile {
            name: self.name.as_str().into(),
            data: self
                .points
                .iter()
                .map(|p| (p.elapsed_secs, p.target))
                .collect(),
        };
        serde_json::to_string(&file).map_err(|e| Error::Load(format!("profile {}: {e}", self.id)))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[ProfilePoint] {
        &self.points
    }

    /// Time of the final control point; the run is due to finish after it.
    pub fn duration(&self) -> f64 {
        self.last().elapsed_secs
    }

    /// Target of the final control point.
    pub fn final_target(&self) -> f64 {
        self.last().target
    }

    /// Target temperature at `elapsed` seconds into the schedule.
    ///
    /// Total over `[0, +inf)`: clamps to the first target before the first
    /// point and to the last target after the last point.
    pub fn target_at(&self, elapsed: f64) -> f64 {
        let first = self.first();
        let last = self.last();
        if elapsed.is_nan() || elapsed <= first.elapsed_secs {
            return first.target;
        }
        if elapsed >= last.elapsed_secs {
            return last.target;
        }

        self.points
            .windows(2)
            .find(|w| elapsed < w[1].elapsed_secs)
            .map_or(last.target, |w| {
                let (a, b) = (w[0], w[1]);
                let span = b.elapsed_secs - a.elapsed_secs;
                a.target + (b.target - a.target) * (elapsed - a.elapsed_secs) / span
            })
    }

    /// Schedule time at which a kiln already at `temperature` should start.
    ///
    /// Searches forward for the first point whose target is at or above the
    /// measured temperature and starts at that point's time.  Returns 0 when
    /// the first point already covers the temperature or when no point
    /// reaches it.
    pub fn seek_start_time(&self, temperature: f64) -> f64 {
        match self.points.iter().position(|p| p.target >= temperature) {
            Some(0) | None => 0.0,
            Some(index) => self.points[index].elapsed_secs,
        }
    }

    fn first(&self) -> ProfilePoint {
        self.points[0]
    }

    fn last(&self) -> ProfilePoint {
        self.points[self.points.len() - 1]
    }
}

fn bounded<const N: usize>(s: &str) -> Result<heapless::String<N>, ProfileError> {
    let mut out = heapless::String::new();
    out.push_str(s).map_err(|()| ProfileError::NameTooLong)?;
    Ok(out)
}
