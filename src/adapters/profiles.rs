//! Profile catalog adapter.
//!
//! Profiles live as `<id>.json` documents in one directory
//! (`{"name": "...", "data": [[secs, temp], ...]}`).  The directory is read
//! on every lookup so edits take effect on the next `start` without a
//! restart.  [`ProfileLibrary::from_profiles`] builds an in-memory catalog
//! for tests and demos.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use log::{debug, warn};

use crate::app::ports::ProfileCatalog;
use crate::error::{CommandError, Error, ProfileError};
use crate::profile::Profile;

const EXTENSION: &str = "json";

enum Source {
    Directory(PathBuf),
    Memory(BTreeMap<String, Profile>),
}

pub struct ProfileLibrary {
    source: Source,
}

impl ProfileLibrary {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::Directory(dir.into()),
        }
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        Self {
            source: Source::Memory(
                profiles
                    .into_iter()
                    .map(|p| (p.id().to_owned(), p))
                    .collect(),
            ),
        }
    }

    /// Ids of every profile document, sorted.
    pub fn ids(&self) -> Vec<String> {
        match &self.source {
            Source::Memory(map) => map.keys().cloned().collect(),
            Source::Directory(dir) => {
                let Ok(entries) = fs::read_dir(dir) else {
                    warn!("Profiles: cannot list {}", dir.display());
                    return Vec::new();
                };
                let mut ids: Vec<String> = entries
                    .filter_map(Result::ok)
                    .map(|e| e.path())
                    .filter(|p| p.extension().is_some_and(|ext| ext == EXTENSION))
                    .filter_map(|p| p.file_stem()?.to_str().map(str::to_owned))
                    .collect();
                ids.sort();
                ids
            }
        }
    }
}

/// Ids are file stems: reject anything that could leave the directory.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !id.starts_with('.')
}

impl ProfileCatalog for ProfileLibrary {
    fn profile(&self, id: &str) -> Result<Profile, CommandError> {
        match &self.source {
            Source::Memory(map) => map.get(id).cloned().ok_or(CommandError::UnknownProfile),
            Source::Directory(dir) => {
                if !is_valid_id(id) {
                    return Err(CommandError::UnknownProfile);
                }
                let path = dir.join(format!("{id}.{EXTENSION}"));
                let text = fs::read_to_string(&path).map_err(|e| {
                    if e.kind() == ErrorKind::NotFound {
                        CommandError::UnknownProfile
                    } else {
                        warn!("Profiles: cannot read {}: {e}", path.display());
                        CommandError::InvalidProfile(ProfileError::Malformed)
                    }
                })?;
                debug!("Profiles: loaded {}", path.display());
                Profile::from_json(id, &text).map_err(|e| {
                    warn!("Profiles: {e}");
                    match e {
                        Error::Profile(pe) => CommandError::InvalidProfile(pe),
                        _ => CommandError::InvalidProfile(ProfileError::Malformed),
                    }
                })
            }
        }
    }
}
