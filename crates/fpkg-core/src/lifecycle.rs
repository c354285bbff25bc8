use crate::CoreError;
use tracing::debug;

/// Stages of a single package build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildState {
    #[default]
    Idle,
    ConfigLoaded,
    Walked,
    ManifestBuilt,
    Archiving,
    Done,
    Failed,
}

impl std::fmt::Display for BuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildState::Idle => write!(f, "idle"),
            BuildState::ConfigLoaded => write!(f, "config-loaded"),
            BuildState::Walked => write!(f, "walked"),
            BuildState::ManifestBuilt => write!(f, "manifest-built"),
            BuildState::Archiving => write!(f, "archiving"),
            BuildState::Done => write!(f, "done"),
            BuildState::Failed => write!(f, "failed"),
        }
    }
}

pub fn validate_transition(from: BuildState, to: BuildState) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (BuildState::Idle, BuildState::ConfigLoaded)
            | (BuildState::ConfigLoaded, BuildState::Walked)
            | (BuildState::Walked, BuildState::ManifestBuilt)
            | (BuildState::ManifestBuilt, BuildState::Archiving)
            | (BuildState::Archiving, BuildState::Done)
            | (
                BuildState::Idle
                    | BuildState::ConfigLoaded
                    | BuildState::Walked
                    | BuildState::ManifestBuilt
                    | BuildState::Archiving,
                BuildState::Failed
            )
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Tracks the state of one build; there is no way back from `Done` or `Failed`.
#[derive(Debug, Default)]
pub struct BuildTracker {
    state: BuildState,
}

impl BuildTracker {
    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn advance(&mut self, to: BuildState) -> Result<(), CoreError> {
        validate_transition(self.state, to)?;
        debug!("build state {} -> {to}", self.state);
        self.state = to;
        Ok(())
    }

    /// Mark the build failed. A no-op once the build has finished.
    pub fn fail(&mut self) {
        if validate_transition(self.state, BuildState::Failed).is_ok() {
            debug!("build state {} -> failed", self.state);
            self.state = BuildState::Failed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        assert!(validate_transition(BuildState::Idle, BuildState::ConfigLoaded).is_ok());
        assert!(validate_transition(BuildState::ConfigLoaded, BuildState::Walked).is_ok());
        assert!(validate_transition(BuildState::Walked, BuildState::ManifestBuilt).is_ok());
        assert!(validate_transition(BuildState::ManifestBuilt, BuildState::Archiving).is_ok());
        assert!(validate_transition(BuildState::Archiving, BuildState::Done).is_ok());
        assert!(validate_transition(BuildState::Idle, BuildState::Failed).is_ok());
        assert!(validate_transition(BuildState::Archiving, BuildState::Failed).is_ok());
    }

    #[test]
    fn invalid_transitions() {
        assert!(validate_transition(BuildState::Idle, BuildState::Walked).is_err());
        assert!(validate_transition(BuildState::Walked, BuildState::Archiving).is_err());
        assert!(validate_transition(BuildState::Done, BuildState::Failed).is_err());
        assert!(validate_transition(BuildState::Failed, BuildState::Idle).is_err());
        assert!(validate_transition(BuildState::Done, BuildState::Idle).is_err()); // no retry
    }

    #[test]
    fn tracker_walks_the_happy_path() {
        let mut t = BuildTracker::default();
        for s in [
            BuildState::ConfigLoaded,
            BuildState::Walked,
            BuildState::ManifestBuilt,
            BuildState::Archiving,
            BuildState::Done,
        ] {
            t.advance(s).unwrap();
        }
        assert_eq!(t.state(), BuildState::Done);
        t.fail();
        assert_eq!(t.state(), BuildState::Done);
    }

    #[test]
    fn tracker_fails_from_any_running_state() {
        let mut t = BuildTracker::default();
        t.advance(BuildState::ConfigLoaded).unwrap();
        t.fail();
        assert_eq!(t.state(), BuildState::Failed);
        assert!(t.advance(BuildState::Walked).is_err());
    }

    #[test]
    fn display_names() {
        assert_eq!(BuildState::ManifestBuilt.to_string(), "manifest-built");
        assert_eq!(BuildState::Failed.to_string(), "failed");
    }
}
