//! Domain primitives shared by services, jobs and the API.
//!
//! Ids are wrapped in newtypes so a client id can never be passed where a
//! media item id is expected.

pub mod events;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Default,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub const fn new(id: i32) -> Self {
                debug_assert!(id >= 0, concat!(stringify!($name), " should be non-negative"));
                Self(id)
            }

            #[must_use]
            pub const fn value(&self) -> i32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self::new(id)
            }
        }
    };
}

id_newtype!(
    /// Database id of a configured media server.
    ///
    /// ```rust
    /// use mediahub::domain::ClientId;
    ///
    /// let id = ClientId::new(3);
    /// assert_eq!(id.value(), 3);
    /// assert_eq!(id.to_string(), "3");
    /// ```
    ClientId
);

id_newtype!(
    /// Database id of a repository media item.
    MediaItemId
);

id_newtype!(
    /// Database id of a job run.
    JobRunId
);

/// Background jobs tracked in `job_runs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    MediaSync,
    ListSync,
    Recommendations,
}

impl JobType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MediaSync => "media_sync",
            Self::ListSync => "list_sync",
            Self::Recommendations => "recommendations",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "media_sync" => Ok(Self::MediaSync),
            "list_sync" => Ok(Self::ListSync),
            "recommendations" => Ok(Self::Recommendations),
            other => Err(format!("unknown job type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_finished(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_newtypes() {
        let id = ClientId::new(42);
        assert_eq!(id.value(), 42);
        assert_eq!(i32::from(id), 42);
        assert_eq!(ClientId::from(7).to_string(), "7");
        assert_eq!(serde_json::to_string(&MediaItemId::new(5)).unwrap(), "5");
        let parsed: JobRunId = serde_json::from_str("9").unwrap();
        assert_eq!(parsed, JobRunId::new(9));
    }

    #[test]
    fn test_job_enums_round_trip() {
        for t in [JobType::MediaSync, JobType::ListSync, JobType::Recommendations] {
            assert_eq!(t.as_str().parse::<JobType>().unwrap(), t);
        }
        for s in [JobStatus::Running, JobStatus::Completed, JobStatus::Failed] {
            assert_eq!(s.to_string().parse::<JobStatus>().unwrap(), s);
        }
        assert!(!JobStatus::Running.is_finished());
        assert!(JobStatus::Failed.is_finished());
        assert!("cleanup".parse::<JobType>().is_err());
    }
}
