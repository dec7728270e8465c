// src/session.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::AppConfig;
use crate::models::Employee;

pub const ADMIN_HOME: &str = "/dashboard";
pub const PRODUCER_HOME: &str = "/producer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Producer,
    SegmentLeader,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Producer => "PRODUCER",
            Role::SegmentLeader => "SEGMENT_LEADER",
        }
    }

    /// Producers and segment leaders share the segment-scoped view.
    pub fn is_segment_scoped(&self) -> bool {
        matches!(self, Role::Producer | Role::SegmentLeader)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "PRODUCER" => Ok(Role::Producer),
            "SEGMENT_LEADER" => Ok(Role::SegmentLeader),
            other => Err(format!("Unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub segment: Option<String>,
}

/// Authenticated state against the remote API. Persisted to the session file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub role: Role,
    pub segment: Option<String>,
    #[serde(default)]
    pub user: UserInfo,
}

/// Which employees a session may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    AllEmployees,
    Segment(String),
    /// A producer without a segment sees nobody.
    Nothing,
}

impl Scope {
    pub fn admits(&self, employee: &Employee) -> bool {
        match self {
            Scope::AllEmployees => true,
            Scope::Segment(segment) => employee.segment.as_deref() == Some(segment.as_str()),
            Scope::Nothing => false,
        }
    }
}

impl Session {
    pub fn scope(&self) -> Scope {
        if self.role == Role::Admin {
            return Scope::AllEmployees;
        }
        match self.segment.as_deref().map(str::trim) {
            Some(segment) if !segment.is_empty() => Scope::Segment(segment.to_string()),
            _ => Scope::Nothing,
        }
    }

    pub fn home_route(&self) -> &'static str {
        match self.role {
            Role::Admin => ADMIN_HOME,
            Role::Producer | Role::SegmentLeader => PRODUCER_HOME,
        }
    }

    pub fn poll_interval(&self, config: &AppConfig) -> Duration {
        config.poll_interval(self.role)
    }

    pub fn display_name(&self) -> &str {
        self.user
            .name
            .as_deref()
            .or(self.user.email.as_deref())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: Role, segment: Option<&str>) -> Session {
        Session {
            token: "t0k3n".to_string(),
            role,
            segment: segment.map(str::to_string),
            user: UserInfo::default(),
        }
    }

    fn employee_in(segment: &str) -> Employee {
        Employee {
            segment: Some(segment.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_admin_sees_everyone() {
        let scope = session(Role::Admin, Some("Assemblage")).scope();
        assert_eq!(scope, Scope::AllEmployees);
        assert!(scope.admits(&employee_in("Logistique")));
    }

    #[test]
    fn test_producer_is_scoped_to_segment() {
        let scope = session(Role::Producer, Some("Assemblage")).scope();
        assert!(scope.admits(&employee_in("Assemblage")));
        assert!(!scope.admits(&employee_in("Logistique")));
        assert!(!scope.admits(&Employee::default()));
    }

    #[test]
    fn test_producer_without_segment_sees_nothing() {
        assert_eq!(session(Role::SegmentLeader, None).scope(), Scope::Nothing);
        assert_eq!(session(Role::Producer, Some("  ")).scope(), Scope::Nothing);
    }

    #[test]
    fn test_home_route_by_role() {
        assert_eq!(session(Role::Admin, None).home_route(), "/dashboard");
        assert_eq!(session(Role::Producer, Some("A")).home_route(), "/producer");
        assert_eq!(session(Role::SegmentLeader, Some("A")).home_route(), "/producer");
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("segment_leader".parse::<Role>(), Ok(Role::SegmentLeader));
        assert_eq!(" ADMIN ".parse::<Role>(), Ok(Role::Admin));
        assert!("viewer".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::SegmentLeader).unwrap(), "\"SEGMENT_LEADER\"");
    }
}
