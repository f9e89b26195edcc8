//! Rollenmodell
//!
//! Geschlossene Menge von Rollen mit Faehigkeits-Praedikaten. Aufrufer
//! fragen Faehigkeiten ab statt Rollennamen zu vergleichen.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EmpowerlyError;

/// Rolle eines Benutzers in der Organisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rolle {
    #[serde(rename = "ADMIN")]
    Admin,
    #[serde(rename = "HR")]
    Personal,
    #[default]
    #[serde(rename = "EMPLOYEE")]
    Mitarbeiter,
}

impl Rolle {
    /// Admin oder Personalabteilung
    pub fn hat_personalrechte(&self) -> bool {
        matches!(self, Self::Admin | Self::Personal)
    }

    pub fn ist_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Ziel nach dem Verlassen eines Meetings
    pub fn dashboard_pfad(&self) -> &'static str {
        match self {
            Self::Admin => "/dashboard/admin",
            Self::Personal => "/dashboard/hr",
            Self::Mitarbeiter => "/dashboard/employee",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Personal => "HR",
            Self::Mitarbeiter => "EMPLOYEE",
        }
    }
}

impl fmt::Display for Rolle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rolle {
    type Err = EmpowerlyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Self::Admin),
            "HR" => Ok(Self::Personal),
            "EMPLOYEE" => Ok(Self::Mitarbeiter),
            _ => Err(EmpowerlyError::UngueltigeRolle(s.to_string())),
        }
    }
}
