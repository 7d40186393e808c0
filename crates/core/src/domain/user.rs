use serde::{Deserialize, Serialize};

/// Identity snapshot the engine authorizes against. Sourced from the HRIS
/// lookup upstream; the engine never fetches it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub nik: String,
    pub name: String,
    /// Job title string ("jabatan") used for keyword-based approver checks.
    pub role: String,
    pub division: String,
    pub directorate: String,
}

impl Actor {
    pub fn new(
        nik: impl Into<String>,
        name: impl Into<String>,
        role: impl Into<String>,
        division: impl Into<String>,
        directorate: impl Into<String>,
    ) -> Self {
        Self {
            nik: nik.into(),
            name: name.into(),
            role: role.into(),
            division: division.into(),
            directorate: directorate.into(),
        }
    }
}
