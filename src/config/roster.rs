//! Roster files.
//!
//! A roster is a TOML file listing the staff available to the dispatcher:
//!
//! ```toml
//! [[employee]]
//! id = 1
//! tier = "operator"
//!
//! [[employee]]
//! id = 2
//! tier = "director"
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::{Employee, EmployeeId, Tier};

/// Top-level TOML wrapper.
#[derive(Debug, Deserialize)]
struct RosterFile {
    #[serde(default)]
    employee: Vec<EmployeeEntry>,
}

#[derive(Debug, Deserialize)]
struct EmployeeEntry {
    id: EmployeeId,
    tier: Tier,
}

/// Staff list loaded from a roster file, in file order.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    employees: Vec<Employee>,
}

impl Roster {
    /// Read and validate a roster file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read roster {}: {e}", path.display()))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("bad roster {}: {e}", path.display())))
    }

    /// Parse roster TOML. Employee ids must be unique.
    pub fn parse(content: &str) -> Result<Self> {
        let file: RosterFile =
            toml::from_str(content).map_err(|e| Error::Config(e.message().to_string()))?;

        let mut seen = HashSet::new();
        let mut employees = Vec::with_capacity(file.employee.len());
        for entry in file.employee {
            if !seen.insert(entry.id) {
                return Err(Error::Config(format!("duplicate employee id {}", entry.id)));
            }
            employees.push(Employee::new(entry.id.0, entry.tier));
        }
        Ok(Self { employees })
    }

    pub fn employees(&self) -> &[Employee] {
        &self.employees
    }

    pub fn len(&self) -> usize {
        self.employees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.employees.is_empty()
    }

    pub fn into_employees(self) -> Vec<Employee> {
        self.employees
    }
}
