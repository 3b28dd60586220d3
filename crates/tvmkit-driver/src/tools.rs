//! Head-mountable tools and their mapping onto physical heads
//!
//! A tool is anything the host moves around the table: a nozzle, a camera, a
//! dispenser. Nozzles sit on one of the four physical heads and carry an XY
//! offset from the gantry reference point. Other tools ride the gantry with
//! no Z or rotation of their own.

use std::collections::HashMap;
use tvmkit_core::{ControllerError, HeadIndex, Location, Result};
use tvmkit_settings::NozzleSettings;

/// Prefix of nozzle tool names
pub const NOZZLE_PREFIX: &str = "NZ";

/// One head-mountable tool
#[derive(Debug, Clone, PartialEq)]
pub struct Tool {
    /// Name the host refers to the tool by
    pub name: String,
    /// Physical head for nozzles
    pub head: Option<HeadIndex>,
    /// Offset from the gantry reference point
    pub offset: Location,
}

impl Tool {
    /// A nozzle on `head`
    pub fn nozzle(name: impl Into<String>, head: HeadIndex, offset: Location) -> Self {
        Self {
            name: name.into(),
            head: Some(head),
            offset,
        }
    }

    /// A tool without Z or rotation
    pub fn fixed(name: impl Into<String>, offset: Location) -> Self {
        Self {
            name: name.into(),
            head: None,
            offset,
        }
    }

    /// Tool for `name` when nothing was configured: `NZ<digit>` names a
    /// nozzle on that head, anything else is a fixed tool. Offsets are zero.
    pub fn from_name(name: &str) -> Result<Self> {
        let zero = Location::new(0.0, 0.0, 0.0, 0.0);
        match name.strip_prefix(NOZZLE_PREFIX) {
            Some(rest) => {
                let index = rest
                    .chars()
                    .next()
                    .and_then(|c| c.to_digit(10))
                    .ok_or_else(|| {
                        ControllerError::invalid_argument(format!(
                            "nozzle name {} has no head digit",
                            name
                        ))
                    })?;
                Ok(Self::nozzle(name, HeadIndex::new(index as usize)?, zero))
            }
            None => Ok(Self::fixed(name, zero)),
        }
    }

    /// Whether the tool has its own Z and rotation
    pub fn is_nozzle(&self) -> bool {
        self.head.is_some()
    }
}

/// Registry of configured tools, with name-based fallback
#[derive(Debug, Clone, Default)]
pub struct ToolMap {
    tools: HashMap<String, Tool>,
}

impl ToolMap {
    /// Empty map; every lookup falls back to [`Tool::from_name`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map holding the configured nozzles
    pub fn from_nozzles(nozzles: &[NozzleSettings]) -> Result<Self> {
        let mut map = Self::new();
        for nozzle in nozzles {
            let head = HeadIndex::new(nozzle.head)?;
            map.insert(Tool::nozzle(nozzle.name.clone(), head, nozzle.offset));
        }
        Ok(map)
    }

    /// Add or replace a tool
    pub fn insert(&mut self, tool: Tool) {
        self.tools.insert(tool.name.clone(), tool);
    }

    /// The tool called `name`
    pub fn resolve(&self, name: &str) -> Result<Tool> {
        match self.tools.get(name) {
            Some(tool) => Ok(tool.clone()),
            None => Tool::from_name(name),
        }
    }

    /// Number of configured tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are configured
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
