use serde::{Deserialize, Serialize};

use mfgplan_core::{DomainError, DomainResult, Entity, MaterialId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialType {
    Raw,
    Semi,
    Finished,
}

/// Material master record (anything a BOM item can consume).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub part_num: String,
    pub material_type: MaterialType,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Stock unit of measure.
    pub uom: String,
}

impl Material {
    pub fn new(
        id: MaterialId,
        part_num: impl Into<String>,
        material_type: MaterialType,
        uom: impl Into<String>,
    ) -> Self {
        Self {
            id,
            part_num: part_num.into(),
            material_type,
            name: None,
            description: None,
            uom: uom.into(),
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.part_num.trim().is_empty() {
            return Err(DomainError::validation("part_num cannot be empty"));
        }
        if self.uom.trim().is_empty() {
            return Err(DomainError::validation("uom cannot be empty"));
        }
        Ok(())
    }
}

impl Entity for Material {
    type Id = MaterialId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
