//! Static description of the skills the assistant can invoke.

use serde::{Deserialize, Serialize};

/// One entry of the skill catalog shown in the sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillInfo {
    pub name: String,
    pub description: String,
    pub icon: String,
}

impl SkillInfo {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        icon: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            icon: icon.into(),
        }
    }
}

/// Body of `GET /api/skills`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SkillCatalog {
    #[serde(default)]
    pub skills: Vec<SkillInfo>,
}

/// Catalog used when the backend cannot be reached.
pub fn default_skills() -> Vec<SkillInfo> {
    vec![
        SkillInfo::new(
            "Work Order Lookup",
            "Search work orders by ID, product, or status",
            "📋",
        ),
        SkillInfo::new(
            "Equipment Status",
            "Check machine health, sensors, and maintenance",
            "🔧",
        ),
        SkillInfo::new(
            "Defect Report",
            "Log quality defects and non-conformance reports",
            "🔍",
        ),
        SkillInfo::new(
            "Knowledge Base",
            "Search SOPs, safety protocols, and procedures",
            "📖",
        ),
        SkillInfo::new(
            "Engineer Escalation",
            "Escalate issues to engineering or management",
            "🙋",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let skills = default_skills();
        assert_eq!(skills.len(), 5);
        assert_eq!(skills[0].name, "Work Order Lookup");
    }

    #[test]
    fn test_catalog_parses_api_body() {
        let catalog: SkillCatalog = serde_json::from_str(
            r#"{"skills": [{"name": "Equipment Status", "description": "d", "icon": "🔧"}]}"#,
        )
        .unwrap();
        assert_eq!(catalog.skills[0].name, "Equipment Status");
    }
}
