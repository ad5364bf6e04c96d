//! Site content produced by the static-site build
//!
//! The shell only reads this data. Every collection is optional so that
//! the built-in fallbacks kick in when the build did not provide it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Wire envelope: `{ "content": { ... } }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteData {
    #[serde(default)]
    pub content: SiteContent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteContent {
    #[serde(default)]
    pub projects: Option<Vec<Project>>,
    #[serde(default)]
    pub skills: Option<Vec<Skill>>,
    #[serde(default)]
    pub posts: Option<Vec<Post>>,
    #[serde(default)]
    pub welcome_messages: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub featured: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub summary: String,
    pub url: String,
}

impl SiteContent {
    /// Load the content envelope from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read site content from {}", path.display()))?;
        Self::from_json(&raw)
    }

    /// Load from an optional path; no path means an empty site
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let data: SiteData = serde_json::from_str(raw).context("Failed to parse site content")?;
        Ok(data.content)
    }

    /// Posts in source order, empty when the build supplied none
    pub fn posts(&self) -> &[Post] {
        self.posts.as_deref().unwrap_or(&[])
    }

    /// Group skills by category, keeping first-appearance order of categories
    pub fn skills_by_category(&self) -> Option<Vec<(&str, Vec<&Skill>)>> {
        let skills = self.skills.as_ref()?;
        let mut groups: Vec<(&str, Vec<&Skill>)> = Vec::new();

        for skill in skills {
            match groups
                .iter_mut()
                .find(|(category, _)| *category == skill.category.as_str())
            {
                Some((_, members)) => members.push(skill),
                None => groups.push((skill.category.as_str(), vec![skill])),
            }
        }

        Some(groups)
    }

    /// Split projects into (featured, other), preserving source order
    pub fn partition_projects(&self) -> Option<(Vec<&Project>, Vec<&Project>)> {
        let projects = self.projects.as_ref()?;
        Some(projects.iter().partition(|p| p.featured))
    }
}
