//! Voice profiles
//!
//! A profile only contributes its display name to the system instruction;
//! the synthetic voice itself is the same for every profile.

use serde::{Deserialize, Serialize};

/// A selectable voice character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub id: String,
    pub name: String,
    pub icon: String,
}

impl VoiceProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: icon.into(),
        }
    }

    /// System instruction embedding this profile's display name
    pub fn system_instruction(&self) -> String {
        format!(
            "You are a voice changer. Your goal is to repeat what I say in the voice of {}. \
             Do not add any extra words. Just repeat my words in the specified voice.",
            self.name
        )
    }
}

/// Built-in catalog
pub fn default_profiles() -> Vec<VoiceProfile> {
    [
        ("girl", "Girl", "👧"),
        ("messi", "Messi", "⚽"),
        ("ronaldo", "Ronaldo", "🏆"),
        ("oggy", "Oggy", "🐱"),
        ("gojo", "Gojo", "👁️"),
        ("sukuna", "Sukuna", "😈"),
        ("goku", "Goku", "🐉"),
        ("eren", "Eren", "💪"),
        ("toji", "Toji", "⚔️"),
        ("naruto", "Naruto", "🍥"),
        ("kakashi", "Kakashi", "🔥"),
        ("robot", "Robot", "🤖"),
    ]
    .into_iter()
    .map(|(id, name, icon)| VoiceProfile::new(id, name, icon))
    .collect()
}

/// Find a profile by id, falling back to the first entry of the catalog
pub fn find_or_first<'a>(catalog: &'a [VoiceProfile], id: &str) -> Option<&'a VoiceProfile> {
    catalog.iter().find(|p| p.id == id).or_else(|| catalog.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_ids_are_unique() {
        let catalog = default_profiles();
        assert_eq!(catalog.len(), 12);
        let mut ids: Vec<_> = catalog.iter().map(|p| p.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 12);
    }

    #[test]
    fn test_lookup_falls_back_to_first() {
        let catalog = default_profiles();
        assert_eq!(find_or_first(&catalog, "goku").unwrap().name, "Goku");
        assert_eq!(find_or_first(&catalog, "nobody").unwrap().id, "girl");
        assert!(find_or_first(&[], "goku").is_none());
    }

    #[test]
    fn test_instruction_embeds_name() {
        let profile = VoiceProfile::new("robot", "Robot", "🤖");
        let instruction = profile.system_instruction();
        assert!(instruction.contains("in the voice of Robot."));
        assert!(instruction.starts_with("You are a voice changer."));
    }
}
