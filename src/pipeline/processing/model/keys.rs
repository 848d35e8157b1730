use crate::config::KeysConfig;

/// Normalizes customer numbers from different source systems to one match key:
/// trimmed, uppercased, separators removed, and a known system prefix stripped.
#[derive(Debug, Clone)]
pub struct CustomerKeyNormalizer {
    prefixes: Vec<String>,
    separators: Vec<char>,
}

impl Default for CustomerKeyNormalizer {
    fn default() -> Self {
        Self::from_config(&KeysConfig::default())
    }
}

impl CustomerKeyNormalizer {
    pub fn new(prefixes: &[String], separators: &[char]) -> Self {
        let mut prefixes: Vec<String> = prefixes.iter().map(|p| p.trim().to_uppercase()).collect();
        // Longest first so overlapping prefixes strip deterministically
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self {
            prefixes,
            separators: separators.to_vec(),
        }
    }

    pub fn from_config(config: &KeysConfig) -> Self {
        Self::new(&config.customer_prefixes, &config.customer_separators)
    }

    pub fn normalize(&self, key: &str) -> String {
        let cleaned: String = key
            .trim()
            .to_uppercase()
            .chars()
            .filter(|c| !self.separators.contains(c))
            .collect();
        for prefix in &self.prefixes {
            if let Some(rest) = cleaned.strip_prefix(prefix.as_str()) {
                if !rest.is_empty() {
                    return rest.to_string();
                }
            }
        }
        cleaned
    }
}
