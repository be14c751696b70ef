//! Profiles reported by `sop list-profiles`

use std::fmt;
use std::str::FromStr;

use crate::error::{ErrorKind, SopError};

/// Upper bound on the rendered line, in bytes.
const MAX_LINE_BYTES: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    name: String,
    description: Option<String>,
    aliases: Vec<String>,
}

impl Profile {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Result<Self, SopError> {
        Self::with_aliases(name, description, Vec::new())
    }

    pub fn with_aliases(
        name: impl Into<String>,
        description: Option<String>,
        aliases: Vec<String>,
    ) -> Result<Self, SopError> {
        let name = name.into();
        let invalid = |why: &str| SopError::new(ErrorKind::BadData, format!("Invalid profile name '{}': {}", name, why));

        if name.trim().is_empty() {
            return Err(invalid("name cannot be empty"));
        }
        if name.contains(':') {
            return Err(invalid("name cannot contain ':'"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(invalid("name cannot contain whitespace"));
        }

        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let profile = Self {
            name,
            description,
            aliases,
        };

        if profile.to_string().len() > MAX_LINE_BYTES {
            return Err(SopError::new(
                ErrorKind::BadData,
                format!("The line representation of a profile must not exceed {} bytes", MAX_LINE_BYTES),
            ));
        }
        Ok(profile)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.description.is_some() || !self.aliases.is_empty() {
            f.write_str(":")?;
        }
        if let Some(description) = &self.description {
            write!(f, " {}", description)?;
        }
        if !self.aliases.is_empty() {
            write!(f, " (aliases: {})", self.aliases.join(", "))?;
        }
        Ok(())
    }
}

impl FromStr for Profile {
    type Err = SopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();

        let Some((name, rest)) = line.split_once(": ") else {
            let name = line.strip_suffix(':').unwrap_or(line);
            return Profile::new(name, None);
        };

        let rest = rest.trim();
        match rest.find("(aliases: ") {
            Some(start) => {
                let description = rest[..start].trim().to_string();
                let list = &rest[start + "(aliases: ".len()..];
                let list = list.strip_suffix(')').unwrap_or(list);
                let aliases = list.split(", ").map(|a| a.trim().to_string()).filter(|a| !a.is_empty()).collect();
                Profile::with_aliases(name, Some(description), aliases)
            }
            None => Profile::new(name, Some(rest.to_string())),
        }
    }
}

/// Parse `list-profiles` output, one profile per non-blank line.
pub fn parse_profiles(text: &str) -> Result<Vec<Profile>, SopError> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_only() {
        let p: Profile = "default".parse().unwrap();
        assert_eq!(p.name(), "default");
        assert_eq!(p.description(), None);
        assert_eq!(p.to_string(), "default");

        let p: Profile = "rfc4880:".parse().unwrap();
        assert_eq!(p.name(), "rfc4880");
    }

    #[test]
    fn test_description_and_aliases() {
        let p: Profile = "rfc9580: Modern OpenPGP (aliases: default, security)".parse().unwrap();
        assert_eq!(p.name(), "rfc9580");
        assert_eq!(p.description(), Some("Modern OpenPGP"));
        assert_eq!(p.aliases(), &["default".to_string(), "security".to_string()]);
        assert_eq!(p.to_string(), "rfc9580: Modern OpenPGP (aliases: default, security)");
    }

    #[test]
    fn test_invalid_names() {
        assert!(Profile::new("", None).is_err());
        assert!(Profile::new("a:b", None).is_err());
        assert!(Profile::new("two words", None).is_err());
    }

    #[test]
    fn test_line_limit() {
        let long = "x".repeat(1200);
        let err = Profile::new("p", Some(long)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadData);
    }

    #[test]
    fn test_parse_listing() {
        let list = parse_profiles("rfc4880: Legacy\n\nrfc9580: Modern\n").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].name(), "rfc9580");
    }
}
