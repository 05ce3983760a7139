use std::fmt;

/// A parsed container image reference of the form `registry/repository:tag`.
///
/// Only explicitly tagged references parse successfully. Digest-pinned
/// references (`...@sha256:...`) and references without a tag are rejected,
/// so they never contribute to the in-use set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

#[derive(Debug)]
pub enum ParseError {
    MissingRegistry,
    MissingRepository,
    MissingTag,
    InvalidFormat(String),
    DigestNotAllowed,
}

impl std::error::Error for ParseError {}
impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::DigestNotAllowed => write!(f, "digest references are not allowed"),
            ParseError::MissingRegistry => write!(f, "registry is missing"),
            ParseError::MissingRepository => write!(f, "repository is missing"),
            ParseError::MissingTag => write!(f, "tag is missing"),
            ParseError::InvalidFormat(image) => write!(f, "invalid image format: {}", image),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

impl ImageReference {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        // Tag-less and digest-pinned references are excluded from cleanup
        // decisions rather than guessed at
        if s.contains('@') {
            return Err(ParseError::DigestNotAllowed);
        }

        // The tag separator is a colon after the last slash; a colon before
        // that belongs to a registry port
        let last_slash = s.rfind('/').unwrap_or(0);
        let (without_tag, tag) = match s.rfind(':') {
            Some(pos) if pos > last_slash => (&s[..pos], &s[pos + 1..]),
            _ => return Err(ParseError::MissingTag),
        };
        if tag.is_empty() {
            return Err(ParseError::MissingTag);
        }

        // The first path segment is the registry host, the rest is the
        // repository path (which may itself contain slashes)
        let (registry, repository) = without_tag
            .split_once('/')
            .ok_or_else(|| ParseError::InvalidFormat(s.to_string()))?;

        if registry.is_empty() {
            return Err(ParseError::MissingRegistry);
        }
        if repository.is_empty() {
            return Err(ParseError::MissingRepository);
        }

        Ok(Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_reference() {
        let reference = ImageReference::parse("registry.example.com/app:v1.2.3").unwrap();
        assert_eq!(reference.registry, "registry.example.com");
        assert_eq!(reference.repository, "app");
        assert_eq!(reference.tag, "v1.2.3");
    }

    #[test]
    fn parses_nested_repository_path() {
        let reference =
            ImageReference::parse("id.dkr.ecr.eu-west-1.amazonaws.com/team/service:tag-1").unwrap();
        assert_eq!(reference.repository, "team/service");
        assert_eq!(reference.tag, "tag-1");
    }

    #[test]
    fn parses_registry_with_port() {
        let reference = ImageReference::parse("localhost:5000/app:latest").unwrap();
        assert_eq!(reference.registry, "localhost:5000");
        assert_eq!(reference.repository, "app");
        assert_eq!(reference.tag, "latest");
    }

    #[test]
    fn rejects_digest_reference() {
        let err = ImageReference::parse("registry.example.com/app@sha256:abcdef").unwrap_err();
        assert!(matches!(err, ParseError::DigestNotAllowed));
    }

    #[test]
    fn rejects_reference_without_tag() {
        let err = ImageReference::parse("registry.example.com/app").unwrap_err();
        assert!(matches!(err, ParseError::MissingTag));
    }

    #[test]
    fn rejects_port_only_colon_as_tag() {
        let err = ImageReference::parse("localhost:5000/app").unwrap_err();
        assert!(matches!(err, ParseError::MissingTag));
    }

    #[test]
    fn rejects_empty_tag() {
        let err = ImageReference::parse("registry.example.com/app:").unwrap_err();
        assert!(matches!(err, ParseError::MissingTag));
    }

    #[test]
    fn rejects_bare_image_name() {
        let err = ImageReference::parse("app:latest").unwrap_err();
        assert!(matches!(err, ParseError::InvalidFormat(_)));
    }

    #[test]
    fn rejects_empty_repository() {
        let err = ImageReference::parse("registry.example.com/:latest").unwrap_err();
        assert!(matches!(err, ParseError::MissingRepository));
    }

    #[test]
    fn display_round_trips() {
        let raw = "registry.example.com/team/app:v2";
        let reference = ImageReference::parse(raw).unwrap();
        assert_eq!(reference.to_string(), raw);
    }
}
