use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};

/// Which image a puzzle was cut from. Pixels never travel with the game;
/// clients resolve the reference themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum ImageRef {
    Catalog { slug: String },
    Upload { hash: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageRefError {
    #[error("missing puzzle slug")]
    MissingSlug,
    #[error("missing image hash")]
    MissingHash,
    #[error("image hash must be hex, got '{0}'")]
    InvalidHash(String),
}

impl ImageRef {
    pub fn catalog(slug: &str) -> Self {
        ImageRef::Catalog {
            slug: slug.trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ImageRefError> {
        match self {
            ImageRef::Catalog { slug } => {
                if slug.trim().is_empty() {
                    return Err(ImageRefError::MissingSlug);
                }
                Ok(())
            }
            ImageRef::Upload { hash } => {
                let hash = hash.trim();
                if hash.is_empty() {
                    return Err(ImageRefError::MissingHash);
                }
                if !hash.chars().all(|ch| ch.is_ascii_hexdigit()) {
                    return Err(ImageRefError::InvalidHash(hash.to_string()));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRef::Catalog { slug } => write!(f, "catalog:{slug}"),
            ImageRef::Upload { hash } => write!(f, "upload:{hash}"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CatalogEntry {
    pub label: &'static str,
    pub slug: &'static str,
    pub width: u32,
    pub height: u32,
}

pub const DEFAULT_PUZZLE_SLUG: &str = "harbor-dusk";

pub const PUZZLE_CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        label: "Harbor at Dusk",
        slug: DEFAULT_PUZZLE_SLUG,
        width: 1600,
        height: 1200,
    },
    CatalogEntry {
        label: "Alpine Meadow",
        slug: "alpine-meadow",
        width: 1920,
        height: 1080,
    },
    CatalogEntry {
        label: "Lantern Street",
        slug: "lantern-street",
        width: 1200,
        height: 1500,
    },
];

pub fn puzzle_by_slug(slug: &str) -> Option<&'static CatalogEntry> {
    let trimmed = slug.trim();
    PUZZLE_CATALOG
        .iter()
        .find(|entry| entry.slug.eq_ignore_ascii_case(trimmed))
}
