use std::collections::HashMap;

use tracing::warn;

use super::package::Package;
use super::rels::{parse_relationships, relationship_targets, rels_path_for};
use super::xml::{parse_xml_part, XmlPart};
use crate::error::{Error, Result};

pub struct PartReader<'p> {
    package: &'p Package,
}

impl<'p> PartReader<'p> {
    pub fn new(package: &'p Package) -> Self {
        Self { package }
    }

    pub fn package(&self) -> &'p Package {
        self.package
    }

    /// A missing or malformed required part is fatal. An optional one yields
    /// `Ok(None)` so the caller can carry on without it.
    pub fn load_part(&self, path: &str, required: bool) -> Result<Option<XmlPart>> {
        let Some(entry) = self.package.entry(path) else {
            if required {
                return Err(Error::MissingPart(path.to_string()));
            }
            return Ok(None);
        };
        match parse_xml_part(path, &entry.data) {
            Ok(part) => Ok(Some(part)),
            Err(err) if required => Err(Error::malformed(path, &err)),
            Err(err) => {
                warn!(part = path, error = %format!("{err:#}"), "skipping unparsable optional part");
                Ok(None)
            }
        }
    }

    pub fn require_part(&self, path: &str) -> Result<XmlPart> {
        self.load_part(path, true)?
            .ok_or_else(|| Error::MissingPart(path.to_string()))
    }

    /// Relationship id -> package path for relationships of `type_filter`
    /// declared by `source_part`.
    pub fn resolve_relationships(
        &self,
        source_part: &str,
        type_filter: &str,
        required: bool,
    ) -> Result<HashMap<String, String>> {
        let rels_path = rels_path_for(source_part);
        let Some(rels) = self.load_part(&rels_path, required)? else {
            return Ok(HashMap::new());
        };
        Ok(relationship_targets(&parse_relationships(&rels), source_part, type_filter))
    }
}
