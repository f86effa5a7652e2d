//! Link cardinality guard.
//!
//! Consulted right before a part that would create a link: a navigation
//! property POST or a `$links` POST. Counts are read live from the store on
//! every call, so earlier parts of the same envelope are observed.

use obatch_domain::model::{EntityRef, ResourcePath};
use obatch_storage::{EntityStore, StorageError};
use tracing::debug;

use super::types::{error_codes, PartError, PartErrorKind};

#[derive(Debug, Clone, Copy)]
pub struct LinkGuard {
    max_per_triple: u64,
}

impl LinkGuard {
    pub fn new(max_per_triple: u64) -> Self {
        Self { max_per_triple }
    }

    /// Checks that one more link from the path's source is allowed.
    ///
    /// Paths that do not create links pass unchecked.
    pub async fn check<S: EntityStore + ?Sized>(
        &self,
        store: &S,
        collection: &str,
        path: &ResourcePath,
    ) -> Result<(), PartError> {
        let (source, target_type) = match path {
            ResourcePath::NavigationProperty {
                source, property, ..
            } => (source, property.as_str()),
            ResourcePath::Links {
                source,
                target_type,
                ..
            } => (source, target_type.as_str()),
            _ => return Ok(()),
        };

        let multiplicity = store
            .association_multiplicity(collection, &source.entity_set, target_type)
            .await
            .map_err(|e| match e {
                StorageError::AssociationNotFound { .. } if path.is_navigation_property() => {
                    PartError::new(
                        PartErrorKind::NotFound,
                        error_codes::NO_SUCH_NAVIGATION_PROPERTY,
                        format!("navigation property [_{target_type}] not found"),
                    )
                }
                other => PartError::from(other),
            })?;

        let count = store
            .current_link_count(collection, source, target_type)
            .await?;
        debug!(%source, target_type, %multiplicity, count, "link guard");

        if multiplicity.is_single_valued() && count > 0 {
            return Err(conflict(source, target_type));
        }
        if !multiplicity.is_single_valued() && count >= self.max_per_triple {
            return Err(PartError::new(
                PartErrorKind::BadRequest,
                error_codes::LINK_UPPER_LIMIT_RECORD_EXCEEDED,
                format!(
                    "{source} already has {count} {target_type} links, maximum is {}",
                    self.max_per_triple
                ),
            ));
        }
        Ok(())
    }
}

fn conflict(source: &EntityRef, target_type: &str) -> PartError {
    PartError::new(
        PartErrorKind::Conflict,
        error_codes::CONFLICT_LINKS,
        format!("{source} already has a {target_type} link"),
    )
}
