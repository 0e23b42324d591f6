//! Name and uuid resolution for v3 entities.
//!
//! Names are not unique on the server, so [`EntityResolver::resolve_by_name`] never
//! picks a match on the caller's behalf: more than one match is reported as
//! [`Error::Ambiguous`] with every candidate.

use prism_core::query::{ListQuery, DEFAULT_PAGE_LENGTH};
use prism_core::types::EntityKind;
use prism_core::uuid::{EntityUuid, UuidPolicy};
use prism_core::{Candidate, Error, Result};
use std::sync::Arc;
use tracing::debug;

use crate::models::{Entity, ListResponse};
use crate::transport::{ApiRequest, Transport};

/// Resolves names and uuids to entities through list and get calls.
#[derive(Clone)]
pub struct EntityResolver {
    transport: Arc<dyn Transport>,
    policy: UuidPolicy,
}

impl EntityResolver {
    /// Create a resolver dispatching through `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            policy: UuidPolicy::default(),
        }
    }

    /// Set the identifier checking policy applied by [`Self::resolve_by_uuid`].
    #[must_use]
    pub const fn with_policy(mut self, policy: UuidPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run a list query against the collection of `kind`.
    ///
    /// When `query` sets no page length, pages of [`DEFAULT_PAGE_LENGTH`] are fetched
    /// until `metadata.total_matches` entities were seen or a short page arrives.
    /// With an explicit length only that one page is fetched.
    ///
    /// # Errors
    ///
    /// Returns transport errors, or `InvalidResponse` if the envelope is malformed.
    pub async fn list(&self, kind: EntityKind, query: &ListQuery) -> Result<Vec<Entity>> {
        if query.length.is_some() {
            let (entities, _) = self.list_page(kind, query).await?;
            return Ok(entities);
        }

        let mut offset = query.offset.unwrap_or(0);
        let mut collected = Vec::new();
        loop {
            let page = query
                .clone()
                .with_length(DEFAULT_PAGE_LENGTH)
                .with_offset(offset);
            let (entities, total) = self.list_page(kind, &page).await?;
            let received = u32::try_from(entities.len()).unwrap_or(u32::MAX);
            collected.extend(entities);

            let exhausted = match total {
                Some(total) => offset.saturating_add(received) >= total,
                None => false,
            };
            if exhausted || received < DEFAULT_PAGE_LENGTH {
                break;
            }
            offset = offset.saturating_add(received);
            debug!(%kind, offset, ?total, "fetching next list page");
        }
        Ok(collected)
    }

    /// Fetch a single page and the server's `total_matches`, if reported.
    async fn list_page(
        &self,
        kind: EntityKind,
        query: &ListQuery,
    ) -> Result<(Vec<Entity>, Option<u32>)> {
        let body = serde_json::to_value(query)?;
        let response = self
            .transport
            .dispatch(ApiRequest::post(kind.list_path(), body))
            .await?;
        let envelope: ListResponse = serde_json::from_value(response).map_err(|err| {
            Error::InvalidResponse(format!("Malformed {kind} list response: {err}"))
        })?;

        let total = envelope.metadata.and_then(|metadata| metadata.total_matches);
        let entities = envelope
            .entities
            .into_iter()
            .map(|raw| Entity::from_raw(kind, raw))
            .collect::<Result<Vec<_>>>()?;
        Ok((entities, total))
    }

    /// Every entity of `kind` whose name is exactly `name`.
    ///
    /// The server-side filter is applied first; the exact comparison guards against
    /// servers that treat the filter value as a pattern.
    ///
    /// # Errors
    ///
    /// Returns transport errors.
    pub async fn find_by_name(&self, kind: EntityKind, name: &str) -> Result<Vec<Entity>> {
        let entities = self.list(kind, &ListQuery::by_name(kind, name)).await?;
        Ok(entities
            .into_iter()
            .filter(|entity| entity.name.as_deref() == Some(name))
            .collect())
    }

    /// Resolve `name` to exactly one entity.
    ///
    /// # Errors
    ///
    /// * `ValidationError` - the name is empty or blank
    /// * `NotFound` - nothing matched
    /// * `Ambiguous` - more than one entity matched; all are listed
    pub async fn resolve_entity_by_name(&self, kind: EntityKind, name: &str) -> Result<Entity> {
        if name.trim().is_empty() {
            return Err(Error::ValidationError(format!(
                "{kind} name must not be empty"
            )));
        }

        let mut matches = self.find_by_name(kind, name).await?;
        debug!(%kind, name, matches = matches.len(), "resolved name");

        match matches.len() {
            0 => Err(Error::NotFound(format!("No {kind} named `{name}`"))),
            1 => {
                let entity = matches.remove(0);
                if entity.uuid.is_none() {
                    return Err(Error::InvalidResponse(format!(
                        "{kind} `{name}` has no metadata.uuid"
                    )));
                }
                Ok(entity)
            }
            _ => Err(Error::Ambiguous {
                name: name.to_string(),
                candidates: candidates(kind, &matches)?,
            }),
        }
    }

    /// Resolve `name` to exactly one uuid.
    ///
    /// # Errors
    ///
    /// See [`Self::resolve_entity_by_name`].
    pub async fn resolve_by_name(&self, kind: EntityKind, name: &str) -> Result<EntityUuid> {
        let entity = self.resolve_entity_by_name(kind, name).await?;
        entity.uuid.ok_or_else(|| {
            Error::InvalidResponse(format!("{kind} `{name}` has no metadata.uuid"))
        })
    }

    /// Fetch one entity by uuid.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUuid` if the identifier fails the configured policy, or the
    /// transport error (a missing entity surfaces as the server's 404).
    pub async fn resolve_by_uuid(&self, kind: EntityKind, uuid: &str) -> Result<Entity> {
        let uuid = EntityUuid::parse_with(uuid, self.policy)?;
        let raw = self
            .transport
            .dispatch(ApiRequest::get(kind.entity_path(uuid.as_str())))
            .await?;
        Entity::from_raw(kind, raw)
    }
}

fn candidates(kind: EntityKind, matches: &[Entity]) -> Result<Vec<Candidate>> {
    matches
        .iter()
        .enumerate()
        .map(|(index, entity)| {
            let uuid = entity.uuid.as_ref().ok_or_else(|| {
                Error::InvalidResponse(format!("{kind} candidate #{index} has no metadata.uuid"))
            })?;
            Ok(Candidate {
                index,
                uuid: uuid.to_string(),
                name: entity.name.clone(),
            })
        })
        .collect()
}
