//! In-memory entity store.
//!
//! Reference implementation of [`EntityStore`] used by the binary and by
//! tests. Each collection keeps its entities and links in DashMaps; links
//! are stored in both directions in insertion order.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use obatch_domain::model::{
    EntityBody, EntityRef, HttpMethod, InlineCount, LinkBody, Multiplicity, QueryFacet,
    ResourcePath,
};
use obatch_domain::DomainError;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use crate::error::{StorageError, StorageResult};
use crate::schema::{CollectionSchema, SchemaFile};
use crate::traits::{EntityStore, HealthStatus, StoreRequest, StoreResponse};

/// (entity set, key)
type EntityKey = (String, String);
/// (source entity set, source key, target entity set)
type LinkKey = (String, String, String);

#[derive(Debug, Clone)]
struct StoredEntity {
    key: String,
    properties: Map<String, Value>,
    published: DateTime<Utc>,
    updated: DateTime<Utc>,
    version: u64,
    /// Creation order within the collection.
    seq: u64,
}

impl StoredEntity {
    fn etag(&self) -> String {
        format!("W/\"{}-{}\"", self.version, self.updated.timestamp_millis())
    }

    fn property(&self, name: &str) -> Option<Value> {
        if name == "__id" {
            return Some(Value::String(self.key.clone()));
        }
        self.properties.get(name).cloned()
    }
}

#[derive(Debug)]
struct Collection {
    name: String,
    schema: CollectionSchema,
    entities: DashMap<EntityKey, StoredEntity>,
    links: DashMap<LinkKey, Vec<String>>,
    sequence: AtomicU64,
}

/// In-memory implementation of EntityStore.
///
/// Uses DashMap for thread-safe concurrent access. Every operation is
/// committed immediately; there are no transactions.
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    collections: DashMap<String, Arc<Collection>>,
}

impl MemoryEntityStore {
    /// Creates a new in-memory store with no collections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Creates a store with every collection declared in `file`.
    pub fn from_schema(file: SchemaFile) -> StorageResult<Self> {
        let store = Self::new();
        for (name, schema) in file.collections {
            store.create_collection(name, schema)?;
        }
        Ok(store)
    }

    /// Registers (or replaces) a collection.
    pub fn create_collection(
        &self,
        name: impl Into<String>,
        schema: CollectionSchema,
    ) -> StorageResult<()> {
        schema.validate()?;
        let name = name.into();
        debug!(collection = %name, entity_types = schema.entity_types.len(), "collection created");
        self.collections.insert(
            name.clone(),
            Arc::new(Collection {
                name,
                schema,
                entities: DashMap::new(),
                links: DashMap::new(),
                sequence: AtomicU64::new(0),
            }),
        );
        Ok(())
    }

    /// Keys of the `target_type` entities linked from `source`, in link order.
    pub fn linked_keys(
        &self,
        collection: &str,
        source: &EntityRef,
        target_type: &str,
    ) -> StorageResult<Vec<String>> {
        let col = self.collection(collection)?;
        col.get_entity(&source.entity_set, &source.key)?;
        Ok(col.links_of(source, target_type))
    }

    /// Whether an entity exists.
    pub fn contains_entity(&self, collection: &str, entity_set: &str, key: &str) -> bool {
        self.collection(collection)
            .map(|c| {
                c.entities
                    .contains_key(&(entity_set.to_string(), key.to_string()))
            })
            .unwrap_or(false)
    }

    fn collection(&self, name: &str) -> StorageResult<Arc<Collection>> {
        self.collections
            .get(name)
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| StorageError::CollectionNotFound {
                collection: name.to_string(),
            })
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn execute(
        &self,
        collection: &str,
        request: &StoreRequest,
    ) -> StorageResult<StoreResponse> {
        let col = self.collection(collection)?;
        match (&request.path, request.method) {
            (ResourcePath::EntitySet { entity_set }, HttpMethod::Get) => {
                col.list(entity_set, request.facet.as_ref())
            }
            (ResourcePath::EntitySet { entity_set }, HttpMethod::Post) => {
                let entity = col.create(entity_set, &request.body)?;
                Ok(col.created_response(entity_set, &entity))
            }
            (ResourcePath::Entity { entity_set, key }, HttpMethod::Get) => {
                col.retrieve(entity_set, key, request.facet.as_ref())
            }
            (ResourcePath::Entity { entity_set, key }, HttpMethod::Delete) => {
                col.delete(entity_set, key, request)
            }
            (
                ResourcePath::Entity { entity_set, key },
                method @ (HttpMethod::Put | HttpMethod::Merge | HttpMethod::Patch),
            ) => col.update(entity_set, key, method, request),
            (
                ResourcePath::NavigationProperty {
                    source,
                    property,
                    key: None,
                },
                HttpMethod::Post,
            ) => col.create_via_navigation(source, property, &request.body),
            (
                ResourcePath::Links {
                    source,
                    target_type,
                    target_key: None,
                },
                HttpMethod::Get,
            ) => col.list_links(source, target_type),
            (
                ResourcePath::Links {
                    source,
                    target_type,
                    target_key: None,
                },
                HttpMethod::Post,
            ) => col.create_link(source, target_type, &request.body),
            (path, method) => Err(StorageError::UnsupportedOperation {
                message: format!("{method} on {path}"),
            }),
        }
    }

    async fn current_link_count(
        &self,
        collection: &str,
        source: &EntityRef,
        target_type: &str,
    ) -> StorageResult<u64> {
        let col = self.collection(collection)?;
        col.require_set(&source.entity_set)?;
        col.get_entity(&source.entity_set, &source.key)?;
        Ok(col.link_count(source, target_type))
    }

    async fn association_multiplicity(
        &self,
        collection: &str,
        source_type: &str,
        target_type: &str,
    ) -> StorageResult<Multiplicity> {
        let col = self.collection(collection)?;
        col.require_set(source_type)?;
        col.multiplicity(source_type, target_type)
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: true,
            latency: std::time::Duration::ZERO,
            message: Some("in-memory storage".to_string()),
        })
    }
}

// ============ Collection operations ============

impl Collection {
    fn require_set(&self, entity_set: &str) -> StorageResult<()> {
        if self.schema.has_entity_type(entity_set) {
            Ok(())
        } else {
            Err(StorageError::EntitySetNotFound {
                entity_set: entity_set.to_string(),
            })
        }
    }

    fn multiplicity(&self, source_type: &str, target_type: &str) -> StorageResult<Multiplicity> {
        self.schema
            .multiplicity(source_type, target_type)
            .ok_or_else(|| StorageError::AssociationNotFound {
                source_type: source_type.to_string(),
                target_type: target_type.to_string(),
            })
    }

    fn get_entity(&self, entity_set: &str, key: &str) -> StorageResult<StoredEntity> {
        self.entities
            .get(&(entity_set.to_string(), key.to_string()))
            .map(|e| e.value().clone())
            .ok_or_else(|| StorageError::EntityNotFound {
                entity_set: entity_set.to_string(),
                key: key.to_string(),
            })
    }

    fn location(&self, entity_set: &str, key: &str) -> String {
        format!("/{}/{}('{}')", self.name, entity_set, key)
    }

    fn entity_json(
        &self,
        entity_set: &str,
        entity: &StoredEntity,
        select: Option<&[String]>,
    ) -> Value {
        let mut obj = Map::new();
        obj.insert(
            "__metadata".to_string(),
            json!({
                "uri": self.location(entity_set, &entity.key),
                "etag": entity.etag(),
                "type": format!("UserData.{entity_set}"),
            }),
        );
        obj.insert("__id".to_string(), Value::String(entity.key.clone()));
        obj.insert(
            "__published".to_string(),
            Value::String(format!("/Date({})/", entity.published.timestamp_millis())),
        );
        obj.insert(
            "__updated".to_string(),
            Value::String(format!("/Date({})/", entity.updated.timestamp_millis())),
        );
        let wildcard = select.map_or(true, |s| s.iter().any(|p| p == "*"));
        for (name, value) in &entity.properties {
            if wildcard || select.is_some_and(|s| s.iter().any(|p| p == name)) {
                obj.insert(name.clone(), value.clone());
            }
        }
        Value::Object(obj)
    }

    fn created_response(&self, entity_set: &str, entity: &StoredEntity) -> StoreResponse {
        let body = json!({ "d": { "results": self.entity_json(entity_set, entity, None) } });
        StoreResponse::json(201, &body)
            .with_header("ETag", entity.etag())
            .with_header("Location", self.location(entity_set, &entity.key))
    }

    fn create(&self, entity_set: &str, body: &str) -> StorageResult<StoredEntity> {
        self.require_set(entity_set)?;
        let body = EntityBody::parse(body)?;
        let now = Utc::now();
        match self.entities.entry((entity_set.to_string(), body.id.clone())) {
            Entry::Occupied(_) => Err(StorageError::EntityAlreadyExists {
                entity_set: entity_set.to_string(),
                key: body.id,
            }),
            Entry::Vacant(slot) => {
                let entity = StoredEntity {
                    key: body.id,
                    properties: body.properties,
                    published: now,
                    updated: now,
                    version: 1,
                    seq: self.sequence.fetch_add(1, AtomicOrdering::Relaxed),
                };
                slot.insert(entity.clone());
                Ok(entity)
            }
        }
    }

    fn retrieve(
        &self,
        entity_set: &str,
        key: &str,
        facet: Option<&QueryFacet>,
    ) -> StorageResult<StoreResponse> {
        self.require_set(entity_set)?;
        let entity = self.get_entity(entity_set, key)?;
        let select = facet.and_then(|f| f.select.as_deref());
        let body = json!({ "d": { "results": self.entity_json(entity_set, &entity, select) } });
        Ok(StoreResponse::json(200, &body).with_header("ETag", entity.etag()))
    }

    fn list(&self, entity_set: &str, facet: Option<&QueryFacet>) -> StorageResult<StoreResponse> {
        self.require_set(entity_set)?;
        let default_facet = QueryFacet::default();
        let facet = facet.unwrap_or(&default_facet);

        let mut entities: Vec<StoredEntity> = self
            .entities
            .iter()
            .filter(|e| e.key().0 == entity_set)
            .map(|e| e.value().clone())
            .collect();
        entities.sort_by_key(|e| e.seq);

        if let Some(filter) = &facet.filter {
            let conditions = parse_filter(filter)?;
            entities.retain(|e| {
                conditions
                    .iter()
                    .all(|(name, expected)| e.property(name).as_ref() == Some(expected))
            });
        }
        let count = entities.len();

        if !facet.orderby.is_empty() {
            entities.sort_by(|a, b| {
                facet
                    .orderby
                    .iter()
                    .map(|o| {
                        let ord = compare_values(
                            a.property(&o.property).as_ref(),
                            b.property(&o.property).as_ref(),
                        );
                        if o.descending {
                            ord.reverse()
                        } else {
                            ord
                        }
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let skip = facet.skip.unwrap_or(0) as usize;
        let top = facet.top.map_or(usize::MAX, |t| t as usize);
        let select = facet.select.as_deref();
        let results: Vec<Value> = entities
            .iter()
            .skip(skip)
            .take(top)
            .map(|e| self.entity_json(entity_set, e, select))
            .collect();

        let mut d = Map::new();
        d.insert("results".to_string(), Value::Array(results));
        if facet.inline_count == InlineCount::AllPages {
            d.insert("__count".to_string(), Value::String(count.to_string()));
        }
        Ok(StoreResponse::json(200, &json!({ "d": d })))
    }

    fn check_if_match(
        &self,
        entity_set: &str,
        entity: &StoredEntity,
        request: &StoreRequest,
    ) -> StorageResult<()> {
        match request.header("If-Match") {
            Some(tag) if tag != "*" && tag != entity.etag() => {
                Err(StorageError::PreconditionFailed {
                    entity_set: entity_set.to_string(),
                    key: entity.key.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    fn update(
        &self,
        entity_set: &str,
        key: &str,
        method: HttpMethod,
        request: &StoreRequest,
    ) -> StorageResult<StoreResponse> {
        self.require_set(entity_set)?;
        let body = EntityBody::parse(&request.body)?;
        let mut entry = self
            .entities
            .get_mut(&(entity_set.to_string(), key.to_string()))
            .ok_or_else(|| StorageError::EntityNotFound {
                entity_set: entity_set.to_string(),
                key: key.to_string(),
            })?;
        self.check_if_match(entity_set, &entry, request)?;

        if method == HttpMethod::Put {
            entry.properties = body.properties;
        } else {
            entry.properties.extend(body.properties);
        }
        entry.version += 1;
        entry.updated = Utc::now();
        let etag = entry.etag();
        Ok(StoreResponse::no_content().with_header("ETag", etag))
    }

    fn delete(
        &self,
        entity_set: &str,
        key: &str,
        request: &StoreRequest,
    ) -> StorageResult<StoreResponse> {
        self.require_set(entity_set)?;
        let entity = self.get_entity(entity_set, key)?;
        self.check_if_match(entity_set, &entity, request)?;
        self.entities
            .remove(&(entity_set.to_string(), key.to_string()));
        self.remove_links_of(entity_set, key);
        Ok(StoreResponse::no_content())
    }

    // ============ Links ============

    fn link_count(&self, source: &EntityRef, target_type: &str) -> u64 {
        self.links
            .get(&link_key(source, target_type))
            .map_or(0, |targets| targets.len() as u64)
    }

    fn links_of(&self, source: &EntityRef, target_type: &str) -> Vec<String> {
        self.links
            .get(&link_key(source, target_type))
            .map(|targets| targets.value().clone())
            .unwrap_or_default()
    }

    /// Refuses duplicate links and links that would overfill a single-valued end.
    fn check_link(&self, source: &EntityRef, target: &EntityRef) -> StorageResult<()> {
        let forward = self.multiplicity(&source.entity_set, &target.entity_set)?;
        let reverse = self.multiplicity(&target.entity_set, &source.entity_set)?;

        if self
            .links_of(source, &target.entity_set)
            .iter()
            .any(|k| *k == target.key)
        {
            return Err(StorageError::LinkConflict {
                message: format!("{source} is already linked to {target}"),
            });
        }
        if forward.is_single_valued() && self.link_count(source, &target.entity_set) > 0 {
            return Err(StorageError::LinkConflict {
                message: format!("{source} already has a {} link", target.entity_set),
            });
        }
        if reverse.is_single_valued() && self.link_count(target, &source.entity_set) > 0 {
            return Err(StorageError::LinkConflict {
                message: format!("{target} already has a {} link", source.entity_set),
            });
        }
        Ok(())
    }

    fn add_link(&self, source: &EntityRef, target: &EntityRef) {
        self.links
            .entry(link_key(source, &target.entity_set))
            .or_default()
            .push(target.key.clone());
        self.links
            .entry(link_key(target, &source.entity_set))
            .or_default()
            .push(source.key.clone());
    }

    fn remove_links_of(&self, entity_set: &str, key: &str) {
        let owned: Vec<LinkKey> = self
            .links
            .iter()
            .filter(|e| e.key().0 == entity_set && e.key().1 == key)
            .map(|e| e.key().clone())
            .collect();
        for link in owned {
            let Some(((_, _, target_set), targets)) = self.links.remove(&link) else {
                continue;
            };
            for target_key in targets {
                let reverse = (target_set.clone(), target_key, entity_set.to_string());
                if let Some(mut back) = self.links.get_mut(&reverse) {
                    back.retain(|k| k != key);
                }
            }
        }
    }

    fn create_via_navigation(
        &self,
        source: &EntityRef,
        target_type: &str,
        body: &str,
    ) -> StorageResult<StoreResponse> {
        self.require_set(&source.entity_set)?;
        self.get_entity(&source.entity_set, &source.key)?;
        let forward = self.multiplicity(&source.entity_set, target_type)?;
        if forward.is_single_valued() && self.link_count(source, target_type) > 0 {
            return Err(StorageError::LinkConflict {
                message: format!("{source} already has a {target_type} link"),
            });
        }
        let entity = self.create(target_type, body)?;
        self.add_link(source, &EntityRef::new(target_type, entity.key.clone()));
        Ok(self.created_response(target_type, &entity))
    }

    fn list_links(&self, source: &EntityRef, target_type: &str) -> StorageResult<StoreResponse> {
        self.require_set(&source.entity_set)?;
        self.get_entity(&source.entity_set, &source.key)?;
        self.multiplicity(&source.entity_set, target_type)?;
        let results: Vec<Value> = self
            .links_of(source, target_type)
            .iter()
            .map(|k| json!({ "uri": self.location(target_type, k) }))
            .collect();
        Ok(StoreResponse::json(200, &json!({ "d": { "results": results } })))
    }

    fn create_link(
        &self,
        source: &EntityRef,
        target_type: &str,
        body: &str,
    ) -> StorageResult<StoreResponse> {
        self.require_set(&source.entity_set)?;
        let link = LinkBody::parse(body)?;
        if link.target.entity_set != target_type {
            return Err(DomainError::LinkUriFormat { uri: link.uri }.into());
        }
        self.get_entity(&source.entity_set, &source.key)?;
        self.multiplicity(&source.entity_set, target_type)?;
        self.get_entity(&link.target.entity_set, &link.target.key)?;
        self.check_link(source, &link.target)?;
        self.add_link(source, &link.target);
        Ok(StoreResponse::no_content())
    }
}

fn link_key(source: &EntityRef, target_type: &str) -> LinkKey {
    (
        source.entity_set.clone(),
        source.key.clone(),
        target_type.to_string(),
    )
}

/// Parses `prop eq literal [and prop eq literal ...]`.
fn parse_filter(expr: &str) -> StorageResult<Vec<(String, Value)>> {
    expr.split(" and ")
        .map(|clause| {
            let mut tokens = clause.trim().splitn(3, ' ');
            let (Some(name), Some("eq"), Some(literal)) =
                (tokens.next(), tokens.next(), tokens.next())
            else {
                return Err(StorageError::from(DomainError::FilterParse));
            };
            let literal = literal.trim();
            let value = if let Some(s) = literal
                .strip_prefix('\'')
                .and_then(|l| l.strip_suffix('\''))
            {
                Value::String(s.to_string())
            } else {
                serde_json::from_str::<Value>(literal)
                    .ok()
                    .filter(|v| !v.is_object() && !v.is_array())
                    .ok_or(DomainError::FilterParse)?
            };
            Ok((name.to_string(), value))
        })
        .collect()
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}
