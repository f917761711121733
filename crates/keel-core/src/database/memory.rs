//! In-memory implementation of [`DatabaseClient`].

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{DatabaseClient, Object, ObjectQueryResult, Query, QueryOptions, WritePrecondition};
use crate::error::{Error, Result};
use crate::etag;
use crate::resource_id::ResourceId;

/// In-memory object store.
///
/// Thread-safe via `RwLock`. Keys are canonical (lower-cased) identifiers, so
/// lookups ignore case while the stored ID keeps the case it was last saved with.
/// Queries page in key order.
#[derive(Debug, Default, Clone)]
pub struct InMemoryClient {
    objects: Arc<RwLock<BTreeMap<String, Object>>>,
}

impl InMemoryClient {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the lock is poisoned.
    pub fn clear(&self) -> Result<()> {
        self.objects.write().map_err(|_| poisoned())?.clear();
        Ok(())
    }

    /// Number of stored objects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.objects.read().map_err(|_| poisoned())?.len())
    }

    /// Returns true if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn poisoned() -> Error {
    Error::Internal {
        message: "lock poisoned".into(),
    }
}

fn check_precondition(
    id: &ResourceId,
    current: Option<&Object>,
    precondition: &WritePrecondition,
) -> Result<()> {
    match precondition {
        WritePrecondition::None => Ok(()),
        WritePrecondition::MatchesETag(expected) => match current {
            Some(obj) if obj.metadata.etag == *expected => Ok(()),
            _ => Err(Error::concurrency(id.to_string())),
        },
    }
}

fn decode_token(token: &str) -> Result<String> {
    let bytes = hex::decode(token)
        .map_err(|e| Error::InvalidInput(format!("invalid pagination token: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::InvalidInput(format!("invalid pagination token: {e}")))
}

#[async_trait]
impl DatabaseClient for InMemoryClient {
    async fn get(&self, id: &ResourceId) -> Result<Object> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        objects
            .get(&id.canonical_key())
            .cloned()
            .ok_or_else(|| Error::not_found(id.to_string()))
    }

    async fn save(&self, object: &mut Object, precondition: WritePrecondition) -> Result<()> {
        let key = object.metadata.id.canonical_key();
        let new_etag = etag::compute(&object.data)?;

        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        check_precondition(&object.metadata.id, objects.get(&key), &precondition)?;

        object.metadata.etag = new_etag;
        objects.insert(key, object.clone());
        drop(objects);

        tracing::trace!(id = %object.metadata.id, etag = %object.metadata.etag, "saved object");
        Ok(())
    }

    async fn delete(&self, id: &ResourceId, precondition: WritePrecondition) -> Result<()> {
        let key = id.canonical_key();
        let mut objects = self.objects.write().map_err(|_| poisoned())?;

        if matches!(precondition, WritePrecondition::None) && !objects.contains_key(&key) {
            return Err(Error::not_found(id.to_string()));
        }
        check_precondition(id, objects.get(&key), &precondition)?;

        objects.remove(&key);
        Ok(())
    }

    async fn query(&self, query: &Query, options: &QueryOptions) -> Result<ObjectQueryResult> {
        query.validate()?;

        let start = match &options.pagination_token {
            Some(token) => Bound::Excluded(decode_token(token)?),
            None => Bound::Unbounded,
        };
        let limit = options.max_items.unwrap_or(usize::MAX);
        if limit == 0 {
            return Err(Error::InvalidInput("max_items must be positive".into()));
        }

        let objects = self.objects.read().map_err(|_| poisoned())?;
        let mut matching = objects
            .range((start, Bound::Unbounded))
            .filter(|(_, obj)| query.matches(&obj.metadata.id, &obj.data));

        let mut items = Vec::new();
        let mut last_key = None;
        for (key, obj) in matching.by_ref().take(limit) {
            items.push(obj.clone());
            last_key = Some(key);
        }
        let pagination_token = match (matching.next(), last_key) {
            (Some(_), Some(key)) => Some(hex::encode(key)),
            _ => None,
        };

        Ok(ObjectQueryResult {
            items,
            pagination_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(s: &str) -> ResourceId {
        ResourceId::parse(s).unwrap()
    }

    const RESOURCE: &str =
        "/planes/radius/local/resourceGroups/group1/providers/System.Resources/resourceType1/resource1";

    #[tokio::test]
    async fn save_sets_content_etag() {
        let client = InMemoryClient::new();
        let mut obj = Object::new(id(RESOURCE), json!({"value": "1"}));
        client.save(&mut obj, WritePrecondition::None).await.unwrap();

        assert_eq!(obj.etag(), etag::compute(&json!({"value": "1"})).unwrap());
        let stored = client.get(&id(RESOURCE)).await.unwrap();
        assert_eq!(stored, obj);
    }

    #[tokio::test]
    async fn lookups_ignore_case_and_keep_saved_id() {
        let client = InMemoryClient::new();
        let mut obj = Object::new(id(RESOURCE), json!({}));
        client.save(&mut obj, WritePrecondition::None).await.unwrap();

        let upper = id(&RESOURCE.to_uppercase());
        let stored = client.get(&upper).await.unwrap();
        assert_eq!(stored.id().to_string(), RESOURCE);

        client.delete(&upper, WritePrecondition::None).await.unwrap();
        assert!(client.is_empty().unwrap());
    }

    #[tokio::test]
    async fn stale_etag_leaves_object_untouched() {
        let client = InMemoryClient::new();
        let mut obj = Object::new(id(RESOURCE), json!({"value": "1"}));
        client.save(&mut obj, WritePrecondition::None).await.unwrap();
        let original = obj.clone();

        obj.data = json!({"value": "2"});
        let err = client
            .save(&mut obj, WritePrecondition::MatchesETag("stale".into()))
            .await
            .unwrap_err();
        assert!(err.is_concurrency());
        assert_eq!(obj.etag(), original.etag());
        assert_eq!(client.get(&id(RESOURCE)).await.unwrap(), original);
    }

    #[tokio::test]
    async fn delete_missing_object() {
        let client = InMemoryClient::new();
        let err = client
            .delete(&id(RESOURCE), WritePrecondition::None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = client
            .delete(&id(RESOURCE), WritePrecondition::MatchesETag("x".into()))
            .await
            .unwrap_err();
        assert!(err.is_concurrency());
    }

    #[tokio::test]
    async fn query_pages_through_results() {
        let client = InMemoryClient::new();
        for n in 0..5 {
            let mut obj = Object::new(
                id(&format!("{RESOURCE}/nestedType/nested{n}")),
                json!({"value": n.to_string()}),
            );
            client.save(&mut obj, WritePrecondition::None).await.unwrap();
        }

        let query = Query::new(id("/planes/radius/local/resourceGroups/group1"))
            .resource_type("System.Resources/resourceType1/nestedType");

        let mut seen = Vec::new();
        let mut options = QueryOptions {
            max_items: Some(2),
            pagination_token: None,
        };
        loop {
            let page = client.query(&query, &options).await.unwrap();
            assert!(page.items.len() <= 2);
            seen.extend(page.items.into_iter().map(|o| o.id().name().to_string()));
            match page.pagination_token {
                Some(token) => options.pagination_token = Some(token),
                None => break,
            }
        }
        assert_eq!(seen, ["nested0", "nested1", "nested2", "nested3", "nested4"]);
    }

    #[tokio::test]
    async fn query_rejects_bad_token() {
        let client = InMemoryClient::new();
        let query = Query::new(ResourceId::root());
        let options = QueryOptions {
            max_items: None,
            pagination_token: Some("not-hex".into()),
        };
        let err = client.query(&query, &options).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
