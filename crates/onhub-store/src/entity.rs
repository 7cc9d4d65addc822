use chrono::Utc;
use rand::Rng;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use onhub_types::{ChangeEvent, Entity};

use crate::error::{Result, StoreError};
use crate::{Backend, Store};

/// Partial update: top-level fields to merge into a record.
pub type Patch = Map<String, Value>;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 7;

/// Record id: current epoch milliseconds in base36 plus a short random
/// base36 suffix. Not collision-free under concurrent creation at the same
/// millisecond; good enough for single-user drives, and the on-disk format
/// elsewhere assumes this shape.
pub fn generate_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let mut id = to_base36(millis);
    let mut rng = rand::rng();
    for _ in 0..SUFFIX_LEN {
        id.push(BASE36[rng.random_range(0..BASE36.len())] as char);
    }
    id
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".into();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// Schema validation at the adapter edge: a record that does not
/// deserialize into its entity type is rejected, never passed through.
pub(crate) fn decode<T: Entity>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|source| StoreError::Invalid {
        kind: T::KIND,
        source,
    })
}

impl Store {
    /// Records matching every filter key exactly. Local: in-process
    /// conjunction over the whole collection, insertion order. Remote: the
    /// filters travel as query parameters and the server does the matching.
    pub async fn list<T: Entity>(&self, filters: &Patch) -> Result<Vec<T>> {
        let raw = match self.backend()? {
            Backend::Local(local) => local.list(T::KIND, filters)?,
            Backend::Remote(remote) => remote.list(T::KIND, filters).await?,
        };
        raw.into_iter().map(decode::<T>).collect()
    }

    pub async fn list_all<T: Entity>(&self) -> Result<Vec<T>> {
        self.list(&Patch::new()).await
    }

    /// `None` on an unknown id for both backends (remote 404 is normalized).
    pub async fn get<T: Entity>(&self, id: &str) -> Result<Option<T>> {
        let raw = match self.backend()? {
            Backend::Local(local) => local.get(T::KIND, id)?,
            Backend::Remote(remote) => remote.get(T::KIND, id).await?,
        };
        raw.map(decode::<T>).transpose()
    }

    /// Persist a new record: assigns the generated id and stamps both
    /// timestamps to the same instant.
    pub async fn create<T: Entity>(&self, mut record: T) -> Result<T> {
        let now = Utc::now();
        {
            let meta = record.meta_mut();
            meta.id = generate_id();
            meta.created_at = now;
            meta.updated_at = now;
        }
        let value = serde_json::to_value(&record)?;
        match self.backend()? {
            Backend::Local(local) => {
                local.insert(T::KIND, &value)?;
                Ok(record)
            }
            Backend::Remote(remote) => decode(remote.create(T::KIND, &value).await?),
        }
    }

    /// Field-merge update, refreshing `updated_at`. Backend asymmetry,
    /// preserved deliberately: the local backend fails with `NotFound` on a
    /// missing id, the remote backend upserts.
    pub async fn update<T: Entity>(&self, id: &str, patch: Patch) -> Result<T> {
        match self.backend()? {
            Backend::Local(local) => {
                let current = local
                    .get(T::KIND, id)?
                    .ok_or_else(|| StoreError::not_found(T::KIND, id))?;
                let Value::Object(mut fields) = current else {
                    return Err(StoreError::Invalid {
                        kind: T::KIND,
                        source: serde::de::Error::custom("record is not a JSON object"),
                    });
                };
                for (key, value) in patch {
                    fields.insert(key, value);
                }
                fields.insert("updated_at".into(), serde_json::to_value(Utc::now())?);
                let merged = Value::Object(fields);
                let record = decode::<T>(merged.clone())?;
                local.replace(T::KIND, id, &merged)?;
                Ok(record)
            }
            Backend::Remote(remote) => {
                decode(remote.update(T::KIND, id, &Value::Object(patch)).await?)
            }
        }
    }

    /// Physical removal, bypassing the trash.
    pub async fn delete<T: Entity>(&self, id: &str) -> Result<bool> {
        match self.backend()? {
            Backend::Local(local) => local.delete(T::KIND, id),
            Backend::Remote(remote) => remote.delete(T::KIND, id).await,
        }
    }

    /// Change events for local mutations. Remote mutations publish nothing
    /// (the REST contract has no push channel).
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.local().subscribe()
    }
}
