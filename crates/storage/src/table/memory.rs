//! In-process table backend
//!
//! `MemoryTable` keeps one table in a `BTreeMap` ordered by (hash key, sort
//! key) behind a `parking_lot::RwLock`. Conditional writes evaluate their
//! condition and apply the write under the same write lock, so they are
//! atomic like the remote backend's.

use super::expr::{parse_projection, Condition, Update};
use super::{
    DeleteRequest, GetRequest, PutRequest, QueryRequest, QueryResponse, TableClient, TableError,
    UpdateRequest,
};
use keyfold_core::{Config, Item, Value};
use parking_lot::RwLock;
use std::collections::BTreeMap;

type RowKey = (String, String);

/// Ordered in-memory table
#[derive(Debug)]
pub struct MemoryTable {
    name: String,
    hash_attr: String,
    sort_attr: String,
    page_cap: Option<usize>,
    rows: RwLock<BTreeMap<RowKey, Item>>,
}

impl MemoryTable {
    /// Empty table named and keyed as configured
    pub fn new(config: &Config) -> Self {
        Self {
            name: config.collection.clone(),
            hash_attr: config.hash_key.clone(),
            sort_attr: config.sort_key.clone(),
            page_cap: None,
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    /// Cap every query page at `cap` items, whatever the request's limit
    pub fn with_page_cap(mut self, cap: usize) -> Self {
        self.page_cap = Some(cap);
        self
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Whether the table holds no items
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    fn check_table(&self, table: &str) -> Result<(), TableError> {
        if table == self.name {
            Ok(())
        } else {
            Err(TableError::ResourceNotFound(table.to_string()))
        }
    }

    fn key_part(&self, item: &Item, attr: &str) -> Result<String, TableError> {
        match item.get(attr) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(Value::String(_)) => Err(TableError::Validation(format!(
                "key attribute '{}' is an empty string",
                attr
            ))),
            Some(other) => Err(TableError::Validation(format!(
                "key attribute '{}' must be a string, found {}",
                attr,
                other.type_name()
            ))),
            None => Err(TableError::Validation(format!(
                "missing key attribute '{}'",
                attr
            ))),
        }
    }

    fn row_key(&self, item: &Item) -> Result<RowKey, TableError> {
        Ok((
            self.key_part(item, &self.hash_attr)?,
            self.key_part(item, &self.sort_attr)?,
        ))
    }

    fn key_item(&self, (hash, sort): &RowKey) -> Item {
        let mut item = Item::new();
        item.insert(self.hash_attr.clone(), Value::from(hash.as_str()));
        item.insert(self.sort_attr.clone(), Value::from(sort.as_str()));
        item
    }

    fn parse_condition(
        text: Option<&str>,
        names: &super::NameTable,
        values: &super::ValueTable,
    ) -> Result<Option<Condition>, TableError> {
        text.map(|text| Condition::parse(text, names, values))
            .transpose()
    }
}

impl TableClient for MemoryTable {
    fn get_item(&self, request: GetRequest) -> Result<Option<Item>, TableError> {
        self.check_table(&request.table)?;
        let key = self.row_key(&request.key)?;
        let projection = request
            .projection
            .as_deref()
            .map(|text| parse_projection(text, &request.names))
            .transpose()?;

        let Some(mut item) = self.rows.read().get(&key).cloned() else {
            return Ok(None);
        };
        if let Some(paths) = projection {
            item.retain(|attr, _| paths.iter().any(|p| p == attr));
        }
        Ok(Some(item))
    }

    fn put_item(&self, request: PutRequest) -> Result<(), TableError> {
        self.check_table(&request.table)?;
        let key = self.row_key(&request.item)?;
        let condition =
            Self::parse_condition(request.condition.as_deref(), &request.names, &request.values)?;

        let mut rows = self.rows.write();
        if let Some(condition) = condition {
            if !condition.eval(rows.get(&key)) {
                return Err(TableError::ConditionalCheckFailed);
            }
        }
        rows.insert(key, request.item);
        Ok(())
    }

    fn delete_item(&self, request: DeleteRequest) -> Result<(), TableError> {
        self.check_table(&request.table)?;
        let key = self.row_key(&request.key)?;
        let condition =
            Self::parse_condition(request.condition.as_deref(), &request.names, &request.values)?;

        let mut rows = self.rows.write();
        if let Some(condition) = condition {
            if !condition.eval(rows.get(&key)) {
                return Err(TableError::ConditionalCheckFailed);
            }
        }
        rows.remove(&key);
        Ok(())
    }

    fn update_item(&self, request: UpdateRequest) -> Result<Item, TableError> {
        self.check_table(&request.table)?;
        let key = self.row_key(&request.key)?;
        let condition =
            Self::parse_condition(request.condition.as_deref(), &request.names, &request.values)?;
        let update = request
            .update
            .as_deref()
            .map(|text| Update::parse(text, &request.names, &request.values))
            .transpose()?
            .unwrap_or_default();

        if let Some(path) = update
            .paths()
            .find(|p| *p == self.hash_attr || *p == self.sort_attr)
        {
            return Err(TableError::Validation(format!(
                "cannot update key attribute '{}'",
                path
            )));
        }

        let mut rows = self.rows.write();
        let current = rows.get(&key);
        if let Some(condition) = condition {
            if !condition.eval(current) {
                return Err(TableError::ConditionalCheckFailed);
            }
        }
        let mut item = current.cloned().unwrap_or_else(|| self.key_item(&key));
        update.apply(&mut item);
        rows.insert(key, item.clone());
        Ok(item)
    }

    fn query(&self, request: QueryRequest) -> Result<QueryResponse, TableError> {
        self.check_table(&request.table)?;
        let key_condition =
            Condition::parse(&request.key_condition, &request.names, &request.values)?;
        let hash = key_condition
            .equality_on(&self.hash_attr)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                TableError::Validation(format!(
                    "key condition must require '{}' to equal a string",
                    self.hash_attr
                ))
            })?
            .to_string();
        let filter =
            Self::parse_condition(request.filter.as_deref(), &request.names, &request.values)?;
        let start = request
            .start_key
            .as_ref()
            .map(|key| self.row_key(key))
            .transpose()?;
        let limit = match (request.limit, self.page_cap) {
            (Some(limit), Some(cap)) => Some(limit.min(cap)),
            (limit, cap) => limit.or(cap),
        };
        if limit == Some(0) {
            return Err(TableError::Validation("limit must be positive".into()));
        }

        let rows = self.rows.read();
        let mut candidates: Vec<(&RowKey, &Item)> = rows
            .range((hash.clone(), String::new())..)
            .take_while(|((h, _), _)| *h == hash)
            .filter(|(_, item)| key_condition.eval(Some(*item)))
            .collect();
        if !request.forward {
            candidates.reverse();
        }
        if let Some(start) = &start {
            candidates.retain(|(key, _)| {
                if request.forward {
                    *key > start
                } else {
                    *key < start
                }
            });
        }

        let evaluated = limit.map_or(candidates.len(), |l| l.min(candidates.len()));
        let last_evaluated_key = if evaluated < candidates.len() {
            candidates[..evaluated]
                .last()
                .map(|(key, _)| self.key_item(key))
        } else {
            None
        };
        let items = candidates[..evaluated]
            .iter()
            .filter(|(_, item)| filter.as_ref().map_or(true, |f| f.eval(Some(*item))))
            .map(|(_, item)| (*item).clone())
            .collect();

        Ok(QueryResponse {
            items,
            last_evaluated_key,
        })
    }
}
