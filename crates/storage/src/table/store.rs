//! Table adapter
//!
//! Turns adapter calls into [`TableClient`] requests. Predicates arrive as
//! typed values and are compiled here; the key condition uses its own
//! `#k0`/`#k1` aliases and update actions use `#u<n>`, neither of which can
//! collide with the `#__<wire>__` aliases of compiled predicates.

use super::{
    DeleteRequest, GetRequest, PutRequest, QueryRequest, TableClient, TableError, UpdateRequest,
};
use keyfold_core::{
    guard_failure, Adapter, Config, Context, Cursor, Error, Expression, Item, Key, KeyCodec, Page,
    Predicate, Projection, Query, Result, Value, WriteOp,
};
use tracing::{debug, trace, warn};

/// [`Adapter`] over a sorted-table backend
#[derive(Debug)]
pub struct TableStore<C> {
    client: C,
    config: Config,
    keys: KeyCodec,
}

impl<C: TableClient> TableStore<C> {
    /// Adapter over `client` for the configured table
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the configuration is invalid.
    pub fn new(client: C, config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            config: config.clone(),
            keys: KeyCodec::new(config),
        })
    }

    /// Underlying client
    pub fn client(&self) -> &C {
        &self.client
    }

    fn table(&self) -> String {
        self.config.collection.clone()
    }

    fn transport(&self, op: &str, e: TableError) -> Error {
        Error::service_io_with(format!("{} on table '{}'", op, self.config.collection), e)
    }

    fn write_failure(
        &self,
        op: WriteOp,
        key: &Key,
        guard: Option<&Predicate>,
        e: TableError,
    ) -> Error {
        match e {
            TableError::ConditionalCheckFailed => {
                warn!(
                    target: "keyfold::table",
                    op = op.name(),
                    key = %key,
                    guard = ?guard.map(ToString::to_string),
                    "Write guard rejected"
                );
                guard_failure(op, key, guard)
            }
            other => self.transport(op.name(), other),
        }
    }

    fn key_condition(&self, query: &Query) -> Expression {
        let mut expr = Expression::default();
        expr.names
            .insert("#k0".into(), self.keys.hash_attr().to_string());
        expr.values
            .insert(":k0".into(), Value::from(query.hash_key.as_str()));
        expr.condition = "#k0 = :k0".into();

        if let Some(prefix) = query.sort_prefix.as_deref().filter(|p| !p.is_empty()) {
            expr.names
                .insert("#k1".into(), self.keys.sort_attr().to_string());
            expr.values.insert(":k1".into(), Value::from(prefix));
            expr.condition.push_str(" AND begins_with(#k1, :k1)");
        }
        expr
    }
}

fn guard_expression(guard: Option<&Predicate>) -> Expression {
    guard.map(Predicate::compile).unwrap_or_default()
}

fn non_empty(condition: String) -> Option<String> {
    Some(condition).filter(|c| !c.is_empty())
}

impl<C: TableClient> Adapter for TableStore<C> {
    fn fetch_page(&self, ctx: &Context, query: &Query, cursor: Option<&Cursor>) -> Result<Page> {
        ctx.check()?;

        let key_condition = self.key_condition(query);
        let filter = query
            .filter
            .as_ref()
            .map(Predicate::compile)
            .unwrap_or_default();
        let limit = match query.limit {
            Some(requested) => Some(self.config.page_limit(requested)?),
            None => self.config.page_size,
        };
        let start_key = match cursor {
            Some(cursor) if !cursor.is_zero() => Some(self.keys.encode(&cursor.key()?)),
            _ => None,
        };

        let key_text = key_condition.condition.clone();
        let filter_condition = non_empty(filter.condition.clone());
        let merged = key_condition.and(filter)?;
        let request = QueryRequest {
            table: self.table(),
            key_condition: key_text,
            filter: filter_condition,
            names: merged.names,
            values: merged.values,
            limit,
            forward: !query.reverse,
            start_key,
        };

        debug!(
            target: "keyfold::table",
            hash_key = %query.hash_key,
            sort_prefix = ?query.sort_prefix,
            limit = ?limit,
            reverse = query.reverse,
            resume = cursor.map_or(false, |c| !c.is_zero()),
            "Query"
        );
        let response = self
            .client
            .query(request)
            .map_err(|e| self.transport("query", e))?;
        ctx.check()?;

        let next = response
            .last_evaluated_key
            .map(|key| self.keys.decode("LastEvaluatedKey", &key))
            .transpose()?
            .map(|key| Cursor::at(&key));
        trace!(
            target: "keyfold::table",
            items = response.items.len(),
            more = next.is_some(),
            "Query page"
        );
        Ok(Page {
            items: response.items,
            next,
        })
    }

    fn get_item(&self, ctx: &Context, key: &Key, projection: Option<&Projection>) -> Result<Item> {
        ctx.check()?;
        let request = GetRequest {
            table: self.table(),
            key: self.keys.encode(key),
            projection: projection.map(|p| p.expression.clone()),
            names: projection.map(|p| p.names.clone()).unwrap_or_default(),
        };

        debug!(target: "keyfold::table", key = %key, "GetItem");
        let item = self
            .client
            .get_item(request)
            .map_err(|e| self.transport("get", e))?;
        ctx.check()?;
        item.ok_or_else(|| Error::not_found(key.to_string()))
    }

    fn put_item(&self, ctx: &Context, item: Item, guard: Option<&Predicate>) -> Result<()> {
        ctx.check()?;
        let key = self.keys.decode("item", &item)?;
        let expr = guard_expression(guard);
        let request = PutRequest {
            table: self.table(),
            item,
            condition: non_empty(expr.condition),
            names: expr.names,
            values: expr.values,
        };

        debug!(target: "keyfold::table", key = %key, guarded = guard.is_some(), "PutItem");
        self.client
            .put_item(request)
            .map_err(|e| self.write_failure(WriteOp::Put, &key, guard, e))
    }

    fn delete_item(&self, ctx: &Context, key: &Key, guard: Option<&Predicate>) -> Result<()> {
        ctx.check()?;
        let expr = guard_expression(guard);
        let request = DeleteRequest {
            table: self.table(),
            key: self.keys.encode(key),
            condition: non_empty(expr.condition),
            names: expr.names,
            values: expr.values,
        };

        debug!(target: "keyfold::table", key = %key, guarded = guard.is_some(), "DeleteItem");
        self.client
            .delete_item(request)
            .map_err(|e| self.write_failure(WriteOp::Remove, key, guard, e))
    }

    fn update_item(
        &self,
        ctx: &Context,
        key: &Key,
        delta: Item,
        guard: Option<&Predicate>,
    ) -> Result<Item> {
        ctx.check()?;
        let mut expr = guard_expression(guard);
        let mut actions = Vec::with_capacity(delta.len());
        for (n, (attr, value)) in delta.into_iter().enumerate() {
            if self.keys.is_key_attr(&attr) {
                continue;
            }
            let (name, literal) = (format!("#u{}", n), format!(":u{}", n));
            actions.push(format!("{} = {}", name, literal));
            expr.names.insert(name, attr);
            expr.values.insert(literal, value);
        }
        let request = UpdateRequest {
            table: self.table(),
            key: self.keys.encode(key),
            update: if actions.is_empty() {
                None
            } else {
                Some(format!("SET {}", actions.join(", ")))
            },
            condition: non_empty(expr.condition),
            names: expr.names,
            values: expr.values,
        };

        debug!(
            target: "keyfold::table",
            key = %key,
            attributes = actions.len(),
            guarded = guard.is_some(),
            "UpdateItem"
        );
        self.client
            .update_item(request)
            .map_err(|e| self.write_failure(WriteOp::Update, key, guard, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{MemoryTable, QueryResponse};
    use keyfold_core::{Attribute, CancelToken};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn config() -> Config {
        Config::new("things")
    }

    fn store() -> TableStore<MemoryTable> {
        TableStore::new(MemoryTable::new(&config()), &config()).unwrap()
    }

    fn item(hash: &str, sort: &str, age: i64) -> Item {
        let mut item = Item::new();
        item.insert("prefix".into(), Value::from(hash));
        item.insert("suffix".into(), Value::from(sort));
        item.insert("age".into(), Value::Int(age));
        item
    }

    /// Records the last query request and answers with an empty page
    #[derive(Default)]
    struct Recorder {
        last: Mutex<Option<QueryRequest>>,
    }

    impl TableClient for Recorder {
        fn get_item(&self, _: GetRequest) -> std::result::Result<Option<Item>, TableError> {
            Err(TableError::Transport("connection reset".into()))
        }
        fn put_item(&self, _: PutRequest) -> std::result::Result<(), TableError> {
            Ok(())
        }
        fn delete_item(&self, _: DeleteRequest) -> std::result::Result<(), TableError> {
            Ok(())
        }
        fn update_item(&self, _: UpdateRequest) -> std::result::Result<Item, TableError> {
            Ok(Item::new())
        }
        fn query(&self, request: QueryRequest) -> std::result::Result<QueryResponse, TableError> {
            *self.last.lock() = Some(request);
            Ok(QueryResponse::default())
        }
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let err = store()
            .get_item(&Context::background(), &Key::new("a", "1").unwrap(), None)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_transport_error_is_service_io() {
        let store = TableStore::new(Recorder::default(), &config()).unwrap();
        let err = store
            .get_item(&Context::background(), &Key::new("a", "1").unwrap(), None)
            .unwrap_err();
        assert!(matches!(err, Error::ServiceIo { .. }));
        assert!(err.to_string().contains("things"));
    }

    #[test]
    fn test_query_request_shape() {
        let recorder = Arc::new(Recorder::default());
        let store = TableStore::new(Arc::clone(&recorder), &config()).unwrap();
        let query = Query::new("dead:beef")
            .with_sort_prefix("a/")
            .with_filter(Attribute::key("age").lt(65))
            .with_limit(5000);
        let cursor = Cursor::at(&Key::new("dead:beef", "a/1").unwrap());

        store
            .fetch_page(&Context::background(), &query, Some(&cursor))
            .unwrap();

        let request = recorder.last.lock().clone().unwrap();
        assert_eq!(request.key_condition, "#k0 = :k0 AND begins_with(#k1, :k1)");
        assert_eq!(request.filter.as_deref(), Some("#__age__ < :__age__"));
        assert_eq!(request.names["#k0"], "prefix");
        assert_eq!(request.names["#__age__"], "age");
        assert_eq!(request.values[":k1"], Value::from("a/"));
        assert_eq!(request.limit, Some(1000));
        assert!(request.forward);
        assert_eq!(
            request.start_key.unwrap()["suffix"],
            Value::from("a/1")
        );
    }

    #[test]
    fn test_zero_cursor_starts_from_beginning() {
        let recorder = Arc::new(Recorder::default());
        let store = TableStore::new(Arc::clone(&recorder), &config()).unwrap();
        store
            .fetch_page(&Context::background(), &Query::new("a"), Some(&Cursor::default()))
            .unwrap();
        assert!(recorder.last.lock().clone().unwrap().start_key.is_none());
    }

    #[test]
    fn test_fetch_page_continuation() {
        let table = MemoryTable::new(&config()).with_page_cap(2);
        let store = TableStore::new(table, &config()).unwrap();
        let ctx = Context::background();
        for n in 1..=3 {
            store
                .put_item(&ctx, item("a", &n.to_string(), n), None)
                .unwrap();
        }

        let page = store.fetch_page(&ctx, &Query::new("a"), None).unwrap();
        assert_eq!(page.items.len(), 2);
        let next = page.next.unwrap();
        assert_eq!(next.sort_key(), "2");

        let page = store
            .fetch_page(&ctx, &Query::new("a"), Some(&next))
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.next.is_none());
    }

    #[test]
    fn test_put_eq_guard_mismatch_is_conflict() {
        let store = store();
        let ctx = Context::background();
        store.put_item(&ctx, item("a", "1", 64), None).unwrap();

        let guard = Attribute::key("age").eq(65);
        let err = store
            .put_item(&ctx, item("a", "1", 66), Some(&guard))
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(!err.is_gone());
    }

    #[test]
    fn test_update_not_exists_guard_on_existing_is_gone() {
        let store = store();
        let ctx = Context::background();
        store.put_item(&ctx, item("a", "1", 64), None).unwrap();

        let guard = Attribute::key("prefix").not_exists();
        let mut delta = Item::new();
        delta.insert("age".into(), Value::Int(65));
        let err = store
            .update_item(&ctx, &Key::new("a", "1").unwrap(), delta, Some(&guard))
            .unwrap_err();
        assert!(err.is_gone());
    }

    #[test]
    fn test_update_returns_full_item() {
        let store = store();
        let ctx = Context::background();
        store.put_item(&ctx, item("a", "1", 64), None).unwrap();

        let mut delta = Item::new();
        delta.insert("name".into(), Value::from("Verner"));
        let updated = store
            .update_item(&ctx, &Key::new("a", "1").unwrap(), delta, None)
            .unwrap();
        assert_eq!(updated["age"], Value::Int(64));
        assert_eq!(updated["name"], Value::from("Verner"));
    }

    /// Cancels the token as soon as the wrapped table commits a write
    struct CancelAfterCommit {
        table: MemoryTable,
        token: CancelToken,
    }

    impl TableClient for CancelAfterCommit {
        fn get_item(&self, request: GetRequest) -> std::result::Result<Option<Item>, TableError> {
            self.table.get_item(request)
        }
        fn put_item(&self, request: PutRequest) -> std::result::Result<(), TableError> {
            self.table.put_item(request)?;
            self.token.cancel();
            Ok(())
        }
        fn delete_item(&self, request: DeleteRequest) -> std::result::Result<(), TableError> {
            self.table.delete_item(request)?;
            self.token.cancel();
            Ok(())
        }
        fn update_item(&self, request: UpdateRequest) -> std::result::Result<Item, TableError> {
            let item = self.table.update_item(request)?;
            self.token.cancel();
            Ok(item)
        }
        fn query(&self, request: QueryRequest) -> std::result::Result<QueryResponse, TableError> {
            let response = self.table.query(request)?;
            self.token.cancel();
            Ok(response)
        }
    }

    fn cancel_after_commit() -> (TableStore<CancelAfterCommit>, CancelToken) {
        let token = CancelToken::new();
        let client = CancelAfterCommit {
            table: MemoryTable::new(&config()),
            token: token.clone(),
        };
        (TableStore::new(client, &config()).unwrap(), token)
    }

    #[test]
    fn test_committed_writes_report_success_after_cancel() {
        let key = Key::new("x", "").unwrap();

        let (store, token) = cancel_after_commit();
        let ctx = Context::background().with_cancel(token);
        store.put_item(&ctx, item("x", "_", 1), None).unwrap();
        assert!(store.get_item(&Context::background(), &key, None).is_ok());

        let (store, token) = cancel_after_commit();
        let ctx = Context::background().with_cancel(token);
        let mut delta = Item::new();
        delta.insert("age".into(), Value::Int(2));
        let updated = store.update_item(&ctx, &key, delta, None).unwrap();
        assert_eq!(updated["age"], Value::Int(2));

        let (store, token) = cancel_after_commit();
        store
            .client()
            .table
            .put_item(PutRequest {
                table: "things".into(),
                item: item("x", "_", 1),
                ..PutRequest::default()
            })
            .unwrap();
        let ctx = Context::background().with_cancel(token);
        store.delete_item(&ctx, &key, None).unwrap();
        let err = store
            .get_item(&Context::background(), &key, None)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_cancel_during_query_fails_page() {
        let (store, token) = cancel_after_commit();
        let ctx = Context::background().with_cancel(token);
        let err = store
            .fetch_page(&ctx, &Query::new("x"), None)
            .unwrap_err();
        assert!(err.is_canceled());
    }

    #[test]
    fn test_canceled_context_aborts_call() {
        let token = CancelToken::new();
        token.cancel();
        let ctx = Context::background().with_cancel(token);
        let err = store()
            .fetch_page(&ctx, &Query::new("a"), None)
            .unwrap_err();
        assert!(err.is_canceled());
    }
}
