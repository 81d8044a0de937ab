//! Paginated sequence
//!
//! [`Seq`] is the lazy, forward-only result of a Match. It holds one page of
//! raw items at a time and fetches the next page from the adapter only when
//! the caller advances past the end of the current one.
//!
//! ## States
//!
//! ```text
//! Unseeded --seed()--> Loaded | Exhausted | Failed
//! Loaded --advance()--> Loaded | Exhausted | Failed
//! ```
//!
//! `Exhausted` and `Failed` are terminal: once there, every `advance()`
//! returns `false` without touching the backend.
//!
//! ## Modes
//!
//! - **Stream** (default): pages are fetched until the backend reports no
//!   continuation.
//! - **Limited** (after [`Seq::limit`]): exactly one page of the requested
//!   size is fetched. Resume with a new sequence seeded from [`Seq::cursor`].
//!
//! ## Usage
//!
//! ```ignore
//! let mut seq = store.matching(&ctx, &Person::key("dead:beef"));
//! while seq.advance() {
//!     let person = seq.value()?;
//! }
//! if let Some(err) = seq.error() { ... }
//! ```
//!
//! A sequence owns its cursor and page index and must be advanced by one
//! caller at a time.

use keyfold_core::{
    Adapter, Codec, Context, Cursor, Error, Iri, Item, Query, Result, Thing,
};
use tracing::{debug, trace};

/// Position of a sequence in its life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqState {
    /// No page fetched yet
    Unseeded,
    /// Positioned on an item of the current page
    Loaded,
    /// Every item was consumed
    Exhausted,
    /// A fetch failed; see [`Seq::error`]
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Stream,
    Limited,
}

/// Outcome of one page fetch
enum Fetch {
    Rows,
    /// Empty page, backend reported a continuation
    Empty,
    EndOfStream,
}

/// Lazy, cursor-resumable result of a Match
pub struct Seq<'a, T, A> {
    adapter: &'a A,
    codec: Codec<T>,
    ctx: Context,
    query: Query,
    mode: Mode,
    state: SeqState,
    start: Option<Cursor>,
    cursor: Cursor,
    more: bool,
    pages: usize,
    items: Vec<Item>,
    index: usize,
    at_head: bool,
    error: Option<Error>,
}

impl<'a, T: Thing, A: Adapter> Seq<'a, T, A> {
    /// Sequence over `query`; nothing is fetched until the first advance
    pub fn new(adapter: &'a A, codec: Codec<T>, ctx: Context, query: Query) -> Self {
        Self {
            adapter,
            codec,
            ctx,
            query,
            mode: Mode::Stream,
            state: SeqState::Unseeded,
            start: None,
            cursor: Cursor::default(),
            more: false,
            pages: 0,
            items: Vec::new(),
            index: 0,
            at_head: false,
            error: None,
        }
    }

    /// Sequence that is already failed with `error`
    pub(crate) fn failed(
        adapter: &'a A,
        codec: Codec<T>,
        ctx: Context,
        query: Query,
        error: Error,
    ) -> Self {
        let mut seq = Self::new(adapter, codec, ctx, query);
        seq.fail(error);
        seq
    }

    /// Fetch exactly one page of at most `n` items
    pub fn limit(mut self, n: usize) -> Self {
        self.mode = Mode::Limited;
        self.query.limit = Some(n);
        self
    }

    /// Start after `cursor`, typically one returned by an earlier sequence
    ///
    /// A cursor without a sort key is positioned at the sort-key sentinel.
    pub fn continue_from(mut self, cursor: Cursor) -> Self {
        self.start = if cursor.is_zero() {
            None
        } else if cursor.sort_key().is_empty() {
            Some(Cursor::after(&Iri::root(cursor.hash_key())))
        } else {
            Some(cursor)
        };
        self
    }

    /// Scan in descending sort-key order
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` unless the sequence is still unseeded.
    pub fn reverse(mut self) -> Result<Self> {
        if self.state != SeqState::Unseeded {
            return Err(Error::invalid_operation(
                "reverse() is only allowed before the first fetch",
            ));
        }
        self.query.reverse = !self.query.reverse;
        Ok(self)
    }

    /// Current state
    pub fn state(&self) -> SeqState {
        self.state
    }

    /// Resume position of the current fetch boundary
    ///
    /// The zero cursor before the first fetch and after the last page.
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Terminal error of a failed sequence
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Number of pages fetched so far
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Perform the first fetch
    ///
    /// Lands on the first item (`Loaded`), or in `Exhausted` if the query
    /// matched nothing, or in `Failed`. Does nothing unless unseeded.
    pub fn seed(&mut self) {
        if self.state != SeqState::Unseeded {
            return;
        }
        self.load();
        self.at_head = self.state == SeqState::Loaded;
    }

    /// Move to the next item; `false` once the sequence is exhausted or
    /// failed
    ///
    /// On an unseeded sequence this performs the first fetch and lands on
    /// the first item.
    pub fn advance(&mut self) -> bool {
        self.at_head = false;
        match self.state {
            SeqState::Unseeded => {
                self.load();
            }
            SeqState::Loaded => {
                self.index += 1;
                if self.index < self.items.len() {
                    trace!(target: "keyfold::seq", index = self.index, "Advance within page");
                } else if self.mode == Mode::Stream && self.more {
                    self.load();
                } else {
                    self.finish();
                }
            }
            SeqState::Exhausted | SeqState::Failed => {}
        }
        self.state == SeqState::Loaded
    }

    /// Raw wire item under the current position
    pub fn item(&self) -> Option<&Item> {
        match self.state {
            SeqState::Loaded => self.items.get(self.index),
            _ => None,
        }
    }

    /// Decode the item under the current position
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the sequence is not positioned on an
    /// item, or the decode error.
    pub fn value(&self) -> Result<T> {
        let item = self.item().ok_or_else(|| {
            Error::invalid_operation(format!(
                "sequence is {:?}, not positioned on an item",
                self.state
            ))
        })?;
        self.codec
            .decode(item)
            .map_err(|e| e.with_context("match", self.query.hash_key.clone()))
    }

    /// Fold every remaining record into an accumulator
    ///
    /// Unlike `Iterator::fold`, items are decoded records and the first
    /// failure ends the fold.
    ///
    /// # Errors
    ///
    /// Stops on and returns the first fetch or decode error.
    pub fn fold_records<B>(&mut self, init: B, mut f: impl FnMut(B, T) -> B) -> Result<B> {
        let mut acc = init;
        for record in self.by_ref() {
            acc = f(acc, record?);
        }
        Ok(acc)
    }

    /// Invoke `f` on every remaining record
    ///
    /// # Errors
    ///
    /// Stops on and returns the first fetch, decode or callback error.
    pub fn fmap(&mut self, mut f: impl FnMut(T) -> Result<()>) -> Result<()> {
        for record in self.by_ref() {
            f(record?)?;
        }
        Ok(())
    }

    fn load(&mut self) {
        loop {
            match self.fetch() {
                Ok(Fetch::Rows) => {
                    self.state = SeqState::Loaded;
                    return;
                }
                Ok(Fetch::Empty) if self.mode == Mode::Stream => {}
                Ok(Fetch::Empty | Fetch::EndOfStream) => {
                    self.finish();
                    return;
                }
                Err(e) => {
                    self.fail(e);
                    return;
                }
            }
        }
    }

    fn fetch(&mut self) -> Result<Fetch> {
        let start = if self.pages == 0 {
            self.start.clone()
        } else {
            Some(self.cursor.clone())
        };
        let page = self
            .adapter
            .fetch_page(&self.ctx, &self.query, start.as_ref())?;

        self.pages += 1;
        self.more = page.next.is_some();
        self.cursor = page.next.unwrap_or_default();
        self.items = page.items;
        self.index = 0;
        debug!(
            target: "keyfold::seq",
            page = self.pages,
            items = self.items.len(),
            more = self.more,
            "Fetched page"
        );

        Ok(match (self.items.is_empty(), self.more) {
            (false, _) => Fetch::Rows,
            (true, true) => Fetch::Empty,
            (true, false) => Fetch::EndOfStream,
        })
    }

    fn finish(&mut self) {
        self.state = SeqState::Exhausted;
        self.items.clear();
        self.index = 0;
        trace!(target: "keyfold::seq", pages = self.pages, "Sequence exhausted");
    }

    fn fail(&mut self, error: Error) {
        debug!(target: "keyfold::seq", error = %error, "Sequence failed");
        self.state = SeqState::Failed;
        self.items.clear();
        self.index = 0;
        self.error = Some(error.with_context("match", self.query.hash_key.clone()));
    }
}

/// Yields every remaining record; a failure is yielded once as `Err`, which
/// moves the error out of [`Seq::error`]
impl<'a, T: Thing, A: Adapter> Iterator for Seq<'a, T, A> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let loaded = if self.state == SeqState::Loaded && self.at_head {
            self.at_head = false;
            true
        } else {
            self.advance()
        };
        if loaded {
            return Some(self.value());
        }
        self.error.take().map(Err)
    }
}

impl<'a, T, A> std::fmt::Debug for Seq<'a, T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Seq")
            .field("query", &self.query)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("cursor", &self.cursor)
            .field("pages", &self.pages)
            .field("index", &self.index)
            .finish()
    }
}
