//! Paginated collection controller
//!
//! A [`Collection`] owns one page of a server-side list plus its pagination
//! metadata and keeps it consistent under local mutations:
//!
//! - every load is issued a [`LoadTicket`] with a sequence number; only the
//!   newest ticket's result (or error) is applied, older ones are dropped
//! - mutations made while a load is in flight are journaled and replayed on
//!   top of that load's result
//! - after every mutation the held item is re-checked against the view's
//!   [`Scope`] and dropped when the scope no longer admits it

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use facefolio_protocol::api::ImageFilter;
use facefolio_protocol::common::{page_count, Image, ImageId, PageMeta, Person, PersonId};

use crate::error::{FolioError, Result};

// ============================================================================
// Requests and results
// ============================================================================

/// Parameters of one page fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
    pub filter: Option<ImageFilter>,
    pub search: Option<String>,
}

impl PageRequest {
    pub fn new(per_page: u32) -> Self {
        Self {
            page: 1,
            per_page: per_page.max(1),
            filter: None,
            search: None,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_filter(mut self, filter: ImageFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_search(mut self, term: &str) -> Self {
        self.search = normalize_search(term);
        self
    }

    /// Query string pairs for list endpoints
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("page", self.page.to_string()),
            ("per_page", self.per_page.to_string()),
        ];
        if let Some(filter) = self.filter {
            query.push(("filter", filter.as_str().to_string()));
        }
        if let Some(search) = &self.search {
            query.push(("search", search.clone()));
        }
        query
    }

    /// Stable key for caching this request's page
    pub fn cache_key(&self) -> String {
        format!(
            "page={}&per_page={}&filter={}&search={}",
            self.page,
            self.per_page,
            self.filter.map(|f| f.as_str()).unwrap_or(""),
            self.search.as_deref().unwrap_or("")
        )
    }

    fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.per_page as usize)
    }
}

fn normalize_search(term: &str) -> Option<String> {
    let trimmed = term.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// One page of items plus the totals the server reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub total_pages: u32,
}

impl<T> PageResult<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
            total_pages: 0,
        }
    }

    /// Build from a list response; without metadata the items are the whole list
    pub fn from_meta(items: Vec<T>, meta: Option<PageMeta>, request: &PageRequest) -> Self {
        match meta {
            Some(meta) => Self {
                items,
                total_count: meta.total,
                total_pages: meta.pages,
            },
            None => {
                let total_count = items.len() as u64;
                Self {
                    items,
                    total_count,
                    total_pages: page_count(total_count, request.per_page),
                }
            }
        }
    }

    /// Cut the requested page out of a complete list
    pub fn paginate(all: Vec<T>, request: &PageRequest) -> Self {
        let total_count = all.len() as u64;
        let items = all
            .into_iter()
            .skip(request.offset())
            .take(request.per_page as usize)
            .collect();
        Self {
            items,
            total_count,
            total_pages: page_count(total_count, request.per_page),
        }
    }
}

// ============================================================================
// Items and scopes
// ============================================================================

/// Which records a view shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    Identified,
    Unidentified,
    /// Images owned by one person
    Person(PersonId),
}

impl Scope {
    pub fn from_filter(filter: Option<ImageFilter>) -> Self {
        match filter {
            None | Some(ImageFilter::All) => Scope::All,
            Some(ImageFilter::Identified) => Scope::Identified,
            Some(ImageFilter::Unidentified) => Scope::Unidentified,
        }
    }

    /// Mirrors the server's list filters
    pub fn admits_image(&self, image: &Image) -> bool {
        match self {
            Scope::All => true,
            Scope::Identified => image.is_identified,
            Scope::Unidentified => image.has_face && !image.is_identified,
            Scope::Person(owner) => image.person_id.as_ref() == Some(owner),
        }
    }
}

pub trait CollectionItem: Clone {
    type Id: Clone + PartialEq + fmt::Display;

    fn item_id(&self) -> &Self::Id;

    fn admitted_by(&self, _scope: &Scope) -> bool {
        true
    }
}

impl CollectionItem for Image {
    type Id = ImageId;

    fn item_id(&self) -> &ImageId {
        &self.id
    }

    fn admitted_by(&self, scope: &Scope) -> bool {
        scope.admits_image(self)
    }
}

impl CollectionItem for Person {
    type Id = PersonId;

    fn item_id(&self) -> &PersonId {
        &self.id
    }
}

/// Items that can be moved between owners
pub trait Assignable: CollectionItem {
    fn owner(&self) -> Option<&PersonId>;

    fn assign_to(&mut self, owner: Option<PersonId>);
}

impl Assignable for Image {
    fn owner(&self) -> Option<&PersonId> {
        self.person_id.as_ref()
    }

    fn assign_to(&mut self, owner: Option<PersonId>) {
        if self.person.as_ref().map(|p| &p.id) != owner.as_ref() {
            self.person = None;
        }
        self.is_identified = owner.is_some();
        self.person_id = owner;
    }
}

/// Where a collection gets its pages from
#[allow(async_fn_in_trait)]
pub trait PageSource<T> {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult<T>>;
}

// ============================================================================
// Controller
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
}

/// Handle for one issued load
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTicket {
    seq: u64,
    request: PageRequest,
}

impl LoadTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn request(&self) -> &PageRequest {
        &self.request
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer load was issued; the result was dropped
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationEffect {
    NotHeld,
    Updated,
    Removed,
}

type Patch<T> = Arc<dyn Fn(&mut T) + Send + Sync>;

enum Mutation<T: CollectionItem> {
    Remove(T::Id),
    Patch(T::Id, Patch<T>),
}

pub struct Collection<T: CollectionItem> {
    request: PageRequest,
    pinned_owner: Option<PersonId>,
    items: Vec<T>,
    total_count: u64,
    total_pages: u32,
    state: LoadState,
    settled: LoadState,
    issued: u64,
    journal: Vec<Mutation<T>>,
}

impl<T: CollectionItem> Collection<T> {
    pub fn new(request: PageRequest) -> Self {
        Self {
            request,
            pinned_owner: None,
            items: Vec::new(),
            total_count: 0,
            total_pages: 0,
            state: LoadState::Idle,
            settled: LoadState::Idle,
            issued: 0,
            journal: Vec::new(),
        }
    }

    /// Collection of one person's records
    pub fn pinned_to(owner: PersonId, request: PageRequest) -> Self {
        Self {
            pinned_owner: Some(owner),
            ..Self::new(request)
        }
    }

    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn page(&self) -> u32 {
        self.request.page
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    pub fn pinned_owner(&self) -> Option<&PersonId> {
        self.pinned_owner.as_ref()
    }

    pub fn scope(&self) -> Scope {
        match &self.pinned_owner {
            Some(owner) => Scope::Person(owner.clone()),
            None => Scope::from_filter(self.request.filter),
        }
    }

    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.items.iter().find(|item| item.item_id() == id)
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.get(id).is_some()
    }

    pub fn has_next_page(&self) -> bool {
        self.request.page < self.total_pages
    }

    pub fn has_previous_page(&self) -> bool {
        self.request.page > 1
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Issue a load for the current request
    pub fn begin_load(&mut self) -> LoadTicket {
        self.issued += 1;
        self.state = LoadState::Loading;
        self.journal.clear();
        LoadTicket {
            seq: self.issued,
            request: self.request.clone(),
        }
    }

    /// Apply the result of `ticket`'s fetch
    ///
    /// Returns the fetch error unchanged when the ticket is the newest one; held
    /// items and totals are left as they were.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<PageResult<T>>,
    ) -> Result<LoadOutcome> {
        if ticket.seq != self.issued {
            tracing::debug!(
                "Discarding stale page {} (load #{} superseded by #{})",
                ticket.request.page,
                ticket.seq,
                self.issued
            );
            return Ok(LoadOutcome::Superseded);
        }

        match result {
            Ok(page) => {
                self.items = page.items;
                self.total_count = page.total_count;
                self.total_pages = page.total_pages;

                let journal = std::mem::take(&mut self.journal);
                for mutation in &journal {
                    self.apply(mutation);
                }

                self.state = LoadState::Ready;
                self.settled = LoadState::Ready;
                Ok(LoadOutcome::Applied)
            }
            Err(e) => {
                self.journal.clear();
                self.state = self.settled;
                Err(e)
            }
        }
    }

    pub async fn load<S: PageSource<T>>(
        &mut self,
        source: &S,
        ticket: LoadTicket,
    ) -> Result<LoadOutcome> {
        let result = source.fetch_page(ticket.request()).await;
        self.complete_load(ticket, result)
    }

    pub async fn refresh<S: PageSource<T>>(&mut self, source: &S) -> Result<LoadOutcome> {
        let ticket = self.begin_load();
        self.load(source, ticket).await
    }

    // ------------------------------------------------------------------
    // Request transitions
    // ------------------------------------------------------------------

    fn restart_with(&mut self, request: PageRequest) -> Option<LoadTicket> {
        if request == self.request {
            return None;
        }
        self.request = PageRequest { page: 1, ..request };
        Some(self.begin_load())
    }

    /// Back to page 1 with a fresh load, even if nothing changed
    pub fn restart(&mut self) -> LoadTicket {
        self.request.page = 1;
        self.begin_load()
    }

    pub fn set_filter(&mut self, filter: Option<ImageFilter>) -> Option<LoadTicket> {
        let request = PageRequest {
            filter,
            ..self.request.clone()
        };
        self.restart_with(request)
    }

    pub fn set_search_term(&mut self, term: &str) -> Option<LoadTicket> {
        let request = PageRequest {
            search: normalize_search(term),
            ..self.request.clone()
        };
        self.restart_with(request)
    }

    pub fn set_page_size(&mut self, per_page: u32) -> Result<Option<LoadTicket>> {
        if per_page == 0 {
            return Err(FolioError::validation_field(
                "Page size must be at least 1",
                "per_page",
            ));
        }
        let request = PageRequest {
            per_page,
            ..self.request.clone()
        };
        Ok(self.restart_with(request))
    }

    /// Move to page `page`; valid pages are `1..=total_pages`, or just 1 when empty
    pub fn set_page_number(&mut self, page: u32) -> Result<Option<LoadTicket>> {
        let last_page = self.total_pages.max(1);
        if page == 0 || page > last_page {
            return Err(FolioError::page_out_of_range(page, self.total_pages));
        }
        if page == self.request.page {
            return Ok(None);
        }
        self.request.page = page;
        Ok(Some(self.begin_load()))
    }

    pub fn next_page(&mut self) -> Option<LoadTicket> {
        if !self.has_next_page() {
            return None;
        }
        self.request.page += 1;
        Some(self.begin_load())
    }

    pub fn previous_page(&mut self) -> Option<LoadTicket> {
        if !self.has_previous_page() {
            return None;
        }
        self.request.page -= 1;
        Some(self.begin_load())
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Drop `id` from the page and the total; absent ids are ignored
    pub fn remove_item(&mut self, id: &T::Id) -> bool {
        self.record(Mutation::Remove(id.clone())) == MutationEffect::Removed
    }

    /// Update a held item in place, then drop it if the scope no longer admits it
    ///
    /// When a load is in flight `patch` runs once more on the freshly loaded
    /// copy of the item.
    pub fn patch_item<F>(&mut self, id: &T::Id, patch: F) -> MutationEffect
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        self.record(Mutation::Patch(id.clone(), Arc::new(patch)))
    }

    fn record(&mut self, mutation: Mutation<T>) -> MutationEffect {
        let effect = self.apply(&mutation);
        if self.state == LoadState::Loading {
            self.journal.push(mutation);
        }
        effect
    }

    fn apply(&mut self, mutation: &Mutation<T>) -> MutationEffect {
        match mutation {
            Mutation::Remove(id) => match self.position(id) {
                Some(idx) => {
                    self.remove_at(idx);
                    MutationEffect::Removed
                }
                None => MutationEffect::NotHeld,
            },
            Mutation::Patch(id, patch) => {
                let Some(idx) = self.position(id) else {
                    return MutationEffect::NotHeld;
                };
                patch(&mut self.items[idx]);

                let scope = self.scope();
                if self.items[idx].admitted_by(&scope) {
                    MutationEffect::Updated
                } else {
                    self.remove_at(idx);
                    MutationEffect::Removed
                }
            }
        }
    }

    fn position(&self, id: &T::Id) -> Option<usize> {
        self.items.iter().position(|item| item.item_id() == id)
    }

    // total_pages is left stale until the next load
    fn remove_at(&mut self, idx: usize) {
        self.items.remove(idx);
        self.total_count = self.total_count.saturating_sub(1);
    }
}

impl<T: Assignable> Collection<T> {
    /// Move a held item to `owner` (or unassign it)
    ///
    /// In an owner-scoped or status-scoped view the item is removed once it no
    /// longer belongs. Assigning into the pinned owner never adds an item.
    pub fn reassign_item(&mut self, id: &T::Id, owner: Option<PersonId>) -> MutationEffect {
        self.patch_item(id, move |item| item.assign_to(owner.clone()))
    }
}

impl Collection<Person> {
    /// Shift a held person's image count by `delta`, clamped at zero
    ///
    /// A replay after an in-flight load shifts the freshly loaded count, not
    /// the value held when the adjustment was made.
    pub fn adjust_image_count(&mut self, id: &PersonId, delta: i64) -> MutationEffect {
        self.patch_item(id, move |p| {
            p.image_count = (p.image_count as i64 + delta).clamp(0, u32::MAX as i64) as u32;
        })
    }

    pub fn rename_item(&mut self, id: &PersonId, name: &str) -> MutationEffect {
        let name = name.to_string();
        self.patch_item(id, move |p| p.name = name.clone())
    }
}

impl<T: CollectionItem + fmt::Debug> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("request", &self.request)
            .field("pinned_owner", &self.pinned_owner)
            .field("items", &self.items)
            .field("total_count", &self.total_count)
            .field("total_pages", &self.total_pages)
            .field("state", &self.state)
            .field("issued", &self.issued)
            .field("journaled", &self.journal.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::utils::test_helpers::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn loaded<T: CollectionItem>(
        mut collection: Collection<T>,
        items: Vec<T>,
        total_count: u64,
    ) -> Collection<T> {
        let total_pages = page_count(total_count, collection.request().per_page);
        let ticket = collection.begin_load();
        collection
            .complete_load(
                ticket,
                Ok(PageResult {
                    items,
                    total_count,
                    total_pages,
                }),
            )
            .unwrap();
        collection
    }

    fn unidentified_view(count: usize, total: u64) -> Collection<Image> {
        loaded(
            Collection::new(PageRequest::new(20).with_filter(ImageFilter::Unidentified)),
            unidentified_images(count),
            total,
        )
    }

    fn ids(collection: &Collection<Image>) -> Vec<String> {
        collection
            .items()
            .iter()
            .map(|i| i.id.to_string())
            .collect()
    }

    /// Source that serves pages from memory and records requests
    struct StaticSource {
        pages: Vec<Image>,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl PageSource<Image> for StaticSource {
        async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult<Image>> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(PageResult::paginate(self.pages.clone(), request))
        }
    }

    struct FailingSource;

    impl PageSource<Image> for FailingSource {
        async fn fetch_page(&self, _request: &PageRequest) -> Result<PageResult<Image>> {
            Err(FolioError::network("connection refused"))
        }
    }

    #[test]
    fn test_reassign_in_unidentified_view_removes_item() {
        let mut view = unidentified_view(5, 5);

        let effect = view.reassign_item(&ImageId::new("img3"), Some(PersonId::new("personA")));

        assert_eq!(effect, MutationEffect::Removed);
        assert_eq!(view.len(), 4);
        assert_eq!(view.total_count(), 4);
        assert_eq!(ids(&view), vec!["img1", "img2", "img4", "img5"]);
    }

    #[test]
    fn test_reassign_in_all_view_updates_in_place() {
        let mut view = loaded(
            Collection::new(PageRequest::new(20)),
            unidentified_images(3),
            3,
        );

        let effect = view.reassign_item(&ImageId::new("img2"), Some(PersonId::new("p1")));

        assert_eq!(effect, MutationEffect::Updated);
        assert_eq!(view.total_count(), 3);
        let image = view.get(&ImageId::new("img2")).unwrap();
        assert!(image.is_identified);
        assert_eq!(image.person_id, Some(PersonId::new("p1")));
    }

    #[test]
    fn test_reassign_in_person_view() {
        let images = vec![
            sample_image("a", Some("p1")),
            sample_image("b", Some("p1")),
        ];
        let mut view = loaded(
            Collection::pinned_to(PersonId::new("p1"), PageRequest::new(20)),
            images,
            2,
        );

        // same owner: stays
        assert_eq!(
            view.reassign_item(&ImageId::new("a"), Some(PersonId::new("p1"))),
            MutationEffect::Updated
        );
        // another owner: leaves the view
        assert_eq!(
            view.reassign_item(&ImageId::new("b"), Some(PersonId::new("p2"))),
            MutationEffect::Removed
        );
        assert_eq!(view.total_count(), 1);
    }

    #[test]
    fn test_unassign_in_identified_view_removes_item() {
        let mut view = loaded(
            Collection::new(PageRequest::new(20).with_filter(ImageFilter::Identified)),
            vec![sample_image("a", Some("p1")), sample_image("b", Some("p2"))],
            2,
        );

        assert_eq!(
            view.reassign_item(&ImageId::new("a"), Some(PersonId::new("p3"))),
            MutationEffect::Updated
        );
        assert_eq!(
            view.reassign_item(&ImageId::new("b"), None),
            MutationEffect::Removed
        );
        assert_eq!(ids(&view), vec!["a"]);
    }

    #[test]
    fn test_remove_item_is_idempotent() {
        let mut view = unidentified_view(3, 10);

        assert!(view.remove_item(&ImageId::new("img1")));
        assert!(!view.remove_item(&ImageId::new("img1")));
        assert!(!view.remove_item(&ImageId::new("missing")));

        assert_eq!(view.len(), 2);
        assert_eq!(view.total_count(), 9);
    }

    #[test]
    fn test_remove_leaves_total_pages_stale() {
        let mut view = unidentified_view(1, 21);
        assert_eq!(view.total_pages(), 2);

        view.remove_item(&ImageId::new("img1"));
        assert_eq!(view.total_count(), 20);
        assert_eq!(view.total_pages(), 2);
    }

    #[test]
    fn test_set_page_number_validates_range() {
        let mut view = loaded(
            Collection::new(PageRequest::new(2)),
            unidentified_images(2),
            6,
        );
        assert_eq!(view.total_pages(), 3);

        assert!(view.set_page_number(0).is_err());
        let err = view.set_page_number(4).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::PageOutOfRange);
        assert_eq!(view.page(), 1);
        assert_eq!(view.state(), LoadState::Ready);

        assert!(view.set_page_number(1).unwrap().is_none());
        let ticket = view.set_page_number(2).unwrap().unwrap();
        assert_eq!(ticket.request().page, 2);
    }

    #[test]
    fn test_empty_collection_allows_only_first_page() {
        let mut view: Collection<Image> = loaded(Collection::new(PageRequest::new(20)), vec![], 0);
        assert!(view.set_page_number(1).unwrap().is_none());
        assert!(view.set_page_number(2).is_err());
    }

    #[tokio::test]
    async fn test_page_change_replaces_items() {
        let source = StaticSource {
            pages: unidentified_images(6),
            requests: Mutex::new(Vec::new()),
        };
        let mut view = Collection::new(PageRequest::new(2));
        view.refresh(&source).await.unwrap();
        assert_eq!(view.total_pages(), 3);
        assert_eq!(ids(&view), vec!["img1", "img2"]);

        let ticket = view.set_page_number(2).unwrap().unwrap();
        view.load(&source, ticket).await.unwrap();

        assert_eq!(ids(&view), vec!["img3", "img4"]);
        assert_eq!(view.page(), 2);
        let requests = source.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].page, 2);
    }

    #[tokio::test]
    async fn test_filter_change_resets_page_and_loads_once() {
        let source = StaticSource {
            pages: unidentified_images(10),
            requests: Mutex::new(Vec::new()),
        };
        let mut view = Collection::new(PageRequest::new(2).with_page(3));
        view.refresh(&source).await.unwrap();

        let ticket = view.set_filter(Some(ImageFilter::Unidentified)).unwrap();
        assert_eq!(ticket.request().page, 1);
        view.load(&source, ticket).await.unwrap();

        // same filter again: no load
        assert!(view.set_filter(Some(ImageFilter::Unidentified)).is_none());

        let requests = source.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].page, 1);
        assert_eq!(requests[1].filter, Some(ImageFilter::Unidentified));
    }

    #[test]
    fn test_search_term_resets_page_and_normalizes_blank() {
        let mut view: Collection<Person> = loaded(
            Collection::new(PageRequest::new(1)),
            vec![sample_person("p1", "Ada", 1)],
            5,
        );
        view.set_page_number(3).unwrap();

        let ticket = view.set_search_term("  ada ").unwrap();
        assert_eq!(ticket.request().page, 1);
        assert_eq!(ticket.request().search.as_deref(), Some("ada"));

        assert!(view.set_search_term("ada").is_none());
        let cleared = view.set_search_term("   ").unwrap();
        assert_eq!(cleared.request().search, None);
    }

    #[test]
    fn test_set_page_size_resets_page() {
        let mut view = unidentified_view(2, 40);
        view.set_page_number(2).unwrap();

        assert!(view.set_page_size(0).is_err());
        let ticket = view.set_page_size(10).unwrap().unwrap();
        assert_eq!(ticket.request().page, 1);
        assert_eq!(ticket.request().per_page, 10);
    }

    #[test]
    fn test_stale_load_is_discarded() {
        let mut view: Collection<Image> = Collection::new(PageRequest::new(20));
        let first = view.begin_load();
        let second = view.begin_load();

        let newer = PageResult {
            items: unidentified_images(2),
            total_count: 2,
            total_pages: 1,
        };
        assert_eq!(
            view.complete_load(second, Ok(newer)).unwrap(),
            LoadOutcome::Applied
        );

        let older = PageResult {
            items: unidentified_images(7),
            total_count: 7,
            total_pages: 1,
        };
        assert_eq!(
            view.complete_load(first, Ok(older)).unwrap(),
            LoadOutcome::Superseded
        );
        assert_eq!(view.len(), 2);
        assert_eq!(view.total_count(), 2);
    }

    #[test]
    fn test_stale_error_is_discarded() {
        let mut view = unidentified_view(3, 3);
        let first = view.begin_load();
        let _second = view.begin_load();

        let outcome = view.complete_load(first, Err(FolioError::network("timeout")));
        assert_eq!(outcome.unwrap(), LoadOutcome::Superseded);
        assert!(view.is_loading());
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_page() {
        let mut view = unidentified_view(3, 30);

        let err = view.refresh(&FailingSource).await.unwrap_err();

        assert!(err.is_network_error());
        assert_eq!(view.len(), 3);
        assert_eq!(view.total_count(), 30);
        assert_eq!(view.state(), LoadState::Ready);
    }

    #[test]
    fn test_failed_first_load_returns_to_idle() {
        let mut view: Collection<Image> = Collection::new(PageRequest::new(20));
        let ticket = view.begin_load();
        assert!(view
            .complete_load(ticket, Err(FolioError::api(500, "boom")))
            .is_err());
        assert_eq!(view.state(), LoadState::Idle);
    }

    #[test]
    fn test_mutation_during_load_survives_completion() {
        let mut view = unidentified_view(5, 5);
        let ticket = view.begin_load();

        // Confirmed while the reload was in flight
        view.remove_item(&ImageId::new("img2"));
        view.reassign_item(&ImageId::new("img4"), Some(PersonId::new("p1")));
        assert_eq!(view.len(), 3);

        // The server's answer was computed before those mutations
        let fresh = PageResult {
            items: unidentified_images(5),
            total_count: 5,
            total_pages: 1,
        };
        view.complete_load(ticket, Ok(fresh)).unwrap();

        assert_eq!(ids(&view), vec!["img1", "img3", "img5"]);
        assert_eq!(view.total_count(), 3);
        assert_eq!(view.state(), LoadState::Ready);
    }

    #[test]
    fn test_replay_is_idempotent_when_server_already_applied_it() {
        let mut view = unidentified_view(5, 5);
        let ticket = view.begin_load();
        view.remove_item(&ImageId::new("img2"));

        // The server's answer already excludes img2
        let fresh = PageResult {
            items: unidentified_images(5)
                .into_iter()
                .filter(|i| i.id.as_str() != "img2")
                .collect(),
            total_count: 4,
            total_pages: 1,
        };
        view.complete_load(ticket, Ok(fresh)).unwrap();

        assert_eq!(view.len(), 4);
        assert_eq!(view.total_count(), 4);
    }

    #[test]
    fn test_adjust_image_count() {
        let mut people = loaded(
            Collection::new(PageRequest::new(20)),
            vec![sample_person("p1", "Ada", 10), sample_person("p2", "Grace", 0)],
            2,
        );

        assert_eq!(
            people.adjust_image_count(&PersonId::new("p1"), -1),
            MutationEffect::Updated
        );
        people.adjust_image_count(&PersonId::new("p2"), -3);
        assert_eq!(
            people.adjust_image_count(&PersonId::new("nobody"), 1),
            MutationEffect::NotHeld
        );

        assert_eq!(people.get(&PersonId::new("p1")).unwrap().image_count, 9);
        assert_eq!(people.get(&PersonId::new("p2")).unwrap().image_count, 0);
        assert_eq!(people.total_count(), 2);
    }

    #[test]
    fn test_count_adjusted_during_load_shifts_fresh_count() {
        let mut people = loaded(
            Collection::new(PageRequest::new(20)),
            vec![sample_person("p1", "Ada", 10)],
            1,
        );
        let ticket = people.begin_load();

        people.adjust_image_count(&PersonId::new("p1"), -1);
        assert_eq!(people.get(&PersonId::new("p1")).unwrap().image_count, 9);

        // Other uploads landed on the server before it answered
        let fresh = PageResult {
            items: vec![sample_person("p1", "Ada", 15)],
            total_count: 1,
            total_pages: 1,
        };
        people.complete_load(ticket, Ok(fresh)).unwrap();

        assert_eq!(people.get(&PersonId::new("p1")).unwrap().image_count, 14);
    }

    #[test]
    fn test_next_and_previous_page() {
        let mut view = loaded(
            Collection::new(PageRequest::new(5)),
            unidentified_images(5),
            12,
        );
        assert!(view.previous_page().is_none());
        assert_eq!(view.next_page().unwrap().request().page, 2);
        assert_eq!(view.next_page().unwrap().request().page, 3);
        assert!(view.next_page().is_none());
    }

    #[test]
    fn test_paginate_slices_locally() {
        let request = PageRequest::new(2).with_page(2);
        let page = PageResult::paginate(vec![1, 2, 3, 4, 5], &request);
        assert_eq!(page.items, vec![3, 4]);
        assert_eq!(page.total_count, 5);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn test_request_query() {
        let request = PageRequest::new(10)
            .with_page(2)
            .with_filter(ImageFilter::Unidentified);
        assert_eq!(
            request.query(),
            vec![
                ("page", "2".to_string()),
                ("per_page", "10".to_string()),
                ("filter", "unidentified".to_string()),
            ]
        );
        assert_ne!(request.cache_key(), PageRequest::new(10).cache_key());
    }

    proptest! {
        #[test]
        fn prop_removals_exclude_exactly_removed_ids(
            count in 1usize..30,
            picks in proptest::collection::vec(0usize..30, 0..40),
        ) {
            let images = unidentified_images(count);
            let mut view = loaded(Collection::new(PageRequest::new(50)), images.clone(), 100);

            let mut removed = HashSet::new();
            let mut successes = 0u64;
            for pick in picks {
                let id = images[pick % count].id.clone();
                if view.remove_item(&id) {
                    successes += 1;
                }
                removed.insert(id);
            }

            prop_assert_eq!(successes as usize, removed.len());
            prop_assert_eq!(view.total_count(), 100 - successes);
            prop_assert_eq!(view.len(), count - removed.len());
            for image in &images {
                prop_assert_eq!(view.contains(&image.id), !removed.contains(&image.id));
            }
        }

        #[test]
        fn prop_double_remove_equals_single(count in 1usize..20, pick in 0usize..20) {
            let images = unidentified_images(count);
            let id = images[pick % count].id.clone();

            let mut once = loaded(Collection::new(PageRequest::new(50)), images.clone(), 40);
            once.remove_item(&id);

            let mut twice = loaded(Collection::new(PageRequest::new(50)), images, 40);
            twice.remove_item(&id);
            twice.remove_item(&id);

            prop_assert_eq!(once.items(), twice.items());
            prop_assert_eq!(once.total_count(), twice.total_count());
        }
    }
}
