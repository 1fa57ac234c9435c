//! Collection views
//!
//! [`ImageGallery`] and [`PeopleDirectory`] tie a [`Collection`] to the API:
//! they fetch pages, run mutations against the server and, once the server
//! confirms, apply them to the held page without refetching. Failures are
//! reported once through a [`Notifier`] and returned to the caller; local state
//! is left as it was.

use std::path::PathBuf;

use facefolio_protocol::api::{ImageFilter, PersonSort, ReprocessResponse, SortOrder};
use facefolio_protocol::common::{Image, ImageId, Person, PersonId};

use crate::cache::{CacheSubscription, PageCache, ResourceKind};
use crate::client::ApiClient;
use crate::collection::{
    Assignable, Collection, LoadOutcome, LoadTicket, MutationEffect, PageRequest, PageResult,
    PageSource,
};
use crate::error::{FolioError, Result};
use crate::image::ImageService;
use crate::person::PersonService;
use crate::ui::UI;
use crate::upload::{UploadService, UploadSummary};

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Transient user-facing messages
pub trait Notifier {
    fn notify(&self, level: NoticeLevel, message: &str);

    fn info(&self, message: &str) {
        self.notify(NoticeLevel::Info, message);
    }

    fn success(&self, message: &str) {
        self.notify(NoticeLevel::Success, message);
    }

    fn error(&self, message: &str) {
        self.notify(NoticeLevel::Error, message);
    }
}

/// Prints notices to the terminal
#[derive(Default)]
pub struct UiNotifier {
    ui: UI,
}

impl UiNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for UiNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => self.ui.info(message),
            NoticeLevel::Success => self.ui.success(message),
            NoticeLevel::Error => self.ui.error(message),
        }
    }
}

/// Logs notices; errors only at debug since the caller reports the returned error
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info | NoticeLevel::Success => tracing::info!("{}", message),
            NoticeLevel::Error => tracing::debug!("{}", message),
        }
    }
}

// ============================================================================
// Page sources
// ============================================================================

pub type ImagePage = (PageResult<Image>, Option<Person>);

/// Images from `/images` or, when pinned to a person, `/people/{id}/images`
pub struct ImagePages<'a, C: ApiClient + ?Sized> {
    client: &'a C,
    owner: Option<PersonId>,
    cache: Option<&'a PageCache>,
}

impl<'a, C: ApiClient + ?Sized> ImagePages<'a, C> {
    pub fn new(client: &'a C, owner: Option<PersonId>, cache: Option<&'a PageCache>) -> Self {
        Self {
            client,
            owner,
            cache,
        }
    }

    fn cache_key(&self, request: &PageRequest) -> String {
        match &self.owner {
            Some(owner) => format!("people/{}/images?{}", owner, request.cache_key()),
            None => format!("images?{}", request.cache_key()),
        }
    }

    async fn fetch_remote(&self, request: &PageRequest) -> Result<ImagePage> {
        match &self.owner {
            Some(owner) => PersonService::new(self.client).images(owner, request).await,
            None => ImageService::new(self.client)
                .list(request)
                .await
                .map(|page| (page, None)),
        }
    }

    /// A page of images and, for a person's gallery, the person as the server
    /// reported it alongside the page
    pub async fn fetch(&self, request: &PageRequest) -> Result<ImagePage> {
        match self.cache {
            Some(cache) => {
                let key = self.cache_key(request);
                cache
                    .fetch_through(ResourceKind::Images, &key, || self.fetch_remote(request))
                    .await
            }
            None => self.fetch_remote(request).await,
        }
    }
}

pub struct PeoplePages<'a, C: ApiClient + ?Sized> {
    client: &'a C,
    sort: PersonSort,
    order: SortOrder,
    cache: Option<&'a PageCache>,
}

impl<'a, C: ApiClient + ?Sized> PeoplePages<'a, C> {
    pub fn new(
        client: &'a C,
        sort: PersonSort,
        order: SortOrder,
        cache: Option<&'a PageCache>,
    ) -> Self {
        Self {
            client,
            sort,
            order,
            cache,
        }
    }

    async fn fetch_remote(&self, request: &PageRequest) -> Result<PageResult<Person>> {
        PersonService::new(self.client)
            .page(request, self.sort, self.order)
            .await
    }
}

impl<'a, C: ApiClient + ?Sized> PageSource<Person> for PeoplePages<'a, C> {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult<Person>> {
        match self.cache {
            Some(cache) => {
                let key = format!(
                    "people?sort={}&order={}&{}",
                    self.sort,
                    self.order,
                    request.cache_key()
                );
                cache
                    .fetch_through(ResourceKind::People, &key, || self.fetch_remote(request))
                    .await
            }
            None => self.fetch_remote(request).await,
        }
    }
}

// ============================================================================
// Cache wiring
// ============================================================================

struct CacheLink<'a> {
    cache: Option<&'a PageCache>,
    subscription: Option<CacheSubscription>,
    pending: bool,
}

impl<'a> CacheLink<'a> {
    fn detached() -> Self {
        Self {
            cache: None,
            subscription: None,
            pending: false,
        }
    }

    fn attach(cache: &'a PageCache, kinds: &[ResourceKind]) -> Self {
        Self {
            cache: Some(cache),
            subscription: Some(cache.subscribe(kinds)),
            pending: false,
        }
    }

    /// Invalidate `kinds` without marking this view stale
    fn invalidate(&mut self, kinds: &[ResourceKind]) {
        let Some(cache) = self.cache else {
            return;
        };
        if let Some(subscription) = &mut self.subscription {
            self.pending |= subscription.take_stale();
        }
        for kind in kinds {
            cache.invalidate(*kind);
        }
        if let Some(subscription) = &mut self.subscription {
            subscription.take_stale();
        }
    }

    /// A load is starting; everything invalidated so far is covered by it
    fn loading(&mut self) {
        self.pending = false;
        if let Some(subscription) = &mut self.subscription {
            subscription.take_stale();
        }
    }

    fn is_stale(&mut self) -> bool {
        if let Some(subscription) = &mut self.subscription {
            self.pending |= subscription.take_stale();
        }
        self.pending
    }
}

// ============================================================================
// Image gallery
// ============================================================================

pub struct ImageGallery<'a, C: ApiClient + ?Sized, N: Notifier + ?Sized> {
    client: &'a C,
    notifier: &'a N,
    cache: CacheLink<'a>,
    collection: Collection<Image>,
    person: Option<Person>,
}

impl<'a, C: ApiClient + ?Sized, N: Notifier + ?Sized> ImageGallery<'a, C, N> {
    /// Gallery over all images, narrowed by the request's filter
    pub fn new(client: &'a C, notifier: &'a N, request: PageRequest) -> Self {
        Self {
            client,
            notifier,
            cache: CacheLink::detached(),
            collection: Collection::new(request),
            person: None,
        }
    }

    /// Gallery of one person's images
    pub fn for_person(
        client: &'a C,
        notifier: &'a N,
        person_id: PersonId,
        request: PageRequest,
    ) -> Self {
        Self {
            client,
            notifier,
            cache: CacheLink::detached(),
            collection: Collection::pinned_to(person_id, PageRequest { filter: None, ..request }),
            person: None,
        }
    }

    pub fn with_cache(mut self, cache: &'a PageCache) -> Self {
        let kinds: &[ResourceKind] = if self.collection.pinned_owner().is_some() {
            &ResourceKind::ALL
        } else {
            &[ResourceKind::Images]
        };
        self.cache = CacheLink::attach(cache, kinds);
        self
    }

    pub fn collection(&self) -> &Collection<Image> {
        &self.collection
    }

    /// The person a pinned gallery shows, once opened
    pub fn person(&self) -> Option<&Person> {
        self.person.as_ref()
    }

    pub fn title(&self) -> String {
        match (&self.person, self.collection.pinned_owner()) {
            (Some(person), _) => format!("{} ({} images)", person.name, person.image_count),
            (None, Some(owner)) => format!("Person {}", owner),
            (None, None) => {
                let filter = self.collection.request().filter.unwrap_or_default();
                format!("Images: {}", filter)
            }
        }
    }

    fn source(&self) -> ImagePages<'a, C> {
        ImagePages::new(
            self.client,
            self.collection.pinned_owner().cloned(),
            self.cache.cache,
        )
    }

    fn report(&self, err: FolioError, context: &str) -> FolioError {
        self.notifier.error(&format!("{}: {}", context, err));
        err
    }

    /// Fetch the pinned person (if any) and the first page
    pub async fn open(&mut self) -> Result<LoadOutcome> {
        if let Some(owner) = self.collection.pinned_owner().cloned() {
            match PersonService::new(self.client).get(&owner).await {
                Ok(person) => self.person = Some(person),
                Err(e) => return Err(self.report(e, "Failed to load person")),
            }
        }
        self.refresh().await
    }

    pub async fn refresh(&mut self) -> Result<LoadOutcome> {
        let ticket = self.collection.begin_load();
        self.run(ticket).await
    }

    async fn run(&mut self, ticket: LoadTicket) -> Result<LoadOutcome> {
        self.cache.loading();
        let (result, person) = match self.source().fetch(ticket.request()).await {
            Ok((page, person)) => (Ok(page), person),
            Err(e) => (Err(e), None),
        };

        match self.collection.complete_load(ticket, result) {
            Ok(LoadOutcome::Applied) => {
                if person.is_some() {
                    self.person = person;
                }
                Ok(LoadOutcome::Applied)
            }
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(self.report(e, "Failed to load images")),
        }
    }

    async fn run_if(&mut self, ticket: Option<LoadTicket>) -> Result<Option<LoadOutcome>> {
        match ticket {
            Some(ticket) => self.run(ticket).await.map(Some),
            None => Ok(None),
        }
    }

    /// Reload if another view invalidated what this one shows
    pub async fn sync(&mut self) -> Result<Option<LoadOutcome>> {
        if self.cache.is_stale() {
            self.refresh().await.map(Some)
        } else {
            Ok(None)
        }
    }

    pub async fn next_page(&mut self) -> Result<Option<LoadOutcome>> {
        let ticket = self.collection.next_page();
        self.run_if(ticket).await
    }

    pub async fn previous_page(&mut self) -> Result<Option<LoadOutcome>> {
        let ticket = self.collection.previous_page();
        self.run_if(ticket).await
    }

    pub async fn go_to_page(&mut self, page: u32) -> Result<Option<LoadOutcome>> {
        match self.collection.set_page_number(page) {
            Ok(ticket) => self.run_if(ticket).await,
            Err(e) => Err(self.report(e, "Cannot change page")),
        }
    }

    pub async fn set_filter(&mut self, filter: ImageFilter) -> Result<Option<LoadOutcome>> {
        if self.collection.pinned_owner().is_some() {
            return Err(self.report(
                FolioError::invalid_input("A person's gallery cannot be filtered"),
                "Cannot change filter",
            ));
        }
        let ticket = self.collection.set_filter(Some(filter));
        self.run_if(ticket).await
    }

    pub async fn set_page_size(&mut self, per_page: u32) -> Result<Option<LoadOutcome>> {
        match self.collection.set_page_size(per_page) {
            Ok(ticket) => self.run_if(ticket).await,
            Err(e) => Err(self.report(e, "Cannot change page size")),
        }
    }

    pub async fn delete_image(&mut self, image_id: &ImageId) -> Result<MutationEffect> {
        let previous_owner = if self.collection.contains(image_id) {
            self.owner_of(image_id)
        } else {
            self.remote_owner_of(image_id).await
        };

        let message = match ImageService::new(self.client).delete(image_id).await {
            Ok(message) => message,
            Err(e) => return Err(self.report(e, "Failed to delete image")),
        };

        let effect = if self.collection.remove_item(image_id) {
            MutationEffect::Removed
        } else {
            MutationEffect::NotHeld
        };
        self.track_owner_change(previous_owner.as_ref(), None);

        self.cache.invalidate(&ResourceKind::ALL);
        self.notifier.success(&message);
        Ok(effect)
    }

    /// Assign an image to `person_id`; `None` unassigns it
    pub async fn assign_image(
        &mut self,
        image_id: &ImageId,
        person_id: Option<PersonId>,
    ) -> Result<MutationEffect> {
        let message = match ImageService::new(self.client)
            .assign(image_id, person_id.as_ref())
            .await
        {
            Ok((_, message)) => message,
            Err(e) => return Err(self.report(e, "Failed to assign image")),
        };

        let previous_owner = self.owner_of(image_id);
        let effect = self.collection.reassign_item(image_id, person_id.clone());
        if effect != MutationEffect::NotHeld {
            self.track_owner_change(previous_owner.as_ref(), person_id.as_ref());
        }

        self.cache.invalidate(&ResourceKind::ALL);
        self.notifier.success(&message);
        Ok(effect)
    }

    pub async fn unassign_image(&mut self, image_id: &ImageId) -> Result<MutationEffect> {
        self.assign_image(image_id, None).await
    }

    /// Re-run detection; a matched person becomes the image's owner
    pub async fn reprocess_image(
        &mut self,
        image_id: &ImageId,
    ) -> Result<(ReprocessResponse, MutationEffect)> {
        let result = match ImageService::new(self.client).reprocess(image_id).await {
            Ok(result) => result,
            Err(e) => return Err(self.report(e, "Failed to reprocess image")),
        };

        let previous_owner = self.owner_of(image_id);
        let faces = result.faces_detected;
        let matched = result.matched_person.clone();
        let effect = self.collection.patch_item(image_id, move |image| {
            image.face_count = faces;
            image.has_face = faces > 0;
            if let Some(owner) = &matched {
                image.assign_to(Some(owner.clone()));
            }
        });
        if effect != MutationEffect::NotHeld {
            let new_owner = result.matched_person.clone().or(previous_owner.clone());
            self.track_owner_change(previous_owner.as_ref(), new_owner.as_ref());
        }

        self.cache.invalidate(&ResourceKind::ALL);
        let message = match &result.matched_person {
            Some(person) => format!("Found {} face(s), matched to {}", faces, person),
            None => format!("Found {} face(s)", faces),
        };
        self.notifier.success(&message);
        Ok((result, effect))
    }

    /// Upload files, then reload the page if anything was added
    pub async fn upload(&mut self, paths: &[PathBuf], progress: bool) -> Result<UploadSummary> {
        let summary = match UploadService::new(self.client, progress)
            .upload_paths(paths)
            .await
        {
            Ok(summary) => summary,
            Err(e) => return Err(self.report(e, "Upload failed")),
        };

        let description = summary.describe();
        if summary.failed() == 0 {
            self.notifier.success(&description);
        } else if summary.needs_refresh() {
            self.notifier.info(&description);
        } else {
            self.notifier.error(&description);
        }

        if summary.needs_refresh() {
            self.cache.invalidate(&ResourceKind::ALL);
            if let Err(e) = self.refresh().await {
                tracing::debug!("Reload after upload failed: {}", e);
            }
        }
        Ok(summary)
    }

    /// Owner of an image that is not on the held page; only a person's
    /// gallery needs it, to keep that person's count right
    async fn remote_owner_of(&self, image_id: &ImageId) -> Option<PersonId> {
        self.person.as_ref()?;
        match ImageService::new(self.client).get(image_id).await {
            Ok(image) => image.owner().cloned(),
            Err(e) => {
                tracing::debug!("Could not look up owner of {}: {}", image_id, e);
                None
            }
        }
    }

    fn owner_of(&self, image_id: &ImageId) -> Option<PersonId> {
        self.collection
            .get(image_id)
            .and_then(|image| image.owner().cloned())
    }

    /// Keep the pinned person's image count in step with local moves
    fn track_owner_change(&mut self, before: Option<&PersonId>, after: Option<&PersonId>) {
        let Some(person) = self.person.as_mut() else {
            return;
        };
        let was_theirs = before == Some(&person.id);
        let is_theirs = after == Some(&person.id);
        if was_theirs && !is_theirs {
            person.image_count = person.image_count.saturating_sub(1);
        } else if !was_theirs && is_theirs {
            person.image_count += 1;
        }
    }
}

// ============================================================================
// People directory
// ============================================================================

pub struct PeopleDirectory<'a, C: ApiClient + ?Sized, N: Notifier + ?Sized> {
    client: &'a C,
    notifier: &'a N,
    cache: CacheLink<'a>,
    collection: Collection<Person>,
    sort: PersonSort,
    order: SortOrder,
}

impl<'a, C: ApiClient + ?Sized, N: Notifier + ?Sized> PeopleDirectory<'a, C, N> {
    pub fn new(client: &'a C, notifier: &'a N, request: PageRequest) -> Self {
        Self {
            client,
            notifier,
            cache: CacheLink::detached(),
            collection: Collection::new(PageRequest { filter: None, ..request }),
            sort: PersonSort::default(),
            order: SortOrder::default(),
        }
    }

    pub fn with_sort(mut self, sort: PersonSort, order: SortOrder) -> Self {
        self.sort = sort;
        self.order = order;
        self
    }

    pub fn with_cache(mut self, cache: &'a PageCache) -> Self {
        self.cache = CacheLink::attach(cache, &ResourceKind::ALL);
        self
    }

    pub fn collection(&self) -> &Collection<Person> {
        &self.collection
    }

    pub fn sort(&self) -> (PersonSort, SortOrder) {
        (self.sort, self.order)
    }

    fn source(&self) -> PeoplePages<'a, C> {
        PeoplePages::new(self.client, self.sort, self.order, self.cache.cache)
    }

    fn report(&self, err: FolioError, context: &str) -> FolioError {
        self.notifier.error(&format!("{}: {}", context, err));
        err
    }

    pub async fn open(&mut self) -> Result<LoadOutcome> {
        self.refresh().await
    }

    pub async fn refresh(&mut self) -> Result<LoadOutcome> {
        let ticket = self.collection.begin_load();
        self.run(ticket).await
    }

    async fn run(&mut self, ticket: LoadTicket) -> Result<LoadOutcome> {
        self.cache.loading();
        let source = self.source();
        match self.collection.load(&source, ticket).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => Err(self.report(e, "Failed to load people")),
        }
    }

    async fn run_if(&mut self, ticket: Option<LoadTicket>) -> Result<Option<LoadOutcome>> {
        match ticket {
            Some(ticket) => self.run(ticket).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn sync(&mut self) -> Result<Option<LoadOutcome>> {
        if self.cache.is_stale() {
            self.refresh().await.map(Some)
        } else {
            Ok(None)
        }
    }

    pub async fn next_page(&mut self) -> Result<Option<LoadOutcome>> {
        let ticket = self.collection.next_page();
        self.run_if(ticket).await
    }

    pub async fn previous_page(&mut self) -> Result<Option<LoadOutcome>> {
        let ticket = self.collection.previous_page();
        self.run_if(ticket).await
    }

    pub async fn go_to_page(&mut self, page: u32) -> Result<Option<LoadOutcome>> {
        match self.collection.set_page_number(page) {
            Ok(ticket) => self.run_if(ticket).await,
            Err(e) => Err(self.report(e, "Cannot change page")),
        }
    }

    /// Narrow the list to names containing `term`; blank clears the search
    pub async fn search(&mut self, term: &str) -> Result<Option<LoadOutcome>> {
        let ticket = self.collection.set_search_term(term);
        self.run_if(ticket).await
    }

    pub async fn set_sort(&mut self, sort: PersonSort, order: SortOrder) -> Result<Option<LoadOutcome>> {
        if (sort, order) == (self.sort, self.order) {
            return Ok(None);
        }
        self.sort = sort;
        self.order = order;
        let ticket = self.collection.restart();
        self.run(ticket).await.map(Some)
    }

    pub async fn set_page_size(&mut self, per_page: u32) -> Result<Option<LoadOutcome>> {
        match self.collection.set_page_size(per_page) {
            Ok(ticket) => self.run_if(ticket).await,
            Err(e) => Err(self.report(e, "Cannot change page size")),
        }
    }

    /// Create a person and reload, since the new entry's position depends on sort order
    pub async fn create_person(&mut self, name: &str) -> Result<Person> {
        let person = match PersonService::new(self.client).create(name).await {
            Ok(person) => person,
            Err(e) => return Err(self.report(e, "Failed to create person")),
        };

        self.cache.invalidate(&ResourceKind::ALL);
        self.notifier.success(&format!("Created {}", person.name));
        if let Err(e) = self.refresh().await {
            tracing::debug!("Reload after create failed: {}", e);
        }
        Ok(person)
    }

    pub async fn rename_person(&mut self, person_id: &PersonId, name: &str) -> Result<MutationEffect> {
        let person = match PersonService::new(self.client).rename(person_id, name).await {
            Ok(person) => person,
            Err(e) => return Err(self.report(e, "Failed to rename person")),
        };

        let effect = self.collection.rename_item(person_id, &person.name);
        self.cache.invalidate(&ResourceKind::ALL);
        self.notifier.success(&format!("Renamed to {}", person.name));
        Ok(effect)
    }

    /// Delete a person; with `delete_images` their images go too, otherwise they are unassigned
    pub async fn delete_person(
        &mut self,
        person_id: &PersonId,
        delete_images: bool,
    ) -> Result<MutationEffect> {
        let message = match PersonService::new(self.client)
            .delete(person_id, delete_images)
            .await
        {
            Ok(message) => message,
            Err(e) => return Err(self.report(e, "Failed to delete person")),
        };

        let effect = if self.collection.remove_item(person_id) {
            MutationEffect::Removed
        } else {
            MutationEffect::NotHeld
        };
        self.cache.invalidate(&ResourceKind::ALL);
        self.notifier.success(&message);
        Ok(effect)
    }

    /// Reflect an image moving to or from a held person
    pub fn adjust_image_count(&mut self, person_id: &PersonId, delta: i64) -> MutationEffect {
        self.collection.adjust_image_count(person_id, delta)
    }
}
