//! Interactive browsing session
//!
//! Menus drive an [`ImageGallery`] or a [`PeopleDirectory`]. All views in a
//! session share one [`PageCache`], so a change made in one view marks the
//! others stale and they reload when shown again.

use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use facefolio_protocol::api::{ImageFilter, PersonSort, SortOrder};
use facefolio_protocol::common::{Image, ImageId, Person, PersonId};

use crate::cache::PageCache;
use crate::client::ApiClient;
use crate::collection::{Collection, CollectionItem, PageRequest};
use crate::error::{FolioError, Result};
use crate::gallery::{ImageGallery, Notifier, PeopleDirectory, UiNotifier};
use crate::person::PersonService;
use crate::ui::{identity_label, UI};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MainAction {
    AllImages,
    Identified,
    Unidentified,
    People,
    Upload,
    Quit,
}

impl MainAction {
    const ALL: [MainAction; 6] = [
        MainAction::AllImages,
        MainAction::Identified,
        MainAction::Unidentified,
        MainAction::People,
        MainAction::Upload,
        MainAction::Quit,
    ];
}

impl fmt::Display for MainAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MainAction::AllImages => "All images",
            MainAction::Identified => "Identified images",
            MainAction::Unidentified => "Unidentified images",
            MainAction::People => "People",
            MainAction::Upload => "Upload images",
            MainAction::Quit => "Quit",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GalleryAction {
    NextPage,
    PreviousPage,
    GoToPage,
    ChangeFilter,
    Delete,
    Assign,
    Unassign,
    Reprocess,
    Upload,
    Refresh,
    Back,
}

impl fmt::Display for GalleryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GalleryAction::NextPage => "Next page",
            GalleryAction::PreviousPage => "Previous page",
            GalleryAction::GoToPage => "Go to page",
            GalleryAction::ChangeFilter => "Change filter",
            GalleryAction::Delete => "Delete image",
            GalleryAction::Assign => "Assign image to a person",
            GalleryAction::Unassign => "Unassign image",
            GalleryAction::Reprocess => "Reprocess image",
            GalleryAction::Upload => "Upload images",
            GalleryAction::Refresh => "Refresh",
            GalleryAction::Back => "Back",
        };
        f.write_str(label)
    }
}

/// Actions offered for the current gallery page
fn gallery_actions(collection: &Collection<Image>) -> Vec<GalleryAction> {
    let mut actions = Vec::new();
    if collection.has_next_page() {
        actions.push(GalleryAction::NextPage);
    }
    if collection.has_previous_page() {
        actions.push(GalleryAction::PreviousPage);
    }
    if collection.total_pages() > 1 {
        actions.push(GalleryAction::GoToPage);
    }
    if collection.pinned_owner().is_none() {
        actions.push(GalleryAction::ChangeFilter);
    }
    if !collection.is_empty() {
        actions.extend([
            GalleryAction::Delete,
            GalleryAction::Assign,
            GalleryAction::Unassign,
            GalleryAction::Reprocess,
        ]);
    }
    actions.extend([
        GalleryAction::Upload,
        GalleryAction::Refresh,
        GalleryAction::Back,
    ]);
    actions
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeopleAction {
    NextPage,
    PreviousPage,
    GoToPage,
    Search,
    Sort,
    Open,
    Create,
    Rename,
    Delete,
    Refresh,
    Back,
}

impl fmt::Display for PeopleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PeopleAction::NextPage => "Next page",
            PeopleAction::PreviousPage => "Previous page",
            PeopleAction::GoToPage => "Go to page",
            PeopleAction::Search => "Search",
            PeopleAction::Sort => "Sort",
            PeopleAction::Open => "Open person",
            PeopleAction::Create => "Create person",
            PeopleAction::Rename => "Rename person",
            PeopleAction::Delete => "Delete person",
            PeopleAction::Refresh => "Refresh",
            PeopleAction::Back => "Back",
        };
        f.write_str(label)
    }
}

fn people_actions(collection: &Collection<Person>) -> Vec<PeopleAction> {
    let mut actions = Vec::new();
    if collection.has_next_page() {
        actions.push(PeopleAction::NextPage);
    }
    if collection.has_previous_page() {
        actions.push(PeopleAction::PreviousPage);
    }
    if collection.total_pages() > 1 {
        actions.push(PeopleAction::GoToPage);
    }
    actions.extend([PeopleAction::Search, PeopleAction::Sort]);
    if !collection.is_empty() {
        actions.extend([
            PeopleAction::Open,
            PeopleAction::Rename,
            PeopleAction::Delete,
        ]);
    }
    actions.extend([
        PeopleAction::Create,
        PeopleAction::Refresh,
        PeopleAction::Back,
    ]);
    actions
}

/// Image count change picked up while a person's gallery was open
fn count_drift(people: &Collection<Person>, visited: &Person) -> Option<i64> {
    let held = people.get(&visited.id)?;
    let delta = visited.image_count as i64 - held.image_count as i64;
    (delta != 0).then_some(delta)
}

/// Split a line of whitespace separated paths
fn parse_paths(line: &str) -> Vec<PathBuf> {
    line.split_whitespace().map(PathBuf::from).collect()
}

fn image_choice(image: &Image) -> String {
    format!(
        "{} ({}) - {}",
        image.display_name(),
        image.id,
        identity_label(image)
    )
}

fn person_choice(person: &Person) -> String {
    format!("{} ({} images)", person.name, person.image_count)
}

/// View errors have already been shown by the notifier; only prompt
/// failures end the session
fn settle<T>(result: Result<T>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e @ FolioError::Ui { .. }) => Err(e),
        Err(e) => {
            tracing::debug!("view action failed: {}", e);
            Ok(())
        }
    }
}

pub struct BrowseSession<'a, C: ApiClient + ?Sized> {
    client: &'a C,
    cache: PageCache,
    notifier: UiNotifier,
    ui: UI,
    per_page: u32,
}

impl<'a, C: ApiClient + ?Sized> BrowseSession<'a, C> {
    pub fn new(client: &'a C, per_page: u32, cache_ttl: Duration) -> Self {
        Self {
            client,
            cache: PageCache::new(cache_ttl),
            notifier: UiNotifier::new(),
            ui: UI::new(),
            per_page,
        }
    }

    /// Run until the user quits; an interrupted prompt ends the session cleanly
    pub async fn run(&self) -> Result<()> {
        match self.main_menu().await {
            Err(e) if e.is_cancelled() => {
                tracing::debug!("browse session cancelled");
                Ok(())
            }
            other => other,
        }
    }

    async fn main_menu(&self) -> Result<()> {
        loop {
            let Some(action) = select("What would you like to browse?", &MainAction::ALL)? else {
                return Ok(());
            };

            match action {
                MainAction::AllImages => self.browse_images(ImageFilter::All).await?,
                MainAction::Identified => self.browse_images(ImageFilter::Identified).await?,
                MainAction::Unidentified => self.browse_images(ImageFilter::Unidentified).await?,
                MainAction::People => self.browse_people().await?,
                MainAction::Upload => {
                    let mut gallery = ImageGallery::new(
                        self.client,
                        &self.notifier,
                        PageRequest::new(self.per_page),
                    )
                    .with_cache(&self.cache);
                    self.upload(&mut gallery).await?;
                }
                MainAction::Quit => return Ok(()),
            }
        }
    }

    async fn browse_images(&self, filter: ImageFilter) -> Result<()> {
        let request = PageRequest::new(self.per_page).with_filter(filter);
        let mut gallery =
            ImageGallery::new(self.client, &self.notifier, request).with_cache(&self.cache);
        settle(gallery.open().await)?;
        self.gallery_loop(&mut gallery).await
    }

    async fn gallery_loop(&self, gallery: &mut ImageGallery<'_, C, UiNotifier>) -> Result<()> {
        loop {
            settle(gallery.sync().await)?;

            let collection = gallery.collection();
            self.ui.header(&gallery.title());
            self.ui.image_table(collection.items());
            self.ui.page_footer(
                collection.page(),
                collection.total_pages(),
                collection.total_count(),
            );

            let actions = gallery_actions(collection);
            let Some(action) = select("Action", &actions)? else {
                return Ok(());
            };

            match action {
                GalleryAction::NextPage => settle(gallery.next_page().await)?,
                GalleryAction::PreviousPage => settle(gallery.previous_page().await)?,
                GalleryAction::GoToPage => {
                    let page = prompt_page(gallery.collection().total_pages())?;
                    settle(gallery.go_to_page(page).await)?;
                }
                GalleryAction::ChangeFilter => {
                    let filters = [
                        ImageFilter::All,
                        ImageFilter::Identified,
                        ImageFilter::Unidentified,
                    ];
                    if let Some(filter) = select("Show", &filters)? {
                        settle(gallery.set_filter(filter).await)?;
                    }
                }
                GalleryAction::Delete => {
                    if let Some(id) = pick_image(gallery.collection())? {
                        if prompt_confirm(&format!("Delete image {}?", id))? {
                            settle(gallery.delete_image(&id).await)?;
                        }
                    }
                }
                GalleryAction::Assign => {
                    if let Some(id) = pick_image(gallery.collection())? {
                        if let Some(person_id) = self.pick_person().await? {
                            settle(gallery.assign_image(&id, Some(person_id)).await)?;
                        }
                    }
                }
                GalleryAction::Unassign => {
                    if let Some(id) = pick_image(gallery.collection())? {
                        settle(gallery.unassign_image(&id).await)?;
                    }
                }
                GalleryAction::Reprocess => {
                    if let Some(id) = pick_image(gallery.collection())? {
                        settle(gallery.reprocess_image(&id).await)?;
                    }
                }
                GalleryAction::Upload => self.upload(gallery).await?,
                GalleryAction::Refresh => settle(gallery.refresh().await)?,
                GalleryAction::Back => return Ok(()),
            }
        }
    }

    async fn upload(&self, gallery: &mut ImageGallery<'_, C, UiNotifier>) -> Result<()> {
        let line: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Image files or directories")
            .allow_empty(true)
            .interact_text()?;
        let paths = parse_paths(&line);
        if paths.is_empty() {
            return Ok(());
        }
        settle(gallery.upload(&paths, true).await)
    }

    /// Choose from every person, for assignment
    async fn pick_person(&self) -> Result<Option<PersonId>> {
        let people = match PersonService::new(self.client)
            .list(None, PersonSort::Name, SortOrder::Asc)
            .await
        {
            Ok(people) => people,
            Err(e) => {
                self.notifier.error(&format!("Failed to load people: {}", e));
                return Ok(None);
            }
        };
        if people.is_empty() {
            self.notifier.info("Create a person first");
            return Ok(None);
        }

        let labels: Vec<String> = people.iter().map(person_choice).collect();
        Ok(select_index("Assign to", &labels)?.map(|idx| people[idx].id.clone()))
    }

    async fn browse_people(&self) -> Result<()> {
        let mut directory =
            PeopleDirectory::new(self.client, &self.notifier, PageRequest::new(self.per_page))
                .with_cache(&self.cache);
        settle(directory.open().await)?;

        loop {
            settle(directory.sync().await)?;

            let collection = directory.collection();
            self.ui.header("People");
            self.ui.people_table(collection.items());
            self.ui.page_footer(
                collection.page(),
                collection.total_pages(),
                collection.total_count(),
            );

            let actions = people_actions(collection);
            let Some(action) = select("Action", &actions)? else {
                return Ok(());
            };

            match action {
                PeopleAction::NextPage => settle(directory.next_page().await)?,
                PeopleAction::PreviousPage => settle(directory.previous_page().await)?,
                PeopleAction::GoToPage => {
                    let page = prompt_page(directory.collection().total_pages())?;
                    settle(directory.go_to_page(page).await)?;
                }
                PeopleAction::Search => {
                    let current = directory.collection().request().search.clone();
                    let term: String = Input::with_theme(&ColorfulTheme::default())
                        .with_prompt("Search names (empty clears)")
                        .with_initial_text(current.unwrap_or_default())
                        .allow_empty(true)
                        .interact_text()?;
                    settle(directory.search(&term).await)?;
                }
                PeopleAction::Sort => {
                    let sorts = [PersonSort::Name, PersonSort::CreatedAt, PersonSort::ImageCount];
                    if let Some(sort) = select("Sort by", &sorts)? {
                        let orders = [SortOrder::Asc, SortOrder::Desc];
                        if let Some(order) = select("Order", &orders)? {
                            settle(directory.set_sort(sort, order).await)?;
                        }
                    }
                }
                PeopleAction::Open => {
                    if let Some(person_id) = pick_person_on_page(directory.collection())? {
                        let mut gallery = ImageGallery::for_person(
                            self.client,
                            &self.notifier,
                            person_id,
                            PageRequest::new(self.per_page),
                        )
                        .with_cache(&self.cache);
                        if gallery.open().await.is_ok() {
                            self.gallery_loop(&mut gallery).await?;
                            if let Some(visited) = gallery.person() {
                                if let Some(delta) = count_drift(directory.collection(), visited) {
                                    directory.adjust_image_count(&visited.id, delta);
                                }
                            }
                        }
                    }
                }
                PeopleAction::Create => {
                    let name: String = Input::with_theme(&ColorfulTheme::default())
                        .with_prompt("Name")
                        .interact_text()?;
                    settle(directory.create_person(&name).await)?;
                }
                PeopleAction::Rename => {
                    if let Some(person_id) = pick_person_on_page(directory.collection())? {
                        let current = directory
                            .collection()
                            .get(&person_id)
                            .map(|p| p.name.clone())
                            .unwrap_or_default();
                        let name: String = Input::with_theme(&ColorfulTheme::default())
                            .with_prompt("New name")
                            .with_initial_text(current)
                            .interact_text()?;
                        settle(directory.rename_person(&person_id, &name).await)?;
                    }
                }
                PeopleAction::Delete => {
                    if let Some(person_id) = pick_person_on_page(directory.collection())? {
                        if prompt_confirm(&format!("Delete person {}?", person_id))? {
                            let delete_images = Confirm::with_theme(&ColorfulTheme::default())
                                .with_prompt("Also delete their images?")
                                .default(false)
                                .interact()?;
                            settle(directory.delete_person(&person_id, delete_images).await)?;
                        }
                    }
                }
                PeopleAction::Refresh => settle(directory.refresh().await)?,
                PeopleAction::Back => return Ok(()),
            }
        }
    }
}

fn select<T: fmt::Display + Copy>(prompt: &str, options: &[T]) -> Result<Option<T>> {
    let labels: Vec<String> = options.iter().map(|o| o.to_string()).collect();
    Ok(select_index(prompt, &labels)?.map(|idx| options[idx]))
}

fn select_index(prompt: &str, labels: &[String]) -> Result<Option<usize>> {
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(labels)
        .default(0)
        .interact_opt()?;
    Ok(choice)
}

fn pick_image(collection: &Collection<Image>) -> Result<Option<ImageId>> {
    let labels: Vec<String> = collection.items().iter().map(image_choice).collect();
    Ok(select_index("Image", &labels)?.map(|idx| collection.items()[idx].item_id().clone()))
}

fn pick_person_on_page(collection: &Collection<Person>) -> Result<Option<PersonId>> {
    let labels: Vec<String> = collection.items().iter().map(person_choice).collect();
    Ok(select_index("Person", &labels)?.map(|idx| collection.items()[idx].item_id().clone()))
}

fn prompt_page(total_pages: u32) -> Result<u32> {
    let page = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Page (1-{})", total_pages.max(1)))
        .interact_text()?;
    Ok(page)
}

fn prompt_confirm(prompt: &str) -> Result<bool> {
    let proceed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?;
    Ok(proceed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::PageResult;
    use crate::tests::utils::test_helpers::*;

    fn loaded_images(count: usize, total: u64, page: u32) -> Collection<Image> {
        let request = PageRequest::new(5).with_page(page);
        let mut collection = Collection::new(request.clone());
        let ticket = collection.begin_load();
        let result = PageResult::paginate(unidentified_images(total as usize), &request);
        assert_eq!(result.items.len(), count);
        collection.complete_load(ticket, Ok(result)).unwrap();
        collection
    }

    #[test]
    fn test_gallery_actions_follow_paging() {
        let first = loaded_images(5, 12, 1);
        let actions = gallery_actions(&first);
        assert!(actions.contains(&GalleryAction::NextPage));
        assert!(!actions.contains(&GalleryAction::PreviousPage));
        assert!(actions.contains(&GalleryAction::GoToPage));
        assert!(actions.contains(&GalleryAction::Delete));

        let last = loaded_images(2, 12, 3);
        let actions = gallery_actions(&last);
        assert!(!actions.contains(&GalleryAction::NextPage));
        assert!(actions.contains(&GalleryAction::PreviousPage));
    }

    #[test]
    fn test_empty_gallery_offers_no_item_actions() {
        let collection: Collection<Image> = Collection::new(PageRequest::new(5));
        let actions = gallery_actions(&collection);
        assert!(!actions.contains(&GalleryAction::Delete));
        assert!(!actions.contains(&GalleryAction::GoToPage));
        assert_eq!(actions.last(), Some(&GalleryAction::Back));
    }

    #[test]
    fn test_person_gallery_cannot_change_filter() {
        let collection: Collection<Image> =
            Collection::pinned_to(PersonId::new("p1"), PageRequest::new(5));
        assert!(!gallery_actions(&collection).contains(&GalleryAction::ChangeFilter));
    }

    #[test]
    fn test_people_actions() {
        let empty: Collection<Person> = Collection::new(PageRequest::new(5));
        let actions = people_actions(&empty);
        assert!(actions.contains(&PeopleAction::Create));
        assert!(!actions.contains(&PeopleAction::Open));
    }

    #[test]
    fn test_count_drift_after_person_gallery() {
        let request = PageRequest::new(5);
        let mut people = Collection::new(request.clone());
        let ticket = people.begin_load();
        let held = vec![sample_person("p1", "Ada", 4), sample_person("p2", "Bob", 2)];
        people
            .complete_load(ticket, Ok(PageResult::paginate(held, &request)))
            .unwrap();

        assert_eq!(count_drift(&people, &sample_person("p1", "Ada", 2)), Some(-2));
        assert_eq!(count_drift(&people, &sample_person("p2", "Bob", 2)), None);
        assert_eq!(count_drift(&people, &sample_person("p9", "Cy", 1)), None);
    }

    #[test]
    fn test_parse_paths() {
        assert_eq!(
            parse_paths("  a.jpg photos/ "),
            vec![PathBuf::from("a.jpg"), PathBuf::from("photos/")]
        );
        assert!(parse_paths("   ").is_empty());
    }

    #[test]
    fn test_choice_labels() {
        assert_eq!(image_choice(&sample_image("i1", None)), "i1.jpg (i1) - Unidentified");
        assert_eq!(person_choice(&sample_person("p1", "Ada", 3)), "Ada (3 images)");
    }

    #[test]
    fn test_settle_keeps_session_alive_on_view_errors() {
        assert!(settle::<()>(Err(FolioError::network("down"))).is_ok());
        assert!(settle::<()>(Err(FolioError::user_cancelled())).is_err());
    }
}
