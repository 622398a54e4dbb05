//! crates/cellar_core/src/collection.rs
//!
//! The Collection View Model: an injectable object owning a local cache of
//! the caller's wine records, a derived search/sort/group view over it, and
//! optimistic mutations with full rollback on store failure.
//!
//! The cache has a single writer (all mutation goes through `&mut self`),
//! which is what keeps the snapshot/rollback protocol correct.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{NewWine, WineRecord};
use crate::ports::{PortError, PortResult, RecordStore};

//=========================================================================================
// View Keys
//=========================================================================================

/// The field the record set is sorted by. String keys sort lexicographic
/// ascending; rating sorts numeric descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Type,
    Region,
    Rating,
}

/// The field the sorted record set is partitioned by. A closed enum mapped
/// to explicit key extractors, never dynamic field indexing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKey {
    #[default]
    None,
    Type,
    Region,
}

impl GroupKey {
    fn label_for(&self, wine: &WineRecord) -> String {
        match self {
            GroupKey::None => "All Wines".to_string(),
            GroupKey::Type => wine.wine_type.clone(),
            GroupKey::Region => wine.region.clone(),
        }
    }
}

//=========================================================================================
// Derived View
//=========================================================================================

/// One rendered group of the collection view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WineGroup {
    pub label: String,
    pub wines: Vec<WineRecord>,
}

/// The rendered collection: sorted, grouped, filtered. `total` is the
/// pre-filter record count, so an empty collection (`total == 0`) is
/// distinguishable from a search with no matches (`total > 0`, no groups).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionView {
    pub groups: Vec<WineGroup>,
    pub total: usize,
}

fn matches_search(wine: &WineRecord, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    let term = term.to_lowercase();
    wine.name.to_lowercase().contains(&term)
        || wine.wine_type.to_lowercase().contains(&term)
        || wine.region.to_lowercase().contains(&term)
}

/// Computes the derived view: stable-sort by `sort_key`, partition into
/// groups in first-appearance order, filter each group by case-insensitive
/// substring match against name, type, or region, and drop groups the
/// filter emptied.
pub fn derive_view(
    records: &[WineRecord],
    search_term: &str,
    sort_key: SortKey,
    group_key: GroupKey,
) -> CollectionView {
    let mut sorted: Vec<WineRecord> = records.to_vec();
    match sort_key {
        SortKey::Name => sorted.sort_by(|a, b| a.name.cmp(&b.name)),
        SortKey::Type => sorted.sort_by(|a, b| a.wine_type.cmp(&b.wine_type)),
        SortKey::Region => sorted.sort_by(|a, b| a.region.cmp(&b.region)),
        SortKey::Rating => sorted.sort_by(|a, b| b.rating.cmp(&a.rating)),
    }

    let mut groups: Vec<WineGroup> = Vec::new();
    for wine in sorted {
        let label = group_key.label_for(&wine);
        match groups.iter_mut().find(|g| g.label == label) {
            Some(group) => group.wines.push(wine),
            None => groups.push(WineGroup {
                label,
                wines: vec![wine],
            }),
        }
    }

    for group in &mut groups {
        group.wines.retain(|wine| matches_search(wine, search_term));
    }
    groups.retain(|group| !group.wines.is_empty());

    CollectionView {
        groups,
        total: records.len(),
    }
}

//=========================================================================================
// The View Model
//=========================================================================================

/// The Collection View Model. Owns the authoritative local cache of one
/// user's records and applies the optimistic mutation protocol:
///
/// 1. snapshot the cache,
/// 2. apply the new local state immediately,
/// 3. issue the store call,
/// 4. on success keep (or adopt) the store's result,
/// 5. on failure restore the snapshot exactly and surface a recoverable
///    error.
pub struct WineCollection {
    store: Arc<dyn RecordStore>,
    user_id: Uuid,
    records: Vec<WineRecord>,
    search_term: String,
    sort_key: SortKey,
    group_key: GroupKey,
}

impl WineCollection {
    pub fn new(store: Arc<dyn RecordStore>, user_id: Uuid) -> Self {
        Self {
            store,
            user_id,
            records: Vec::new(),
            search_term: String::new(),
            sort_key: SortKey::default(),
            group_key: GroupKey::default(),
        }
    }

    /// The current local cache, in fetch/insertion order.
    pub fn records(&self) -> &[WineRecord] {
        &self.records
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    pub fn set_sort_key(&mut self, key: SortKey) {
        self.sort_key = key;
    }

    pub fn set_group_key(&mut self, key: GroupKey) {
        self.group_key = key;
    }

    /// Renders the derived view over the current cache.
    pub fn view(&self) -> CollectionView {
        derive_view(&self.records, &self.search_term, self.sort_key, self.group_key)
    }

    /// Replaces the cache from the store.
    pub async fn refresh(&mut self) -> PortResult<&[WineRecord]> {
        self.records = self.store.list(self.user_id).await?;
        Ok(&self.records)
    }

    /// Validates and persists a new record, then appends the store-assigned
    /// result. Not optimistic: the id is store-assigned.
    pub async fn add(&mut self, fields: NewWine) -> PortResult<WineRecord> {
        fields.validate()?;
        let created = self.store.create(self.user_id, fields).await?;
        self.records.push(created.clone());
        Ok(created)
    }

    /// Optimistically flips the drunk flag. Transitioning to undrunk also
    /// resets the local rating to 0, matching the store's coupling.
    pub async fn toggle_drunk(&mut self, id: i64) -> PortResult<WineRecord> {
        let idx = self.position(id)?;
        let snapshot = self.records.clone();

        let target = !self.records[idx].is_drunk;
        let local = &mut self.records[idx];
        local.is_drunk = target;
        if !target {
            local.rating = 0;
        }

        match self.store.set_drunk(id, self.user_id, target).await {
            Ok(stored) => {
                self.records[idx] = stored.clone();
                Ok(stored)
            }
            Err(err) => {
                self.records = snapshot;
                Err(err)
            }
        }
    }

    /// Optimistically sets the rating. Rating an undrunk wine is not a
    /// valid transition here and is rejected without a store call.
    pub async fn set_rating(&mut self, id: i64, rating: i32) -> PortResult<WineRecord> {
        let idx = self.position(id)?;
        if !(0..=5).contains(&rating) {
            return Err(PortError::Validation(format!(
                "rating must be between 0 and 5, got {}",
                rating
            )));
        }
        if !self.records[idx].is_drunk {
            return Err(PortError::Validation(
                "cannot rate a wine that has not been drunk".to_string(),
            ));
        }

        let snapshot = self.records.clone();
        self.records[idx].rating = rating;

        match self.store.set_rating(id, self.user_id, rating).await {
            Ok(stored) => {
                self.records[idx] = stored.clone();
                Ok(stored)
            }
            Err(err) => {
                self.records = snapshot;
                Err(err)
            }
        }
    }

    /// Optimistically removes the record from the local list, then issues
    /// the delete.
    pub async fn remove(&mut self, id: i64) -> PortResult<()> {
        let idx = self.position(id)?;
        let snapshot = self.records.clone();
        self.records.remove(idx);

        match self.store.delete(id, self.user_id).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.records = snapshot;
                Err(err)
            }
        }
    }

    fn position(&self, id: i64) -> PortResult<usize> {
        self.records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| PortError::NotFound(format!("Wine {} not found", id)))
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WinePatch;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::sync::Mutex;

    /// An in-memory record store with per-call failure injection, used to
    /// drive the view model through the same contract the SQL adapter
    /// implements.
    struct MemoryStore {
        wines: Mutex<HashMap<i64, WineRecord>>,
        next_id: AtomicI64,
        fail_next: AtomicBool,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self {
                wines: Mutex::new(HashMap::new()),
                next_id: AtomicI64::new(1),
                fail_next: AtomicBool::new(false),
            }
        }

        fn fail_next_call(&self) {
            self.fail_next.store(true, Ordering::SeqCst);
        }

        fn check_failure(&self) -> PortResult<()> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                Err(PortError::Unexpected("injected store failure".to_string()))
            } else {
                Ok(())
            }
        }

        fn owned(&self, id: i64, user_id: Uuid) -> PortResult<WineRecord> {
            self.wines
                .lock()
                .unwrap()
                .get(&id)
                .filter(|w| w.user_id == user_id)
                .cloned()
                .ok_or_else(|| PortError::NotFound(format!("Wine {} not found", id)))
        }
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        async fn list(&self, user_id: Uuid) -> PortResult<Vec<WineRecord>> {
            self.check_failure()?;
            let mut wines: Vec<WineRecord> = self
                .wines
                .lock()
                .unwrap()
                .values()
                .filter(|w| w.user_id == user_id)
                .cloned()
                .collect();
            wines.sort_by_key(|w| w.id);
            Ok(wines)
        }

        async fn create(&self, user_id: Uuid, fields: NewWine) -> PortResult<WineRecord> {
            self.check_failure()?;
            fields.validate()?;
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let wine = WineRecord {
                id,
                user_id,
                name: fields.name,
                wine_type: fields.wine_type,
                region: fields.region,
                description: fields.description,
                is_drunk: false,
                rating: 0,
            };
            self.wines.lock().unwrap().insert(id, wine.clone());
            Ok(wine)
        }

        async fn get(&self, id: i64, user_id: Uuid) -> PortResult<WineRecord> {
            self.check_failure()?;
            self.owned(id, user_id)
        }

        async fn update(&self, id: i64, user_id: Uuid, patch: WinePatch) -> PortResult<WineRecord> {
            self.check_failure()?;
            let mut wine = self.owned(id, user_id)?;
            if let Some(name) = patch.name {
                wine.name = name;
            }
            if let Some(wine_type) = patch.wine_type {
                wine.wine_type = wine_type;
            }
            if let Some(region) = patch.region {
                wine.region = region;
            }
            if let Some(description) = patch.description {
                wine.description = description;
            }
            if let Some(is_drunk) = patch.is_drunk {
                wine.is_drunk = is_drunk;
            }
            if let Some(rating) = patch.rating {
                wine.rating = rating;
            }
            self.wines.lock().unwrap().insert(id, wine.clone());
            Ok(wine)
        }

        async fn delete(&self, id: i64, user_id: Uuid) -> PortResult<()> {
            self.check_failure()?;
            self.owned(id, user_id)?;
            self.wines.lock().unwrap().remove(&id);
            Ok(())
        }

        async fn set_rating(&self, id: i64, user_id: Uuid, rating: i32) -> PortResult<WineRecord> {
            self.check_failure()?;
            let mut wine = self.owned(id, user_id)?;
            wine.rating = rating;
            self.wines.lock().unwrap().insert(id, wine.clone());
            Ok(wine)
        }

        async fn set_drunk(&self, id: i64, user_id: Uuid, is_drunk: bool) -> PortResult<WineRecord> {
            self.check_failure()?;
            let mut wine = self.owned(id, user_id)?;
            wine.is_drunk = is_drunk;
            if !is_drunk {
                wine.rating = 0;
            }
            self.wines.lock().unwrap().insert(id, wine.clone());
            Ok(wine)
        }
    }

    fn wine(id: i64, name: &str, wine_type: &str, region: &str, rating: i32) -> WineRecord {
        WineRecord {
            id,
            user_id: Uuid::nil(),
            name: name.to_string(),
            wine_type: wine_type.to_string(),
            region: region.to_string(),
            description: String::new(),
            is_drunk: rating > 0,
            rating,
        }
    }

    fn new_wine(name: &str) -> NewWine {
        NewWine {
            name: name.to_string(),
            wine_type: "Red".to_string(),
            region: "Bordeaux".to_string(),
            description: "A full-bodied red.".to_string(),
        }
    }

    async fn collection_with(
        store: &Arc<MemoryStore>,
        user_id: Uuid,
        names: &[&str],
    ) -> WineCollection {
        let mut collection = WineCollection::new(store.clone() as Arc<dyn RecordStore>, user_id);
        for name in names {
            collection.add(new_wine(name)).await.unwrap();
        }
        collection
    }

    //-------------------------------------------------------------------------------------
    // Derived view
    //-------------------------------------------------------------------------------------

    #[test]
    fn sort_by_name_is_lexicographic_ascending() {
        let records = vec![
            wine(1, "Tignanello", "Red", "Tuscany", 0),
            wine(2, "Margaux", "Red", "Bordeaux", 0),
            wine(3, "Opus One", "Red", "Napa Valley", 0),
        ];
        let view = derive_view(&records, "", SortKey::Name, GroupKey::None);
        let names: Vec<&str> = view.groups[0].wines.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, ["Margaux", "Opus One", "Tignanello"]);
    }

    #[test]
    fn sort_by_rating_is_stable_descending() {
        let records = vec![
            wine(1, "First", "Red", "Bordeaux", 3),
            wine(2, "Second", "Red", "Bordeaux", 5),
            wine(3, "Third", "Red", "Bordeaux", 3),
        ];
        let view = derive_view(&records, "", SortKey::Rating, GroupKey::None);
        let ids: Vec<i64> = view.groups[0].wines.iter().map(|w| w.id).collect();
        // Equal ratings keep their original relative order.
        assert_eq!(ids, [2, 1, 3]);
    }

    #[test]
    fn group_none_yields_single_all_wines_group() {
        let records = vec![
            wine(1, "A", "Red", "Bordeaux", 0),
            wine(2, "B", "White", "Marlborough", 0),
        ];
        let view = derive_view(&records, "", SortKey::Name, GroupKey::None);
        assert_eq!(view.groups.len(), 1);
        assert_eq!(view.groups[0].label, "All Wines");
        assert_eq!(view.groups[0].wines.len(), 2);
    }

    #[test]
    fn grouping_by_type_partitions_in_first_appearance_order() {
        let records = vec![
            wine(1, "A", "Red", "Bordeaux", 0),
            wine(2, "B", "White", "Marlborough", 0),
            wine(3, "C", "Red", "Tuscany", 0),
        ];
        let view = derive_view(&records, "", SortKey::Name, GroupKey::Type);
        let labels: Vec<&str> = view.groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, ["Red", "White"]);
        assert_eq!(view.groups[0].wines.len(), 2);
    }

    #[test]
    fn filter_is_case_insensitive_across_name_type_and_region() {
        let records = vec![
            wine(1, "Margaux", "Red", "Bordeaux", 0),
            wine(2, "Cloudy Bay", "White", "Marlborough", 0),
            wine(3, "Dom Perignon", "Sparkling", "Champagne", 0),
        ];
        let by_region = derive_view(&records, "BORDEAUX", SortKey::Name, GroupKey::None);
        assert_eq!(by_region.groups[0].wines[0].name, "Margaux");

        let by_type = derive_view(&records, "spark", SortKey::Name, GroupKey::None);
        assert_eq!(by_type.groups[0].wines[0].name, "Dom Perignon");

        let by_name = derive_view(&records, "cloudy", SortKey::Name, GroupKey::None);
        assert_eq!(by_name.groups[0].wines[0].name, "Cloudy Bay");
    }

    #[test]
    fn emptied_groups_are_omitted_but_total_distinguishes_no_matches() {
        let records = vec![
            wine(1, "Margaux", "Red", "Bordeaux", 0),
            wine(2, "Cloudy Bay", "White", "Marlborough", 0),
        ];
        let view = derive_view(&records, "champagne", SortKey::Name, GroupKey::Type);
        assert!(view.groups.is_empty());
        assert_eq!(view.total, 2); // a search with no matches, not an empty cellar

        let empty = derive_view(&[], "", SortKey::Name, GroupKey::Type);
        assert!(empty.groups.is_empty());
        assert_eq!(empty.total, 0);
    }

    //-------------------------------------------------------------------------------------
    // Optimistic mutation and rollback
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn end_to_end_create_toggle_rate_cycle() {
        let store = Arc::new(MemoryStore::new());
        let user_id = Uuid::new_v4();
        let mut collection = collection_with(&store, user_id, &["Margaux"]).await;

        collection.refresh().await.unwrap();
        assert_eq!(collection.records().len(), 1);
        let id = collection.records()[0].id;

        let drunk = collection.toggle_drunk(id).await.unwrap();
        assert!(drunk.is_drunk);

        let rated = collection.set_rating(id, 4).await.unwrap();
        assert_eq!(rated.rating, 4);

        let undrunk = collection.toggle_drunk(id).await.unwrap();
        assert!(!undrunk.is_drunk);
        assert_eq!(undrunk.rating, 0);
        assert_eq!(store.get(id, user_id).await.unwrap().rating, 0);
    }

    #[tokio::test]
    async fn toggle_to_undrunk_resets_rating_locally_and_in_store() {
        let store = Arc::new(MemoryStore::new());
        let user_id = Uuid::new_v4();
        let mut collection = collection_with(&store, user_id, &["Margaux"]).await;
        let id = collection.records()[0].id;

        collection.toggle_drunk(id).await.unwrap();
        collection.set_rating(id, 5).await.unwrap();
        collection.toggle_drunk(id).await.unwrap();

        assert_eq!(collection.records()[0].rating, 0);
        assert!(!collection.records()[0].is_drunk);
    }

    #[tokio::test]
    async fn rating_an_undrunk_wine_is_rejected_without_a_store_call() {
        let store = Arc::new(MemoryStore::new());
        let user_id = Uuid::new_v4();
        let mut collection = collection_with(&store, user_id, &["Margaux"]).await;
        let id = collection.records()[0].id;

        let err = collection.set_rating(id, 3).await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
        assert_eq!(store.get(id, user_id).await.unwrap().rating, 0);
    }

    #[tokio::test]
    async fn out_of_range_rating_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let user_id = Uuid::new_v4();
        let mut collection = collection_with(&store, user_id, &["Margaux"]).await;
        let id = collection.records()[0].id;
        collection.toggle_drunk(id).await.unwrap();

        assert!(matches!(
            collection.set_rating(id, 6).await,
            Err(PortError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn failed_toggle_rolls_back_to_exact_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let user_id = Uuid::new_v4();
        let mut collection = collection_with(&store, user_id, &["Margaux", "Cloudy Bay"]).await;
        let id = collection.records()[0].id;
        let snapshot = collection.records().to_vec();

        store.fail_next_call();
        let err = collection.toggle_drunk(id).await.unwrap_err();
        assert!(matches!(err, PortError::Unexpected(_)));
        assert_eq!(collection.records(), snapshot.as_slice());
    }

    #[tokio::test]
    async fn failed_rating_rolls_back_to_exact_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let user_id = Uuid::new_v4();
        let mut collection = collection_with(&store, user_id, &["Margaux"]).await;
        let id = collection.records()[0].id;
        collection.toggle_drunk(id).await.unwrap();
        let snapshot = collection.records().to_vec();

        store.fail_next_call();
        collection.set_rating(id, 2).await.unwrap_err();
        assert_eq!(collection.records(), snapshot.as_slice());
    }

    #[tokio::test]
    async fn failed_delete_rolls_back_to_exact_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let user_id = Uuid::new_v4();
        let mut collection = collection_with(&store, user_id, &["Margaux", "Cloudy Bay"]).await;
        let id = collection.records()[1].id;
        let snapshot = collection.records().to_vec();

        store.fail_next_call();
        collection.remove(id).await.unwrap_err();
        assert_eq!(collection.records(), snapshot.as_slice());
    }

    #[tokio::test]
    async fn successful_delete_removes_the_record_locally_and_remotely() {
        let store = Arc::new(MemoryStore::new());
        let user_id = Uuid::new_v4();
        let mut collection = collection_with(&store, user_id, &["Margaux", "Cloudy Bay"]).await;
        let id = collection.records()[0].id;

        collection.remove(id).await.unwrap();
        assert_eq!(collection.records().len(), 1);
        assert!(matches!(
            store.get(id, user_id).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn mutating_an_unknown_id_is_not_found_without_a_store_call() {
        let store = Arc::new(MemoryStore::new());
        let user_id = Uuid::new_v4();
        let mut collection = collection_with(&store, user_id, &["Margaux"]).await;

        assert!(matches!(
            collection.toggle_drunk(999).await,
            Err(PortError::NotFound(_))
        ));
        assert!(matches!(collection.remove(999).await, Err(PortError::NotFound(_))));
    }

    //-------------------------------------------------------------------------------------
    // Ownership scoping (store contract)
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn foreign_user_cannot_see_or_modify_a_record() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let wine = store.create(owner, new_wine("Margaux")).await.unwrap();

        assert!(matches!(store.get(wine.id, stranger).await, Err(PortError::NotFound(_))));
        assert!(matches!(
            store.update(wine.id, stranger, WinePatch::default()).await,
            Err(PortError::NotFound(_))
        ));
        assert!(matches!(store.delete(wine.id, stranger).await, Err(PortError::NotFound(_))));
        assert!(matches!(
            store.set_drunk(wine.id, stranger, true).await,
            Err(PortError::NotFound(_))
        ));

        // The owner still sees the record untouched.
        assert_eq!(store.get(wine.id, owner).await.unwrap(), wine);
    }

    #[tokio::test]
    async fn list_returns_only_the_callers_records() {
        let store = Arc::new(MemoryStore::new());
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store.create(alice, new_wine("Margaux")).await.unwrap();
        store.create(bob, new_wine("Cloudy Bay")).await.unwrap();

        let wines = store.list(alice).await.unwrap();
        assert_eq!(wines.len(), 1);
        assert_eq!(wines[0].name, "Margaux");
    }
}
