pub mod collection;
pub mod domain;
pub mod ports;

pub use collection::{derive_view, CollectionView, GroupKey, SortKey, WineCollection, WineGroup};
pub use domain::{normalize_wine_type, DraftRecord, NewWine, User, UserCredentials, WinePatch, WineRecord, VALID_WINE_TYPES};
pub use ports::{ExtractionService, IdentityStore, PortError, PortResult, RecordStore};
