mod enrich;
mod manager;
mod model;
mod scan;
mod view;

pub use manager::{Enriched, LibraryManager};
pub use model::{
    EnrichEvent, ImportedFile, LibraryEvent, MediaHandle, SortDirection, SortKey, Track,
    UNKNOWN_ARTIST,
};
pub use scan::spawn_import;
pub use view::{next_in_view_from, prev_in_view_from};
