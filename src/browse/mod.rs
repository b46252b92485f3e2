//! The browsing core: identity resolution, the dynamic table model, paging and
//! sorting, and the edit protocol, all scoped to one open collection.

pub mod collection;
pub mod edit;
pub mod error;
pub mod identity;
pub mod pager;
pub mod session;
pub mod settings;
pub mod table;

pub use collection::CollectionContext;
pub use edit::{Confirmation, DeleteOutcome, DocumentEditor, EditOutcome, FieldEditor};
pub use error::{BrowseError, ErrorKind, Operation};
pub use identity::{Identity, IdentityResolver, Resolution, RowKey};
pub use pager::{
    Completion, FetchTicket, LoadState, PageSize, PageState, Pager, SortDirection, SortSpec,
};
pub use session::BrowseSession;
pub use settings::BrowseSettings;
pub use table::{Cell, TablePage, TableRow, compute_columns, render_cell, truncate_display};
