//! Record list viewing: an in-memory filter, sort and paginate pipeline
//! ([`listview::ListView`]) plus the record sources that feed it.

pub mod domain;
pub mod fetch;
pub mod listview;
pub mod record;
pub mod validate;

pub use fetch::{FetchError, Fetcher, FileSource, RecordSet, RecordSource};
pub use listview::{ListView, ListViewConfig, SortDirection};
pub use record::{Record, Value};
pub use validate::ValidationError;
