//! Reserved column names, request keys and defaults shared by the compiler, paginator and services.

/// Soft-delete flag column. "1" marks a row deleted.
pub const IS_DELETE: &str = "IS_DELETE";
pub const DELETED: &str = "1";
pub const NOT_DELETED: &str = "0";

/// Optimistic-lock version column.
pub const RECORD_VERSION: &str = "RECORD_VERSION";
pub const CREATED_BY: &str = "CREATED_BY";
pub const UPDATED_BY: &str = "UPDATED_BY";

/// Flat filter map keys.
pub const IS_OR: &str = "isOr";
pub const INPUT: &str = "input";
pub const PAGE_NUM: &str = "pageNum";
pub const PAGE_SIZE: &str = "pageSize";
pub const SORT: &str = "sort";
pub const ORDER: &str = "order";

pub const DEFAULT_PAGE_NUM: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Clause matching every row.
pub const WHERE_ALL: &str = "1";
pub const LIKE_WILDCARD: &str = "%";

/// Rows per insert-or-replace batch.
pub const BATCH_SIZE: usize = 500;
/// Largest IN / NOT IN list accepted by the filter compiler.
pub const MAX_IN_LIST: usize = 1000;

/// Key under which eager-loaded child rows are nested in a row map.
pub const CHILDREN: &str = "children";
