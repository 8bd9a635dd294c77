//! Schema catalog: the fixed description of queryable tables, columns,
//! relationships and entity vocabulary that grounds generation and validation.

mod model;

pub use model::{
    CatalogError, ColumnDef, ColumnType, MetricEntry, Relationship, SchemaCatalog, SeasonRange,
    TableDef, TeamEntry,
};
