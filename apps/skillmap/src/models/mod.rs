pub mod record;

pub use record::{CompetencyRecord, EntityKind, Population, RawCompetency, SourceRecord};
