pub mod drop_skipped_fields;
pub mod inline_fragment_spreads;
