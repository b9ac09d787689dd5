pub mod audit;
pub mod osm;

/// Attribute names that describe who created an element and when. They are
/// grouped under `created` in a normalized record instead of being kept as
/// top level fields.
pub const CREATED: [&str; 5] = ["version", "changeset", "timestamp", "user", "uid"];

/// Elements whose `user` attribute counts towards contributor statistics.
pub const CONTRIBUTION_ELEMENTS: [&str; 3] = ["node", "way", "relation"];
