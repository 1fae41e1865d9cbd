//! Diesel schema for task persistence.

diesel::table! {
    /// Task records stored as JSON payloads with version columns.
    tasks (id) {
        /// Task identifier.
        #[max_length = 255]
        id -> Varchar,
        /// Insertion sequence; breaks ties between equal creation times.
        seq -> Int8,
        /// Creation time in nanoseconds since the Unix epoch.
        created_ns -> Int8,
        /// Version stamp in nanoseconds since the Unix epoch.
        db_modified_ns -> Int8,
        /// Lifecycle status.
        #[max_length = 50]
        status -> Varchar,
        /// Serialised task.
        payload -> Jsonb,
    }
}
