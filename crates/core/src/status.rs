//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table, and its label matches
//! the `name` column.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

#[macro_export]
macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> $crate::status::StatusId {
                self as $crate::status::StatusId
            }

            /// Map a database status ID back to the enum.
            pub fn from_id(id: $crate::status::StatusId) -> Option<Self> {
                match id {
                    $( x if x == $val => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// Lookup-table name, also used on the wire.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }
        }

        impl From<$name> for $crate::status::StatusId {
            fn from(value: $name) -> Self {
                value as $crate::status::StatusId
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::job::JobStatus;
    use crate::outline::OutlineStatus;

    use super::StatusId;

    #[test]
    fn job_status_ids_match_seed_data() {
        assert_eq!(JobStatus::Pending.id(), 1);
        assert_eq!(JobStatus::Processing.id(), 2);
        assert_eq!(JobStatus::Completed.id(), 3);
        assert_eq!(JobStatus::Failed.id(), 4);
    }

    #[test]
    fn outline_status_ids_match_seed_data() {
        assert_eq!(OutlineStatus::Pending.id(), 1);
        assert_eq!(OutlineStatus::Approved.id(), 2);
        assert_eq!(OutlineStatus::Rejected.id(), 3);
        assert_eq!(OutlineStatus::Regenerating.id(), 4);
    }

    #[test]
    fn from_id_round_trips_and_rejects_unknown() {
        assert_eq!(JobStatus::from_id(2), Some(JobStatus::Processing));
        assert_eq!(JobStatus::from_id(9), None);
        let id: StatusId = OutlineStatus::Regenerating.into();
        assert_eq!(OutlineStatus::from_id(id), Some(OutlineStatus::Regenerating));
    }

    #[test]
    fn serializes_as_snake_case_label() {
        assert_eq!(
            serde_json::to_value(JobStatus::Processing).unwrap(),
            serde_json::json!("processing")
        );
        assert_eq!(OutlineStatus::Regenerating.to_string(), "regenerating");
    }
}
