//! faceclock-store — Persistence for enrolled faces and attendance.
//!
//! Known faces live in a JSON file rewritten wholesale on every change;
//! attendance lives in a SQLite table accessed through `tokio-rusqlite`.

pub mod clock;
pub mod error;
pub mod known_faces;
pub mod ledger;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::StoreError;
pub use known_faces::KnownFacesStore;
pub use ledger::{AttendanceLedger, AttendanceRecord, PunchAction};
