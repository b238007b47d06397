//! Domain types shared by every component.

pub mod account;
pub mod bar;
pub mod nan_f64;
pub mod position;
pub mod snapshot;
pub mod tags;

pub use account::{Account, ExitKind, ExitRecord, RiskProfile};
pub use bar::Bar;
pub use position::{OpenPosition, ProtectionLevel};
pub use snapshot::{DataIssue, InstrumentSnapshot, UniverseMember};
pub use tags::{MarketRegime, Sleeve, VolRegime};
