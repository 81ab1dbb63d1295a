#[cfg(feature = "json")]
mod import;
mod pose;
mod separate;

#[cfg(feature = "json")]
pub use import::*;
pub use pose::*;
pub use separate::*;



#[cfg(all(test, feature = "json"))]
mod import_tests;
